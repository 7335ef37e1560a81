//! Parser for raw sample logs.
//!
//! The sampling engine emits one line per observed stack:
//!
//! ```text
//! frame1;frame2;...;frameN <count>
//! ```
//!
//! frames root-to-leaf, count a positive integer. Malformed lines degrade
//! the profile instead of aborting the caller: they are skipped with a
//! debug note and parsing continues.

use crate::profile::Sample;
use crate::utils::config::STACK_DELIMITER;
use log::debug;
use std::sync::OnceLock;

/// A raw sample log plus its memoized parse.
///
/// A formatter may run many times against the same session; the first
/// call to [`samples`](SampleLog::samples) parses, later calls return the
/// cached sequence.
#[derive(Debug, Default)]
pub struct SampleLog {
    raw: String,
    parsed: OnceLock<Vec<Sample>>,
}

impl SampleLog {
    pub fn new(raw: impl Into<String>) -> Self {
        Self {
            raw: raw.into(),
            parsed: OnceLock::new(),
        }
    }

    /// The raw text as produced by the sampling engine.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Parsed samples, in log order. Parses on first call only.
    pub fn samples(&self) -> &[Sample] {
        self.parsed.get_or_init(|| parse_samples(&self.raw))
    }
}

/// Parse a raw sample log into samples, in line order.
///
/// For each non-empty line, the last whitespace-delimited token must be a
/// positive integer count; the remainder splits on `;` into frames. Lines
/// that do not match are dropped silently (lenient-parse policy).
pub fn parse_samples(raw: &str) -> Vec<Sample> {
    let mut samples = Vec::new();

    for (lineno, line) in raw.lines().enumerate() {
        let line = line.trim_end();
        if line.is_empty() {
            continue;
        }

        let Some((stack_text, count)) = split_trailing_count(line) else {
            debug!("skipping malformed sample line {}: {:?}", lineno + 1, line);
            continue;
        };

        let frames: Vec<String> = stack_text
            .split(STACK_DELIMITER)
            .map(str::to_string)
            .collect();
        if frames.iter().any(String::is_empty) {
            debug!("skipping sample line {} with empty frame", lineno + 1);
            continue;
        }

        samples.push(Sample::new(frames, count));
    }

    samples
}

/// Split a line into `(stack_text, count)` on the last whitespace run.
///
/// Returns `None` when there is no trailing positive integer.
fn split_trailing_count(line: &str) -> Option<(&str, u64)> {
    let split_at = line.rfind(char::is_whitespace)?;
    let stack_text = line[..split_at].trim_end();
    let count: u64 = line[split_at + 1..].parse().ok()?;
    if stack_text.is_empty() || count == 0 {
        return None;
    }
    Some((stack_text, count))
}
