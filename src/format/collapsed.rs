//! Collapsed (folded) stack output.
//!
//! One line per distinct stack: `"parent;child;grandchild count"`, the
//! input format of flamegraph renderers. Identical stacks are summed, and
//! lines come out in the order their stack was first seen.

use crate::profile::Profile;
use crate::utils::config::STACK_DELIMITER;
use crate::utils::error::FormatError;
use log::debug;
use std::collections::HashMap;

/// Configuration for collapsed output. Immutable; build a new formatter
/// to change it.
#[derive(Debug, Clone)]
pub struct CollapsedFormatter {
    /// Emit stacks leaf-to-root instead of root-to-leaf
    pub reverse: bool,

    /// Frame separator within a line
    pub delimiter: String,
}

impl Default for CollapsedFormatter {
    fn default() -> Self {
        Self {
            reverse: false,
            delimiter: STACK_DELIMITER.to_string(),
        }
    }
}

impl CollapsedFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reverse(mut self, reverse: bool) -> Self {
        self.reverse = reverse;
        self
    }

    pub fn with_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = delimiter.into();
        self
    }

    /// Aggregate and serialize. An empty profile produces empty output.
    pub fn format(&self, profile: &Profile) -> Result<Vec<u8>, FormatError> {
        // stack key -> index into `ordered`, so repeats sum into the
        // first occurrence instead of appending a second line
        let mut seen: HashMap<String, usize> = HashMap::new();
        let mut ordered: Vec<(String, u64)> = Vec::new();

        for sample in &profile.samples {
            let key = if self.reverse {
                let mut frames: Vec<&str> = sample.frames.iter().map(String::as_str).collect();
                frames.reverse();
                frames.join(&self.delimiter)
            } else {
                sample.stack_key(&self.delimiter)
            };

            match seen.get(&key) {
                Some(&slot) => ordered[slot].1 += sample.count,
                None => {
                    seen.insert(key.clone(), ordered.len());
                    ordered.push((key, sample.count));
                }
            }
        }

        debug!(
            "collapsed {} samples into {} distinct stacks",
            profile.samples.len(),
            ordered.len()
        );

        let mut out = String::new();
        for (key, count) in &ordered {
            out.push_str(key);
            out.push(' ');
            out.push_str(&count.to_string());
            out.push('\n');
        }
        Ok(out.into_bytes())
    }

    pub fn content_type(&self) -> &'static str {
        "text/plain"
    }

    pub fn file_extension(&self) -> &'static str {
        "txt"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_samples;
    use crate::profile::Metadata;
    use pretty_assertions::assert_eq;

    fn profile_from(raw: &str) -> Profile {
        Profile::new(parse_samples(raw), Metadata::new())
    }

    fn format_str(formatter: &CollapsedFormatter, profile: &Profile) -> String {
        String::from_utf8(formatter.format(profile).unwrap()).unwrap()
    }

    #[test]
    fn test_duplicate_stacks_are_summed() {
        let profile = profile_from("a;b 1\na;b 2\n");
        let out = format_str(&CollapsedFormatter::new(), &profile);
        assert_eq!(out, "a;b 3\n");
    }

    #[test]
    fn test_first_seen_order_is_preserved() {
        let profile = profile_from("z;y 1\na;b 2\nz;y 4\n");
        let out = format_str(&CollapsedFormatter::new(), &profile);
        assert_eq!(out, "z;y 5\na;b 2\n");
    }

    #[test]
    fn test_totals_are_order_insensitive() {
        let forward = profile_from("a;b 1\nc;d 2\na;b 3\n");
        let shuffled = profile_from("c;d 2\na;b 3\na;b 1\n");

        let sum_of = |profile: &Profile| -> u64 {
            format_str(&CollapsedFormatter::new(), profile)
                .lines()
                .map(|l| l.rsplit(' ').next().unwrap().parse::<u64>().unwrap())
                .sum()
        };
        assert_eq!(sum_of(&forward), sum_of(&shuffled));
    }

    #[test]
    fn test_reverse_emits_leaf_first() {
        let profile = profile_from("main;a;b 1\n");
        let out = format_str(&CollapsedFormatter::new().with_reverse(true), &profile);
        assert_eq!(out, "b;a;main 1\n");
    }

    #[test]
    fn test_custom_delimiter() {
        let profile = profile_from("main;a 2\n");
        let out = format_str(&CollapsedFormatter::new().with_delimiter(","), &profile);
        assert_eq!(out, "main,a 2\n");
    }

    #[test]
    fn test_empty_profile() {
        let profile = profile_from("");
        let out = format_str(&CollapsedFormatter::new(), &profile);
        assert_eq!(out, "");
    }

    #[test]
    fn test_round_trip_over_unique_stacks() {
        let raw = "main;a;b 1\nmain;a;c 2\nmain;d 7\n";
        let profile = profile_from(raw);
        let out = format_str(&CollapsedFormatter::new(), &profile);
        assert_eq!(out, raw);

        let reparsed = parse_samples(&out);
        assert_eq!(reparsed, profile.samples);
    }
}
