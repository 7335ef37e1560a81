//! Interface presented by the external sampling engine.
//!
//! The engine itself (stack walking, timers, signal handling) lives
//! outside this crate. It hands over a completed raw log after being
//! stopped; this module describes that boundary and builds a [`Profile`]
//! from it.

use crate::parser::parse_samples;
use crate::profile::{Metadata, Profile};
use crate::utils::config::meta_keys;
use crate::utils::error::{ConfigError, StateError};
use chrono::Utc;
use log::info;
use std::fmt;
use std::str::FromStr;

/// What a sampling tick measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Elapsed wall-clock time
    Wall,
    /// Consumed CPU time
    Cpu,
}

impl FromStr for Mode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "wall" => Ok(Mode::Wall),
            "cpu" => Ok(Mode::Cpu),
            other => Err(ConfigError::InvalidMode(other.to_string())),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Wall => f.write_str("wall"),
            Mode::Cpu => f.write_str("cpu"),
        }
    }
}

/// Engine settings relevant to exported profiles.
#[derive(Debug, Clone, Copy)]
pub struct SamplerSettings {
    /// Sampling period in seconds
    pub period: f64,
    pub mode: Mode,
}

impl Default for SamplerSettings {
    fn default() -> Self {
        Self {
            period: 0.01,
            mode: Mode::Wall,
        }
    }
}

/// A provider of raw sample data.
///
/// Implemented by whatever wraps the native sampling engine. Requesting
/// the log before the engine has been stopped is a lifecycle violation
/// and fails with a [`StateError`], not a configuration error.
pub trait SampleSource {
    /// The raw sample log. Only available once profiling has stopped.
    fn raw_samples(&self) -> Result<String, StateError>;

    fn settings(&self) -> SamplerSettings;

    /// User-supplied tags to carry into every exported profile.
    fn tags(&self) -> Metadata {
        Metadata::new()
    }
}

/// Build a profile from a stopped sample source.
///
/// Metadata layout: `timestamp` (unix seconds, now), `period`, `mode`,
/// followed by the source's tags in their own order. Tag keys win over
/// the built-in entries if they collide.
pub fn profile_from_source(source: &dyn SampleSource) -> Result<Profile, StateError> {
    let raw = source.raw_samples()?;
    let settings = source.settings();

    let mut metadata = Metadata::new();
    metadata.insert(meta_keys::TIMESTAMP, Utc::now().timestamp());
    metadata.insert(meta_keys::PERIOD, settings.period);
    metadata.insert(meta_keys::MODE, settings.mode.to_string());
    for (key, value) in source.tags().iter() {
        metadata.insert(key, value.clone());
    }

    let samples = parse_samples(&raw);
    info!(
        "collected {} samples ({} mode, period {}s)",
        samples.len(),
        settings.mode,
        settings.period
    );

    Ok(Profile::new(samples, metadata))
}
