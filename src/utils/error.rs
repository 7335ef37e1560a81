//! Error types for the entire crate.
//!
//! One `thiserror` enum per concern. Configuration and state problems are
//! the only hard failures callers see; parse problems degrade output
//! quietly and delivery problems surface as a boolean send result.

use thiserror::Error;

/// Errors raised at configuration time.
///
/// These are always returned eagerly, from constructors and `FromStr`
/// impls, never deferred to the first use of the misconfigured component.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid sampling mode: {0} (expected \"wall\" or \"cpu\")")]
    InvalidMode(String),

    #[error("invalid encoding: {0} (expected \"json\" or \"protobuf\")")]
    InvalidEncoding(String),

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Errors raised when a result is requested before the lifecycle step
/// that produces it.
///
/// Kept distinct from [`ConfigError`]: the configuration may be perfectly
/// valid while the call is simply too early.
#[derive(Error, Debug)]
pub enum StateError {
    #[error("profiler is still running; stop it before requesting samples")]
    StillRunning,

    #[error("profiler has not been started")]
    NotStarted,
}

/// Errors that can occur while serializing a profile.
#[derive(Error, Debug)]
pub enum FormatError {
    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors that can occur during a single delivery attempt.
///
/// These never escape a backend's `send`: the retry loop consumes them and
/// reports each one to the configured [`DeliveryObserver`].
///
/// [`DeliveryObserver`]: crate::backend::DeliveryObserver
#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("destination rejected payload with status {0}")]
    Rejected(u16),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("payload could not be formatted: {0}")]
    Format(#[from] FormatError),
}
