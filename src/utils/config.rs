//! Configuration defaults and reserved keys.

use std::time::Duration;

/// Default timeout for a single HTTP delivery attempt
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Default number of retries after a failed synchronous delivery attempt
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default pause between delivery attempts
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(1000);

/// Frame separator in raw sample logs and collapsed output
pub const STACK_DELIMITER: &str = ";";

/// Version stamp written into evented documents
pub const SCHEMA_VERSION: &str = "0.0.1";

/// Reserved resource attribute key carrying the service name
pub const SERVICE_NAME_KEY: &str = "service.name";

/// Prefix applied to profile metadata when exported as resource attributes
pub const METADATA_KEY_PREFIX: &str = "excimetry.";

/// Instrumentation scope name stamped on OTLP payloads
pub const SCOPE_NAME: &str = "excimetry";

/// Metadata keys with a defined meaning inside the crate
pub mod meta_keys {
    /// Unix timestamp (seconds) of the profiling session start
    pub const TIMESTAMP: &str = "timestamp";
    /// Sampling period in seconds
    pub const PERIOD: &str = "period";
    /// Sampling mode ("wall" or "cpu")
    pub const MODE: &str = "mode";
    /// Trace id forwarded from a tracing SDK
    pub const TRACE_ID: &str = "trace_id";
    /// Span id forwarded from a tracing SDK
    pub const SPAN_ID: &str = "span_id";
}
