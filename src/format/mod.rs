//! Profile formatters.
//!
//! Three exporters behind one closed enum:
//! - collapsed stack text (flamegraph tool input)
//! - evented open/close timelines (interactive viewers)
//! - OTLP spans/gauges (trace and metric collectors)
//!
//! All formatters are pure transforms over an immutable [`Profile`]: no
//! shared mutable state, safe to run concurrently, idempotent per call.

pub mod collapsed;
pub mod evented;
pub mod otlp;
pub mod wire;

// Re-export main types
pub use collapsed::CollapsedFormatter;
pub use evented::{Event, EventKind, EventedDocument, EventedFormatter};
pub use otlp::{OtlpEncoding, OtlpFormatter};

use crate::profile::Profile;
use crate::utils::error::FormatError;

/// The closed set of output formats.
///
/// Backends hold one of these; matching is exhaustive, so a new format
/// shows up everywhere the compiler points.
#[derive(Debug, Clone)]
pub enum Formatter {
    Collapsed(CollapsedFormatter),
    Evented(EventedFormatter),
    Otlp(OtlpFormatter),
}

impl Formatter {
    /// Serialize a profile to the format's byte payload.
    pub fn format(&self, profile: &Profile) -> Result<Vec<u8>, FormatError> {
        match self {
            Formatter::Collapsed(f) => f.format(profile),
            Formatter::Evented(f) => f.format(profile),
            Formatter::Otlp(f) => f.format(profile),
        }
    }

    /// MIME type of the payload, used as the HTTP `Content-Type`.
    pub fn content_type(&self) -> &'static str {
        match self {
            Formatter::Collapsed(f) => f.content_type(),
            Formatter::Evented(f) => f.content_type(),
            Formatter::Otlp(f) => f.content_type(),
        }
    }

    /// Suggested file extension for the payload.
    pub fn file_extension(&self) -> &'static str {
        match self {
            Formatter::Collapsed(f) => f.file_extension(),
            Formatter::Evented(f) => f.file_extension(),
            Formatter::Otlp(f) => f.file_extension(),
        }
    }
}

impl From<CollapsedFormatter> for Formatter {
    fn from(f: CollapsedFormatter) -> Self {
        Formatter::Collapsed(f)
    }
}

impl From<EventedFormatter> for Formatter {
    fn from(f: EventedFormatter) -> Self {
        Formatter::Evented(f)
    }
}

impl From<OtlpFormatter> for Formatter {
    fn from(f: OtlpFormatter) -> Self {
        Formatter::Otlp(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_samples;
    use crate::profile::Metadata;

    #[test]
    fn test_dispatch_and_content_types() {
        let profile = Profile::new(parse_samples("main;a 1\n"), Metadata::new());

        let collapsed: Formatter = CollapsedFormatter::new().into();
        assert_eq!(collapsed.content_type(), "text/plain");
        assert_eq!(collapsed.file_extension(), "txt");
        assert_eq!(collapsed.format(&profile).unwrap(), b"main;a 1\n");

        let evented: Formatter = EventedFormatter::new("p").into();
        assert_eq!(evented.content_type(), "application/json");
        assert!(!evented.format(&profile).unwrap().is_empty());

        let otlp: Formatter = OtlpFormatter::default().into();
        assert_eq!(otlp.file_extension(), "json");
        assert!(!otlp.format(&profile).unwrap().is_empty());
    }

    #[test]
    fn test_formatters_are_idempotent_over_one_profile() {
        let profile = Profile::new(parse_samples("main;a 1\nmain;b 2\n"), Metadata::new());
        let formatter: Formatter = EventedFormatter::new("p").into();
        assert_eq!(
            formatter.format(&profile).unwrap(),
            formatter.format(&profile).unwrap()
        );
    }
}
