//! Excimetry
//!
//! Converts raw sampled call-stack logs produced by a statistical
//! profiler into portable profile representations and delivers them to
//! storage or analysis backends.
//!
//! The pipeline: raw text -> [`parser`] -> [`profile::Profile`] ->
//! a [`format::Formatter`] -> byte payload -> a [`backend::Backend`] ->
//! external sink. Formatters are pure transforms over an immutable
//! profile; backends wrap their transport in a uniform retry/async
//! contract.
//!
//! ## Example
//!
//! ```no_run
//! use excimetry::{CollapsedFormatter, FileBackend, Metadata, Profile, SampleLog};
//!
//! let log = SampleLog::new("main;handle_request;render 12\nmain;idle 3\n");
//! let profile = Profile::new(log.samples().to_vec(), Metadata::new());
//!
//! let backend = FileBackend::new("./profiles")
//!     .with_formatter(CollapsedFormatter::new());
//! assert!(backend.send(&profile));
//! ```

pub mod backend;
pub mod format;
pub mod parser;
pub mod profile;
pub mod sampler;
pub mod utils;

// Re-export the main surface
pub use backend::{
    Backend, DeliveryObserver, DeliveryOutcome, FileBackend, HttpBackend, LogObserver,
    OtlpBackend, PyroscopeBackend, RetryPolicy, TraceContext,
};
pub use format::{
    CollapsedFormatter, EventedFormatter, Formatter, OtlpEncoding, OtlpFormatter,
};
pub use parser::{parse_samples, SampleLog};
pub use profile::{FrameTable, MetaValue, Metadata, Profile, Sample};
pub use sampler::{profile_from_source, Mode, SampleSource, SamplerSettings};
pub use utils::error::{ConfigError, DeliveryError, FormatError, StateError};
