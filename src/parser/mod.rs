//! Raw sample-log parsing.
//!
//! Turns the text handed over by the sampling engine into the ordered
//! sample sequence everything else consumes.

pub mod sample_log;

// Re-export main types
pub use sample_log::{parse_samples, SampleLog};
