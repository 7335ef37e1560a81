//! Delivery backends.
//!
//! Every backend pairs a [`Formatter`] with a transport and exposes the
//! same contract: `send` / `deliver`, `is_available`, and immutable
//! reconfiguration (`with_*` consumes the backend and returns a new one;
//! nothing is rebuilt behind the caller's back).
//!
//! Synchronous sends run the transport inside the retry loop and block
//! until the outcome is known. Asynchronous sends detach a single
//! unsupervised attempt on a background thread and report optimistic
//! success immediately: no cancellation handle, no completion signal,
//! failures visible only through the [`DeliveryObserver`].

pub mod file;
pub mod http;
pub mod otlp;
pub mod pyroscope;

// Re-export main types
pub use file::FileBackend;
pub use http::HttpBackend;
pub use otlp::{OtlpBackend, TraceContext};
pub use pyroscope::PyroscopeBackend;

use crate::profile::Profile;
use crate::utils::config::{DEFAULT_HTTP_TIMEOUT, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY};
use crate::utils::error::{ConfigError, DeliveryError};
use log::{error, warn};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Bound and pacing of the synchronous retry loop.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Retries after the first failed attempt; total attempts are
    /// `max_retries + 1`
    pub max_retries: u32,

    /// Pause between attempts
    pub retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }
}

/// Result of one `deliver` call.
///
/// Asynchronous deliveries report `success: true, attempts: 0`: no
/// attempt has completed synchronously and none will be reported later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryOutcome {
    pub success: bool,
    pub attempts: u32,
}

/// Receives delivery failures.
///
/// Injected into every backend so failure visibility is testable and
/// swappable instead of being a hard-wired global side effect. The
/// default [`LogObserver`] forwards to the `log` facade.
pub trait DeliveryObserver: Send + Sync {
    /// One attempt failed. `error` is `None` when the destination
    /// rejected the payload without a transport-level error. Attempt 0
    /// means the payload could not even be formatted.
    fn attempt_failed(&self, target: &str, attempt: u32, error: Option<&DeliveryError>);

    /// The backend gave up on this delivery.
    fn gave_up(&self, target: &str, attempts: u32);
}

/// Default observer: forwards failures to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl DeliveryObserver for LogObserver {
    fn attempt_failed(&self, target: &str, attempt: u32, error: Option<&DeliveryError>) {
        match error {
            Some(e) => warn!("delivery to {} failed (attempt {}): {}", target, attempt, e),
            None => warn!("delivery to {} rejected (attempt {})", target, attempt),
        }
    }

    fn gave_up(&self, target: &str, attempts: u32) {
        error!("giving up on delivery to {} after {} attempts", target, attempts);
    }
}

/// The closed set of delivery backends.
#[derive(Clone)]
pub enum Backend {
    File(FileBackend),
    Http(HttpBackend),
    Otlp(OtlpBackend),
    Pyroscope(PyroscopeBackend),
}

impl Backend {
    /// Format and deliver a profile; `true` on success (optimistically
    /// `true` in async mode). Never panics, never returns an error:
    /// delivery problems surface here as `false` and in detail through
    /// the observer.
    pub fn send(&self, profile: &Profile) -> bool {
        self.deliver(profile).success
    }

    /// Like [`send`](Backend::send), with the attempt count.
    pub fn deliver(&self, profile: &Profile) -> DeliveryOutcome {
        match self {
            Backend::File(b) => b.deliver(profile),
            Backend::Http(b) => b.deliver(profile),
            Backend::Otlp(b) => b.deliver(profile),
            Backend::Pyroscope(b) => b.deliver(profile),
        }
    }

    /// Probe whether the destination is reachable at all.
    pub fn is_available(&self) -> bool {
        match self {
            Backend::File(b) => b.is_available(),
            Backend::Http(b) => b.is_available(),
            Backend::Otlp(b) => b.is_available(),
            Backend::Pyroscope(b) => b.is_available(),
        }
    }
}

impl From<FileBackend> for Backend {
    fn from(b: FileBackend) -> Self {
        Backend::File(b)
    }
}

impl From<HttpBackend> for Backend {
    fn from(b: HttpBackend) -> Self {
        Backend::Http(b)
    }
}

impl From<OtlpBackend> for Backend {
    fn from(b: OtlpBackend) -> Self {
        Backend::Otlp(b)
    }
}

impl From<PyroscopeBackend> for Backend {
    fn from(b: PyroscopeBackend) -> Self {
        Backend::Pyroscope(b)
    }
}

/// Blocking HTTP client with the per-attempt timeout. One per backend
/// instance; each send clones it (cheap, shared connection pool).
pub(crate) fn build_http_client() -> Result<reqwest::blocking::Client, ConfigError> {
    Ok(reqwest::blocking::Client::builder()
        .timeout(DEFAULT_HTTP_TIMEOUT)
        .build()?)
}

/// One transport attempt. `Ok(false)` means the destination reported
/// failure without a transport error.
pub(crate) type Attempt = Box<dyn FnMut() -> Result<bool, DeliveryError> + Send>;

/// Run a prepared attempt under the backend's delivery settings.
///
/// Synchronous: `Idle -> Sending -> {Success | Retrying -> Sending}*`
/// until success or the attempt bound; blocks across the retry sleeps.
/// Asynchronous: one detached attempt, optimistic outcome.
pub(crate) fn dispatch(
    policy: RetryPolicy,
    asynchronous: bool,
    observer: Arc<dyn DeliveryObserver>,
    target: String,
    mut attempt: Attempt,
) -> DeliveryOutcome {
    if asynchronous {
        thread::spawn(move || match attempt() {
            Ok(true) => {}
            Ok(false) => {
                observer.attempt_failed(&target, 1, None);
                observer.gave_up(&target, 1);
            }
            Err(e) => {
                observer.attempt_failed(&target, 1, Some(&e));
                observer.gave_up(&target, 1);
            }
        });
        return DeliveryOutcome {
            success: true,
            attempts: 0,
        };
    }

    let max_attempts = policy.max_retries + 1;
    let mut attempts = 0;
    loop {
        attempts += 1;
        match attempt() {
            Ok(true) => {
                return DeliveryOutcome {
                    success: true,
                    attempts,
                }
            }
            Ok(false) => observer.attempt_failed(&target, attempts, None),
            Err(e) => observer.attempt_failed(&target, attempts, Some(&e)),
        }

        if attempts >= max_attempts {
            observer.gave_up(&target, attempts);
            return DeliveryOutcome {
                success: false,
                attempts,
            };
        }
        thread::sleep(policy.retry_delay);
    }
}

/// Report a delivery that failed before any transport attempt (payload
/// could not be formatted, request could not be built): attempt 0,
/// immediate surrender, no retries burned.
pub(crate) fn local_failure(
    observer: &dyn DeliveryObserver,
    target: &str,
    error: DeliveryError,
) -> DeliveryOutcome {
    observer.attempt_failed(target, 0, Some(&error));
    observer.gave_up(target, 0);
    DeliveryOutcome {
        success: false,
        attempts: 0,
    }
}
