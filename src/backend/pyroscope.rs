//! Delivery to a continuous-profiling server (Pyroscope-style ingest).
//!
//! Fixes the endpoint to `<base>/ingest` and attaches the query
//! parameters the server expects: `name` (application), `from`/`until`
//! (session timestamp to send time) and a comma-joined `labels` string.
//! Payloads default to collapsed text, the format such servers ingest
//! natively.

use super::http::{post_payload, probe};
use super::{
    build_http_client, dispatch, local_failure, DeliveryObserver, DeliveryOutcome, LogObserver,
    RetryPolicy,
};
use crate::format::{CollapsedFormatter, Formatter};
use crate::profile::{MetaValue, Profile};
use crate::utils::config::meta_keys;
use crate::utils::error::ConfigError;
use chrono::Utc;
use reqwest::blocking::Client;
use std::sync::Arc;

/// Backend that ships profiles to a profiling server's ingest endpoint.
#[derive(Clone)]
pub struct PyroscopeBackend {
    endpoint: String,
    app_name: String,
    labels: Vec<(String, String)>,
    formatter: Formatter,
    client: Client,
    retry: RetryPolicy,
    asynchronous: bool,
    observer: Arc<dyn DeliveryObserver>,
}

impl PyroscopeBackend {
    pub fn new(
        base_url: impl Into<String>,
        app_name: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            endpoint: ingest_url(&base_url.into()),
            app_name: app_name.into(),
            labels: Vec::new(),
            formatter: CollapsedFormatter::new().into(),
            client: build_http_client()?,
            retry: RetryPolicy::default(),
            asynchronous: false,
            observer: Arc::new(LogObserver),
        })
    }

    /// Add a `key=value` label to the ingest query.
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.push((key.into(), value.into()));
        self
    }

    /// Override the collapsed default.
    pub fn with_formatter(mut self, formatter: impl Into<Formatter>) -> Self {
        self.formatter = formatter.into();
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_async(mut self, asynchronous: bool) -> Self {
        self.asynchronous = asynchronous;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn DeliveryObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn formatter(&self) -> &Formatter {
        &self.formatter
    }

    pub fn send(&self, profile: &Profile) -> bool {
        self.deliver(profile).success
    }

    pub fn deliver(&self, profile: &Profile) -> DeliveryOutcome {
        let bytes = match self.formatter.format(profile) {
            Ok(bytes) => bytes,
            Err(e) => return local_failure(self.observer.as_ref(), &self.endpoint, e.into()),
        };

        let until = Utc::now().timestamp();
        let from = session_start_seconds(profile).unwrap_or(until);
        let mut query = vec![
            ("name".to_string(), self.app_name.clone()),
            ("from".to_string(), from.to_string()),
            ("until".to_string(), until.to_string()),
        ];
        if !self.labels.is_empty() {
            query.push(("labels".to_string(), format_labels(&self.labels)));
        }

        // from/until are fixed at send time; retries repeat the same
        // request rather than shifting the window.
        let url = match reqwest::Url::parse_with_params(&self.endpoint, &query) {
            Ok(url) => url.to_string(),
            Err(e) => {
                let e = std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("invalid ingest URL {}: {}", self.endpoint, e),
                );
                return local_failure(self.observer.as_ref(), &self.endpoint, e.into());
            }
        };

        let client = self.client.clone();
        let content_type = self.formatter.content_type();

        dispatch(
            self.retry,
            self.asynchronous,
            Arc::clone(&self.observer),
            self.endpoint.clone(),
            Box::new(move || post_payload(&client, &url, content_type, &[], bytes.clone())),
        )
    }

    pub fn is_available(&self) -> bool {
        probe(&self.client, &self.endpoint)
    }
}

fn ingest_url(base: &str) -> String {
    format!("{}/ingest", base.trim_end_matches('/'))
}

/// Comma-joined `key=value` pairs, in label insertion order.
fn format_labels(labels: &[(String, String)]) -> String {
    labels
        .iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join(",")
}

/// Session start from the metadata timestamp, when present.
fn session_start_seconds(profile: &Profile) -> Option<i64> {
    match profile.metadata.get(meta_keys::TIMESTAMP)? {
        MetaValue::Int(s) => Some(*s),
        MetaValue::Float(s) => Some(*s as i64),
        _ => None,
    }
}
