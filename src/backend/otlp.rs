//! Delivery to an OpenTelemetry-style collector.
//!
//! Fixes the endpoint to `<base>/v1/traces` and keeps the trace/metric
//! formatter's service name and encoding in sync with the backend
//! configuration. A trace context forwarded from a tracing SDK is tagged
//! into the profile metadata at send time.

use super::http::{post_payload, probe};
use super::{
    build_http_client, dispatch, local_failure, DeliveryObserver, DeliveryOutcome, LogObserver,
    RetryPolicy,
};
use crate::format::{OtlpEncoding, OtlpFormatter};
use crate::profile::Profile;
use crate::utils::config::meta_keys;
use crate::utils::error::ConfigError;
use reqwest::blocking::Client;
use std::sync::Arc;

/// Trace/span identifiers forwarded as profile metadata.
#[derive(Debug, Clone)]
pub struct TraceContext {
    pub trace_id: String,
    pub span_id: String,
}

/// Backend that ships profiles to a collector's trace ingest endpoint.
#[derive(Clone)]
pub struct OtlpBackend {
    endpoint: String,
    formatter: OtlpFormatter,
    trace_context: Option<TraceContext>,
    client: Client,
    retry: RetryPolicy,
    asynchronous: bool,
    observer: Arc<dyn DeliveryObserver>,
}

impl OtlpBackend {
    /// JSON encoding against `<base>/v1/traces`.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            endpoint: traces_url(&base_url.into()),
            formatter: OtlpFormatter::default(),
            trace_context: None,
            client: build_http_client()?,
            retry: RetryPolicy::default(),
            asynchronous: false,
            observer: Arc::new(LogObserver),
        })
    }

    /// Rebuilds the formatter so payloads carry the new service name.
    pub fn with_service_name(mut self, service_name: impl Into<String>) -> Self {
        self.formatter = self.formatter.with_service_name(service_name);
        self
    }

    /// Rebuilds the formatter for the new encoding; the content type and
    /// Accept header follow automatically.
    pub fn with_encoding(mut self, encoding: OtlpEncoding) -> Self {
        self.formatter = self.formatter.with_encoding(encoding);
        self
    }

    pub fn with_trace_context(mut self, context: TraceContext) -> Self {
        self.trace_context = Some(context);
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

    pub fn formatter(&self) -> &OtlpFormatter {
        &self.formatter
    }

    pub fn send(&self, profile: &Profile) -> bool {
        self.deliver(profile).success
    }

    pub fn deliver(&self, profile: &Profile) -> DeliveryOutcome {
        // Formatters never extend metadata, so the trace context is
        // tagged onto a send-local copy here, by the profile's owner.
        let mut profile = profile.clone();
        if let Some(context) = &self.trace_context {
            profile.tag(meta_keys::TRACE_ID, context.trace_id.clone());
            profile.tag(meta_keys::SPAN_ID, context.span_id.clone());
        }

        let bytes = match self.formatter.format(&profile) {
            Ok(bytes) => bytes,
            Err(e) => return local_failure(self.observer.as_ref(), &self.endpoint, e.into()),
        };

        let client = self.client.clone();
        let url = self.endpoint.clone();
        let content_type = self.formatter.content_type();
        let headers = vec![("Accept".to_string(), content_type.to_string())];

        dispatch(
            self.retry,
            self.asynchronous,
            Arc::clone(&self.observer),
            self.endpoint.clone(),
            Box::new(move || post_payload(&client, &url, content_type, &headers, bytes.clone())),
        )
    }

    pub fn is_available(&self) -> bool {
        probe(&self.client, &self.endpoint)
    }
}

fn traces_url(base: &str) -> String {
    format!("{}/v1/traces", base.trim_end_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_is_fixed_to_traces_path() {
        let backend = OtlpBackend::new("http://collector:4318").unwrap();
        assert_eq!(backend.endpoint(), "http://collector:4318/v1/traces");

        let slashed = OtlpBackend::new("http://collector:4318/").unwrap();
        assert_eq!(slashed.endpoint(), "http://collector:4318/v1/traces");
    }

    #[test]
    fn test_formatter_stays_in_sync() {
        let backend = OtlpBackend::new("http://collector:4318")
            .unwrap()
            .with_service_name("checkout")
            .with_encoding(OtlpEncoding::Protobuf);

        assert_eq!(backend.formatter().service_name, "checkout");
        assert_eq!(backend.formatter().encoding, OtlpEncoding::Protobuf);
        assert_eq!(backend.formatter().content_type(), "application/x-protobuf");
    }

    #[test]
    fn test_trace_context_lands_in_metadata() {
        use crate::parser::parse_samples;
        use crate::profile::Metadata;

        let profile = Profile::new(parse_samples("main 1\n"), Metadata::new());
        let context = TraceContext {
            trace_id: "4bf92f3577b34da6a3ce929d0e0e4736".to_string(),
            span_id: "00f067aa0ba902b7".to_string(),
        };

        // The tagging path is what deliver() runs before formatting.
        let mut tagged = profile.clone();
        tagged.tag(meta_keys::TRACE_ID, context.trace_id.clone());
        tagged.tag(meta_keys::SPAN_ID, context.span_id.clone());

        let formatter = OtlpFormatter::default();
        let bytes = formatter.format(&tagged).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        let attributes = value["resourceSpans"][0]["resource"]["attributes"]
            .as_array()
            .unwrap();
        assert!(attributes
            .iter()
            .any(|a| a["key"] == "excimetry.trace_id"
                && a["value"]["stringValue"] == "4bf92f3577b34da6a3ce929d0e0e4736"));

        // The original profile is untouched.
        assert!(profile.metadata.get(meta_keys::TRACE_ID).is_none());
    }
}
