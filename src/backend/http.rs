//! Generic HTTP POST delivery.

use super::{
    build_http_client, dispatch, local_failure, DeliveryObserver, DeliveryOutcome, LogObserver,
    RetryPolicy,
};
use crate::format::{CollapsedFormatter, Formatter};
use crate::profile::Profile;
use crate::utils::error::{ConfigError, DeliveryError};
use log::debug;
use reqwest::blocking::Client;
use std::sync::Arc;

/// Backend that POSTs formatted profiles to a configured URL.
#[derive(Clone)]
pub struct HttpBackend {
    url: String,
    headers: Vec<(String, String)>,
    formatter: Formatter,
    client: Client,
    retry: RetryPolicy,
    asynchronous: bool,
    observer: Arc<dyn DeliveryObserver>,
}

impl HttpBackend {
    pub fn new(url: impl Into<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            url: url.into(),
            headers: Vec::new(),
            formatter: CollapsedFormatter::new().into(),
            client: build_http_client()?,
            retry: RetryPolicy::default(),
            asynchronous: false,
            observer: Arc::new(LogObserver),
        })
    }

    pub fn with_formatter(mut self, formatter: impl Into<Formatter>) -> Self {
        self.formatter = formatter.into();
        self
    }

    /// Add a header sent with every request.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
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

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn formatter(&self) -> &Formatter {
        &self.formatter
    }

    /// Format and POST; `true` on a 2xx response.
    pub fn send(&self, profile: &Profile) -> bool {
        self.deliver(profile).success
    }

    pub fn deliver(&self, profile: &Profile) -> DeliveryOutcome {
        let bytes = match self.formatter.format(profile) {
            Ok(bytes) => bytes,
            Err(e) => return local_failure(self.observer.as_ref(), &self.url, e.into()),
        };

        let client = self.client.clone();
        let url = self.url.clone();
        let headers = self.headers.clone();
        let content_type = self.formatter.content_type();

        dispatch(
            self.retry,
            self.asynchronous,
            Arc::clone(&self.observer),
            self.url.clone(),
            Box::new(move || post_payload(&client, &url, content_type, &headers, bytes.clone())),
        )
    }

    /// Lightweight existence probe: a HEAD request answered with any
    /// non-5xx status.
    pub fn is_available(&self) -> bool {
        probe(&self.client, &self.url)
    }
}

pub(crate) fn post_payload(
    client: &Client,
    url: &str,
    content_type: &str,
    headers: &[(String, String)],
    body: Vec<u8>,
) -> Result<bool, DeliveryError> {
    let mut request = client
        .post(url)
        .header(reqwest::header::CONTENT_TYPE, content_type)
        .body(body);
    for (name, value) in headers {
        request = request.header(name.as_str(), value.as_str());
    }

    let response = request.send()?;
    let status = response.status();
    debug!("POST {} -> {}", url, status);
    if status.is_success() {
        Ok(true)
    } else {
        Err(DeliveryError::Rejected(status.as_u16()))
    }
}

pub(crate) fn probe(client: &Client, url: &str) -> bool {
    match client.head(url).send() {
        Ok(response) => !response.status().is_server_error(),
        Err(e) => {
            debug!("availability probe for {} failed: {}", url, e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::OtlpFormatter;

    #[test]
    fn test_construction_and_reconfiguration() {
        let backend = HttpBackend::new("http://localhost:9999/profiles")
            .unwrap()
            .with_formatter(OtlpFormatter::default())
            .with_header("Authorization", "Bearer token")
            .with_async(true);

        assert_eq!(backend.url(), "http://localhost:9999/profiles");
        assert!(matches!(backend.formatter(), Formatter::Otlp(_)));
        assert_eq!(backend.headers.len(), 1);
        assert!(backend.asynchronous);
    }

    #[test]
    fn test_unreachable_destination_is_unavailable() {
        // Discard port on localhost; the connection is refused outright.
        let backend = HttpBackend::new("http://127.0.0.1:9/up").unwrap();
        assert!(!backend.is_available());
    }
}
