//! Trace/metric output for OpenTelemetry-style consumers.
//!
//! Each sample becomes one record named after its leaf frame, with a
//! synthetic time range (session timestamp + one millisecond per sampled
//! tick) and the stack key and tick count as attributes. Profile metadata
//! rides along as resource attributes.
//!
//! Compatibility caveat: the two encodings target different logical
//! shapes. [`OtlpEncoding::Json`] produces a *span* document,
//! [`OtlpEncoding::Protobuf`] produces *gauge metrics*. Consumers must
//! pick the encoding matching the signal they ingest; the discrepancy is
//! inherited behavior and is deliberately not unified here.

use crate::format::wire;
use crate::profile::{MetaValue, Profile};
use crate::utils::config::{meta_keys, METADATA_KEY_PREFIX, SCOPE_NAME, SERVICE_NAME_KEY};
use crate::utils::error::{ConfigError, FormatError};
use chrono::Utc;
use log::debug;
use prost::Message;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

const NANOS_PER_SECOND: u64 = 1_000_000_000;
const NANOS_PER_MILLI: u64 = 1_000_000;

/// Payload encoding selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtlpEncoding {
    /// Human-readable span document (OTLP/JSON shape)
    Json,
    /// Gauge metrics through the protobuf wire encoder
    Protobuf,
}

impl FromStr for OtlpEncoding {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "json" => Ok(OtlpEncoding::Json),
            "protobuf" => Ok(OtlpEncoding::Protobuf),
            other => Err(ConfigError::InvalidEncoding(other.to_string())),
        }
    }
}

impl fmt::Display for OtlpEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OtlpEncoding::Json => f.write_str("json"),
            OtlpEncoding::Protobuf => f.write_str("protobuf"),
        }
    }
}

/// Configuration for trace/metric output. Immutable; build a new
/// formatter to change it.
#[derive(Debug, Clone)]
pub struct OtlpFormatter {
    pub service_name: String,
    pub encoding: OtlpEncoding,
}

impl Default for OtlpFormatter {
    fn default() -> Self {
        Self {
            service_name: "excimetry".to_string(),
            encoding: OtlpEncoding::Json,
        }
    }
}

// ---- readable (span) document ----

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TraceDocument {
    resource_spans: Vec<ResourceSpans>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ResourceSpans {
    resource: ResourceDoc,
    scope_spans: Vec<ScopeSpans>,
}

#[derive(Debug, Serialize)]
struct ResourceDoc {
    attributes: Vec<Attribute>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ScopeSpans {
    scope: Scope,
    spans: Vec<Span>,
}

#[derive(Debug, Serialize)]
struct Scope {
    name: String,
    version: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Span {
    name: String,
    start_time_unix_nano: u64,
    end_time_unix_nano: u64,
    attributes: Vec<Attribute>,
}

#[derive(Debug, Serialize)]
struct Attribute {
    key: String,
    value: AttrValue,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
enum AttrValue {
    StringValue(String),
    IntValue(i64),
}

impl OtlpFormatter {
    pub fn new(service_name: impl Into<String>, encoding: OtlpEncoding) -> Self {
        Self {
            service_name: service_name.into(),
            encoding,
        }
    }

    pub fn with_service_name(mut self, service_name: impl Into<String>) -> Self {
        self.service_name = service_name.into();
        self
    }

    pub fn with_encoding(mut self, encoding: OtlpEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Serialize a profile in the configured encoding.
    pub fn format(&self, profile: &Profile) -> Result<Vec<u8>, FormatError> {
        debug!(
            "otlp export: {} samples as {} for service {:?}",
            profile.samples.len(),
            self.encoding,
            self.service_name
        );
        match self.encoding {
            OtlpEncoding::Json => self.format_spans(profile),
            OtlpEncoding::Protobuf => Ok(self.format_gauges(profile)),
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self.encoding {
            OtlpEncoding::Json => "application/json",
            OtlpEncoding::Protobuf => "application/x-protobuf",
        }
    }

    pub fn file_extension(&self) -> &'static str {
        match self.encoding {
            OtlpEncoding::Json => "json",
            OtlpEncoding::Protobuf => "bin",
        }
    }

    fn format_spans(&self, profile: &Profile) -> Result<Vec<u8>, FormatError> {
        let start_ns = session_start_nanos(profile);

        let spans = profile
            .samples
            .iter()
            .map(|sample| Span {
                name: sample.leaf().unwrap_or_default().to_string(),
                start_time_unix_nano: start_ns,
                end_time_unix_nano: start_ns + sample.count * NANOS_PER_MILLI,
                attributes: vec![
                    Attribute {
                        key: prefixed("stack"),
                        value: AttrValue::StringValue(crate::profile::default_stack_key(sample)),
                    },
                    Attribute {
                        key: prefixed("count"),
                        value: AttrValue::IntValue(sample.count as i64),
                    },
                ],
            })
            .collect();

        let document = TraceDocument {
            resource_spans: vec![ResourceSpans {
                resource: ResourceDoc {
                    attributes: self.resource_attributes(profile),
                },
                scope_spans: vec![ScopeSpans {
                    scope: Scope {
                        name: SCOPE_NAME.to_string(),
                        version: env!("CARGO_PKG_VERSION").to_string(),
                    },
                    spans,
                }],
            }],
        };

        Ok(serde_json::to_vec(&document)?)
    }

    fn format_gauges(&self, profile: &Profile) -> Vec<u8> {
        let start_ns = session_start_nanos(profile);

        let metrics = profile
            .samples
            .iter()
            .map(|sample| wire::Metric {
                name: sample.leaf().unwrap_or_default().to_string(),
                description: String::new(),
                unit: "samples".to_string(),
                data: Some(wire::metric::Data::Gauge(wire::Gauge {
                    data_points: vec![wire::NumberDataPoint {
                        start_time_unix_nano: start_ns,
                        time_unix_nano: start_ns + sample.count * NANOS_PER_MILLI,
                        attributes: vec![
                            wire::KeyValue::new(
                                prefixed("stack"),
                                wire::AnyValue::string(crate::profile::default_stack_key(sample)),
                            ),
                            wire::KeyValue::new(
                                prefixed("count"),
                                wire::AnyValue::int(sample.count as i64),
                            ),
                        ],
                        value: Some(wire::number_data_point::Value::AsInt(sample.count as i64)),
                    }],
                })),
            })
            .collect();

        let request = wire::ExportMetricsServiceRequest {
            resource_metrics: vec![wire::ResourceMetrics {
                resource: Some(wire::Resource {
                    attributes: self
                        .resource_attributes(profile)
                        .into_iter()
                        .map(|attr| {
                            let value = match attr.value {
                                AttrValue::StringValue(s) => wire::AnyValue::string(s),
                                AttrValue::IntValue(i) => wire::AnyValue::int(i),
                            };
                            wire::KeyValue::new(attr.key, value)
                        })
                        .collect(),
                }),
                scope_metrics: vec![wire::ScopeMetrics {
                    scope: Some(wire::InstrumentationScope {
                        name: SCOPE_NAME.to_string(),
                        version: env!("CARGO_PKG_VERSION").to_string(),
                    }),
                    metrics,
                }],
            }],
        };

        request.encode_to_vec()
    }

    /// Resource attributes: the service name under its reserved key,
    /// then every metadata entry stringified under the crate prefix.
    fn resource_attributes(&self, profile: &Profile) -> Vec<Attribute> {
        let mut attributes = vec![Attribute {
            key: SERVICE_NAME_KEY.to_string(),
            value: AttrValue::StringValue(self.service_name.clone()),
        }];
        for (key, value) in profile.metadata.iter() {
            attributes.push(Attribute {
                key: prefixed(key),
                value: AttrValue::StringValue(value.to_string()),
            });
        }
        attributes
    }
}

fn prefixed(key: &str) -> String {
    format!("{}{}", METADATA_KEY_PREFIX, key)
}

/// Session start in nanoseconds: the metadata timestamp when present,
/// otherwise the time of export.
fn session_start_nanos(profile: &Profile) -> u64 {
    let seconds = match profile.metadata.get(meta_keys::TIMESTAMP) {
        Some(MetaValue::Int(s)) => *s,
        Some(MetaValue::Float(s)) => *s as i64,
        _ => Utc::now().timestamp(),
    };
    seconds.max(0) as u64 * NANOS_PER_SECOND
}
