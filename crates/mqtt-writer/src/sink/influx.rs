// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! InfluxDB time-series sink.
//!
//! Records are encoded as Line Protocol and posted to the store, one point
//! per message:
//!
//! ```text
//! measurement,tag1=val1,tag2=val2 field1=val1,field2=val2 timestamp_ns
//! ```
//!
//! See: <https://docs.influxdata.com/influxdb/v2/reference/syntax/line-protocol/>

use super::SinkWriter;
use crate::error::{ConnectError, SinkError};
use crate::record::{FieldValue, SinkRecord, TEXT_FIELD, VALUE_FIELD};
use serde::{Deserialize, Serialize};
use std::time::Duration;

impl FieldValue {
    /// Format this value for InfluxDB Line Protocol.
    ///
    /// - Float: written as-is (e.g., `3.14`)
    /// - String: quoted with double quotes, inner quotes escaped (e.g., `"hello"`)
    pub fn to_line_protocol(&self) -> String {
        match self {
            FieldValue::Float(v) => format!("{}", v),
            FieldValue::String(v) => {
                let escaped = v.replace('\\', "\\\\").replace('"', "\\\"");
                format!("\"{}\"", escaped)
            }
        }
    }
}

/// InfluxDB Line Protocol encoder.
#[derive(Debug, Default, Clone, Copy)]
pub struct LineProtocolWriter;

impl LineProtocolWriter {
    /// Encode a single point as one Line Protocol line.
    ///
    /// Tags with an empty value are omitted (the protocol has no empty tag
    /// values). Returns `None` if `fields` is empty.
    pub fn write_point(
        measurement: &str,
        tags: &[(&str, &str)],
        fields: &[(&str, &FieldValue)],
        timestamp_ns: i64,
    ) -> Option<String> {
        if fields.is_empty() {
            return None;
        }

        let mut line = escape_measurement(measurement);

        // Tags sorted by key for canonical form
        let mut sorted_tags: Vec<_> = tags.iter().filter(|(_, v)| !v.is_empty()).collect();
        sorted_tags.sort_by_key(|(k, _)| *k);
        for (key, value) in &sorted_tags {
            line.push(',');
            line.push_str(&escape_key(key));
            line.push('=');
            line.push_str(&escape_key(value));
        }

        line.push(' ');
        for (i, (key, value)) in fields.iter().enumerate() {
            if i > 0 {
                line.push(',');
            }
            line.push_str(&escape_key(key));
            line.push('=');
            line.push_str(&value.to_line_protocol());
        }

        line.push(' ');
        line.push_str(&timestamp_ns.to_string());
        Some(line)
    }
}

/// Spaces and commas must be escaped with backslash.
fn escape_measurement(s: &str) -> String {
    s.replace(',', "\\,").replace(' ', "\\ ")
}

/// Tag keys, tag values and field keys: commas, equals signs and spaces.
fn escape_key(s: &str) -> String {
    s.replace(',', "\\,")
        .replace('=', "\\=")
        .replace(' ', "\\ ")
}

/// Database addressing for the two InfluxDB API generations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "api", rename_all = "lowercase")]
pub enum InfluxTarget {
    /// InfluxDB 1.x `/write?db=`.
    V1 { database: String },
    /// InfluxDB 2.x `/api/v2/write?org=&bucket=` with token auth.
    V2 {
        org: String,
        bucket: String,
        token: String,
    },
}

/// Blocking HTTP client bound to one InfluxDB instance.
pub struct InfluxClient {
    http: reqwest::blocking::Client,
    base_url: String,
    target: InfluxTarget,
}

impl InfluxClient {
    /// Build the client and check that the store answers `/ping`.
    pub fn connect(
        base_url: &str,
        target: InfluxTarget,
        timeout: Duration,
    ) -> Result<Self, ConnectError> {
        let base_url = base_url.trim_end_matches('/').to_string();
        let unreachable_err = |reason: String| ConnectError::TimeSeries {
            url: base_url.clone(),
            reason,
        };

        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .no_proxy()
            .build()
            .map_err(|e| unreachable_err(e.to_string()))?;

        let client = Self {
            http,
            base_url: base_url.clone(),
            target,
        };
        client.ping().map_err(|e| unreachable_err(e.to_string()))?;

        tracing::info!(url = %client.base_url, target = %client.target_label(), "Connected to InfluxDB");
        Ok(client)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn target_label(&self) -> &str {
        match &self.target {
            InfluxTarget::V1 { database } => database,
            InfluxTarget::V2 { bucket, .. } => bucket,
        }
    }

    /// Health check against `/ping`.
    pub fn ping(&self) -> Result<(), SinkError> {
        let resp = self.http.get(format!("{}/ping", self.base_url)).send()?;
        check_status(resp)
    }

    /// Post newline-separated Line Protocol.
    pub fn write_lines(&self, body: String) -> Result<(), SinkError> {
        let request = match &self.target {
            InfluxTarget::V1 { database } => self
                .http
                .post(format!("{}/write", self.base_url))
                .query(&[("db", database.as_str()), ("precision", "ns")]),
            InfluxTarget::V2 { org, bucket, token } => self
                .http
                .post(format!("{}/api/v2/write", self.base_url))
                .query(&[
                    ("org", org.as_str()),
                    ("bucket", bucket.as_str()),
                    ("precision", "ns"),
                ])
                .header("Authorization", format!("Token {}", token)),
        };

        let resp = request
            .header("Content-Type", "text/plain; charset=utf-8")
            .body(body)
            .send()?;
        check_status(resp)
    }
}

fn check_status(resp: reqwest::blocking::Response) -> Result<(), SinkError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(());
    }
    let body = resp.text().unwrap_or_default();
    Err(SinkError::Rejected {
        status: status.as_u16(),
        body,
    })
}

/// Where encoded points are sent.
pub trait PointTransport {
    fn send(&mut self, body: String) -> Result<(), SinkError>;
}

impl PointTransport for InfluxClient {
    fn send(&mut self, body: String) -> Result<(), SinkError> {
        self.write_lines(body)
    }
}

/// Time-series sink: one point per record under a fixed measurement.
pub struct TimeSeriesSink<T: PointTransport = InfluxClient> {
    transport: T,
    measurement: String,
    store_text: bool,
}

impl<T: PointTransport> TimeSeriesSink<T> {
    /// `store_text` writes non-numeric payloads as a string field `text`;
    /// without it such records have no field and are refused.
    pub fn new(transport: T, measurement: impl Into<String>, store_text: bool) -> Self {
        Self {
            transport,
            measurement: measurement.into(),
            store_text,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Encode `record` as one Line Protocol line.
    pub fn encode(&self, record: &SinkRecord) -> Result<String, SinkError> {
        let tags: Vec<(&str, &str)> = record.tags.iter().collect();

        let mut fields: Vec<(&str, &FieldValue)> = Vec::with_capacity(1);
        if let Some(value) = record.fields.get(VALUE_FIELD) {
            fields.push((VALUE_FIELD, value));
        }
        if self.store_text {
            if let Some(text) = record.fields.get(TEXT_FIELD) {
                fields.push((TEXT_FIELD, text));
            }
        }

        let timestamp_ns = record.timestamp.timestamp_nanos_opt().unwrap_or(i64::MAX);
        LineProtocolWriter::write_point(&self.measurement, &tags, &fields, timestamp_ns)
            .ok_or_else(|| SinkError::NoFields(record.topic.clone()))
    }
}

impl<T: PointTransport> SinkWriter for TimeSeriesSink<T> {
    fn name(&self) -> &'static str {
        "influx"
    }

    fn write(&mut self, record: &SinkRecord) -> Result<(), SinkError> {
        let line = self.encode(record)?;
        tracing::debug!(topic = %record.topic, "{}", line);
        self.transport.send(line)
    }
}
