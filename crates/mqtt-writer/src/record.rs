// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Canonical record handed to every sink.

use crate::message::{ClassifiedValue, InboundMessage};
use crate::topic::TopicTags;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;

/// Name of the numeric field.
pub const VALUE_FIELD: &str = "value";

/// Name of the text field.
pub const TEXT_FIELD: &str = "text";

/// A value stored in a record field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// 64-bit floating point.
    Float(f64),
    /// UTF-8 string.
    String(String),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Float(v) => f.write_str(&format_decimal(*v)),
            FieldValue::String(s) => f.write_str(s),
        }
    }
}

/// One message in sink-neutral form.
#[derive(Debug, Clone)]
pub struct SinkRecord {
    pub timestamp: DateTime<Utc>,
    pub topic: String,
    pub tags: TopicTags,
    pub fields: BTreeMap<String, FieldValue>,
}

impl SinkRecord {
    /// Assemble a record from a message and its derived parts.
    ///
    /// A numeric payload lands in `value`, anything else in `text`.
    pub fn assemble(message: &InboundMessage, tags: TopicTags, value: ClassifiedValue) -> Self {
        let mut fields = BTreeMap::new();
        match value {
            ClassifiedValue::Numeric(v) => {
                fields.insert(VALUE_FIELD.to_string(), FieldValue::Float(v));
            }
            ClassifiedValue::Text(s) => {
                fields.insert(TEXT_FIELD.to_string(), FieldValue::String(s));
            }
        }

        Self {
            timestamp: message.received_at,
            topic: message.topic.clone(),
            tags,
            fields,
        }
    }

    /// The numeric payload, if any.
    pub fn numeric(&self) -> Option<f64> {
        match self.fields.get(VALUE_FIELD) {
            Some(FieldValue::Float(v)) => Some(*v),
            _ => None,
        }
    }

    /// The text payload, if any.
    pub fn text(&self) -> Option<&str> {
        match self.fields.get(TEXT_FIELD) {
            Some(FieldValue::String(s)) => Some(s),
            _ => None,
        }
    }

    /// Payload rendered for text output.
    pub fn payload_string(&self) -> String {
        match (self.numeric(), self.text()) {
            (Some(v), _) => format_decimal(v),
            (None, Some(s)) => s.to_string(),
            (None, None) => String::new(),
        }
    }
}

/// Render a float in decimal form, keeping a trailing `.0` on whole numbers.
pub fn format_decimal(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e16 {
        format!("{:.1}", v)
    } else {
        format!("{}", v)
    }
}
