// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Inbound bus messages and payload classification.

use chrono::{DateTime, Utc};

/// One message delivered by the broker.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    /// Topic the message was published on.
    pub topic: String,
    /// Raw message body.
    pub payload: Vec<u8>,
    /// Time the message was received from the broker.
    pub received_at: DateTime<Utc>,
}

impl InboundMessage {
    /// Create a message stamped with the current time.
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self::received(topic, payload, Utc::now())
    }

    /// Create a message with an explicit receipt time.
    pub fn received(
        topic: impl Into<String>,
        payload: impl Into<Vec<u8>>,
        received_at: DateTime<Utc>,
    ) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            received_at,
        }
    }

    /// Payload decoded as UTF-8, invalid sequences replaced.
    pub fn payload_text(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}

/// A payload interpreted either as a number or as opaque text.
#[derive(Debug, Clone, PartialEq)]
pub enum ClassifiedValue {
    /// Payload parsed as a finite floating-point literal.
    Numeric(f64),
    /// Anything else, decoded lossily.
    Text(String),
}

impl ClassifiedValue {
    pub fn numeric(&self) -> Option<f64> {
        match self {
            ClassifiedValue::Numeric(v) => Some(*v),
            ClassifiedValue::Text(_) => None,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            ClassifiedValue::Numeric(_) => None,
            ClassifiedValue::Text(s) => Some(s),
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, ClassifiedValue::Numeric(_))
    }
}

/// Classify a raw payload.
///
/// Surrounding whitespace is ignored when parsing. `nan` and `inf` parse as
/// floats but are kept as text because none of the stores accept them as
/// numbers.
pub fn classify(payload: &[u8]) -> ClassifiedValue {
    let text = String::from_utf8_lossy(payload);
    match text.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => ClassifiedValue::Numeric(v),
        _ => ClassifiedValue::Text(text.into_owned()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_decimal() {
        let v = classify(b"23.5");
        assert_eq!(v.numeric(), Some(23.5));
        assert!(v.text().is_none());
    }

    #[test]
    fn test_classify_integer_and_exponent() {
        assert_eq!(classify(b"42").numeric(), Some(42.0));
        assert_eq!(classify(b"-1.5e3").numeric(), Some(-1500.0));
        assert_eq!(classify(b" 7.25\n").numeric(), Some(7.25));
    }

    #[test]
    fn test_classify_text() {
        let v = classify(b"hello");
        assert_eq!(v.text(), Some("hello"));
        assert!(v.numeric().is_none());
        assert!(!v.is_numeric());
    }

    #[test]
    fn test_classify_text_keeps_whitespace() {
        assert_eq!(classify(b" on ").text(), Some(" on "));
    }

    #[test]
    fn test_classify_non_finite_is_text() {
        assert_eq!(classify(b"nan").text(), Some("nan"));
        assert_eq!(classify(b"inf").text(), Some("inf"));
    }

    #[test]
    fn test_classify_invalid_utf8_is_lossy_text() {
        let v = classify(&[0x66, 0xFF, 0x6F]);
        assert_eq!(v.text(), Some("f\u{FFFD}o"));
    }

    #[test]
    fn test_classify_empty_payload() {
        assert_eq!(classify(b"").text(), Some(""));
    }

    #[test]
    fn test_payload_text_lossy() {
        let msg = InboundMessage::new("/a", vec![0x61, 0xC3]);
        assert_eq!(msg.payload_text(), "a\u{FFFD}");
    }
}
