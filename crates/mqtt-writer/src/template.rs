// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Line templates with `{timestamp}`, `{topic}` and `{payload}` placeholders.
//!
//! The template is parsed once. Substituted values are never rescanned, so a
//! payload containing `{topic}` is written verbatim. Unknown placeholders are
//! kept as literal text.

#[derive(Debug, Clone, PartialEq, Eq)]
enum Piece {
    Literal(String),
    Timestamp,
    Topic,
    Payload,
}

/// A parsed output line template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineTemplate {
    source: String,
    pieces: Vec<Piece>,
}

/// Values substituted into a template.
#[derive(Debug, Clone, Copy)]
pub struct LineValues<'a> {
    pub timestamp: &'a str,
    pub topic: &'a str,
    pub payload: &'a str,
}

impl LineTemplate {
    /// Parse a template. A trailing newline is dropped; the sink terminates
    /// every line itself.
    pub fn parse(template: &str) -> Self {
        let source = template.trim_end_matches(['\r', '\n']).to_string();
        let mut pieces = Vec::new();
        let mut literal = String::new();
        let mut rest = source.as_str();

        while let Some(open) = rest.find('{') {
            literal.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let Some(close) = after.find('}') else {
                literal.push_str(&rest[open..]);
                rest = "";
                break;
            };

            let piece = match &after[..close] {
                "timestamp" => Some(Piece::Timestamp),
                "topic" => Some(Piece::Topic),
                "payload" => Some(Piece::Payload),
                _ => None,
            };
            match piece {
                Some(p) => {
                    if !literal.is_empty() {
                        pieces.push(Piece::Literal(std::mem::take(&mut literal)));
                    }
                    pieces.push(p);
                }
                None => literal.push_str(&rest[open..open + close + 2]),
            }
            rest = &after[close + 1..];
        }

        literal.push_str(rest);
        if !literal.is_empty() {
            pieces.push(Piece::Literal(literal));
        }

        Self { source, pieces }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Render one line (without terminator).
    pub fn render(&self, values: &LineValues<'_>) -> String {
        let mut out = String::with_capacity(self.source.len() + values.payload.len());
        for piece in &self.pieces {
            match piece {
                Piece::Literal(s) => out.push_str(s),
                Piece::Timestamp => out.push_str(values.timestamp),
                Piece::Topic => out.push_str(values.topic),
                Piece::Payload => out.push_str(values.payload),
            }
        }
        out
    }
}

impl Default for LineTemplate {
    fn default() -> Self {
        Self::parse("{timestamp};{topic};{payload}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values<'a>(payload: &'a str) -> LineValues<'a> {
        LineValues {
            timestamp: "2024-01-15T10:00:00",
            topic: "/a/b",
            payload,
        }
    }

    #[test]
    fn test_default_template() {
        let line = LineTemplate::default().render(&values("23.5"));
        assert_eq!(line, "2024-01-15T10:00:00;/a/b;23.5");
    }

    #[test]
    fn test_trailing_newline_dropped() {
        let t = LineTemplate::parse("{timestamp};{topic};{payload}\n");
        assert_eq!(t.as_str(), "{timestamp};{topic};{payload}");
    }

    #[test]
    fn test_payload_not_rescanned() {
        let line = LineTemplate::default().render(&values("{topic}"));
        assert_eq!(line, "2024-01-15T10:00:00;/a/b;{topic}");
    }

    #[test]
    fn test_unknown_and_unclosed_placeholders_are_literal() {
        let t = LineTemplate::parse("[{level}] {payload} {oops");
        assert_eq!(t.render(&values("x")), "[{level}] x {oops");
    }

    #[test]
    fn test_repeated_placeholder() {
        let t = LineTemplate::parse("{payload}|{payload}");
        assert_eq!(t.render(&values("7")), "7|7");
    }
}
