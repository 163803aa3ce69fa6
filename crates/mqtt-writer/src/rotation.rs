// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Time-based output file rotation.
//!
//! The active file is named by rendering a strftime template against the
//! record timestamp. A file boundary is crossed exactly when the rendered
//! name changes:
//!
//! ```text
//! output-%Y%m%d.csv  ->  output-20240115.csv, output-20240116.csv, ...
//! ```

use crate::error::ConfigError;
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use std::path::PathBuf;

/// Clock used when rendering dates into names and lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeBasis {
    /// Host local time.
    #[default]
    Local,
    /// Coordinated universal time.
    Utc,
}

/// A validated strftime pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeFormat {
    pattern: String,
    basis: TimeBasis,
}

impl TimeFormat {
    /// Validate `pattern` and bind it to a clock.
    pub fn new(pattern: impl Into<String>, basis: TimeBasis) -> Result<Self, ConfigError> {
        let pattern = pattern.into();
        if StrftimeItems::new(&pattern).any(|item| matches!(item, Item::Error)) {
            return Err(ConfigError::Invalid(format!(
                "invalid strftime pattern: {}",
                pattern
            )));
        }
        Ok(Self { pattern, basis })
    }

    /// `%Y-%m-%dT%H:%M:%S` on the given clock.
    pub fn iso8601(basis: TimeBasis) -> Self {
        Self {
            pattern: "%Y-%m-%dT%H:%M:%S".to_string(),
            basis,
        }
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn basis(&self) -> TimeBasis {
        self.basis
    }

    /// Render `at` with this pattern.
    pub fn render(&self, at: &DateTime<Utc>) -> String {
        let mut out = String::new();
        let res = match self.basis {
            TimeBasis::Utc => write!(out, "{}", at.format(&self.pattern)),
            TimeBasis::Local => write!(out, "{}", at.with_timezone(&Local).format(&self.pattern)),
        };
        if res.is_err() {
            // Patterns are validated on construction; keep the raw pattern if
            // chrono still refuses to render.
            return self.pattern.clone();
        }
        out
    }
}

/// Output file rotation policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationPolicy {
    template: TimeFormat,
}

impl RotationPolicy {
    /// Create a policy from a file-name template such as `output-%Y%m%d.csv`.
    pub fn new(template: impl Into<String>, basis: TimeBasis) -> Result<Self, ConfigError> {
        Ok(Self {
            template: TimeFormat::new(template, basis)?,
        })
    }

    /// Daily files named `output-YYYYMMDD.csv`.
    pub fn daily() -> Self {
        Self {
            template: TimeFormat {
                pattern: "output-%Y%m%d.csv".to_string(),
                basis: TimeBasis::Local,
            },
        }
    }

    pub fn template(&self) -> &str {
        self.template.pattern()
    }

    /// Path of the file that is active at `at`.
    pub fn resolve_target(&self, at: &DateTime<Utc>) -> PathBuf {
        PathBuf::from(self.template.render(at))
    }
}

impl Default for RotationPolicy {
    fn default() -> Self {
        Self::daily()
    }
}
