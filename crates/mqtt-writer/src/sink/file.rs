// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Rotating delimited-text file sink.
//!
//! Records are appended as one line each to the file named by the rotation
//! template. The sink keeps the active path and compares it on every record;
//! a different path closes the current handle and opens the next file,
//! writing the header first if that file is empty. When the record opening a
//! file is a flattened JSON object, the header names its keys instead.

use super::SinkWriter;
use crate::error::SinkError;
use crate::record::SinkRecord;
use crate::rotation::{RotationPolicy, TimeBasis, TimeFormat};
use crate::template::{LineTemplate, LineValues};
use std::borrow::Cow;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// File sink settings.
#[derive(Debug, Clone)]
pub struct FileSinkOptions {
    /// Output file name template.
    pub rotation: RotationPolicy,
    /// Per-record line format.
    pub line: LineTemplate,
    /// Header written once at the top of each new file.
    pub header: Option<String>,
    /// Format of the `{timestamp}` placeholder.
    pub timestamp: TimeFormat,
    /// Column delimiter used when flattening JSON payloads.
    pub delimiter: String,
    /// Topics ending with this suffix carry JSON object payloads.
    pub json_suffix: Option<String>,
}

impl Default for FileSinkOptions {
    fn default() -> Self {
        Self {
            rotation: RotationPolicy::default(),
            line: LineTemplate::default(),
            header: Some("timestamp;topic;payload".to_string()),
            timestamp: TimeFormat::iso8601(TimeBasis::Local),
            delimiter: ";".to_string(),
            json_suffix: Some("/json".to_string()),
        }
    }
}

struct FlattenedJson {
    keys: String,
    values: String,
}

fn escape_line_breaks(s: &str) -> Cow<'_, str> {
    if s.contains(['\r', '\n']) {
        Cow::Owned(s.replace('\r', "\\r").replace('\n', "\\n"))
    } else {
        Cow::Borrowed(s)
    }
}

struct ActiveFile {
    path: PathBuf,
    writer: BufWriter<File>,
}

/// Rotating file sink.
pub struct FileSink {
    options: FileSinkOptions,
    active: Option<ActiveFile>,
    files_opened: u64,
}

impl FileSink {
    /// Create the sink. No file is touched until the first record.
    pub fn new(options: FileSinkOptions) -> Self {
        Self {
            options,
            active: None,
            files_opened: 0,
        }
    }

    pub fn options(&self) -> &FileSinkOptions {
        &self.options
    }

    /// Path of the file currently held open.
    pub fn active_path(&self) -> Option<&Path> {
        self.active.as_ref().map(|a| a.path.as_path())
    }

    /// Number of files opened so far (initial file plus rotations).
    pub fn files_opened(&self) -> u64 {
        self.files_opened
    }

    /// Render the output line for `record` (without terminator).
    ///
    /// Line breaks inside the topic or payload are written as the literal
    /// text `\n` and `\r`, so every record stays on one line.
    pub fn render_line(&self, record: &SinkRecord) -> String {
        let payload = match self.flatten_json(record) {
            Some(json) => json.values,
            None => record.payload_string(),
        };
        self.render_with_payload(record, &payload)
    }

    fn render_with_payload(&self, record: &SinkRecord, payload: &str) -> String {
        let timestamp = self.options.timestamp.render(&record.timestamp);
        self.options.line.render(&LineValues {
            timestamp: &timestamp,
            topic: &escape_line_breaks(&record.topic),
            payload: &escape_line_breaks(payload),
        })
    }

    /// Header for a new file. A JSON record names its own columns.
    fn header_for(&self, json: Option<&FlattenedJson>) -> Option<String> {
        let header = self.options.header.as_deref()?;
        let Some(json) = json else {
            return Some(header.trim_end_matches(['\r', '\n']).to_string());
        };
        Some(self.options.line.render(&LineValues {
            timestamp: "timestamp",
            topic: "topic",
            payload: &escape_line_breaks(&json.keys),
        }))
    }

    fn flatten_json(&self, record: &SinkRecord) -> Option<FlattenedJson> {
        let suffix = self.options.json_suffix.as_deref()?;
        if !record.topic.ends_with(suffix) {
            return None;
        }
        let text = record.text()?;
        let serde_json::Value::Object(map) = serde_json::from_str::<serde_json::Value>(text).ok()? else {
            return None;
        };

        let keys: Vec<&str> = map.keys().map(String::as_str).collect();
        let values: Vec<String> = map
            .values()
            .map(|v| match v {
                serde_json::Value::String(s) => s.clone(),
                serde_json::Value::Null => String::new(),
                other => other.to_string(),
            })
            .collect();
        Some(FlattenedJson {
            keys: keys.join(&self.options.delimiter),
            values: values.join(&self.options.delimiter),
        })
    }

    fn open_target(&mut self, path: &Path, header: Option<String>) -> Result<ActiveFile, SinkError> {
        let io_err = |source| SinkError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(io_err)?;
        let is_new = file.metadata().map_err(io_err)?.len() == 0;

        let mut writer = BufWriter::new(file);
        if is_new {
            if let Some(header) = header {
                writeln!(writer, "{}", header).map_err(io_err)?;
                writer.flush().map_err(io_err)?;
            }
        }

        self.files_opened += 1;
        tracing::info!(path = %path.display(), new = is_new, "Opened output file");

        Ok(ActiveFile {
            path: path.to_path_buf(),
            writer,
        })
    }

    fn release_active(&mut self) -> Result<(), SinkError> {
        if let Some(mut old) = self.active.take() {
            old.writer.flush().map_err(|source| SinkError::Io {
                path: old.path.clone(),
                source,
            })?;
            tracing::debug!(path = %old.path.display(), "Closed output file");
        }
        Ok(())
    }
}

impl SinkWriter for FileSink {
    fn name(&self) -> &'static str {
        "file"
    }

    fn write(&mut self, record: &SinkRecord) -> Result<(), SinkError> {
        let target = self.options.rotation.resolve_target(&record.timestamp);
        let json = self.flatten_json(record);

        if self.active_path() != Some(target.as_path()) {
            // The next file is opened before the current one is released so
            // a failed open leaves the previous handle untouched.
            let header = self.header_for(json.as_ref());
            let next = self.open_target(&target, header)?;
            if let Err(e) = self.release_active() {
                tracing::warn!(error = %e, "Failed to flush previous output file");
            }
            self.active = Some(next);
        }

        let line = match json {
            Some(json) => self.render_with_payload(record, &json.values),
            None => self.render_with_payload(record, &record.payload_string()),
        };
        let Some(active) = self.active.as_mut() else {
            return Ok(());
        };

        let result = writeln!(active.writer, "{}", line).and_then(|_| active.writer.flush());
        if let Err(source) = result {
            let path = active.path.clone();
            if let Some(failed) = self.active.take() {
                // Discard the partial line instead of letting drop flush it.
                let (_file, _unwritten) = failed.writer.into_parts();
            }
            return Err(SinkError::Io { path, source });
        }

        tracing::debug!(path = %target.display(), "{}", line);
        Ok(())
    }

    fn close(&mut self) -> Result<(), SinkError> {
        self.release_active()
    }
}
