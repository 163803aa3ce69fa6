// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error kinds for the writer.
//!
//! Startup failures (`ConnectError`, `ConfigError`) are fatal. Everything a
//! single message can trigger (`IngestError`, `SinkError`) is contained by the
//! pipeline and never stops ingestion.

use std::path::PathBuf;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Resource acquisition failure at startup.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("broker {host}:{port} unreachable: {reason}")]
    Broker {
        host: String,
        port: u16,
        reason: String,
    },

    #[error("time-series store {url} unreachable: {reason}")]
    TimeSeries { url: String, reason: String },

    #[error("relational store connection failed: {0}")]
    Relational(String),

    #[error("failed to create output directory {path}: {source}")]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Anything that prevents the writer from starting.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Connect(#[from] ConnectError),
}

/// Failure writing one record to its physical target.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("time-series request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("time-series store rejected write ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("record for `{0}` carries no field the store can hold")]
    NoFields(String),

    #[error("topic registration failed for `{topic}`: {source}")]
    TopicUpsert {
        topic: String,
        #[source]
        source: StoreError,
    },

    #[error("fact insert failed for `{topic}`: {source}")]
    FactInsert {
        topic: String,
        #[source]
        source: StoreError,
    },
}

/// Relational backend failure other than the expected duplicate topic.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("postgres: {0}")]
    Postgres(#[from] postgres::Error),
}

/// Per-message pipeline failure.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("topic `{topic}` has {found} segments, layout needs {required}")]
    MalformedTopic {
        topic: String,
        required: usize,
        found: usize,
    },

    #[error("payload on `{topic}` is not numeric: {payload:?}")]
    NonNumeric { topic: String, payload: String },

    #[error(transparent)]
    Sink(#[from] SinkError),
}

/// The broker collaborator can no longer deliver messages.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("message source closed")]
    Closed,
}
