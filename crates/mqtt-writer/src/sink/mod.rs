// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Sink writers.
//!
//! Every sink owns its physical handle and follows the same lifecycle:
//!
//! ```text
//! Unconnected --open--> Connected --write--> Writing --> Connected
//!                           |
//!                         close
//! ```
//!
//! Opening failures are fatal to the caller. A failed write leaves the sink
//! connected and ready for the next record.

pub mod file;
pub mod influx;
pub mod pg;
pub mod relational;
pub mod sqlite;

pub use file::{FileSink, FileSinkOptions};
pub use influx::{InfluxClient, InfluxTarget, LineProtocolWriter, PointTransport, TimeSeriesSink};
pub use pg::PostgresStore;
pub use relational::{RelationalSink, RelationalStore, SqlTemplates, TopicRegistration};
pub use sqlite::SqliteStore;

use crate::error::SinkError;
use crate::record::SinkRecord;

/// A connected persistent destination.
pub trait SinkWriter {
    /// Short sink name for logs.
    fn name(&self) -> &'static str;

    /// Persist one record.
    fn write(&mut self, record: &SinkRecord) -> Result<(), SinkError>;

    /// Release the underlying handle. Called once at shutdown.
    fn close(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

impl<W: SinkWriter + ?Sized> SinkWriter for Box<W> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn write(&mut self, record: &SinkRecord) -> Result<(), SinkError> {
        (**self).write(record)
    }

    fn close(&mut self) -> Result<(), SinkError> {
        (**self).close()
    }
}
