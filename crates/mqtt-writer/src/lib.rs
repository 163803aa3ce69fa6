// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! MQTT Writer
//!
//! Subscribes to an MQTT broker and persists every message into one sink.
//!
//! # Sinks
//!
//! - **File** -- delimited text lines in strftime-named, rotating files
//! - **InfluxDB** -- one Line Protocol point per message, tags from the topic
//! - **SQL** -- topic dimension plus fact rows (PostgreSQL or SQLite)
//!
//! # Architecture
//!
//! ```text
//! MessageSource (MQTT or channel)
//! +-- IngestionPipeline
//!     +-- TopicLayout::decompose   (topic -> tags)
//!     +-- classify                 (payload -> number or text)
//!     +-- SinkRecord::assemble
//!     +-- SinkWriter::write        (file, influx, sql)
//! ```
//!
//! A message that cannot be written is logged and dropped; ingestion goes on.
//!
//! # Example
//!
//! ```ignore
//! use mqtt_writer::{SinkConfig, FileSinkConfig, WriterConfig, MqttSource, StopHandle};
//!
//! let config = WriterConfig::new(SinkConfig::File(FileSinkConfig::default()));
//! let mut pipeline = config.build_pipeline()?;
//! let mut source = MqttSource::connect(&config.broker)?;
//! pipeline.run(&mut source, &StopHandle::new());
//! ```

pub mod config;
pub mod error;
pub mod message;
pub mod pipeline;
pub mod record;
pub mod rotation;
pub mod sink;
pub mod source;
pub mod template;
pub mod topic;

pub use config::{
    BrokerConfig, FileSinkConfig, InfluxApi, InfluxSinkConfig, PipelineConfig, SinkConfig,
    SqlBackend, SqlSinkConfig, WriterConfig,
};
pub use error::{
    ConfigError, ConnectError, IngestError, SinkError, SourceError, StartupError, StoreError,
};
pub use message::{classify, ClassifiedValue, InboundMessage};
pub use pipeline::{IngestionPipeline, PipelineStats, StopHandle};
pub use record::{FieldValue, SinkRecord};
pub use rotation::{RotationPolicy, TimeBasis, TimeFormat};
pub use sink::{
    FileSink, FileSinkOptions, InfluxClient, InfluxTarget, PostgresStore, RelationalSink,
    RelationalStore, SinkWriter, SqlTemplates, SqliteStore, TimeSeriesSink,
};
pub use source::{ChannelSource, MessageSource, MqttSource};
pub use template::{LineTemplate, LineValues};
pub use topic::{TopicLayout, TopicTags};
