// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Ingestion pipeline
//!
//! Composition root between a [`MessageSource`] and one [`SinkWriter`]. Each
//! message runs decompose, classify, assemble and write to completion before
//! the next one is pulled.

use crate::error::{IngestError, SourceError};
use crate::message::{classify, InboundMessage};
use crate::record::SinkRecord;
use crate::sink::SinkWriter;
use crate::source::MessageSource;
use crate::topic::TopicLayout;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Default wait per source poll, bounding shutdown latency.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Pipeline statistics.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PipelineStats {
    /// Messages pulled from the source.
    pub received: u64,
    /// Records persisted by the sink.
    pub written: u64,
    /// Dropped: too few topic segments.
    pub malformed: u64,
    /// Dropped: non-numeric payload in strict mode.
    pub non_numeric: u64,
    /// Dropped: sink write failed.
    pub write_errors: u64,
}

/// Handle to stop a running pipeline from another thread.
#[derive(Clone, Default)]
pub struct StopHandle {
    stopped: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request shutdown. The run loop exits after the current message.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

/// Pipeline owning the configured sink.
pub struct IngestionPipeline {
    layout: TopicLayout,
    require_numeric: bool,
    poll_interval: Duration,
    sink: Box<dyn SinkWriter>,
    stats: PipelineStats,
    closed: bool,
}

impl IngestionPipeline {
    /// `layout` names the topic positions the sink turns into tags.
    pub fn new(sink: Box<dyn SinkWriter>, layout: TopicLayout) -> Self {
        Self {
            layout,
            require_numeric: false,
            poll_interval: DEFAULT_POLL_INTERVAL,
            sink,
            stats: PipelineStats::default(),
            closed: false,
        }
    }

    /// Drop messages whose payload is not a number.
    pub fn with_require_numeric(mut self, require_numeric: bool) -> Self {
        self.require_numeric = require_numeric;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn stats(&self) -> &PipelineStats {
        &self.stats
    }

    pub fn sink_name(&self) -> &'static str {
        self.sink.name()
    }

    /// Process one message, returning why it was dropped.
    ///
    /// Does not touch the statistics.
    pub fn on_message(&mut self, message: InboundMessage) -> Result<(), IngestError> {
        let tags = self.layout.decompose(&message.topic)?;
        let value = classify(&message.payload);

        if self.require_numeric && !value.is_numeric() {
            let payload = message.payload_text();
            return Err(IngestError::NonNumeric {
                topic: message.topic,
                payload,
            });
        }

        let record = SinkRecord::assemble(&message, tags, value);
        self.sink.write(&record)?;
        Ok(())
    }

    /// Process one message, containing any failure.
    ///
    /// Returns `true` if the record was written.
    pub fn handle(&mut self, message: InboundMessage) -> bool {
        self.stats.received += 1;

        match self.on_message(message) {
            Ok(()) => {
                self.stats.written += 1;
                true
            }
            Err(e @ IngestError::MalformedTopic { .. }) => {
                self.stats.malformed += 1;
                tracing::warn!(error = %e, "Dropping message");
                false
            }
            Err(e @ IngestError::NonNumeric { .. }) => {
                self.stats.non_numeric += 1;
                tracing::warn!(error = %e, "Dropping message");
                false
            }
            Err(IngestError::Sink(e)) => {
                self.stats.write_errors += 1;
                tracing::error!(sink = self.sink.name(), error = %e, "Write failed, message dropped");
                false
            }
        }
    }

    /// Pull from `source` until `stop` is triggered or the source ends.
    ///
    /// The source is closed on the way out. The sink stays open until
    /// [`close`](Self::close) or drop.
    pub fn run<S: MessageSource + ?Sized>(&mut self, source: &mut S, stop: &StopHandle) {
        tracing::info!(sink = self.sink.name(), "Starting ingestion");

        while !stop.is_stopped() {
            match source.poll(self.poll_interval) {
                Ok(Some(message)) => {
                    self.handle(message);
                }
                Ok(None) => {}
                Err(SourceError::Closed) => {
                    tracing::info!("Message source closed");
                    break;
                }
            }
        }

        source.close();
        tracing::info!(
            received = self.stats.received,
            written = self.stats.written,
            "Ingestion stopped"
        );
    }

    /// Release the sink. Subsequent calls do nothing.
    pub fn close(&mut self) {
        if std::mem::replace(&mut self.closed, true) {
            return;
        }
        match self.sink.close() {
            Ok(()) => tracing::debug!(sink = self.sink.name(), "Sink closed"),
            Err(e) => tracing::warn!(sink = self.sink.name(), error = %e, "Failed to close sink"),
        }
    }
}

impl Drop for IngestionPipeline {
    fn drop(&mut self) {
        self.close();
    }
}
