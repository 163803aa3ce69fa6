// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Relational sink: topic dimension plus fact rows.
//!
//! Each record is written in two non-transactional steps:
//!
//! 1. Register the topic in the dimension table. A uniqueness violation means
//!    the topic already exists and counts as success.
//! 2. Insert a fact row referencing the topic, with the numeric value or the
//!    text payload (the other column is NULL).
//!
//! # Default schema
//!
//! ```sql
//! CREATE TABLE topic (
//!     id      SERIAL PRIMARY KEY,
//!     name    TEXT NOT NULL UNIQUE
//! );
//! CREATE TABLE payload (
//!     id          SERIAL PRIMARY KEY,
//!     topic_id    INTEGER NOT NULL REFERENCES topic(id),
//!     value       DOUBLE PRECISION,
//!     payload     TEXT,
//!     created_at  TIMESTAMPTZ NOT NULL DEFAULT now()
//! );
//! ```

use super::SinkWriter;
use crate::error::{SinkError, StoreError};
use crate::record::SinkRecord;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Parameterized statements. `$1` is the topic name in both; the fact
/// statement also takes `$2` (numeric value) and `$3` (text payload).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqlTemplates {
    #[serde(default = "default_insert_topic")]
    pub insert_topic: String,
    #[serde(default = "default_insert_fact")]
    pub insert_fact: String,
}

fn default_insert_topic() -> String {
    "INSERT INTO topic (name) VALUES ($1)".to_string()
}

fn default_insert_fact() -> String {
    "INSERT INTO payload (topic_id,value,payload) \
     VALUES ((SELECT id FROM topic WHERE name=$1), $2, $3)"
        .to_string()
}

impl Default for SqlTemplates {
    fn default() -> Self {
        Self {
            insert_topic: default_insert_topic(),
            insert_fact: default_insert_fact(),
        }
    }
}

/// Outcome of registering a topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicRegistration {
    /// A new dimension row was inserted.
    Created,
    /// The topic was already present (uniqueness violation).
    AlreadyRegistered,
}

/// Backend executing the two statements.
///
/// Implementations prepare their statements once and report a uniqueness
/// violation on topic insert as `AlreadyRegistered`, never as an error.
pub trait RelationalStore {
    /// Backend name for logs.
    fn backend(&self) -> &'static str;

    /// Step 1: insert the topic into the dimension table.
    fn register_topic(&mut self, topic: &str) -> Result<TopicRegistration, StoreError>;

    /// Step 2: insert a fact row for `topic`.
    fn insert_fact(
        &mut self,
        topic: &str,
        value: Option<f64>,
        text: Option<&str>,
    ) -> Result<(), StoreError>;
}

/// Relational sink over any [`RelationalStore`].
pub struct RelationalSink<S: RelationalStore> {
    store: S,
    /// Topics known to exist in the dimension table.
    known_topics: HashSet<String>,
}

impl<S: RelationalStore> RelationalSink<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            known_topics: HashSet::new(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Number of topics registered or found during this process lifetime.
    pub fn known_topics(&self) -> usize {
        self.known_topics.len()
    }

    fn ensure_topic(&mut self, topic: &str) -> Result<(), SinkError> {
        if self.known_topics.contains(topic) {
            return Ok(());
        }

        match self.store.register_topic(topic) {
            Ok(TopicRegistration::Created) => {
                tracing::info!(topic = %topic, "Inserted new topic");
            }
            Ok(TopicRegistration::AlreadyRegistered) => {
                tracing::debug!(topic = %topic, "Topic already registered in database");
            }
            Err(source) => {
                return Err(SinkError::TopicUpsert {
                    topic: topic.to_string(),
                    source,
                })
            }
        }

        self.known_topics.insert(topic.to_string());
        Ok(())
    }
}

impl<S: RelationalStore> SinkWriter for RelationalSink<S> {
    fn name(&self) -> &'static str {
        self.store.backend()
    }

    fn write(&mut self, record: &SinkRecord) -> Result<(), SinkError> {
        self.ensure_topic(&record.topic)?;

        self.store
            .insert_fact(&record.topic, record.numeric(), record.text())
            .map_err(|source| SinkError::FactInsert {
                topic: record.topic.clone(),
                source,
            })?;

        tracing::debug!(topic = %record.topic, "Inserted values");
        Ok(())
    }
}
