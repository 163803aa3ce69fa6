// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! PostgreSQL relational backend.
//!
//! The value column must be `DOUBLE PRECISION` and the payload column `TEXT`
//! (see [`crate::sink::relational`] for the default schema).

use super::relational::{RelationalStore, SqlTemplates, TopicRegistration};
use crate::error::{ConnectError, StoreError};
use postgres::error::SqlState;
use postgres::{Client, NoTls, Statement};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS topic (
        id SERIAL PRIMARY KEY,
        name TEXT NOT NULL UNIQUE
    );
    CREATE TABLE IF NOT EXISTS payload (
        id SERIAL PRIMARY KEY,
        topic_id INTEGER NOT NULL REFERENCES topic(id),
        value DOUBLE PRECISION,
        payload TEXT,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    );
    CREATE INDEX IF NOT EXISTS idx_payload_topic ON payload(topic_id);
";

/// PostgreSQL store with statements prepared at connect time.
pub struct PostgresStore {
    client: Client,
    insert_topic: Statement,
    insert_fact: Statement,
}

impl PostgresStore {
    /// Connect, optionally create the default tables, and prepare both
    /// statements.
    ///
    /// `url` accepts both URL (`postgres://user@host/db`) and key-value
    /// (`host=... user=...`) forms.
    pub fn connect(
        url: &str,
        templates: &SqlTemplates,
        init_schema: bool,
    ) -> Result<Self, ConnectError> {
        let mut client = Client::connect(url, NoTls).map_err(|e| {
            ConnectError::Relational(format!("unable to connect to database ({}): {}", url, e))
        })?;

        let version: String = client
            .query_one("SELECT version()", &[])
            .and_then(|row| row.try_get(0))
            .map_err(|e| ConnectError::Relational(e.to_string()))?;
        tracing::info!(version = %version, "Connected to PostgreSQL database");

        if init_schema {
            client
                .batch_execute(SCHEMA)
                .map_err(|e| ConnectError::Relational(format!("schema setup failed: {}", e)))?;
        }

        let mut prepare = |sql: &str| {
            client.prepare(sql).map_err(|e| {
                ConnectError::Relational(format!("sql statement error in `{}`: {}", sql, e))
            })
        };
        let insert_topic = prepare(templates.insert_topic.as_str())?;
        let insert_fact = prepare(templates.insert_fact.as_str())?;

        Ok(Self {
            client,
            insert_topic,
            insert_fact,
        })
    }
}

fn is_unique_violation(err: &postgres::Error) -> bool {
    err.code() == Some(&SqlState::UNIQUE_VIOLATION)
}

impl RelationalStore for PostgresStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    fn register_topic(&mut self, topic: &str) -> Result<TopicRegistration, StoreError> {
        match self.client.execute(&self.insert_topic, &[&topic]) {
            Ok(_) => Ok(TopicRegistration::Created),
            Err(e) if is_unique_violation(&e) => Ok(TopicRegistration::AlreadyRegistered),
            Err(e) => Err(e.into()),
        }
    }

    fn insert_fact(
        &mut self,
        topic: &str,
        value: Option<f64>,
        text: Option<&str>,
    ) -> Result<(), StoreError> {
        self.client
            .execute(&self.insert_fact, &[&topic, &value, &text])?;
        Ok(())
    }
}
