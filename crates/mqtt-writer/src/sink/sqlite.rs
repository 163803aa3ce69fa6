// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! SQLite relational backend
//!
//! Embedded storage for single-host deployments and tests.
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE topic (
//!     id INTEGER PRIMARY KEY AUTOINCREMENT,
//!     name TEXT NOT NULL UNIQUE
//! );
//! CREATE TABLE payload (
//!     id INTEGER PRIMARY KEY AUTOINCREMENT,
//!     topic_id INTEGER NOT NULL REFERENCES topic(id),
//!     value REAL,
//!     payload TEXT,
//!     created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
//! );
//! ```

use super::relational::{RelationalStore, SqlTemplates, TopicRegistration};
use crate::error::{ConnectError, StoreError};
use rusqlite::{ffi, params, Connection, ErrorCode};

/// One fact row joined with its topic name.
#[derive(Debug, Clone, PartialEq)]
pub struct FactRow {
    pub topic: String,
    pub value: Option<f64>,
    pub payload: Option<String>,
}

/// SQLite store
///
/// Statements are compiled once at open and reused through the connection's
/// statement cache.
pub struct SqliteStore {
    conn: Connection,
    templates: SqlTemplates,
}

impl SqliteStore {
    /// Open (or create) a file-based database
    pub fn new(path: &str, templates: SqlTemplates) -> Result<Self, ConnectError> {
        let conn = Connection::open(path).map_err(|e| {
            ConnectError::Relational(format!("failed to open SQLite database at {}: {}", path, e))
        })?;
        Self::with_connection(conn, templates)
    }

    /// Create an in-memory database (for testing)
    pub fn new_in_memory(templates: SqlTemplates) -> Result<Self, ConnectError> {
        let conn = Connection::open_in_memory().map_err(|e| {
            ConnectError::Relational(format!("failed to create in-memory SQLite database: {}", e))
        })?;
        Self::with_connection(conn, templates)
    }

    fn with_connection(conn: Connection, templates: SqlTemplates) -> Result<Self, ConnectError> {
        let store = Self { conn, templates };
        store
            .init_schema()
            .map_err(|e| ConnectError::Relational(format!("schema setup failed: {}", e)))?;

        for sql in [&store.templates.insert_topic, &store.templates.insert_fact] {
            store.conn.prepare_cached(sql).map_err(|e| {
                ConnectError::Relational(format!("sql statement error in `{}`: {}", sql, e))
            })?;
        }

        let version: String = store
            .conn
            .query_row("SELECT sqlite_version()", [], |row| row.get(0))
            .map_err(|e| ConnectError::Relational(e.to_string()))?;
        tracing::info!(version = %version, "Connected to SQLite database");

        Ok(store)
    }

    /// Initialize the default tables
    fn init_schema(&self) -> rusqlite::Result<()> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS topic (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE
            );
            CREATE TABLE IF NOT EXISTS payload (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                topic_id INTEGER NOT NULL REFERENCES topic(id),
                value REAL,
                payload TEXT,
                created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE INDEX IF NOT EXISTS idx_payload_topic ON payload(topic_id);",
        )
    }

    /// Number of rows in the topic table.
    pub fn topic_count(&self) -> Result<usize, StoreError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM topic", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// All fact rows in insertion order (default schema).
    pub fn facts(&self) -> Result<Vec<FactRow>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT t.name, p.value, p.payload
             FROM payload p JOIN topic t ON t.id = p.topic_id
             ORDER BY p.id ASC",
        )?;

        let rows = stmt
            .query_map([], |row| {
                Ok(FactRow {
                    topic: row.get(0)?,
                    value: row.get(1)?,
                    payload: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(e, _) => {
            e.code == ErrorCode::ConstraintViolation
                && (e.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
                    || e.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY)
        }
        _ => false,
    }
}

impl RelationalStore for SqliteStore {
    fn backend(&self) -> &'static str {
        "sqlite"
    }

    fn register_topic(&mut self, topic: &str) -> Result<TopicRegistration, StoreError> {
        let mut stmt = self.conn.prepare_cached(&self.templates.insert_topic)?;
        match stmt.execute(params![topic]) {
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
        let mut stmt = self.conn.prepare_cached(&self.templates.insert_fact)?;
        stmt.execute(params![topic, value, text])?;
        Ok(())
    }
}
