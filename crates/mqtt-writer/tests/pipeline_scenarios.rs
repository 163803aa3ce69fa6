// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! End-to-end ingestion through each sink
//!
//! Messages enter through a `ChannelSource`; the file and SQLite sinks write
//! to a temp directory and the InfluxDB sink posts to a local HTTP stub.

mod common;

use chrono::{DateTime, TimeZone, Utc};
use common::{run_messages, HttpStub};
use mqtt_writer::{
    FileSinkConfig, InboundMessage, InfluxApi, InfluxSinkConfig, SinkConfig, SqlBackend,
    SqlSinkConfig, SqlTemplates, SqliteStore, TimeBasis, WriterConfig,
};

fn at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 15, 8, 30, 0).unwrap()
}

fn file_config(dir: &std::path::Path) -> WriterConfig {
    WriterConfig::new(SinkConfig::File(FileSinkConfig {
        output: dir.join("output-%Y%m%d.csv").to_string_lossy().into_owned(),
        time_basis: TimeBasis::Utc,
        ..Default::default()
    }))
}

fn influx_config(stub: &HttpStub) -> InfluxSinkConfig {
    InfluxSinkConfig {
        url: stub.url(),
        timeout_secs: 2,
        ..Default::default()
    }
}

#[test]
fn test_scenario_a_numeric_payload_to_new_file() {
    let dir = tempfile::tempdir().unwrap();
    let mut pipeline = file_config(dir.path()).build_pipeline().unwrap();

    run_messages(
        &mut pipeline,
        vec![InboundMessage::received("/#", "23.5", at())],
    );
    pipeline.close();

    let content = std::fs::read_to_string(dir.path().join("output-20240115.csv")).unwrap();
    assert_eq!(
        content,
        "timestamp;topic;payload\n2024-01-15T08:30:00;/#;23.5\n"
    );
    assert_eq!(pipeline.stats().written, 1);
}

#[test]
fn test_file_sink_rotates_across_days_with_one_header_each() {
    let dir = tempfile::tempdir().unwrap();
    let mut pipeline = file_config(dir.path()).build_pipeline().unwrap();
    let next_day = Utc.with_ymd_and_hms(2024, 1, 16, 0, 0, 1).unwrap();

    run_messages(
        &mut pipeline,
        vec![
            InboundMessage::received("/room/temp", "20", at()),
            InboundMessage::received("/door", "open", at()),
            InboundMessage::received("/room/temp", "19.5", next_day),
        ],
    );
    pipeline.close();

    let first = std::fs::read_to_string(dir.path().join("output-20240115.csv")).unwrap();
    let second = std::fs::read_to_string(dir.path().join("output-20240116.csv")).unwrap();

    assert_eq!(
        first.lines().collect::<Vec<_>>(),
        vec![
            "timestamp;topic;payload",
            "2024-01-15T08:30:00;/room/temp;20.0",
            "2024-01-15T08:30:00;/door;open",
        ]
    );
    assert_eq!(
        second.lines().collect::<Vec<_>>(),
        vec!["timestamp;topic;payload", "2024-01-16T00:00:01;/room/temp;19.5"]
    );
}

#[test]
fn test_strict_numeric_file_sink_drops_text() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = file_config(dir.path());
    config.pipeline.require_numeric = true;
    let mut pipeline = config.build_pipeline().unwrap();

    run_messages(
        &mut pipeline,
        vec![
            InboundMessage::received("/door", "open", at()),
            InboundMessage::received("/temp", "4", at()),
        ],
    );
    pipeline.close();

    let content = std::fs::read_to_string(dir.path().join("output-20240115.csv")).unwrap();
    assert_eq!(content.lines().count(), 2);
    assert_eq!(pipeline.stats().non_numeric, 1);
    assert_eq!(pipeline.stats().written, 1);
}

#[test]
fn test_scenario_b_tagged_point_to_influx() {
    let stub = HttpStub::start(204);
    let config = WriterConfig::new(SinkConfig::Influx(influx_config(&stub)));
    let mut pipeline = config.build_pipeline().unwrap();

    run_messages(
        &mut pipeline,
        vec![InboundMessage::received("/sensors/room1/temp", "21.0", at())],
    );

    let writes = stub.writes();
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].method, "POST");
    assert!(writes[0].target.starts_with("/write?"));
    assert!(writes[0].target.contains("db=mqtt"));
    assert!(writes[0].target.contains("precision=ns"));

    let ns = at().timestamp_nanos_opt().unwrap();
    assert_eq!(
        writes[0].body,
        format!("mqtt,group=sensors,node=room1,type=temp value=21 {}", ns)
    );
}

#[test]
fn test_influx_contains_malformed_and_rejected_messages() {
    let stub = HttpStub::start(400);
    let config = WriterConfig::new(SinkConfig::Influx(influx_config(&stub)));
    let mut pipeline = config.build_pipeline().unwrap();

    run_messages(
        &mut pipeline,
        vec![
            InboundMessage::received("/short", "1", at()),
            InboundMessage::received("/a/b/c", "1", at()),
            InboundMessage::received("/a/b/c", "on", at()),
        ],
    );

    let stats = pipeline.stats();
    assert_eq!(stats.received, 3);
    assert_eq!(stats.malformed, 1);
    // Rejected by the store, and refused locally for lack of a field.
    assert_eq!(stats.write_errors, 2);
    assert_eq!(stub.writes().len(), 1);
}

#[test]
fn test_influx_v2_write_uses_token() {
    let stub = HttpStub::start(204);
    let config = WriterConfig::new(SinkConfig::Influx(InfluxSinkConfig {
        api: InfluxApi::V2,
        org: "acme".into(),
        bucket: "iot".into(),
        token: "secret".into(),
        store_text: true,
        ..influx_config(&stub)
    }));
    config.validate().unwrap();
    let mut pipeline = config.build_pipeline().unwrap();

    run_messages(
        &mut pipeline,
        vec![InboundMessage::received("/a/b/c", "on", at())],
    );

    let writes = stub.writes();
    assert_eq!(writes.len(), 1);
    assert!(writes[0].target.starts_with("/api/v2/write?"));
    assert!(writes[0].target.contains("bucket=iot"));
    assert_eq!(writes[0].header("authorization"), Some("Token secret"));
    assert!(writes[0].body.starts_with("mqtt,group=a,node=b,type=c text=\"on\" "));
}

#[test]
fn test_scenario_c_text_payload_to_sqlite() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("mqtt.db").to_string_lossy().into_owned();

    let config = WriterConfig::new(SinkConfig::Sql(SqlSinkConfig {
        backend: SqlBackend::Sqlite,
        url: db.clone(),
        ..Default::default()
    }));
    let mut pipeline = config.build_pipeline().unwrap();

    run_messages(
        &mut pipeline,
        vec![
            InboundMessage::received("sensors/a", "hello", at()),
            InboundMessage::received("sensors/a", "7", at()),
        ],
    );
    drop(pipeline);

    let store = SqliteStore::new(&db, SqlTemplates::default()).unwrap();
    assert_eq!(store.topic_count().unwrap(), 1);

    let facts = store.facts().unwrap();
    assert_eq!(facts.len(), 2);
    assert_eq!(facts[0].topic, "sensors/a");
    assert_eq!(facts[0].value, None);
    assert_eq!(facts[0].payload.as_deref(), Some("hello"));
    assert_eq!(facts[1].value, Some(7.0));
    assert_eq!(facts[1].payload, None);
}

#[test]
fn test_unreachable_stores_fail_at_startup() {
    let influx = WriterConfig::new(SinkConfig::Influx(InfluxSinkConfig {
        url: "http://127.0.0.1:9".into(),
        timeout_secs: 1,
        ..Default::default()
    }));
    assert!(influx.build_pipeline().is_err());

    let dir = tempfile::tempdir().unwrap();
    let sqlite = WriterConfig::new(SinkConfig::Sql(SqlSinkConfig {
        backend: SqlBackend::Sqlite,
        url: dir
            .path()
            .join("missing")
            .join("mqtt.db")
            .to_string_lossy()
            .into_owned(),
        ..Default::default()
    }));
    assert!(sqlite.build_pipeline().is_err());
}
