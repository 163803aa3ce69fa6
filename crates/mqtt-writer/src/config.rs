// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Writer configuration.
//!
//! Built from command-line arguments or loaded from a TOML file:
//!
//! ```toml
//! [broker]
//! host = "localhost"
//! topic_filter = "/#"
//!
//! [pipeline]
//! require_numeric = false
//!
//! [sink]
//! type = "influx"
//! url = "http://127.0.0.1:8086"
//! database = "mqtt"
//! tags = ["group", "node", "type"]
//! ```

use crate::error::{ConfigError, ConnectError, StartupError};
use crate::pipeline::IngestionPipeline;
use crate::rotation::{RotationPolicy, TimeBasis, TimeFormat};
use crate::sink::{
    FileSink, FileSinkOptions, InfluxClient, InfluxTarget, PostgresStore, RelationalSink,
    SinkWriter, SqlTemplates, SqliteStore, TimeSeriesSink,
};
use crate::template::LineTemplate;
use crate::topic::TopicLayout;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Complete writer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriterConfig {
    #[serde(default)]
    pub broker: BrokerConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,

    pub sink: SinkConfig,
}

impl WriterConfig {
    pub fn new(sink: SinkConfig) -> Self {
        Self {
            broker: BrokerConfig::default(),
            pipeline: PipelineConfig::default(),
            sink,
        }
    }

    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.broker.topic_filter.trim().is_empty() {
            return Err(ConfigError::Invalid("Empty topic filter".into()));
        }
        if self.broker.host.is_empty() {
            return Err(ConfigError::Invalid("Empty broker host".into()));
        }

        match &self.sink {
            SinkConfig::File(file) => {
                file.options()?;
            }
            SinkConfig::Influx(influx) => {
                if influx.measurement.is_empty() {
                    return Err(ConfigError::Invalid("Empty measurement name".into()));
                }
                influx.target()?;
            }
            SinkConfig::Sql(sql) => {
                if sql.templates.insert_topic.trim().is_empty() {
                    return Err(ConfigError::Invalid("Empty topic insert statement".into()));
                }
                if sql.templates.insert_fact.trim().is_empty() {
                    return Err(ConfigError::Invalid("Empty payload insert statement".into()));
                }
                if sql.url.is_empty() {
                    return Err(ConfigError::Invalid("Empty database URL".into()));
                }
            }
        }

        Ok(())
    }

    /// Connect the sink and assemble the pipeline around it.
    pub fn build_pipeline(&self) -> Result<IngestionPipeline, StartupError> {
        let sink = self.sink.open()?;
        Ok(IngestionPipeline::new(sink, self.sink.layout())
            .with_require_numeric(self.pipeline.require_numeric))
    }
}

/// MQTT broker connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Keep-alive interval (seconds).
    #[serde(default = "default_keep_alive")]
    pub keep_alive_secs: u64,

    /// How long to wait for the broker to accept the connection (seconds).
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Subscription pattern.
    #[serde(default = "default_topic_filter")]
    pub topic_filter: String,

    #[serde(default = "default_client_id")]
    pub client_id: String,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    1883
}

fn default_keep_alive() -> u64 {
    60
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_topic_filter() -> String {
    "/#".to_string()
}

fn default_client_id() -> String {
    format!("mqtt-writer-{}", std::process::id())
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            keep_alive_secs: default_keep_alive(),
            connect_timeout_secs: default_connect_timeout(),
            topic_filter: default_topic_filter(),
            client_id: default_client_id(),
            username: None,
            password: None,
        }
    }
}

/// Per-message processing options.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Drop messages whose payload is not a number.
    #[serde(default)]
    pub require_numeric: bool,
}

/// Sink selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SinkConfig {
    File(FileSinkConfig),
    Influx(InfluxSinkConfig),
    Sql(SqlSinkConfig),
}

impl SinkConfig {
    /// Topic positions the sink turns into tags.
    pub fn layout(&self) -> TopicLayout {
        match self {
            SinkConfig::Influx(influx) => influx.tags.clone(),
            SinkConfig::File(_) | SinkConfig::Sql(_) => TopicLayout::none(),
        }
    }

    /// Acquire the sink's physical resource.
    pub fn open(&self) -> Result<Box<dyn SinkWriter>, StartupError> {
        match self {
            SinkConfig::File(file) => {
                let options = file.options()?;
                let first = options.rotation.resolve_target(&Utc::now());
                if let Some(dir) = first.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(dir).map_err(|source| ConnectError::Directory {
                        path: dir.to_path_buf(),
                        source,
                    })?;
                }
                Ok(Box::new(FileSink::new(options)))
            }
            SinkConfig::Influx(influx) => {
                let client = InfluxClient::connect(
                    &influx.url,
                    influx.target()?,
                    Duration::from_secs(influx.timeout_secs.max(1)),
                )?;
                Ok(Box::new(TimeSeriesSink::new(
                    client,
                    influx.measurement.clone(),
                    influx.store_text,
                )))
            }
            SinkConfig::Sql(sql) => match sql.backend {
                SqlBackend::Postgres => {
                    let store = PostgresStore::connect(&sql.url, &sql.templates, sql.init_schema)?;
                    Ok(Box::new(RelationalSink::new(store)))
                }
                SqlBackend::Sqlite => {
                    let store = if sql.url == ":memory:" {
                        SqliteStore::new_in_memory(sql.templates.clone())?
                    } else {
                        SqliteStore::new(&sql.url, sql.templates.clone())?
                    };
                    Ok(Box::new(RelationalSink::new(store)))
                }
            },
        }
    }
}

/// Rotating file sink settings.
///
/// An empty `header` or `json_suffix` disables the feature.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileSinkConfig {
    /// strftime-style output file name.
    #[serde(default = "default_output")]
    pub output: String,

    /// Line template with `{timestamp}`, `{topic}` and `{payload}`.
    #[serde(default = "default_line_format")]
    pub line_format: String,

    #[serde(default = "default_header")]
    pub header: String,

    #[serde(default = "default_timestamp_format")]
    pub timestamp_format: String,

    #[serde(default = "default_delimiter")]
    pub delimiter: String,

    #[serde(default = "default_json_suffix")]
    pub json_suffix: String,

    #[serde(default)]
    pub time_basis: TimeBasis,
}

fn default_output() -> String {
    "output-%Y%m%d.csv".to_string()
}

fn default_line_format() -> String {
    "{timestamp};{topic};{payload}".to_string()
}

fn default_header() -> String {
    "timestamp;topic;payload".to_string()
}

fn default_timestamp_format() -> String {
    "%Y-%m-%dT%H:%M:%S".to_string()
}

fn default_delimiter() -> String {
    ";".to_string()
}

fn default_json_suffix() -> String {
    "/json".to_string()
}

impl Default for FileSinkConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            line_format: default_line_format(),
            header: default_header(),
            timestamp_format: default_timestamp_format(),
            delimiter: default_delimiter(),
            json_suffix: default_json_suffix(),
            time_basis: TimeBasis::default(),
        }
    }
}

impl FileSinkConfig {
    /// Resolve into sink options, checking both time templates.
    pub fn options(&self) -> Result<FileSinkOptions, ConfigError> {
        let non_empty = |s: &str| (!s.is_empty()).then(|| s.to_string());

        Ok(FileSinkOptions {
            rotation: RotationPolicy::new(&self.output, self.time_basis)?,
            line: LineTemplate::parse(&self.line_format),
            header: non_empty(&self.header),
            timestamp: TimeFormat::new(&self.timestamp_format, self.time_basis)?,
            delimiter: self.delimiter.clone(),
            json_suffix: non_empty(&self.json_suffix),
        })
    }
}

/// InfluxDB API generation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InfluxApi {
    #[default]
    V1,
    V2,
}

/// Time-series sink settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InfluxSinkConfig {
    #[serde(default = "default_influx_url")]
    pub url: String,

    #[serde(default)]
    pub api: InfluxApi,

    /// v1 database.
    #[serde(default = "default_database")]
    pub database: String,

    /// v2 organization.
    #[serde(default)]
    pub org: String,

    /// v2 bucket.
    #[serde(default)]
    pub bucket: String,

    /// v2 API token.
    #[serde(default)]
    pub token: String,

    #[serde(default = "default_measurement")]
    pub measurement: String,

    /// Positional tag names.
    #[serde(default = "TopicLayout::group_node_type")]
    pub tags: TopicLayout,

    /// Write non-numeric payloads as a `text` string field.
    #[serde(default)]
    pub store_text: bool,

    /// HTTP request timeout (seconds).
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,
}

fn default_influx_url() -> String {
    "http://127.0.0.1:8086".to_string()
}

fn default_database() -> String {
    "mqtt".to_string()
}

fn default_measurement() -> String {
    "mqtt".to_string()
}

fn default_http_timeout() -> u64 {
    5
}

impl Default for InfluxSinkConfig {
    fn default() -> Self {
        Self {
            url: default_influx_url(),
            api: InfluxApi::default(),
            database: default_database(),
            org: String::new(),
            bucket: String::new(),
            token: String::new(),
            measurement: default_measurement(),
            tags: TopicLayout::group_node_type(),
            store_text: false,
            timeout_secs: default_http_timeout(),
        }
    }
}

impl InfluxSinkConfig {
    /// Addressing for the configured API generation.
    pub fn target(&self) -> Result<InfluxTarget, ConfigError> {
        match self.api {
            InfluxApi::V1 => {
                if self.database.is_empty() {
                    return Err(ConfigError::Invalid("Empty InfluxDB database".into()));
                }
                Ok(InfluxTarget::V1 {
                    database: self.database.clone(),
                })
            }
            InfluxApi::V2 => {
                for (name, value) in [
                    ("org", &self.org),
                    ("bucket", &self.bucket),
                    ("token", &self.token),
                ] {
                    if value.is_empty() {
                        return Err(ConfigError::Invalid(format!(
                            "InfluxDB v2 requires `{}`",
                            name
                        )));
                    }
                }
                Ok(InfluxTarget::V2 {
                    org: self.org.clone(),
                    bucket: self.bucket.clone(),
                    token: self.token.clone(),
                })
            }
        }
    }
}

/// Relational backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SqlBackend {
    #[default]
    Postgres,
    Sqlite,
}

/// Relational sink settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqlSinkConfig {
    #[serde(default)]
    pub backend: SqlBackend,

    /// PostgreSQL connection string, or SQLite file path (`:memory:` allowed).
    #[serde(default = "default_pg_url")]
    pub url: String,

    #[serde(flatten)]
    pub templates: SqlTemplates,

    /// Create the default tables on connect (always done for SQLite).
    #[serde(default)]
    pub init_schema: bool,
}

fn default_pg_url() -> String {
    "postgres://postgres@localhost/mqtt".to_string()
}

impl Default for SqlSinkConfig {
    fn default() -> Self {
        Self {
            backend: SqlBackend::default(),
            url: default_pg_url(),
            templates: SqlTemplates::default(),
            init_schema: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_file_config_uses_defaults() {
        let config = WriterConfig::from_toml("[sink]\ntype = \"file\"\n").unwrap();

        assert_eq!(config.broker.topic_filter, "/#");
        assert_eq!(config.broker.port, 1883);
        assert!(!config.pipeline.require_numeric);

        let SinkConfig::File(file) = &config.sink else {
            panic!("expected file sink");
        };
        assert_eq!(file.output, "output-%Y%m%d.csv");
        assert_eq!(file.line_format, "{timestamp};{topic};{payload}");
        assert_eq!(file.header, "timestamp;topic;payload");
        assert_eq!(file.time_basis, TimeBasis::Local);
        assert_eq!(config.sink.layout(), TopicLayout::none());
    }

    #[test]
    fn test_influx_config() {
        let toml = r#"
            [broker]
            host = "broker.local"
            topic_filter = "/sensors/#"

            [sink]
            type = "influx"
            url = "http://influx:8086"
            database = "plant"
            tags = ["site", "machine"]
            store_text = true
        "#;
        let config = WriterConfig::from_toml(toml).unwrap();

        assert_eq!(config.broker.host, "broker.local");
        assert_eq!(config.sink.layout(), TopicLayout::new(["site", "machine"]));

        let SinkConfig::Influx(influx) = &config.sink else {
            panic!("expected influx sink");
        };
        assert_eq!(influx.measurement, "mqtt");
        assert!(influx.store_text);
        assert_eq!(
            influx.target().unwrap(),
            InfluxTarget::V1 {
                database: "plant".into()
            }
        );
    }

    #[test]
    fn test_influx_v2_requires_token() {
        let toml = r#"
            [sink]
            type = "influx"
            api = "v2"
            org = "acme"
            bucket = "mqtt"
        "#;
        assert!(matches!(
            WriterConfig::from_toml(toml),
            Err(ConfigError::Invalid(msg)) if msg.contains("token")
        ));
    }

    #[test]
    fn test_sql_config_flattens_templates() {
        let toml = r#"
            [sink]
            type = "sql"
            backend = "sqlite"
            url = ":memory:"
            insert_topic = "INSERT INTO t (n) VALUES ($1)"
        "#;
        let config = WriterConfig::from_toml(toml).unwrap();

        let SinkConfig::Sql(sql) = &config.sink else {
            panic!("expected sql sink");
        };
        assert_eq!(sql.backend, SqlBackend::Sqlite);
        assert_eq!(sql.templates.insert_topic, "INSERT INTO t (n) VALUES ($1)");
        assert_eq!(sql.templates.insert_fact, SqlTemplates::default().insert_fact);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = WriterConfig::new(SinkConfig::File(FileSinkConfig::default()));
        config.broker.topic_filter = "  ".into();
        assert!(config.validate().is_err());

        let config = WriterConfig::new(SinkConfig::File(FileSinkConfig {
            output: "out-%Q.csv".into(),
            ..Default::default()
        }));
        assert!(config.validate().is_err());

        let config = WriterConfig::new(SinkConfig::Influx(InfluxSinkConfig {
            measurement: String::new(),
            ..Default::default()
        }));
        assert!(config.validate().is_err());

        let mut sql = SqlSinkConfig::default();
        sql.templates.insert_fact = String::new();
        assert!(WriterConfig::new(SinkConfig::Sql(sql)).validate().is_err());
    }

    #[test]
    fn test_missing_sink_is_parse_error() {
        assert!(matches!(
            WriterConfig::from_toml("[broker]\nhost = \"x\"\n"),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn test_empty_header_disables_it() {
        let file = FileSinkConfig {
            header: String::new(),
            json_suffix: String::new(),
            ..Default::default()
        };
        let options = file.options().unwrap();
        assert!(options.header.is_none());
        assert!(options.json_suffix.is_none());
    }

    #[test]
    fn test_build_pipeline_for_file_sink_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("nested").join("out-%Y.csv");
        let config = WriterConfig::new(SinkConfig::File(FileSinkConfig {
            output: output.to_string_lossy().into_owned(),
            ..Default::default()
        }));

        let pipeline = config.build_pipeline().unwrap();
        assert_eq!(pipeline.sink_name(), "file");
        assert!(dir.path().join("nested").is_dir());
    }

    #[test]
    fn test_build_pipeline_for_in_memory_sqlite() {
        let config = WriterConfig::new(SinkConfig::Sql(SqlSinkConfig {
            backend: SqlBackend::Sqlite,
            url: ":memory:".into(),
            ..Default::default()
        }));
        assert_eq!(config.build_pipeline().unwrap().sink_name(), "sqlite");
    }
}
