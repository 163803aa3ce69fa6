// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! MQTT Writer CLI
//!
//! Persist MQTT messages to rotating files, InfluxDB or a SQL database.
//!
//! # Usage
//!
//! ```bash
//! # Daily CSV files in the current directory
//! mqtt-writer --host broker.local csv --output 'data/mqtt-%Y%m%d.csv'
//!
//! # InfluxDB 1.x, tags from /<group>/<node>/<type>
//! mqtt-writer --topic '/sensors/#' influx --database plant
//!
//! # PostgreSQL
//! mqtt-writer sql --url postgres://writer@db/mqtt --init-schema
//!
//! # Everything from a file
//! mqtt-writer --config writer.toml
//! ```

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use mqtt_writer::{
    BrokerConfig, FileSinkConfig, InfluxApi, InfluxSinkConfig, MqttSource, PipelineConfig,
    SinkConfig, SqlBackend, SqlSinkConfig, SqlTemplates, StopHandle, TimeBasis, TopicLayout,
    WriterConfig,
};
use std::path::PathBuf;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "mqtt-writer")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "MQTT ingestion service - persist bus messages to files, InfluxDB or SQL")]
#[command(long_about = None)]
struct Cli {
    /// Load the whole configuration from a TOML file (other options ignored)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose mode (log every message)
    #[arg(short, long)]
    verbose: bool,

    #[command(flatten)]
    broker: BrokerArgs,

    /// Drop messages whose payload is not a number
    #[arg(long)]
    require_numeric: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Args)]
struct BrokerArgs {
    /// MQTT broker host
    #[arg(long, env = "MQTT_HOST", default_value = "localhost")]
    host: String,

    /// MQTT broker port
    #[arg(long, env = "MQTT_PORT", default_value_t = 1883)]
    port: u16,

    /// Keep-alive interval in seconds
    #[arg(long, env = "MQTT_TIMEOUT", default_value_t = 60)]
    keep_alive: u64,

    /// Subscription topic filter
    #[arg(short, long, env = "MQTT_TOPIC", default_value = "/#")]
    topic: String,

    /// MQTT client identifier (default: mqtt-writer-<pid>)
    #[arg(long)]
    client_id: Option<String>,

    #[arg(long, env = "MQTT_USERNAME")]
    username: Option<String>,

    #[arg(long, env = "MQTT_PASSWORD", hide_env_values = true)]
    password: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Write delimited lines to rotating files
    Csv {
        /// Output file name (strftime placeholders allowed)
        #[arg(short, long, env = "CSV_OUTPUT", default_value = "output-%Y%m%d.csv")]
        output: String,

        /// Line format with {timestamp}, {topic} and {payload}
        #[arg(long, env = "CSV_FORMAT", default_value = "{timestamp};{topic};{payload}")]
        format: String,

        /// Header line for new files (empty for none)
        #[arg(long, env = "CSV_HEADER", default_value = "timestamp;topic;payload")]
        header: String,

        /// strftime format of {timestamp}
        #[arg(long, env = "DT_FORMAT", default_value = "%Y-%m-%dT%H:%M:%S")]
        dt_format: String,

        /// Delimiter for flattened JSON payloads
        #[arg(long, env = "CSV_DELIM", default_value = ";")]
        delimiter: String,

        /// Topic suffix marking JSON object payloads (empty to disable)
        #[arg(long, default_value = "/json")]
        json_suffix: String,

        /// Render dates in UTC instead of local time
        #[arg(long)]
        utc: bool,
    },

    /// Write points to InfluxDB
    Influx {
        #[arg(long, env = "INFLUX_HOST", default_value = "127.0.0.1")]
        influx_host: String,

        #[arg(long, env = "INFLUX_PORT", default_value_t = 8086)]
        influx_port: u16,

        /// API generation
        #[arg(long, value_enum, default_value = "v1")]
        api: ApiArg,

        /// Database (v1)
        #[arg(short, long, env = "INFLUX_DB", default_value = "mqtt")]
        database: String,

        /// Organization (v2)
        #[arg(long, env = "INFLUX_ORG", default_value = "")]
        org: String,

        /// Bucket (v2)
        #[arg(long, env = "INFLUX_BUCKET", default_value = "")]
        bucket: String,

        /// API token (v2)
        #[arg(long, env = "INFLUX_TOKEN", default_value = "", hide_env_values = true)]
        token: String,

        #[arg(short, long, default_value = "mqtt")]
        measurement: String,

        /// Tag names for topic segments 1, 2, ...
        #[arg(long, default_value = "group,node,type")]
        tags: String,

        /// Store non-numeric payloads as a `text` field
        #[arg(long)]
        store_text: bool,

        /// HTTP timeout in seconds
        #[arg(long, default_value_t = 5)]
        timeout: u64,
    },

    /// Write topic and payload rows to a SQL database
    Sql {
        /// PostgreSQL connection string
        #[arg(long, env = "PG_URL", default_value = "postgres://postgres@localhost/mqtt")]
        url: String,

        /// Use an SQLite database file instead of PostgreSQL
        #[arg(long)]
        sqlite: Option<PathBuf>,

        /// Topic insert statement ($1 = topic)
        #[arg(long, env = "SQL_INSERT_TOPIC")]
        insert_topic: Option<String>,

        /// Payload insert statement ($1 = topic, $2 = value, $3 = text)
        #[arg(long, env = "SQL_INSERT_PAYLOAD")]
        insert_payload: Option<String>,

        /// Create the default tables if missing
        #[arg(long)]
        init_schema: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ApiArg {
    V1,
    V2,
}

impl From<ApiArg> for InfluxApi {
    fn from(arg: ApiArg) -> Self {
        match arg {
            ApiArg::V1 => InfluxApi::V1,
            ApiArg::V2 => InfluxApi::V2,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("mqtt_writer=debug")
        } else {
            EnvFilter::new("mqtt_writer=info")
        }
    });
    fmt().with_env_filter(filter).with_target(false).init();

    let config = build_config(&cli)?;
    config.validate().context("Invalid configuration")?;

    tracing::info!(
        host = %config.broker.host,
        port = config.broker.port,
        topic = %config.broker.topic_filter,
        "Starting MQTT writer"
    );

    let mut pipeline = config.build_pipeline().context("Failed to open sink")?;
    let mut source =
        MqttSource::connect(&config.broker).context("Failed to connect to MQTT broker")?;

    let stop = StopHandle::new();
    ctrlc_handler(stop.clone());

    pipeline.run(&mut source, &stop);
    pipeline.close();

    let stats = pipeline.stats();
    tracing::info!(
        received = stats.received,
        written = stats.written,
        malformed = stats.malformed,
        non_numeric = stats.non_numeric,
        write_errors = stats.write_errors,
        "Writer shutdown complete"
    );

    Ok(())
}

fn build_config(cli: &Cli) -> Result<WriterConfig> {
    if let Some(path) = &cli.config {
        if cli.command.is_some() {
            tracing::warn!("Sink subcommand ignored, using {}", path.display());
        }
        return WriterConfig::from_file(path)
            .with_context(|| format!("Failed to load {}", path.display()));
    }

    let Some(command) = &cli.command else {
        bail!("no sink selected: use `csv`, `influx`, `sql` or --config");
    };

    let mut broker = BrokerConfig {
        host: cli.broker.host.clone(),
        port: cli.broker.port,
        keep_alive_secs: cli.broker.keep_alive,
        topic_filter: cli.broker.topic.clone(),
        username: cli.broker.username.clone(),
        password: cli.broker.password.clone(),
        ..Default::default()
    };
    if let Some(id) = &cli.broker.client_id {
        broker.client_id = id.clone();
    }

    let sink = match command {
        Command::Csv {
            output,
            format,
            header,
            dt_format,
            delimiter,
            json_suffix,
            utc,
        } => SinkConfig::File(FileSinkConfig {
            output: output.clone(),
            line_format: format.clone(),
            header: header.clone(),
            timestamp_format: dt_format.clone(),
            delimiter: delimiter.clone(),
            json_suffix: json_suffix.clone(),
            time_basis: if *utc { TimeBasis::Utc } else { TimeBasis::Local },
        }),
        Command::Influx {
            influx_host,
            influx_port,
            api,
            database,
            org,
            bucket,
            token,
            measurement,
            tags,
            store_text,
            timeout,
        } => SinkConfig::Influx(InfluxSinkConfig {
            url: format!("http://{}:{}", influx_host, influx_port),
            api: (*api).into(),
            database: database.clone(),
            org: org.clone(),
            bucket: bucket.clone(),
            token: token.clone(),
            measurement: measurement.clone(),
            tags: TopicLayout::parse(tags),
            store_text: *store_text,
            timeout_secs: *timeout,
        }),
        Command::Sql {
            url,
            sqlite,
            insert_topic,
            insert_payload,
            init_schema,
        } => {
            let mut templates = SqlTemplates::default();
            if let Some(sql) = insert_topic {
                templates.insert_topic = sql.clone();
            }
            if let Some(sql) = insert_payload {
                templates.insert_fact = sql.clone();
            }
            let (backend, url) = match sqlite {
                Some(path) => (SqlBackend::Sqlite, path.to_string_lossy().into_owned()),
                None => (SqlBackend::Postgres, url.clone()),
            };
            SinkConfig::Sql(SqlSinkConfig {
                backend,
                url,
                templates,
                init_schema: *init_schema,
            })
        }
    };

    Ok(WriterConfig {
        broker,
        pipeline: PipelineConfig {
            require_numeric: cli.require_numeric,
        },
        sink,
    })
}

/// Stop on Ctrl+C or SIGTERM.
fn ctrlc_handler(stop: StopHandle) {
    if let Err(e) = ctrlc::set_handler(move || on_termination(&stop)) {
        tracing::warn!(error = %e, "Failed to install termination handler");
    }
}

fn on_termination(stop: &StopHandle) {
    tracing::info!("Received termination signal, shutting down...");
    stop.stop();
}
