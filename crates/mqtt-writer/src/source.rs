// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Message sources
//!
//! The pipeline pulls messages one at a time from a [`MessageSource`]. The
//! production source is an MQTT subscription; a channel-backed source lets
//! other code (and tests) feed messages directly.

use crate::config::BrokerConfig;
use crate::error::{ConnectError, SourceError};
use crate::message::InboundMessage;
use chrono::Utc;
use rumqttc::{Client, Connection, Event, MqttOptions, Packet, QoS, RecvTimeoutError};
use std::sync::mpsc;
use std::time::{Duration, Instant};

/// Delivers inbound messages synchronously.
pub trait MessageSource {
    /// Wait up to `timeout` for the next message.
    ///
    /// `Ok(None)` means nothing arrived in time. `Err(SourceError::Closed)`
    /// ends ingestion.
    fn poll(&mut self, timeout: Duration) -> Result<Option<InboundMessage>, SourceError>;

    /// Disconnect from the bus. Called once at shutdown.
    fn close(&mut self) {}
}

/// Source fed through an in-process channel.
pub struct ChannelSource {
    rx: mpsc::Receiver<InboundMessage>,
}

impl ChannelSource {
    /// Create a source and the sender that feeds it.
    pub fn new() -> (Self, mpsc::Sender<InboundMessage>) {
        let (tx, rx) = mpsc::channel();
        (Self { rx }, tx)
    }
}

impl MessageSource for ChannelSource {
    fn poll(&mut self, timeout: Duration) -> Result<Option<InboundMessage>, SourceError> {
        match self.rx.recv_timeout(timeout) {
            Ok(msg) => Ok(Some(msg)),
            Err(mpsc::RecvTimeoutError::Timeout) => Ok(None),
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(SourceError::Closed),
        }
    }
}

/// MQTT subscription.
///
/// Subscribes on every CONNACK, so the filter survives the client's
/// automatic reconnects.
pub struct MqttSource {
    client: Client,
    connection: Connection,
    topic_filter: String,
    reconnect_delay: Duration,
    closed: bool,
}

impl MqttSource {
    /// Connect to the broker and subscribe.
    ///
    /// Fails if the broker does not accept the connection within
    /// `config.connect_timeout_secs`.
    pub fn connect(config: &BrokerConfig) -> Result<Self, ConnectError> {
        let failed = |reason: String| ConnectError::Broker {
            host: config.host.clone(),
            port: config.port,
            reason,
        };

        let mut options = MqttOptions::new(&config.client_id, &config.host, config.port);
        options.set_keep_alive(Duration::from_secs(config.keep_alive_secs.max(1)));
        if let (Some(user), Some(pass)) = (&config.username, &config.password) {
            options.set_credentials(user, pass);
        }

        let (client, connection) = Client::new(options, 64);
        let mut source = Self {
            client,
            connection,
            topic_filter: config.topic_filter.clone(),
            reconnect_delay: Duration::from_secs(1),
            closed: false,
        };

        let deadline = Instant::now() + Duration::from_secs(config.connect_timeout_secs.max(1));
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(failed("timed out waiting for CONNACK".to_string()));
            }
            match source.connection.recv_timeout(remaining) {
                Ok(Ok(Event::Incoming(Packet::ConnAck(_)))) => break,
                Ok(Ok(_)) => continue,
                Ok(Err(e)) => return Err(failed(e.to_string())),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(failed("connection closed".to_string()))
                }
            }
        }

        tracing::info!(host = %config.host, port = config.port, "Connected to MQTT server");
        source.subscribe().map_err(|e| failed(e.to_string()))?;
        Ok(source)
    }

    fn subscribe(&mut self) -> Result<(), rumqttc::ClientError> {
        self.client.subscribe(&self.topic_filter, QoS::AtMostOnce)?;
        tracing::info!(topic = %self.topic_filter, "Subscribed");
        Ok(())
    }
}

impl MessageSource for MqttSource {
    fn poll(&mut self, timeout: Duration) -> Result<Option<InboundMessage>, SourceError> {
        match self.connection.recv_timeout(timeout) {
            Ok(Ok(Event::Incoming(Packet::Publish(publish)))) => {
                tracing::debug!(topic = %publish.topic, payload = ?publish.payload, "Received");
                Ok(Some(InboundMessage::received(
                    publish.topic,
                    publish.payload.to_vec(),
                    Utc::now(),
                )))
            }
            Ok(Ok(Event::Incoming(Packet::ConnAck(_)))) => {
                tracing::info!("Reconnected to MQTT server");
                if let Err(e) = self.subscribe() {
                    tracing::error!(error = %e, "Failed to resubscribe");
                }
                Ok(None)
            }
            Ok(Ok(_)) => Ok(None),
            Ok(Err(e)) => {
                // The next poll drives the client's reconnect.
                tracing::warn!(error = %e, "MQTT connection error");
                std::thread::sleep(self.reconnect_delay.min(timeout));
                Ok(None)
            }
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(SourceError::Closed),
        }
    }

    fn close(&mut self) {
        if std::mem::replace(&mut self.closed, true) {
            return;
        }
        match self.client.disconnect() {
            Ok(()) => tracing::info!("Disconnected from MQTT server"),
            Err(e) => tracing::debug!(error = %e, "Disconnect request failed"),
        }
    }
}

impl Drop for MqttSource {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_source_delivers_in_order() {
        let (mut source, tx) = ChannelSource::new();
        tx.send(InboundMessage::new("/a", "1")).unwrap();
        tx.send(InboundMessage::new("/b", "2")).unwrap();

        let first = source.poll(Duration::from_millis(10)).unwrap().unwrap();
        let second = source.poll(Duration::from_millis(10)).unwrap().unwrap();
        assert_eq!(first.topic, "/a");
        assert_eq!(second.topic, "/b");
    }

    #[test]
    fn test_channel_source_timeout_and_close() {
        let (mut source, tx) = ChannelSource::new();
        assert!(source.poll(Duration::from_millis(5)).unwrap().is_none());

        drop(tx);
        assert!(matches!(
            source.poll(Duration::from_millis(5)),
            Err(SourceError::Closed)
        ));
    }

    #[test]
    fn test_mqtt_connect_refused_is_fatal() {
        let config = BrokerConfig {
            host: "127.0.0.1".into(),
            port: 9,
            connect_timeout_secs: 2,
            ..Default::default()
        };
        assert!(matches!(
            MqttSource::connect(&config),
            Err(ConnectError::Broker { port: 9, .. })
        ));
    }
}
