// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! MQTT channel to the curtain device.
//!
//! The channel keeps one persistent broker connection. Publishing never
//! waits: messages are handed to the rumqttc request queue with
//! `try_publish`. Inbound messages on the device topics are forwarded, in
//! arrival order, to the receiver returned by
//! [`MqttChannelBuilder::build`].
//!
//! # Examples
//!
//! ```no_run
//! use curtain_engine::protocol::MqttChannel;
//!
//! # async fn example() -> Result<(), curtain_engine::error::ProtocolError> {
//! let (channel, inbound) = MqttChannel::builder()
//!     .host("192.168.1.50")
//!     .credentials("user", "password")
//!     .build()
//!     .await?;
//!
//! assert!(channel.is_connected());
//! # drop(inbound);
//! channel.disconnect().await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use tokio::sync::{mpsc, oneshot};

use crate::error::ProtocolError;

use super::{InboundMessage, MessageChannel, Topic};

/// Global counter for generating unique client IDs.
static CLIENT_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Delay before polling again after a connection error.
const RECONNECT_DELAY: Duration = Duration::from_secs(2);

/// Configuration for the MQTT channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MqttChannelConfig {
    host: String,
    port: u16,
    credentials: Option<(String, String)>,
    keep_alive: Duration,
    connection_timeout: Duration,
    client_id_prefix: String,
    inbound_capacity: usize,
}

impl Default for MqttChannelConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 1883,
            credentials: None,
            keep_alive: Duration::from_secs(30),
            connection_timeout: Duration::from_secs(10),
            client_id_prefix: "curtain_engine".to_string(),
            inbound_capacity: 64,
        }
    }
}

impl MqttChannelConfig {
    /// Reads the broker settings from the environment.
    ///
    /// | Variable | Default |
    /// |---|---|
    /// | `MQTT_BROKER_IP` | `127.0.0.1` |
    /// | `MQTT_BROKER_PORT` | `1883` |
    /// | `MQTT_KEEPALIVE` | `30` (seconds) |
    /// | `MQTT_USERNAME` / `MQTT_PASSWORD` | none |
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidAddress`] if a numeric variable does
    /// not parse.
    pub fn from_env() -> Result<Self, ProtocolError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ProtocolError> {
        let mut config = Self {
            host: lookup("MQTT_BROKER_IP").unwrap_or_else(|| "127.0.0.1".to_string()),
            ..Self::default()
        };

        if let Some(port) = lookup("MQTT_BROKER_PORT") {
            config.port = port.trim().parse().map_err(|_| {
                ProtocolError::InvalidAddress(format!("MQTT_BROKER_PORT is not a port: {port}"))
            })?;
        }
        if let Some(secs) = lookup("MQTT_KEEPALIVE") {
            let secs: u64 = secs.trim().parse().map_err(|_| {
                ProtocolError::InvalidAddress(format!("MQTT_KEEPALIVE is not a number: {secs}"))
            })?;
            config.keep_alive = Duration::from_secs(secs);
        }
        if let Some(username) = lookup("MQTT_USERNAME").filter(|u| !u.is_empty()) {
            let password = lookup("MQTT_PASSWORD").unwrap_or_default();
            config.credentials = Some((username, password));
        }
        Ok(config)
    }

    /// Broker host.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Broker port.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Returns whether authentication is configured.
    #[must_use]
    pub fn has_credentials(&self) -> bool {
        self.credentials.is_some()
    }
}

/// MQTT implementation of [`MessageChannel`].
///
/// Cheaply cloneable; clones share the connection.
#[derive(Clone)]
pub struct MqttChannel {
    inner: Arc<MqttChannelInner>,
}

struct MqttChannelInner {
    client: AsyncClient,
    config: MqttChannelConfig,
    connected: AtomicBool,
}

impl MqttChannel {
    /// Creates a new builder.
    #[must_use]
    pub fn builder() -> MqttChannelBuilder {
        MqttChannelBuilder::default()
    }

    /// Returns whether the broker connection is up.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::Acquire)
    }

    /// Returns the configuration used for this connection.
    #[must_use]
    pub fn config(&self) -> &MqttChannelConfig {
        &self.inner.config
    }

    /// Disconnects from the broker.
    ///
    /// # Errors
    ///
    /// Returns error if the disconnect request cannot be queued.
    pub async fn disconnect(&self) -> Result<(), ProtocolError> {
        tracing::info!(
            host = %self.inner.config.host,
            port = %self.inner.config.port,
            "Disconnecting from MQTT broker"
        );
        self.inner.client.disconnect().await?;
        self.inner.connected.store(false, Ordering::Release);
        Ok(())
    }

    fn subscribe_inbound(&self) {
        for topic in Topic::INBOUND {
            if let Err(e) = self
                .inner
                .client
                .try_subscribe(topic.as_str(), QoS::AtLeastOnce)
            {
                tracing::warn!(topic = %topic, error = %e, "Failed to subscribe");
            }
        }
    }
}

impl MessageChannel for MqttChannel {
    fn publish(&self, topic: &str, payload: String) -> Result<(), ProtocolError> {
        if !self.is_connected() {
            return Err(ProtocolError::NotConnected);
        }
        self.inner
            .client
            .try_publish(topic, QoS::AtLeastOnce, false, payload)
            .map_err(ProtocolError::Mqtt)
    }
}

impl std::fmt::Debug for MqttChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MqttChannel")
            .field("host", &self.inner.config.host)
            .field("port", &self.inner.config.port)
            .field("connected", &self.is_connected())
            .finish()
    }
}

/// Builder for [`MqttChannel`].
#[derive(Debug, Default)]
pub struct MqttChannelBuilder {
    config: MqttChannelConfig,
}

impl MqttChannelBuilder {
    /// Starts from an existing configuration, e.g. [`MqttChannelConfig::from_env`].
    #[must_use]
    pub fn from_config(config: MqttChannelConfig) -> Self {
        Self { config }
    }

    /// Sets the broker host address.
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    /// Sets the broker port (default: 1883).
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Sets authentication credentials.
    #[must_use]
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.config.credentials = Some((username.into(), password.into()));
        self
    }

    /// Sets the keep-alive interval (default: 30 seconds).
    #[must_use]
    pub fn keep_alive(mut self, duration: Duration) -> Self {
        self.config.keep_alive = duration;
        self
    }

    /// Sets the connection timeout (default: 10 seconds).
    #[must_use]
    pub fn connection_timeout(mut self, duration: Duration) -> Self {
        self.config.connection_timeout = duration;
        self
    }

    /// Sets the client id prefix (default: `curtain_engine`).
    #[must_use]
    pub fn client_id_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.client_id_prefix = prefix.into();
        self
    }

    /// Sets how many inbound messages may queue before the event loop
    /// waits for the consumer (default: 64).
    #[must_use]
    pub fn inbound_capacity(mut self, capacity: usize) -> Self {
        self.config.inbound_capacity = capacity.max(1);
        self
    }

    /// Connects, subscribes to the device topics and returns the channel
    /// together with the inbound message stream.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Host is not set
    /// - Connection fails
    /// - Connection times out
    pub async fn build(
        self,
    ) -> Result<(MqttChannel, mpsc::Receiver<InboundMessage>), ProtocolError> {
        if self.config.host.is_empty() {
            return Err(ProtocolError::InvalidAddress(
                "MQTT broker host is required".to_string(),
            ));
        }

        let counter = CLIENT_ID_COUNTER.fetch_add(1, Ordering::Relaxed);
        let client_id = format!(
            "{}_{}_{}",
            self.config.client_id_prefix,
            std::process::id(),
            counter
        );

        let mut mqtt_options = MqttOptions::new(&client_id, &self.config.host, self.config.port);
        mqtt_options.set_keep_alive(self.config.keep_alive);
        mqtt_options.set_clean_session(true);

        if let Some((ref username, ref password)) = self.config.credentials {
            mqtt_options.set_credentials(username, password);
        }

        let (client, event_loop) = AsyncClient::new(mqtt_options, 32);
        let (inbound_tx, inbound_rx) = mpsc::channel(self.config.inbound_capacity);

        let channel = MqttChannel {
            inner: Arc::new(MqttChannelInner {
                client,
                config: self.config.clone(),
                connected: AtomicBool::new(false),
            }),
        };

        let (connack_tx, connack_rx) = oneshot::channel();
        let loop_channel = channel.clone();
        tokio::spawn(async move {
            run_event_loop(event_loop, loop_channel, inbound_tx, connack_tx).await;
        });

        let timeout = self.config.connection_timeout;
        match tokio::time::timeout(timeout, connack_rx).await {
            Ok(Ok(())) => {
                tracing::info!(
                    host = %self.config.host,
                    port = %self.config.port,
                    "Connected to MQTT broker"
                );
                Ok((channel, inbound_rx))
            }
            Ok(Err(_)) => Err(ProtocolError::ConnectionFailed(
                "MQTT event loop terminated unexpectedly".to_string(),
            )),
            Err(_) => Err(ProtocolError::ConnectionFailed(format!(
                "MQTT connection timeout after {}s",
                timeout.as_secs()
            ))),
        }
    }
}

/// Drives the rumqttc event loop.
///
/// Subscriptions are renewed on every ConnAck because sessions are clean.
/// Errors before the first ConnAck end the loop so `build` can fail;
/// afterwards the loop keeps polling, which makes rumqttc reconnect.
async fn run_event_loop(
    mut event_loop: EventLoop,
    channel: MqttChannel,
    inbound_tx: mpsc::Sender<InboundMessage>,
    connack_tx: oneshot::Sender<()>,
) {
    let mut connack_tx = Some(connack_tx);

    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(connack))) => {
                tracing::debug!(?connack, "MQTT broker connected");
                channel.inner.connected.store(true, Ordering::Release);
                channel.subscribe_inbound();
                if let Some(tx) = connack_tx.take() {
                    let _ = tx.send(());
                }
            }
            Ok(Event::Incoming(Packet::SubAck(suback))) => {
                tracing::debug!(?suback, "MQTT subscription acknowledged");
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                let Ok(payload) = String::from_utf8(publish.payload.to_vec()) else {
                    tracing::warn!(topic = %publish.topic, "Dropping non UTF-8 payload");
                    continue;
                };
                tracing::debug!(topic = %publish.topic, payload = %payload, "MQTT message received");
                let message = InboundMessage {
                    topic: publish.topic,
                    payload,
                };
                if inbound_tx.send(message).await.is_err() {
                    tracing::info!("Inbound consumer dropped, stopping MQTT event loop");
                    break;
                }
            }
            Ok(Event::Incoming(Packet::Disconnect)) => {
                tracing::info!("MQTT broker disconnected");
                channel.inner.connected.store(false, Ordering::Release);
                break;
            }
            Ok(_) => {}
            Err(e) => {
                channel.inner.connected.store(false, Ordering::Release);
                if connack_tx.is_some() {
                    tracing::error!(error = %e, "MQTT connection failed");
                    break;
                }
                tracing::error!(error = %e, "MQTT event loop error, reconnecting");
                tokio::time::sleep(RECONNECT_DELAY).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn builder_default_values() {
        let builder = MqttChannelBuilder::default();
        assert_eq!(builder.config.port, 1883);
        assert!(builder.config.host.is_empty());
        assert!(builder.config.credentials.is_none());
        assert_eq!(builder.config.keep_alive, Duration::from_secs(30));
        assert_eq!(builder.config.connection_timeout, Duration::from_secs(10));
        assert_eq!(builder.config.client_id_prefix, "curtain_engine");
    }

    #[test]
    fn builder_chain() {
        let builder = MqttChannelBuilder::default()
            .host("192.168.1.50")
            .port(8883)
            .credentials("admin", "secret")
            .keep_alive(Duration::from_secs(45))
            .connection_timeout(Duration::from_secs(15))
            .inbound_capacity(0);

        assert_eq!(builder.config.host, "192.168.1.50");
        assert_eq!(builder.config.port, 8883);
        assert!(builder.config.has_credentials());
        assert_eq!(builder.config.keep_alive, Duration::from_secs(45));
        assert_eq!(builder.config.connection_timeout, Duration::from_secs(15));
        assert_eq!(builder.config.inbound_capacity, 1);
    }

    #[tokio::test]
    async fn builder_missing_host_fails() {
        let err = MqttChannelBuilder::default().build().await.unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidAddress(_)));
    }

    #[test]
    fn env_defaults() {
        let config = MqttChannelConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.host(), "127.0.0.1");
        assert_eq!(config.port(), 1883);
        assert!(!config.has_credentials());
    }

    #[test]
    fn env_overrides() {
        let config = MqttChannelConfig::from_lookup(lookup(&[
            ("MQTT_BROKER_IP", "10.0.0.7"),
            ("MQTT_BROKER_PORT", "1884"),
            ("MQTT_KEEPALIVE", "60"),
            ("MQTT_USERNAME", "curtain"),
            ("MQTT_PASSWORD", "hunter2"),
        ]))
        .unwrap();
        assert_eq!(config.host(), "10.0.0.7");
        assert_eq!(config.port(), 1884);
        assert_eq!(config.keep_alive, Duration::from_secs(60));
        assert_eq!(
            config.credentials,
            Some(("curtain".to_string(), "hunter2".to_string()))
        );
    }

    #[test]
    fn env_invalid_port() {
        let err = MqttChannelConfig::from_lookup(lookup(&[("MQTT_BROKER_PORT", "eighty")]))
            .unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidAddress(_)));
    }
}
