// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Integration tests for the MQTT channel using mockforge-mqtt.

#![cfg(feature = "mqtt")]

use std::sync::Arc;
use std::time::Duration;

use curtain_engine::protocol::{MessageChannel, MqttChannel, MqttChannelConfig};
use curtain_engine::store::MemoryStore;
use curtain_engine::{CurtainEngine, CurtainPosition, EngineConfig, Gateway, ProtocolError};
use mockforge_mqtt::broker::MqttConfig;
use mockforge_mqtt::start_mqtt_server;
use tokio::time::sleep;

/// Helper to find an available port for testing.
fn get_test_port() -> u16 {
    use std::sync::atomic::{AtomicU16, Ordering};
    static PORT_COUNTER: AtomicU16 = AtomicU16::new(18950);
    PORT_COUNTER.fetch_add(1, Ordering::SeqCst)
}

/// Starts a mock MQTT broker on the given port.
async fn start_mock_broker(port: u16) {
    let config = MqttConfig {
        port,
        host: "127.0.0.1".to_string(),
        ..Default::default()
    };

    tokio::spawn(async move {
        let _ = start_mqtt_server(config).await;
    });

    // Give the broker time to bind before clients connect.
    sleep(Duration::from_millis(500)).await;
}

// ============================================================================
// Connection
// ============================================================================

mod connection {
    use super::*;

    #[tokio::test]
    async fn connect_to_broker() {
        let port = get_test_port();
        start_mock_broker(port).await;

        let result = MqttChannel::builder()
            .host("127.0.0.1")
            .port(port)
            .build()
            .await;
        assert!(result.is_ok(), "Failed to connect: {:?}", result.err());

        let (channel, _inbound) = result.unwrap();
        assert!(channel.is_connected());
        assert_eq!(channel.config().port(), port);
    }

    #[tokio::test]
    async fn connect_from_config() {
        let port = get_test_port();
        start_mock_broker(port).await;

        let builder = MqttChannel::builder()
            .host("127.0.0.1")
            .port(port)
            .client_id_prefix("curtain_test");
        let (channel, _inbound) = builder.build().await.unwrap();
        assert_eq!(channel.config().host(), "127.0.0.1");
        assert!(!channel.config().has_credentials());
    }

    #[tokio::test]
    async fn missing_host_is_rejected() {
        let result = MqttChannel::builder().port(1883).build().await;
        assert!(matches!(result, Err(ProtocolError::InvalidAddress(_))));
    }

    #[tokio::test]
    async fn unreachable_broker_fails() {
        // Nothing listens on this port.
        let port = get_test_port();
        let result = MqttChannel::builder()
            .host("127.0.0.1")
            .port(port)
            .connection_timeout(Duration::from_secs(2))
            .build()
            .await;
        assert!(matches!(result, Err(ProtocolError::ConnectionFailed(_))));
    }

    #[tokio::test]
    async fn default_config_points_at_standard_port() {
        let config = MqttChannelConfig::default();
        assert_eq!(config.port(), 1883);
        assert!(!config.has_credentials());
    }
}

// ============================================================================
// Publishing
// ============================================================================

mod publishing {
    use super::*;

    #[tokio::test]
    async fn publish_while_connected() {
        let port = get_test_port();
        start_mock_broker(port).await;

        let (channel, _inbound) = MqttChannel::builder()
            .host("127.0.0.1")
            .port(port)
            .build()
            .await
            .unwrap();

        let result = channel.publish("/curtain/control", r#"{"action":"open"}"#.to_string());
        assert!(result.is_ok(), "Publish failed: {:?}", result.err());
    }

    #[tokio::test]
    async fn publish_after_disconnect_fails() {
        let port = get_test_port();
        start_mock_broker(port).await;

        let (channel, _inbound) = MqttChannel::builder()
            .host("127.0.0.1")
            .port(port)
            .build()
            .await
            .unwrap();
        channel.disconnect().await.unwrap();

        assert!(!channel.is_connected());
        let result = channel.publish("/curtain/control", "{}".to_string());
        assert!(matches!(result, Err(ProtocolError::NotConnected)));
    }

    #[tokio::test]
    async fn engine_runs_over_broker() {
        let port = get_test_port();
        start_mock_broker(port).await;

        let (channel, inbound) = MqttChannel::builder()
            .host("127.0.0.1")
            .port(port)
            .build()
            .await
            .unwrap();
        let engine = Arc::new(CurtainEngine::new(
            MemoryStore::new(),
            channel.clone(),
            EngineConfig::default(),
        ));
        let gateway = Gateway::new(Arc::clone(&engine));
        let task = gateway.spawn(inbound);

        let reading = serde_json::json!({
            "temperature": 24.0, "humidity": 50.0, "light": 900,
            "position": "Open", "mode": "Auto"
        });
        let state = engine.record_reading(&reading).await.unwrap();
        assert_eq!(state.position(), CurtainPosition::Closed);

        channel.disconnect().await.unwrap();
        task.abort();
    }
}
