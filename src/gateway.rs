// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Inbound message dispatch.
//!
//! The channel's event loop pushes every device message into one queue and
//! a single consumer task drains it, so reports are applied in arrival
//! order. Motion events are the exception: their debounce wait runs in its
//! own task so it never stalls the queue.
//!
//! ```text
//! MqttChannel event loop ──► mpsc queue ──► Gateway::run
//!                                              │
//!             /curtain/data ───────────────────┼──► engine.record_payload
//!             /curtain/*/request ──────────────┼──► engine.publish_*
//!             /curtain/auto_action ────────────┼──► engine.record_auto_action
//!             /curtain/pir_action ─────────────┴──► spawn engine.handle_motion
//! ```
//!
//! Malformed payloads are logged and dropped; nothing stops the loop
//! except the queue closing.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::automation::MotionOutcome;
use crate::engine::CurtainEngine;
use crate::error::{Error, ParseError, Result};
use crate::protocol::payload::{AutoActionReport, PirActionReport};
use crate::protocol::{InboundMessage, MessageChannel, Topic};
use crate::store::DocumentStore;

/// What the gateway did with a message.
#[derive(Debug)]
pub enum Dispatched {
    /// The message was fully handled.
    Handled,
    /// A motion event is being handled in the background.
    Motion(JoinHandle<MotionOutcome>),
}

/// Routes device messages to the engine.
pub struct Gateway<S, C> {
    engine: Arc<CurtainEngine<S, C>>,
}

impl<S: DocumentStore, C: MessageChannel> Gateway<S, C> {
    /// Creates a gateway for `engine`.
    #[must_use]
    pub fn new(engine: Arc<CurtainEngine<S, C>>) -> Self {
        Self { engine }
    }

    /// Returns the engine.
    #[must_use]
    pub fn engine(&self) -> &Arc<CurtainEngine<S, C>> {
        &self.engine
    }

    /// Spawns the consumer loop on the current runtime.
    #[must_use]
    pub fn spawn(self, inbound: mpsc::Receiver<InboundMessage>) -> JoinHandle<()> {
        tokio::spawn(self.run(inbound))
    }

    /// Drains `inbound` until every sender is dropped.
    pub async fn run(self, mut inbound: mpsc::Receiver<InboundMessage>) {
        tracing::debug!("Gateway started");
        while let Some(message) = inbound.recv().await {
            if let Err(e) = self.dispatch(&message).await {
                tracing::warn!(topic = %message.topic, error = %e, "Dropping inbound message");
            }
        }
        tracing::debug!("Gateway stopped, inbound queue closed");
    }

    /// Handles one message.
    ///
    /// # Errors
    ///
    /// Returns an error if the topic is unknown, the payload is malformed
    /// or the engine rejects it. The caller logs and drops it.
    pub async fn dispatch(&self, message: &InboundMessage) -> Result<Dispatched> {
        let topic: Topic = message.topic.parse()?;
        tracing::debug!(topic = %topic, "Dispatching");

        match topic {
            Topic::SensorData => {
                self.engine.record_payload(&message.payload).await?;
            }
            Topic::RulesRequest => self.engine.publish_rules().await,
            Topic::StatusRequest => self.engine.publish_status().await,
            Topic::PirRequest => self.engine.publish_pir_settings().await,
            Topic::SleepModeRequest => self.engine.publish_sleep_mode().await,
            Topic::AutoAction => {
                let report = AutoActionReport::from_json(&message.payload)?;
                self.engine.record_auto_action(&report).await?;
            }
            Topic::PirAction => {
                let report = PirActionReport::from_json(&message.payload)?;
                let engine = Arc::clone(&self.engine);
                let handle = tokio::spawn(async move { engine.handle_motion(&report).await });
                return Ok(Dispatched::Motion(handle));
            }
            Topic::Rules
            | Topic::Status
            | Topic::PirSettings
            | Topic::SleepMode
            | Topic::Control => {
                // Our own publishes echoed back by the broker.
                return Err(Error::Parse(ParseError::UnknownTopic(
                    message.topic.clone(),
                )));
            }
        }
        Ok(Dispatched::Handled)
    }
}

impl<S, C> std::fmt::Debug for Gateway<S, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EngineConfig;
    use crate::protocol::RecordingChannel;
    use crate::state::CurrentState;
    use crate::store::MemoryStore;
    use crate::types::CurtainPosition;

    fn gateway() -> (Gateway<MemoryStore, RecordingChannel>, RecordingChannel) {
        let channel = RecordingChannel::new();
        let engine = CurtainEngine::new(MemoryStore::new(), channel.clone(), EngineConfig::default());
        (Gateway::new(Arc::new(engine)), channel)
    }

    #[tokio::test]
    async fn sensor_report_updates_state() {
        let (gateway, _) = gateway();
        let message = InboundMessage::new(
            "/curtain/data",
            r#"{"temperature":24,"humidity":50,"light":300,"position":"Tertutup","mode":"Manual"}"#,
        );
        assert!(matches!(
            gateway.dispatch(&message).await.unwrap(),
            Dispatched::Handled
        ));
        let CurrentState::Live(state) = gateway.engine().current().await else {
            panic!("expected live state");
        };
        assert_eq!(state.position(), CurtainPosition::Closed);
    }

    #[tokio::test]
    async fn malformed_report_is_rejected_without_publish() {
        let (gateway, channel) = gateway();
        let message = InboundMessage::new("/curtain/data", "{not json");
        assert!(matches!(
            gateway.dispatch(&message).await,
            Err(Error::Parse(ParseError::Json(_)))
        ));
        let message = InboundMessage::new("/curtain/data", r#"{"temperature":24}"#);
        assert!(matches!(
            gateway.dispatch(&message).await,
            Err(Error::Validation(_))
        ));
        assert!(channel.published().is_empty());
        assert_eq!(gateway.engine().current().await, CurrentState::NoData);
    }

    #[tokio::test]
    async fn request_topics_are_answered() {
        let (gateway, channel) = gateway();
        for topic in [
            "/curtain/rules/request",
            "/curtain/status/request",
            "/curtain/pir/request",
            "/curtain/sleep_mode/request",
        ] {
            gateway
                .dispatch(&InboundMessage::new(topic, ""))
                .await
                .unwrap();
        }

        assert_eq!(channel.on_topic("/curtain/rules")[0]["rules"]["light_close_threshold"], 500);
        assert_eq!(channel.on_topic("/curtain/status")[0]["position"], "Unknown");
        assert_eq!(channel.on_topic("/curtain/pir/settings")[0]["pir_enabled"], true);
        let sleep = &channel.on_topic("/curtain/sleep_mode")[0];
        assert_eq!(sleep["active"], false);
        assert_eq!(sleep["auto_mode_enabled"], true);
    }

    #[tokio::test]
    async fn unknown_and_echoed_topics_are_dropped() {
        let (gateway, _) = gateway();
        assert!(
            gateway
                .dispatch(&InboundMessage::new("/other/topic", "{}"))
                .await
                .is_err()
        );
        assert!(
            gateway
                .dispatch(&InboundMessage::new("/curtain/control", "{}"))
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn auto_action_report_moves_state() {
        let (gateway, _) = gateway();
        let message = InboundMessage::new(
            "/curtain/auto_action",
            r#"{"action":"close","light_level":650,"threshold":500}"#,
        );
        gateway.dispatch(&message).await.unwrap();

        let state = gateway.engine().current().await.into_live().unwrap();
        assert_eq!(state.position(), CurtainPosition::Closed);
        let notifications = gateway.engine().recent_notifications(10).await.unwrap();
        assert_eq!(
            notifications[0].message,
            "Curtain closing automatically due to high light level (650 lux > 500 lux)"
        );
    }

    #[tokio::test]
    async fn run_drains_queue_until_closed() {
        let (gateway, _) = gateway();
        let engine = Arc::clone(gateway.engine());
        let (tx, rx) = mpsc::channel(8);
        let handle = gateway.spawn(rx);

        tx.send(InboundMessage::new("/curtain/data", "garbage"))
            .await
            .unwrap();
        tx.send(InboundMessage::new(
            "/curtain/data",
            r#"{"temperature":24,"humidity":50,"light":300,"position":"Open","mode":"Manual"}"#,
        ))
        .await
        .unwrap();
        drop(tx);
        handle.await.unwrap();

        let state = engine.current().await.into_live().unwrap();
        assert_eq!(state.position(), CurtainPosition::Open);
    }
}
