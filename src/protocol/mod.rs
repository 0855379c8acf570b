// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Message channel between the engine and the curtain device.
//!
//! The engine only needs to publish; inbound messages are delivered by the
//! channel implementation into the [`Gateway`](crate::Gateway) queue.
//!
//! - [`MessageChannel`]: the publishing seam the engine is generic over
//! - [`MqttChannel`]: rumqttc-backed implementation (feature `mqtt`)
//! - [`RecordingChannel`]: in-process implementation that records publishes
//! - [`Topic`]: the topic table
//! - [`payload`]: wire formats

#[cfg(feature = "mqtt")]
mod mqtt;
mod recording;
mod topics;

pub mod payload;

#[cfg(feature = "mqtt")]
pub use mqtt::{MqttChannel, MqttChannelBuilder, MqttChannelConfig};
pub use recording::{Published, RecordingChannel};
pub use topics::Topic;

use std::sync::Arc;

use serde::Serialize;

use crate::error::ProtocolError;

/// A message received from the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Topic it arrived on.
    pub topic: String,
    /// UTF-8 payload.
    pub payload: String,
}

impl InboundMessage {
    /// Creates a message.
    #[must_use]
    pub fn new(topic: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

/// Publishing side of the device message channel.
///
/// Publishing is fire-and-forget: implementations enqueue the message and
/// return immediately without waiting for broker or device acknowledgement.
pub trait MessageChannel: Send + Sync + 'static {
    /// Enqueues `payload` for delivery on `topic`.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError`] if the message could not be enqueued.
    fn publish(&self, topic: &str, payload: String) -> Result<(), ProtocolError>;
}

impl<T: MessageChannel> MessageChannel for Arc<T> {
    fn publish(&self, topic: &str, payload: String) -> Result<(), ProtocolError> {
        (**self).publish(topic, payload)
    }
}

/// Serializes `message` and publishes it on `topic`.
///
/// # Errors
///
/// Returns [`ProtocolError::Encoding`] if the message cannot be encoded,
/// or the channel's own error if publishing fails.
pub fn publish_json<C, T>(channel: &C, topic: Topic, message: &T) -> Result<(), ProtocolError>
where
    C: MessageChannel + ?Sized,
    T: Serialize + ?Sized,
{
    let payload = serde_json::to_string(message)?;
    tracing::debug!(topic = %topic, payload = %payload, "Publishing");
    channel.publish(topic.as_str(), payload)
}
