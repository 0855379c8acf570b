// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! In-process channel that records what was published.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use serde_json::Value;

use crate::error::ProtocolError;

use super::MessageChannel;

/// A recorded publish.
#[derive(Debug, Clone, PartialEq)]
pub struct Published {
    /// Topic string.
    pub topic: String,
    /// Decoded JSON payload, `Value::Null` if the payload was not JSON.
    pub payload: Value,
}

/// [`MessageChannel`] that keeps every publish in memory.
///
/// Used for tests, dry runs and replays. It can be switched offline to
/// exercise the publish failure paths.
///
/// # Examples
///
/// ```
/// use curtain_engine::protocol::{MessageChannel, RecordingChannel};
///
/// let channel = RecordingChannel::new();
/// channel.publish("/curtain/control", r#"{"action":"open"}"#.into()).unwrap();
/// assert_eq!(channel.on_topic("/curtain/control").len(), 1);
///
/// channel.set_online(false);
/// assert!(channel.publish("/curtain/control", "{}".into()).is_err());
/// ```
#[derive(Debug, Clone)]
pub struct RecordingChannel {
    published: Arc<Mutex<Vec<Published>>>,
    online: Arc<AtomicBool>,
}

impl RecordingChannel {
    /// Creates an online channel with no history.
    #[must_use]
    pub fn new() -> Self {
        Self {
            published: Arc::new(Mutex::new(Vec::new())),
            online: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Switches the channel on or off; offline publishes fail with
    /// [`ProtocolError::NotConnected`] and are not recorded.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::Release);
    }

    /// Returns every recorded publish in order.
    #[must_use]
    pub fn published(&self) -> Vec<Published> {
        self.published.lock().clone()
    }

    /// Returns the payloads published on `topic`, in order.
    #[must_use]
    pub fn on_topic(&self, topic: &str) -> Vec<Value> {
        self.published
            .lock()
            .iter()
            .filter(|p| p.topic == topic)
            .map(|p| p.payload.clone())
            .collect()
    }

    /// Forgets everything recorded so far.
    pub fn clear(&self) {
        self.published.lock().clear();
    }
}

impl Default for RecordingChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageChannel for RecordingChannel {
    fn publish(&self, topic: &str, payload: String) -> Result<(), ProtocolError> {
        if !self.online.load(Ordering::Acquire) {
            return Err(ProtocolError::NotConnected);
        }
        let payload = serde_json::from_str(&payload).unwrap_or(Value::Null);
        self.published.lock().push(Published {
            topic: topic.to_string(),
            payload,
        });
        Ok(())
    }
}
