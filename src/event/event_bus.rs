// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Event bus for broadcasting engine events.

use tokio::sync::broadcast;

use super::EngineEvent;

/// Default channel capacity for the event bus.
const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Broadcasts [`EngineEvent`]s to every subscriber.
///
/// The bus has a fixed capacity (default 256). A subscriber that falls
/// behind loses the oldest events and sees `RecvError::Lagged`; the engine
/// never waits on observers.
#[derive(Debug)]
pub struct EventBus {
    sender: broadcast::Sender<EngineEvent>,
}

impl EventBus {
    /// Creates a new event bus with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Creates a new event bus with the specified capacity.
    ///
    /// # Arguments
    ///
    /// * `capacity` - Maximum number of events that can be buffered
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribes to engine events.
    ///
    /// Returns a receiver that will receive all events published after
    /// the subscription is created.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.sender.subscribe()
    }

    /// Publishes an event to all subscribers.
    ///
    /// If there are no subscribers, the event is silently discarded.
    /// If the channel is full for a slow subscriber, that subscriber
    /// will lose events.
    pub fn publish(&self, event: EngineEvent) {
        // Ignore errors (no subscribers or channel closed)
        let _ = self.sender.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}
