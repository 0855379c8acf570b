// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! User-facing notifications and the command audit trail.
//!
//! Both are append-only and best effort: a failed write is logged and the
//! calling flow carries on. Identical notifications emitted within the
//! dedup window are written once.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::store::{DocumentStore, Repository, collections};
use crate::types::{CurtainAction, Priority};

/// Category of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// The light rule moved the curtain.
    AutoMode,
    /// Temperature crossed its threshold.
    TemperatureHigh,
    /// Humidity crossed its threshold.
    HumidityHigh,
    /// Sleep mode was switched on or off.
    SleepMode,
    /// A user sent a command.
    ManualControl,
    /// PIR motion control was switched on or off.
    PirSettings,
    /// A motion event moved the curtain.
    PirMotion,
}

impl NotificationKind {
    /// Wire name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::AutoMode => "auto_mode",
            Self::TemperatureHigh => "temperature_high",
            Self::HumidityHigh => "humidity_high",
            Self::SleepMode => "sleep_mode",
            Self::ManualControl => "manual_control",
            Self::PirSettings => "pir_settings",
            Self::PirMotion => "pir_motion",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Category.
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    /// Short title.
    pub title: String,
    /// Full message.
    pub message: String,
    /// Priority.
    pub priority: Priority,
    /// Whether a user has read it.
    #[serde(default)]
    pub read: bool,
    /// When it was emitted.
    pub timestamp: DateTime<Utc>,
}

impl Notification {
    /// Creates an unread notification.
    #[must_use]
    pub fn new(
        kind: NotificationKind,
        title: impl Into<String>,
        message: impl Into<String>,
        priority: Priority,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            kind,
            title: title.into(),
            message: message.into(),
            priority,
            read: false,
            timestamp: at,
        }
    }
}

/// Outcome of a logged command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlStatus {
    /// The command was published.
    Success,
    /// Publishing the command failed.
    Failed,
}

/// Audit record of a command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlLogEntry {
    /// Identifier of the issuing user, if any.
    pub user_id: Option<String>,
    /// Display name of the issuer.
    pub username: String,
    /// The `mode` sent with the command.
    pub mode: String,
    /// The action.
    pub action: CurtainAction,
    /// Publish outcome.
    pub status: ControlStatus,
    /// When the command was issued.
    pub timestamp: DateTime<Utc>,
}

type DedupKey = (NotificationKind, String, String);

/// Writes notifications and control logs.
#[derive(Debug)]
pub struct Notifier<S> {
    repo: Arc<Repository<S>>,
    dedup_window: TimeDelta,
    recent: Mutex<HashMap<DedupKey, DateTime<Utc>>>,
}

impl<S: DocumentStore> Notifier<S> {
    /// Creates a notifier writing through `repo`.
    #[must_use]
    pub fn new(repo: Arc<Repository<S>>, dedup_window: Duration) -> Self {
        Self {
            repo,
            dedup_window: TimeDelta::from_std(dedup_window).unwrap_or(TimeDelta::MAX),
            recent: Mutex::new(HashMap::new()),
        }
    }

    /// Appends `notification` unless an identical one was emitted within
    /// the dedup window.
    ///
    /// Returns `true` if the notification was written.
    pub async fn emit(&self, notification: Notification) -> bool {
        if !self.claim(&notification) {
            tracing::debug!(kind = %notification.kind, "Suppressing duplicate notification");
            return false;
        }

        match self
            .repo
            .append(collections::NOTIFICATIONS, &notification)
            .await
        {
            Ok(_) => {
                tracing::debug!(kind = %notification.kind, title = %notification.title, "Notification stored");
                true
            }
            Err(e) => {
                tracing::warn!(kind = %notification.kind, error = %e, "Failed to store notification");
                false
            }
        }
    }

    /// Appends a control log entry.
    pub async fn log_control(&self, entry: ControlLogEntry) {
        if let Err(e) = self.repo.append(collections::CONTROL_LOGS, &entry).await {
            tracing::warn!(action = %entry.action, error = %e, "Failed to store control log");
        }
    }

    // Records the notification in the dedup table; false if it is a repeat.
    fn claim(&self, notification: &Notification) -> bool {
        let now = notification.timestamp;
        let mut recent = self.recent.lock();
        recent.retain(|_, at| now - *at < self.dedup_window);

        let key = (
            notification.kind,
            notification.title.clone(),
            notification.message.clone(),
        );
        if recent.contains_key(&key) {
            return false;
        }
        recent.insert(key, now);
        true
    }
}
