// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Sleep-mode state and its transitions.
//!
//! Activating sleep mode remembers whether PIR motion control and
//! automation were enabled, then forces both off. Deactivating restores
//! exactly the remembered values. The snapshot fields are set if and only
//! if sleep mode is active.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Flags handed back when sleep mode ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestoredFlags {
    /// PIR motion control enabled flag to restore.
    pub pir_enabled: bool,
    /// Automation master flag to restore.
    pub auto_enabled: bool,
}

/// Persisted sleep-mode record.
///
/// # Examples
///
/// ```
/// use chrono::Utc;
/// use curtain_engine::sleep_mode::SleepModeState;
///
/// let mut sleep = SleepModeState::default();
/// sleep.activate(true, false, Some("alice".into()), Utc::now()).unwrap();
/// assert!(sleep.is_active());
///
/// let restored = sleep.deactivate(None, Utc::now()).unwrap();
/// assert!(restored.pir_enabled);
/// assert!(!restored.auto_enabled);
/// assert_eq!(sleep.previous_pir_enabled, None);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SleepModeState {
    /// Whether sleep mode currently holds the curtain.
    pub active: bool,
    /// When sleep mode was last activated.
    pub activated_at: Option<DateTime<Utc>>,
    /// When sleep mode was last deactivated.
    pub deactivated_at: Option<DateTime<Utc>>,
    /// PIR flag captured at activation.
    pub previous_pir_enabled: Option<bool>,
    /// Automation flag captured at activation.
    pub previous_auto_enabled: Option<bool>,
    /// Who performed the last transition.
    pub updated_by: Option<String>,
}

impl SleepModeState {
    /// Returns `true` while sleep mode is active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Enters sleep mode, snapshotting the given flags.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyActive`] without touching the snapshot if
    /// sleep mode is already active.
    pub fn activate(
        &mut self,
        pir_enabled: bool,
        auto_enabled: bool,
        actor: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<()> {
        if self.active {
            return Err(Error::AlreadyActive);
        }
        self.active = true;
        self.activated_at = Some(at);
        self.previous_pir_enabled = Some(pir_enabled);
        self.previous_auto_enabled = Some(auto_enabled);
        self.updated_by = actor;
        Ok(())
    }

    /// Leaves sleep mode and returns the flags to restore.
    ///
    /// A snapshot missing a value falls back to PIR enabled and automation
    /// disabled.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotActive`] if sleep mode is not active.
    pub fn deactivate(
        &mut self,
        actor: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<RestoredFlags> {
        if !self.active {
            return Err(Error::NotActive);
        }
        let restored = RestoredFlags {
            pir_enabled: self.previous_pir_enabled.take().unwrap_or(true),
            auto_enabled: self.previous_auto_enabled.take().unwrap_or(false),
        };
        self.active = false;
        self.deactivated_at = Some(at);
        self.updated_by = actor;
        Ok(restored)
    }

    /// Replaces the remembered PIR flag while sleep mode is active.
    ///
    /// Returns `false` if sleep mode is not active.
    pub fn remember_pir_enabled(&mut self, enabled: bool) -> bool {
        if self.active {
            self.previous_pir_enabled = Some(enabled);
        }
        self.active
    }

    /// Replaces the remembered automation flag while sleep mode is active.
    ///
    /// Returns `false` if sleep mode is not active.
    pub fn remember_auto_enabled(&mut self, enabled: bool) -> bool {
        if self.active {
            self.previous_auto_enabled = Some(enabled);
        }
        self.active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn activate_snapshots_flags() {
        let mut sleep = SleepModeState::default();
        let now = Utc::now();
        sleep.activate(true, true, Some("bob".into()), now).unwrap();
        assert!(sleep.active);
        assert_eq!(sleep.activated_at, Some(now));
        assert_eq!(sleep.previous_pir_enabled, Some(true));
        assert_eq!(sleep.previous_auto_enabled, Some(true));
        assert_eq!(sleep.updated_by.as_deref(), Some("bob"));
    }

    #[test]
    fn double_activate_keeps_first_snapshot() {
        let mut sleep = SleepModeState::default();
        sleep.activate(true, true, None, Utc::now()).unwrap();
        let err = sleep.activate(false, false, None, Utc::now()).unwrap_err();
        assert!(matches!(err, Error::AlreadyActive));
        assert_eq!(sleep.previous_pir_enabled, Some(true));
        assert_eq!(sleep.previous_auto_enabled, Some(true));
    }

    #[test]
    fn deactivate_inactive_is_rejected() {
        let mut sleep = SleepModeState::default();
        let before = sleep.clone();
        assert!(matches!(
            sleep.deactivate(None, Utc::now()),
            Err(Error::NotActive)
        ));
        assert_eq!(sleep, before);
    }

    #[test]
    fn deactivate_clears_snapshot() {
        let mut sleep = SleepModeState::default();
        sleep.activate(false, true, None, Utc::now()).unwrap();
        let now = Utc::now();
        let restored = sleep.deactivate(None, now).unwrap();
        assert_eq!(
            restored,
            RestoredFlags {
                pir_enabled: false,
                auto_enabled: true
            }
        );
        assert!(!sleep.active);
        assert_eq!(sleep.deactivated_at, Some(now));
        assert_eq!(sleep.previous_pir_enabled, None);
        assert_eq!(sleep.previous_auto_enabled, None);
    }

    #[test]
    fn missing_snapshot_uses_defaults() {
        let mut sleep: SleepModeState = serde_json::from_str(r#"{"active":true}"#).unwrap();
        let restored = sleep.deactivate(None, Utc::now()).unwrap();
        assert!(restored.pir_enabled);
        assert!(!restored.auto_enabled);
    }

    #[test]
    fn remember_only_while_active() {
        let mut sleep = SleepModeState::default();
        assert!(!sleep.remember_pir_enabled(false));
        assert_eq!(sleep.previous_pir_enabled, None);

        sleep.activate(true, true, None, Utc::now()).unwrap();
        assert!(sleep.remember_auto_enabled(false));
        assert_eq!(sleep.previous_auto_enabled, Some(false));
    }
}
