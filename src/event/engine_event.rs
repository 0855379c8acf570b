// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Engine event types.

use crate::automation::AutomationRules;
use crate::state::DeviceState;
use crate::types::{CommandSource, CurtainAction};

/// Events emitted by the engine after an authoritative state write.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// The live device record changed.
    StateChanged {
        /// The new record.
        state: DeviceState,
    },

    /// A command was sent to the device.
    CommandIssued {
        /// What was sent.
        action: CurtainAction,
        /// Who issued it.
        source: CommandSource,
        /// Whether the publish was accepted by the channel.
        delivered: bool,
    },

    /// Sleep mode was switched on or off.
    SleepModeChanged {
        /// Whether sleep mode is now active.
        active: bool,
        /// Effective PIR flag after the transition.
        pir_enabled: bool,
        /// Effective automation flag after the transition.
        auto_enabled: bool,
    },

    /// Automation rules were replaced or toggled.
    RulesChanged {
        /// The stored rules.
        rules: AutomationRules,
    },

    /// PIR motion control was switched on or off.
    PirSettingsChanged {
        /// The stored flag.
        enabled: bool,
    },
}

impl EngineEvent {
    /// Returns `true` if this is a state change event.
    #[must_use]
    pub fn is_state_change(&self) -> bool {
        matches!(self, Self::StateChanged { .. })
    }

    /// Returns `true` if this is a command event.
    #[must_use]
    pub fn is_command(&self) -> bool {
        matches!(self, Self::CommandIssued { .. })
    }

    /// Returns the action if this is a command event.
    #[must_use]
    pub fn action(&self) -> Option<CurtainAction> {
        match self {
            Self::CommandIssued { action, .. } => Some(*action),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn classification() {
        let state = EngineEvent::StateChanged {
            state: DeviceState::new(Utc::now()),
        };
        assert!(state.is_state_change());
        assert!(!state.is_command());
        assert_eq!(state.action(), None);

        let command = EngineEvent::CommandIssued {
            action: CurtainAction::Close,
            source: CommandSource::Automation,
            delivered: true,
        };
        assert!(command.is_command());
        assert_eq!(command.action(), Some(CurtainAction::Close));
    }
}
