// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Command actions, their sources and notification priorities.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

use super::{ControlMode, CurtainPosition};

/// An action the device understands on its control topic.
///
/// # Examples
///
/// ```
/// use curtain_engine::types::{CurtainAction, CurtainPosition};
///
/// assert_eq!(CurtainAction::Close.target_position(), Some(CurtainPosition::Closed));
/// assert_eq!(CurtainAction::EnableAuto.target_position(), None);
/// assert_eq!(CurtainAction::EnableAuto.as_str(), "enable");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CurtainAction {
    /// Open the curtain.
    Open,
    /// Close the curtain.
    Close,
    /// Switch the device to automatic mode.
    #[serde(rename = "enable")]
    EnableAuto,
    /// Switch the device to manual mode.
    #[serde(rename = "disable")]
    DisableAuto,
}

impl CurtainAction {
    /// Returns the wire string for this action.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Close => "close",
            Self::EnableAuto => "enable",
            Self::DisableAuto => "disable",
        }
    }

    /// Position the curtain ends up in, for movement actions.
    #[must_use]
    pub const fn target_position(&self) -> Option<CurtainPosition> {
        match self {
            Self::Open => Some(CurtainPosition::Open),
            Self::Close => Some(CurtainPosition::Closed),
            Self::EnableAuto | Self::DisableAuto => None,
        }
    }

    /// Mode the device switches to, for mode actions.
    #[must_use]
    pub const fn target_mode(&self) -> Option<ControlMode> {
        match self {
            Self::EnableAuto => Some(ControlMode::Auto),
            Self::DisableAuto => Some(ControlMode::Manual),
            Self::Open | Self::Close => None,
        }
    }

    /// Present participle used in notification texts ("opening").
    #[must_use]
    pub const fn verb_ing(&self) -> &'static str {
        match self {
            Self::Open => "opening",
            Self::Close => "closing",
            Self::EnableAuto => "enabling automatic mode",
            Self::DisableAuto => "disabling automatic mode",
        }
    }
}

impl fmt::Display for CurtainAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CurtainAction {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "open" => Ok(Self::Open),
            "close" => Ok(Self::Close),
            "enable" => Ok(Self::EnableAuto),
            "disable" => Ok(Self::DisableAuto),
            _ => Err(ValidationError::InvalidValue {
                field: "action",
                message: format!("unrecognized action {s:?}"),
            }),
        }
    }
}

/// Who or what issued a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandSource {
    /// A user through the web or mobile client.
    Web,
    /// The voice assistant.
    Voice,
    /// The light-threshold automation.
    #[serde(rename = "auto")]
    Automation,
    /// The PIR motion handler.
    #[serde(rename = "pir")]
    Motion,
    /// Sleep mode activation.
    Sleep,
}

impl CommandSource {
    /// Returns the wire string for this source.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Web => "web",
            Self::Voice => "voice",
            Self::Automation => "auto",
            Self::Motion => "pir",
            Self::Sleep => "sleep",
        }
    }

    /// The `mode` field the device expects alongside `action`.
    ///
    /// Mode toggles always travel as `auto`; movements carry the mode of
    /// whoever issued them.
    #[must_use]
    pub const fn command_mode(&self, action: CurtainAction) -> &'static str {
        match (action, self) {
            (CurtainAction::EnableAuto | CurtainAction::DisableAuto, _) | (_, Self::Automation) => {
                "auto"
            }
            (_, Self::Web | Self::Voice) => "manual",
            (_, Self::Motion) => "pir",
            (_, Self::Sleep) => "sleep",
        }
    }
}

impl fmt::Display for CommandSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Notification priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Informational.
    Low,
    /// Worth a look.
    Medium,
    /// Needs attention.
    High,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_round_trips_through_str() {
        for action in [
            CurtainAction::Open,
            CurtainAction::Close,
            CurtainAction::EnableAuto,
            CurtainAction::DisableAuto,
        ] {
            assert_eq!(action.as_str().parse::<CurtainAction>(), Ok(action));
        }
    }

    #[test]
    fn action_serializes_as_wire_string() {
        assert_eq!(
            serde_json::to_string(&CurtainAction::EnableAuto).unwrap(),
            "\"enable\""
        );
    }

    #[test]
    fn command_mode_for_sources() {
        assert_eq!(CommandSource::Web.command_mode(CurtainAction::Open), "manual");
        assert_eq!(
            CommandSource::Web.command_mode(CurtainAction::EnableAuto),
            "auto"
        );
        assert_eq!(
            CommandSource::Automation.command_mode(CurtainAction::Close),
            "auto"
        );
        assert_eq!(CommandSource::Motion.command_mode(CurtainAction::Open), "pir");
        assert_eq!(CommandSource::Sleep.command_mode(CurtainAction::Close), "sleep");
    }

    #[test]
    fn priority_ordering() {
        assert!(Priority::High > Priority::Medium);
        assert!(Priority::Medium > Priority::Low);
    }
}
