// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Topic table for the curtain device.
//!
//! ```text
//! device → engine                    engine → device
//! /curtain/data                      /curtain/control
//! /curtain/rules/request        →    /curtain/rules
//! /curtain/status/request       →    /curtain/status
//! /curtain/pir/request          →    /curtain/pir/settings
//! /curtain/sleep_mode/request   →    /curtain/sleep_mode
//! /curtain/auto_action
//! /curtain/pir_action
//! ```

use std::fmt;
use std::str::FromStr;

use crate::error::ParseError;

/// Every topic the engine subscribes to or publishes on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Sensor report from the device.
    SensorData,
    /// Device asks for the automation rules.
    RulesRequest,
    /// Automation rules snapshot.
    Rules,
    /// Device asks for the current status.
    StatusRequest,
    /// Status snapshot.
    Status,
    /// Device asks for the PIR settings.
    PirRequest,
    /// PIR settings snapshot.
    PirSettings,
    /// Device asks for the sleep-mode state.
    SleepModeRequest,
    /// Sleep-mode state.
    SleepMode,
    /// Device reports an action its local automation took.
    AutoAction,
    /// Device reports a motion event.
    PirAction,
    /// Curtain commands and buzzer alerts.
    Control,
}

impl Topic {
    /// Topics the engine subscribes to.
    pub const INBOUND: [Self; 7] = [
        Self::SensorData,
        Self::RulesRequest,
        Self::StatusRequest,
        Self::PirRequest,
        Self::SleepModeRequest,
        Self::AutoAction,
        Self::PirAction,
    ];

    /// Returns the topic string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::SensorData => "/curtain/data",
            Self::RulesRequest => "/curtain/rules/request",
            Self::Rules => "/curtain/rules",
            Self::StatusRequest => "/curtain/status/request",
            Self::Status => "/curtain/status",
            Self::PirRequest => "/curtain/pir/request",
            Self::PirSettings => "/curtain/pir/settings",
            Self::SleepModeRequest => "/curtain/sleep_mode/request",
            Self::SleepMode => "/curtain/sleep_mode",
            Self::AutoAction => "/curtain/auto_action",
            Self::PirAction => "/curtain/pir_action",
            Self::Control => "/curtain/control",
        }
    }

    /// Returns `true` for topics the device publishes.
    #[must_use]
    pub fn is_inbound(&self) -> bool {
        Self::INBOUND.contains(self)
    }

    /// Topic the engine answers a request on, if this is a request topic.
    #[must_use]
    pub const fn response(&self) -> Option<Self> {
        match self {
            Self::RulesRequest => Some(Self::Rules),
            Self::StatusRequest => Some(Self::Status),
            Self::PirRequest => Some(Self::PirSettings),
            Self::SleepModeRequest => Some(Self::SleepMode),
            _ => None,
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Topic {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Brokers differ on whether the leading slash survives.
        let normalized = format!("/{}", s.trim().trim_start_matches('/'));
        [
            Self::SensorData,
            Self::RulesRequest,
            Self::Rules,
            Self::StatusRequest,
            Self::Status,
            Self::PirRequest,
            Self::PirSettings,
            Self::SleepModeRequest,
            Self::SleepMode,
            Self::AutoAction,
            Self::PirAction,
            Self::Control,
        ]
        .into_iter()
        .find(|topic| topic.as_str() == normalized)
        .ok_or_else(|| ParseError::UnknownTopic(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_known_topics() {
        assert_eq!("/curtain/data".parse::<Topic>().unwrap(), Topic::SensorData);
        assert_eq!(
            "/curtain/pir/request".parse::<Topic>().unwrap(),
            Topic::PirRequest
        );
        assert_eq!(
            "curtain/sleep_mode/request".parse::<Topic>().unwrap(),
            Topic::SleepModeRequest
        );
    }

    #[test]
    fn parse_unknown_topic_fails() {
        let err = "/curtain/unknown".parse::<Topic>().unwrap_err();
        assert!(matches!(err, ParseError::UnknownTopic(t) if t == "/curtain/unknown"));
    }

    #[test]
    fn request_topics_have_responses() {
        for topic in Topic::INBOUND {
            let expects_response = matches!(
                topic,
                Topic::RulesRequest | Topic::StatusRequest | Topic::PirRequest | Topic::SleepModeRequest
            );
            assert_eq!(topic.response().is_some(), expects_response, "{topic}");
        }
        assert_eq!(Topic::PirRequest.response(), Some(Topic::PirSettings));
    }

    #[test]
    fn outbound_topics_are_not_inbound() {
        assert!(!Topic::Control.is_inbound());
        assert!(!Topic::Rules.is_inbound());
        assert!(Topic::PirAction.is_inbound());
    }
}
