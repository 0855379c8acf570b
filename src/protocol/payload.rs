// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Wire formats exchanged with the device.
//!
//! Outbound messages are plain serde structs. Inbound reports other than
//! sensor readings (see [`SensorReading`](crate::state::SensorReading)) are
//! parsed leniently: unknown fields are ignored and optional fields may be
//! absent.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::automation::{AlertKind, AutomationRules};
use crate::error::ParseError;
use crate::state::DeviceState;
use crate::types::{CommandSource, ControlMode, CurtainAction, CurtainPosition};

/// Curtain command on `/curtain/control`.
///
/// # Examples
///
/// ```
/// use chrono::Utc;
/// use curtain_engine::protocol::payload::ControlCommand;
/// use curtain_engine::types::{CommandSource, CurtainAction};
///
/// let cmd = ControlCommand::new(CurtainAction::Close, CommandSource::Sleep, Utc::now());
/// let json = serde_json::to_value(&cmd).unwrap();
/// assert_eq!(json["mode"], "sleep");
/// assert_eq!(json["action"], "close");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlCommand {
    /// Mode the device should act in (`auto`, `manual`, `pir`, `sleep`).
    pub mode: String,
    /// The action.
    pub action: CurtainAction,
    /// Who issued it.
    pub source: CommandSource,
    /// When it was issued.
    pub timestamp: DateTime<Utc>,
}

impl ControlCommand {
    /// Builds the command for `action` issued by `source`.
    #[must_use]
    pub fn new(action: CurtainAction, source: CommandSource, at: DateTime<Utc>) -> Self {
        Self {
            mode: source.command_mode(action).to_string(),
            action,
            source,
            timestamp: at,
        }
    }
}

/// Buzzer alert on `/curtain/control`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuzzerAlert {
    /// Always `"buzzer"`.
    pub alert: &'static str,
    /// Why the alert fired, e.g. `"high_temperature"`.
    pub reason: &'static str,
    /// Measured value.
    pub value: f64,
    /// Threshold that was crossed.
    pub threshold: f64,
    /// When it fired.
    pub timestamp: DateTime<Utc>,
}

impl BuzzerAlert {
    /// Builds a buzzer alert.
    #[must_use]
    pub fn new(kind: AlertKind, value: f64, threshold: f64, at: DateTime<Utc>) -> Self {
        Self {
            alert: "buzzer",
            reason: kind.reason(),
            value,
            threshold,
            timestamp: at,
        }
    }
}

/// Status snapshot on `/curtain/status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusPayload {
    /// Curtain position.
    pub position: CurtainPosition,
    /// Control mode.
    pub mode: ControlMode,
    /// Whether sleep mode is active.
    pub sleep_mode: bool,
    /// When the snapshot was taken.
    pub timestamp: DateTime<Utc>,
}

impl StatusPayload {
    /// Snapshot of `state`.
    #[must_use]
    pub fn from_state(state: &DeviceState, at: DateTime<Utc>) -> Self {
        Self {
            position: state.position(),
            mode: state.mode(),
            sleep_mode: state.sleep_mode(),
            timestamp: at,
        }
    }
}

/// Sleep-mode state on `/curtain/sleep_mode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SleepModePayload {
    /// Whether sleep mode is active.
    pub active: bool,
    /// PIR flag the device should apply.
    pub pir_enabled: bool,
    /// Automation flag the device should apply.
    pub auto_mode_enabled: bool,
    /// When the message was sent.
    pub timestamp: DateTime<Utc>,
}

/// PIR settings on `/curtain/pir/settings`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PirSettingsPayload {
    /// Whether motion control is enabled.
    pub pir_enabled: bool,
    /// When the message was sent.
    pub timestamp: DateTime<Utc>,
}

/// Threshold and flag subset of the rules the device applies locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceRules {
    /// Master switch.
    pub enabled: bool,
    /// Light below which the curtain opens.
    pub light_open_threshold: i32,
    /// Light above which the curtain closes.
    pub light_close_threshold: i32,
    /// Temperature above which the buzzer sounds.
    pub temperature_threshold: f64,
    /// Humidity above which the buzzer sounds.
    pub humidity_threshold: f64,
    /// Light factor switch.
    pub light_control_enabled: bool,
    /// Temperature factor switch.
    pub temperature_control_enabled: bool,
    /// Humidity factor switch.
    pub humidity_control_enabled: bool,
    /// Motion control switch.
    pub pir_enabled: bool,
}

/// Rules snapshot on `/curtain/rules`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RulesPayload {
    /// The rules.
    pub rules: DeviceRules,
    /// When the message was sent.
    pub timestamp: DateTime<Utc>,
}

impl RulesPayload {
    /// Snapshot of `rules`.
    #[must_use]
    pub fn from_rules(rules: &AutomationRules, at: DateTime<Utc>) -> Self {
        Self {
            rules: DeviceRules {
                enabled: rules.enabled,
                light_open_threshold: rules.light_open_threshold,
                light_close_threshold: rules.light_close_threshold,
                temperature_threshold: rules.temperature_high_threshold,
                humidity_threshold: rules.humidity_high_threshold,
                light_control_enabled: rules.light_control_enabled,
                temperature_control_enabled: rules.temperature_control_enabled,
                humidity_control_enabled: rules.humidity_control_enabled,
                pir_enabled: rules.pir_enabled,
            },
            timestamp: at,
        }
    }
}

/// Action the device's local automation took, from `/curtain/auto_action`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AutoActionReport {
    /// `open` or `close`.
    pub action: CurtainAction,
    /// Light level that triggered it.
    #[serde(default, alias = "light")]
    pub light_level: Option<f64>,
    /// Threshold that was crossed.
    #[serde(default)]
    pub threshold: Option<f64>,
    /// Free-form reason, if the firmware sends one.
    #[serde(default)]
    pub reason: Option<String>,
}

impl AutoActionReport {
    /// Parses a report payload.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError`] if the payload is not JSON, lacks an action,
    /// or the action is a mode toggle.
    pub fn from_json(payload: &str) -> Result<Self, ParseError> {
        let report: Self = serde_json::from_str(payload)?;
        if report.action.target_position().is_none() {
            return Err(ParseError::InvalidValue {
                field: "action".to_string(),
                message: format!("{} is not a movement", report.action),
            });
        }
        Ok(report)
    }

    /// Human readable explanation for the notification.
    #[must_use]
    pub fn describe(&self) -> String {
        let verb = self.action.verb_ing();
        match (self.light_level, self.threshold) {
            (Some(light), Some(threshold)) => {
                let (level, cmp) = if self.action == CurtainAction::Close {
                    ("high", '>')
                } else {
                    ("low", '<')
                };
                format!(
                    "Curtain {verb} automatically due to {level} light level ({light} lux {cmp} {threshold} lux)"
                )
            }
            _ => match &self.reason {
                Some(reason) => format!("Curtain {verb} automatically ({reason})"),
                None => format!("Curtain {verb} automatically"),
            },
        }
    }
}

/// Motion event from `/curtain/pir_action`.
///
/// An empty object is a valid motion event. Ambient readings, when
/// present, take precedence over the stored state.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PirActionReport {
    /// Whether motion was detected.
    #[serde(default = "detected")]
    pub motion: bool,
    /// Light level at the time of the event.
    #[serde(default)]
    pub light: Option<i32>,
    /// Temperature at the time of the event.
    #[serde(default)]
    pub temperature: Option<f64>,
    /// Humidity at the time of the event.
    #[serde(default)]
    pub humidity: Option<f64>,
}

fn detected() -> bool {
    true
}

impl PirActionReport {
    /// Parses a motion payload; an empty payload counts as a detection.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::Json`] if a non-empty payload is not valid JSON.
    pub fn from_json(payload: &str) -> Result<Self, ParseError> {
        if payload.trim().is_empty() {
            return Ok(Self {
                motion: true,
                ..Self::default()
            });
        }
        serde_json::from_str(payload).map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buzzer_alert_shape() {
        let alert = BuzzerAlert::new(AlertKind::HighTemperature, 36.0, 35.0, Utc::now());
        let json = serde_json::to_value(&alert).unwrap();
        assert_eq!(json["alert"], "buzzer");
        assert_eq!(json["reason"], "high_temperature");
    }

    #[test]
    fn control_command_modes() {
        let now = Utc::now();
        let auto = ControlCommand::new(CurtainAction::Open, CommandSource::Automation, now);
        assert_eq!(auto.mode, "auto");
        let manual = ControlCommand::new(CurtainAction::Open, CommandSource::Voice, now);
        assert_eq!(manual.mode, "manual");
        let json = serde_json::to_value(&manual).unwrap();
        assert_eq!(json["source"], "voice");
    }

    #[test]
    fn rules_payload_uses_device_field_names() {
        let payload = RulesPayload::from_rules(&AutomationRules::default(), Utc::now());
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["rules"]["light_open_threshold"], 250);
        assert_eq!(json["rules"]["light_close_threshold"], 500);
        assert_eq!(json["rules"]["temperature_threshold"], 35.0);
        assert_eq!(json["rules"]["enabled"], true);
    }

    #[test]
    fn auto_action_report_describes_light_trigger() {
        let report = AutoActionReport::from_json(
            r#"{"action":"open","light_level":200,"threshold":250,"timestamp":"2024-01-01T00:00:00"}"#,
        )
        .unwrap();
        assert_eq!(
            report.describe(),
            "Curtain opening automatically due to low light level (200 lux < 250 lux)"
        );
    }

    #[test]
    fn auto_action_report_rejects_mode_toggle() {
        assert!(AutoActionReport::from_json(r#"{"action":"enable"}"#).is_err());
        assert!(AutoActionReport::from_json("not json").is_err());
    }

    #[test]
    fn pir_report_defaults_to_detection() {
        assert!(PirActionReport::from_json("").unwrap().motion);
        let report = PirActionReport::from_json(r#"{"light":120}"#).unwrap();
        assert!(report.motion);
        assert_eq!(report.light, Some(120));
        assert!(!PirActionReport::from_json(r#"{"motion":false}"#).unwrap().motion);
    }
}
