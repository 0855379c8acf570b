// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Pure rule evaluation.
//!
//! The light rule is the only one that moves the curtain. It is evaluated
//! first and yields at most one movement, and only when the target differs
//! from the current position. Temperature and humidity rules raise alerts
//! and never move the curtain.

use std::fmt;

use crate::state::DeviceState;
use crate::types::{CurtainAction, CurtainPosition};

use super::AutomationRules;

/// Sensor factor that caused a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Factor {
    /// Ambient light.
    Light,
    /// Temperature.
    Temperature,
    /// Relative humidity.
    Humidity,
}

impl Factor {
    /// Lowercase name used in notifications and wire payloads.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Temperature => "temperature",
            Self::Humidity => "humidity",
        }
    }

    /// Measurement unit.
    #[must_use]
    pub const fn unit(&self) -> &'static str {
        match self {
            Self::Light => "lux",
            Self::Temperature => "°C",
            Self::Humidity => "%",
        }
    }
}

impl fmt::Display for Factor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What was measured against which threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Trigger {
    /// The sensor factor.
    pub factor: Factor,
    /// Measured value.
    pub measured: f64,
    /// Threshold it crossed.
    pub threshold: f64,
}

/// A curtain movement and why it was chosen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurtainMove {
    /// `Open` or `Close`.
    pub action: CurtainAction,
    /// What caused it.
    pub trigger: Trigger,
}

impl CurtainMove {
    /// Human readable explanation, e.g.
    /// `"Curtain closing automatically due to high light level (620 lux > 500 lux)"`.
    #[must_use]
    pub fn describe(&self) -> String {
        let (level, cmp) = match self.action {
            CurtainAction::Close => ("high", '>'),
            _ => ("low", '<'),
        };
        format!(
            "Curtain {} automatically due to {level} {} level ({} {unit} {cmp} {} {unit})",
            self.action.verb_ing(),
            self.trigger.factor,
            self.trigger.measured,
            self.trigger.threshold,
            unit = self.trigger.factor.unit(),
        )
    }
}

/// Kind of alert raised by a threshold rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlertKind {
    /// Temperature above the configured threshold.
    HighTemperature,
    /// Humidity above the configured threshold.
    HighHumidity,
}

impl AlertKind {
    /// Reason string sent with the buzzer command.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::HighTemperature => "high_temperature",
            Self::HighHumidity => "high_humidity",
        }
    }
}

/// A buzzer alert.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Alert {
    /// Alert kind.
    pub kind: AlertKind,
    /// What caused it.
    pub trigger: Trigger,
}

/// Outcome of evaluating the rules against one reading.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Decision {
    /// At most one curtain movement.
    pub movement: Option<CurtainMove>,
    /// Alerts raised, in rule order.
    pub alerts: Vec<Alert>,
}

impl Decision {
    /// Returns `true` if nothing needs to happen.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.movement.is_none() && self.alerts.is_empty()
    }
}

/// Evaluates the automation rules against the current device state.
///
/// Callers only invoke this in automatic mode. A disabled master switch
/// yields an empty decision.
///
/// # Examples
///
/// ```
/// use chrono::Utc;
/// use curtain_engine::automation::{evaluate, AutomationRules};
/// use curtain_engine::state::{DeviceState, SensorReading};
/// use curtain_engine::types::CurtainAction;
///
/// let reading = SensorReading::from_json(
///     r#"{"temperature":25,"humidity":50,"light":800,"position":"Open","mode":"Auto"}"#,
/// ).unwrap();
/// let mut state = DeviceState::new(Utc::now());
/// state.merge_reading(&reading, Utc::now());
///
/// let decision = evaluate(&state, &AutomationRules::default());
/// assert_eq!(decision.movement.unwrap().action, CurtainAction::Close);
/// ```
#[must_use]
pub fn evaluate(state: &DeviceState, rules: &AutomationRules) -> Decision {
    let mut decision = Decision::default();
    if !rules.enabled {
        return decision;
    }

    if rules.light_control_enabled
        && let Some(light) = state.light()
    {
        decision.movement = light_move(light, state.position(), rules);
    }

    if rules.temperature_control_enabled
        && let Some(temperature) = state.temperature()
        && temperature > rules.temperature_high_threshold
    {
        decision.alerts.push(Alert {
            kind: AlertKind::HighTemperature,
            trigger: Trigger {
                factor: Factor::Temperature,
                measured: temperature,
                threshold: rules.temperature_high_threshold,
            },
        });
    }

    if rules.humidity_control_enabled
        && let Some(humidity) = state.humidity()
        && humidity > rules.humidity_high_threshold
    {
        decision.alerts.push(Alert {
            kind: AlertKind::HighHumidity,
            trigger: Trigger {
                factor: Factor::Humidity,
                measured: humidity,
                threshold: rules.humidity_high_threshold,
            },
        });
    }

    decision
}

/// Compares a light level against the rule thresholds.
///
/// Returns a movement only when the target differs from `position`.
/// Thresholds with `open >= close` never produce a movement.
#[must_use]
pub fn light_move(
    light: i32,
    position: CurtainPosition,
    rules: &AutomationRules,
) -> Option<CurtainMove> {
    if !rules.light_thresholds_valid() {
        tracing::warn!(
            open = rules.light_open_threshold,
            close = rules.light_close_threshold,
            "Refusing to act on inverted light thresholds"
        );
        return None;
    }

    let (action, threshold) = if light > rules.light_close_threshold
        && position != CurtainPosition::Closed
    {
        (CurtainAction::Close, rules.light_close_threshold)
    } else if light < rules.light_open_threshold && position != CurtainPosition::Open {
        (CurtainAction::Open, rules.light_open_threshold)
    } else {
        return None;
    };

    Some(CurtainMove {
        action,
        trigger: Trigger {
            factor: Factor::Light,
            measured: f64::from(light),
            threshold: f64::from(threshold),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::SensorReading;
    use crate::types::ControlMode;
    use chrono::Utc;

    fn state(temperature: f64, humidity: f64, light: i32, position: CurtainPosition) -> DeviceState {
        let mut state = DeviceState::new(Utc::now());
        state.merge_reading(
            &SensorReading {
                temperature,
                humidity,
                light,
                position,
                mode: ControlMode::Auto,
            },
            Utc::now(),
        );
        state
    }

    #[test]
    fn bright_light_closes_open_curtain() {
        let decision = evaluate(
            &state(25.0, 50.0, 620, CurtainPosition::Open),
            &AutomationRules::default(),
        );
        let movement = decision.movement.unwrap();
        assert_eq!(movement.action, CurtainAction::Close);
        assert_eq!(movement.trigger.factor, Factor::Light);
        assert!((movement.trigger.threshold - 500.0).abs() < f64::EPSILON);
    }

    #[test]
    fn dark_closes_nothing_but_opens_closed_curtain() {
        let decision = evaluate(
            &state(25.0, 50.0, 100, CurtainPosition::Closed),
            &AutomationRules::default(),
        );
        assert_eq!(decision.movement.unwrap().action, CurtainAction::Open);
    }

    #[test]
    fn no_movement_when_already_in_target_position() {
        let rules = AutomationRules::default();
        assert!(evaluate(&state(25.0, 50.0, 620, CurtainPosition::Closed), &rules).is_empty());
        assert!(evaluate(&state(25.0, 50.0, 100, CurtainPosition::Open), &rules).is_empty());
    }

    #[test]
    fn unknown_position_moves_either_way() {
        let rules = AutomationRules::default();
        let close = evaluate(&state(25.0, 50.0, 620, CurtainPosition::Unknown), &rules);
        assert_eq!(close.movement.unwrap().action, CurtainAction::Close);
    }

    #[test]
    fn light_between_thresholds_does_nothing() {
        let decision = evaluate(
            &state(25.0, 50.0, 300, CurtainPosition::Unknown),
            &AutomationRules::default(),
        );
        assert!(decision.movement.is_none());
    }

    #[test]
    fn thresholds_are_exclusive() {
        let rules = AutomationRules::default();
        assert!(evaluate(&state(25.0, 50.0, 500, CurtainPosition::Open), &rules).is_empty());
        assert!(evaluate(&state(25.0, 50.0, 250, CurtainPosition::Closed), &rules).is_empty());
    }

    #[test]
    fn master_switch_disables_everything() {
        let rules = AutomationRules {
            enabled: false,
            ..AutomationRules::default()
        };
        assert!(evaluate(&state(40.0, 50.0, 900, CurtainPosition::Open), &rules).is_empty());
    }

    #[test]
    fn light_factor_switch_disables_movement_only() {
        let rules = AutomationRules {
            light_control_enabled: false,
            ..AutomationRules::default()
        };
        let decision = evaluate(&state(40.0, 50.0, 900, CurtainPosition::Open), &rules);
        assert!(decision.movement.is_none());
        assert_eq!(decision.alerts.len(), 1);
    }

    #[test]
    fn high_temperature_raises_alert_without_moving() {
        let rules = AutomationRules {
            temperature_high_threshold: 35.0,
            ..AutomationRules::default()
        };
        let decision = evaluate(&state(36.0, 50.0, 300, CurtainPosition::Open), &rules);
        assert!(decision.movement.is_none());
        assert_eq!(decision.alerts.len(), 1);
        assert_eq!(decision.alerts[0].kind, AlertKind::HighTemperature);
        assert_eq!(decision.alerts[0].kind.reason(), "high_temperature");
    }

    #[test]
    fn temperature_alert_respects_factor_switch() {
        let rules = AutomationRules {
            temperature_control_enabled: false,
            ..AutomationRules::default()
        };
        assert!(evaluate(&state(50.0, 50.0, 300, CurtainPosition::Open), &rules).is_empty());
    }

    #[test]
    fn humidity_alert_when_enabled() {
        let rules = AutomationRules {
            humidity_control_enabled: true,
            humidity_high_threshold: 70.0,
            ..AutomationRules::default()
        };
        let decision = evaluate(&state(20.0, 85.0, 300, CurtainPosition::Open), &rules);
        assert_eq!(decision.alerts[0].kind, AlertKind::HighHumidity);
    }

    #[test]
    fn light_rule_runs_alongside_alerts() {
        let decision = evaluate(
            &state(40.0, 50.0, 900, CurtainPosition::Open),
            &AutomationRules::default(),
        );
        assert_eq!(decision.movement.unwrap().action, CurtainAction::Close);
        assert_eq!(decision.alerts.len(), 1);
    }

    #[test]
    fn inverted_thresholds_never_move() {
        let rules = AutomationRules {
            light_open_threshold: 600,
            light_close_threshold: 500,
            ..AutomationRules::default()
        };
        assert!(light_move(900, CurtainPosition::Open, &rules).is_none());
        assert!(light_move(100, CurtainPosition::Closed, &rules).is_none());
    }

    #[test]
    fn describe_mentions_factor_and_threshold() {
        let movement = light_move(200, CurtainPosition::Closed, &AutomationRules::default()).unwrap();
        assert_eq!(
            movement.describe(),
            "Curtain opening automatically due to low light level (200 lux < 250 lux)"
        );
    }
}
