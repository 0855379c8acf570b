// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Persisted automation configuration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Global automation rules.
///
/// # Examples
///
/// ```
/// use curtain_engine::automation::AutomationRules;
///
/// let rules = AutomationRules::default();
/// assert!(rules.enabled);
/// assert!(rules.light_thresholds_valid());
///
/// let broken = AutomationRules {
///     light_open_threshold: 600,
///     ..AutomationRules::default()
/// };
/// assert!(broken.validate().is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutomationRules {
    /// Master switch for all automation.
    pub enabled: bool,
    /// Whether the light level moves the curtain.
    pub light_control_enabled: bool,
    /// Whether high temperature raises an alert.
    pub temperature_control_enabled: bool,
    /// Whether high humidity raises an alert.
    pub humidity_control_enabled: bool,
    /// Whether motion triggers are honoured.
    pub pir_enabled: bool,
    /// Below this light level the curtain opens.
    pub light_open_threshold: i32,
    /// Above this light level the curtain closes.
    pub light_close_threshold: i32,
    /// Above this temperature an alert is raised.
    #[serde(alias = "temperature_threshold")]
    pub temperature_high_threshold: f64,
    /// Above this humidity an alert is raised.
    pub humidity_high_threshold: f64,
    /// Who last changed the rules.
    pub updated_by: Option<String>,
    /// When the rules last changed.
    pub updated_at: Option<DateTime<Utc>>,
}

impl Default for AutomationRules {
    fn default() -> Self {
        Self {
            enabled: true,
            light_control_enabled: true,
            temperature_control_enabled: true,
            humidity_control_enabled: false,
            pir_enabled: true,
            light_open_threshold: 250,
            light_close_threshold: 500,
            temperature_high_threshold: 35.0,
            humidity_high_threshold: 80.0,
            updated_by: None,
            updated_at: None,
        }
    }
}

impl AutomationRules {
    /// Returns `true` if the open threshold is strictly below the close threshold.
    #[must_use]
    pub fn light_thresholds_valid(&self) -> bool {
        self.light_open_threshold < self.light_close_threshold
    }

    /// Checks the invariants a rule update must satisfy.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidThresholds`] if `open >= close` and
    /// [`ValidationError::InvalidValue`] for negative light thresholds, a
    /// temperature threshold outside 0..=100 °C or a humidity threshold
    /// outside 0..=100 %.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.light_open_threshold < 0 || self.light_close_threshold < 0 {
            return Err(ValidationError::InvalidValue {
                field: "light_threshold",
                message: "light thresholds must be positive".to_string(),
            });
        }
        if !self.light_thresholds_valid() {
            return Err(ValidationError::InvalidThresholds {
                open: self.light_open_threshold,
                close: self.light_close_threshold,
            });
        }
        if !(0.0..=100.0).contains(&self.temperature_high_threshold) {
            return Err(ValidationError::InvalidValue {
                field: "temperature_high_threshold",
                message: "must be between 0 and 100".to_string(),
            });
        }
        if !(0.0..=100.0).contains(&self.humidity_high_threshold) {
            return Err(ValidationError::InvalidValue {
                field: "humidity_high_threshold",
                message: "must be between 0 and 100".to_string(),
            });
        }
        Ok(())
    }
}

/// Global PIR motion-detection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PirSettings {
    /// Whether motion triggers are acted on.
    pub enabled: bool,
    /// When the settings last changed.
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
    /// Who last changed the settings.
    #[serde(default)]
    pub updated_by: Option<String>,
}

impl PirSettings {
    /// Creates settings with the given enablement and no audit fields.
    #[must_use]
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            last_updated: None,
            updated_by: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(AutomationRules::default().validate().is_ok());
    }

    #[test]
    fn equal_thresholds_rejected() {
        let rules = AutomationRules {
            light_open_threshold: 400,
            light_close_threshold: 400,
            ..AutomationRules::default()
        };
        assert_eq!(
            rules.validate(),
            Err(ValidationError::InvalidThresholds {
                open: 400,
                close: 400
            })
        );
    }

    #[test]
    fn negative_threshold_rejected() {
        let rules = AutomationRules {
            light_open_threshold: -1,
            ..AutomationRules::default()
        };
        assert!(matches!(
            rules.validate(),
            Err(ValidationError::InvalidValue { .. })
        ));
    }

    #[test]
    fn temperature_out_of_range_rejected() {
        let rules = AutomationRules {
            temperature_high_threshold: 120.0,
            ..AutomationRules::default()
        };
        assert!(rules.validate().is_err());
    }

    #[test]
    fn partial_document_fills_defaults() {
        let rules: AutomationRules = serde_json::from_value(serde_json::json!({
            "light_open_threshold": 100,
            "light_close_threshold": 900,
            "temperature_threshold": 30.0
        }))
        .unwrap();
        assert_eq!(rules.light_open_threshold, 100);
        assert!((rules.temperature_high_threshold - 30.0).abs() < f64::EPSILON);
        assert!(rules.enabled);
        assert!(rules.light_control_enabled);
    }
}
