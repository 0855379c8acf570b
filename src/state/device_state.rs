// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The live device-state record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{ControlMode, CurtainAction, CurtainPosition};

use super::SensorReading;

/// Current state of the curtain device.
///
/// Sensor fields are optional because they are unknown until the device
/// reports them. Updates are merges: a field is only replaced when the
/// update carries a value for it, so sensor readings survive commands and
/// sleep-mode transitions.
///
/// # Examples
///
/// ```
/// use chrono::Utc;
/// use curtain_engine::state::DeviceState;
/// use curtain_engine::types::{ControlMode, CurtainAction, CurtainPosition};
///
/// let mut state = DeviceState::new(Utc::now());
/// assert!(state.apply_action(CurtainAction::Close, Utc::now()));
/// assert_eq!(state.position(), CurtainPosition::Closed);
///
/// // Mode toggles leave the position alone.
/// state.apply_action(CurtainAction::EnableAuto, Utc::now());
/// assert_eq!(state.mode(), ControlMode::Auto);
/// assert_eq!(state.position(), CurtainPosition::Closed);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceState {
    #[serde(default)]
    temperature: Option<f64>,
    #[serde(default)]
    humidity: Option<f64>,
    #[serde(default)]
    light: Option<i32>,
    #[serde(default)]
    position: CurtainPosition,
    #[serde(default)]
    mode: ControlMode,
    #[serde(default)]
    sleep_mode: bool,
    updated_at: DateTime<Utc>,
}

impl DeviceState {
    /// Creates a state with no sensor data, unknown position and manual mode.
    #[must_use]
    pub fn new(at: DateTime<Utc>) -> Self {
        Self {
            temperature: None,
            humidity: None,
            light: None,
            position: CurtainPosition::Unknown,
            mode: ControlMode::Manual,
            sleep_mode: false,
            updated_at: at,
        }
    }

    /// Temperature in °C.
    #[must_use]
    pub fn temperature(&self) -> Option<f64> {
        self.temperature
    }

    /// Relative humidity in %.
    #[must_use]
    pub fn humidity(&self) -> Option<f64> {
        self.humidity
    }

    /// Light level in lux.
    #[must_use]
    pub fn light(&self) -> Option<i32> {
        self.light
    }

    /// Curtain position.
    #[must_use]
    pub fn position(&self) -> CurtainPosition {
        self.position
    }

    /// Control mode.
    #[must_use]
    pub fn mode(&self) -> ControlMode {
        self.mode
    }

    /// Whether sleep mode currently holds the curtain.
    #[must_use]
    pub fn sleep_mode(&self) -> bool {
        self.sleep_mode
    }

    /// When this record last changed.
    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Merges a validated device report.
    ///
    /// The sleep-mode flag is owned by the engine and never comes from the
    /// device, so it is preserved.
    pub fn merge_reading(&mut self, reading: &SensorReading, at: DateTime<Utc>) {
        self.temperature = Some(reading.temperature);
        self.humidity = Some(reading.humidity);
        self.light = Some(reading.light);
        self.position = reading.position;
        self.mode = reading.mode;
        self.updated_at = at;
    }

    /// Applies a command.
    ///
    /// Movement actions set the position, mode toggles set the mode; every
    /// other field is preserved. `updated_at` is always stamped. Returns
    /// `true` if the position or mode actually changed.
    pub fn apply_action(&mut self, action: CurtainAction, at: DateTime<Utc>) -> bool {
        let before = (self.position, self.mode);
        if let Some(position) = action.target_position() {
            self.position = position;
        }
        if let Some(mode) = action.target_mode() {
            self.mode = mode;
        }
        self.updated_at = at;
        before != (self.position, self.mode)
    }

    /// Forces the closed, manual, sleeping state.
    pub fn enter_sleep(&mut self, at: DateTime<Utc>) {
        self.position = CurtainPosition::Closed;
        self.mode = ControlMode::Manual;
        self.sleep_mode = true;
        self.updated_at = at;
    }

    /// Leaves sleep, returning to automatic mode only if automation was restored.
    pub fn leave_sleep(&mut self, auto_restored: bool, at: DateTime<Utc>) {
        self.mode = ControlMode::from(auto_restored);
        self.sleep_mode = false;
        self.updated_at = at;
    }
}

/// Result of asking for the current device state.
///
/// This never fails: an empty store and an unreachable store are both
/// reported as explicit variants.
#[derive(Debug, Clone, PartialEq)]
pub enum CurrentState {
    /// The device has not reported yet.
    NoData,
    /// The live record.
    Live(DeviceState),
    /// The store could not be read.
    Unavailable,
}

impl CurrentState {
    /// Returns the live record, if any.
    #[must_use]
    pub fn live(&self) -> Option<&DeviceState> {
        match self {
            Self::Live(state) => Some(state),
            Self::NoData | Self::Unavailable => None,
        }
    }

    /// Consumes `self` and returns the live record, if any.
    #[must_use]
    pub fn into_live(self) -> Option<DeviceState> {
        match self {
            Self::Live(state) => Some(state),
            Self::NoData | Self::Unavailable => None,
        }
    }
}
