// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Control mode of the curtain.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Whether the curtain is driven by sensor rules or by explicit commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ControlMode {
    /// Sensor thresholds drive the curtain.
    Auto,
    /// Only explicit open/close commands move the curtain.
    #[default]
    Manual,
}

impl ControlMode {
    /// Returns the canonical string form.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "Auto",
            Self::Manual => "Manual",
        }
    }

    /// Returns `true` for [`ControlMode::Auto`].
    #[must_use]
    pub const fn is_auto(&self) -> bool {
        matches!(self, Self::Auto)
    }
}

impl From<bool> for ControlMode {
    fn from(auto: bool) -> Self {
        if auto { Self::Auto } else { Self::Manual }
    }
}

impl fmt::Display for ControlMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ControlMode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" | "automatic" => Ok(Self::Auto),
            "manual" => Ok(Self::Manual),
            _ => Err(ValidationError::InvalidValue {
                field: "mode",
                message: format!("unrecognized mode {s:?}"),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_modes() {
        assert_eq!("Auto".parse::<ControlMode>(), Ok(ControlMode::Auto));
        assert_eq!("manual".parse::<ControlMode>(), Ok(ControlMode::Manual));
        assert!("sleep".parse::<ControlMode>().is_err());
    }

    #[test]
    fn from_bool() {
        assert_eq!(ControlMode::from(true), ControlMode::Auto);
        assert_eq!(ControlMode::from(false), ControlMode::Manual);
    }
}
