// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Curtain position.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Physical position of the curtain as last reported or commanded.
///
/// # Examples
///
/// ```
/// use curtain_engine::types::CurtainPosition;
///
/// let pos: CurtainPosition = "closed".parse().unwrap();
/// assert_eq!(pos, CurtainPosition::Closed);
/// assert_eq!(pos.as_str(), "Closed");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CurtainPosition {
    /// Curtain is open.
    #[serde(alias = "Terbuka")]
    Open,
    /// Curtain is closed.
    #[serde(alias = "Close", alias = "Tertutup")]
    Closed,
    /// Position has never been reported.
    #[default]
    Unknown,
}

impl CurtainPosition {
    /// Returns the canonical string form.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "Open",
            Self::Closed => "Closed",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for CurtainPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CurtainPosition {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Firmware older than the English field migration still reports
        // the Indonesian position names.
        match s.trim().to_lowercase().as_str() {
            "open" | "opened" | "terbuka" => Ok(Self::Open),
            "closed" | "close" | "tertutup" => Ok(Self::Closed),
            "unknown" => Ok(Self::Unknown),
            _ => Err(ValidationError::InvalidValue {
                field: "position",
                message: format!("unrecognized position {s:?}"),
            }),
        }
    }
}
