// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Throttled history of device state.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use super::DeviceState;

/// Immutable copy of the device state at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistorySample {
    /// The captured state.
    #[serde(flatten)]
    pub state: DeviceState,
    /// When the sample was written.
    pub captured_at: DateTime<Utc>,
}

impl HistorySample {
    /// Captures `state` at `at`.
    #[must_use]
    pub fn capture(state: &DeviceState, at: DateTime<Utc>) -> Self {
        Self {
            state: state.clone(),
            captured_at: at,
        }
    }
}

/// Bookkeeping record limiting how often samples are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryMarker {
    /// When the last sample was written.
    pub last_save_time: DateTime<Utc>,
}

impl HistoryMarker {
    /// Returns `true` if a new sample is due at `now`.
    ///
    /// A missing marker means no sample has ever been written, so one is
    /// always due.
    #[must_use]
    pub fn is_due(marker: Option<&Self>, now: DateTime<Utc>, interval: Duration) -> bool {
        let Some(marker) = marker else {
            return true;
        };
        let interval = TimeDelta::from_std(interval).unwrap_or(TimeDelta::MAX);
        now - marker.last_save_time >= interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINUTE: Duration = Duration::from_secs(60);

    #[test]
    fn first_sample_is_always_due() {
        assert!(HistoryMarker::is_due(None, Utc::now(), MINUTE));
    }

    #[test]
    fn sample_due_exactly_at_interval() {
        let start = Utc::now();
        let marker = HistoryMarker {
            last_save_time: start,
        };
        assert!(!HistoryMarker::is_due(
            Some(&marker),
            start + TimeDelta::seconds(59),
            MINUTE
        ));
        assert!(HistoryMarker::is_due(
            Some(&marker),
            start + TimeDelta::seconds(60),
            MINUTE
        ));
    }

    #[test]
    fn clock_going_backwards_is_not_due() {
        let start = Utc::now();
        let marker = HistoryMarker {
            last_save_time: start,
        };
        assert!(!HistoryMarker::is_due(
            Some(&marker),
            start - TimeDelta::seconds(30),
            MINUTE
        ));
    }

    #[test]
    fn sample_serializes_flat() {
        let now = Utc::now();
        let sample = HistorySample::capture(&DeviceState::new(now), now);
        let value = serde_json::to_value(&sample).unwrap();
        assert!(value.get("position").is_some());
        assert!(value.get("captured_at").is_some());
        assert!(value.get("state").is_none());
    }
}
