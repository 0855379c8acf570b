// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device state management types.
//!
//! [`DeviceState`] is the single live record describing the curtain.
//! [`SensorReading`] is a validated device report that gets merged into it,
//! and [`HistorySample`] is an immutable copy captured at most once per
//! history interval.
//!
//! # Examples
//!
//! ```
//! use chrono::Utc;
//! use curtain_engine::state::{DeviceState, SensorReading};
//! use curtain_engine::types::CurtainPosition;
//!
//! let reading = SensorReading::from_json(
//!     r#"{"temperature":29.3,"humidity":55.8,"light":420,"position":"Open","mode":"Auto"}"#,
//! ).unwrap();
//!
//! let mut state = DeviceState::new(Utc::now());
//! state.merge_reading(&reading, Utc::now());
//! assert_eq!(state.position(), CurtainPosition::Open);
//! assert_eq!(state.light(), Some(420));
//! ```

mod device_state;
mod history;
mod reading;

pub use device_state::{CurrentState, DeviceState};
pub use history::{HistoryMarker, HistorySample};
pub use reading::SensorReading;
