// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Sensor-driven curtain automation.
//!
//! - [`AutomationRules`] and [`PirSettings`]: the persisted configuration
//! - [`evaluate`]: pure decision function from device state and rules
//! - [`MotionHandler`]: debounce/cooldown state machine for PIR triggers

mod evaluator;
mod motion;
mod rules;

pub use evaluator::{Alert, AlertKind, CurtainMove, Decision, Factor, Trigger, evaluate, light_move};
pub use motion::{MotionHandler, MotionOutcome, MotionPermit, MotionPhase};
pub use rules::{AutomationRules, PirSettings};
