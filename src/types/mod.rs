// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Value types shared across the engine.
//!
//! # Types
//!
//! - [`CurtainPosition`] - Open/Closed/Unknown position of the curtain
//! - [`ControlMode`] - Whether the curtain follows sensor rules or manual commands
//! - [`CurtainAction`] - Commands understood by the device
//! - [`CommandSource`] - Who or what issued a command
//! - [`Priority`] - Notification priority

mod action;
mod mode;
mod position;

pub use action::{CommandSource, CurtainAction, Priority};
pub use mode::ControlMode;
pub use position::CurtainPosition;
