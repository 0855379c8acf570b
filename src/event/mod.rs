// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! In-process events emitted by the engine.
//!
//! The [`EventBus`] uses tokio's broadcast channel so any number of
//! observers (a UI bridge, a websocket fan-out, tests) can follow state
//! transitions without polling the store.
//!
//! # Examples
//!
//! ```
//! use curtain_engine::event::{EngineEvent, EventBus};
//!
//! let bus = EventBus::new();
//! let mut rx = bus.subscribe();
//!
//! bus.publish(EngineEvent::PirSettingsChanged { enabled: false });
//! assert!(matches!(
//!     rx.try_recv(),
//!     Ok(EngineEvent::PirSettingsChanged { enabled: false })
//! ));
//! ```

mod engine_event;
mod event_bus;

pub use engine_event::EngineEvent;
pub use event_bus::EventBus;
