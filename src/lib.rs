// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `curtain_engine` - automation and device-state synchronization for an
//! MQTT-controlled motorized curtain.
//!
//! The engine ingests sensor reports from the curtain controller, keeps the
//! live device record and a throttled history, evaluates light/temperature/
//! humidity rules, reacts to PIR motion events, and implements a sleep mode
//! that forces the curtain closed and restores the previous automation
//! settings afterwards. Every command is published to the device and
//! recorded as a notification or control log entry.
//!
//! # Supported Features
//!
//! - **Automatic mode**: light thresholds open and close the curtain
//! - **Alerts**: temperature and humidity thresholds sound the buzzer
//! - **Motion control**: PIR events with debounce, cooldown and dedup
//! - **Sleep mode**: snapshot/restore of PIR and automation flags
//! - **Manual control**: web and voice commands with an audit trail
//! - **History**: at most one sample per history interval
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use curtain_engine::{CurtainEngine, EngineConfig, Gateway};
//! use curtain_engine::protocol::{MqttChannelBuilder, MqttChannelConfig};
//! use curtain_engine::store::MemoryStore;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = MqttChannelConfig::from_env()?;
//!     let (channel, inbound) = MqttChannelBuilder::from_config(config).build().await?;
//!
//!     let engine = Arc::new(CurtainEngine::new(
//!         MemoryStore::new(),
//!         channel,
//!         EngineConfig::default(),
//!     ));
//!     Gateway::new(Arc::clone(&engine)).spawn(inbound).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Manual Commands and Sleep Mode
//!
//! ```
//! use curtain_engine::{ControlRequest, CurtainEngine, EngineConfig};
//! use curtain_engine::protocol::RecordingChannel;
//! use curtain_engine::store::MemoryStore;
//! use curtain_engine::types::{ControlMode, CurtainAction, CurtainPosition};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> curtain_engine::Result<()> {
//! let engine = CurtainEngine::new(MemoryStore::new(), RecordingChannel::new(), EngineConfig::default());
//!
//! engine.control(ControlRequest::web(CurtainAction::EnableAuto, "alice")).await?;
//! engine.activate_sleep(Some("alice")).await?;
//! assert!(!engine.rules().await?.enabled);
//!
//! let restored = engine.deactivate_sleep(Some("alice")).await?;
//! assert!(restored.auto_enabled);
//! let state = engine.current().await.into_live().unwrap();
//! assert_eq!(state.position(), CurtainPosition::Closed);
//! assert_eq!(state.mode(), ControlMode::Auto);
//! # Ok(())
//! # }
//! ```

pub mod automation;
pub mod clock;
mod config;
mod engine;
pub mod error;
pub mod event;
mod gateway;
pub mod notify;
pub mod protocol;
pub mod sleep_mode;
pub mod state;
pub mod store;
pub mod types;

pub use config::EngineConfig;
pub use engine::{ControlRequest, CurtainEngine};
pub use error::{Error, ParseError, ProtocolError, Result, StoreError, ValidationError};
pub use gateway::{Dispatched, Gateway};
pub use types::{CommandSource, ControlMode, CurtainAction, CurtainPosition, Priority};
