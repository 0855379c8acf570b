// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The curtain engine.
//!
//! [`CurtainEngine`] owns the store, the message channel and the clock, and
//! exposes every operation the gateway and the HTTP layer call. Each
//! singleton document is guarded by its own lock; when an operation needs
//! several they are always taken in the order
//! sleep → rules → pir → device → history.
//!
//! The authoritative state write always happens before any publish.
//! Publishing, notifications and control logs are best effort: their
//! failures are logged and never undo a state change.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::{Mutex, broadcast};

use crate::automation::{
    AlertKind, AutomationRules, CurtainMove, Decision, MotionHandler, MotionOutcome, PirSettings,
    evaluate, light_move,
};
use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::error::{Error, ParseError, Result, StoreError};
use crate::event::{EngineEvent, EventBus};
use crate::notify::{
    ControlLogEntry, ControlStatus, Notification, NotificationKind, Notifier,
};
use crate::protocol::payload::{
    AutoActionReport, BuzzerAlert, ControlCommand, PirActionReport, PirSettingsPayload,
    RulesPayload, SleepModePayload, StatusPayload,
};
use crate::protocol::{MessageChannel, Topic, publish_json};
use crate::sleep_mode::{RestoredFlags, SleepModeState};
use crate::state::{CurrentState, DeviceState, HistoryMarker, HistorySample, SensorReading};
use crate::store::{DocumentStore, Query, Repository, collections, keys};
use crate::types::{CommandSource, CurtainAction, Priority};

/// A command issued by a person (web client or voice assistant).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlRequest {
    /// The action.
    pub action: CurtainAction,
    /// Where it came from.
    pub source: CommandSource,
    /// Identifier of the issuing user, if known.
    pub user_id: Option<String>,
    /// Display name of the issuer.
    pub username: String,
}

impl ControlRequest {
    /// A command from the web client.
    #[must_use]
    pub fn web(action: CurtainAction, username: impl Into<String>) -> Self {
        Self {
            action,
            source: CommandSource::Web,
            user_id: None,
            username: username.into(),
        }
    }

    /// A command from the voice assistant.
    #[must_use]
    pub fn voice(action: CurtainAction, username: impl Into<String>) -> Self {
        Self {
            source: CommandSource::Voice,
            ..Self::web(action, username)
        }
    }

    /// Attaches the issuing user's identifier.
    #[must_use]
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }
}

// A singleton document write together with the content it replaces.
struct StagedWrite {
    collection: &'static str,
    key: &'static str,
    prior: Value,
    next: Value,
}

impl StagedWrite {
    fn new<T: Serialize>(
        collection: &'static str,
        key: &'static str,
        prior: &T,
        next: &T,
    ) -> std::result::Result<Self, StoreError> {
        Ok(Self {
            collection,
            key,
            prior: serde_json::to_value(prior)?,
            next: serde_json::to_value(next)?,
        })
    }
}

#[derive(Debug, Default)]
struct Locks {
    sleep: Mutex<()>,
    rules: Mutex<()>,
    pir: Mutex<()>,
    device: Mutex<()>,
    history: Mutex<()>,
}

/// Automation and device-state synchronization engine for one curtain.
///
/// # Examples
///
/// ```
/// use curtain_engine::{CurtainEngine, EngineConfig};
/// use curtain_engine::protocol::RecordingChannel;
/// use curtain_engine::store::MemoryStore;
/// use curtain_engine::types::CurtainPosition;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> curtain_engine::Result<()> {
/// let channel = RecordingChannel::new();
/// let engine = CurtainEngine::new(MemoryStore::new(), channel.clone(), EngineConfig::default());
///
/// let reading = serde_json::json!({
///     "temperature": 27.0, "humidity": 60.0, "light": 820,
///     "position": "Open", "mode": "Auto"
/// });
/// let state = engine.record_reading(&reading).await?;
///
/// assert_eq!(state.position(), CurtainPosition::Closed);
/// assert_eq!(channel.on_topic("/curtain/control")[0]["action"], "close");
/// # Ok(())
/// # }
/// ```
pub struct CurtainEngine<S, C> {
    repo: Arc<Repository<S>>,
    channel: C,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
    locks: Locks,
    motion: MotionHandler,
    notifier: Notifier<S>,
    events: EventBus,
    last_auto: parking_lot::Mutex<Option<(CurtainAction, DateTime<Utc>)>>,
    last_alerts: parking_lot::Mutex<HashMap<AlertKind, DateTime<Utc>>>,
}

impl<S: DocumentStore, C: MessageChannel> CurtainEngine<S, C> {
    /// Creates an engine using the system clock.
    #[must_use]
    pub fn new(store: S, channel: C, config: EngineConfig) -> Self {
        Self::with_clock(store, channel, config, Arc::new(SystemClock))
    }

    /// Creates an engine using `clock` for every timestamp and time window.
    #[must_use]
    pub fn with_clock(store: S, channel: C, config: EngineConfig, clock: Arc<dyn Clock>) -> Self {
        let repo = Arc::new(Repository::new(store, config.store_timeout));
        Self {
            notifier: Notifier::new(Arc::clone(&repo), config.notification_dedup_window),
            motion: MotionHandler::new(config.pir_debounce, config.pir_cooldown),
            repo,
            channel,
            clock,
            config,
            locks: Locks::default(),
            events: EventBus::new(),
            last_auto: parking_lot::Mutex::new(None),
            last_alerts: parking_lot::Mutex::new(HashMap::new()),
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Returns the underlying document store.
    #[must_use]
    pub fn store(&self) -> &S {
        self.repo.store()
    }

    /// Returns the message channel.
    #[must_use]
    pub fn channel(&self) -> &C {
        &self.channel
    }

    /// Subscribes to engine events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    // ---------------------------------------------------------------------
    // Device state
    // ---------------------------------------------------------------------

    /// Parses and records a raw sensor report.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] for malformed JSON, otherwise as
    /// [`record_reading`](Self::record_reading).
    pub async fn record_payload(&self, payload: &str) -> Result<DeviceState> {
        let value: Value = serde_json::from_str(payload).map_err(ParseError::from)?;
        self.record_reading(&value).await
    }

    /// Validates a sensor report, merges it into the live state, runs the
    /// automation rules and captures history.
    ///
    /// Rules are evaluated only in automatic mode and never while sleep
    /// mode is active. A rejected report changes nothing and publishes
    /// nothing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if the report is incomplete or
    /// mistyped, and [`Error::Store`] if the live state cannot be read or
    /// written.
    pub async fn record_reading(&self, report: &Value) -> Result<DeviceState> {
        let reading = SensorReading::from_value(report)?;

        let _device = self.locks.device.lock().await;
        let now = self.clock.now();
        let mut state = self.load_device(now).await?;
        state.merge_reading(&reading, now);

        let decision = if state.mode().is_auto() && !state.sleep_mode() {
            let rules = self.rules_or_default().await;
            self.settle(evaluate(&state, &rules), now)
        } else {
            Decision::default()
        };

        if let Some(movement) = decision.movement {
            state.apply_action(movement.action, now);
        }
        self.save_device(&state).await?;
        tracing::debug!(
            position = %state.position(),
            mode = %state.mode(),
            light = ?state.light(),
            "Reading recorded"
        );

        if let Some(movement) = decision.movement {
            self.act_automatically(&movement, now).await;
        }
        for alert in &decision.alerts {
            self.raise_alert(alert.kind, alert.trigger.measured, alert.trigger.threshold, now)
                .await;
        }

        self.capture_history(&state, now).await;
        self.events.publish(EngineEvent::StateChanged {
            state: state.clone(),
        });
        Ok(state)
    }

    /// Returns the live device state.
    ///
    /// Never fails: an empty store yields [`CurrentState::NoData`] and an
    /// unreachable one [`CurrentState::Unavailable`].
    pub async fn current(&self) -> CurrentState {
        match self
            .repo
            .load::<DeviceState>(collections::CURTAIN_DATA, keys::CURRENT)
            .await
        {
            Ok(Some(state)) => CurrentState::Live(state),
            Ok(None) => CurrentState::NoData,
            Err(e) => {
                tracing::warn!(error = %e, "Device state unavailable");
                CurrentState::Unavailable
            }
        }
    }

    /// Returns history samples captured within `window`, newest first,
    /// bounded by the configured history limit.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Store`] if the history cannot be queried.
    pub async fn history(&self, window: Duration) -> Result<Vec<HistorySample>> {
        let now = self.clock.now();
        let cutoff = now
            .checked_sub_signed(delta(window))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let query = Query::newest_first("captured_at")
            .since(cutoff)
            .limit(self.config.history_limit);
        Ok(self
            .repo
            .query(collections::CURTAIN_HISTORY, &query)
            .await?)
    }

    /// Returns history within the configured default window.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Store`] if the history cannot be queried.
    pub async fn recent_history(&self) -> Result<Vec<HistorySample>> {
        self.history(self.config.default_history_window).await
    }

    /// Applies `action` to the live state and sends it to the device.
    ///
    /// Movements set the position; mode toggles set the mode and leave the
    /// position and sensor values untouched.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Store`] if the live state cannot be read or written.
    /// A failed publish is logged, not returned.
    pub async fn apply_command(
        &self,
        action: CurtainAction,
        source: CommandSource,
    ) -> Result<DeviceState> {
        self.apply_and_send(action, source).await.map(|(state, _)| state)
    }

    /// Handles a command from a person: applies it, sends it, writes a
    /// control log entry and emits a notification.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SleepModeActive`] when enabling automatic mode
    /// while sleep mode is active, and [`Error::Store`] if the live state
    /// cannot be updated.
    pub async fn control(&self, request: ControlRequest) -> Result<DeviceState> {
        // Enabling auto mode holds the sleep lock until the command is out,
        // so sleep mode cannot be activated in between.
        let sleep_guard = if request.action == CurtainAction::EnableAuto {
            let guard = self.locks.sleep.lock().await;
            if self.sleep_state().await?.is_active() {
                tracing::info!(user = %request.username, "Refusing to enable auto mode during sleep mode");
                return Err(Error::SleepModeActive);
            }
            Some(guard)
        } else {
            None
        };

        let (state, delivered) = self.apply_and_send(request.action, request.source).await?;
        drop(sleep_guard);
        let now = self.clock.now();

        self.notifier
            .log_control(ControlLogEntry {
                user_id: request.user_id.clone(),
                username: request.username.clone(),
                mode: request.source.command_mode(request.action).to_string(),
                action: request.action,
                status: if delivered {
                    ControlStatus::Success
                } else {
                    ControlStatus::Failed
                },
                timestamp: now,
            })
            .await;

        if matches!(request.source, CommandSource::Web | CommandSource::Voice) {
            self.notifier
                .emit(Notification::new(
                    NotificationKind::ManualControl,
                    "Manual Control Action",
                    format!("User {} sent command: {}", request.username, request.action),
                    Priority::Medium,
                    now,
                ))
                .await;
        }
        Ok(state)
    }

    /// Records an action the device's own automation already performed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Store`] if the live state cannot be updated.
    pub async fn record_auto_action(&self, report: &AutoActionReport) -> Result<DeviceState> {
        let state = {
            let _device = self.locks.device.lock().await;
            let now = self.clock.now();
            let mut state = self.load_device(now).await?;
            state.apply_action(report.action, now);
            self.save_device(&state).await?;
            state
        };

        self.notifier
            .emit(Notification::new(
                NotificationKind::AutoMode,
                "Auto Mode Action",
                report.describe(),
                Priority::Low,
                self.clock.now(),
            ))
            .await;
        self.events.publish(EngineEvent::StateChanged {
            state: state.clone(),
        });
        Ok(state)
    }

    // ---------------------------------------------------------------------
    // Motion
    // ---------------------------------------------------------------------

    /// Handles a motion event.
    ///
    /// Waits out the debounce interval, then opens or closes the curtain
    /// by comparing the ambient light against the rule thresholds,
    /// regardless of the control mode. After a movement, further events
    /// are ignored for the cooldown period.
    pub async fn handle_motion(&self, report: &PirActionReport) -> MotionOutcome {
        if !report.motion {
            return MotionOutcome::NoAction;
        }
        if !self.motion_enabled().await {
            tracing::debug!("Motion ignored, PIR control disabled");
            return MotionOutcome::Disabled;
        }
        let permit = match self.motion.begin(tokio::time::Instant::now()) {
            Ok(permit) => permit,
            Err(outcome) => {
                tracing::debug!(?outcome, "Motion ignored");
                return outcome;
            }
        };

        tokio::time::sleep(self.motion.debounce()).await;
        // Settings may have changed while debouncing.
        let outcome = if self.motion_enabled().await {
            self.act_on_motion(report).await
        } else {
            tracing::debug!("Motion control disabled during debounce");
            MotionOutcome::Disabled
        };
        permit.finish(outcome.acted(), tokio::time::Instant::now());
        outcome
    }

    async fn motion_enabled(&self) -> bool {
        let sleeping = match self.sleep_state().await {
            Ok(sleep) => sleep.is_active(),
            Err(e) => {
                tracing::warn!(error = %e, "Sleep state unavailable, ignoring motion");
                return false;
            }
        };
        let pir = match self.pir_settings().await {
            Ok(pir) => pir.enabled,
            Err(e) => {
                tracing::warn!(error = %e, "PIR settings unavailable, ignoring motion");
                return false;
            }
        };
        !sleeping && pir && self.rules_or_default().await.pir_enabled
    }

    async fn act_on_motion(&self, report: &PirActionReport) -> MotionOutcome {
        let rules = self.rules_or_default().await;

        let (state, movement) = {
            let _device = self.locks.device.lock().await;
            let now = self.clock.now();
            let mut state = match self.load_device(now).await {
                Ok(state) => state,
                Err(e) => {
                    tracing::warn!(error = %e, "Device state unavailable, ignoring motion");
                    return MotionOutcome::NoAction;
                }
            };
            if state.sleep_mode() {
                return MotionOutcome::Disabled;
            }
            let Some(light) = report.light.or(state.light()) else {
                tracing::debug!("No light level known, ignoring motion");
                return MotionOutcome::NoAction;
            };
            let Some(movement) = light_move(light, state.position(), &rules) else {
                return MotionOutcome::NoAction;
            };

            state.apply_action(movement.action, now);
            if let Err(e) = self.save_device(&state).await {
                tracing::warn!(error = %e, "Failed to store motion action");
                return MotionOutcome::NoAction;
            }
            (state, movement)
        };

        let now = self.clock.now();
        self.send_command(movement.action, CommandSource::Motion, now);
        self.notifier
            .emit(Notification::new(
                NotificationKind::PirMotion,
                "PIR Motion Detected",
                format!(
                    "Motion detected: curtain {} (light {} lux)",
                    movement.action.verb_ing(),
                    movement.trigger.measured
                ),
                Priority::Low,
                now,
            ))
            .await;
        tracing::info!(action = %movement.action, "Curtain moved on motion");
        self.events.publish(EngineEvent::StateChanged { state });
        MotionOutcome::Acted(movement)
    }

    // ---------------------------------------------------------------------
    // Sleep mode
    // ---------------------------------------------------------------------

    /// Returns the sleep-mode record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Store`] if it cannot be read.
    pub async fn sleep_state(&self) -> Result<SleepModeState> {
        Ok(self
            .load_or(collections::SLEEP_MODE, keys::GLOBAL, SleepModeState::default)
            .await?)
    }

    /// Activates sleep mode.
    ///
    /// Remembers the PIR and automation flags, forces both off, closes the
    /// curtain and switches it to manual mode.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyActive`] if sleep mode is already on (the
    /// existing snapshot is kept) and [`Error::Store`] if a record cannot
    /// be read or written. A failed write leaves every record as it was.
    pub async fn activate_sleep(&self, actor: Option<&str>) -> Result<SleepModeState> {
        let _sleep = self.locks.sleep.lock().await;
        let now = self.clock.now();
        let mut sleep = self.sleep_state().await?;
        if sleep.is_active() {
            return Err(Error::AlreadyActive);
        }

        let (rules, pir, state) = {
            let _rules = self.locks.rules.lock().await;
            let _pir = self.locks.pir.lock().await;
            let _device = self.locks.device.lock().await;
            let prior_rules = self.rules().await?;
            let prior_pir = self.pir_settings().await?;
            let prior_state = self.load_device(now).await?;
            let prior_sleep = sleep.clone();

            sleep.activate(
                prior_pir.enabled,
                prior_rules.enabled,
                actor.map(str::to_string),
                now,
            )?;
            let rules = AutomationRules {
                enabled: false,
                ..prior_rules.clone()
            };
            let pir = PirSettings {
                enabled: false,
                last_updated: Some(now),
                ..prior_pir.clone()
            };
            let mut state = prior_state.clone();
            state.enter_sleep(now);

            // Forced flags first, the sleep record after them.
            self.commit(vec![
                StagedWrite::new(collections::AUTO_MODE_RULES, keys::GLOBAL, &prior_rules, &rules)?,
                StagedWrite::new(collections::PIR_SETTINGS, keys::GLOBAL, &prior_pir, &pir)?,
                StagedWrite::new(collections::SLEEP_MODE, keys::GLOBAL, &prior_sleep, &sleep)?,
                StagedWrite::new(collections::CURTAIN_DATA, keys::CURRENT, &prior_state, &state)?,
            ])
            .await?;
            (rules, pir, state)
        };
        tracing::info!(actor = ?actor, "Sleep mode activated");

        self.send_command(CurtainAction::Close, CommandSource::Sleep, now);
        self.publish(
            Topic::SleepMode,
            &SleepModePayload {
                active: true,
                pir_enabled: false,
                auto_mode_enabled: false,
                timestamp: now,
            },
        );

        self.notifier
            .emit(Notification::new(
                NotificationKind::SleepMode,
                "Sleep Mode Activated",
                format!(
                    "Sleep mode activated by {}. Curtain closed, PIR and auto mode disabled.",
                    actor.unwrap_or("system")
                ),
                Priority::Medium,
                now,
            ))
            .await;

        self.events.publish(EngineEvent::SleepModeChanged {
            active: true,
            pir_enabled: false,
            auto_enabled: false,
        });
        self.events.publish(EngineEvent::RulesChanged { rules });
        self.events
            .publish(EngineEvent::PirSettingsChanged { enabled: pir.enabled });
        self.events.publish(EngineEvent::StateChanged { state });
        Ok(sleep)
    }

    /// Deactivates sleep mode and restores the remembered flags.
    ///
    /// The curtain returns to automatic mode only if automation is restored
    /// as enabled.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotActive`] if sleep mode is off (nothing changes)
    /// and [`Error::Store`] if a record cannot be read or written. A failed
    /// write leaves sleep mode active and every record as it was.
    pub async fn deactivate_sleep(&self, actor: Option<&str>) -> Result<RestoredFlags> {
        let _sleep = self.locks.sleep.lock().await;
        let now = self.clock.now();
        let mut sleep = self.sleep_state().await?;
        let prior_sleep = sleep.clone();
        let restored = sleep.deactivate(actor.map(str::to_string), now)?;

        let (rules, pir, state) = {
            let _rules = self.locks.rules.lock().await;
            let _pir = self.locks.pir.lock().await;
            let _device = self.locks.device.lock().await;
            let prior_rules = self.rules().await?;
            let prior_pir = self.pir_settings().await?;
            let prior_state = self.load_device(now).await?;

            let rules = AutomationRules {
                enabled: restored.auto_enabled,
                ..prior_rules.clone()
            };
            let pir = PirSettings {
                enabled: restored.pir_enabled,
                last_updated: Some(now),
                ..prior_pir.clone()
            };
            let mut state = prior_state.clone();
            state.leave_sleep(restored.auto_enabled, now);

            self.commit(vec![
                StagedWrite::new(collections::AUTO_MODE_RULES, keys::GLOBAL, &prior_rules, &rules)?,
                StagedWrite::new(collections::PIR_SETTINGS, keys::GLOBAL, &prior_pir, &pir)?,
                StagedWrite::new(collections::SLEEP_MODE, keys::GLOBAL, &prior_sleep, &sleep)?,
                StagedWrite::new(collections::CURTAIN_DATA, keys::CURRENT, &prior_state, &state)?,
            ])
            .await?;
            (rules, pir, state)
        };
        tracing::info!(
            actor = ?actor,
            pir_enabled = restored.pir_enabled,
            auto_enabled = restored.auto_enabled,
            "Sleep mode deactivated"
        );

        self.publish(
            Topic::SleepMode,
            &SleepModePayload {
                active: false,
                pir_enabled: restored.pir_enabled,
                auto_mode_enabled: restored.auto_enabled,
                timestamp: now,
            },
        );
        self.publish(
            Topic::PirSettings,
            &PirSettingsPayload {
                pir_enabled: pir.enabled,
                timestamp: now,
            },
        );
        self.publish(Topic::Rules, &RulesPayload::from_rules(&rules, now));

        self.notifier
            .emit(Notification::new(
                NotificationKind::SleepMode,
                "Sleep Mode Deactivated",
                format!(
                    "Sleep mode deactivated by {}. PIR: {}, auto mode: {}.",
                    actor.unwrap_or("system"),
                    on_off(restored.pir_enabled),
                    on_off(restored.auto_enabled)
                ),
                Priority::Medium,
                now,
            ))
            .await;

        self.events.publish(EngineEvent::SleepModeChanged {
            active: false,
            pir_enabled: restored.pir_enabled,
            auto_enabled: restored.auto_enabled,
        });
        self.events.publish(EngineEvent::RulesChanged { rules });
        self.events
            .publish(EngineEvent::PirSettingsChanged { enabled: pir.enabled });
        self.events.publish(EngineEvent::StateChanged { state });
        Ok(restored)
    }

    // ---------------------------------------------------------------------
    // Rules and PIR settings
    // ---------------------------------------------------------------------

    /// Returns the stored rules, or the configured defaults if none exist.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Store`] if the rules cannot be read.
    pub async fn rules(&self) -> Result<AutomationRules> {
        let defaults = || self.config.default_rules.clone();
        Ok(self
            .load_or(collections::AUTO_MODE_RULES, keys::GLOBAL, defaults)
            .await?)
    }

    /// Validates and stores new rules, then sends them to the device.
    ///
    /// While sleep mode is active the master `enabled` flag is remembered
    /// for restoration and the stored flag stays off.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for inconsistent thresholds and
    /// [`Error::Store`] if the rules cannot be written.
    pub async fn update_rules(
        &self,
        mut rules: AutomationRules,
        actor: Option<&str>,
    ) -> Result<AutomationRules> {
        rules.validate()?;

        let _sleep = self.locks.sleep.lock().await;
        let _rules = self.locks.rules.lock().await;
        let now = self.clock.now();
        rules.updated_by = actor.map(str::to_string);
        rules.updated_at = Some(now);

        let mut sleep = self.sleep_state().await?;
        if sleep.remember_auto_enabled(rules.enabled) {
            self.repo
                .save(collections::SLEEP_MODE, keys::GLOBAL, &sleep)
                .await?;
            rules.enabled = false;
        }
        self.repo
            .save(collections::AUTO_MODE_RULES, keys::GLOBAL, &rules)
            .await?;
        tracing::info!(
            open = rules.light_open_threshold,
            close = rules.light_close_threshold,
            enabled = rules.enabled,
            "Automation rules updated"
        );

        self.publish(Topic::Rules, &RulesPayload::from_rules(&rules, now));
        self.events.publish(EngineEvent::RulesChanged {
            rules: rules.clone(),
        });
        Ok(rules)
    }

    /// Returns the stored PIR settings, or the configured default.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Store`] if the settings cannot be read.
    pub async fn pir_settings(&self) -> Result<PirSettings> {
        let enabled = self.config.default_pir_enabled;
        Ok(self
            .load_or(collections::PIR_SETTINGS, keys::GLOBAL, || {
                PirSettings::new(enabled)
            })
            .await?)
    }

    /// Switches PIR motion control on or off.
    ///
    /// While sleep mode is active the value is remembered for restoration
    /// and the stored flag stays off.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Store`] if the settings cannot be written.
    pub async fn set_pir_enabled(&self, enabled: bool, actor: Option<&str>) -> Result<PirSettings> {
        let _sleep = self.locks.sleep.lock().await;
        let _pir = self.locks.pir.lock().await;
        let now = self.clock.now();

        let mut sleep = self.sleep_state().await?;
        if sleep.remember_pir_enabled(enabled) {
            self.repo
                .save(collections::SLEEP_MODE, keys::GLOBAL, &sleep)
                .await?;
            tracing::info!(enabled, "PIR setting deferred until sleep mode ends");
            return self.pir_settings().await;
        }

        let settings = PirSettings {
            enabled,
            last_updated: Some(now),
            updated_by: actor.map(str::to_string),
        };
        self.repo
            .save(collections::PIR_SETTINGS, keys::GLOBAL, &settings)
            .await?;
        tracing::info!(enabled, "PIR settings updated");

        self.publish(
            Topic::PirSettings,
            &PirSettingsPayload {
                pir_enabled: enabled,
                timestamp: now,
            },
        );
        self.notifier
            .emit(Notification::new(
                NotificationKind::PirSettings,
                "PIR Motion Detection Updated",
                format!(
                    "{} {} PIR motion detection",
                    actor.unwrap_or("system"),
                    if enabled { "enabled" } else { "disabled" }
                ),
                Priority::Low,
                now,
            ))
            .await;
        self.events
            .publish(EngineEvent::PirSettingsChanged { enabled });
        Ok(settings)
    }

    // ---------------------------------------------------------------------
    // Listings
    // ---------------------------------------------------------------------

    /// Returns the most recent notifications, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Store`] if the store cannot be queried.
    pub async fn recent_notifications(&self, limit: usize) -> Result<Vec<Notification>> {
        let query = Query::newest_first("timestamp").limit(limit);
        Ok(self.repo.query(collections::NOTIFICATIONS, &query).await?)
    }

    /// Returns the most recent control log entries, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Store`] if the store cannot be queried.
    pub async fn recent_control_logs(&self, limit: usize) -> Result<Vec<ControlLogEntry>> {
        let query = Query::newest_first("timestamp").limit(limit);
        Ok(self.repo.query(collections::CONTROL_LOGS, &query).await?)
    }

    // ---------------------------------------------------------------------
    // Snapshots for device requests
    // ---------------------------------------------------------------------

    /// Sends the rules to the device.
    pub async fn publish_rules(&self) {
        let rules = self.rules_or_default().await;
        self.publish(
            Topic::Rules,
            &RulesPayload::from_rules(&rules, self.clock.now()),
        );
    }

    /// Sends the current status to the device.
    pub async fn publish_status(&self) {
        let now = self.clock.now();
        let state = self
            .current()
            .await
            .into_live()
            .unwrap_or_else(|| DeviceState::new(now));
        self.publish(Topic::Status, &StatusPayload::from_state(&state, now));
    }

    /// Sends the PIR settings to the device.
    pub async fn publish_pir_settings(&self) {
        let enabled = match self.pir_settings().await {
            Ok(pir) => pir.enabled,
            Err(e) => {
                tracing::warn!(error = %e, "PIR settings unavailable, sending default");
                self.config.default_pir_enabled
            }
        };
        self.publish(
            Topic::PirSettings,
            &PirSettingsPayload {
                pir_enabled: enabled,
                timestamp: self.clock.now(),
            },
        );
    }

    /// Sends the sleep-mode state to the device.
    pub async fn publish_sleep_mode(&self) {
        let active = match self.sleep_state().await {
            Ok(sleep) => sleep.is_active(),
            Err(e) => {
                tracing::warn!(error = %e, "Sleep state unavailable, reporting inactive");
                false
            }
        };
        let pir_enabled = match self.pir_settings().await {
            Ok(pir) => pir.enabled,
            Err(_) => self.config.default_pir_enabled,
        };
        let auto_mode_enabled = self.rules_or_default().await.enabled;
        self.publish(
            Topic::SleepMode,
            &SleepModePayload {
                active,
                pir_enabled,
                auto_mode_enabled,
                timestamp: self.clock.now(),
            },
        );
    }

    // ---------------------------------------------------------------------
    // Internals
    // ---------------------------------------------------------------------

    async fn apply_and_send(
        &self,
        action: CurtainAction,
        source: CommandSource,
    ) -> Result<(DeviceState, bool)> {
        let state = {
            let _device = self.locks.device.lock().await;
            let now = self.clock.now();
            let mut state = self.load_device(now).await?;
            state.apply_action(action, now);
            self.save_device(&state).await?;
            state
        };
        tracing::info!(action = %action, source = %source, "Command applied");

        let delivered = self.send_command(action, source, state.updated_at());
        self.events.publish(EngineEvent::StateChanged {
            state: state.clone(),
        });
        Ok((state, delivered))
    }

    // Writes every staged document in order. If one fails, the documents
    // already written are put back to their prior content before the error
    // is returned.
    async fn commit(&self, writes: Vec<StagedWrite>) -> std::result::Result<(), StoreError> {
        for (done, write) in writes.iter().enumerate() {
            if let Err(e) = self.repo.save(write.collection, write.key, &write.next).await {
                tracing::warn!(collection = write.collection, error = %e, "Write failed, rolling back");
                for undo in writes[..done].iter().rev() {
                    if let Err(undo_err) = self.repo.save(undo.collection, undo.key, &undo.prior).await {
                        tracing::error!(
                            collection = undo.collection,
                            error = %undo_err,
                            "Rollback failed"
                        );
                    }
                }
                return Err(e);
            }
        }
        Ok(())
    }

    // Drops an automatic movement that repeats the last one within the
    // settle window, while the device catches up with the first command.
    fn settle(&self, mut decision: Decision, now: DateTime<Utc>) -> Decision {
        let Some(movement) = decision.movement else {
            return decision;
        };
        let mut last = self.last_auto.lock();
        if let Some((action, at)) = *last
            && action == movement.action
            && now - at < delta(self.config.auto_command_settle)
        {
            tracing::debug!(action = %action, "Automatic command already issued, waiting for device");
            decision.movement = None;
        } else {
            *last = Some((movement.action, now));
        }
        decision
    }

    async fn act_automatically(&self, movement: &CurtainMove, now: DateTime<Utc>) {
        tracing::info!(
            action = %movement.action,
            factor = %movement.trigger.factor,
            measured = movement.trigger.measured,
            threshold = movement.trigger.threshold,
            "Automatic curtain movement"
        );
        self.send_command(movement.action, CommandSource::Automation, now);
        self.notifier
            .emit(Notification::new(
                NotificationKind::AutoMode,
                "Auto Mode Action",
                movement.describe(),
                Priority::Low,
                now,
            ))
            .await;
    }

    async fn raise_alert(&self, kind: AlertKind, value: f64, threshold: f64, now: DateTime<Utc>) {
        {
            let mut last = self.last_alerts.lock();
            if let Some(at) = last.get(&kind)
                && now - *at < delta(self.config.alert_repeat_interval)
            {
                return;
            }
            last.insert(kind, now);
        }

        tracing::info!(reason = kind.reason(), value, threshold, "Raising alert");
        self.publish(
            Topic::Control,
            &BuzzerAlert::new(kind, value, threshold, now),
        );

        let notification = match kind {
            AlertKind::HighTemperature => Notification::new(
                NotificationKind::TemperatureHigh,
                "High Temperature Alert",
                format!("Temperature {value}°C exceeds threshold {threshold}°C"),
                Priority::High,
                now,
            ),
            AlertKind::HighHumidity => Notification::new(
                NotificationKind::HumidityHigh,
                "High Humidity Alert",
                format!("Humidity {value}% exceeds threshold {threshold}%"),
                Priority::High,
                now,
            ),
        };
        self.notifier.emit(notification).await;
    }

    async fn capture_history(&self, state: &DeviceState, now: DateTime<Utc>) {
        let _history = self.locks.history.lock().await;
        let marker = match self
            .repo
            .load::<HistoryMarker>(collections::CURTAIN_DATA, keys::HISTORY_TRACKER)
            .await
        {
            Ok(marker) => marker,
            Err(e) => {
                tracing::warn!(error = %e, "History marker unavailable, skipping sample");
                return;
            }
        };
        if !HistoryMarker::is_due(marker.as_ref(), now, self.config.history_interval) {
            return;
        }

        if let Err(e) = self
            .repo
            .append(
                collections::CURTAIN_HISTORY,
                &HistorySample::capture(state, now),
            )
            .await
        {
            tracing::warn!(error = %e, "Failed to write history sample");
            return;
        }
        let marker = HistoryMarker {
            last_save_time: now,
        };
        if let Err(e) = self
            .repo
            .save(collections::CURTAIN_DATA, keys::HISTORY_TRACKER, &marker)
            .await
        {
            tracing::warn!(error = %e, "Failed to update history marker");
        }
    }

    fn send_command(&self, action: CurtainAction, source: CommandSource, at: DateTime<Utc>) -> bool {
        let delivered = self.publish(Topic::Control, &ControlCommand::new(action, source, at));
        self.events.publish(EngineEvent::CommandIssued {
            action,
            source,
            delivered,
        });
        delivered
    }

    fn publish<T: Serialize>(&self, topic: Topic, message: &T) -> bool {
        match publish_json(&self.channel, topic, message) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(topic = %topic, error = %e, "Dropping publish");
                false
            }
        }
    }

    async fn rules_or_default(&self) -> AutomationRules {
        match self.rules().await {
            Ok(rules) => rules,
            Err(e) => {
                tracing::warn!(error = %e, "Rules unavailable, using defaults");
                self.config.default_rules.clone()
            }
        }
    }

    async fn load_device(&self, now: DateTime<Utc>) -> std::result::Result<DeviceState, StoreError> {
        self.load_or(collections::CURTAIN_DATA, keys::CURRENT, || {
            DeviceState::new(now)
        })
        .await
    }

    async fn save_device(&self, state: &DeviceState) -> std::result::Result<(), StoreError> {
        self.repo
            .save(collections::CURTAIN_DATA, keys::CURRENT, state)
            .await
    }

    async fn load_or<T: DeserializeOwned>(
        &self,
        collection: &str,
        key: &str,
        default: impl FnOnce() -> T,
    ) -> std::result::Result<T, StoreError> {
        Ok(self
            .repo
            .load(collection, key)
            .await?
            .unwrap_or_else(default))
    }
}

impl<S, C> std::fmt::Debug for CurtainEngine<S, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CurtainEngine")
            .field("config", &self.config)
            .field("motion", &self.motion.phase())
            .finish_non_exhaustive()
    }
}

fn delta(duration: Duration) -> TimeDelta {
    TimeDelta::from_std(duration).unwrap_or(TimeDelta::MAX)
}

fn on_off(enabled: bool) -> &'static str {
    if enabled { "enabled" } else { "disabled" }
}
