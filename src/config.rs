// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Engine configuration.

use std::time::Duration;

use crate::automation::AutomationRules;

/// Tunables for [`CurtainEngine`](crate::CurtainEngine).
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use curtain_engine::EngineConfig;
///
/// let config = EngineConfig::default()
///     .with_pir_cooldown(Duration::from_secs(10))
///     .with_history_interval(Duration::from_secs(120));
///
/// assert_eq!(config.pir_cooldown, Duration::from_secs(10));
/// assert_eq!(config.history_limit, 1000);
/// ```
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Minimum spacing between two history samples.
    pub history_interval: Duration,
    /// Maximum number of rows returned by a history query.
    pub history_limit: usize,
    /// Window used when the caller asks for history without one.
    pub default_history_window: Duration,
    /// Delay between a fresh motion trigger and acting on it.
    pub pir_debounce: Duration,
    /// Period after a motion-driven action during which triggers are ignored.
    pub pir_cooldown: Duration,
    /// Identical notifications inside this window are collapsed into one.
    pub notification_dedup_window: Duration,
    /// The same automatic action is not re-issued within this window.
    pub auto_command_settle: Duration,
    /// The same alert kind is not re-raised within this window.
    pub alert_repeat_interval: Duration,
    /// Deadline for a single document store round trip.
    pub store_timeout: Duration,
    /// Rules used until an explicit rule document has been written.
    pub default_rules: AutomationRules,
    /// PIR enablement used until an explicit settings document exists.
    pub default_pir_enabled: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            history_interval: Duration::from_secs(60),
            history_limit: 1000,
            default_history_window: Duration::from_secs(24 * 60 * 60),
            pir_debounce: Duration::from_millis(600),
            pir_cooldown: Duration::from_secs(5),
            notification_dedup_window: Duration::from_secs(5),
            auto_command_settle: Duration::from_secs(30),
            alert_repeat_interval: Duration::from_secs(5 * 60),
            store_timeout: Duration::from_secs(5),
            default_rules: AutomationRules::default(),
            default_pir_enabled: true,
        }
    }
}

impl EngineConfig {
    /// Sets the history sampling interval.
    #[must_use]
    pub fn with_history_interval(mut self, interval: Duration) -> Self {
        self.history_interval = interval;
        self
    }

    /// Sets the history row limit.
    #[must_use]
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    /// Sets the PIR debounce delay.
    #[must_use]
    pub fn with_pir_debounce(mut self, debounce: Duration) -> Self {
        self.pir_debounce = debounce;
        self
    }

    /// Sets the PIR cooldown period.
    #[must_use]
    pub fn with_pir_cooldown(mut self, cooldown: Duration) -> Self {
        self.pir_cooldown = cooldown;
        self
    }

    /// Sets the notification deduplication window.
    #[must_use]
    pub fn with_notification_dedup_window(mut self, window: Duration) -> Self {
        self.notification_dedup_window = window;
        self
    }

    /// Sets the automatic command settle window.
    #[must_use]
    pub fn with_auto_command_settle(mut self, window: Duration) -> Self {
        self.auto_command_settle = window;
        self
    }

    /// Sets the alert repeat interval.
    #[must_use]
    pub fn with_alert_repeat_interval(mut self, interval: Duration) -> Self {
        self.alert_repeat_interval = interval;
        self
    }

    /// Sets the store operation timeout.
    #[must_use]
    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    /// Sets the fallback automation rules.
    #[must_use]
    pub fn with_default_rules(mut self, rules: AutomationRules) -> Self {
        self.default_rules = rules;
        self
    }

    /// Sets the fallback PIR enablement.
    #[must_use]
    pub fn with_default_pir_enabled(mut self, enabled: bool) -> Self {
        self.default_pir_enabled = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.history_interval, Duration::from_secs(60));
        assert_eq!(config.pir_debounce, Duration::from_millis(600));
        assert_eq!(config.pir_cooldown, Duration::from_secs(5));
        assert_eq!(config.default_rules.light_open_threshold, 250);
        assert_eq!(config.default_rules.light_close_threshold, 500);
        assert!(config.default_pir_enabled);
    }

    #[test]
    fn builder_chain() {
        let config = EngineConfig::default()
            .with_history_limit(10)
            .with_store_timeout(Duration::from_millis(50))
            .with_default_pir_enabled(false);
        assert_eq!(config.history_limit, 10);
        assert_eq!(config.store_timeout, Duration::from_millis(50));
        assert!(!config.default_pir_enabled);
    }
}
