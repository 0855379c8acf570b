// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Debounce and cooldown for PIR motion events.
//!
//! A motion event first waits out a short debounce window. If it results in
//! a curtain command, further events are ignored until the cooldown has
//! elapsed. Events arriving while another one is being debounced are
//! dropped, so a burst of detections produces at most one command.
//!
//! An accepted event is represented by a [`MotionPermit`]. Dropping the
//! permit without finishing it (for example when the handling task is
//! cancelled during the debounce) returns the handler to idle.

use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

use super::CurtainMove;

/// Where the handler is in its debounce/cooldown cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionPhase {
    /// Ready to accept an event.
    Idle,
    /// An event is being debounced.
    Debouncing {
        /// When the debounce started.
        since: Instant,
    },
    /// A command was issued; events are ignored until `until`.
    Cooling {
        /// End of the cooldown.
        until: Instant,
    },
}

/// Result of handling one motion event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MotionOutcome {
    /// Motion control is switched off or sleep mode is active.
    Disabled,
    /// Another event is already being debounced.
    Debouncing,
    /// A recent event already moved the curtain.
    CoolingDown,
    /// The event was processed but no movement was needed.
    NoAction,
    /// The curtain was moved.
    Acted(CurtainMove),
}

impl MotionOutcome {
    /// Returns `true` if a command was issued.
    #[must_use]
    pub const fn acted(&self) -> bool {
        matches!(self, Self::Acted(_))
    }
}

/// Debounce/cooldown state machine shared by concurrent motion tasks.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use tokio::time::Instant;
/// use curtain_engine::automation::{MotionHandler, MotionOutcome};
///
/// let handler = MotionHandler::new(Duration::from_millis(600), Duration::from_secs(5));
/// let now = Instant::now();
/// let permit = handler.begin(now).unwrap();
/// assert_eq!(handler.begin(now).err(), Some(MotionOutcome::Debouncing));
/// permit.finish(true, now);
/// assert_eq!(handler.begin(now).err(), Some(MotionOutcome::CoolingDown));
/// ```
#[derive(Debug)]
pub struct MotionHandler {
    debounce: Duration,
    cooldown: Duration,
    phase: Mutex<MotionPhase>,
}

impl MotionHandler {
    /// Creates an idle handler.
    #[must_use]
    pub fn new(debounce: Duration, cooldown: Duration) -> Self {
        Self {
            debounce,
            cooldown,
            phase: Mutex::new(MotionPhase::Idle),
        }
    }

    /// How long an accepted event waits before acting.
    #[must_use]
    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    /// Returns the current phase.
    #[must_use]
    pub fn phase(&self) -> MotionPhase {
        *self.phase.lock()
    }

    /// Tries to accept an event at `now`.
    ///
    /// On success the handler enters the debouncing phase until the
    /// returned permit is finished or dropped.
    ///
    /// # Errors
    ///
    /// Returns the outcome to report when the event is dropped.
    pub fn begin(&self, now: Instant) -> Result<MotionPermit<'_>, MotionOutcome> {
        let mut phase = self.phase.lock();
        match *phase {
            MotionPhase::Debouncing { .. } => Err(MotionOutcome::Debouncing),
            MotionPhase::Cooling { until } if now < until => Err(MotionOutcome::CoolingDown),
            MotionPhase::Idle | MotionPhase::Cooling { .. } => {
                *phase = MotionPhase::Debouncing { since: now };
                Ok(MotionPermit {
                    handler: self,
                    finished: false,
                })
            }
        }
    }
}

/// An accepted motion event holding the handler in its debouncing phase.
///
/// Dropped without [`finish`](Self::finish), it resets the handler to idle.
#[derive(Debug)]
#[must_use = "dropping the permit immediately cancels the event"]
pub struct MotionPermit<'a> {
    handler: &'a MotionHandler,
    finished: bool,
}

impl MotionPermit<'_> {
    /// Completes the event.
    ///
    /// Starts the cooldown if a command was issued, otherwise returns to idle.
    pub fn finish(mut self, acted: bool, now: Instant) {
        self.finished = true;
        *self.handler.phase.lock() = if acted {
            MotionPhase::Cooling {
                until: now + self.handler.cooldown,
            }
        } else {
            MotionPhase::Idle
        };
    }
}

impl Drop for MotionPermit<'_> {
    fn drop(&mut self) {
        if !self.finished {
            *self.handler.phase.lock() = MotionPhase::Idle;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handler() -> MotionHandler {
        MotionHandler::new(Duration::from_millis(600), Duration::from_secs(5))
    }

    #[test]
    fn idle_handler_accepts() {
        let handler = handler();
        let now = Instant::now();
        let _permit = handler.begin(now).unwrap();
        assert_eq!(handler.phase(), MotionPhase::Debouncing { since: now });
    }

    #[test]
    fn concurrent_event_is_dropped() {
        let handler = handler();
        let now = Instant::now();
        let _permit = handler.begin(now).unwrap();
        assert_eq!(
            handler.begin(now + Duration::from_millis(100)).err(),
            Some(MotionOutcome::Debouncing)
        );
    }

    #[test]
    fn no_action_returns_to_idle() {
        let handler = handler();
        let now = Instant::now();
        handler.begin(now).unwrap().finish(false, now);
        assert_eq!(handler.phase(), MotionPhase::Idle);
        assert!(handler.begin(now).is_ok());
    }

    #[test]
    fn cooldown_blocks_until_elapsed() {
        let handler = handler();
        let now = Instant::now();
        handler.begin(now).unwrap().finish(true, now);

        assert_eq!(
            handler.begin(now + Duration::from_secs(4)).err(),
            Some(MotionOutcome::CoolingDown)
        );
        assert!(handler.begin(now + Duration::from_secs(5)).is_ok());
    }

    #[test]
    fn abandoned_permit_returns_to_idle() {
        let handler = handler();
        let now = Instant::now();
        let permit = handler.begin(now).unwrap();
        drop(permit);

        assert_eq!(handler.phase(), MotionPhase::Idle);
        assert!(handler.begin(now + Duration::from_millis(10)).is_ok());
    }

    #[test]
    fn finished_permit_keeps_cooldown() {
        let handler = handler();
        let now = Instant::now();
        let permit = handler.begin(now).unwrap();
        permit.finish(true, now);
        assert!(matches!(handler.phase(), MotionPhase::Cooling { .. }));
    }

    #[test]
    fn acted_outcome() {
        assert!(!MotionOutcome::NoAction.acted());
        assert!(!MotionOutcome::CoolingDown.acted());
    }
}
