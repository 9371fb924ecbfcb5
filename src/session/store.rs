// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Session state store.
//!
//! Owns the idle clock, the current state and the warning slot for one
//! authenticated session. All methods take `now` explicitly; remaining time is
//! always derived from `(now, last_activity_at, inactivity_budget)` and never
//! stored. Only the tick scheduler (time-driven transitions) and the activity
//! recorder (resets) mutate it.

use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;

use super::activity::ActivityKind;
use super::config::SessionConfig;
use super::state::{SessionState, SessionStatus};
use super::warning::{ActiveWarning, WarningDispatcher, WarningKind, WarningSnapshot};

/// Idle clock. `remaining` is a pure function of its fields and `now`.
#[derive(Debug, Clone, Copy)]
pub struct SessionClock {
    pub last_activity_at: Instant,
    pub inactivity_budget: Duration,
}

impl SessionClock {
    pub fn elapsed(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_activity_at)
    }

    pub fn remaining(&self, now: Instant) -> Duration {
        self.inactivity_budget.saturating_sub(self.elapsed(now))
    }
}

/// Everything an observer needs in one value
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    pub warning: WarningSnapshot,
}

/// Result of one scheduler evaluation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing changed besides remaining time
    Steady(SessionStatus),
    /// State moved and/or a warning was raised
    Transition {
        from: SessionState,
        status: SessionStatus,
        raised: Option<ActiveWarning>,
    },
    /// The budget ran out on this tick
    Expired(SessionStatus),
    /// Tick after expiry; ignored
    AlreadyExpired,
}

/// Result of a recorded activity
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivityOutcome {
    /// Clock reset; status as of the reset
    Recorded(SessionStatus),
    /// No authenticated session to extend
    NoSession,
    /// The session already expired and cannot be extended
    Expired,
}

impl ActivityOutcome {
    pub fn is_recorded(&self) -> bool {
        matches!(self, ActivityOutcome::Recorded(_))
    }
}

/// State store for one session
#[derive(Debug)]
pub struct SessionStore {
    session_id: String,
    user_id: String,
    config: SessionConfig,
    clock: SessionClock,
    state: SessionState,
    dispatcher: WarningDispatcher,
    /// Idle time observed by the previous tick of this idle run
    previous_elapsed: Duration,
    started_at: Instant,
}

impl SessionStore {
    pub fn new(
        session_id: impl Into<String>,
        user_id: impl Into<String>,
        config: SessionConfig,
        now: Instant,
    ) -> Self {
        let dispatcher = WarningDispatcher::new(config.thresholds.len());
        Self {
            session_id: session_id.into(),
            user_id: user_id.into(),
            clock: SessionClock {
                last_activity_at: now,
                inactivity_budget: config.inactivity_budget,
            },
            config,
            state: SessionState::Active,
            dispatcher,
            previous_elapsed: Duration::ZERO,
            started_at: now,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn clock(&self) -> SessionClock {
        self.clock
    }

    pub fn session_duration(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.started_at)
    }

    /// Current status. The state is the one settled by the last tick or
    /// reset; remaining time is derived from `now`.
    pub fn status(&self, now: Instant) -> SessionStatus {
        let remaining = if self.state.is_terminal() {
            Duration::ZERO
        } else {
            self.clock.remaining(now)
        };
        SessionStatus::new(self.state, remaining)
    }

    pub fn warning(&self) -> WarningSnapshot {
        self.dispatcher.snapshot()
    }

    pub fn snapshot(&self, now: Instant) -> SessionSnapshot {
        SessionSnapshot {
            status: self.status(now),
            warning: self.warning(),
        }
    }

    /// Transition function: state for an idle run at `elapsed`
    fn derive_state(&self, elapsed: Duration) -> SessionState {
        if elapsed >= self.config.inactivity_budget {
            return SessionState::Expired;
        }
        match self.dispatcher.escalation() {
            Some(WarningKind::Critical) => SessionState::Critical,
            Some(WarningKind::Warning) => SessionState::Warning,
            None => match self.config.inactive_after {
                Some(window) if elapsed >= window => SessionState::Inactive,
                _ => SessionState::Active,
            },
        }
    }

    /// One scheduler evaluation at `now`.
    pub fn tick(&mut self, now: Instant) -> TickOutcome {
        if self.state.is_terminal() {
            return TickOutcome::AlreadyExpired;
        }

        let elapsed = self.clock.elapsed(now);
        let from = self.state;

        if elapsed >= self.config.inactivity_budget {
            self.state = SessionState::Expired;
            self.dispatcher.dismiss();
            return TickOutcome::Expired(self.status(now));
        }

        let raised = self.dispatcher.evaluate(
            &self.config.thresholds,
            elapsed,
            Some(self.previous_elapsed),
            self.config.tick_period,
        );
        self.previous_elapsed = elapsed;
        self.state = self.derive_state(elapsed);

        let status = self.status(now);
        if raised.is_some() || self.state != from {
            TickOutcome::Transition { from, status, raised }
        } else {
            TickOutcome::Steady(status)
        }
    }

    /// Reset the idle clock. Rejected once expired.
    pub fn record_activity(&mut self, _kind: ActivityKind, now: Instant) -> ActivityOutcome {
        if self.state.is_terminal() {
            return ActivityOutcome::Expired;
        }
        // A stale `now` (taken before a concurrent tick) must not move the clock back
        self.clock.last_activity_at = self.clock.last_activity_at.max(now);
        self.dispatcher.reset();
        self.previous_elapsed = Duration::ZERO;
        self.state = SessionState::Active;
        ActivityOutcome::Recorded(SessionStatus::new(self.state, self.config.inactivity_budget))
    }

    /// Hide the visible warning without touching the clock or the state
    pub fn dismiss_warning(&mut self) -> Option<ActiveWarning> {
        self.dispatcher.dismiss()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::config::WarningThreshold;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    fn scenario_config() -> SessionConfig {
        SessionConfig::new(
            ms(60_000),
            vec![
                WarningThreshold::new(ms(50_000), WarningKind::Warning, "10s"),
                WarningThreshold::new(ms(58_000), WarningKind::Critical, "2s"),
            ],
            ms(1_000),
        )
    }

    fn store_at(t0: Instant) -> SessionStore {
        SessionStore::new("sess-test", "user-1", scenario_config(), t0)
    }

    /// Tick once per second from `from` to `to` (inclusive), collecting outcomes
    fn run(store: &mut SessionStore, t0: Instant, from: u64, to: u64) -> Vec<(u64, TickOutcome)> {
        (from..=to)
            .step_by(1_000)
            .map(|t| (t, store.tick(t0 + ms(t))))
            .collect()
    }

    #[test]
    fn test_idle_run_escalates_in_order() {
        let t0 = Instant::now();
        let mut store = store_at(t0);
        let outcomes = run(&mut store, t0, 1_000, 61_000);

        let mut states = Vec::new();
        for (t, outcome) in &outcomes {
            match outcome {
                TickOutcome::Steady(s) | TickOutcome::Transition { status: s, .. } | TickOutcome::Expired(s) => {
                    states.push((*t, s.state))
                }
                TickOutcome::AlreadyExpired => {}
            }
        }

        for (t, state) in &states {
            let expected = match *t {
                t if t < 50_000 => SessionState::Active,
                t if t < 58_000 => SessionState::Warning,
                t if t < 60_000 => SessionState::Critical,
                _ => SessionState::Expired,
            };
            assert_eq!(*state, expected, "at t={}", t);
        }

        // Expiry fires exactly once
        let expired_count = outcomes
            .iter()
            .filter(|(_, o)| matches!(o, TickOutcome::Expired(_)))
            .count();
        assert_eq!(expired_count, 1);
        assert_eq!(outcomes.last().map(|(_, o)| o.clone()), Some(TickOutcome::AlreadyExpired));
    }

    #[test]
    fn test_remaining_is_non_increasing() {
        let t0 = Instant::now();
        let mut store = store_at(t0);
        let mut last = store.status(t0).remaining;
        for t in (250..=59_750).step_by(250) {
            store.tick(t0 + ms(t));
            let remaining = store.status(t0 + ms(t)).remaining;
            assert!(remaining <= last);
            last = remaining;
        }
    }

    #[test]
    fn test_activity_resets_clock_and_warning() {
        let t0 = Instant::now();
        let mut store = store_at(t0);
        run(&mut store, t0, 1_000, 55_000);
        assert_eq!(store.state(), SessionState::Warning);
        assert!(store.warning().show);

        let outcome = store.record_activity(ActivityKind::Navigation, t0 + ms(55_000));
        match outcome {
            ActivityOutcome::Recorded(status) => {
                assert_eq!(status.state, SessionState::Active);
                assert_eq!(status.remaining, ms(60_000));
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert!(!store.warning().show);

        // No CRITICAL at the original 58s mark
        let outcomes = run(&mut store, t0, 56_000, 100_000);
        assert!(outcomes.iter().all(|(_, o)| !matches!(
            o,
            TickOutcome::Transition { raised: Some(ActiveWarning { kind: WarningKind::Critical, .. }), .. }
        )));
        assert_eq!(store.state(), SessionState::Active);
    }

    #[test]
    fn test_double_activity_same_instant() {
        let t0 = Instant::now();
        let mut once = store_at(t0);
        let mut twice = store_at(t0);
        let now = t0 + ms(20_000);

        let a = once.record_activity(ActivityKind::Save, now);
        twice.record_activity(ActivityKind::Save, now);
        let b = twice.record_activity(ActivityKind::Save, now);

        assert_eq!(a, b);
        assert_eq!(once.status(now), twice.status(now));
    }

    #[test]
    fn test_stale_activity_does_not_rewind_clock() {
        let t0 = Instant::now();
        let mut store = store_at(t0);
        store.record_activity(ActivityKind::Save, t0 + ms(10_000));
        store.record_activity(ActivityKind::Save, t0 + ms(5_000));
        assert_eq!(store.clock().last_activity_at, t0 + ms(10_000));
    }

    #[test]
    fn test_dismiss_keeps_state_and_clock() {
        let t0 = Instant::now();
        let mut store = store_at(t0);
        run(&mut store, t0, 1_000, 58_000);
        assert_eq!(store.state(), SessionState::Critical);

        let before = store.clock().last_activity_at;
        assert!(store.dismiss_warning().is_some());
        assert!(store.dismiss_warning().is_none());
        assert_eq!(store.clock().last_activity_at, before);
        assert_eq!(store.state(), SessionState::Critical);

        // CRITICAL is not re-raised before expiry
        let outcomes = run(&mut store, t0, 59_000, 59_000);
        assert!(matches!(outcomes[0].1, TickOutcome::Steady(_)));
        assert!(!store.warning().show);
    }

    #[test]
    fn test_activity_after_expiry_is_rejected() {
        let t0 = Instant::now();
        let mut store = store_at(t0);
        assert!(matches!(store.tick(t0 + ms(60_000)), TickOutcome::Expired(_)));

        let outcome = store.record_activity(ActivityKind::ManualExtension, t0 + ms(60_100));
        assert_eq!(outcome, ActivityOutcome::Expired);
        assert_eq!(store.state(), SessionState::Expired);
        assert_eq!(store.status(t0 + ms(60_100)).remaining, Duration::ZERO);
    }

    #[test]
    fn test_late_first_tick_catches_warning() {
        let t0 = Instant::now();
        let mut store = store_at(t0);
        let outcome = store.tick(t0 + ms(53_000));
        match outcome {
            TickOutcome::Transition { raised: Some(w), status, .. } => {
                assert_eq!(w.kind, WarningKind::Warning);
                assert_eq!(status.state, SessionState::Warning);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn test_inactive_sub_state() {
        let t0 = Instant::now();
        let config = scenario_config().with_inactive_after(Some(ms(30_000)));
        let mut store = SessionStore::new("sess", "user", config, t0);

        store.tick(t0 + ms(29_000));
        assert_eq!(store.state(), SessionState::Active);
        let outcome = store.tick(t0 + ms(30_000));
        assert!(matches!(
            outcome,
            TickOutcome::Transition { from: SessionState::Active, raised: None, .. }
        ));
        assert_eq!(store.state(), SessionState::Inactive);
        store.tick(t0 + ms(50_000));
        assert_eq!(store.state(), SessionState::Warning);
    }
}
