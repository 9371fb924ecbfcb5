// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! End-to-end session lifecycle tests.
//!
//! All tests run on Tokio's paused clock, so a full idle run completes
//! instantly and every tick lands at an exact instant. Observations are taken
//! half a tick after each tick to stay clear of timer ordering ties.

use std::sync::Arc;
use std::time::Duration;

use sessionwatch::session::{
    ActivityEntry, ActivityKind, ActivityOutcome, ActivitySink, AuthProvider, LocalAuth,
    NoopActivityLog, SessionConfig, SessionManager, SessionState, User, WarningKind,
    WarningPresentation, WarningThreshold,
};
use tokio::sync::mpsc;
use tokio::time::sleep;

fn ms(value: u64) -> Duration {
    Duration::from_millis(value)
}

/// Budget 60s, WARNING at 50s ("10s"), CRITICAL at 58s ("2s"), 1s tick
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

fn signed_in() -> Arc<LocalAuth> {
    Arc::new(LocalAuth::signed_in(User::new("analyst-7", "Dana Reyes")))
}

fn start(auth: &Arc<LocalAuth>, sink: Arc<dyn ActivitySink>) -> SessionManager {
    let manager = SessionManager::new(scenario_config(), auth.clone(), sink).expect("valid config");
    manager.sync_with_auth().expect("session started");
    manager
}

/// Advance the paused clock from `current_secs` to `target_secs`
async fn advance_to(current_secs: &mut u64, target_secs: u64) {
    if target_secs > *current_secs {
        sleep(ms((target_secs - *current_secs) * 1_000)).await;
        *current_secs = target_secs;
    }
}

struct FailingSink;

impl ActivitySink for FailingSink {
    fn record(&self, _entry: &ActivityEntry) -> anyhow::Result<()> {
        anyhow::bail!("disk full")
    }
}

struct ChannelSink(mpsc::UnboundedSender<ActivityEntry>);

impl ActivitySink for ChannelSink {
    fn record(&self, entry: &ActivityEntry) -> anyhow::Result<()> {
        self.0.send(entry.clone())?;
        Ok(())
    }
}

// =============================================================================
// SCENARIOS
// =============================================================================

#[tokio::test(start_paused = true)]
async fn scenario_a_idle_run_escalates_then_expires() {
    let auth = signed_in();
    let manager = start(&auth, Arc::new(NoopActivityLog));

    sleep(ms(500)).await;
    let mut severity = 0;
    for second in 1..=60u64 {
        sleep(ms(1_000)).await;
        let status = manager.status().expect("session present");
        let expected = match second {
            s if s < 50 => SessionState::Active,
            s if s < 58 => SessionState::Warning,
            s if s < 60 => SessionState::Critical,
            _ => SessionState::Expired,
        };
        assert_eq!(status.state, expected, "at t={}.5s", second);
        assert!(status.state.severity() >= severity, "severity dropped at t={}.5s", second);
        severity = status.state.severity();

        let warning = manager.warning();
        match second {
            50..=57 => {
                assert_eq!(warning.kind, Some(WarningKind::Warning));
                assert_eq!(warning.label.as_deref(), Some("10s"));
                assert_eq!(warning.presentation, Some(WarningPresentation::Toast));
            }
            58..=59 => {
                assert_eq!(warning.kind, Some(WarningKind::Critical));
                assert_eq!(warning.presentation, Some(WarningPresentation::Modal));
            }
            _ => assert!(!warning.show, "unexpected warning at t={}.5s", second),
        }

        if second == 60 {
            assert_eq!(status.remaining, Duration::ZERO);
            assert_eq!(status.formatted_remaining, "0:00");
            // Logout waits for the grace delay
            assert_eq!(auth.logout_count(), 0);
        }
    }

    // Logout lands at 61.5s, after which the session is no longer reported
    sleep(ms(2_000)).await;
    assert_eq!(auth.logout_count(), 1);
    assert!(auth.current_user().is_none());
    assert!(manager.status().is_none());
    assert!(!manager.is_ticking());
}

#[tokio::test(start_paused = true)]
async fn scenario_b_activity_during_warning_resets() {
    let auth = signed_in();
    let manager = start(&auth, Arc::new(NoopActivityLog));

    // Observe half a tick after each tick
    sleep(ms(500)).await;
    let mut now = 0;
    advance_to(&mut now, 55).await;
    assert_eq!(manager.status().unwrap().state, SessionState::Warning);
    assert!(manager.warning().show);

    let outcome = manager.record_activity(ActivityKind::FormInteraction, Some("edited payout batch"));
    assert!(outcome.is_recorded());
    let status = manager.status().unwrap();
    assert_eq!(status.state, SessionState::Active);
    assert_eq!(status.remaining, ms(60_000));
    assert!(!manager.warning().show);

    // No CRITICAL at the original 58s mark, nor anywhere in the new run's first 50s
    for second in 56..=104 {
        advance_to(&mut now, second).await;
        assert_eq!(manager.status().unwrap().state, SessionState::Active, "at t={}s", second);
        assert!(!manager.warning().show);
    }
    assert_eq!(auth.logout_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn scenario_c_extend_while_critical_dismisses() {
    let auth = signed_in();
    let manager = start(&auth, Arc::new(NoopActivityLog));

    sleep(ms(58_500)).await;
    let warning = manager.warning();
    assert!(warning.show);
    assert_eq!(warning.kind, Some(WarningKind::Critical));

    match manager.extend_session() {
        ActivityOutcome::Recorded(status) => {
            assert_eq!(status.state, SessionState::Active);
            assert_eq!(status.remaining, ms(60_000));
        }
        other => panic!("extend failed: {:?}", other),
    }
    assert!(!manager.warning().show);

    // The old expiry deadline passes without logout
    sleep(ms(10_000)).await;
    assert_eq!(manager.status().unwrap().state, SessionState::Active);
    assert_eq!(auth.logout_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn scenario_d_sign_out_mid_countdown_stops_scheduler() {
    let auth = signed_in();
    let manager = start(&auth, Arc::new(NoopActivityLog));
    let rx = manager.subscribe();

    sleep(ms(30_500)).await;
    auth.logout();
    assert_eq!(manager.sync_with_auth(), None);
    assert!(rx.borrow().is_none());

    sleep(ms(120_000)).await;
    assert_eq!(auth.logout_count(), 1, "logout must not be invoked a second time");
    assert!(manager.status().is_none());
    assert!(!manager.is_ticking());
    assert!(rx.borrow().is_none());
}

#[tokio::test(start_paused = true)]
async fn scenario_d_sign_out_during_grace_skips_logout() {
    let auth = signed_in();
    let manager = start(&auth, Arc::new(NoopActivityLog));

    // Expired at 60s, logout scheduled for 61.5s
    sleep(ms(60_500)).await;
    assert_eq!(manager.status().unwrap().state, SessionState::Expired);

    auth.logout();
    manager.sync_with_auth();
    sleep(ms(10_000)).await;
    assert_eq!(auth.logout_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn sign_out_by_provider_alone_stops_the_countdown() {
    let auth = signed_in();
    let manager = start(&auth, Arc::new(NoopActivityLog));
    let rx = manager.subscribe();

    // Signed out elsewhere; nobody calls sync_with_auth
    sleep(ms(30_500)).await;
    auth.logout();

    sleep(ms(60_000)).await;
    assert_eq!(auth.logout_count(), 1, "expiry must not log out a signed-out user");
    assert!(!manager.is_ticking());
    assert!(manager.status().is_none());
    assert!(!manager.warning().show);
    assert!(rx.borrow().is_none());

    // The next resync retires the stale session without another logout
    assert_eq!(manager.sync_with_auth(), None);
    assert!(manager.session_id().is_none());
    assert_eq!(auth.logout_count(), 1);
}

// =============================================================================
// PROPERTIES
// =============================================================================

#[tokio::test(start_paused = true)]
async fn activity_always_yields_active_with_full_budget() {
    let auth = signed_in();
    let manager = start(&auth, Arc::new(NoopActivityLog));
    let budget = manager.config().inactivity_budget;

    for gap in [100u64, 999, 1_000, 12_345, 49_999, 50_000, 57_500, 58_000, 59_999] {
        sleep(ms(gap)).await;
        let outcome = manager.record_activity(ActivityKind::Navigation, None);
        assert_eq!(
            outcome,
            ActivityOutcome::Recorded(sessionwatch::session::SessionStatus::new(SessionState::Active, budget))
        );
        let status = manager.status().unwrap();
        assert_eq!(status.state, SessionState::Active);
        assert_eq!(status.remaining, budget);
    }
    assert_eq!(auth.logout_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn repeated_activity_in_one_tick_equals_once() {
    let auth = signed_in();
    let manager = start(&auth, Arc::new(NoopActivityLog));

    sleep(ms(20_300)).await;
    let first = manager.record_activity(ActivityKind::Save, None);
    let second = manager.record_activity(ActivityKind::Save, None);
    assert_eq!(first, second);
    assert_eq!(manager.snapshot().unwrap().status.remaining, ms(60_000));
}

#[tokio::test(start_paused = true)]
async fn remaining_is_monotonic_without_activity() {
    let auth = signed_in();
    let manager = start(&auth, Arc::new(NoopActivityLog));

    let mut last = manager.status().unwrap().remaining;
    for _ in 0..260 {
        sleep(ms(250)).await;
        let status = manager.status().unwrap();
        assert!(status.remaining <= last);
        last = status.remaining;
        if status.state == SessionState::Expired {
            break;
        }
    }
    assert_eq!(last, Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn dismissing_twice_equals_once_and_does_not_extend() {
    let auth = signed_in();
    let manager = start(&auth, Arc::new(NoopActivityLog));

    sleep(ms(50_500)).await;
    assert!(manager.dismiss_warning());
    let after_first = manager.snapshot().unwrap();
    assert!(!manager.dismiss_warning());
    let after_second = manager.snapshot().unwrap();

    assert_eq!(after_first, after_second);
    assert!(!after_second.warning.show);
    // Still WARNING, clock untouched
    assert_eq!(after_second.status.state, SessionState::Warning);
    assert!(after_second.status.remaining < ms(10_000));
}

#[tokio::test(start_paused = true)]
async fn dismissed_critical_is_not_raised_again() {
    let auth = signed_in();
    let manager = start(&auth, Arc::new(NoopActivityLog));

    sleep(ms(58_500)).await;
    assert!(manager.dismiss_warning());
    sleep(ms(1_000)).await;
    assert!(!manager.warning().show);
    assert_eq!(manager.status().unwrap().state, SessionState::Critical);
}

#[tokio::test(start_paused = true)]
async fn expiry_is_final() {
    let auth = signed_in();
    let manager = start(&auth, Arc::new(NoopActivityLog));

    let first_id = manager.session_id().unwrap();
    sleep(ms(60_200)).await;
    assert_eq!(manager.status().unwrap().state, SessionState::Expired);
    assert_eq!(manager.extend_session(), ActivityOutcome::Expired);
    assert_eq!(manager.status().unwrap().state, SessionState::Expired);

    sleep(ms(5_000)).await;
    // Provider signed the user out; commands are now no-ops
    assert_eq!(manager.record_activity(ActivityKind::Save, None), ActivityOutcome::NoSession);

    // A brand-new session is the only way back
    auth.login(User::new("analyst-7", "Dana Reyes"));
    let second_id = manager.sync_with_auth().expect("new session");
    assert_ne!(first_id, second_id);
    assert_eq!(manager.status().unwrap().state, SessionState::Active);
    assert!(manager.is_ticking());
}

#[tokio::test(start_paused = true)]
async fn subscribers_see_escalation_in_order() {
    let auth = signed_in();
    let manager = start(&auth, Arc::new(NoopActivityLog));
    let mut rx = manager.subscribe();

    let watcher = tokio::spawn(async move {
        let mut seen = Vec::new();
        while rx.changed().await.is_ok() {
            let Some(snapshot) = rx.borrow_and_update().clone() else { break };
            if seen.last() != Some(&snapshot.status.state) {
                seen.push(snapshot.status.state);
            }
            if snapshot.status.state == SessionState::Expired {
                break;
            }
        }
        seen
    });

    let seen = watcher.await.unwrap();
    assert_eq!(
        seen,
        vec![
            SessionState::Active,
            SessionState::Warning,
            SessionState::Critical,
            SessionState::Expired
        ]
    );
}

// =============================================================================
// ADVISORY PERSISTENCE
// =============================================================================

#[tokio::test(start_paused = true)]
async fn persistence_failure_never_blocks_activity() {
    let auth = signed_in();
    let manager = start(&auth, Arc::new(FailingSink));

    sleep(ms(52_000)).await;
    let outcome = manager.record_activity(ActivityKind::Save, Some("saved reconciliation"));
    assert!(outcome.is_recorded());
    assert_eq!(manager.status().unwrap().state, SessionState::Active);
}

#[tokio::test(start_paused = true)]
async fn last_activity_is_persisted_redacted() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let auth = signed_in();
    let manager = start(&auth, Arc::new(ChannelSink(tx)));

    manager.record_activity(
        ActivityKind::FormInteraction,
        Some("retried login with password: hunter2"),
    );
    let entry = rx.recv().await.expect("entry persisted");
    assert_eq!(entry.kind, ActivityKind::FormInteraction);
    assert_eq!(entry.user_id, "analyst-7");
    assert_eq!(Some(entry.session_id.clone()), manager.session_id());
    let detail = entry.detail.unwrap();
    assert!(detail.contains("password=[REDACTED]"));
    assert!(!detail.contains("hunter2"));

    manager.extend_session();
    let entry = rx.recv().await.expect("extension persisted");
    assert_eq!(entry.kind, ActivityKind::ManualExtension);
}
