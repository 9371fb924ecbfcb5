// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Tick scheduler.
//!
//! A periodic Tokio task that re-evaluates the session store once per tick
//! period for the lifetime of one authenticated session. It stops on its own
//! after expiry and is aborted when the session ends. A tick reads
//! `last_activity_at` under the same write lock the activity recorder uses, so
//! it can never overwrite a reset with a result computed from the old clock.
//!
//! Every tick first checks that the session's user is still the one signed in
//! with the provider. A sign-out the manager has not seen yet stops the task
//! and disarms expiry.

use chrono::Utc;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use super::auth::AuthProvider;
use super::events::SessionEvent;
use super::expiry::ExpiryHandler;
use super::store::{SessionSnapshot, SessionStore, TickOutcome};
use crate::locks::{resilient_read, resilient_write};

/// Publishes snapshots for one session generation.
///
/// Once the manager moves to a new generation (session ended or replaced), a
/// late publish from the old session is dropped.
#[derive(Debug, Clone)]
pub struct SnapshotPublisher {
    tx: Arc<watch::Sender<Option<SessionSnapshot>>>,
    current: Arc<AtomicU64>,
    generation: u64,
}

impl SnapshotPublisher {
    pub fn new(
        tx: Arc<watch::Sender<Option<SessionSnapshot>>>,
        current: Arc<AtomicU64>,
        generation: u64,
    ) -> Self {
        Self { tx, current, generation }
    }

    /// Returns false if the snapshot was stale and dropped.
    pub fn publish(&self, snapshot: SessionSnapshot) -> bool {
        self.tx.send_if_modified(|slot| {
            if self.current.load(Ordering::SeqCst) != self.generation {
                return false;
            }
            if slot.as_ref() == Some(&snapshot) {
                return false;
            }
            *slot = Some(snapshot);
            true
        });
        self.current.load(Ordering::SeqCst) == self.generation
    }

    /// Publish "no session". Dropped if stale.
    pub fn clear(&self) -> bool {
        self.tx.send_if_modified(|slot| {
            if self.current.load(Ordering::SeqCst) != self.generation || slot.is_none() {
                return false;
            }
            *slot = None;
            true
        })
    }
}

enum TickControl {
    Continue,
    Stop,
}

pub struct TickScheduler {
    handle: JoinHandle<()>,
}

impl TickScheduler {
    /// Spawn the tick task. Must be called from within a Tokio runtime.
    pub fn start(
        store: Arc<RwLock<SessionStore>>,
        expiry: Arc<ExpiryHandler>,
        publisher: SnapshotPublisher,
        auth: Arc<dyn AuthProvider>,
    ) -> Self {
        let period = resilient_read(&store).config().tick_period;
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                interval.tick().await;
                let control = catch_unwind(AssertUnwindSafe(|| {
                    Self::run_tick(&store, &expiry, &publisher, auth.as_ref())
                }));
                match control {
                    Ok(TickControl::Continue) => {}
                    Ok(TickControl::Stop) => break,
                    Err(_) => {
                        tracing::error!(
                            target: "sessionwatch::scheduler",
                            event = "TICK_PANICKED",
                            "session tick panicked; continuing with the next tick"
                        );
                    }
                }
            }
        });
        Self { handle }
    }

    fn run_tick(
        store: &RwLock<SessionStore>,
        expiry: &ExpiryHandler,
        publisher: &SnapshotPublisher,
        auth: &dyn AuthProvider,
    ) -> TickControl {
        if !Self::owner_signed_in(store, auth) {
            expiry.disarm();
            publisher.clear();
            tracing::info!(
                "SESSION_TICK_STOPPED | session={} reason=signed_out",
                resilient_read(store).session_id()
            );
            return TickControl::Stop;
        }

        // Publish under the store lock so snapshots reach observers in order
        let (outcome, published, session_id, duration) = {
            let mut store = resilient_write(store);
            let now = Instant::now();
            let outcome = store.tick(now);
            let published = publisher.publish(store.snapshot(now));
            (
                outcome,
                published,
                store.session_id().to_string(),
                store.session_duration(now),
            )
        };

        match outcome {
            TickOutcome::Steady(_) => TickControl::Continue,
            TickOutcome::Transition { from, status, raised } => {
                if let Some(warning) = raised {
                    SessionEvent::WarningRaised {
                        session_id: session_id.clone(),
                        kind: warning.kind,
                        label: warning.label,
                        timestamp: Utc::now(),
                        expires_in_secs: status.remaining.as_secs(),
                    }
                    .emit();
                }
                if from != status.state {
                    tracing::debug!(
                        "SESSION_STATE | session={} from={} to={} remaining={}",
                        session_id,
                        from,
                        status.state,
                        status.formatted_remaining
                    );
                }
                TickControl::Continue
            }
            TickOutcome::Expired(_) => {
                // A stale scheduler must not log out a session that already ended
                if published {
                    expiry.trigger(duration);
                }
                TickControl::Stop
            }
            TickOutcome::AlreadyExpired => TickControl::Stop,
        }
    }

    fn owner_signed_in(store: &RwLock<SessionStore>, auth: &dyn AuthProvider) -> bool {
        match auth.current_user() {
            Some(user) => user.id == resilient_read(store).user_id(),
            None => false,
        }
    }

    /// Cancel the tick task. No tick runs after this returns to the runtime.
    pub fn stop(&self) {
        self.handle.abort();
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for TickScheduler {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
