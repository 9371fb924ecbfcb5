// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Session manager: the explicitly constructed owner of one user's idle
//! timeout.
//!
//! The manager follows the authentication provider. When a user is signed in
//! it owns a [`SessionStore`], a [`TickScheduler`] and an [`ExpiryHandler`];
//! when nobody is signed in it owns nothing and every command is a no-op.
//! Observers either poll [`SessionManager::status`] or hold a
//! [`watch::Receiver`] from [`SessionManager::subscribe`].

use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::watch;
use tokio::time::Instant;

use super::activity::{ActivityEntry, ActivityKind, ActivitySink};
use super::auth::{AuthProvider, User};
use super::config::SessionConfig;
use super::events::SessionEvent;
use super::expiry::ExpiryHandler;
use super::scheduler::{SnapshotPublisher, TickScheduler};
use super::state::SessionStatus;
use super::store::{ActivityOutcome, SessionSnapshot, SessionStore};
use super::warning::WarningSnapshot;
use crate::error::ConfigError;
use crate::locks::{resilient_read, resilient_write};

/// Detail recorded for a manual extension
const EXTEND_DETAIL: &str = "session extended by user";

/// Resources owned for the lifetime of one authenticated session
struct ActiveSession {
    user: User,
    store: Arc<RwLock<SessionStore>>,
    expiry: Arc<ExpiryHandler>,
    scheduler: TickScheduler,
    publisher: SnapshotPublisher,
}

impl ActiveSession {
    fn session_id(&self) -> String {
        resilient_read(&self.store).session_id().to_string()
    }

    fn shutdown(&self) {
        self.scheduler.stop();
        self.expiry.disarm();
    }
}

pub struct SessionManager {
    config: SessionConfig,
    auth: Arc<dyn AuthProvider>,
    activity_log: Arc<dyn ActivitySink>,
    active: RwLock<Option<ActiveSession>>,
    snapshots: Arc<watch::Sender<Option<SessionSnapshot>>>,
    generation: Arc<AtomicU64>,
    id_counter: AtomicU64,
}

impl SessionManager {
    /// Create a manager. Fails if the configuration violates its invariants;
    /// the state machine never runs on a bad config.
    pub fn new(
        config: SessionConfig,
        auth: Arc<dyn AuthProvider>,
        activity_log: Arc<dyn ActivitySink>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let (tx, _rx) = watch::channel(None);
        Ok(Self {
            config,
            auth,
            activity_log,
            active: RwLock::new(None),
            snapshots: Arc::new(tx),
            generation: Arc::new(AtomicU64::new(0)),
            id_counter: AtomicU64::new(1),
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Generate a unique session ID
    fn generate_session_id(&self) -> String {
        let counter = self.id_counter.fetch_add(1, Ordering::SeqCst);
        let timestamp = Utc::now().timestamp_millis();
        let random: u32 = rand::random();
        format!("sess_{}_{}_{:08x}", timestamp, counter, random)
    }

    /// Align the session with the authentication provider.
    ///
    /// - signed in, no session: start one
    /// - signed in as someone else: end the old session, start a new one
    /// - signed in again after an expiry logout: start a new session
    /// - signed out: end the session
    ///
    /// Returns the ID of the session running afterwards. Must be called from
    /// within a Tokio runtime.
    pub fn sync_with_auth(&self) -> Option<String> {
        let user = self.auth.current_user();
        let mut active = resilient_write(&self.active);

        // After an expiry logout, the same user signing back in gets a new session
        let keep = match (&*active, &user) {
            (Some(session), Some(user)) => {
                session.user.id == user.id && !session.expiry.logout_delivered()
            }
            _ => false,
        };
        if keep {
            return active.as_ref().map(ActiveSession::session_id);
        }

        if let Some(old) = active.take() {
            let reason = match &user {
                Some(user) if user.id == old.user.id => "reauthenticated",
                Some(_) => "user_changed",
                None => "signed_out",
            };
            self.retire(old, reason);
        }

        let user = user?;
        let session = self.start_session(user);
        let id = session.session_id();
        *active = Some(session);
        Some(id)
    }

    fn start_session(&self, user: User) -> ActiveSession {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let session_id = self.generate_session_id();
        let now = Instant::now();

        let store = Arc::new(RwLock::new(SessionStore::new(
            session_id.clone(),
            user.id.clone(),
            self.config.clone(),
            now,
        )));
        let expiry = Arc::new(ExpiryHandler::new(
            session_id.clone(),
            user.id.clone(),
            Arc::clone(&self.auth),
            self.config.expiry_grace,
        ));
        let publisher = SnapshotPublisher::new(
            Arc::clone(&self.snapshots),
            Arc::clone(&self.generation),
            generation,
        );

        SessionEvent::Started {
            session_id,
            user_id: user.id.clone(),
            timestamp: Utc::now(),
            budget_secs: self.config.inactivity_budget.as_secs(),
        }
        .emit();

        publisher.publish(resilient_read(&store).snapshot(now));
        let scheduler = TickScheduler::start(
            Arc::clone(&store),
            Arc::clone(&expiry),
            publisher.clone(),
            Arc::clone(&self.auth),
        );

        ActiveSession {
            user,
            store,
            expiry,
            scheduler,
            publisher,
        }
    }

    fn retire(&self, session: ActiveSession, reason: &str) {
        // Bump first so nothing from the old session can publish afterwards
        self.generation.fetch_add(1, Ordering::SeqCst);
        session.shutdown();
        self.snapshots.send_replace(None);

        SessionEvent::Ended {
            session_id: session.session_id(),
            timestamp: Utc::now(),
            reason: reason.to_string(),
        }
        .emit();
    }

    /// Tear the session down regardless of the provider's view (e.g. the
    /// owning view unmounts). No tick or logout fires for it afterwards.
    pub fn end_session(&self, reason: &str) {
        if let Some(session) = resilient_write(&self.active).take() {
            self.retire(session, reason);
        }
    }

    /// Record user activity, resetting the idle clock.
    ///
    /// A no-op without a signed-in user, and rejected once the session has
    /// expired. The advisory activity record is written in the background.
    pub fn record_activity(&self, kind: ActivityKind, detail: Option<&str>) -> ActivityOutcome {
        let Some(user) = self.auth.current_user() else {
            tracing::debug!("SESSION_ACTIVITY_IGNORED | kind={} reason=no_user", kind);
            return ActivityOutcome::NoSession;
        };

        let active = resilient_read(&self.active);
        let Some(session) = active.as_ref().filter(|s| s.user.id == user.id) else {
            tracing::debug!("SESSION_ACTIVITY_IGNORED | kind={} reason=no_session", kind);
            return ActivityOutcome::NoSession;
        };

        let (outcome, session_id) = {
            let mut store = resilient_write(&session.store);
            let now = Instant::now();
            let outcome = store.record_activity(kind, now);
            if outcome.is_recorded() {
                session.publisher.publish(store.snapshot(now));
            }
            (outcome, store.session_id().to_string())
        };

        match &outcome {
            ActivityOutcome::Recorded(_) => {
                SessionEvent::Activity {
                    session_id: session_id.clone(),
                    kind,
                    timestamp: Utc::now(),
                }
                .emit();
                self.persist(ActivityEntry::new(session_id, user.id, kind, detail));
            }
            ActivityOutcome::Expired => {
                SessionEvent::ActivityRejected {
                    session_id,
                    kind,
                    timestamp: Utc::now(),
                }
                .emit();
            }
            ActivityOutcome::NoSession => {}
        }
        outcome
    }

    /// Manual extension is ordinary activity
    pub fn extend_session(&self) -> ActivityOutcome {
        self.record_activity(ActivityKind::ManualExtension, Some(EXTEND_DETAIL))
    }

    /// Hide the visible warning. Does not extend the session. Returns true if
    /// a warning was showing.
    pub fn dismiss_warning(&self) -> bool {
        let active = resilient_read(&self.active);
        let Some(session) = self.owned(&active) else {
            return false;
        };

        let (dismissed, session_id) = {
            let mut store = resilient_write(&session.store);
            let dismissed = store.dismiss_warning();
            if dismissed.is_some() {
                session.publisher.publish(store.snapshot(Instant::now()));
            }
            (dismissed, store.session_id().to_string())
        };

        match dismissed {
            Some(warning) => {
                SessionEvent::WarningDismissed {
                    session_id,
                    kind: warning.kind,
                    timestamp: Utc::now(),
                }
                .emit();
                true
            }
            None => false,
        }
    }

    /// Pollable status; `None` without a session or once its user has signed out
    pub fn status(&self) -> Option<SessionStatus> {
        let active = resilient_read(&self.active);
        let session = self.owned(&active)?;
        let status = resilient_read(&session.store).status(Instant::now());
        Some(status)
    }

    /// Current warning slot; hidden without a session
    pub fn warning(&self) -> WarningSnapshot {
        let active = resilient_read(&self.active);
        self.owned(&active)
            .map(|s| resilient_read(&s.store).warning())
            .unwrap_or_default()
    }

    pub fn snapshot(&self) -> Option<SessionSnapshot> {
        let active = resilient_read(&self.active);
        let session = self.owned(&active)?;
        let snapshot = resilient_read(&session.store).snapshot(Instant::now());
        Some(snapshot)
    }

    /// The running session, if it belongs to the user currently signed in
    fn owned<'a>(&self, active: &'a Option<ActiveSession>) -> Option<&'a ActiveSession> {
        let user = self.auth.current_user()?;
        active.as_ref().filter(|s| s.user.id == user.id)
    }

    /// Subscribe to snapshots. `None` means no session.
    pub fn subscribe(&self) -> watch::Receiver<Option<SessionSnapshot>> {
        self.snapshots.subscribe()
    }

    /// ID of the session the manager holds, even if the provider has already
    /// signed its user out and no resync has happened yet
    pub fn session_id(&self) -> Option<String> {
        resilient_read(&self.active).as_ref().map(ActiveSession::session_id)
    }

    /// True while a tick task is running for the current session
    pub fn is_ticking(&self) -> bool {
        resilient_read(&self.active)
            .as_ref()
            .map(|s| s.scheduler.is_running())
            .unwrap_or(false)
    }

    /// Fire-and-forget write of the advisory activity record
    fn persist(&self, entry: ActivityEntry) {
        let sink = Arc::clone(&self.activity_log);
        let write = move || {
            if let Err(e) = sink.record(&entry) {
                tracing::warn!(
                    "SESSION_ACTIVITY_PERSIST_FAILED | session={} error={:#}",
                    entry.session_id,
                    e
                );
            }
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(write);
            }
            Err(_) => {
                std::thread::spawn(write);
            }
        }
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        if let Some(session) = resilient_write(&self.active).take() {
            self.generation.fetch_add(1, Ordering::SeqCst);
            session.shutdown();
        }
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("config", &self.config)
            .field("session_id", &self.session_id())
            .finish()
    }
}
