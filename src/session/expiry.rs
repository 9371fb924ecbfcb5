// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Expiry handler: runs at most once per session.
//!
//! The tick that exhausts the budget has already moved the store to EXPIRED.
//! This handler waits a short grace delay so observers can render that state,
//! then delegates to the authentication provider's logout.

use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::task::JoinHandle;

use super::auth::AuthProvider;
use super::events::SessionEvent;
use crate::locks::resilient_write;

pub struct ExpiryHandler {
    session_id: String,
    user_id: String,
    auth: Arc<dyn AuthProvider>,
    grace: Duration,
    /// Set on first trigger, or when the session is torn down first
    spent: AtomicBool,
    /// Set once the provider's logout has actually been invoked
    logged_out: Arc<AtomicBool>,
    /// Held across the spent check and the spawn, so `disarm` never misses a
    /// pending logout
    logout_task: RwLock<Option<JoinHandle<()>>>,
}

impl ExpiryHandler {
    pub fn new(
        session_id: impl Into<String>,
        user_id: impl Into<String>,
        auth: Arc<dyn AuthProvider>,
        grace: Duration,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            user_id: user_id.into(),
            auth,
            grace,
            spent: AtomicBool::new(false),
            logged_out: Arc::new(AtomicBool::new(false)),
            logout_task: RwLock::new(None),
        }
    }

    /// Handle expiry. Returns false if the handler already ran or was disarmed.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn trigger(&self, session_duration: Duration) -> bool {
        let mut slot = resilient_write(&self.logout_task);
        if self.spent.swap(true, Ordering::SeqCst) {
            tracing::debug!(
                "SESSION_EXPIRY_IGNORED | session={} reason=already_handled",
                self.session_id
            );
            return false;
        }

        SessionEvent::Expired {
            session_id: self.session_id.clone(),
            timestamp: Utc::now(),
            session_duration_secs: session_duration.as_secs(),
        }
        .emit();

        let auth = Arc::clone(&self.auth);
        let session_id = self.session_id.clone();
        let user_id = self.user_id.clone();
        let grace = self.grace;
        let logged_out = Arc::clone(&self.logged_out);
        *slot = Some(tokio::spawn(async move {
            tokio::time::sleep(grace).await;

            // The provider may have signed the user out during the grace delay
            match auth.current_user() {
                Some(user) if user.id == user_id => {
                    SessionEvent::LogoutInvoked {
                        session_id,
                        timestamp: Utc::now(),
                    }
                    .emit();
                    auth.logout();
                    logged_out.store(true, Ordering::SeqCst);
                }
                _ => {
                    tracing::debug!(
                        "SESSION_LOGOUT_SKIPPED | session={} reason=signed_out",
                        session_id
                    );
                }
            }
        }));
        true
    }

    /// Prevent any future or pending logout. Used when the session ends for
    /// another reason before (or during) the grace delay.
    pub fn disarm(&self) {
        let mut slot = resilient_write(&self.logout_task);
        self.spent.store(true, Ordering::SeqCst);
        if let Some(task) = slot.take() {
            if !task.is_finished() {
                task.abort();
                tracing::debug!(
                    "SESSION_LOGOUT_CANCELLED | session={} reason=session_ended",
                    self.session_id
                );
            }
        }
    }

    pub fn has_fired(&self) -> bool {
        self.spent.load(Ordering::SeqCst)
    }

    /// True once expiry has gone all the way through logout
    pub fn logout_delivered(&self) -> bool {
        self.logged_out.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for ExpiryHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpiryHandler")
            .field("session_id", &self.session_id)
            .field("grace", &self.grace)
            .field("spent", &self.has_fired())
            .finish()
    }
}
