// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Authentication collaborator.
//!
//! The session core never validates credentials. It only needs to know who is
//! signed in and how to sign them out.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use crate::locks::{resilient_read, resilient_write};

/// Authenticated user identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub display_name: String,
}

impl User {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
        }
    }
}

/// Identity source and logout hook
pub trait AuthProvider: Send + Sync + 'static {
    /// The signed-in user, if any. Gates the whole state machine.
    fn current_user(&self) -> Option<User>;

    /// Terminate the authenticated session. Fire-and-forget from the caller's side.
    fn logout(&self);
}

/// In-process provider for the CLI and tests
#[derive(Debug, Default)]
pub struct LocalAuth {
    user: RwLock<Option<User>>,
    logouts: AtomicU64,
}

impl LocalAuth {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signed_in(user: User) -> Self {
        Self {
            user: RwLock::new(Some(user)),
            logouts: AtomicU64::new(0),
        }
    }

    pub fn login(&self, user: User) {
        *resilient_write(&self.user) = Some(user);
    }

    /// Number of times `logout` has been invoked
    pub fn logout_count(&self) -> u64 {
        self.logouts.load(Ordering::SeqCst)
    }
}

impl AuthProvider for LocalAuth {
    fn current_user(&self) -> Option<User> {
        resilient_read(&self.user).clone()
    }

    fn logout(&self) {
        self.logouts.fetch_add(1, Ordering::SeqCst);
        resilient_write(&self.user).take();
    }
}
