// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Lock helpers that recover from poisoning instead of panicking.
//!
//! The session store is shared between the tick task and command callers. A
//! panic in one of them must not take the idle timeout down with it, so a
//! poisoned lock is logged and its guard recovered. Stale session data is
//! preferable to a session that can no longer expire.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Acquire a read lock, recovering from poisoning if necessary.
#[inline]
pub fn resilient_read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| {
        tracing::error!(
            target: "sessionwatch::locks",
            event = "LOCK_POISONED_READ",
            "RwLock poisoned during read; recovering session data"
        );
        poisoned.into_inner()
    })
}

/// Acquire a write lock, recovering from poisoning if necessary.
#[inline]
pub fn resilient_write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| {
        tracing::error!(
            target: "sessionwatch::locks",
            event = "LOCK_POISONED_WRITE",
            "RwLock poisoned during write; recovering session data"
        );
        poisoned.into_inner()
    })
}
