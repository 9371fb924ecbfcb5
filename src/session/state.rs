// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Session states and the read-only status projection handed to observers.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Session state enumeration
///
/// Exactly one value is active at any time. Severity only increases within a
/// single idle run; recorded activity drops the session back to `Active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    /// Activity recorded recently; full budget available
    Active,
    /// Idle beyond the inactive window, below the first warning threshold
    Inactive,
    /// First warning threshold crossed
    Warning,
    /// Final warning threshold crossed
    Critical,
    /// Inactivity budget exhausted (terminal)
    Expired,
}

impl SessionState {
    /// Returns true once the session can no longer be extended
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Expired)
    }

    /// Returns true while the user is being warned about expiry
    pub fn is_warning(&self) -> bool {
        matches!(self, SessionState::Warning | SessionState::Critical)
    }

    /// Ordering used to assert that severity never decreases during an idle run.
    pub fn severity(&self) -> u8 {
        match self {
            SessionState::Active => 0,
            SessionState::Inactive => 1,
            SessionState::Warning => 2,
            SessionState::Critical => 3,
            SessionState::Expired => 4,
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Active => write!(f, "ACTIVE"),
            SessionState::Inactive => write!(f, "INACTIVE"),
            SessionState::Warning => write!(f, "WARNING"),
            SessionState::Critical => write!(f, "CRITICAL"),
            SessionState::Expired => write!(f, "EXPIRED"),
        }
    }
}

/// Pollable snapshot of the session clock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionStatus {
    pub state: SessionState,
    /// Time left before expiry. Never negative; zero once expired.
    #[serde(with = "duration_millis")]
    pub remaining: Duration,
    /// `remaining` rendered as `m:ss`
    pub formatted_remaining: String,
}

impl SessionStatus {
    pub fn new(state: SessionState, remaining: Duration) -> Self {
        Self {
            state,
            remaining,
            formatted_remaining: format_remaining(remaining),
        }
    }
}

/// Render a remaining duration as `m:ss`.
///
/// Sub-second remainders are rounded up so the display only reads `0:00`
/// when the budget is actually exhausted.
pub fn format_remaining(remaining: Duration) -> String {
    let mut secs = remaining.as_secs();
    if remaining.subsec_nanos() > 0 {
        secs += 1;
    }
    format!("{}:{:02}", secs / 60, secs % 60)
}

mod duration_millis {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }
}
