// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Session audit events, rendered as single log lines through `tracing`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::activity::ActivityKind;
use super::warning::WarningKind;

/// Session events for audit logging
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SessionEvent {
    /// A user became authenticated and the idle clock started
    Started {
        session_id: String,
        user_id: String,
        timestamp: DateTime<Utc>,
        budget_secs: u64,
    },
    /// Activity reset the idle clock
    Activity {
        session_id: String,
        kind: ActivityKind,
        timestamp: DateTime<Utc>,
    },
    /// Activity arrived after the session expired
    ActivityRejected {
        session_id: String,
        kind: ActivityKind,
        timestamp: DateTime<Utc>,
    },
    /// A warning threshold was crossed
    WarningRaised {
        session_id: String,
        kind: WarningKind,
        label: String,
        timestamp: DateTime<Utc>,
        expires_in_secs: u64,
    },
    /// The visible warning was dismissed without extending the session
    WarningDismissed {
        session_id: String,
        kind: WarningKind,
        timestamp: DateTime<Utc>,
    },
    /// Inactivity budget exhausted
    Expired {
        session_id: String,
        timestamp: DateTime<Utc>,
        session_duration_secs: u64,
    },
    /// Logout delegated to the authentication provider
    LogoutInvoked {
        session_id: String,
        timestamp: DateTime<Utc>,
    },
    /// The session was torn down (logout, expiry, or user change)
    Ended {
        session_id: String,
        timestamp: DateTime<Utc>,
        reason: String,
    },
}

impl SessionEvent {
    /// Format event for audit log
    pub fn to_audit_string(&self) -> String {
        match self {
            SessionEvent::Started { session_id, user_id, timestamp, budget_secs } => format!(
                "{} | SESSION_STARTED | session={} user={} budget={}s",
                fmt_ts(timestamp), session_id, user_id, budget_secs
            ),
            SessionEvent::Activity { session_id, kind, timestamp } => format!(
                "{} | SESSION_ACTIVITY | session={} kind={}",
                fmt_ts(timestamp), session_id, kind
            ),
            SessionEvent::ActivityRejected { session_id, kind, timestamp } => format!(
                "{} | SESSION_ACTIVITY_REJECTED | session={} kind={} reason=expired",
                fmt_ts(timestamp), session_id, kind
            ),
            SessionEvent::WarningRaised { session_id, kind, label, timestamp, expires_in_secs } => format!(
                "{} | SESSION_WARNING | session={} kind={} label=\"{}\" expires_in={}s",
                fmt_ts(timestamp), session_id, kind, label, expires_in_secs
            ),
            SessionEvent::WarningDismissed { session_id, kind, timestamp } => format!(
                "{} | SESSION_WARNING_DISMISSED | session={} kind={}",
                fmt_ts(timestamp), session_id, kind
            ),
            SessionEvent::Expired { session_id, timestamp, session_duration_secs } => format!(
                "{} | SESSION_EXPIRED | session={} duration={}s",
                fmt_ts(timestamp), session_id, session_duration_secs
            ),
            SessionEvent::LogoutInvoked { session_id, timestamp } => format!(
                "{} | SESSION_LOGOUT | session={}",
                fmt_ts(timestamp), session_id
            ),
            SessionEvent::Ended { session_id, timestamp, reason } => format!(
                "{} | SESSION_ENDED | session={} reason={}",
                fmt_ts(timestamp), session_id, reason
            ),
        }
    }

    /// Emit the event at the level its severity calls for
    pub fn emit(&self) {
        let line = self.to_audit_string();
        match self {
            SessionEvent::Activity { .. } | SessionEvent::WarningDismissed { .. } => {
                tracing::debug!("{}", line)
            }
            SessionEvent::WarningRaised { .. } | SessionEvent::ActivityRejected { .. } => {
                tracing::warn!("{}", line)
            }
            _ => tracing::info!("{}", line),
        }
    }
}

fn fmt_ts(timestamp: &DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}
