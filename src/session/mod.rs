// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Session lifecycle for the operations dashboard.
//!
//! Tracks user activity against a fixed inactivity budget, raises warnings at
//! fixed thresholds, and forces logout on expiry.
//!
//! ## Flow
//!
//! ```text
//! UI event -> record_activity -> SessionStore (reset)
//! TickScheduler (1 Hz) -> SessionStore::tick -> WarningDispatcher -> ExpiryHandler -> logout
//! ```
//!
//! ## Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use sessionwatch::session::{
//!     ActivityKind, LocalAuth, NoopActivityLog, SessionConfig, SessionManager, User,
//! };
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let auth = Arc::new(LocalAuth::signed_in(User::new("u-17", "Dana")));
//! let manager = SessionManager::new(
//!     SessionConfig::dashboard_default(),
//!     auth,
//!     Arc::new(NoopActivityLog),
//! )?;
//!
//! manager.sync_with_auth();
//! manager.record_activity(ActivityKind::Navigation, Some("/reports/daily"));
//!
//! if manager.warning().show {
//!     manager.extend_session();
//! }
//! # Ok(())
//! # }
//! ```

pub mod activity;
pub mod auth;
pub mod config;
pub mod events;
pub mod expiry;
pub mod manager;
pub mod scheduler;
pub mod state;
pub mod store;
pub mod warning;

pub use activity::{
    redact_secrets, ActivityEntry, ActivityKind, ActivitySink, FileActivityLog, NoopActivityLog,
};
pub use auth::{AuthProvider, LocalAuth, User};
pub use config::{
    SessionConfig, WarningThreshold, DASHBOARD_CRITICAL_AFTER_IDLE_MS, DASHBOARD_EXPIRY_GRACE_MS,
    DASHBOARD_INACTIVE_AFTER_MS, DASHBOARD_INACTIVITY_BUDGET_MS, DASHBOARD_TICK_PERIOD_MS,
    DASHBOARD_TOKEN_LIFETIME_MS, DASHBOARD_WARNING_AFTER_IDLE_MS,
};
pub use events::SessionEvent;
pub use expiry::ExpiryHandler;
pub use manager::SessionManager;
pub use scheduler::{SnapshotPublisher, TickScheduler};
pub use state::{format_remaining, SessionState, SessionStatus};
pub use store::{ActivityOutcome, SessionClock, SessionSnapshot, SessionStore, TickOutcome};
pub use warning::{
    crossed_threshold, ActiveWarning, WarningDispatcher, WarningKind, WarningPresentation,
    WarningSnapshot,
};
