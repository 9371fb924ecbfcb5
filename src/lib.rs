// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! sessionwatch - idle-timeout session lifecycle for authenticated dashboards
//!
//! Tracks user activity against an inactivity budget, warns before expiry,
//! allows manual extension, and forces logout when the budget runs out.
//!
//! # Core Modules
//!
//! - [`session`] - State store, tick scheduler, warnings, expiry, manager
//! - [`config`] - Application settings file
//! - [`error`] - Configuration errors and CLI error formatting
//! - [`locks`] - Poison-recovering lock helpers
//! - [`status_line`] - Terminal rendering of session snapshots
//! - [`telemetry`] - Tracing subscriber setup

pub mod config;
pub mod error;
pub mod locks;
pub mod session;
pub mod status_line;
pub mod telemetry;

pub use config::{load_config, save_config, AppConfig};
pub use error::{format_error, ConfigError};
pub use locks::{resilient_read, resilient_write};

pub use session::{
    ActivityKind, ActivityOutcome, ActivitySink, AuthProvider, FileActivityLog, LocalAuth,
    NoopActivityLog, SessionConfig, SessionEvent, SessionManager, SessionSnapshot, SessionState,
    SessionStatus, User, WarningKind, WarningSnapshot, WarningThreshold,
};
