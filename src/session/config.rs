// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Session timing configuration.
//!
//! The dashboard values are fixed. The local idle timeout must always fire
//! before the backend credential expires, so the inactivity budget is kept
//! below the token lifetime (documented as twice the budget).

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::warning::WarningKind;
use crate::error::ConfigError;

/// Maximum idle time before forced logout: 60 minutes
pub const DASHBOARD_INACTIVITY_BUDGET_MS: u64 = 3_600_000;

/// First warning at 50 minutes idle (10 minutes remaining)
pub const DASHBOARD_WARNING_AFTER_IDLE_MS: u64 = 3_000_000;

/// Final warning at 58 minutes idle (2 minutes remaining)
pub const DASHBOARD_CRITICAL_AFTER_IDLE_MS: u64 = 3_480_000;

/// Scheduler period
pub const DASHBOARD_TICK_PERIOD_MS: u64 = 1_000;

/// Idle time after which the cosmetic INACTIVE state is shown
pub const DASHBOARD_INACTIVE_AFTER_MS: u64 = 300_000;

/// Delay between reaching EXPIRED and invoking logout, so the UI can render it
pub const DASHBOARD_EXPIRY_GRACE_MS: u64 = 1_500;

/// Backend token lifetime the local budget must stay under
pub const DASHBOARD_TOKEN_LIFETIME_MS: u64 = 2 * DASHBOARD_INACTIVITY_BUDGET_MS;

/// A fixed idle-duration point at which the user is warned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarningThreshold {
    pub trigger_after_idle: Duration,
    pub kind: WarningKind,
    pub label: String,
}

impl WarningThreshold {
    pub fn new(trigger_after_idle: Duration, kind: WarningKind, label: impl Into<String>) -> Self {
        Self {
            trigger_after_idle,
            kind,
            label: label.into(),
        }
    }
}

/// Session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Maximum idle time before expiry
    pub inactivity_budget: Duration,

    /// Ascending, strictly below the budget
    pub thresholds: Vec<WarningThreshold>,

    /// Scheduler period; also the tolerance of the threshold crossing window
    pub tick_period: Duration,

    /// Idle time after which the state reads INACTIVE. `None` disables the sub-state.
    pub inactive_after: Option<Duration>,

    /// Delay between expiry and logout
    pub expiry_grace: Duration,

    /// Lifetime of the backend credential
    pub token_lifetime: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::dashboard_default()
    }
}

impl SessionConfig {
    /// Create configuration with the dashboard defaults
    ///
    /// - 60-minute inactivity budget
    /// - warnings at 10 and 2 minutes remaining
    /// - 1-second tick
    pub fn dashboard_default() -> Self {
        Self {
            inactivity_budget: Duration::from_millis(DASHBOARD_INACTIVITY_BUDGET_MS),
            thresholds: vec![
                WarningThreshold::new(
                    Duration::from_millis(DASHBOARD_WARNING_AFTER_IDLE_MS),
                    WarningKind::Warning,
                    "10 minutes",
                ),
                WarningThreshold::new(
                    Duration::from_millis(DASHBOARD_CRITICAL_AFTER_IDLE_MS),
                    WarningKind::Critical,
                    "2 minutes",
                ),
            ],
            tick_period: Duration::from_millis(DASHBOARD_TICK_PERIOD_MS),
            inactive_after: Some(Duration::from_millis(DASHBOARD_INACTIVE_AFTER_MS)),
            expiry_grace: Duration::from_millis(DASHBOARD_EXPIRY_GRACE_MS),
            token_lifetime: Duration::from_millis(DASHBOARD_TOKEN_LIFETIME_MS),
        }
    }

    /// Create a custom configuration.
    ///
    /// The inactive window is disabled, the grace delay is the dashboard one and
    /// the token lifetime is derived as twice the budget. Call [`validate`](Self::validate)
    /// (or hand it to `SessionManager::new`) before use.
    pub fn new(inactivity_budget: Duration, thresholds: Vec<WarningThreshold>, tick_period: Duration) -> Self {
        Self {
            inactivity_budget,
            thresholds,
            tick_period,
            inactive_after: None,
            expiry_grace: Duration::from_millis(DASHBOARD_EXPIRY_GRACE_MS),
            token_lifetime: inactivity_budget * 2,
        }
    }

    pub fn with_inactive_after(mut self, inactive_after: Option<Duration>) -> Self {
        self.inactive_after = inactive_after;
        self
    }

    pub fn with_expiry_grace(mut self, expiry_grace: Duration) -> Self {
        self.expiry_grace = expiry_grace;
        self
    }

    pub fn with_token_lifetime(mut self, token_lifetime: Duration) -> Self {
        self.token_lifetime = token_lifetime;
        self
    }

    /// Divide every duration by `factor`. Used by the CLI demo to watch a full
    /// idle run in a minute instead of an hour.
    pub fn accelerated(&self, factor: u32) -> Self {
        let factor = factor.max(1);
        Self {
            inactivity_budget: self.inactivity_budget / factor,
            thresholds: self
                .thresholds
                .iter()
                .map(|t| WarningThreshold {
                    trigger_after_idle: t.trigger_after_idle / factor,
                    ..t.clone()
                })
                .collect(),
            tick_period: (self.tick_period / factor).max(Duration::from_millis(10)),
            inactive_after: self.inactive_after.map(|d| d / factor),
            expiry_grace: self.expiry_grace / factor,
            token_lifetime: self.token_lifetime / factor,
        }
    }

    /// Check the configuration invariants. A session must not run on a config
    /// that fails this.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.inactivity_budget.is_zero() {
            return Err(ConfigError::EmptyBudget);
        }
        if self.tick_period.is_zero() {
            return Err(ConfigError::ZeroTickPeriod);
        }
        if self.inactivity_budget >= self.token_lifetime {
            return Err(ConfigError::BudgetExceedsTokenLifetime {
                budget: self.inactivity_budget,
                token_lifetime: self.token_lifetime,
            });
        }

        for pair in self.thresholds.windows(2) {
            if pair[1].trigger_after_idle <= pair[0].trigger_after_idle {
                return Err(ConfigError::ThresholdsNotIncreasing {
                    previous: pair[0].trigger_after_idle,
                    next: pair[1].trigger_after_idle,
                });
            }
        }

        if let Some(last) = self.thresholds.last() {
            if last.trigger_after_idle >= self.inactivity_budget {
                return Err(ConfigError::ThresholdBeyondBudget {
                    threshold: last.trigger_after_idle,
                    budget: self.inactivity_budget,
                });
            }
        }

        if let Some(inactive_after) = self.inactive_after {
            let limit = self
                .thresholds
                .first()
                .map(|t| t.trigger_after_idle)
                .unwrap_or(self.inactivity_budget);
            if inactive_after >= limit {
                return Err(ConfigError::InactiveWindowTooLate { inactive_after, limit });
            }
        }

        Ok(())
    }
}
