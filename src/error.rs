// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Error types and CLI error formatting.

use std::time::Duration;
use thiserror::Error;

/// Session configuration invariant violations. Fatal at startup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("inactivity budget must be greater than zero")]
    EmptyBudget,

    #[error("tick period must be greater than zero")]
    ZeroTickPeriod,

    #[error("warning thresholds must be strictly increasing ({previous:?} is followed by {next:?})")]
    ThresholdsNotIncreasing { previous: Duration, next: Duration },

    #[error("warning threshold {threshold:?} is not below the inactivity budget {budget:?}")]
    ThresholdBeyondBudget { threshold: Duration, budget: Duration },

    #[error("inactive window {inactive_after:?} must end before {limit:?}")]
    InactiveWindowTooLate { inactive_after: Duration, limit: Duration },

    #[error("inactivity budget {budget:?} must be below the token lifetime {token_lifetime:?}")]
    BudgetExceedsTokenLifetime { budget: Duration, token_lifetime: Duration },
}

/// Formats an error message with title, causes and fixes.
///
/// ```
/// use sessionwatch::error::format_error;
///
/// let error = format_error(
///     "Failed to load configuration",
///     &["Config file is not valid JSON"],
///     &["Reset it: sessionwatch config reset"],
/// );
/// assert!(error.contains("Possible causes:"));
/// ```
pub fn format_error(title: &str, causes: &[&str], fixes: &[&str]) -> String {
    let mut output = format!("[✗] {}\n", title);

    if !causes.is_empty() {
        output.push_str("\nPossible causes:\n");
        for cause in causes {
            output.push_str(&format!("  - {}\n", cause));
        }
    }

    if !fixes.is_empty() {
        output.push_str("\nTry these fixes:\n");
        for (i, fix) in fixes.iter().enumerate() {
            output.push_str(&format!("  {}. {}\n", i + 1, fix));
        }
    }

    output
}
