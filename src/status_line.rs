// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Terminal rendering of session snapshots.
//!
//! A read-only observer: nothing here mutates the session.

use colored::Colorize;

use crate::session::{SessionSnapshot, SessionState, WarningPresentation, WarningSnapshot};

/// One-line session indicator, e.g. `Session: 12:04 (WARNING)`
pub fn render_status_line(snapshot: Option<&SessionSnapshot>) -> String {
    let Some(snapshot) = snapshot else {
        return "Session: signed out".dimmed().to_string();
    };
    let status = &snapshot.status;
    match status.state {
        SessionState::Active => format!("Session: {}", status.formatted_remaining)
            .bright_green()
            .to_string(),
        SessionState::Inactive => format!("Session: {} (idle)", status.formatted_remaining)
            .dimmed()
            .to_string(),
        SessionState::Warning => format!("Session: {} (WARNING)", status.formatted_remaining)
            .yellow()
            .to_string(),
        SessionState::Critical => format!("Session: {} (CRITICAL)", status.formatted_remaining)
            .red()
            .bold()
            .to_string(),
        SessionState::Expired => "Session: EXPIRED".red().bold().to_string(),
    }
}

/// Text for the visible warning, if any. Toasts are one line; modals are
/// boxed and ask for an explicit choice.
pub fn render_warning(warning: &WarningSnapshot) -> Option<String> {
    if !warning.show {
        return None;
    }
    let label = warning.label.as_deref().unwrap_or("soon");
    let text = match warning.presentation {
        Some(WarningPresentation::Modal) => format!(
            "┌─ Session about to expire ─┐\n│ Logging out in {}.\n│ Type 'extend' to stay signed in or 'dismiss' to hide.\n└───────────────────────────┘",
            label
        )
        .red()
        .bold()
        .to_string(),
        _ => format!("⚠ Session expires in {}. Type 'extend' to stay signed in.", label)
            .yellow()
            .to_string(),
    };
    Some(text)
}
