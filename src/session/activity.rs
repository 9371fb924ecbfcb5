// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Activity vocabulary and the advisory last-activity record.
//!
//! Persisting the last activity is best effort. The manager hands entries to
//! an [`ActivitySink`] on a blocking worker and only logs failures; a broken
//! disk never holds up a state transition.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::LazyLock;

/// Maximum length of free-text detail kept in the activity record
const DETAIL_MAX_LENGTH: usize = 120;

/// Redaction patterns for sensitive data
static REDACTION_PATTERNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    vec![
        (Regex::new(r"sk-[a-zA-Z0-9-]{20,}").expect("API key regex is valid"), "[REDACTED_API_KEY]"),
        (Regex::new(r"Bearer [a-zA-Z0-9-._~+/]+=*").expect("Bearer token regex is valid"), "Bearer [REDACTED]"),
        (Regex::new(r"(?i)password[=:]\s*\S+").expect("Password regex is valid"), "password=[REDACTED]"),
        (Regex::new(r"\b\d{13,19}\b").expect("Card number regex is valid"), "[REDACTED_PAN]"),
        (Regex::new(r"\b[A-Za-z0-9]{32,}\b").expect("Generic key regex is valid"), "[REDACTED_KEY]"),
    ]
});

/// Redact secrets from activity detail before it is persisted
pub fn redact_secrets(text: &str) -> String {
    let mut result = text.to_string();
    for (pattern, replacement) in REDACTION_PATTERNS.iter() {
        result = pattern.replace_all(&result, *replacement).to_string();
    }
    result
}

/// Collapse whitespace and cut the detail down to a preview
fn truncate_detail(detail: &str, max_len: usize) -> String {
    let cleaned = detail.split_whitespace().collect::<Vec<_>>().join(" ");
    if cleaned.chars().count() <= max_len {
        cleaned
    } else {
        let truncated: String = cleaned.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", truncated)
    }
}

/// Recognized user actions that reset the idle clock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Navigation,
    FormInteraction,
    Save,
    ManualExtension,
    ButtonClick,
    KeyboardInput,
    DataRefresh,
}

impl ActivityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Navigation => "navigation",
            Self::FormInteraction => "form_interaction",
            Self::Save => "save",
            Self::ManualExtension => "manual_extension",
            Self::ButtonClick => "button_click",
            Self::KeyboardInput => "keyboard_input",
            Self::DataRefresh => "data_refresh",
        }
    }
}

impl std::fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivityKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "navigation" => Ok(Self::Navigation),
            "form_interaction" => Ok(Self::FormInteraction),
            "save" => Ok(Self::Save),
            "manual_extension" => Ok(Self::ManualExtension),
            "button_click" => Ok(Self::ButtonClick),
            "keyboard_input" => Ok(Self::KeyboardInput),
            "data_refresh" => Ok(Self::DataRefresh),
            other => anyhow::bail!("unknown activity kind '{}'", other),
        }
    }
}

/// The last recorded activity, as persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub session_id: String,
    pub user_id: String,
    pub kind: ActivityKind,
    pub detail: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ActivityEntry {
    pub fn new(
        session_id: impl Into<String>,
        user_id: impl Into<String>,
        kind: ActivityKind,
        detail: Option<&str>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            user_id: user_id.into(),
            kind,
            detail: detail
                .map(|d| truncate_detail(&redact_secrets(d), DETAIL_MAX_LENGTH))
                .filter(|d| !d.is_empty()),
            timestamp: Utc::now(),
        }
    }
}

/// Destination for the advisory last-activity record.
pub trait ActivitySink: Send + Sync + 'static {
    fn record(&self, entry: &ActivityEntry) -> Result<()>;
}

/// Sink that drops every entry
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopActivityLog;

impl ActivitySink for NoopActivityLog {
    fn record(&self, _entry: &ActivityEntry) -> Result<()> {
        Ok(())
    }
}

/// Keeps the most recent activity in a small JSON file
#[derive(Debug, Clone)]
pub struct FileActivityLog {
    path: PathBuf,
}

impl FileActivityLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `~/.sessionwatch/last_activity.json`
    pub fn default_path() -> PathBuf {
        crate::config::data_dir().join("last_activity.json")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read back the last persisted activity, if any
    pub fn load_last(&self) -> Result<Option<ActivityEntry>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("reading {}", self.path.display()))?;
        let entry = serde_json::from_str(&content)
            .with_context(|| format!("parsing {}", self.path.display()))?;
        Ok(Some(entry))
    }
}

impl ActivitySink for FileActivityLog {
    fn record(&self, entry: &ActivityEntry) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        // Write-then-rename so a reader never sees a half-written record
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(entry)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
