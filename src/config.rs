// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Application settings stored in `~/.sessionwatch/config.json`.
//!
//! Session timing is not configurable here; these settings cover the ambient
//! pieces (activity record, log filter, demo speed).

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Persist the last activity to disk (default: true)
    #[serde(default = "default_activity_log_enabled")]
    pub activity_log_enabled: bool,
    /// `tracing` filter used when `RUST_LOG` is unset (default: "info")
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
    /// Divides every session duration in `sessionwatch run` (default: 60)
    #[serde(default = "default_demo_speedup")]
    pub demo_speedup: u32,
}

fn default_activity_log_enabled() -> bool {
    true
}

fn default_log_filter() -> String {
    "info".to_string()
}

fn default_demo_speedup() -> u32 {
    60
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            activity_log_enabled: default_activity_log_enabled(),
            log_filter: default_log_filter(),
            demo_speedup: default_demo_speedup(),
        }
    }
}

/// `~/.sessionwatch`, or `./.sessionwatch` without a home directory
pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".sessionwatch")
}

pub fn config_path() -> PathBuf {
    data_dir().join("config.json")
}

/// Load the config, falling back to defaults when the file does not exist.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        return Ok(AppConfig::default());
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let config = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(config)
}

pub fn save_config_to(path: &Path, config: &AppConfig) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let content = serde_json::to_string_pretty(config)?;
    fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

pub fn load_config() -> Result<AppConfig> {
    load_config_from(&config_path())
}

pub fn save_config(config: &AppConfig) -> Result<()> {
    save_config_to(&config_path(), config)
}
