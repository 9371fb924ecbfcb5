// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Warning dispatch.
//!
//! At most one warning is visible at a time. The slot holds the most severe
//! warning raised during the current idle run; escalation replaces it,
//! dismissal empties it, and recorded activity resets the whole run.
//!
//! ## Crossing window
//!
//! Ticks are discrete, so a threshold is never matched by equality. A
//! threshold `t` counts as freshly crossed when
//!
//! ```text
//! t <= elapsed < t + tick_period
//! ```
//!
//! or when the previous tick of the same idle run observed `elapsed < t`
//! (a late tick, e.g. a throttled host, jumped over the window). Either way a
//! threshold fires at most once per idle run.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::config::WarningThreshold;

/// Warning severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WarningKind {
    Warning,
    Critical,
}

/// How a UI collaborator is expected to surface a warning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningPresentation {
    Toast,
    Modal,
}

impl WarningKind {
    pub fn presentation(&self) -> WarningPresentation {
        match self {
            WarningKind::Warning => WarningPresentation::Toast,
            WarningKind::Critical => WarningPresentation::Modal,
        }
    }
}

impl std::fmt::Display for WarningKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WarningKind::Warning => write!(f, "WARNING"),
            WarningKind::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// The warning currently occupying the slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActiveWarning {
    pub kind: WarningKind,
    pub label: String,
}

/// Read-only warning view for toast/modal rendering
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WarningSnapshot {
    pub show: bool,
    pub kind: Option<WarningKind>,
    pub label: Option<String>,
    pub presentation: Option<WarningPresentation>,
}

impl From<Option<&ActiveWarning>> for WarningSnapshot {
    fn from(active: Option<&ActiveWarning>) -> Self {
        match active {
            Some(w) => Self {
                show: true,
                kind: Some(w.kind),
                label: Some(w.label.clone()),
                presentation: Some(w.kind.presentation()),
            },
            None => Self::default(),
        }
    }
}

/// Bounded-window crossing test.
pub fn crossed_threshold(
    trigger: Duration,
    elapsed: Duration,
    previous_elapsed: Option<Duration>,
    tolerance: Duration,
) -> bool {
    if elapsed < trigger {
        return false;
    }
    let within_window = elapsed < trigger + tolerance;
    let jumped_over = previous_elapsed.map_or(false, |prev| prev < trigger);
    within_window || jumped_over
}

/// Single-slot warning dispatcher for one idle run.
#[derive(Debug, Clone)]
pub struct WarningDispatcher {
    slot: Option<ActiveWarning>,
    fired: Vec<bool>,
    escalation: Option<WarningKind>,
}

impl WarningDispatcher {
    pub fn new(threshold_count: usize) -> Self {
        Self {
            slot: None,
            fired: vec![false; threshold_count],
            escalation: None,
        }
    }

    /// Raise a warning. Only an empty slot or an equal-or-higher severity
    /// replaces the current one. Returns true if the slot changed.
    pub fn raise(&mut self, kind: WarningKind, label: impl Into<String>) -> bool {
        let label = label.into();
        if let Some(current) = &self.slot {
            if kind < current.kind || (kind == current.kind && label == current.label) {
                return false;
            }
        }
        self.escalation = self.escalation.max(Some(kind));
        self.slot = Some(ActiveWarning { kind, label });
        true
    }

    /// Hide the visible warning. The idle run, and therefore the session state,
    /// is left untouched.
    pub fn dismiss(&mut self) -> Option<ActiveWarning> {
        self.slot.take()
    }

    /// Start a new idle run: every threshold is re-armed.
    pub fn reset(&mut self) {
        self.slot = None;
        self.escalation = None;
        self.fired.iter_mut().for_each(|f| *f = false);
    }

    /// Fire every threshold freshly crossed at `elapsed`, in ascending order.
    /// The most severe one ends up in the slot. Returns the newly raised
    /// warning, if any.
    pub fn evaluate(
        &mut self,
        thresholds: &[WarningThreshold],
        elapsed: Duration,
        previous_elapsed: Option<Duration>,
        tolerance: Duration,
    ) -> Option<ActiveWarning> {
        let mut raised = None;
        for (idx, threshold) in thresholds.iter().enumerate() {
            if self.fired.get(idx).copied().unwrap_or(true) {
                continue;
            }
            if !crossed_threshold(threshold.trigger_after_idle, elapsed, previous_elapsed, tolerance) {
                continue;
            }
            self.fired[idx] = true;
            if self.raise(threshold.kind, threshold.label.clone()) {
                raised = self.slot.clone();
            }
        }
        raised
    }

    pub fn active(&self) -> Option<&ActiveWarning> {
        self.slot.as_ref()
    }

    /// Most severe kind fired during this idle run, dismissed or not
    pub fn escalation(&self) -> Option<WarningKind> {
        self.escalation
    }

    pub fn snapshot(&self) -> WarningSnapshot {
        WarningSnapshot::from(self.slot.as_ref())
    }
}
