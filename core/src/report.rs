// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Per-run outcome reporting.

use jiff::Timestamp;
use uuid::Uuid;

/// Result of one entity's action within a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The action was applied.
    Done,

    /// Nothing had to happen (no-op, discard, or no-retry skip).
    Skipped,

    /// The action failed; the run continued with the remaining entities.
    Failed(String),
}

/// One entity's outcome within a run.
#[derive(Debug, Clone)]
pub struct EntityOutcome {
    /// Displayable identity of the entity pair.
    pub subject: String,

    /// Name of the attempted action.
    pub action: &'static str,

    /// What happened.
    pub result: Outcome,
}

/// Aggregated outcomes of one synchronization run.
#[derive(Debug, Clone)]
pub struct SyncReport {
    /// Identifier of this run.
    pub run_id: Uuid,

    /// When the run started.
    pub started: Timestamp,

    /// When the run finished (or was cancelled).
    pub finished: Timestamp,

    /// Whether the run was cancelled before executing every action.
    pub cancelled: bool,

    /// Per-entity outcomes, in execution order.
    pub outcomes: Vec<EntityOutcome>,
}

impl SyncReport {
    /// Number of successfully applied actions.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.result == Outcome::Done)
            .count()
    }

    /// Number of skipped entities.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.result == Outcome::Skipped)
            .count()
    }

    /// Number of failed entities.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.result, Outcome::Failed(_)))
            .count()
    }

    /// Whether every attempted action succeeded.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        !self.cancelled && self.failed() == 0
    }
}
