// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;

use crate::classifier::ConflictPolicy;
use crate::error::SyncError;

/// Configuration of one synchronization profile.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SyncProfile {
    /// Display name of the profile.
    pub name: String,

    /// How conflicts are resolved.
    #[serde(default)]
    pub conflict_policy: ConflictPolicy,

    /// Whether correlated delete/create pairs are coalesced into updates.
    #[serde(default = "default_true")]
    pub coalesce_moves: bool,

    /// Path of the relation database. `None` keeps relations in memory,
    /// which makes every run an initial synchronization.
    #[serde(default)]
    pub state_db: Option<PathBuf>,
}

fn default_true() -> bool {
    true
}

impl SyncProfile {
    /// Creates a profile with default settings.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            conflict_policy: ConflictPolicy::default(),
            coalesce_moves: true,
            state_db: None,
        }
    }

    /// Validates the profile.
    ///
    /// # Errors
    ///
    /// Returns an error if a field is unusable.
    pub fn normalize(&mut self) -> Result<(), SyncError> {
        self.name = self.name.trim().to_string();
        if self.name.is_empty() {
            return Err(SyncError::Config("Profile name must not be empty".into()));
        }

        if let Some(db) = &self.state_db
            && db.as_os_str().is_empty()
        {
            return Err(SyncError::Config(
                "State database path must not be empty".into(),
            ));
        }

        Ok(())
    }
}
