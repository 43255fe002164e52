// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use std::fmt;

/// Engine errors.
///
/// Entity absence is never an error: repositories report missing entities as
/// `None` and the classifier treats absence as a first-class input. Failures
/// of a single entity's action are captured in the run report instead of
/// being raised through this type.
#[non_exhaustive]
#[derive(Debug)]
pub enum SyncError {
    /// Relation store error.
    Store(String),

    /// Repository (local or remote) error.
    Repository(String),

    /// Entity mapper error.
    Mapper(String),

    /// Configuration error.
    Config(String),
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Store(e) => write!(f, "Relation store error: {e}"),
            Self::Repository(e) => write!(f, "Repository error: {e}"),
            Self::Mapper(e) => write!(f, "Entity mapper error: {e}"),
            Self::Config(e) => write!(f, "Configuration error: {e}"),
        }
    }
}

impl std::error::Error for SyncError {}

impl From<sqlx::Error> for SyncError {
    fn from(e: sqlx::Error) -> Self {
        Self::Store(e.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for SyncError {
    fn from(e: sqlx::migrate::MigrateError) -> Self {
        Self::Store(e.to_string())
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(e: serde_json::Error) -> Self {
        Self::Mapper(e.to_string())
    }
}
