// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! SQLite-backed relation store.

use std::path::Path;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

use crate::error::SyncError;
use crate::relation::{EntityRelation, RelationDataAccess};
use crate::types::{LocalEntityId, LocalVersion, RemoteVersion, ResourceName};

/// Relation store persisted in a SQLite database.
#[derive(Debug, Clone)]
pub struct SqliteRelationStore {
    pool: SqlitePool,
}

impl SqliteRelationStore {
    /// Opens a sqlite database connection.
    /// If `filename` is `None`, it opens an in-memory database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrated.
    pub async fn open(filename: Option<&Path>) -> Result<Self, SyncError> {
        let mut pool_options = SqlitePoolOptions::new();
        let options = if let Some(filename) = filename {
            tracing::info!(path = %filename.display(), "connecting to SQLite database");
            SqliteConnectOptions::new()
                .filename(
                    filename
                        .to_str()
                        .ok_or_else(|| SyncError::Config("Invalid path encoding".to_string()))?,
                )
                .create_if_missing(true)
        } else {
            tracing::info!("connecting to in-memory SQLite database");
            // Every pooled connection would get its own in-memory database;
            // pin a single connection and keep it alive.
            pool_options = pool_options
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
            SqliteConnectOptions::new().in_memory(true)
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| SyncError::Store(format!("Failed to connect to SQLite database: {e}")))?;

        sqlx::migrate!("src/store/migrations") // relative path from the crate root
            .run(&pool)
            .await
            .map_err(|e| SyncError::Store(format!("Failed to run migrations: {e}")))?;

        Ok(Self { pool })
    }

    /// Closes the database connection.
    pub async fn close(self) {
        tracing::debug!("closing database connection");
        self.pool.close().await;
    }
}

#[async_trait]
impl RelationDataAccess for SqliteRelationStore {
    async fn load(&self) -> Result<Vec<EntityRelation>, SyncError> {
        const SQL: &str = "\
SELECT local_id, correlator, local_version, remote_id, remote_version
FROM entity_relations;
";

        let records: Vec<RelationRecord> = sqlx::query_as(SQL).fetch_all(&self.pool).await?;
        records.into_iter().map(RelationRecord::into_relation).collect()
    }

    async fn save(&self, relations: &[EntityRelation]) -> Result<(), SyncError> {
        const SQL: &str = "\
INSERT INTO entity_relations (local_id, correlator, local_version, remote_id, remote_version)
VALUES (?, ?, ?, ?, ?);
";

        let mut tx = self.pool.begin().await?;

        // Full replace of the persisted set for this profile.
        sqlx::query("DELETE FROM entity_relations;")
            .execute(&mut *tx)
            .await?;

        for relation in relations {
            sqlx::query(SQL)
                .bind(relation.local_id.entry_id())
                .bind(relation.local_id.correlator())
                .bind(relation.local_version.to_string())
                .bind(relation.remote_id.as_str())
                .bind(relation.remote_version.as_str())
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        tracing::debug!(count = relations.len(), "saved entity relations");
        Ok(())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct RelationRecord {
    local_id: String,
    correlator: Option<String>,
    local_version: String,
    remote_id: String,
    remote_version: String,
}

impl RelationRecord {
    fn into_relation(self) -> Result<EntityRelation, SyncError> {
        let at = self
            .local_version
            .parse()
            .map_err(|e| SyncError::Store(format!("Invalid local version timestamp: {e}")))?;

        Ok(EntityRelation::new(
            LocalEntityId::new(self.local_id, self.correlator),
            LocalVersion::new(at),
            ResourceName::new(self.remote_id),
            RemoteVersion::new(self.remote_version),
        ))
    }
}
