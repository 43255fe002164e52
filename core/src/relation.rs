// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Persisted links between local and remote entities.

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::SyncError;
use crate::types::{LocalEntityId, LocalVersion, RemoteVersion, ResourceName};

/// The persisted link between one local and one remote entity, together with
/// the versions both sides had when they were last synchronized.
///
/// At most one relation exists per local id and per remote id at any time.
/// A relation whose local or remote entity has vanished is tolerated; the
/// classifier treats the missing side as absence and the run cleans the
/// record up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityRelation {
    /// Identity of the local entity.
    pub local_id: LocalEntityId,

    /// Local version at the time of the last sync.
    pub local_version: LocalVersion,

    /// Resource name of the remote entity.
    pub remote_id: ResourceName,

    /// Remote version at the time of the last sync.
    pub remote_version: RemoteVersion,
}

impl EntityRelation {
    /// Creates a new relation record.
    #[must_use]
    pub const fn new(
        local_id: LocalEntityId,
        local_version: LocalVersion,
        remote_id: ResourceName,
        remote_version: RemoteVersion,
    ) -> Self {
        Self {
            local_id,
            local_version,
            remote_id,
            remote_version,
        }
    }
}

/// Access to the persisted relation set of one profile.
///
/// `save` replaces the whole persisted set; partial updates are expressed by
/// loading, mutating in memory during the run and saving the result.
#[async_trait]
pub trait RelationDataAccess: Send + Sync {
    /// Loads all persisted relations.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be read.
    async fn load(&self) -> Result<Vec<EntityRelation>, SyncError>;

    /// Replaces the persisted relation set.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be written.
    async fn save(&self, relations: &[EntityRelation]) -> Result<(), SyncError>;
}

/// Relation store held in memory.
///
/// Suitable for tests and for profiles that have not yet persisted anything;
/// a fresh instance loads an empty set, which is what makes a run an initial
/// synchronization.
#[derive(Debug, Default)]
pub struct InMemoryRelationStore {
    relations: Mutex<Vec<EntityRelation>>,
}

impl InMemoryRelationStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with the given relations.
    #[must_use]
    pub fn with_relations(relations: Vec<EntityRelation>) -> Self {
        Self {
            relations: Mutex::new(relations),
        }
    }
}

#[async_trait]
impl RelationDataAccess for InMemoryRelationStore {
    async fn load(&self) -> Result<Vec<EntityRelation>, SyncError> {
        Ok(self.relations.lock().await.clone())
    }

    async fn save(&self, relations: &[EntityRelation]) -> Result<(), SyncError> {
        *self.relations.lock().await = relations.to_vec();
        Ok(())
    }
}
