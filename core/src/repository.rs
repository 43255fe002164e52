// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Repository seams to the local store and the remote server.
//!
//! The engine only ever talks to the two sides through these traits; how the
//! local store wraps its items or how the remote side formats requests is
//! the collaborators' concern.

use async_trait::async_trait;

use crate::error::SyncError;
use crate::types::{
    Appointment, LocalEntityId, LocalSnapshot, RemoteSnapshot, RemoteVersion, ResourceName,
};

/// A local entity acquired for inspection or transfer.
///
/// Some stores hand out items with manual lifetime (COM objects, file
/// locks); every acquired handle must be passed back to
/// [`LocalRepository::cleanup`] on every exit path, including failure paths.
#[derive(Debug)]
pub struct EntityHandle {
    /// Identity of the acquired entity.
    pub id: LocalEntityId,

    /// The entity's content.
    pub item: Appointment,
}

impl EntityHandle {
    /// Creates a new handle.
    #[must_use]
    pub const fn new(id: LocalEntityId, item: Appointment) -> Self {
        Self { id, item }
    }
}

/// The local (A-side) entity store.
#[async_trait]
pub trait LocalRepository: Send + Sync {
    /// Enumerates all local entities with their current versions.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be enumerated.
    async fn list(&self) -> Result<Vec<LocalSnapshot>, SyncError>;

    /// Fetches the given entities. An entity that no longer exists yields
    /// `None` in its slot; deletion races are expected and never an error.
    ///
    /// # Errors
    ///
    /// Returns an error only if the store itself fails.
    async fn get(
        &self,
        ids: &[LocalEntityId],
    ) -> Result<Vec<(LocalEntityId, Option<EntityHandle>)>, SyncError>;

    /// Releases acquired handles. Called on every exit path.
    fn cleanup(&self, handles: Vec<EntityHandle>);

    /// Creates a new entity and returns its assigned id and version.
    ///
    /// # Errors
    ///
    /// Returns an error if the store rejects the entity.
    async fn create(&self, item: Appointment) -> Result<LocalSnapshot, SyncError>;

    /// Replaces the content of an existing entity, returning its new version.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity cannot be written.
    async fn update(&self, id: &LocalEntityId, item: Appointment)
    -> Result<LocalSnapshot, SyncError>;

    /// Deletes an entity. Deleting an already-missing entity succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the store rejects the deletion.
    async fn delete(&self, id: &LocalEntityId) -> Result<(), SyncError>;
}

/// The remote (B-side) entity store.
///
/// Remote entities are opaque versioned blobs keyed by resource name; the
/// engine never looks inside them except through an [`EntityMapper`].
#[async_trait]
pub trait RemoteRepository: Send + Sync {
    /// Enumerates all remote entities with their current versions.
    ///
    /// # Errors
    ///
    /// Returns an error if the server cannot be enumerated.
    async fn list(&self) -> Result<Vec<RemoteSnapshot>, SyncError>;

    /// Fetches the given entities. Missing entities yield `None`.
    ///
    /// # Errors
    ///
    /// Returns an error only if the server itself fails.
    async fn get(
        &self,
        names: &[ResourceName],
    ) -> Result<Vec<(ResourceName, Option<String>)>, SyncError>;

    /// Creates a new entity from the given blob, returning its assigned
    /// resource name and version.
    ///
    /// # Errors
    ///
    /// Returns an error if the server rejects the entity.
    async fn create(&self, content: &str) -> Result<(ResourceName, RemoteVersion), SyncError>;

    /// Replaces the content of an existing entity, returning its new
    /// version. `known_version` is the version the engine last saw; the
    /// server may reject the write if it has moved on.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity cannot be written.
    async fn update(
        &self,
        name: &ResourceName,
        known_version: &RemoteVersion,
        content: &str,
    ) -> Result<RemoteVersion, SyncError>;

    /// Deletes an entity if it still carries `known_version`. Returns
    /// `false` if the entity changed or vanished in the meantime; the next
    /// run will pick it up.
    ///
    /// # Errors
    ///
    /// Returns an error if the server itself fails.
    async fn try_delete(
        &self,
        name: &ResourceName,
        known_version: &RemoteVersion,
    ) -> Result<bool, SyncError>;
}

/// Converts between local entity content and the remote blob format.
pub trait EntityMapper: Send + Sync {
    /// Renders an appointment into the remote blob format.
    ///
    /// # Errors
    ///
    /// Returns an error if the appointment cannot be rendered.
    fn to_remote(&self, item: &Appointment) -> Result<String, SyncError>;

    /// Parses a remote blob into appointment content.
    ///
    /// # Errors
    ///
    /// Returns an error if the blob cannot be parsed.
    fn to_local(&self, content: &str) -> Result<Appointment, SyncError>;
}

/// JSON blob mapper.
///
/// The production deployment maps to iCalendar outside this crate; this
/// mapper serves backends and tests whose remote blobs are JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonEntityMapper;

impl EntityMapper for JsonEntityMapper {
    fn to_remote(&self, item: &Appointment) -> Result<String, SyncError> {
        Ok(serde_json::to_string(item)?)
    }

    fn to_local(&self, content: &str) -> Result<Appointment, SyncError> {
        Ok(serde_json::from_str(content)?)
    }
}
