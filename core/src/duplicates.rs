// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Duplicate local entity detection and removal.
//!
//! Two local entities with the same `(start, end, subject)` would each sync
//! independently and turn into remote duplicates. The resolver tracks a
//! content hash per announced entity, and before classification (plus once
//! more at run finalization) collapses confirmed duplicate groups down to a
//! single survivor.

use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::Arc;

use crate::error::SyncError;
use crate::relation::RelationDataAccess;
use crate::repository::{LocalRepository, RemoteRepository};
use crate::types::{Appointment, LocalEntityId};

/// Tracks announced local entities and removes confirmed duplicates.
pub struct DuplicateResolver {
    hashes_by_id: HashMap<LocalEntityId, u64>,
    // Announce order; "first" in survivor selection means first announced.
    announced: Vec<LocalEntityId>,
    local: Arc<dyn LocalRepository>,
    remote: Arc<dyn RemoteRepository>,
    relations: Arc<dyn RelationDataAccess>,
}

impl DuplicateResolver {
    /// Creates a resolver over the given collaborators.
    #[must_use]
    pub fn new(
        local: Arc<dyn LocalRepository>,
        remote: Arc<dyn RemoteRepository>,
        relations: Arc<dyn RelationDataAccess>,
    ) -> Self {
        Self {
            hashes_by_id: HashMap::new(),
            announced: Vec::new(),
            local,
            remote,
            relations,
        }
    }

    /// Records an observed local entity. Called once per entity per run.
    pub fn announce(&mut self, id: LocalEntityId, item: &Appointment) {
        if self.hashes_by_id.insert(id.clone(), content_hash(item)).is_none() {
            self.announced.push(id);
        }
    }

    /// Forgets an entity that was deleted through other means.
    pub fn announce_deleted(&mut self, id: &LocalEntityId) {
        if self.hashes_by_id.remove(id).is_some() {
            self.announced.retain(|a| a != id);
        }
    }

    /// Collapses announced duplicate groups whose members `can_delete`
    /// allows deleting, keeping one survivor per group.
    ///
    /// The survivor is the first entity `can_delete` refuses, otherwise the
    /// first entity of the group. Hash groups are re-checked against the
    /// exact content tuple, so hash collisions never cause a deletion.
    /// Returns the deleted ids so the caller can purge in-flight state.
    ///
    /// # Errors
    ///
    /// Returns an error if the local store fails. Entities that vanished
    /// between announce and fetch are skipped, not errors.
    pub async fn resolve_announced_if_confirmed(
        &mut self,
        can_delete: &(dyn Fn(&LocalEntityId) -> bool + Send + Sync),
    ) -> Result<Vec<LocalEntityId>, SyncError> {
        let mut deleted = Vec::new();

        for group in self.hash_groups() {
            let members = self.fetch_contents(&group).await?;

            for exact_group in exact_groups(members) {
                let survivor = exact_group
                    .iter()
                    .position(|(id, _)| !can_delete(id))
                    .unwrap_or(0);

                for (idx, (id, _)) in exact_group.iter().enumerate() {
                    if idx == survivor || !can_delete(id) {
                        continue;
                    }

                    tracing::info!(
                        keep = %exact_group[survivor].0,
                        delete = %id,
                        "deleting duplicate local entity"
                    );
                    self.local.delete(id).await?;
                    self.forget(id);
                    deleted.push(id.clone());
                }
            }
        }

        Ok(deleted)
    }

    /// Run-finalization pass: unconditionally collapses every confirmed
    /// duplicate group to its first member, deleting the other members
    /// locally and, where a relation is known, their remote counterparts
    /// and relation records. Persists the updated relation set.
    ///
    /// # Errors
    ///
    /// Returns an error if a store fails; vanished entities are skipped.
    pub async fn resolve_all(&mut self) -> Result<(), SyncError> {
        let groups = self.hash_groups();
        if groups.is_empty() {
            return Ok(());
        }

        let mut relations_by_local: HashMap<LocalEntityId, _> = self
            .relations
            .load()
            .await?
            .into_iter()
            .map(|r| (r.local_id.clone(), r))
            .collect();

        for group in groups {
            let members = self.fetch_contents(&group).await?;

            for exact_group in exact_groups(members) {
                for (id, _) in exact_group.into_iter().skip(1) {
                    tracing::info!(delete = %id, "deleting duplicate at run finalization");

                    if let Some(relation) = relations_by_local.remove(&id) {
                        self.remote
                            .try_delete(&relation.remote_id, &relation.remote_version)
                            .await?;
                    }
                    self.local.delete(&id).await?;
                    self.forget(&id);
                }
            }
        }

        let relations: Vec<_> = relations_by_local.into_values().collect();
        self.relations.save(&relations).await
    }

    fn forget(&mut self, id: &LocalEntityId) {
        self.hashes_by_id.remove(id);
        self.announced.retain(|a| a != id);
    }

    /// Groups of announced ids sharing a content hash, members in announce
    /// order.
    fn hash_groups(&self) -> Vec<Vec<LocalEntityId>> {
        let mut order: Vec<u64> = Vec::new();
        let mut by_hash: HashMap<u64, Vec<LocalEntityId>> = HashMap::new();
        for id in &self.announced {
            let Some(&hash) = self.hashes_by_id.get(id) else {
                continue;
            };
            let group = by_hash.entry(hash).or_default();
            if group.is_empty() {
                order.push(hash);
            }
            group.push(id.clone());
        }

        order
            .into_iter()
            .filter_map(|hash| by_hash.remove(&hash))
            .filter(|g| g.len() > 1)
            .collect()
    }

    /// Fetches the current content of the given entities, releasing every
    /// acquired handle before returning. Vanished entities are dropped.
    async fn fetch_contents(
        &self,
        ids: &[LocalEntityId],
    ) -> Result<Vec<(LocalEntityId, Appointment)>, SyncError> {
        let fetched = self.local.get(ids).await?;

        let mut handles = Vec::new();
        let mut contents = Vec::new();
        for (id, handle) in fetched {
            if let Some(handle) = handle {
                contents.push((id, handle.item.clone()));
                handles.push(handle);
            }
        }

        // Handles go back to the store before any of the content is acted
        // on; deletes are issued by id.
        self.local.cleanup(handles);
        Ok(contents)
    }
}

impl std::fmt::Debug for DuplicateResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DuplicateResolver")
            .field("announced", &self.hashes_by_id.len())
            .finish_non_exhaustive()
    }
}

/// Splits hash-group members into groups of exactly equal content, dropping
/// singletons. Hashes can collide; only the exact tuple confirms a
/// duplicate.
fn exact_groups(
    members: Vec<(LocalEntityId, Appointment)>,
) -> Vec<Vec<(LocalEntityId, Appointment)>> {
    let mut groups: Vec<Vec<(LocalEntityId, Appointment)>> = Vec::new();
    for (id, item) in members {
        match groups
            .iter_mut()
            .find(|g| g[0].1.duplication_key() == item.duplication_key())
        {
            Some(group) => group.push((id, item)),
            None => groups.push(vec![(id, item)]),
        }
    }
    groups.retain(|g| g.len() > 1);
    groups
}

fn content_hash(item: &Appointment) -> u64 {
    let mut hasher = DefaultHasher::new();
    item.start.as_nanosecond().hash(&mut hasher);
    item.end.as_nanosecond().hash(&mut hasher);
    item.subject.hash(&mut hasher);
    hasher.finish()
}
