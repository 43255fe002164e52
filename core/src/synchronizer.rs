// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! The synchronization run orchestrator.
//!
//! One [`Synchronizer`] drives one profile. A run loads the persisted
//! relations, enumerates both sides, resolves confirmed local duplicates,
//! classifies every pair, lets the interceptor coalesce correlated moves,
//! executes the resulting states and persists the updated relation set.
//! Failures of a single entity's action are reported and never abort the
//! run. The caller must serialize runs per profile; no two runs may share a
//! relation store concurrently.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use jiff::Timestamp;
use uuid::Uuid;

use crate::classifier::{PairInput, classify};
use crate::config::SyncProfile;
use crate::duplicates::DuplicateResolver;
use crate::error::SyncError;
use crate::interceptor::coalesce_moves;
use crate::relation::{EntityRelation, RelationDataAccess};
use crate::report::{EntityOutcome, Outcome, SyncReport};
use crate::repository::{EntityMapper, LocalRepository, RemoteRepository};
use crate::state::SyncState;
use crate::types::{
    Appointment, LocalEntityId, LocalSnapshot, LocalVersion, RemoteSnapshot, RemoteVersion,
    ResourceName,
};

/// Cooperative cancellation signal for a run.
///
/// Cancellation is honored between phases and between entity actions:
/// already-applied relation updates are kept, remaining actions are
/// abandoned and acquired handles are released.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// Creates a flag in the not-cancelled state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

type IdPredicate = dyn Fn(&LocalEntityId) -> bool + Send + Sync;

/// Drives synchronization runs for one profile.
pub struct Synchronizer {
    profile: SyncProfile,
    local: Arc<dyn LocalRepository>,
    remote: Arc<dyn RemoteRepository>,
    relations: Arc<dyn RelationDataAccess>,
    mapper: Arc<dyn EntityMapper>,
    resolver: DuplicateResolver,
    restoreable: Box<IdPredicate>,
    can_delete_duplicate: Box<IdPredicate>,
    no_retry: HashSet<LocalEntityId>,
}

impl Synchronizer {
    /// Creates a synchronizer over the given collaborators.
    #[must_use]
    pub fn new(
        profile: SyncProfile,
        local: Arc<dyn LocalRepository>,
        remote: Arc<dyn RemoteRepository>,
        relations: Arc<dyn RelationDataAccess>,
        mapper: Arc<dyn EntityMapper>,
    ) -> Self {
        let resolver =
            DuplicateResolver::new(Arc::clone(&local), Arc::clone(&remote), Arc::clone(&relations));
        Self {
            profile,
            local,
            remote,
            relations,
            mapper,
            resolver,
            restoreable: Box::new(|_| false),
            can_delete_duplicate: Box::new(|_| true),
            no_retry: HashSet::new(),
        }
    }

    /// Sets the predicate deciding whether a delete candidate can be
    /// restored from a trash mechanism instead of hard-deleted.
    #[must_use]
    pub fn with_restoreable(
        mut self,
        predicate: impl Fn(&LocalEntityId) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.restoreable = Box::new(predicate);
        self
    }

    /// Sets the predicate protecting pinned entities from duplicate
    /// removal.
    #[must_use]
    pub fn with_duplicate_guard(
        mut self,
        predicate: impl Fn(&LocalEntityId) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.can_delete_duplicate = Box::new(predicate);
        self
    }

    /// Runs one synchronization pass.
    ///
    /// # Errors
    ///
    /// Returns an error only for store or enumeration failures that make
    /// the run as a whole impossible; per-entity action failures end up in
    /// the report instead.
    pub async fn synchronize(&mut self, cancel: &CancelFlag) -> Result<SyncReport, SyncError> {
        let run_id = Uuid::new_v4();
        let started = Timestamp::now();
        tracing::info!(%run_id, profile = %self.profile.name, "starting synchronization run");

        let loaded = self.relations.load().await?;
        if loaded.is_empty() {
            tracing::info!("no persisted relations; this is an initial synchronization");
        }
        let loaded_by_local: HashMap<LocalEntityId, EntityRelation> = loaded
            .iter()
            .map(|r| (r.local_id.clone(), r.clone()))
            .collect();

        let locals = self.local.list().await?;
        let remotes = self.remote.list().await?;
        tracing::debug!(
            locals = locals.len(),
            remotes = remotes.len(),
            relations = loaded.len(),
            "enumerated both sides"
        );

        if cancel.is_cancelled() {
            return Ok(cancelled_report(run_id, started));
        }

        let locals = self.resolve_duplicates(locals).await?;

        if cancel.is_cancelled() {
            return Ok(cancelled_report(run_id, started));
        }

        let mut states = self.classify_pairs(locals, remotes, loaded);
        if self.profile.coalesce_moves {
            coalesce_moves(&mut states);
        }

        let (outcomes, new_relations, cancelled) =
            self.execute_states(states, &loaded_by_local, cancel).await;

        self.relations.save(&new_relations).await?;

        if !cancelled && let Err(e) = self.resolver.resolve_all().await {
            tracing::warn!(err = %e, "duplicate finalization pass failed");
        }

        let report = SyncReport {
            run_id,
            started,
            finished: Timestamp::now(),
            cancelled,
            outcomes,
        };
        tracing::info!(
            %run_id,
            succeeded = report.succeeded(),
            skipped = report.skipped(),
            failed = report.failed(),
            cancelled = report.cancelled,
            "synchronization run finished"
        );
        Ok(report)
    }

    /// Announces every local entity and removes confirmed duplicates before
    /// classification, so the survivors are the only entities the run sees.
    async fn resolve_duplicates(
        &mut self,
        locals: Vec<LocalSnapshot>,
    ) -> Result<Vec<LocalSnapshot>, SyncError> {
        let ids: Vec<_> = locals.iter().map(|s| s.id.clone()).collect();
        let fetched = self.local.get(&ids).await?;

        let mut handles = Vec::new();
        for (id, handle) in fetched {
            if let Some(handle) = handle {
                self.resolver.announce(id, &handle.item);
                handles.push(handle);
            }
        }
        self.local.cleanup(handles);

        let deleted = self
            .resolver
            .resolve_announced_if_confirmed(self.can_delete_duplicate.as_ref())
            .await?;
        if deleted.is_empty() {
            return Ok(locals);
        }

        tracing::info!(count = deleted.len(), "purged duplicate local entities");
        let deleted: HashSet<_> = deleted.into_iter().collect();
        Ok(locals
            .into_iter()
            .filter(|s| !deleted.contains(&s.id))
            .collect())
    }

    fn classify_pairs(
        &self,
        locals: Vec<LocalSnapshot>,
        remotes: Vec<RemoteSnapshot>,
        relations: Vec<EntityRelation>,
    ) -> Vec<SyncState> {
        build_pairs(locals, remotes, relations)
            .into_iter()
            .map(|(local, remote, relation)| {
                let flags_id = relation.as_ref().map(|r| &r.local_id);
                let restoreable = flags_id.is_some_and(|id| (self.restoreable)(id));
                let no_retry = flags_id.is_some_and(|id| self.no_retry.contains(id));
                classify(
                    PairInput {
                        local,
                        remote,
                        relation,
                        restoreable,
                        no_retry,
                    },
                    self.profile.conflict_policy,
                )
            })
            .collect()
    }

    /// Executes the state list, collecting per-entity outcomes and the
    /// relation set to persist. Returns early on cancellation, preserving
    /// the known relations of every unexecuted state.
    async fn execute_states(
        &mut self,
        states: Vec<SyncState>,
        loaded_by_local: &HashMap<LocalEntityId, EntityRelation>,
        cancel: &CancelFlag,
    ) -> (Vec<EntityOutcome>, Vec<EntityRelation>, bool) {
        let mut outcomes = Vec::with_capacity(states.len());
        let mut new_relations = Vec::new();
        let mut next_no_retry = HashSet::new();
        let mut cancelled = false;

        let mut pending = states.into_iter();
        while let Some(state) = pending.next() {
            if cancel.is_cancelled() {
                tracing::info!("cancellation requested; abandoning remaining actions");
                cancelled = true;
                new_relations.extend(fallback_relation(&state, loaded_by_local));
                for remaining in pending.by_ref() {
                    new_relations.extend(fallback_relation(&remaining, loaded_by_local));
                }
                break;
            }

            let subject = state.subject();
            let action = state.name();
            tracing::debug!(subject = %subject, action, "executing state");

            match self.execute(&state).await {
                Ok((result, relation)) => {
                    if let Some(id) = failed_delete_id(&state, &result) {
                        next_no_retry.insert(id);
                    }
                    new_relations.extend(relation);
                    outcomes.push(EntityOutcome {
                        subject,
                        action,
                        result,
                    });
                }
                Err(e) => {
                    tracing::warn!(subject = %subject, action, err = %e, "entity action failed");
                    if let Some(id) = delete_target(&state) {
                        next_no_retry.insert(id);
                    }
                    new_relations.extend(fallback_relation(&state, loaded_by_local));
                    outcomes.push(EntityOutcome {
                        subject,
                        action,
                        result: Outcome::Failed(e.to_string()),
                    });
                }
            }
        }

        self.no_retry = next_no_retry;
        (outcomes, new_relations, cancelled)
    }

    /// Applies one state. Returns the outcome and the relation record the
    /// pair contributes to the persisted set.
    async fn execute(
        &mut self,
        state: &SyncState,
    ) -> Result<(Outcome, Option<EntityRelation>), SyncError> {
        match state {
            SyncState::DoNothing { relation } | SyncState::Discard { relation } => {
                Ok((Outcome::Skipped, relation.clone()))
            }

            SyncState::CreateInA {
                remote_id,
                remote_version,
            } => self.create_in_a(remote_id, remote_version).await,

            SyncState::CreateInB {
                local_id,
                local_version,
            } => self.create_in_b(local_id, *local_version).await,

            SyncState::DeleteInA { relation, no_retry } => {
                if *no_retry {
                    return Ok((Outcome::Skipped, Some(relation.clone())));
                }
                self.local.delete(&relation.local_id).await?;
                self.resolver.announce_deleted(&relation.local_id);
                Ok((Outcome::Done, None))
            }

            SyncState::DeleteInB { relation, no_retry } => {
                if *no_retry {
                    return Ok((Outcome::Skipped, Some(relation.clone())));
                }
                if self
                    .remote
                    .try_delete(&relation.remote_id, &relation.remote_version)
                    .await?
                {
                    Ok((Outcome::Done, None))
                } else {
                    // The remote side moved on; the next run reclassifies.
                    Ok((
                        Outcome::Failed("remote entity changed; delete not applied".into()),
                        Some(relation.clone()),
                    ))
                }
            }

            SyncState::UpdateAToB {
                relation,
                local_version,
                remote_version,
            } => {
                self.update_a_to_b(relation, *local_version, remote_version)
                    .await
            }

            SyncState::UpdateBToA {
                relation,
                remote_version,
                ..
            } => self.update_b_to_a(relation, remote_version).await,

            SyncState::UpdateFromNewerToOlder {
                relation,
                local_version,
                remote_version,
                remote_modified,
            } => {
                // A remote side without a modification time loses.
                let remote_newer =
                    remote_modified.is_some_and(|m| m > local_version.timestamp());
                if remote_newer {
                    self.update_b_to_a(relation, remote_version).await
                } else {
                    self.update_a_to_b(relation, *local_version, remote_version)
                        .await
                }
            }

            SyncState::RestoreInA {
                relation,
                remote_version,
            } => {
                let Some(content) = self.fetch_remote(&relation.remote_id).await? else {
                    return Ok((Outcome::Skipped, None));
                };
                let item = self.mapper.to_local(&content)?;
                let snapshot = self.local.create(item.clone()).await?;
                self.resolver.announce(snapshot.id.clone(), &item);
                Ok((
                    Outcome::Done,
                    Some(EntityRelation::new(
                        snapshot.id,
                        snapshot.version,
                        relation.remote_id.clone(),
                        remote_version.clone(),
                    )),
                ))
            }

            SyncState::RestoreInB {
                relation,
                local_version,
            } => {
                let Some(item) = self.fetch_local(&relation.local_id).await? else {
                    return Ok((Outcome::Skipped, None));
                };
                let content = self.mapper.to_remote(&item)?;
                let (remote_id, remote_version) = self.remote.create(&content).await?;
                Ok((
                    Outcome::Done,
                    Some(EntityRelation::new(
                        relation.local_id.clone(),
                        *local_version,
                        remote_id,
                        remote_version,
                    )),
                ))
            }
        }
    }

    async fn create_in_a(
        &mut self,
        remote_id: &ResourceName,
        remote_version: &RemoteVersion,
    ) -> Result<(Outcome, Option<EntityRelation>), SyncError> {
        let Some(content) = self.fetch_remote(remote_id).await? else {
            // Deleted on the server since enumeration.
            return Ok((Outcome::Skipped, None));
        };
        let item = self.mapper.to_local(&content)?;
        let snapshot = self.local.create(item.clone()).await?;
        self.resolver.announce(snapshot.id.clone(), &item);
        Ok((
            Outcome::Done,
            Some(EntityRelation::new(
                snapshot.id,
                snapshot.version,
                remote_id.clone(),
                remote_version.clone(),
            )),
        ))
    }

    async fn create_in_b(
        &mut self,
        local_id: &LocalEntityId,
        local_version: LocalVersion,
    ) -> Result<(Outcome, Option<EntityRelation>), SyncError> {
        let Some(item) = self.fetch_local(local_id).await? else {
            // Deleted locally since enumeration.
            self.resolver.announce_deleted(local_id);
            return Ok((Outcome::Skipped, None));
        };
        let content = self.mapper.to_remote(&item)?;
        let (remote_id, remote_version) = self.remote.create(&content).await?;
        Ok((
            Outcome::Done,
            Some(EntityRelation::new(
                local_id.clone(),
                local_version,
                remote_id,
                remote_version,
            )),
        ))
    }

    async fn update_a_to_b(
        &mut self,
        relation: &EntityRelation,
        local_version: LocalVersion,
        remote_version: &RemoteVersion,
    ) -> Result<(Outcome, Option<EntityRelation>), SyncError> {
        let Some(item) = self.fetch_local(&relation.local_id).await? else {
            return Ok((Outcome::Skipped, Some(relation.clone())));
        };
        let content = self.mapper.to_remote(&item)?;
        let new_version = self
            .remote
            .update(&relation.remote_id, remote_version, &content)
            .await?;
        Ok((
            Outcome::Done,
            Some(EntityRelation::new(
                relation.local_id.clone(),
                local_version,
                relation.remote_id.clone(),
                new_version,
            )),
        ))
    }

    async fn update_b_to_a(
        &mut self,
        relation: &EntityRelation,
        remote_version: &RemoteVersion,
    ) -> Result<(Outcome, Option<EntityRelation>), SyncError> {
        let Some(content) = self.fetch_remote(&relation.remote_id).await? else {
            return Ok((Outcome::Skipped, Some(relation.clone())));
        };
        let item = self.mapper.to_local(&content)?;
        let snapshot = self.local.update(&relation.local_id, item.clone()).await?;
        self.resolver.announce(snapshot.id.clone(), &item);
        Ok((
            Outcome::Done,
            Some(EntityRelation::new(
                snapshot.id,
                snapshot.version,
                relation.remote_id.clone(),
                remote_version.clone(),
            )),
        ))
    }

    /// Fetches one local entity's content, releasing the handle before
    /// returning. `None` means the entity vanished, which is expected.
    async fn fetch_local(&self, id: &LocalEntityId) -> Result<Option<Appointment>, SyncError> {
        let fetched = self.local.get(std::slice::from_ref(id)).await?;

        let mut handles = Vec::new();
        let mut item = None;
        for (_, handle) in fetched {
            if let Some(handle) = handle {
                if item.is_none() {
                    item = Some(handle.item.clone());
                }
                handles.push(handle);
            }
        }
        self.local.cleanup(handles);
        Ok(item)
    }

    async fn fetch_remote(&self, name: &ResourceName) -> Result<Option<String>, SyncError> {
        let fetched = self.remote.get(std::slice::from_ref(name)).await?;
        Ok(fetched.into_iter().find_map(|(_, content)| content))
    }
}

impl std::fmt::Debug for Synchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Synchronizer")
            .field("profile", &self.profile)
            .field("no_retry", &self.no_retry.len())
            .finish_non_exhaustive()
    }
}

fn cancelled_report(run_id: Uuid, started: Timestamp) -> SyncReport {
    SyncReport {
        run_id,
        started,
        finished: Timestamp::now(),
        cancelled: true,
        outcomes: Vec::new(),
    }
}

/// Pairs up local entities, remote entities and stored relations into
/// classification triples.
///
/// Relations claim their sides first; leftover entities pair by correlator
/// (the remote entity's stable UID against the local correlator); anything
/// still unmatched classifies alone.
fn build_pairs(
    locals: Vec<LocalSnapshot>,
    remotes: Vec<RemoteSnapshot>,
    relations: Vec<EntityRelation>,
) -> Vec<(Option<LocalSnapshot>, Option<RemoteSnapshot>, Option<EntityRelation>)> {
    let mut local_by_id: HashMap<LocalEntityId, LocalSnapshot> =
        locals.iter().map(|s| (s.id.clone(), s.clone())).collect();
    let mut remote_by_id: HashMap<ResourceName, RemoteSnapshot> =
        remotes.iter().map(|s| (s.id.clone(), s.clone())).collect();

    let mut pairs = Vec::new();
    for relation in relations {
        let local = local_by_id.remove(&relation.local_id);
        let remote = remote_by_id.remove(&relation.remote_id);
        pairs.push((local, remote, Some(relation)));
    }

    // Initial matching: pair relation-less sides by the stable correlator.
    let mut remote_by_correlator: HashMap<String, ResourceName> = HashMap::new();
    for remote in remote_by_id.values() {
        if let Some(correlator) = &remote.correlator {
            remote_by_correlator.insert(correlator.clone(), remote.id.clone());
        }
    }

    for local in &locals {
        let Some(local) = local_by_id.remove(&local.id) else {
            continue;
        };
        let matched = local
            .id
            .correlator()
            .and_then(|c| remote_by_correlator.get(c))
            .cloned()
            .and_then(|name| remote_by_id.remove(&name));
        pairs.push((Some(local), matched, None));
    }

    for remote in remotes {
        if let Some(remote) = remote_by_id.remove(&remote.id) {
            pairs.push((None, Some(remote), None));
        }
    }

    pairs
}

fn fallback_relation(
    state: &SyncState,
    loaded_by_local: &HashMap<LocalEntityId, EntityRelation>,
) -> Option<EntityRelation> {
    match state {
        SyncState::DoNothing { relation } | SyncState::Discard { relation } => relation.clone(),
        SyncState::CreateInA { .. } | SyncState::CreateInB { .. } => None,
        SyncState::DeleteInA { relation, .. }
        | SyncState::DeleteInB { relation, .. }
        | SyncState::RestoreInA { relation, .. }
        | SyncState::RestoreInB { relation, .. }
        | SyncState::UpdateAToB { relation, .. }
        | SyncState::UpdateBToA { relation, .. }
        | SyncState::UpdateFromNewerToOlder { relation, .. } => {
            // Keep only relations that were actually persisted; synthesized
            // ones (relation-less conflicts, coalesced moves) must not be
            // recorded as if they had synced.
            loaded_by_local.get(&relation.local_id).cloned()
        }
    }
}

fn delete_target(state: &SyncState) -> Option<LocalEntityId> {
    match state {
        SyncState::DeleteInA { relation, .. } | SyncState::DeleteInB { relation, .. } => {
            Some(relation.local_id.clone())
        }
        _ => None,
    }
}

fn failed_delete_id(state: &SyncState, result: &Outcome) -> Option<LocalEntityId> {
    match result {
        Outcome::Failed(_) => delete_target(state),
        _ => None,
    }
}
