// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! In-memory fake repositories for integration tests.
//!
//! Both fakes expose out-of-band mutators (`seed`, `edit`, `rewrite`,
//! `remove`) so tests can simulate changes that happen between runs, plus
//! failure injection on the remote side.

use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use jiff::Timestamp;

use pimsync_core::{
    Appointment, EntityHandle, LocalEntityId, LocalRepository, LocalSnapshot, LocalVersion,
    RemoteRepository, RemoteSnapshot, RemoteVersion, ResourceName, SyncError,
};

use crate::common::ts;

/// Fake A-side store keyed by generated entry ids.
///
/// Versions are a monotonically ticking per-store clock, so every mutation
/// yields a strictly newer `LocalVersion`. Outstanding handle acquisitions
/// are counted to verify the engine releases everything it fetches.
pub struct FakeLocalRepository {
    state: Mutex<LocalState>,
    outstanding: AtomicUsize,
}

#[derive(Default)]
struct LocalState {
    items: BTreeMap<String, LocalItem>,
    next_id: u32,
    clock: i64,
}

struct LocalItem {
    id: LocalEntityId,
    version: LocalVersion,
    item: Appointment,
}

impl FakeLocalRepository {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LocalState::default()),
            outstanding: AtomicUsize::new(0),
        }
    }

    /// Inserts an entity out of band, returning its assigned id.
    pub fn seed(&self, item: Appointment, correlator: Option<&str>) -> LocalEntityId {
        let mut state = self.state.lock().unwrap();
        state.insert(item, correlator.map(String::from))
    }

    /// Replaces an entity's content out of band, bumping its version.
    pub fn edit(&self, id: &LocalEntityId, item: Appointment) {
        let mut state = self.state.lock().unwrap();
        let version = state.tick();
        let entry = state
            .items
            .get_mut(id.entry_id())
            .expect("edited entity should exist");
        entry.version = version;
        entry.item = item;
    }

    /// Removes an entity out of band.
    pub fn remove(&self, id: &LocalEntityId) {
        self.state.lock().unwrap().items.remove(id.entry_id());
    }

    pub fn len(&self) -> usize {
        self.state.lock().unwrap().items.len()
    }

    pub fn contains(&self, id: &LocalEntityId) -> bool {
        self.state.lock().unwrap().items.contains_key(id.entry_id())
    }

    pub fn item_of(&self, id: &LocalEntityId) -> Option<Appointment> {
        let state = self.state.lock().unwrap();
        state.items.get(id.entry_id()).map(|e| e.item.clone())
    }

    /// Subject lines of all stored entities, sorted.
    pub fn subjects(&self) -> Vec<String> {
        let state = self.state.lock().unwrap();
        let mut subjects: Vec<_> = state.items.values().map(|e| e.item.subject.clone()).collect();
        subjects.sort();
        subjects
    }

    /// Handles acquired through `get` and not yet passed to `cleanup`.
    pub fn outstanding_handles(&self) -> usize {
        self.outstanding.load(Ordering::Relaxed)
    }
}

impl LocalState {
    fn insert(&mut self, item: Appointment, correlator: Option<String>) -> LocalEntityId {
        self.next_id += 1;
        let id = LocalEntityId::new(format!("local-{}", self.next_id), correlator);
        let version = self.tick();
        self.items.insert(
            id.entry_id().to_string(),
            LocalItem {
                id: id.clone(),
                version,
                item,
            },
        );
        id
    }

    fn tick(&mut self) -> LocalVersion {
        self.clock += 1;
        LocalVersion::new(ts(self.clock))
    }
}

#[async_trait]
impl LocalRepository for FakeLocalRepository {
    async fn list(&self) -> Result<Vec<LocalSnapshot>, SyncError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .items
            .values()
            .map(|e| LocalSnapshot {
                id: e.id.clone(),
                version: e.version,
            })
            .collect())
    }

    async fn get(
        &self,
        ids: &[LocalEntityId],
    ) -> Result<Vec<(LocalEntityId, Option<EntityHandle>)>, SyncError> {
        let state = self.state.lock().unwrap();
        let mut fetched = Vec::with_capacity(ids.len());
        for id in ids {
            let handle = state
                .items
                .get(id.entry_id())
                .map(|e| EntityHandle::new(e.id.clone(), e.item.clone()));
            if handle.is_some() {
                self.outstanding.fetch_add(1, Ordering::Relaxed);
            }
            fetched.push((id.clone(), handle));
        }
        Ok(fetched)
    }

    fn cleanup(&self, handles: Vec<EntityHandle>) {
        self.outstanding.fetch_sub(handles.len(), Ordering::Relaxed);
    }

    async fn create(&self, item: Appointment) -> Result<LocalSnapshot, SyncError> {
        let mut state = self.state.lock().unwrap();
        let id = state.insert(item, None);
        let version = state
            .items
            .get(id.entry_id())
            .map(|e| e.version)
            .expect("just inserted");
        Ok(LocalSnapshot { id, version })
    }

    async fn update(
        &self,
        id: &LocalEntityId,
        item: Appointment,
    ) -> Result<LocalSnapshot, SyncError> {
        let mut state = self.state.lock().unwrap();
        let version = state.tick();
        let entry = state
            .items
            .get_mut(id.entry_id())
            .ok_or_else(|| SyncError::Repository(format!("No such local entity: {id}")))?;
        entry.version = version;
        entry.item = item;
        Ok(LocalSnapshot {
            id: entry.id.clone(),
            version,
        })
    }

    async fn delete(&self, id: &LocalEntityId) -> Result<(), SyncError> {
        self.state.lock().unwrap().items.remove(id.entry_id());
        Ok(())
    }
}

/// Fake B-side store of versioned opaque blobs.
pub struct FakeRemoteRepository {
    state: Mutex<RemoteState>,
}

#[derive(Default)]
struct RemoteState {
    items: BTreeMap<String, RemoteItem>,
    next_name: u32,
    next_version: u32,
    fail_updates_on: HashSet<String>,
    fail_deletes: bool,
}

struct RemoteItem {
    version: RemoteVersion,
    modified: Option<Timestamp>,
    correlator: Option<String>,
    content: String,
}

impl FakeRemoteRepository {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RemoteState::default()),
        }
    }

    /// Inserts an entity out of band.
    pub fn put(
        &self,
        content: &str,
        correlator: Option<&str>,
        modified: Option<Timestamp>,
    ) -> (ResourceName, RemoteVersion) {
        let mut state = self.state.lock().unwrap();
        state.next_name += 1;
        let name = ResourceName::from(format!("/cal/item-{}.ics", state.next_name));
        let version = state.next_version();
        state.items.insert(
            name.as_str().to_string(),
            RemoteItem {
                version: version.clone(),
                modified,
                correlator: correlator.map(String::from),
                content: content.to_string(),
            },
        );
        (name, version)
    }

    /// Replaces an entity's content out of band, bumping its version.
    pub fn rewrite(&self, name: &ResourceName, content: &str, modified: Option<Timestamp>) {
        let mut state = self.state.lock().unwrap();
        let version = state.next_version();
        let entry = state
            .items
            .get_mut(name.as_str())
            .expect("rewritten entity should exist");
        entry.version = version;
        entry.modified = modified;
        entry.content = content.to_string();
    }

    /// Removes an entity out of band.
    pub fn remove(&self, name: &ResourceName) {
        self.state.lock().unwrap().items.remove(name.as_str());
    }

    pub fn len(&self) -> usize {
        self.state.lock().unwrap().items.len()
    }

    pub fn names(&self) -> Vec<ResourceName> {
        let state = self.state.lock().unwrap();
        state.items.keys().map(|k| ResourceName::from(k.as_str())).collect()
    }

    pub fn content_of(&self, name: &ResourceName) -> Option<String> {
        let state = self.state.lock().unwrap();
        state.items.get(name.as_str()).map(|e| e.content.clone())
    }

    /// Makes every `update` of the given entity fail until cleared.
    pub fn fail_updates_on(&self, name: &ResourceName) {
        let mut state = self.state.lock().unwrap();
        state.fail_updates_on.insert(name.as_str().to_string());
    }

    pub fn clear_update_failures(&self) {
        self.state.lock().unwrap().fail_updates_on.clear();
    }

    /// Makes every `try_delete` fail until disabled.
    pub fn fail_deletes(&self, fail: bool) {
        self.state.lock().unwrap().fail_deletes = fail;
    }
}

impl RemoteState {
    fn next_version(&mut self) -> RemoteVersion {
        self.next_version += 1;
        RemoteVersion::from(format!("v{}", self.next_version))
    }
}

#[async_trait]
impl RemoteRepository for FakeRemoteRepository {
    async fn list(&self) -> Result<Vec<RemoteSnapshot>, SyncError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .items
            .iter()
            .map(|(name, e)| RemoteSnapshot {
                id: ResourceName::from(name.as_str()),
                version: e.version.clone(),
                modified: e.modified,
                correlator: e.correlator.clone(),
            })
            .collect())
    }

    async fn get(
        &self,
        names: &[ResourceName],
    ) -> Result<Vec<(ResourceName, Option<String>)>, SyncError> {
        let state = self.state.lock().unwrap();
        Ok(names
            .iter()
            .map(|name| {
                let content = state.items.get(name.as_str()).map(|e| e.content.clone());
                (name.clone(), content)
            })
            .collect())
    }

    async fn create(&self, content: &str) -> Result<(ResourceName, RemoteVersion), SyncError> {
        Ok(self.put(content, None, None))
    }

    async fn update(
        &self,
        name: &ResourceName,
        known_version: &RemoteVersion,
        content: &str,
    ) -> Result<RemoteVersion, SyncError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_updates_on.contains(name.as_str()) {
            return Err(SyncError::Repository(format!("Injected failure for {name}")));
        }
        let version = state.next_version();
        let entry = state
            .items
            .get_mut(name.as_str())
            .ok_or_else(|| SyncError::Repository(format!("No such remote entity: {name}")))?;
        if entry.version != *known_version {
            return Err(SyncError::Repository(format!(
                "Version mismatch for {name}: expected {known_version}, found {}",
                entry.version
            )));
        }
        entry.version = version.clone();
        entry.content = content.to_string();
        Ok(version)
    }

    async fn try_delete(
        &self,
        name: &ResourceName,
        known_version: &RemoteVersion,
    ) -> Result<bool, SyncError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_deletes {
            return Err(SyncError::Repository(format!("Injected failure for {name}")));
        }
        match state.items.get(name.as_str()) {
            // Already gone; nothing left to delete.
            None => Ok(true),
            Some(entry) if entry.version != *known_version => Ok(false),
            Some(_) => {
                state.items.remove(name.as_str());
                Ok(true)
            }
        }
    }
}
