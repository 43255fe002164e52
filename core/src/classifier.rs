// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Synchronization state classification.
//!
//! For every (local, remote, relation) triple, [`classify`] assigns exactly
//! one [`SyncState`]. Classification is a pure function of its inputs;
//! absence of an entity is a first-class input, never a fault.

use crate::relation::EntityRelation;
use crate::state::SyncState;
use crate::types::{LocalSnapshot, RemoteSnapshot};

/// How conflicts (both sides changed, or both sides new) are resolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictPolicy {
    /// The side modified more recently wins.
    #[default]
    Automatic,

    /// The local entity always wins.
    LocalWins,

    /// The remote entity always wins.
    RemoteWins,

    /// Leave both sides untouched; the user resolves it out of band.
    Manual,
}

/// One (local, remote, relation) triple together with the pair-scoped flags
/// the caller supplies.
#[derive(Debug, Clone)]
pub struct PairInput {
    /// The local entity, if present.
    pub local: Option<LocalSnapshot>,

    /// The remote entity, if present.
    pub remote: Option<RemoteSnapshot>,

    /// The last-persisted relation, if present.
    pub relation: Option<EntityRelation>,

    /// Whether the delete candidate is recoverable from a trash mechanism.
    pub restoreable: bool,

    /// Carried over from a previous run's failure; never recomputed.
    pub no_retry: bool,
}

/// Assigns the synchronization state for one entity pair.
#[must_use]
pub fn classify(input: PairInput, policy: ConflictPolicy) -> SyncState {
    let PairInput {
        local,
        remote,
        relation,
        restoreable,
        no_retry,
    } = input;

    match (relation, local, remote) {
        // First contact: both sides exist but nothing was ever recorded.
        (None, Some(local), Some(remote)) => conflict_without_relation(local, remote, policy),

        (None, Some(local), None) => SyncState::CreateInB {
            local_id: local.id,
            local_version: local.version,
        },

        (None, None, Some(remote)) => SyncState::CreateInA {
            remote_id: remote.id,
            remote_version: remote.version,
        },

        (None, None, None) => SyncState::DoNothing { relation: None },

        // Deleted on both sides; the record just needs to go.
        (Some(_), None, None) => SyncState::DoNothing { relation: None },

        (Some(relation), None, Some(remote)) => {
            if remote.version == relation.remote_version {
                if restoreable {
                    SyncState::RestoreInA {
                        remote_version: remote.version,
                        relation,
                    }
                } else {
                    SyncState::DeleteInB { relation, no_retry }
                }
            } else {
                // The remote side moved on after the local delete; treat it
                // as new content to re-download rather than deleting it.
                SyncState::CreateInA {
                    remote_id: remote.id,
                    remote_version: remote.version,
                }
            }
        }

        (Some(relation), Some(local), None) => {
            if local.version == relation.local_version {
                if restoreable {
                    SyncState::RestoreInB {
                        local_version: local.version,
                        relation,
                    }
                } else {
                    SyncState::DeleteInA { relation, no_retry }
                }
            } else {
                SyncState::CreateInB {
                    local_id: local.id,
                    local_version: local.version,
                }
            }
        }

        (Some(relation), Some(local), Some(remote)) => {
            let local_changed = local.version != relation.local_version;
            let remote_changed = remote.version != relation.remote_version;

            match (local_changed, remote_changed) {
                (false, false) => SyncState::DoNothing {
                    relation: Some(relation),
                },

                (true, false) => SyncState::UpdateAToB {
                    relation,
                    local_version: local.version,
                    remote_version: remote.version,
                },

                (false, true) => SyncState::UpdateBToA {
                    relation,
                    remote_version: remote.version,
                    local_version: local.version,
                },

                (true, true) => match policy {
                    ConflictPolicy::Automatic => SyncState::UpdateFromNewerToOlder {
                        relation,
                        local_version: local.version,
                        remote_version: remote.version,
                        remote_modified: remote.modified,
                    },
                    ConflictPolicy::LocalWins => SyncState::UpdateAToB {
                        relation,
                        local_version: local.version,
                        remote_version: remote.version,
                    },
                    ConflictPolicy::RemoteWins => SyncState::UpdateBToA {
                        relation,
                        remote_version: remote.version,
                        local_version: local.version,
                    },
                    ConflictPolicy::Manual => SyncState::Discard {
                        relation: Some(relation),
                    },
                },
            }
        }
    }
}

fn conflict_without_relation(
    local: LocalSnapshot,
    remote: RemoteSnapshot,
    policy: ConflictPolicy,
) -> SyncState {
    let local_version = local.version;
    let remote_version = remote.version.clone();
    let relation = EntityRelation::new(local.id, local.version, remote.id, remote.version);

    let remote_wins = match policy {
        // A remote side that reports no modification time loses.
        ConflictPolicy::Automatic => remote
            .modified
            .is_some_and(|m| m > local_version.timestamp()),
        ConflictPolicy::LocalWins => false,
        ConflictPolicy::RemoteWins => true,
        ConflictPolicy::Manual => return SyncState::Discard { relation: None },
    };

    if remote_wins {
        SyncState::UpdateBToA {
            relation,
            remote_version,
            local_version,
        }
    } else {
        SyncState::UpdateAToB {
            relation,
            local_version,
            remote_version,
        }
    }
}
