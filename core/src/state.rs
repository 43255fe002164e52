// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Per-pair synchronization states.
//!
//! One state is computed for every (local, remote, relation) triple and
//! describes the action the run has to take for that pair. States are built
//! by the classifier, possibly rewritten by the interceptor, then executed
//! once and discarded.

use jiff::Timestamp;

use crate::relation::EntityRelation;
use crate::types::{LocalEntityId, LocalVersion, RemoteVersion, ResourceName};

/// The action required to bring one entity pair in sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncState {
    /// Both sides agree with the stored relation (or are both gone).
    /// `relation` is the record to keep, `None` if it is to be dropped.
    DoNothing {
        /// Relation surviving the run, if any.
        relation: Option<EntityRelation>,
    },

    /// The remote entity is new; create a local counterpart.
    CreateInA {
        /// Resource name of the new remote entity.
        remote_id: ResourceName,
        /// Its current version.
        remote_version: RemoteVersion,
    },

    /// The local entity is new; create a remote counterpart.
    CreateInB {
        /// Identity of the new local entity.
        local_id: LocalEntityId,
        /// Its current version.
        local_version: LocalVersion,
    },

    /// The remote entity vanished and the local one is unchanged; delete it
    /// locally.
    DeleteInA {
        /// The stored relation being retired.
        relation: EntityRelation,
        /// Set when the entity failed in a previous run and must not be
        /// retried this run.
        no_retry: bool,
    },

    /// The local entity vanished and the remote one is unchanged; delete it
    /// remotely.
    DeleteInB {
        /// The stored relation being retired.
        relation: EntityRelation,
        /// Set when the entity failed in a previous run and must not be
        /// retried this run.
        no_retry: bool,
    },

    /// Write the local entity's content over the remote one.
    UpdateAToB {
        /// Known relation data (may be synthesized for relation-less pairs).
        relation: EntityRelation,
        /// Current local version to record after the write.
        local_version: LocalVersion,
        /// Remote version the write is issued against.
        remote_version: RemoteVersion,
    },

    /// Write the remote entity's content over the local one.
    UpdateBToA {
        /// Known relation data (may be synthesized for relation-less pairs).
        relation: EntityRelation,
        /// Current remote version to record after the write.
        remote_version: RemoteVersion,
        /// Current local version the write replaces.
        local_version: LocalVersion,
    },

    /// Both sides changed; the newer side overwrites the older one.
    UpdateFromNewerToOlder {
        /// The stored relation.
        relation: EntityRelation,
        /// Current local version.
        local_version: LocalVersion,
        /// Current remote version.
        remote_version: RemoteVersion,
        /// Remote last-modification time, if the server reported one.
        remote_modified: Option<Timestamp>,
    },

    /// The remote entity is unchanged but the local one is gone and can be
    /// restored; re-create it locally instead of deleting remotely.
    RestoreInA {
        /// The stored relation.
        relation: EntityRelation,
        /// Current remote version to restore from.
        remote_version: RemoteVersion,
    },

    /// The local entity is unchanged but the remote one is gone and can be
    /// restored; re-create it remotely instead of deleting locally.
    RestoreInB {
        /// The stored relation.
        relation: EntityRelation,
        /// Current local version to restore from.
        local_version: LocalVersion,
    },

    /// A conflict the configured policy declines to resolve; leave both
    /// sides untouched.
    Discard {
        /// The stored relation to keep, if any, so the pair stays paired.
        relation: Option<EntityRelation>,
    },
}

impl SyncState {
    /// Short name of the action, for reports and logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::DoNothing { .. } => "do-nothing",
            Self::CreateInA { .. } => "create-in-a",
            Self::CreateInB { .. } => "create-in-b",
            Self::DeleteInA { no_retry: false, .. } => "delete-in-a",
            Self::DeleteInA { no_retry: true, .. } => "delete-in-a-no-retry",
            Self::DeleteInB { no_retry: false, .. } => "delete-in-b",
            Self::DeleteInB { no_retry: true, .. } => "delete-in-b-no-retry",
            Self::UpdateAToB { .. } => "update-a-to-b",
            Self::UpdateBToA { .. } => "update-b-to-a",
            Self::UpdateFromNewerToOlder { .. } => "update-from-newer-to-older",
            Self::RestoreInA { .. } => "restore-in-a",
            Self::RestoreInB { .. } => "restore-in-b",
            Self::Discard { .. } => "discard",
        }
    }

    /// A displayable identity of the entity pair, preferring the local side.
    #[must_use]
    pub fn subject(&self) -> String {
        match self {
            Self::DoNothing { relation: Some(r) } | Self::Discard { relation: Some(r) } => {
                r.local_id.to_string()
            }
            Self::DoNothing { relation: None } | Self::Discard { relation: None } => {
                String::from("-")
            }
            Self::CreateInA { remote_id, .. } => remote_id.to_string(),
            Self::CreateInB { local_id, .. } => local_id.to_string(),
            Self::DeleteInA { relation, .. }
            | Self::DeleteInB { relation, .. }
            | Self::UpdateAToB { relation, .. }
            | Self::UpdateBToA { relation, .. }
            | Self::UpdateFromNewerToOlder { relation, .. }
            | Self::RestoreInA { relation, .. }
            | Self::RestoreInB { relation, .. } => relation.local_id.to_string(),
        }
    }
}
