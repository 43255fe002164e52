// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Post-classification rewrite of correlated delete/create pairs.
//!
//! When a local entity changes its store identity but keeps its correlator
//! (Outlook does this when an appointment is moved between folders), one run
//! observes the old id as deleted and the new id as created. Left alone,
//! that round-trips through the server as a delete plus a re-create and
//! loses server-side metadata. This pass merges such pairs into a single
//! remote update against the previously-known resource.

use std::collections::{HashMap, HashSet};

use crate::relation::EntityRelation;
use crate::state::SyncState;

/// Rewrites `DeleteInB`/`CreateInB` pairs sharing a correlator into one
/// `UpdateAToB`, in place. All other states pass through untouched.
///
/// Several creates or deletes sharing one correlator is anomalous input;
/// the last-seen create and last-seen delete merge and the remainder stay
/// as plain delete/create.
pub fn coalesce_moves(states: &mut Vec<SyncState>) {
    let mut creates_by_correlator: HashMap<&str, usize> = HashMap::new();
    let mut deletes_by_correlator: HashMap<&str, usize> = HashMap::new();

    for (idx, state) in states.iter().enumerate() {
        match state {
            SyncState::CreateInB { local_id, .. } => {
                if let Some(correlator) = local_id.correlator() {
                    creates_by_correlator.insert(correlator, idx);
                }
            }
            SyncState::DeleteInB { relation, .. } => {
                if let Some(correlator) = relation.local_id.correlator() {
                    deletes_by_correlator.insert(correlator, idx);
                }
            }
            _ => {}
        }
    }

    let mut merged = Vec::new();
    let mut consumed = HashSet::new();

    for (correlator, &delete_idx) in &deletes_by_correlator {
        let Some(&create_idx) = creates_by_correlator.get(correlator) else {
            continue;
        };

        let (
            SyncState::CreateInB {
                local_id,
                local_version,
            },
            SyncState::DeleteInB { relation, .. },
        ) = (&states[create_idx], &states[delete_idx])
        else {
            unreachable!("indexed states are creates and deletes");
        };

        tracing::info!(
            remote_id = %relation.remote_id,
            local_id = %local_id,
            "converting remote deletion and creation into an update"
        );

        merged.push(SyncState::UpdateAToB {
            relation: EntityRelation::new(
                local_id.clone(),
                *local_version,
                relation.remote_id.clone(),
                relation.remote_version.clone(),
            ),
            local_version: *local_version,
            remote_version: relation.remote_version.clone(),
        });
        consumed.insert(create_idx);
        consumed.insert(delete_idx);
    }

    if consumed.is_empty() {
        return;
    }

    let mut idx = 0;
    states.retain(|_| {
        let keep = !consumed.contains(&idx);
        idx += 1;
        keep
    });
    states.extend(merged);
}
