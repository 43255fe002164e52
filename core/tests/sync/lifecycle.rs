// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Basic create, update and delete propagation across runs.

use pimsync_core::{CancelFlag, JsonEntityMapper, EntityMapper, RelationDataAccess};

use crate::common::{appointment, appointment_at, blob, harness};

#[tokio::test]
async fn initial_run_uploads_new_local_entities() {
    let mut h = harness();
    h.local.seed(appointment("standup"), Some("G1"));
    h.local.seed(appointment_at("retro", 90_000), Some("G2"));

    let report = h.run().await;

    assert_eq!(report.succeeded(), 2);
    assert!(report.is_clean());
    assert_eq!(h.remote.len(), 2);
    assert_eq!(h.relations.load().await.unwrap().len(), 2);
    assert_eq!(h.local.outstanding_handles(), 0);
}

#[tokio::test]
async fn second_run_is_a_no_op() {
    let mut h = harness();
    h.local.seed(appointment("standup"), Some("G1"));
    h.run().await;

    let report = h.run().await;

    assert_eq!(report.succeeded(), 0);
    assert_eq!(report.skipped(), 1);
    assert_eq!(report.outcomes[0].action, "do-nothing");
    assert_eq!(h.remote.len(), 1);
    assert_eq!(h.relations.load().await.unwrap().len(), 1);
}

#[tokio::test]
async fn new_remote_entities_are_downloaded() {
    let mut h = harness();
    h.remote.put(&blob(&appointment("standup")), Some("G1"), None);

    let report = h.run().await;

    assert_eq!(report.succeeded(), 1);
    assert_eq!(h.local.len(), 1);
    assert_eq!(h.local.subjects(), vec!["standup"]);
    assert_eq!(h.relations.load().await.unwrap().len(), 1);
}

#[tokio::test]
async fn local_edit_propagates_to_remote() {
    let mut h = harness();
    let id = h.local.seed(appointment("standup"), Some("G1"));
    h.run().await;

    h.local.edit(&id, appointment_at("standup moved", 7200));
    let report = h.run().await;

    assert_eq!(report.succeeded(), 1);
    assert_eq!(report.outcomes[0].action, "update-a-to-b");

    let name = h.remote.names().remove(0);
    let content = h.remote.content_of(&name).unwrap();
    let uploaded = JsonEntityMapper.to_local(&content).unwrap();
    assert_eq!(uploaded.subject, "standup moved");
}

#[tokio::test]
async fn remote_edit_propagates_to_local() {
    let mut h = harness();
    let id = h.local.seed(appointment("standup"), Some("G1"));
    h.run().await;

    let name = h.remote.names().remove(0);
    h.remote
        .rewrite(&name, &blob(&appointment("standup renamed")), None);
    let report = h.run().await;

    assert_eq!(report.succeeded(), 1);
    assert_eq!(report.outcomes[0].action, "update-b-to-a");
    assert_eq!(h.local.item_of(&id).unwrap().subject, "standup renamed");
}

#[tokio::test]
async fn remote_delete_propagates_to_local() {
    let mut h = harness();
    let id = h.local.seed(appointment("standup"), Some("G1"));
    h.run().await;

    let name = h.remote.names().remove(0);
    h.remote.remove(&name);
    let report = h.run().await;

    assert_eq!(report.succeeded(), 1);
    assert_eq!(report.outcomes[0].action, "delete-in-a");
    assert!(!h.local.contains(&id));
    assert!(h.relations.load().await.unwrap().is_empty());
}

#[tokio::test]
async fn local_delete_propagates_to_remote() {
    let mut h = harness();
    let id = h.local.seed(appointment("standup"), Some("G1"));
    h.run().await;

    h.local.remove(&id);
    let report = h.run().await;

    assert_eq!(report.succeeded(), 1);
    assert_eq!(report.outcomes[0].action, "delete-in-b");
    assert_eq!(h.remote.len(), 0);
    assert!(h.relations.load().await.unwrap().is_empty());
}

#[tokio::test]
async fn deleted_remote_is_restored_when_local_is_restoreable() {
    let mut h = harness();
    let sync = h.sync;
    h.sync = sync.with_restoreable(|_| true);

    h.local.seed(appointment("standup"), Some("G1"));
    h.run().await;

    let name = h.remote.names().remove(0);
    h.remote.remove(&name);
    let report = h.run().await;

    assert_eq!(report.succeeded(), 1);
    assert_eq!(report.outcomes[0].action, "restore-in-b");
    assert_eq!(h.remote.len(), 1);
    assert_eq!(h.local.len(), 1);
    assert_eq!(h.relations.load().await.unwrap().len(), 1);
}

#[tokio::test]
async fn cancelled_run_leaves_everything_untouched() {
    let mut h = harness();
    let id = h.local.seed(appointment("standup"), Some("G1"));
    h.run().await;
    h.local.edit(&id, appointment("standup edited"));

    let cancel = CancelFlag::new();
    cancel.cancel();
    let report = h.sync.synchronize(&cancel).await.unwrap();

    assert!(report.cancelled);
    assert!(report.outcomes.is_empty());
    assert_eq!(h.relations.load().await.unwrap().len(), 1);

    let name = h.remote.names().remove(0);
    let remote = JsonEntityMapper
        .to_local(&h.remote.content_of(&name).unwrap())
        .unwrap();
    assert_eq!(remote.subject, "standup");
}
