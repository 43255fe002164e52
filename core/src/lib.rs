// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Two-way synchronization engine for calendar entities between a local
//! store and a remote server.
//!
//! The engine tracks entity pairs through persisted [`EntityRelation`]
//! records, classifies every pair into a [`SyncState`], coalesces
//! correlated delete/create pairs into moves, collapses local duplicates
//! and executes the resulting actions through repository traits the caller
//! implements.

#![warn(
    trivial_casts,
    trivial_numeric_casts,
    missing_copy_implementations,
    missing_debug_implementations,
    missing_docs,
    unsafe_code,
    unstable_features,
    unused_import_braces,
    unused_qualifications,
    clippy::dbg_macro,
    clippy::indexing_slicing,
    clippy::pedantic
)]
// Allow certain clippy lints that are too restrictive for this crate
#![allow(
    clippy::missing_errors_doc,
    clippy::module_name_repetitions,
    clippy::similar_names,
    clippy::single_match_else,
    clippy::match_bool
)]

mod classifier;
mod config;
mod duplicates;
mod error;
mod interceptor;
mod relation;
mod report;
mod repository;
mod state;
mod store;
mod synchronizer;
mod types;

pub use crate::classifier::{ConflictPolicy, PairInput, classify};
pub use crate::config::SyncProfile;
pub use crate::duplicates::DuplicateResolver;
pub use crate::error::SyncError;
pub use crate::interceptor::coalesce_moves;
pub use crate::relation::{EntityRelation, InMemoryRelationStore, RelationDataAccess};
pub use crate::report::{EntityOutcome, Outcome, SyncReport};
pub use crate::repository::{
    EntityHandle, EntityMapper, JsonEntityMapper, LocalRepository, RemoteRepository,
};
pub use crate::state::SyncState;
pub use crate::store::SqliteRelationStore;
pub use crate::synchronizer::{CancelFlag, Synchronizer};
pub use crate::types::{
    Appointment, LocalEntityId, LocalSnapshot, LocalVersion, RemoteSnapshot, RemoteVersion,
    ResourceName,
};
