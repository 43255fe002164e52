// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;

use jiff::Timestamp;

/// Identity of an entity in the local (A-side) store.
///
/// The `entry_id` is the store-assigned identifier and is the only part that
/// takes part in equality and hashing. The optional `correlator` is a stable
/// cross-system identifier (e.g. a global appointment id) that survives
/// local id churn; it is used to match entities across sides, never to
/// identify them locally.
#[derive(Debug, Clone)]
pub struct LocalEntityId {
    entry_id: String,
    correlator: Option<String>,
}

impl LocalEntityId {
    /// Creates a new id from a store entry id and an optional correlator.
    #[must_use]
    pub fn new(entry_id: impl Into<String>, correlator: Option<String>) -> Self {
        // An empty correlator carries no matching information.
        let correlator = correlator.filter(|c| !c.is_empty());
        Self {
            entry_id: entry_id.into(),
            correlator,
        }
    }

    /// The store-assigned entry id.
    #[must_use]
    pub fn entry_id(&self) -> &str {
        &self.entry_id
    }

    /// The stable cross-side correlator, if the store reported one.
    #[must_use]
    pub fn correlator(&self) -> Option<&str> {
        self.correlator.as_deref()
    }
}

impl PartialEq for LocalEntityId {
    fn eq(&self, other: &Self) -> bool {
        self.entry_id == other.entry_id
    }
}

impl Eq for LocalEntityId {}

impl Hash for LocalEntityId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.entry_id.hash(state);
    }
}

impl fmt::Display for LocalEntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.entry_id.fmt(f)
    }
}

/// Change marker of a local entity.
///
/// Local versions are last-modification timestamps and therefore ordered,
/// unlike remote versions which are opaque.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct LocalVersion(Timestamp);

impl LocalVersion {
    /// Creates a new version marker from a timestamp.
    #[must_use]
    pub const fn new(at: Timestamp) -> Self {
        Self(at)
    }

    /// The underlying timestamp.
    #[must_use]
    pub const fn timestamp(&self) -> Timestamp {
        self.0
    }
}

impl From<Timestamp> for LocalVersion {
    fn from(at: Timestamp) -> Self {
        Self(at)
    }
}

impl fmt::Display for LocalVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Remote resource name (path).
///
/// A `ResourceName` identifies an entity on the remote (B-side) server, such
/// as `/calendars/user/event1.ics`. The core treats it as opaque.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceName(String);

impl ResourceName {
    /// Creates a new `ResourceName` from a string.
    #[must_use]
    pub const fn new(name: String) -> Self {
        Self(name)
    }

    /// Returns the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Deref for ResourceName {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<str> for ResourceName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for ResourceName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl From<&str> for ResourceName {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

/// Opaque remote version (etag).
///
/// Remote versions support equality only; two differing values mean the
/// entity changed, nothing more.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteVersion(String);

impl RemoteVersion {
    /// Creates a new `RemoteVersion` from a string.
    #[must_use]
    pub const fn new(version: String) -> Self {
        Self(version)
    }

    /// Returns the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Deref for RemoteVersion {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<str> for RemoteVersion {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RemoteVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for RemoteVersion {
    fn from(version: String) -> Self {
        Self(version)
    }
}

impl From<&str> for RemoteVersion {
    fn from(version: &str) -> Self {
        Self(version.to_string())
    }
}

/// Content of a local entity, as far as the engine needs it.
///
/// The tuple `(start, end, subject)` is the duplicate-detection key; the
/// remaining fields are carried along for transfer but never compared by
/// the engine itself.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Appointment {
    /// Start of the appointment.
    pub start: Timestamp,

    /// End of the appointment.
    pub end: Timestamp,

    /// Subject line.
    pub subject: String,

    /// Free-form body text.
    #[serde(default)]
    pub body: Option<String>,

    /// Location text.
    #[serde(default)]
    pub location: Option<String>,
}

impl Appointment {
    /// The duplicate-detection key of this appointment.
    #[must_use]
    pub fn duplication_key(&self) -> (Timestamp, Timestamp, &str) {
        (self.start, self.end, &self.subject)
    }
}

/// A local entity as seen during enumeration: id plus current version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalSnapshot {
    /// Identity of the entity.
    pub id: LocalEntityId,

    /// Current change marker.
    pub version: LocalVersion,
}

/// A remote entity as seen during enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteSnapshot {
    /// Resource name of the entity.
    pub id: ResourceName,

    /// Current etag.
    pub version: RemoteVersion,

    /// Last-modification time if the server reports one. Used only to pick
    /// a direction for newer-wins conflict resolution.
    pub modified: Option<Timestamp>,

    /// The entity's own stable identifier (e.g. its UID), used to pair
    /// relation-less entities with their local counterparts.
    pub correlator: Option<String>,
}
