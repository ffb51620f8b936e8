// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use ulid::Ulid;

use crate::{EntityKind, EntityStatus, entity::impl_deletable};

/// An aggregate of similar error events
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Group {
    pub id: Ulid,
    pub project_id: Ulid,
    pub status: EntityStatus,
    pub created_at: DateTime<Utc>,
}

impl_deletable!(Group, EntityKind::Group);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupHash {
    pub id: Ulid,
    pub project_id: Ulid,
    pub group_id: Ulid,
    pub hash: String,
}

/// Points from a group which was merged away to the group that replaced it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupRedirect {
    pub id: Ulid,
    pub group_id: Ulid,
    pub previous_group_id: Ulid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupAssignee {
    pub id: Ulid,
    pub group_id: Ulid,
    pub project_id: Ulid,
    pub user_id: Ulid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupMeta {
    pub id: Ulid,
    pub group_id: Ulid,
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupResolution {
    pub id: Ulid,
    pub group_id: Ulid,
    pub release_id: Ulid,
}

/// The number of rows depending on a group, per class
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GroupDependents {
    pub hashes: usize,
    pub redirects: usize,
    pub assignees: usize,
    pub metas: usize,
    pub resolutions: usize,
}

impl GroupDependents {
    /// Returns `true` if nothing references the group anymore
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// An event row. The payload itself lives in the node store, under
/// [`Event::node_id`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Event {
    pub project_id: Ulid,
    pub event_id: String,
    pub group_id: Ulid,
    pub created_at: DateTime<Utc>,
}

impl Event {
    /// Derive the node store key of an event payload
    #[must_use]
    pub fn generate_node_id(project_id: Ulid, event_id: &str) -> String {
        let digest = Sha256::digest(format!("{project_id}:{event_id}").as_bytes());
        hex::encode(digest)
    }

    /// The node store key of this event payload
    #[must_use]
    pub fn node_id(&self) -> String {
        Self::generate_node_id(self.project_id, &self.event_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id_is_deterministic() {
        let project_id = Ulid::from_parts(1, 42);
        let a = Event::generate_node_id(project_id, &"a".repeat(32));
        let b = Event::generate_node_id(project_id, &"b".repeat(32));

        assert_eq!(a, Event::generate_node_id(project_id, &"a".repeat(32)));
        assert_ne!(a, b);
        assert_ne!(
            a,
            Event::generate_node_id(Ulid::from_parts(2, 42), &"a".repeat(32))
        );
        assert_eq!(a.len(), 64);
    }
}
