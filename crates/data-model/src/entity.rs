// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;
use ulid::Ulid;

use crate::EntityStatus;

/// The kinds of entities the deletion engine knows how to delete
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Organization,
    Team,
    Project,
    Repository,
    Group,
    ApiApplication,
}

impl EntityKind {
    /// All the known entity kinds
    pub const ALL: [Self; 6] = [
        Self::Organization,
        Self::Team,
        Self::Project,
        Self::Repository,
        Self::Group,
        Self::ApiApplication,
    ];

    /// The tag stored alongside scheduled deletions
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Organization => "organization",
            Self::Team => "team",
            Self::Project => "project",
            Self::Repository => "repository",
            Self::Group => "group",
            Self::ApiApplication => "api_application",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown [`EntityKind`]
#[derive(Debug, Error)]
#[error("invalid entity kind {0:?}")]
pub struct InvalidEntityKind(String);

impl FromStr for EntityKind {
    type Err = InvalidEntityKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| InvalidEntityKind(s.to_owned()))
    }
}

/// A pointer to a deletable entity, by kind and ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct EntityRef {
    pub kind: EntityKind,
    pub id: Ulid,
}

impl EntityRef {
    #[must_use]
    pub const fn new(kind: EntityKind, id: Ulid) -> Self {
        Self { kind, id }
    }
}

impl std::fmt::Display for EntityRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// A record which can be scheduled for deletion
pub trait Deletable {
    /// The kind of entity this is
    const KIND: EntityKind;

    /// The ID of the entity
    fn id(&self) -> Ulid;

    /// The current status of the entity
    fn status(&self) -> EntityStatus;

    /// A reference to this entity
    fn entity_ref(&self) -> EntityRef {
        EntityRef::new(Self::KIND, self.id())
    }
}

/// Implements [`Deletable`] for a record with `id` and `status` fields
macro_rules! impl_deletable {
    ($ty:ty, $kind:expr) => {
        impl $crate::entity::Deletable for $ty {
            const KIND: $crate::entity::EntityKind = $kind;

            fn id(&self) -> ::ulid::Ulid {
                self.id
            }

            fn status(&self) -> $crate::EntityStatus {
                self.status
            }
        }
    };
}

pub(crate) use impl_deletable;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_roundtrip() {
        for kind in EntityKind::ALL {
            assert_eq!(kind.as_str().parse::<EntityKind>().unwrap(), kind);
        }
        assert!("user".parse::<EntityKind>().is_err());
    }
}
