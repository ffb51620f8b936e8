// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;

/// The lifecycle status shared by every deletable entity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityStatus {
    /// The entity is live and visible
    #[default]
    Active,

    /// Someone asked for the entity to be deleted
    PendingDeletion,

    /// A cascade started deleting the entity
    DeletionInProgress,
}

impl EntityStatus {
    /// Returns `true` if a cascade is allowed to delete an entity in this
    /// status
    #[must_use]
    pub fn is_pending_deletion(self) -> bool {
        matches!(self, Self::PendingDeletion | Self::DeletionInProgress)
    }

    /// The representation of this status in the storage backend
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::PendingDeletion => "pending_deletion",
            Self::DeletionInProgress => "deletion_in_progress",
        }
    }
}

impl std::fmt::Display for EntityStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown [`EntityStatus`]
#[derive(Debug, Error)]
#[error("invalid entity status {0:?}")]
pub struct InvalidEntityStatus(String);

impl FromStr for EntityStatus {
    type Err = InvalidEntityStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "pending_deletion" => Ok(Self::PendingDeletion),
            "deletion_in_progress" => Ok(Self::DeletionInProgress),
            other => Err(InvalidEntityStatus(other.to_owned())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_statuses() {
        assert!(!EntityStatus::Active.is_pending_deletion());
        assert!(EntityStatus::PendingDeletion.is_pending_deletion());
        assert!(EntityStatus::DeletionInProgress.is_pending_deletion());
    }

    #[test]
    fn test_parse_unknown() {
        assert!("visible".parse::<EntityStatus>().is_err());
        assert_eq!(
            "pending_deletion".parse::<EntityStatus>().unwrap(),
            EntityStatus::PendingDeletion
        );
    }
}
