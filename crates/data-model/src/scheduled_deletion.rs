// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use chrono::{DateTime, Utc};
use serde::Serialize;
use ulid::Ulid;

use crate::{EntityKind, EntityRef};

/// A request to delete an entity at or after a given time.
///
/// There is at most one job per target entity. A job which has been claimed
/// by a scheduler pass has `in_progress` set until it completes or is
/// released by the reaper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduledDeletion {
    pub id: Ulid,
    pub entity_kind: EntityKind,
    pub entity_id: Ulid,

    /// Who requested the deletion, if known
    pub actor_id: Option<Ulid>,

    /// When the deletion becomes due
    pub date_scheduled: DateTime<Utc>,

    /// When the job was created
    pub date_added: DateTime<Utc>,
    pub in_progress: bool,
}

impl ScheduledDeletion {
    /// The entity this job targets
    #[must_use]
    pub const fn entity(&self) -> EntityRef {
        EntityRef::new(self.entity_kind, self.entity_id)
    }

    /// Whether the job is due at the given time
    #[must_use]
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.date_scheduled <= now
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[test]
    fn test_is_due() {
        let now = DateTime::UNIX_EPOCH + Duration::days(365 * 50);
        let job = ScheduledDeletion {
            id: Ulid::nil(),
            entity_kind: EntityKind::Repository,
            entity_id: Ulid::nil(),
            actor_id: None,
            date_scheduled: now,
            date_added: now - Duration::days(30),
            in_progress: false,
        };

        assert!(job.is_due(now));
        assert!(job.is_due(now + Duration::seconds(1)));
        assert!(!job.is_due(now - Duration::seconds(1)));
        assert_eq!(job.entity(), EntityRef::new(EntityKind::Repository, Ulid::nil()));
    }
}
