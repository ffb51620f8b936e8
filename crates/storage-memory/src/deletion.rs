// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use purge_data_model::{Clock, EntityRef, ScheduledDeletion};
use purge_storage::deletion::ScheduledDeletionRepository;
use rand_core::RngCore;
use ulid::Ulid;

use crate::{MemoryError, tables::TablesMut};

const TABLE: &str = "scheduled_deletions";

#[async_trait]
impl ScheduledDeletionRepository for TablesMut<'_> {
    type Error = MemoryError;

    async fn lookup(&mut self, id: Ulid) -> Result<Option<ScheduledDeletion>, Self::Error> {
        Ok(self.tables.scheduled_deletions.get(&id).cloned())
    }

    async fn find_by_entity(
        &mut self,
        entity: EntityRef,
    ) -> Result<Option<ScheduledDeletion>, Self::Error> {
        Ok(self
            .tables
            .scheduled_deletions
            .values()
            .find(|job| job.entity() == entity)
            .cloned())
    }

    async fn add(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        entity: EntityRef,
        actor_id: Option<Ulid>,
        date_scheduled: DateTime<Utc>,
    ) -> Result<Option<ScheduledDeletion>, Self::Error> {
        self.faults.check(TABLE)?;

        if self
            .tables
            .scheduled_deletions
            .values()
            .any(|job| job.entity() == entity)
        {
            return Ok(None);
        }

        let date_added = clock.now();
        let id = Ulid::from_datetime_with_source(date_added.into(), rng);
        let job = ScheduledDeletion {
            id,
            entity_kind: entity.kind,
            entity_id: entity.id,
            actor_id,
            date_scheduled,
            date_added,
            in_progress: false,
        };

        self.tables.scheduled_deletions.insert(id, job.clone());
        Ok(Some(job))
    }

    async fn claim_due(
        &mut self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<ScheduledDeletion>, Self::Error> {
        self.faults.check(TABLE)?;

        let mut due: Vec<&mut ScheduledDeletion> = self
            .tables
            .scheduled_deletions
            .values_mut()
            .filter(|job| !job.in_progress && job.date_scheduled <= now)
            .collect();
        due.sort_by_key(|job| (job.date_scheduled, job.id));

        let claimed = due
            .into_iter()
            .take(limit)
            .map(|job| {
                job.in_progress = true;
                job.clone()
            })
            .collect();

        Ok(claimed)
    }

    async fn release_stale(
        &mut self,
        now: DateTime<Utc>,
        threshold: Duration,
    ) -> Result<usize, Self::Error> {
        self.faults.check(TABLE)?;

        let cutoff = now - threshold;
        let mut released = 0;
        for job in self.tables.scheduled_deletions.values_mut() {
            if job.in_progress && job.date_scheduled <= cutoff {
                job.in_progress = false;
                released += 1;
            }
        }

        Ok(released)
    }

    async fn delete(&mut self, id: Ulid) -> Result<bool, Self::Error> {
        self.faults.check(TABLE)?;
        Ok(self.tables.scheduled_deletions.remove(&id).is_some())
    }
}
