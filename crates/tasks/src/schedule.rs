// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use chrono::Duration;
use purge_data_model::{EntityRef, ScheduledDeletion};
use purge_storage::{RepositoryAccess, RepositoryError};
use thiserror::Error;
use ulid::Ulid;

use crate::State;

/// An error returned by [`schedule`]
#[derive(Debug, Error)]
pub enum ScheduleError {
    /// A deletion is already scheduled for this entity
    #[error("a deletion is already scheduled for {entity}")]
    Conflict {
        /// The entity targeted by the existing job
        entity: EntityRef,

        /// The existing job, unless it was deleted in the meantime
        existing: Option<Ulid>,
    },

    /// The delay puts the deletion out of the range of representable dates
    #[error("a delay of {delay} is out of range")]
    DelayOutOfRange {
        /// The requested delay
        delay: Duration,
    },

    /// The storage backend failed
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Schedule the deletion of an entity, `delay` from now.
///
/// This does not change the status of the entity: the deletion only happens
/// if the entity is pending deletion by the time the job runs.
///
/// # Errors
///
/// Returns [`ScheduleError::Conflict`] if a deletion is already scheduled for
/// the entity, [`ScheduleError::DelayOutOfRange`] if `now + delay` overflows,
/// or [`ScheduleError::Repository`] if the storage backend fails.
#[tracing::instrument(
    name = "job.schedule_deletion",
    skip_all,
    fields(
        %entity,
        actor.id = actor_id.map(tracing::field::display),
        scheduled_deletion.id,
    ),
    err,
)]
pub async fn schedule(
    state: &State,
    entity: EntityRef,
    actor_id: Option<Ulid>,
    delay: Duration,
) -> Result<ScheduledDeletion, ScheduleError> {
    let clock = state.clock();
    let date_scheduled = clock
        .now()
        .checked_add_signed(delay)
        .ok_or(ScheduleError::DelayOutOfRange { delay })?;

    let mut rng = state.rng();
    let mut repo = state.repository().await?;

    let job = repo
        .scheduled_deletion()
        .add(&mut rng, clock, entity, actor_id, date_scheduled)
        .await?;

    let Some(job) = job else {
        let existing = repo.scheduled_deletion().find_by_entity(entity).await?;
        repo.cancel().await?;
        return Err(ScheduleError::Conflict {
            entity,
            existing: existing.map(|job| job.id),
        });
    };

    repo.save().await?;

    tracing::Span::current().record("scheduled_deletion.id", tracing::field::display(job.id));
    tracing::info!(date_scheduled = %job.date_scheduled, "Scheduled deletion");

    Ok(job)
}
