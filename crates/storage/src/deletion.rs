// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

//! Repository to interact with [`ScheduledDeletion`] jobs

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use purge_data_model::{Clock, EntityRef, ScheduledDeletion};
use rand_core::RngCore;
use ulid::Ulid;

use crate::repository_impl;

/// A [`ScheduledDeletionRepository`] helps interacting with
/// [`ScheduledDeletion`] jobs saved in the storage backend
#[async_trait]
pub trait ScheduledDeletionRepository: Send + Sync {
    /// The error type returned by the repository
    type Error;

    /// Lookup a [`ScheduledDeletion`] by its ID
    ///
    /// Returns `None` if no [`ScheduledDeletion`] was found
    ///
    /// # Parameters
    ///
    /// * `id`: The ID of the [`ScheduledDeletion`] to lookup
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn lookup(&mut self, id: Ulid) -> Result<Option<ScheduledDeletion>, Self::Error>;

    /// Find the [`ScheduledDeletion`] targeting an entity
    ///
    /// Returns `None` if no job exists for this entity
    ///
    /// # Parameters
    ///
    /// * `entity`: The entity targeted by the job
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn find_by_entity(
        &mut self,
        entity: EntityRef,
    ) -> Result<Option<ScheduledDeletion>, Self::Error>;

    /// Create a new [`ScheduledDeletion`], not in progress
    ///
    /// Returns `None` without writing anything if a job already exists for
    /// the entity. The check and the insertion are a single atomic operation.
    ///
    /// # Parameters
    ///
    /// * `rng`: The random number generator to use
    /// * `clock`: The clock used to generate timestamps
    /// * `entity`: The entity to delete
    /// * `actor_id`: Who requested the deletion, if known
    /// * `date_scheduled`: When the deletion becomes due
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn add(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        entity: EntityRef,
        actor_id: Option<Ulid>,
        date_scheduled: DateTime<Utc>,
    ) -> Result<Option<ScheduledDeletion>, Self::Error>;

    /// Claim the jobs which are due and not in progress, marking them in
    /// progress.
    ///
    /// This is atomic per row: two concurrent calls never return the same
    /// job. There is no ordering guarantee between the returned jobs.
    ///
    /// # Parameters
    ///
    /// * `now`: The current time
    /// * `limit`: The maximum number of jobs to claim
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn claim_due(
        &mut self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<ScheduledDeletion>, Self::Error>;

    /// Clear the in-progress flag of the jobs scheduled at or before
    /// `now - threshold`.
    ///
    /// Returns the number of jobs released
    ///
    /// # Parameters
    ///
    /// * `now`: The current time
    /// * `threshold`: How long a job may stay in progress
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn release_stale(
        &mut self,
        now: DateTime<Utc>,
        threshold: Duration,
    ) -> Result<usize, Self::Error>;

    /// Delete a job. Deleting a job which does not exist is not an error.
    ///
    /// Returns `true` if a job was deleted
    ///
    /// # Parameters
    ///
    /// * `id`: The ID of the job
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn delete(&mut self, id: Ulid) -> Result<bool, Self::Error>;
}

repository_impl!(ScheduledDeletionRepository:
    async fn lookup(&mut self, id: Ulid) -> Result<Option<ScheduledDeletion>, Self::Error>;

    async fn find_by_entity(
        &mut self,
        entity: EntityRef,
    ) -> Result<Option<ScheduledDeletion>, Self::Error>;

    async fn add(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        entity: EntityRef,
        actor_id: Option<Ulid>,
        date_scheduled: DateTime<Utc>,
    ) -> Result<Option<ScheduledDeletion>, Self::Error>;

    async fn claim_due(
        &mut self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<ScheduledDeletion>, Self::Error>;

    async fn release_stale(
        &mut self,
        now: DateTime<Utc>,
        threshold: Duration,
    ) -> Result<usize, Self::Error>;

    async fn delete(&mut self, id: Ulid) -> Result<bool, Self::Error>;
);
