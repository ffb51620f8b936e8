// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

//! Repository to interact with any deletable entity, regardless of its kind

use async_trait::async_trait;
use purge_data_model::{EntityRef, EntityStatus};

use crate::repository_impl;

/// An [`EntityRepository`] gives access to the status column and the root row
/// of every kind of deletable entity.
///
/// It is what the scheduler and the generic executor use, as they only know
/// about an [`EntityRef`] and not about the concrete record.
#[async_trait]
pub trait EntityRepository: Send + Sync {
    /// The error type returned by the repository
    type Error;

    /// Lookup the status of an entity
    ///
    /// Returns `None` if the entity does not exist
    ///
    /// # Parameters
    ///
    /// * `entity`: The entity to lookup
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn lookup_status(&mut self, entity: EntityRef)
    -> Result<Option<EntityStatus>, Self::Error>;

    /// Change the status of an entity
    ///
    /// Returns `false` if the entity does not exist
    ///
    /// # Parameters
    ///
    /// * `entity`: The entity to update
    /// * `status`: The new status
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn set_status(
        &mut self,
        entity: EntityRef,
        status: EntityStatus,
    ) -> Result<bool, Self::Error>;

    /// Delete the row of an entity. This does not touch any dependent rows.
    ///
    /// Returns `false` if the entity did not exist
    ///
    /// # Parameters
    ///
    /// * `entity`: The entity to delete
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn delete(&mut self, entity: EntityRef) -> Result<bool, Self::Error>;
}

repository_impl!(EntityRepository:
    async fn lookup_status(&mut self, entity: EntityRef)
        -> Result<Option<EntityStatus>, Self::Error>;

    async fn set_status(
        &mut self,
        entity: EntityRef,
        status: EntityStatus,
    ) -> Result<bool, Self::Error>;

    async fn delete(&mut self, entity: EntityRef) -> Result<bool, Self::Error>;
);
