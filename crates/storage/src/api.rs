// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

//! Repositories to interact with API applications, and the tokens and grants
//! issued for them

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use purge_data_model::{ApiApplication, ApiGrant, ApiToken, Clock, EntityStatus};
use rand_core::RngCore;
use ulid::Ulid;

use crate::repository_impl;

/// An [`ApiApplicationRepository`] helps interacting with
/// [`ApiApplication`]s
#[async_trait]
pub trait ApiApplicationRepository: Send + Sync {
    /// The error type returned by the repository
    type Error;

    /// Lookup an [`ApiApplication`] by its ID
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn lookup(&mut self, id: Ulid) -> Result<Option<ApiApplication>, Self::Error>;

    /// Create a new [`ApiApplication`]
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn add(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        owner_id: Ulid,
        name: String,
        status: EntityStatus,
    ) -> Result<ApiApplication, Self::Error>;
}

repository_impl!(ApiApplicationRepository:
    async fn lookup(&mut self, id: Ulid) -> Result<Option<ApiApplication>, Self::Error>;

    async fn add(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        owner_id: Ulid,
        name: String,
        status: EntityStatus,
    ) -> Result<ApiApplication, Self::Error>;
);

/// An [`ApiTokenRepository`] helps interacting with [`ApiToken`]s
#[async_trait]
pub trait ApiTokenRepository: Send + Sync {
    /// The error type returned by the repository
    type Error;

    /// Lookup an [`ApiToken`] by its ID
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn lookup(&mut self, id: Ulid) -> Result<Option<ApiToken>, Self::Error>;

    /// Issue a new [`ApiToken`] for an application
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn add(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        application: &ApiApplication,
        user_id: Ulid,
    ) -> Result<ApiToken, Self::Error>;

    /// Delete the tokens of an application
    ///
    /// Returns how many tokens were deleted
    ///
    /// # Parameters
    ///
    /// * `application_id`: The application owning the tokens
    /// * `cutoff`: If set, only tokens created at or before this time are
    ///   deleted
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn delete_for_application(
        &mut self,
        application_id: Ulid,
        cutoff: Option<DateTime<Utc>>,
    ) -> Result<usize, Self::Error>;
}

repository_impl!(ApiTokenRepository:
    async fn lookup(&mut self, id: Ulid) -> Result<Option<ApiToken>, Self::Error>;

    async fn add(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        application: &ApiApplication,
        user_id: Ulid,
    ) -> Result<ApiToken, Self::Error>;

    async fn delete_for_application(
        &mut self,
        application_id: Ulid,
        cutoff: Option<DateTime<Utc>>,
    ) -> Result<usize, Self::Error>;
);

/// An [`ApiGrantRepository`] helps interacting with [`ApiGrant`]s
#[async_trait]
pub trait ApiGrantRepository: Send + Sync {
    /// The error type returned by the repository
    type Error;

    /// Lookup an [`ApiGrant`] by its ID
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn lookup(&mut self, id: Ulid) -> Result<Option<ApiGrant>, Self::Error>;

    /// Record a new [`ApiGrant`] for an application
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn add(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        application: &ApiApplication,
        user_id: Ulid,
        redirect_uri: String,
    ) -> Result<ApiGrant, Self::Error>;

    /// Delete the grants of an application, returning how many were deleted
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn delete_for_application(&mut self, application_id: Ulid)
    -> Result<usize, Self::Error>;
}

repository_impl!(ApiGrantRepository:
    async fn lookup(&mut self, id: Ulid) -> Result<Option<ApiGrant>, Self::Error>;

    async fn add(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        application: &ApiApplication,
        user_id: Ulid,
        redirect_uri: String,
    ) -> Result<ApiGrant, Self::Error>;

    async fn delete_for_application(&mut self, application_id: Ulid)
        -> Result<usize, Self::Error>;
);
