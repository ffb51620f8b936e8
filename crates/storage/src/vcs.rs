// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

//! Repositories to interact with source code repositories and their commits

use async_trait::async_trait;
use purge_data_model::{
    Clock, CodeRepository, Commit, CommitAuthor, EntityStatus, Organization,
};
use rand_core::RngCore;
use ulid::Ulid;

use crate::repository_impl;

/// A [`CodeRepositoryRepository`] helps interacting with [`CodeRepository`]
/// saved in the storage backend
#[async_trait]
pub trait CodeRepositoryRepository: Send + Sync {
    /// The error type returned by the repository
    type Error;

    /// Lookup a [`CodeRepository`] by its ID
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn lookup(&mut self, id: Ulid) -> Result<Option<CodeRepository>, Self::Error>;

    /// Create a new [`CodeRepository`] in an organization
    ///
    /// # Parameters
    ///
    /// * `rng`: The random number generator to use
    /// * `clock`: The clock used to generate timestamps
    /// * `organization`: The organization owning the repository
    /// * `name`: The name of the repository
    /// * `provider`: The name of the version-control provider integration
    /// * `status`: The initial status of the repository
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn add(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        organization: &Organization,
        name: String,
        provider: Option<String>,
        status: EntityStatus,
    ) -> Result<CodeRepository, Self::Error>;

    /// List the repositories of an organization
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn list_for_organization(
        &mut self,
        organization_id: Ulid,
    ) -> Result<Vec<CodeRepository>, Self::Error>;
}

repository_impl!(CodeRepositoryRepository:
    async fn lookup(&mut self, id: Ulid) -> Result<Option<CodeRepository>, Self::Error>;

    async fn add(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        organization: &Organization,
        name: String,
        provider: Option<String>,
        status: EntityStatus,
    ) -> Result<CodeRepository, Self::Error>;

    async fn list_for_organization(
        &mut self,
        organization_id: Ulid,
    ) -> Result<Vec<CodeRepository>, Self::Error>;
);

/// A [`CommitRepository`] helps interacting with [`Commit`]s and
/// [`CommitAuthor`]s
#[async_trait]
pub trait CommitRepository: Send + Sync {
    /// The error type returned by the repository
    type Error;

    /// Lookup a [`Commit`] by its ID
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn lookup(&mut self, id: Ulid) -> Result<Option<Commit>, Self::Error>;

    /// Create a new [`Commit`] in a repository
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn add(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        repository: &CodeRepository,
        author: Option<&CommitAuthor>,
        key: String,
    ) -> Result<Commit, Self::Error>;

    /// Lookup a [`CommitAuthor`] by its ID
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn lookup_author(&mut self, id: Ulid) -> Result<Option<CommitAuthor>, Self::Error>;

    /// Create a new [`CommitAuthor`] in an organization
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn add_author(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        organization: &Organization,
        name: String,
        email: String,
    ) -> Result<CommitAuthor, Self::Error>;

    /// Delete the commits of a repository, returning how many were deleted.
    /// Commits of other repositories sharing the same key are left alone.
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn delete_for_repository(&mut self, repository_id: Ulid) -> Result<usize, Self::Error>;

    /// Delete the commits of an organization, returning how many were deleted
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn delete_for_organization(
        &mut self,
        organization_id: Ulid,
    ) -> Result<usize, Self::Error>;

    /// Delete the commit authors of an organization, returning how many were
    /// deleted
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn delete_authors_for_organization(
        &mut self,
        organization_id: Ulid,
    ) -> Result<usize, Self::Error>;
}

repository_impl!(CommitRepository:
    async fn lookup(&mut self, id: Ulid) -> Result<Option<Commit>, Self::Error>;

    async fn add(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        repository: &CodeRepository,
        author: Option<&CommitAuthor>,
        key: String,
    ) -> Result<Commit, Self::Error>;

    async fn lookup_author(&mut self, id: Ulid) -> Result<Option<CommitAuthor>, Self::Error>;

    async fn add_author(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        organization: &Organization,
        name: String,
        email: String,
    ) -> Result<CommitAuthor, Self::Error>;

    async fn delete_for_repository(&mut self, repository_id: Ulid) -> Result<usize, Self::Error>;

    async fn delete_for_organization(
        &mut self,
        organization_id: Ulid,
    ) -> Result<usize, Self::Error>;

    async fn delete_authors_for_organization(
        &mut self,
        organization_id: Ulid,
    ) -> Result<usize, Self::Error>;
);
