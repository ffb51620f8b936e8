// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

//! Repositories to interact with releases and environments.
//!
//! Both are scoped to an organization and shared between its projects.

use async_trait::async_trait;
use purge_data_model::{
    Clock, Commit, Environment, Organization, Project, Release, ReleaseCommit, ReleaseEnvironment,
};
use rand_core::RngCore;
use ulid::Ulid;

use crate::repository_impl;

/// A [`ReleaseRepository`] helps interacting with [`Release`]s, their
/// commits and the projects they are linked to
#[async_trait]
pub trait ReleaseRepository: Send + Sync {
    /// The error type returned by the repository
    type Error;

    /// Lookup a [`Release`] by its ID
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn lookup(&mut self, id: Ulid) -> Result<Option<Release>, Self::Error>;

    /// Create a new [`Release`] in an organization
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn add(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        organization: &Organization,
        version: String,
    ) -> Result<Release, Self::Error>;

    /// Link a release to a project
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn add_project(&mut self, release: &Release, project: &Project)
    -> Result<(), Self::Error>;

    /// List the IDs of the projects linked to a release
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn project_ids(&mut self, release_id: Ulid) -> Result<Vec<Ulid>, Self::Error>;

    /// Remove the release links of a project, returning how many were removed
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn remove_project_links_for_project(
        &mut self,
        project_id: Ulid,
    ) -> Result<usize, Self::Error>;

    /// Remove the project links of every release of an organization
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn remove_project_links_for_organization(
        &mut self,
        organization_id: Ulid,
    ) -> Result<usize, Self::Error>;

    /// Lookup a [`ReleaseCommit`] by its ID
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn lookup_commit(&mut self, id: Ulid) -> Result<Option<ReleaseCommit>, Self::Error>;

    /// Link a commit to a release
    ///
    /// # Parameters
    ///
    /// * `rng`: The random number generator to use
    /// * `clock`: The clock used to generate the ID
    /// * `release`: The release
    /// * `commit`: The commit
    /// * `project`: The project the link was recorded for, if any
    /// * `order`: The position of the commit in the release
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn add_commit(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        release: &Release,
        commit: &Commit,
        project: Option<&Project>,
        order: i32,
    ) -> Result<ReleaseCommit, Self::Error>;

    /// Delete the release links of the commits of a repository
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn delete_commits_for_repository(
        &mut self,
        repository_id: Ulid,
    ) -> Result<usize, Self::Error>;

    /// Delete the release-commit links of an organization
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn delete_commits_for_organization(
        &mut self,
        organization_id: Ulid,
    ) -> Result<usize, Self::Error>;

    /// Delete the releases of an organization, returning how many were deleted
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn delete_for_organization(
        &mut self,
        organization_id: Ulid,
    ) -> Result<usize, Self::Error>;
}

repository_impl!(ReleaseRepository:
    async fn lookup(&mut self, id: Ulid) -> Result<Option<Release>, Self::Error>;

    async fn add(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        organization: &Organization,
        version: String,
    ) -> Result<Release, Self::Error>;

    async fn add_project(&mut self, release: &Release, project: &Project)
        -> Result<(), Self::Error>;

    async fn project_ids(&mut self, release_id: Ulid) -> Result<Vec<Ulid>, Self::Error>;

    async fn remove_project_links_for_project(
        &mut self,
        project_id: Ulid,
    ) -> Result<usize, Self::Error>;

    async fn remove_project_links_for_organization(
        &mut self,
        organization_id: Ulid,
    ) -> Result<usize, Self::Error>;

    async fn lookup_commit(&mut self, id: Ulid) -> Result<Option<ReleaseCommit>, Self::Error>;

    async fn add_commit(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        release: &Release,
        commit: &Commit,
        project: Option<&Project>,
        order: i32,
    ) -> Result<ReleaseCommit, Self::Error>;

    async fn delete_commits_for_repository(
        &mut self,
        repository_id: Ulid,
    ) -> Result<usize, Self::Error>;

    async fn delete_commits_for_organization(
        &mut self,
        organization_id: Ulid,
    ) -> Result<usize, Self::Error>;

    async fn delete_for_organization(
        &mut self,
        organization_id: Ulid,
    ) -> Result<usize, Self::Error>;
);

/// An [`EnvironmentRepository`] helps interacting with [`Environment`]s, the
/// projects they are linked to and the releases seen in them
#[async_trait]
pub trait EnvironmentRepository: Send + Sync {
    /// The error type returned by the repository
    type Error;

    /// Lookup an [`Environment`] by its ID
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn lookup(&mut self, id: Ulid) -> Result<Option<Environment>, Self::Error>;

    /// Create a new [`Environment`] in an organization
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
    ) -> Result<Environment, Self::Error>;

    /// Link an environment to a project
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn add_project(
        &mut self,
        environment: &Environment,
        project: &Project,
    ) -> Result<(), Self::Error>;

    /// List the IDs of the projects linked to an environment
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn project_ids(&mut self, environment_id: Ulid) -> Result<Vec<Ulid>, Self::Error>;

    /// Remove the environment links of a project. The environments themselves
    /// are kept.
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn remove_project_links_for_project(
        &mut self,
        project_id: Ulid,
    ) -> Result<usize, Self::Error>;

    /// Remove the project links of every environment of an organization
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn remove_project_links_for_organization(
        &mut self,
        organization_id: Ulid,
    ) -> Result<usize, Self::Error>;

    /// Lookup a [`ReleaseEnvironment`] by its ID
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn lookup_release(&mut self, id: Ulid)
    -> Result<Option<ReleaseEnvironment>, Self::Error>;

    /// Record that a release was seen in an environment
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn add_release(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        release: &Release,
        environment: &Environment,
        project: Option<&Project>,
    ) -> Result<ReleaseEnvironment, Self::Error>;

    /// Delete the release-environment rows of an organization
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn delete_releases_for_organization(
        &mut self,
        organization_id: Ulid,
    ) -> Result<usize, Self::Error>;

    /// Delete the environments of an organization
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn delete_for_organization(
        &mut self,
        organization_id: Ulid,
    ) -> Result<usize, Self::Error>;
}

repository_impl!(EnvironmentRepository:
    async fn lookup(&mut self, id: Ulid) -> Result<Option<Environment>, Self::Error>;

    async fn add(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        organization: &Organization,
        name: String,
    ) -> Result<Environment, Self::Error>;

    async fn add_project(
        &mut self,
        environment: &Environment,
        project: &Project,
    ) -> Result<(), Self::Error>;

    async fn project_ids(&mut self, environment_id: Ulid) -> Result<Vec<Ulid>, Self::Error>;

    async fn remove_project_links_for_project(
        &mut self,
        project_id: Ulid,
    ) -> Result<usize, Self::Error>;

    async fn remove_project_links_for_organization(
        &mut self,
        organization_id: Ulid,
    ) -> Result<usize, Self::Error>;

    async fn lookup_release(&mut self, id: Ulid)
        -> Result<Option<ReleaseEnvironment>, Self::Error>;

    async fn add_release(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        release: &Release,
        environment: &Environment,
        project: Option<&Project>,
    ) -> Result<ReleaseEnvironment, Self::Error>;

    async fn delete_releases_for_organization(
        &mut self,
        organization_id: Ulid,
    ) -> Result<usize, Self::Error>;

    async fn delete_for_organization(
        &mut self,
        organization_id: Ulid,
    ) -> Result<usize, Self::Error>;
);
