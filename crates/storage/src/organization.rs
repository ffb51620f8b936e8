// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

//! Repositories to interact with organizations, their teams and their
//! projects

use async_trait::async_trait;
use purge_data_model::{Clock, EntityStatus, Organization, Project, Team};
use rand_core::RngCore;
use ulid::Ulid;

use crate::repository_impl;

/// An [`OrganizationRepository`] helps interacting with [`Organization`]s
/// saved in the storage backend
#[async_trait]
pub trait OrganizationRepository: Send + Sync {
    /// The error type returned by the repository
    type Error;

    /// Lookup an [`Organization`] by its ID
    ///
    /// Returns `None` if no [`Organization`] was found
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn lookup(&mut self, id: Ulid) -> Result<Option<Organization>, Self::Error>;

    /// Create a new [`Organization`]
    ///
    /// # Parameters
    ///
    /// * `rng`: The random number generator to use
    /// * `clock`: The clock used to generate timestamps
    /// * `name`: The name of the organization
    /// * `status`: The initial status of the organization
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn add(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        name: String,
        status: EntityStatus,
    ) -> Result<Organization, Self::Error>;
}

repository_impl!(OrganizationRepository:
    async fn lookup(&mut self, id: Ulid) -> Result<Option<Organization>, Self::Error>;

    async fn add(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        name: String,
        status: EntityStatus,
    ) -> Result<Organization, Self::Error>;
);

/// A [`TeamRepository`] helps interacting with [`Team`]s and their links to
/// projects
#[async_trait]
pub trait TeamRepository: Send + Sync {
    /// The error type returned by the repository
    type Error;

    /// Lookup a [`Team`] by its ID
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn lookup(&mut self, id: Ulid) -> Result<Option<Team>, Self::Error>;

    /// Create a new [`Team`] in an organization
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
        status: EntityStatus,
    ) -> Result<Team, Self::Error>;

    /// List the teams of an organization
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn list_for_organization(
        &mut self,
        organization_id: Ulid,
    ) -> Result<Vec<Team>, Self::Error>;

    /// Give a team access to a project
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn add_project(&mut self, team: &Team, project: &Project) -> Result<(), Self::Error>;

    /// List the IDs of the projects a team has access to
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn project_ids(&mut self, team_id: Ulid) -> Result<Vec<Ulid>, Self::Error>;

    /// Remove all the project links of a team, returning how many were removed
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn remove_project_links_for_team(&mut self, team_id: Ulid)
    -> Result<usize, Self::Error>;

    /// Remove all the team links of a project, returning how many were removed
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn remove_project_links_for_project(
        &mut self,
        project_id: Ulid,
    ) -> Result<usize, Self::Error>;
}

repository_impl!(TeamRepository:
    async fn lookup(&mut self, id: Ulid) -> Result<Option<Team>, Self::Error>;

    async fn add(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        organization: &Organization,
        name: String,
        status: EntityStatus,
    ) -> Result<Team, Self::Error>;

    async fn list_for_organization(
        &mut self,
        organization_id: Ulid,
    ) -> Result<Vec<Team>, Self::Error>;

    async fn add_project(&mut self, team: &Team, project: &Project) -> Result<(), Self::Error>;

    async fn project_ids(&mut self, team_id: Ulid) -> Result<Vec<Ulid>, Self::Error>;

    async fn remove_project_links_for_team(&mut self, team_id: Ulid)
        -> Result<usize, Self::Error>;

    async fn remove_project_links_for_project(
        &mut self,
        project_id: Ulid,
    ) -> Result<usize, Self::Error>;
);

/// A [`ProjectRepository`] helps interacting with [`Project`]s
#[async_trait]
pub trait ProjectRepository: Send + Sync {
    /// The error type returned by the repository
    type Error;

    /// Lookup a [`Project`] by its ID
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn lookup(&mut self, id: Ulid) -> Result<Option<Project>, Self::Error>;

    /// Create a new [`Project`] in an organization
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
        status: EntityStatus,
    ) -> Result<Project, Self::Error>;

    /// List the projects of an organization
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn list_for_organization(
        &mut self,
        organization_id: Ulid,
    ) -> Result<Vec<Project>, Self::Error>;
}

repository_impl!(ProjectRepository:
    async fn lookup(&mut self, id: Ulid) -> Result<Option<Project>, Self::Error>;

    async fn add(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        organization: &Organization,
        name: String,
        status: EntityStatus,
    ) -> Result<Project, Self::Error>;

    async fn list_for_organization(
        &mut self,
        organization_id: Ulid,
    ) -> Result<Vec<Project>, Self::Error>;
);
