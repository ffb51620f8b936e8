// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

//! Repositories to interact with error groups, the rows depending on them,
//! and their events

use async_trait::async_trait;
use purge_data_model::{
    Clock, EntityStatus, Event, Group, GroupAssignee, GroupDependents, GroupHash, GroupMeta,
    GroupRedirect, GroupResolution, Project, Release,
};
use rand_core::RngCore;
use ulid::Ulid;

use crate::repository_impl;

/// A [`GroupRepository`] helps interacting with [`Group`]s and the rows
/// depending on them
#[async_trait]
pub trait GroupRepository: Send + Sync {
    /// The error type returned by the repository
    type Error;

    /// Lookup a [`Group`] by its ID
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn lookup(&mut self, id: Ulid) -> Result<Option<Group>, Self::Error>;

    /// Create a new [`Group`] in a project
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn add(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        project: &Project,
        status: EntityStatus,
    ) -> Result<Group, Self::Error>;

    /// List the groups of a project
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn list_for_project(&mut self, project_id: Ulid) -> Result<Vec<Group>, Self::Error>;

    /// Attach a fingerprint hash to a group
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn add_hash(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        group: &Group,
        hash: String,
    ) -> Result<GroupHash, Self::Error>;

    /// Record that `previous_group_id` was merged into a group
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn add_redirect(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        group: &Group,
        previous_group_id: Ulid,
    ) -> Result<GroupRedirect, Self::Error>;

    /// Assign a group to a user
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn add_assignee(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        group: &Group,
        user_id: Ulid,
    ) -> Result<GroupAssignee, Self::Error>;

    /// Attach a metadata key to a group
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn add_meta(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        group: &Group,
        key: String,
        value: String,
    ) -> Result<GroupMeta, Self::Error>;

    /// Mark a group as resolved in a release
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn add_resolution(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        group: &Group,
        release: &Release,
    ) -> Result<GroupResolution, Self::Error>;

    /// Count the rows depending on a group
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn dependents(&mut self, group_id: Ulid) -> Result<GroupDependents, Self::Error>;

    /// Delete the hashes of a group
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn delete_hashes(&mut self, group_id: Ulid) -> Result<usize, Self::Error>;

    /// Delete the redirects pointing to a group
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn delete_redirects(&mut self, group_id: Ulid) -> Result<usize, Self::Error>;

    /// Delete the assignees of a group
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn delete_assignees(&mut self, group_id: Ulid) -> Result<usize, Self::Error>;

    /// Delete the metadata of a group
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn delete_metas(&mut self, group_id: Ulid) -> Result<usize, Self::Error>;

    /// Delete the resolutions of a group
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn delete_resolutions(&mut self, group_id: Ulid) -> Result<usize, Self::Error>;
}

repository_impl!(GroupRepository:
    async fn lookup(&mut self, id: Ulid) -> Result<Option<Group>, Self::Error>;

    async fn add(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        project: &Project,
        status: EntityStatus,
    ) -> Result<Group, Self::Error>;

    async fn list_for_project(&mut self, project_id: Ulid) -> Result<Vec<Group>, Self::Error>;

    async fn add_hash(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        group: &Group,
        hash: String,
    ) -> Result<GroupHash, Self::Error>;

    async fn add_redirect(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        group: &Group,
        previous_group_id: Ulid,
    ) -> Result<GroupRedirect, Self::Error>;

    async fn add_assignee(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        group: &Group,
        user_id: Ulid,
    ) -> Result<GroupAssignee, Self::Error>;

    async fn add_meta(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        group: &Group,
        key: String,
        value: String,
    ) -> Result<GroupMeta, Self::Error>;

    async fn add_resolution(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        group: &Group,
        release: &Release,
    ) -> Result<GroupResolution, Self::Error>;

    async fn dependents(&mut self, group_id: Ulid) -> Result<GroupDependents, Self::Error>;

    async fn delete_hashes(&mut self, group_id: Ulid) -> Result<usize, Self::Error>;

    async fn delete_redirects(&mut self, group_id: Ulid) -> Result<usize, Self::Error>;

    async fn delete_assignees(&mut self, group_id: Ulid) -> Result<usize, Self::Error>;

    async fn delete_metas(&mut self, group_id: Ulid) -> Result<usize, Self::Error>;

    async fn delete_resolutions(&mut self, group_id: Ulid) -> Result<usize, Self::Error>;
);

/// An [`EventRepository`] helps interacting with the [`Event`] rows. The
/// event payloads live in the node store, not here.
#[async_trait]
pub trait EventRepository: Send + Sync {
    /// The error type returned by the repository
    type Error;

    /// Record a new [`Event`] in a group
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn add(
        &mut self,
        clock: &dyn Clock,
        group: &Group,
        event_id: String,
    ) -> Result<Event, Self::Error>;

    /// List the events of a group
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn list_for_group(&mut self, group_id: Ulid) -> Result<Vec<Event>, Self::Error>;

    /// Delete the events of a group, returning how many were deleted
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn delete_for_group(&mut self, group_id: Ulid) -> Result<usize, Self::Error>;
}

repository_impl!(EventRepository:
    async fn add(
        &mut self,
        clock: &dyn Clock,
        group: &Group,
        event_id: String,
    ) -> Result<Event, Self::Error>;

    async fn list_for_group(&mut self, group_id: Ulid) -> Result<Vec<Event>, Self::Error>;

    async fn delete_for_group(&mut self, group_id: Ulid) -> Result<usize, Self::Error>;
);
