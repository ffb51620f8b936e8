// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

//! Repository to interact with issue rules and metric alert rules

use async_trait::async_trait;
use purge_data_model::{AlertRule, Clock, Organization, Project, Rule, Team};
use rand_core::RngCore;
use ulid::Ulid;

use crate::repository_impl;

/// A [`RuleRepository`] helps interacting with [`Rule`]s and [`AlertRule`]s
#[async_trait]
pub trait RuleRepository: Send + Sync {
    /// The error type returned by the repository
    type Error;

    /// Lookup a [`Rule`] by its ID
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn lookup(&mut self, id: Ulid) -> Result<Option<Rule>, Self::Error>;

    /// Create a new [`Rule`] on a project, optionally owned by a team
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn add(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        project: &Project,
        label: String,
        owner: Option<&Team>,
    ) -> Result<Rule, Self::Error>;

    /// Lookup an [`AlertRule`] by its ID
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn lookup_alert_rule(&mut self, id: Ulid) -> Result<Option<AlertRule>, Self::Error>;

    /// Create a new [`AlertRule`] in an organization, optionally owned by a
    /// team
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn add_alert_rule(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        organization: &Organization,
        name: String,
        owner: Option<&Team>,
    ) -> Result<AlertRule, Self::Error>;

    /// Clear the owner of every rule and alert rule owned by a team. The rules
    /// themselves are kept.
    ///
    /// Returns how many rows were detached
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn detach_team(&mut self, team_id: Ulid) -> Result<usize, Self::Error>;

    /// Delete the rules of a project
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn delete_for_project(&mut self, project_id: Ulid) -> Result<usize, Self::Error>;

    /// Delete the alert rules of an organization
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if the underlying repository fails
    async fn delete_alert_rules_for_organization(
        &mut self,
        organization_id: Ulid,
    ) -> Result<usize, Self::Error>;
}

repository_impl!(RuleRepository:
    async fn lookup(&mut self, id: Ulid) -> Result<Option<Rule>, Self::Error>;

    async fn add(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        project: &Project,
        label: String,
        owner: Option<&Team>,
    ) -> Result<Rule, Self::Error>;

    async fn lookup_alert_rule(&mut self, id: Ulid) -> Result<Option<AlertRule>, Self::Error>;

    async fn add_alert_rule(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        organization: &Organization,
        name: String,
        owner: Option<&Team>,
    ) -> Result<AlertRule, Self::Error>;

    async fn detach_team(&mut self, team_id: Ulid) -> Result<usize, Self::Error>;

    async fn delete_for_project(&mut self, project_id: Ulid) -> Result<usize, Self::Error>;

    async fn delete_alert_rules_for_organization(
        &mut self,
        organization_id: Ulid,
    ) -> Result<usize, Self::Error>;
);
