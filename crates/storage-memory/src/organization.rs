// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use async_trait::async_trait;
use purge_data_model::{Clock, EntityStatus, Organization, Project, Team};
use purge_storage::organization::{OrganizationRepository, ProjectRepository, TeamRepository};
use rand_core::RngCore;
use ulid::Ulid;

use crate::{
    MemoryError,
    tables::{TablesMut, remove_links_where},
};

#[async_trait]
impl OrganizationRepository for TablesMut<'_> {
    type Error = MemoryError;

    async fn lookup(&mut self, id: Ulid) -> Result<Option<Organization>, Self::Error> {
        Ok(self.tables.organizations.get(&id).cloned())
    }

    async fn add(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        name: String,
        status: EntityStatus,
    ) -> Result<Organization, Self::Error> {
        self.faults.check("organizations")?;

        let created_at = clock.now();
        let organization = Organization {
            id: Ulid::from_datetime_with_source(created_at.into(), rng),
            name,
            status,
            created_at,
        };

        self.tables
            .organizations
            .insert(organization.id, organization.clone());
        Ok(organization)
    }
}

#[async_trait]
impl TeamRepository for TablesMut<'_> {
    type Error = MemoryError;

    async fn lookup(&mut self, id: Ulid) -> Result<Option<Team>, Self::Error> {
        Ok(self.tables.teams.get(&id).cloned())
    }

    async fn add(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        organization: &Organization,
        name: String,
        status: EntityStatus,
    ) -> Result<Team, Self::Error> {
        self.faults.check("teams")?;

        let created_at = clock.now();
        let team = Team {
            id: Ulid::from_datetime_with_source(created_at.into(), rng),
            organization_id: organization.id,
            name,
            status,
            created_at,
        };

        self.tables.teams.insert(team.id, team.clone());
        Ok(team)
    }

    async fn list_for_organization(
        &mut self,
        organization_id: Ulid,
    ) -> Result<Vec<Team>, Self::Error> {
        Ok(self
            .tables
            .teams
            .values()
            .filter(|team| team.organization_id == organization_id)
            .cloned()
            .collect())
    }

    async fn add_project(&mut self, team: &Team, project: &Project) -> Result<(), Self::Error> {
        self.faults.check("project_teams")?;
        self.tables.project_teams.insert((team.id, project.id));
        Ok(())
    }

    async fn project_ids(&mut self, team_id: Ulid) -> Result<Vec<Ulid>, Self::Error> {
        Ok(self
            .tables
            .project_teams
            .iter()
            .filter(|(team, _)| *team == team_id)
            .map(|(_, project)| *project)
            .collect())
    }

    async fn remove_project_links_for_team(&mut self, team_id: Ulid) -> Result<usize, Self::Error> {
        self.faults.check("project_teams")?;
        Ok(remove_links_where(
            &mut self.tables.project_teams,
            |(team, _)| *team == team_id,
        ))
    }

    async fn remove_project_links_for_project(
        &mut self,
        project_id: Ulid,
    ) -> Result<usize, Self::Error> {
        self.faults.check("project_teams")?;
        Ok(remove_links_where(
            &mut self.tables.project_teams,
            |(_, project)| *project == project_id,
        ))
    }
}

#[async_trait]
impl ProjectRepository for TablesMut<'_> {
    type Error = MemoryError;

    async fn lookup(&mut self, id: Ulid) -> Result<Option<Project>, Self::Error> {
        Ok(self.tables.projects.get(&id).cloned())
    }

    async fn add(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        organization: &Organization,
        name: String,
        status: EntityStatus,
    ) -> Result<Project, Self::Error> {
        self.faults.check("projects")?;

        let created_at = clock.now();
        let project = Project {
            id: Ulid::from_datetime_with_source(created_at.into(), rng),
            organization_id: organization.id,
            name,
            status,
            created_at,
        };

        self.tables.projects.insert(project.id, project.clone());
        Ok(project)
    }

    async fn list_for_organization(
        &mut self,
        organization_id: Ulid,
    ) -> Result<Vec<Project>, Self::Error> {
        Ok(self
            .tables
            .projects
            .values()
            .filter(|project| project.organization_id == organization_id)
            .cloned()
            .collect())
    }
}
