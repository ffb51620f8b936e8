// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

//! PostgreSQL implementations of the organization, team and project
//! repositories

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use purge_data_model::{Clock, EntityStatus, Organization, Project, Team};
use purge_storage::organization::{OrganizationRepository, ProjectRepository, TeamRepository};
use rand_core::RngCore;
use sqlx::PgConnection;
use ulid::Ulid;
use uuid::Uuid;

use crate::{
    DatabaseError, DatabaseInconsistencyError, ExecuteExt, parse_status, tracing::rows_deleted,
};

/// An implementation of [`OrganizationRepository`] for a PostgreSQL
/// connection
pub struct PgOrganizationRepository<'c> {
    conn: &'c mut PgConnection,
}

impl<'c> PgOrganizationRepository<'c> {
    /// Create a new [`PgOrganizationRepository`] from an active PostgreSQL
    /// connection
    pub fn new(conn: &'c mut PgConnection) -> Self {
        Self { conn }
    }
}

#[derive(sqlx::FromRow)]
struct OrganizationLookup {
    organization_id: Uuid,
    name: String,
    status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<OrganizationLookup> for Organization {
    type Error = DatabaseInconsistencyError;

    fn try_from(value: OrganizationLookup) -> Result<Self, Self::Error> {
        let id = value.organization_id.into();
        Ok(Organization {
            id,
            name: value.name,
            status: parse_status("organizations", id, &value.status)?,
            created_at: value.created_at,
        })
    }
}

#[async_trait]
impl OrganizationRepository for PgOrganizationRepository<'_> {
    type Error = DatabaseError;

    #[tracing::instrument(
        name = "db.organization.lookup",
        skip_all,
        fields(
            db.query.text,
            organization.id = %id,
        ),
        err,
    )]
    async fn lookup(&mut self, id: Ulid) -> Result<Option<Organization>, Self::Error> {
        let res = sqlx::query_as::<_, OrganizationLookup>(
            r#"
                SELECT organization_id, name, status, created_at
                FROM organizations
                WHERE organization_id = $1
            "#,
        )
        .bind(Uuid::from(id))
        .traced()
        .fetch_optional(&mut *self.conn)
        .await?;

        let Some(res) = res else { return Ok(None) };

        Ok(Some(res.try_into()?))
    }

    #[tracing::instrument(
        name = "db.organization.add",
        skip_all,
        fields(
            db.query.text,
            organization.id,
            organization.name = %name,
        ),
        err,
    )]
    async fn add(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        name: String,
        status: EntityStatus,
    ) -> Result<Organization, Self::Error> {
        let created_at = clock.now();
        let id = Ulid::from_datetime_with_source(created_at.into(), rng);
        tracing::Span::current().record("organization.id", tracing::field::display(id));

        sqlx::query(
            r#"
                INSERT INTO organizations (organization_id, name, status, created_at)
                VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(Uuid::from(id))
        .bind(&name)
        .bind(status.as_str())
        .bind(created_at)
        .traced()
        .execute(&mut *self.conn)
        .await?;

        Ok(Organization {
            id,
            name,
            status,
            created_at,
        })
    }
}

/// An implementation of [`TeamRepository`] for a PostgreSQL connection
pub struct PgTeamRepository<'c> {
    conn: &'c mut PgConnection,
}

impl<'c> PgTeamRepository<'c> {
    /// Create a new [`PgTeamRepository`] from an active PostgreSQL connection
    pub fn new(conn: &'c mut PgConnection) -> Self {
        Self { conn }
    }
}

#[derive(sqlx::FromRow)]
struct TeamLookup {
    team_id: Uuid,
    organization_id: Uuid,
    name: String,
    status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<TeamLookup> for Team {
    type Error = DatabaseInconsistencyError;

    fn try_from(value: TeamLookup) -> Result<Self, Self::Error> {
        let id = value.team_id.into();
        Ok(Team {
            id,
            organization_id: value.organization_id.into(),
            name: value.name,
            status: parse_status("teams", id, &value.status)?,
            created_at: value.created_at,
        })
    }
}

#[async_trait]
impl TeamRepository for PgTeamRepository<'_> {
    type Error = DatabaseError;

    #[tracing::instrument(
        name = "db.team.lookup",
        skip_all,
        fields(
            db.query.text,
            team.id = %id,
        ),
        err,
    )]
    async fn lookup(&mut self, id: Ulid) -> Result<Option<Team>, Self::Error> {
        let res = sqlx::query_as::<_, TeamLookup>(
            r#"
                SELECT team_id, organization_id, name, status, created_at
                FROM teams
                WHERE team_id = $1
            "#,
        )
        .bind(Uuid::from(id))
        .traced()
        .fetch_optional(&mut *self.conn)
        .await?;

        let Some(res) = res else { return Ok(None) };

        Ok(Some(res.try_into()?))
    }

    #[tracing::instrument(
        name = "db.team.add",
        skip_all,
        fields(
            db.query.text,
            team.id,
            team.name = %name,
            %organization.id,
        ),
        err,
    )]
    async fn add(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        organization: &Organization,
        name: String,
        status: EntityStatus,
    ) -> Result<Team, Self::Error> {
        let created_at = clock.now();
        let id = Ulid::from_datetime_with_source(created_at.into(), rng);
        tracing::Span::current().record("team.id", tracing::field::display(id));

        sqlx::query(
            r#"
                INSERT INTO teams (team_id, organization_id, name, status, created_at)
                VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(Uuid::from(id))
        .bind(Uuid::from(organization.id))
        .bind(&name)
        .bind(status.as_str())
        .bind(created_at)
        .traced()
        .execute(&mut *self.conn)
        .await?;

        Ok(Team {
            id,
            organization_id: organization.id,
            name,
            status,
            created_at,
        })
    }

    #[tracing::instrument(
        name = "db.team.list_for_organization",
        skip_all,
        fields(
            db.query.text,
            organization.id = %organization_id,
        ),
        err,
    )]
    async fn list_for_organization(
        &mut self,
        organization_id: Ulid,
    ) -> Result<Vec<Team>, Self::Error> {
        let res = sqlx::query_as::<_, TeamLookup>(
            r#"
                SELECT team_id, organization_id, name, status, created_at
                FROM teams
                WHERE organization_id = $1
                ORDER BY team_id
            "#,
        )
        .bind(Uuid::from(organization_id))
        .traced()
        .fetch_all(&mut *self.conn)
        .await?;

        let teams = res
            .into_iter()
            .map(TryInto::try_into)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(teams)
    }

    #[tracing::instrument(
        name = "db.team.add_project",
        skip_all,
        fields(
            db.query.text,
            %team.id,
            %project.id,
        ),
        err,
    )]
    async fn add_project(&mut self, team: &Team, project: &Project) -> Result<(), Self::Error> {
        sqlx::query(
            r#"
                INSERT INTO project_teams (project_id, team_id)
                VALUES ($1, $2)
                ON CONFLICT DO NOTHING
            "#,
        )
        .bind(Uuid::from(project.id))
        .bind(Uuid::from(team.id))
        .traced()
        .execute(&mut *self.conn)
        .await?;

        Ok(())
    }

    #[tracing::instrument(
        name = "db.team.project_ids",
        skip_all,
        fields(
            db.query.text,
            team.id = %team_id,
        ),
        err,
    )]
    async fn project_ids(&mut self, team_id: Ulid) -> Result<Vec<Ulid>, Self::Error> {
        let res: Vec<Uuid> = sqlx::query_scalar(
            r#"
                SELECT project_id
                FROM project_teams
                WHERE team_id = $1
                ORDER BY project_id
            "#,
        )
        .bind(Uuid::from(team_id))
        .traced()
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(res.into_iter().map(Ulid::from).collect())
    }

    #[tracing::instrument(
        name = "db.team.remove_project_links_for_team",
        skip_all,
        fields(
            db.query.text,
            db.rows_affected,
            team.id = %team_id,
        ),
        err,
    )]
    async fn remove_project_links_for_team(
        &mut self,
        team_id: Ulid,
    ) -> Result<usize, Self::Error> {
        let res = sqlx::query(
            r#"
                DELETE FROM project_teams
                WHERE team_id = $1
            "#,
        )
        .bind(Uuid::from(team_id))
        .traced()
        .execute(&mut *self.conn)
        .await?;

        Ok(rows_deleted("project_teams", &res))
    }

    #[tracing::instrument(
        name = "db.team.remove_project_links_for_project",
        skip_all,
        fields(
            db.query.text,
            db.rows_affected,
            project.id = %project_id,
        ),
        err,
    )]
    async fn remove_project_links_for_project(
        &mut self,
        project_id: Ulid,
    ) -> Result<usize, Self::Error> {
        let res = sqlx::query(
            r#"
                DELETE FROM project_teams
                WHERE project_id = $1
            "#,
        )
        .bind(Uuid::from(project_id))
        .traced()
        .execute(&mut *self.conn)
        .await?;

        Ok(rows_deleted("project_teams", &res))
    }
}

/// An implementation of [`ProjectRepository`] for a PostgreSQL connection
pub struct PgProjectRepository<'c> {
    conn: &'c mut PgConnection,
}

impl<'c> PgProjectRepository<'c> {
    /// Create a new [`PgProjectRepository`] from an active PostgreSQL
    /// connection
    pub fn new(conn: &'c mut PgConnection) -> Self {
        Self { conn }
    }
}

#[derive(sqlx::FromRow)]
struct ProjectLookup {
    project_id: Uuid,
    organization_id: Uuid,
    name: String,
    status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<ProjectLookup> for Project {
    type Error = DatabaseInconsistencyError;

    fn try_from(value: ProjectLookup) -> Result<Self, Self::Error> {
        let id = value.project_id.into();
        Ok(Project {
            id,
            organization_id: value.organization_id.into(),
            name: value.name,
            status: parse_status("projects", id, &value.status)?,
            created_at: value.created_at,
        })
    }
}

#[async_trait]
impl ProjectRepository for PgProjectRepository<'_> {
    type Error = DatabaseError;

    #[tracing::instrument(
        name = "db.project.lookup",
        skip_all,
        fields(
            db.query.text,
            project.id = %id,
        ),
        err,
    )]
    async fn lookup(&mut self, id: Ulid) -> Result<Option<Project>, Self::Error> {
        let res = sqlx::query_as::<_, ProjectLookup>(
            r#"
                SELECT project_id, organization_id, name, status, created_at
                FROM projects
                WHERE project_id = $1
            "#,
        )
        .bind(Uuid::from(id))
        .traced()
        .fetch_optional(&mut *self.conn)
        .await?;

        let Some(res) = res else { return Ok(None) };

        Ok(Some(res.try_into()?))
    }

    #[tracing::instrument(
        name = "db.project.add",
        skip_all,
        fields(
            db.query.text,
            project.id,
            project.name = %name,
            %organization.id,
        ),
        err,
    )]
    async fn add(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        organization: &Organization,
        name: String,
        status: EntityStatus,
    ) -> Result<Project, Self::Error> {
        let created_at = clock.now();
        let id = Ulid::from_datetime_with_source(created_at.into(), rng);
        tracing::Span::current().record("project.id", tracing::field::display(id));

        sqlx::query(
            r#"
                INSERT INTO projects (project_id, organization_id, name, status, created_at)
                VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(Uuid::from(id))
        .bind(Uuid::from(organization.id))
        .bind(&name)
        .bind(status.as_str())
        .bind(created_at)
        .traced()
        .execute(&mut *self.conn)
        .await?;

        Ok(Project {
            id,
            organization_id: organization.id,
            name,
            status,
            created_at,
        })
    }

    #[tracing::instrument(
        name = "db.project.list_for_organization",
        skip_all,
        fields(
            db.query.text,
            organization.id = %organization_id,
        ),
        err,
    )]
    async fn list_for_organization(
        &mut self,
        organization_id: Ulid,
    ) -> Result<Vec<Project>, Self::Error> {
        let res = sqlx::query_as::<_, ProjectLookup>(
            r#"
                SELECT project_id, organization_id, name, status, created_at
                FROM projects
                WHERE organization_id = $1
                ORDER BY project_id
            "#,
        )
        .bind(Uuid::from(organization_id))
        .traced()
        .fetch_all(&mut *self.conn)
        .await?;

        let projects = res
            .into_iter()
            .map(TryInto::try_into)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(projects)
    }
}
