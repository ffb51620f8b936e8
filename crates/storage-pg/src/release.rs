// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

//! PostgreSQL implementations of the release and environment repositories

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use purge_data_model::{
    Clock, Commit, Environment, Organization, Project, Release, ReleaseCommit, ReleaseEnvironment,
};
use purge_storage::release::{EnvironmentRepository, ReleaseRepository};
use rand_core::RngCore;
use sqlx::PgConnection;
use ulid::Ulid;
use uuid::Uuid;

use crate::{DatabaseError, ExecuteExt, tracing::rows_deleted};

/// An implementation of [`ReleaseRepository`] for a PostgreSQL connection
pub struct PgReleaseRepository<'c> {
    conn: &'c mut PgConnection,
}

impl<'c> PgReleaseRepository<'c> {
    /// Create a new [`PgReleaseRepository`] from an active PostgreSQL
    /// connection
    pub fn new(conn: &'c mut PgConnection) -> Self {
        Self { conn }
    }
}

#[derive(sqlx::FromRow)]
struct ReleaseLookup {
    release_id: Uuid,
    organization_id: Uuid,
    version: String,
    created_at: DateTime<Utc>,
}

impl From<ReleaseLookup> for Release {
    fn from(value: ReleaseLookup) -> Self {
        Release {
            id: value.release_id.into(),
            organization_id: value.organization_id.into(),
            version: value.version,
            created_at: value.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ReleaseCommitLookup {
    release_commit_id: Uuid,
    organization_id: Uuid,
    release_id: Uuid,
    commit_id: Uuid,
    project_id: Option<Uuid>,
    commit_order: i32,
}

impl From<ReleaseCommitLookup> for ReleaseCommit {
    fn from(value: ReleaseCommitLookup) -> Self {
        ReleaseCommit {
            id: value.release_commit_id.into(),
            organization_id: value.organization_id.into(),
            release_id: value.release_id.into(),
            commit_id: value.commit_id.into(),
            project_id: value.project_id.map(Ulid::from),
            order: value.commit_order,
        }
    }
}

#[async_trait]
impl ReleaseRepository for PgReleaseRepository<'_> {
    type Error = DatabaseError;

    #[tracing::instrument(
        name = "db.release.lookup",
        skip_all,
        fields(
            db.query.text,
            release.id = %id,
        ),
        err,
    )]
    async fn lookup(&mut self, id: Ulid) -> Result<Option<Release>, Self::Error> {
        let res = sqlx::query_as::<_, ReleaseLookup>(
            r#"
                SELECT release_id
                     , organization_id
                     , version
                     , created_at
                FROM releases
                WHERE release_id = $1
            "#,
        )
        .bind(Uuid::from(id))
        .traced()
        .fetch_optional(&mut *self.conn)
        .await?;

        Ok(res.map(Into::into))
    }

    #[tracing::instrument(
        name = "db.release.add",
        skip_all,
        fields(
            db.query.text,
            release.id,
            release.version = %version,
            %organization.id,
        ),
        err,
    )]
    async fn add(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        organization: &Organization,
        version: String,
    ) -> Result<Release, Self::Error> {
        let created_at = clock.now();
        let id = Ulid::from_datetime_with_source(created_at.into(), rng);
        tracing::Span::current().record("release.id", tracing::field::display(id));

        sqlx::query(
            r#"
                INSERT INTO releases (release_id, organization_id, version, created_at)
                VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(Uuid::from(id))
        .bind(Uuid::from(organization.id))
        .bind(&version)
        .bind(created_at)
        .traced()
        .execute(&mut *self.conn)
        .await?;

        Ok(Release {
            id,
            organization_id: organization.id,
            version,
            created_at,
        })
    }

    #[tracing::instrument(
        name = "db.release.add_project",
        skip_all,
        fields(
            db.query.text,
            %release.id,
            %project.id,
        ),
        err,
    )]
    async fn add_project(
        &mut self,
        release: &Release,
        project: &Project,
    ) -> Result<(), Self::Error> {
        sqlx::query(
            r#"
                INSERT INTO release_projects (release_id, project_id)
                VALUES ($1, $2)
                ON CONFLICT DO NOTHING
            "#,
        )
        .bind(Uuid::from(release.id))
        .bind(Uuid::from(project.id))
        .traced()
        .execute(&mut *self.conn)
        .await?;

        Ok(())
    }

    #[tracing::instrument(
        name = "db.release.project_ids",
        skip_all,
        fields(
            db.query.text,
            release.id = %release_id,
        ),
        err,
    )]
    async fn project_ids(&mut self, release_id: Ulid) -> Result<Vec<Ulid>, Self::Error> {
        let res: Vec<Uuid> = sqlx::query_scalar(
            r#"
                SELECT project_id
                FROM release_projects
                WHERE release_id = $1
                ORDER BY project_id
            "#,
        )
        .bind(Uuid::from(release_id))
        .traced()
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(res.into_iter().map(Ulid::from).collect())
    }

    #[tracing::instrument(
        name = "db.release.remove_project_links_for_project",
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
                DELETE FROM release_projects
                WHERE project_id = $1
            "#,
        )
        .bind(Uuid::from(project_id))
        .traced()
        .execute(&mut *self.conn)
        .await?;

        Ok(rows_deleted("release_projects", &res))
    }

    #[tracing::instrument(
        name = "db.release.remove_project_links_for_organization",
        skip_all,
        fields(
            db.query.text,
            db.rows_affected,
            organization.id = %organization_id,
        ),
        err,
    )]
    async fn remove_project_links_for_organization(
        &mut self,
        organization_id: Ulid,
    ) -> Result<usize, Self::Error> {
        let res = sqlx::query(
            r#"
                DELETE FROM release_projects
                WHERE release_id IN (
                    SELECT release_id
                    FROM releases
                    WHERE organization_id = $1
                )
            "#,
        )
        .bind(Uuid::from(organization_id))
        .traced()
        .execute(&mut *self.conn)
        .await?;

        Ok(rows_deleted("release_projects", &res))
    }

    #[tracing::instrument(
        name = "db.release.lookup_commit",
        skip_all,
        fields(
            db.query.text,
            release_commit.id = %id,
        ),
        err,
    )]
    async fn lookup_commit(&mut self, id: Ulid) -> Result<Option<ReleaseCommit>, Self::Error> {
        let res = sqlx::query_as::<_, ReleaseCommitLookup>(
            r#"
                SELECT release_commit_id
                     , organization_id
                     , release_id
                     , commit_id
                     , project_id
                     , commit_order
                FROM release_commits
                WHERE release_commit_id = $1
            "#,
        )
        .bind(Uuid::from(id))
        .traced()
        .fetch_optional(&mut *self.conn)
        .await?;

        Ok(res.map(Into::into))
    }

    #[tracing::instrument(
        name = "db.release.add_commit",
        skip_all,
        fields(
            db.query.text,
            release_commit.id,
            %release.id,
            %commit.id,
        ),
        err,
    )]
    async fn add_commit(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        release: &Release,
        commit: &Commit,
        project: Option<&Project>,
        order: i32,
    ) -> Result<ReleaseCommit, Self::Error> {
        let id = Ulid::from_datetime_with_source(clock.now().into(), rng);
        tracing::Span::current().record("release_commit.id", tracing::field::display(id));

        let project_id = project.map(|project| project.id);

        sqlx::query(
            r#"
                INSERT INTO release_commits
                    ( release_commit_id
                    , organization_id
                    , release_id
                    , commit_id
                    , project_id
                    , commit_order
                    )
                VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(Uuid::from(id))
        .bind(Uuid::from(release.organization_id))
        .bind(Uuid::from(release.id))
        .bind(Uuid::from(commit.id))
        .bind(project_id.map(Uuid::from))
        .bind(order)
        .traced()
        .execute(&mut *self.conn)
        .await?;

        Ok(ReleaseCommit {
            id,
            organization_id: release.organization_id,
            release_id: release.id,
            commit_id: commit.id,
            project_id,
            order,
        })
    }

    #[tracing::instrument(
        name = "db.release.delete_commits_for_repository",
        skip_all,
        fields(
            db.query.text,
            db.rows_affected,
            code_repository.id = %repository_id,
        ),
        err,
    )]
    async fn delete_commits_for_repository(
        &mut self,
        repository_id: Ulid,
    ) -> Result<usize, Self::Error> {
        let res = sqlx::query(
            r#"
                DELETE FROM release_commits
                WHERE commit_id IN (
                    SELECT commit_id
                    FROM commits
                    WHERE code_repository_id = $1
                )
            "#,
        )
        .bind(Uuid::from(repository_id))
        .traced()
        .execute(&mut *self.conn)
        .await?;

        Ok(rows_deleted("release_commits", &res))
    }

    #[tracing::instrument(
        name = "db.release.delete_commits_for_organization",
        skip_all,
        fields(
            db.query.text,
            db.rows_affected,
            organization.id = %organization_id,
        ),
        err,
    )]
    async fn delete_commits_for_organization(
        &mut self,
        organization_id: Ulid,
    ) -> Result<usize, Self::Error> {
        let res = sqlx::query(
            r#"
                DELETE FROM release_commits
                WHERE organization_id = $1
            "#,
        )
        .bind(Uuid::from(organization_id))
        .traced()
        .execute(&mut *self.conn)
        .await?;

        Ok(rows_deleted("release_commits", &res))
    }

    #[tracing::instrument(
        name = "db.release.delete_for_organization",
        skip_all,
        fields(
            db.query.text,
            db.rows_affected,
            organization.id = %organization_id,
        ),
        err,
    )]
    async fn delete_for_organization(
        &mut self,
        organization_id: Ulid,
    ) -> Result<usize, Self::Error> {
        let res = sqlx::query(
            r#"
                DELETE FROM releases
                WHERE organization_id = $1
            "#,
        )
        .bind(Uuid::from(organization_id))
        .traced()
        .execute(&mut *self.conn)
        .await?;

        Ok(rows_deleted("releases", &res))
    }
}

/// An implementation of [`EnvironmentRepository`] for a PostgreSQL connection
pub struct PgEnvironmentRepository<'c> {
    conn: &'c mut PgConnection,
}

impl<'c> PgEnvironmentRepository<'c> {
    /// Create a new [`PgEnvironmentRepository`] from an active PostgreSQL
    /// connection
    pub fn new(conn: &'c mut PgConnection) -> Self {
        Self { conn }
    }
}

#[derive(sqlx::FromRow)]
struct EnvironmentLookup {
    environment_id: Uuid,
    organization_id: Uuid,
    name: String,
    created_at: DateTime<Utc>,
}

impl From<EnvironmentLookup> for Environment {
    fn from(value: EnvironmentLookup) -> Self {
        Environment {
            id: value.environment_id.into(),
            organization_id: value.organization_id.into(),
            name: value.name,
            created_at: value.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ReleaseEnvironmentLookup {
    release_environment_id: Uuid,
    organization_id: Uuid,
    release_id: Uuid,
    environment_id: Uuid,
    project_id: Option<Uuid>,
    first_seen: DateTime<Utc>,
}

impl From<ReleaseEnvironmentLookup> for ReleaseEnvironment {
    fn from(value: ReleaseEnvironmentLookup) -> Self {
        ReleaseEnvironment {
            id: value.release_environment_id.into(),
            organization_id: value.organization_id.into(),
            release_id: value.release_id.into(),
            environment_id: value.environment_id.into(),
            project_id: value.project_id.map(Ulid::from),
            first_seen: value.first_seen,
        }
    }
}

#[async_trait]
impl EnvironmentRepository for PgEnvironmentRepository<'_> {
    type Error = DatabaseError;

    #[tracing::instrument(
        name = "db.environment.lookup",
        skip_all,
        fields(
            db.query.text,
            environment.id = %id,
        ),
        err,
    )]
    async fn lookup(&mut self, id: Ulid) -> Result<Option<Environment>, Self::Error> {
        let res = sqlx::query_as::<_, EnvironmentLookup>(
            r#"
                SELECT environment_id
                     , organization_id
                     , name
                     , created_at
                FROM environments
                WHERE environment_id = $1
            "#,
        )
        .bind(Uuid::from(id))
        .traced()
        .fetch_optional(&mut *self.conn)
        .await?;

        Ok(res.map(Into::into))
    }

    #[tracing::instrument(
        name = "db.environment.add",
        skip_all,
        fields(
            db.query.text,
            environment.id,
            environment.name = %name,
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
    ) -> Result<Environment, Self::Error> {
        let created_at = clock.now();
        let id = Ulid::from_datetime_with_source(created_at.into(), rng);
        tracing::Span::current().record("environment.id", tracing::field::display(id));

        sqlx::query(
            r#"
                INSERT INTO environments (environment_id, organization_id, name, created_at)
                VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(Uuid::from(id))
        .bind(Uuid::from(organization.id))
        .bind(&name)
        .bind(created_at)
        .traced()
        .execute(&mut *self.conn)
        .await?;

        Ok(Environment {
            id,
            organization_id: organization.id,
            name,
            created_at,
        })
    }

    #[tracing::instrument(
        name = "db.environment.add_project",
        skip_all,
        fields(
            db.query.text,
            %environment.id,
            %project.id,
        ),
        err,
    )]
    async fn add_project(
        &mut self,
        environment: &Environment,
        project: &Project,
    ) -> Result<(), Self::Error> {
        sqlx::query(
            r#"
                INSERT INTO environment_projects (environment_id, project_id)
                VALUES ($1, $2)
                ON CONFLICT DO NOTHING
            "#,
        )
        .bind(Uuid::from(environment.id))
        .bind(Uuid::from(project.id))
        .traced()
        .execute(&mut *self.conn)
        .await?;

        Ok(())
    }

    #[tracing::instrument(
        name = "db.environment.project_ids",
        skip_all,
        fields(
            db.query.text,
            environment.id = %environment_id,
        ),
        err,
    )]
    async fn project_ids(&mut self, environment_id: Ulid) -> Result<Vec<Ulid>, Self::Error> {
        let res: Vec<Uuid> = sqlx::query_scalar(
            r#"
                SELECT project_id
                FROM environment_projects
                WHERE environment_id = $1
                ORDER BY project_id
            "#,
        )
        .bind(Uuid::from(environment_id))
        .traced()
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(res.into_iter().map(Ulid::from).collect())
    }

    #[tracing::instrument(
        name = "db.environment.remove_project_links_for_project",
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
                DELETE FROM environment_projects
                WHERE project_id = $1
            "#,
        )
        .bind(Uuid::from(project_id))
        .traced()
        .execute(&mut *self.conn)
        .await?;

        Ok(rows_deleted("environment_projects", &res))
    }

    #[tracing::instrument(
        name = "db.environment.remove_project_links_for_organization",
        skip_all,
        fields(
            db.query.text,
            db.rows_affected,
            organization.id = %organization_id,
        ),
        err,
    )]
    async fn remove_project_links_for_organization(
        &mut self,
        organization_id: Ulid,
    ) -> Result<usize, Self::Error> {
        let res = sqlx::query(
            r#"
                DELETE FROM environment_projects
                WHERE environment_id IN (
                    SELECT environment_id
                    FROM environments
                    WHERE organization_id = $1
                )
            "#,
        )
        .bind(Uuid::from(organization_id))
        .traced()
        .execute(&mut *self.conn)
        .await?;

        Ok(rows_deleted("environment_projects", &res))
    }

    #[tracing::instrument(
        name = "db.environment.lookup_release",
        skip_all,
        fields(
            db.query.text,
            release_environment.id = %id,
        ),
        err,
    )]
    async fn lookup_release(
        &mut self,
        id: Ulid,
    ) -> Result<Option<ReleaseEnvironment>, Self::Error> {
        let res = sqlx::query_as::<_, ReleaseEnvironmentLookup>(
            r#"
                SELECT release_environment_id
                     , organization_id
                     , release_id
                     , environment_id
                     , project_id
                     , first_seen
                FROM release_environments
                WHERE release_environment_id = $1
            "#,
        )
        .bind(Uuid::from(id))
        .traced()
        .fetch_optional(&mut *self.conn)
        .await?;

        Ok(res.map(Into::into))
    }

    #[tracing::instrument(
        name = "db.environment.add_release",
        skip_all,
        fields(
            db.query.text,
            release_environment.id,
            %release.id,
            %environment.id,
        ),
        err,
    )]
    async fn add_release(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        release: &Release,
        environment: &Environment,
        project: Option<&Project>,
    ) -> Result<ReleaseEnvironment, Self::Error> {
        let first_seen = clock.now();
        let id = Ulid::from_datetime_with_source(first_seen.into(), rng);
        tracing::Span::current().record("release_environment.id", tracing::field::display(id));

        let project_id = project.map(|project| project.id);

        sqlx::query(
            r#"
                INSERT INTO release_environments
                    ( release_environment_id
                    , organization_id
                    , release_id
                    , environment_id
                    , project_id
                    , first_seen
                    )
                VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(Uuid::from(id))
        .bind(Uuid::from(release.organization_id))
        .bind(Uuid::from(release.id))
        .bind(Uuid::from(environment.id))
        .bind(project_id.map(Uuid::from))
        .bind(first_seen)
        .traced()
        .execute(&mut *self.conn)
        .await?;

        Ok(ReleaseEnvironment {
            id,
            organization_id: release.organization_id,
            release_id: release.id,
            environment_id: environment.id,
            project_id,
            first_seen,
        })
    }

    #[tracing::instrument(
        name = "db.environment.delete_releases_for_organization",
        skip_all,
        fields(
            db.query.text,
            db.rows_affected,
            organization.id = %organization_id,
        ),
        err,
    )]
    async fn delete_releases_for_organization(
        &mut self,
        organization_id: Ulid,
    ) -> Result<usize, Self::Error> {
        let res = sqlx::query(
            r#"
                DELETE FROM release_environments
                WHERE organization_id = $1
            "#,
        )
        .bind(Uuid::from(organization_id))
        .traced()
        .execute(&mut *self.conn)
        .await?;

        Ok(rows_deleted("release_environments", &res))
    }

    #[tracing::instrument(
        name = "db.environment.delete_for_organization",
        skip_all,
        fields(
            db.query.text,
            db.rows_affected,
            organization.id = %organization_id,
        ),
        err,
    )]
    async fn delete_for_organization(
        &mut self,
        organization_id: Ulid,
    ) -> Result<usize, Self::Error> {
        let res = sqlx::query(
            r#"
                DELETE FROM environments
                WHERE organization_id = $1
            "#,
        )
        .bind(Uuid::from(organization_id))
        .traced()
        .execute(&mut *self.conn)
        .await?;

        Ok(rows_deleted("environments", &res))
    }
}
