// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

//! PostgreSQL implementations of the code repository and commit repositories

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use purge_data_model::{
    Clock, CodeRepository, Commit, CommitAuthor, EntityStatus, Organization,
};
use purge_storage::vcs::{CodeRepositoryRepository, CommitRepository};
use rand_core::RngCore;
use sqlx::PgConnection;
use ulid::Ulid;
use uuid::Uuid;

use crate::{
    DatabaseError, DatabaseInconsistencyError, ExecuteExt, parse_status, tracing::rows_deleted,
};

/// An implementation of [`CodeRepositoryRepository`] for a PostgreSQL
/// connection
pub struct PgCodeRepositoryRepository<'c> {
    conn: &'c mut PgConnection,
}

impl<'c> PgCodeRepositoryRepository<'c> {
    /// Create a new [`PgCodeRepositoryRepository`] from an active PostgreSQL
    /// connection
    pub fn new(conn: &'c mut PgConnection) -> Self {
        Self { conn }
    }
}

#[derive(sqlx::FromRow)]
struct CodeRepositoryLookup {
    code_repository_id: Uuid,
    organization_id: Uuid,
    name: String,
    provider: Option<String>,
    status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<CodeRepositoryLookup> for CodeRepository {
    type Error = DatabaseInconsistencyError;

    fn try_from(value: CodeRepositoryLookup) -> Result<Self, Self::Error> {
        let id = value.code_repository_id.into();
        Ok(CodeRepository {
            id,
            organization_id: value.organization_id.into(),
            name: value.name,
            provider: value.provider,
            status: parse_status("code_repositories", id, &value.status)?,
            created_at: value.created_at,
        })
    }
}

#[async_trait]
impl CodeRepositoryRepository for PgCodeRepositoryRepository<'_> {
    type Error = DatabaseError;

    #[tracing::instrument(
        name = "db.code_repository.lookup",
        skip_all,
        fields(
            db.query.text,
            code_repository.id = %id,
        ),
        err,
    )]
    async fn lookup(&mut self, id: Ulid) -> Result<Option<CodeRepository>, Self::Error> {
        let res = sqlx::query_as::<_, CodeRepositoryLookup>(
            r#"
                SELECT code_repository_id
                     , organization_id
                     , name
                     , provider
                     , status
                     , created_at
                FROM code_repositories
                WHERE code_repository_id = $1
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
        name = "db.code_repository.add",
        skip_all,
        fields(
            db.query.text,
            code_repository.id,
            code_repository.name = %name,
            code_repository.provider = provider.as_deref(),
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
        provider: Option<String>,
        status: EntityStatus,
    ) -> Result<CodeRepository, Self::Error> {
        let created_at = clock.now();
        let id = Ulid::from_datetime_with_source(created_at.into(), rng);
        tracing::Span::current().record("code_repository.id", tracing::field::display(id));

        sqlx::query(
            r#"
                INSERT INTO code_repositories
                    ( code_repository_id
                    , organization_id
                    , name
                    , provider
                    , status
                    , created_at
                    )
                VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(Uuid::from(id))
        .bind(Uuid::from(organization.id))
        .bind(&name)
        .bind(provider.as_deref())
        .bind(status.as_str())
        .bind(created_at)
        .traced()
        .execute(&mut *self.conn)
        .await?;

        Ok(CodeRepository {
            id,
            organization_id: organization.id,
            name,
            provider,
            status,
            created_at,
        })
    }

    #[tracing::instrument(
        name = "db.code_repository.list_for_organization",
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
    ) -> Result<Vec<CodeRepository>, Self::Error> {
        let res = sqlx::query_as::<_, CodeRepositoryLookup>(
            r#"
                SELECT code_repository_id
                     , organization_id
                     , name
                     , provider
                     , status
                     , created_at
                FROM code_repositories
                WHERE organization_id = $1
                ORDER BY code_repository_id
            "#,
        )
        .bind(Uuid::from(organization_id))
        .traced()
        .fetch_all(&mut *self.conn)
        .await?;

        let repositories = res
            .into_iter()
            .map(TryInto::try_into)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(repositories)
    }
}

/// An implementation of [`CommitRepository`] for a PostgreSQL connection
pub struct PgCommitRepository<'c> {
    conn: &'c mut PgConnection,
}

impl<'c> PgCommitRepository<'c> {
    /// Create a new [`PgCommitRepository`] from an active PostgreSQL
    /// connection
    pub fn new(conn: &'c mut PgConnection) -> Self {
        Self { conn }
    }
}

#[derive(sqlx::FromRow)]
struct CommitLookup {
    commit_id: Uuid,
    organization_id: Uuid,
    code_repository_id: Uuid,
    commit_author_id: Option<Uuid>,
    key: String,
    created_at: DateTime<Utc>,
}

impl From<CommitLookup> for Commit {
    fn from(value: CommitLookup) -> Self {
        Commit {
            id: value.commit_id.into(),
            organization_id: value.organization_id.into(),
            repository_id: value.code_repository_id.into(),
            author_id: value.commit_author_id.map(Ulid::from),
            key: value.key,
            created_at: value.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct CommitAuthorLookup {
    commit_author_id: Uuid,
    organization_id: Uuid,
    name: String,
    email: String,
}

impl From<CommitAuthorLookup> for CommitAuthor {
    fn from(value: CommitAuthorLookup) -> Self {
        CommitAuthor {
            id: value.commit_author_id.into(),
            organization_id: value.organization_id.into(),
            name: value.name,
            email: value.email,
        }
    }
}

#[async_trait]
impl CommitRepository for PgCommitRepository<'_> {
    type Error = DatabaseError;

    #[tracing::instrument(
        name = "db.commit.lookup",
        skip_all,
        fields(
            db.query.text,
            commit.id = %id,
        ),
        err,
    )]
    async fn lookup(&mut self, id: Ulid) -> Result<Option<Commit>, Self::Error> {
        let res = sqlx::query_as::<_, CommitLookup>(
            r#"
                SELECT commit_id
                     , organization_id
                     , code_repository_id
                     , commit_author_id
                     , key
                     , created_at
                FROM commits
                WHERE commit_id = $1
            "#,
        )
        .bind(Uuid::from(id))
        .traced()
        .fetch_optional(&mut *self.conn)
        .await?;

        Ok(res.map(Into::into))
    }

    #[tracing::instrument(
        name = "db.commit.add",
        skip_all,
        fields(
            db.query.text,
            commit.id,
            commit.key = %key,
            code_repository.id = %repository.id,
        ),
        err,
    )]
    async fn add(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        repository: &CodeRepository,
        author: Option<&CommitAuthor>,
        key: String,
    ) -> Result<Commit, Self::Error> {
        let created_at = clock.now();
        let id = Ulid::from_datetime_with_source(created_at.into(), rng);
        tracing::Span::current().record("commit.id", tracing::field::display(id));

        let author_id = author.map(|author| author.id);

        sqlx::query(
            r#"
                INSERT INTO commits
                    ( commit_id
                    , organization_id
                    , code_repository_id
                    , commit_author_id
                    , key
                    , created_at
                    )
                VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(Uuid::from(id))
        .bind(Uuid::from(repository.organization_id))
        .bind(Uuid::from(repository.id))
        .bind(author_id.map(Uuid::from))
        .bind(&key)
        .bind(created_at)
        .traced()
        .execute(&mut *self.conn)
        .await?;

        Ok(Commit {
            id,
            organization_id: repository.organization_id,
            repository_id: repository.id,
            author_id,
            key,
            created_at,
        })
    }

    #[tracing::instrument(
        name = "db.commit.lookup_author",
        skip_all,
        fields(
            db.query.text,
            commit_author.id = %id,
        ),
        err,
    )]
    async fn lookup_author(&mut self, id: Ulid) -> Result<Option<CommitAuthor>, Self::Error> {
        let res = sqlx::query_as::<_, CommitAuthorLookup>(
            r#"
                SELECT commit_author_id, organization_id, name, email
                FROM commit_authors
                WHERE commit_author_id = $1
            "#,
        )
        .bind(Uuid::from(id))
        .traced()
        .fetch_optional(&mut *self.conn)
        .await?;

        Ok(res.map(Into::into))
    }

    #[tracing::instrument(
        name = "db.commit.add_author",
        skip_all,
        fields(
            db.query.text,
            commit_author.id,
            %organization.id,
        ),
        err,
    )]
    async fn add_author(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        organization: &Organization,
        name: String,
        email: String,
    ) -> Result<CommitAuthor, Self::Error> {
        let id = Ulid::from_datetime_with_source(clock.now().into(), rng);
        tracing::Span::current().record("commit_author.id", tracing::field::display(id));

        sqlx::query(
            r#"
                INSERT INTO commit_authors (commit_author_id, organization_id, name, email)
                VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(Uuid::from(id))
        .bind(Uuid::from(organization.id))
        .bind(&name)
        .bind(&email)
        .traced()
        .execute(&mut *self.conn)
        .await?;

        Ok(CommitAuthor {
            id,
            organization_id: organization.id,
            name,
            email,
        })
    }

    #[tracing::instrument(
        name = "db.commit.delete_for_repository",
        skip_all,
        fields(
            db.query.text,
            db.rows_affected,
            code_repository.id = %repository_id,
        ),
        err,
    )]
    async fn delete_for_repository(&mut self, repository_id: Ulid) -> Result<usize, Self::Error> {
        let res = sqlx::query(
            r#"
                DELETE FROM commits
                WHERE code_repository_id = $1
            "#,
        )
        .bind(Uuid::from(repository_id))
        .traced()
        .execute(&mut *self.conn)
        .await?;

        Ok(rows_deleted("commits", &res))
    }

    #[tracing::instrument(
        name = "db.commit.delete_for_organization",
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
                DELETE FROM commits
                WHERE organization_id = $1
            "#,
        )
        .bind(Uuid::from(organization_id))
        .traced()
        .execute(&mut *self.conn)
        .await?;

        Ok(rows_deleted("commits", &res))
    }

    #[tracing::instrument(
        name = "db.commit.delete_authors_for_organization",
        skip_all,
        fields(
            db.query.text,
            db.rows_affected,
            organization.id = %organization_id,
        ),
        err,
    )]
    async fn delete_authors_for_organization(
        &mut self,
        organization_id: Ulid,
    ) -> Result<usize, Self::Error> {
        let res = sqlx::query(
            r#"
                DELETE FROM commit_authors
                WHERE organization_id = $1
            "#,
        )
        .bind(Uuid::from(organization_id))
        .traced()
        .execute(&mut *self.conn)
        .await?;

        Ok(rows_deleted("commit_authors", &res))
    }
}
