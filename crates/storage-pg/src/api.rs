// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

//! PostgreSQL implementations of the API application, grant and token
//! repositories

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use purge_data_model::{ApiApplication, ApiGrant, ApiToken, Clock, EntityStatus};
use purge_storage::api::{ApiApplicationRepository, ApiGrantRepository, ApiTokenRepository};
use rand_core::RngCore;
use sqlx::PgConnection;
use ulid::Ulid;
use uuid::Uuid;

use crate::{
    DatabaseError, DatabaseInconsistencyError, ExecuteExt, parse_status, tracing::rows_deleted,
};

/// An implementation of [`ApiApplicationRepository`] for a PostgreSQL
/// connection
pub struct PgApiApplicationRepository<'c> {
    conn: &'c mut PgConnection,
}

impl<'c> PgApiApplicationRepository<'c> {
    /// Create a new [`PgApiApplicationRepository`] from an active PostgreSQL
    /// connection
    pub fn new(conn: &'c mut PgConnection) -> Self {
        Self { conn }
    }
}

#[derive(sqlx::FromRow)]
struct ApiApplicationLookup {
    api_application_id: Uuid,
    owner_id: Uuid,
    name: String,
    status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<ApiApplicationLookup> for ApiApplication {
    type Error = DatabaseInconsistencyError;

    fn try_from(value: ApiApplicationLookup) -> Result<Self, Self::Error> {
        let id = value.api_application_id.into();
        Ok(ApiApplication {
            id,
            owner_id: value.owner_id.into(),
            name: value.name,
            status: parse_status("api_applications", id, &value.status)?,
            created_at: value.created_at,
        })
    }
}

#[async_trait]
impl ApiApplicationRepository for PgApiApplicationRepository<'_> {
    type Error = DatabaseError;

    #[tracing::instrument(
        name = "db.api_application.lookup",
        skip_all,
        fields(
            db.query.text,
            api_application.id = %id,
        ),
        err,
    )]
    async fn lookup(&mut self, id: Ulid) -> Result<Option<ApiApplication>, Self::Error> {
        let res = sqlx::query_as::<_, ApiApplicationLookup>(
            r#"
                SELECT api_application_id
                     , owner_id
                     , name
                     , status
                     , created_at
                FROM api_applications
                WHERE api_application_id = $1
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
        name = "db.api_application.add",
        skip_all,
        fields(
            db.query.text,
            api_application.id,
            api_application.name = %name,
            user.id = %owner_id,
        ),
        err,
    )]
    async fn add(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        owner_id: Ulid,
        name: String,
        status: EntityStatus,
    ) -> Result<ApiApplication, Self::Error> {
        let created_at = clock.now();
        let id = Ulid::from_datetime_with_source(created_at.into(), rng);
        tracing::Span::current().record("api_application.id", tracing::field::display(id));

        sqlx::query(
            r#"
                INSERT INTO api_applications
                    ( api_application_id
                    , owner_id
                    , name
                    , status
                    , created_at
                    )
                VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(Uuid::from(id))
        .bind(Uuid::from(owner_id))
        .bind(&name)
        .bind(status.as_str())
        .bind(created_at)
        .traced()
        .execute(&mut *self.conn)
        .await?;

        Ok(ApiApplication {
            id,
            owner_id,
            name,
            status,
            created_at,
        })
    }
}

/// An implementation of [`ApiTokenRepository`] for a PostgreSQL connection
pub struct PgApiTokenRepository<'c> {
    conn: &'c mut PgConnection,
}

impl<'c> PgApiTokenRepository<'c> {
    /// Create a new [`PgApiTokenRepository`] from an active PostgreSQL
    /// connection
    pub fn new(conn: &'c mut PgConnection) -> Self {
        Self { conn }
    }
}

#[derive(sqlx::FromRow)]
struct ApiTokenLookup {
    api_token_id: Uuid,
    api_application_id: Uuid,
    user_id: Uuid,
    created_at: DateTime<Utc>,
}

impl From<ApiTokenLookup> for ApiToken {
    fn from(value: ApiTokenLookup) -> Self {
        ApiToken {
            id: value.api_token_id.into(),
            application_id: value.api_application_id.into(),
            user_id: value.user_id.into(),
            created_at: value.created_at,
        }
    }
}

#[async_trait]
impl ApiTokenRepository for PgApiTokenRepository<'_> {
    type Error = DatabaseError;

    #[tracing::instrument(
        name = "db.api_token.lookup",
        skip_all,
        fields(
            db.query.text,
            api_token.id = %id,
        ),
        err,
    )]
    async fn lookup(&mut self, id: Ulid) -> Result<Option<ApiToken>, Self::Error> {
        let res = sqlx::query_as::<_, ApiTokenLookup>(
            r#"
                SELECT api_token_id
                     , api_application_id
                     , user_id
                     , created_at
                FROM api_tokens
                WHERE api_token_id = $1
            "#,
        )
        .bind(Uuid::from(id))
        .traced()
        .fetch_optional(&mut *self.conn)
        .await?;

        Ok(res.map(Into::into))
    }

    #[tracing::instrument(
        name = "db.api_token.add",
        skip_all,
        fields(
            db.query.text,
            api_token.id,
            %api_application.id,
            user.id = %user_id,
        ),
        err,
    )]
    async fn add(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        api_application: &ApiApplication,
        user_id: Ulid,
    ) -> Result<ApiToken, Self::Error> {
        let created_at = clock.now();
        let id = Ulid::from_datetime_with_source(created_at.into(), rng);
        tracing::Span::current().record("api_token.id", tracing::field::display(id));

        sqlx::query(
            r#"
                INSERT INTO api_tokens (api_token_id, api_application_id, user_id, created_at)
                VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(Uuid::from(id))
        .bind(Uuid::from(api_application.id))
        .bind(Uuid::from(user_id))
        .bind(created_at)
        .traced()
        .execute(&mut *self.conn)
        .await?;

        Ok(ApiToken {
            id,
            application_id: api_application.id,
            user_id,
            created_at,
        })
    }

    #[tracing::instrument(
        name = "db.api_token.delete_for_application",
        skip_all,
        fields(
            db.query.text,
            db.rows_affected,
            api_application.id = %application_id,
        ),
        err,
    )]
    async fn delete_for_application(
        &mut self,
        application_id: Ulid,
        cutoff: Option<DateTime<Utc>>,
    ) -> Result<usize, Self::Error> {
        let res = sqlx::query(
            r#"
                DELETE FROM api_tokens
                WHERE api_application_id = $1
                  AND ($2::timestamptz IS NULL OR created_at <= $2)
            "#,
        )
        .bind(Uuid::from(application_id))
        .bind(cutoff)
        .traced()
        .execute(&mut *self.conn)
        .await?;

        Ok(rows_deleted("api_tokens", &res))
    }
}

/// An implementation of [`ApiGrantRepository`] for a PostgreSQL connection
pub struct PgApiGrantRepository<'c> {
    conn: &'c mut PgConnection,
}

impl<'c> PgApiGrantRepository<'c> {
    /// Create a new [`PgApiGrantRepository`] from an active PostgreSQL
    /// connection
    pub fn new(conn: &'c mut PgConnection) -> Self {
        Self { conn }
    }
}

#[derive(sqlx::FromRow)]
struct ApiGrantLookup {
    api_grant_id: Uuid,
    api_application_id: Uuid,
    user_id: Uuid,
    redirect_uri: String,
    created_at: DateTime<Utc>,
}

impl From<ApiGrantLookup> for ApiGrant {
    fn from(value: ApiGrantLookup) -> Self {
        ApiGrant {
            id: value.api_grant_id.into(),
            application_id: value.api_application_id.into(),
            user_id: value.user_id.into(),
            redirect_uri: value.redirect_uri,
            created_at: value.created_at,
        }
    }
}

#[async_trait]
impl ApiGrantRepository for PgApiGrantRepository<'_> {
    type Error = DatabaseError;

    #[tracing::instrument(
        name = "db.api_grant.lookup",
        skip_all,
        fields(
            db.query.text,
            api_grant.id = %id,
        ),
        err,
    )]
    async fn lookup(&mut self, id: Ulid) -> Result<Option<ApiGrant>, Self::Error> {
        let res = sqlx::query_as::<_, ApiGrantLookup>(
            r#"
                SELECT api_grant_id
                     , api_application_id
                     , user_id
                     , redirect_uri
                     , created_at
                FROM api_grants
                WHERE api_grant_id = $1
            "#,
        )
        .bind(Uuid::from(id))
        .traced()
        .fetch_optional(&mut *self.conn)
        .await?;

        Ok(res.map(Into::into))
    }

    #[tracing::instrument(
        name = "db.api_grant.add",
        skip_all,
        fields(
            db.query.text,
            api_grant.id,
            %api_application.id,
            user.id = %user_id,
        ),
        err,
    )]
    async fn add(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        api_application: &ApiApplication,
        user_id: Ulid,
        redirect_uri: String,
    ) -> Result<ApiGrant, Self::Error> {
        let created_at = clock.now();
        let id = Ulid::from_datetime_with_source(created_at.into(), rng);
        tracing::Span::current().record("api_grant.id", tracing::field::display(id));

        sqlx::query(
            r#"
                INSERT INTO api_grants
                    ( api_grant_id
                    , api_application_id
                    , user_id
                    , redirect_uri
                    , created_at
                    )
                VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(Uuid::from(id))
        .bind(Uuid::from(api_application.id))
        .bind(Uuid::from(user_id))
        .bind(&redirect_uri)
        .bind(created_at)
        .traced()
        .execute(&mut *self.conn)
        .await?;

        Ok(ApiGrant {
            id,
            application_id: api_application.id,
            user_id,
            redirect_uri,
            created_at,
        })
    }

    #[tracing::instrument(
        name = "db.api_grant.delete_for_application",
        skip_all,
        fields(
            db.query.text,
            db.rows_affected,
            api_application.id = %application_id,
        ),
        err,
    )]
    async fn delete_for_application(
        &mut self,
        application_id: Ulid,
    ) -> Result<usize, Self::Error> {
        let res = sqlx::query(
            r#"
                DELETE FROM api_grants
                WHERE api_application_id = $1
            "#,
        )
        .bind(Uuid::from(application_id))
        .traced()
        .execute(&mut *self.conn)
        .await?;

        Ok(rows_deleted("api_grants", &res))
    }
}
