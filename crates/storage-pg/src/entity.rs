// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

//! A module containing the PostgreSQL implementation of the
//! [`EntityRepository`].
//!
//! The target table depends on the kind of the entity, so the statements are
//! built with [`sea_query`].

use async_trait::async_trait;
use purge_data_model::{EntityRef, EntityStatus};
use purge_storage::entity::EntityRepository;
use sea_query::{Expr, PostgresQueryBuilder, Query};
use sea_query_binder::SqlxBinder;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::{
    DatabaseError, DatabaseInconsistencyError, ExecuteExt, iden::with_entity_table,
    tracing::rows_deleted,
};

/// An implementation of [`EntityRepository`] for a PostgreSQL connection
pub struct PgEntityRepository<'c> {
    conn: &'c mut PgConnection,
}

impl<'c> PgEntityRepository<'c> {
    /// Create a new [`PgEntityRepository`] from an active PostgreSQL
    /// connection
    pub fn new(conn: &'c mut PgConnection) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl EntityRepository for PgEntityRepository<'_> {
    type Error = DatabaseError;

    #[tracing::instrument(
        name = "db.entity.lookup_status",
        skip_all,
        fields(
            db.query.text,
            %entity,
        ),
        err,
    )]
    async fn lookup_status(
        &mut self,
        entity: EntityRef,
    ) -> Result<Option<EntityStatus>, Self::Error> {
        let (sql, values) = with_entity_table!(entity.kind, |table, id, status| {
            Query::select()
                .column(status)
                .from(table)
                .and_where(Expr::col(id).eq(Uuid::from(entity.id)))
                .build_sqlx(PostgresQueryBuilder)
        });

        let res: Option<String> = sqlx::query_scalar_with(&sql, values)
            .traced()
            .fetch_optional(&mut *self.conn)
            .await?;

        let Some(res) = res else { return Ok(None) };

        let status = res.parse().map_err(|e| {
            DatabaseInconsistencyError::on(entity.kind.as_str())
                .column("status")
                .row(entity.id)
                .source(e)
        })?;

        Ok(Some(status))
    }

    #[tracing::instrument(
        name = "db.entity.set_status",
        skip_all,
        fields(
            db.query.text,
            %entity,
            entity.status = %status,
        ),
        err,
    )]
    async fn set_status(
        &mut self,
        entity: EntityRef,
        status: EntityStatus,
    ) -> Result<bool, Self::Error> {
        let (sql, values) = with_entity_table!(entity.kind, |table, id, status_column| {
            Query::update()
                .table(table)
                .value(status_column, status.as_str())
                .and_where(Expr::col(id).eq(Uuid::from(entity.id)))
                .build_sqlx(PostgresQueryBuilder)
        });

        let res = sqlx::query_with(&sql, values)
            .traced()
            .execute(&mut *self.conn)
            .await?;

        Ok(res.rows_affected() > 0)
    }

    #[tracing::instrument(
        name = "db.entity.delete",
        skip_all,
        fields(
            db.query.text,
            db.rows_affected,
            %entity,
        ),
        err,
    )]
    async fn delete(&mut self, entity: EntityRef) -> Result<bool, Self::Error> {
        let (sql, values) = with_entity_table!(entity.kind, |table, id, _status| {
            Query::delete()
                .from_table(table)
                .and_where(Expr::col(id).eq(Uuid::from(entity.id)))
                .build_sqlx(PostgresQueryBuilder)
        });

        let res = sqlx::query_with(&sql, values)
            .traced()
            .execute(&mut *self.conn)
            .await?;

        Ok(rows_deleted(entity.kind.as_str(), &res) > 0)
    }
}
