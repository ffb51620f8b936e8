// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

//! A module containing the PostgreSQL implementation of the
//! [`ScheduledDeletionRepository`].

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use purge_data_model::{Clock, EntityRef, ScheduledDeletion};
use purge_storage::deletion::ScheduledDeletionRepository;
use rand_core::RngCore;
use sqlx::PgConnection;
use ulid::Ulid;
use uuid::Uuid;

use crate::{
    DatabaseError, DatabaseInconsistencyError, ExecuteExt,
    tracing::{rows_affected, rows_deleted},
};

/// An implementation of [`ScheduledDeletionRepository`] for a PostgreSQL
/// connection
pub struct PgScheduledDeletionRepository<'c> {
    conn: &'c mut PgConnection,
}

impl<'c> PgScheduledDeletionRepository<'c> {
    /// Create a new [`PgScheduledDeletionRepository`] from an active
    /// PostgreSQL connection
    pub fn new(conn: &'c mut PgConnection) -> Self {
        Self { conn }
    }
}

#[derive(sqlx::FromRow)]
struct ScheduledDeletionLookup {
    scheduled_deletion_id: Uuid,
    entity_kind: String,
    entity_id: Uuid,
    actor_id: Option<Uuid>,
    date_scheduled: DateTime<Utc>,
    date_added: DateTime<Utc>,
    in_progress: bool,
}

impl TryFrom<ScheduledDeletionLookup> for ScheduledDeletion {
    type Error = DatabaseInconsistencyError;

    fn try_from(value: ScheduledDeletionLookup) -> Result<Self, Self::Error> {
        let id = Ulid::from(value.scheduled_deletion_id);
        let entity_kind = value.entity_kind.parse().map_err(|e| {
            DatabaseInconsistencyError::on("scheduled_deletions")
                .column("entity_kind")
                .row(id)
                .source(e)
        })?;

        Ok(ScheduledDeletion {
            id,
            entity_kind,
            entity_id: value.entity_id.into(),
            actor_id: value.actor_id.map(Ulid::from),
            date_scheduled: value.date_scheduled,
            date_added: value.date_added,
            in_progress: value.in_progress,
        })
    }
}

#[async_trait]
impl ScheduledDeletionRepository for PgScheduledDeletionRepository<'_> {
    type Error = DatabaseError;

    #[tracing::instrument(
        name = "db.scheduled_deletion.lookup",
        skip_all,
        fields(
            db.query.text,
            scheduled_deletion.id = %id,
        ),
        err,
    )]
    async fn lookup(&mut self, id: Ulid) -> Result<Option<ScheduledDeletion>, Self::Error> {
        let res = sqlx::query_as::<_, ScheduledDeletionLookup>(
            r#"
                SELECT scheduled_deletion_id
                     , entity_kind
                     , entity_id
                     , actor_id
                     , date_scheduled
                     , date_added
                     , in_progress
                FROM scheduled_deletions
                WHERE scheduled_deletion_id = $1
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
        name = "db.scheduled_deletion.find_by_entity",
        skip_all,
        fields(
            db.query.text,
            %entity,
        ),
        err,
    )]
    async fn find_by_entity(
        &mut self,
        entity: EntityRef,
    ) -> Result<Option<ScheduledDeletion>, Self::Error> {
        let res = sqlx::query_as::<_, ScheduledDeletionLookup>(
            r#"
                SELECT scheduled_deletion_id
                     , entity_kind
                     , entity_id
                     , actor_id
                     , date_scheduled
                     , date_added
                     , in_progress
                FROM scheduled_deletions
                WHERE entity_kind = $1
                  AND entity_id = $2
            "#,
        )
        .bind(entity.kind.as_str())
        .bind(Uuid::from(entity.id))
        .traced()
        .fetch_optional(&mut *self.conn)
        .await?;

        let Some(res) = res else { return Ok(None) };

        Ok(Some(res.try_into()?))
    }

    #[tracing::instrument(
        name = "db.scheduled_deletion.add",
        skip_all,
        fields(
            db.query.text,
            scheduled_deletion.id,
            %entity,
            scheduled_deletion.date_scheduled = %date_scheduled,
        ),
        err,
    )]
    async fn add(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        entity: EntityRef,
        actor_id: Option<Ulid>,
        date_scheduled: DateTime<Utc>,
    ) -> Result<Option<ScheduledDeletion>, Self::Error> {
        let date_added = clock.now();
        let id = Ulid::from_datetime_with_source(date_added.into(), rng);
        tracing::Span::current().record("scheduled_deletion.id", tracing::field::display(id));

        let res = sqlx::query(
            r#"
                INSERT INTO scheduled_deletions
                    ( scheduled_deletion_id
                    , entity_kind
                    , entity_id
                    , actor_id
                    , date_scheduled
                    , date_added
                    , in_progress
                    )
                VALUES ($1, $2, $3, $4, $5, $6, FALSE)
                ON CONFLICT (entity_kind, entity_id) DO NOTHING
            "#,
        )
        .bind(Uuid::from(id))
        .bind(entity.kind.as_str())
        .bind(Uuid::from(entity.id))
        .bind(actor_id.map(Uuid::from))
        .bind(date_scheduled)
        .bind(date_added)
        .traced()
        .execute(&mut *self.conn)
        .await?;

        if res.rows_affected() == 0 {
            tracing::debug!("A deletion is already scheduled for this entity");
            return Ok(None);
        }

        Ok(Some(ScheduledDeletion {
            id,
            entity_kind: entity.kind,
            entity_id: entity.id,
            actor_id,
            date_scheduled,
            date_added,
            in_progress: false,
        }))
    }

    #[tracing::instrument(
        name = "db.scheduled_deletion.claim_due",
        skip_all,
        fields(
            db.query.text,
            db.rows_affected,
            %now,
            limit,
        ),
        err,
    )]
    async fn claim_due(
        &mut self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<ScheduledDeletion>, Self::Error> {
        let limit = i64::try_from(limit).map_err(DatabaseError::to_invalid_operation)?;

        // The sub-select locks the candidate rows, skipping those locked by a
        // concurrent claim, and the outer condition re-checks the flag so that
        // a row is never claimed twice
        let res = sqlx::query_as::<_, ScheduledDeletionLookup>(
            r#"
                UPDATE scheduled_deletions
                SET in_progress = TRUE
                WHERE in_progress = FALSE
                  AND scheduled_deletion_id IN (
                    SELECT scheduled_deletion_id
                    FROM scheduled_deletions
                    WHERE in_progress = FALSE
                      AND date_scheduled <= $1
                    ORDER BY date_scheduled
                    LIMIT $2
                    FOR UPDATE SKIP LOCKED
                  )
                RETURNING scheduled_deletion_id
                        , entity_kind
                        , entity_id
                        , actor_id
                        , date_scheduled
                        , date_added
                        , in_progress
            "#,
        )
        .bind(now)
        .bind(limit)
        .traced()
        .fetch_all(&mut *self.conn)
        .await?;

        tracing::Span::current().record("db.rows_affected", res.len());

        let jobs = res
            .into_iter()
            .map(TryInto::try_into)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(jobs)
    }

    #[tracing::instrument(
        name = "db.scheduled_deletion.release_stale",
        skip_all,
        fields(
            db.query.text,
            db.rows_affected,
            %now,
            threshold = %threshold,
        ),
        err,
    )]
    async fn release_stale(
        &mut self,
        now: DateTime<Utc>,
        threshold: Duration,
    ) -> Result<usize, Self::Error> {
        let res = sqlx::query(
            r#"
                UPDATE scheduled_deletions
                SET in_progress = FALSE
                WHERE in_progress = TRUE
                  AND date_scheduled <= $1
            "#,
        )
        .bind(now - threshold)
        .traced()
        .execute(&mut *self.conn)
        .await?;

        Ok(rows_affected(&res))
    }

    #[tracing::instrument(
        name = "db.scheduled_deletion.delete",
        skip_all,
        fields(
            db.query.text,
            db.rows_affected,
            scheduled_deletion.id = %id,
        ),
        err,
    )]
    async fn delete(&mut self, id: Ulid) -> Result<bool, Self::Error> {
        let res = sqlx::query(
            r#"
                DELETE FROM scheduled_deletions
                WHERE scheduled_deletion_id = $1
            "#,
        )
        .bind(Uuid::from(id))
        .traced()
        .execute(&mut *self.conn)
        .await?;

        Ok(rows_deleted("scheduled_deletions", &res) > 0)
    }
}
