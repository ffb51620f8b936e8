// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

//! PostgreSQL implementations of the group and event repositories

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use purge_data_model::{
    Clock, EntityStatus, Event, Group, GroupAssignee, GroupDependents, GroupHash, GroupMeta,
    GroupRedirect, GroupResolution, Project, Release,
};
use purge_storage::group::{EventRepository, GroupRepository};
use rand_core::RngCore;
use sqlx::PgConnection;
use ulid::Ulid;
use uuid::Uuid;

use crate::{
    DatabaseError, DatabaseInconsistencyError, ExecuteExt, parse_status, tracing::rows_deleted,
};

/// An implementation of [`GroupRepository`] for a PostgreSQL connection
pub struct PgGroupRepository<'c> {
    conn: &'c mut PgConnection,
}

impl<'c> PgGroupRepository<'c> {
    /// Create a new [`PgGroupRepository`] from an active PostgreSQL
    /// connection
    pub fn new(conn: &'c mut PgConnection) -> Self {
        Self { conn }
    }

    async fn delete_dependent(
        &mut self,
        table: &'static str,
        group_id: Ulid,
    ) -> Result<usize, DatabaseError> {
        // `table` only ever comes from the fixed list below
        let res = sqlx::query(&format!("DELETE FROM {table} WHERE group_id = $1"))
            .bind(Uuid::from(group_id))
            .traced()
            .execute(&mut *self.conn)
            .await?;

        Ok(rows_deleted(table, &res))
    }
}

#[derive(sqlx::FromRow)]
struct GroupLookup {
    group_id: Uuid,
    project_id: Uuid,
    status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<GroupLookup> for Group {
    type Error = DatabaseInconsistencyError;

    fn try_from(value: GroupLookup) -> Result<Self, Self::Error> {
        let id = value.group_id.into();
        Ok(Group {
            id,
            project_id: value.project_id.into(),
            status: parse_status("error_groups", id, &value.status)?,
            created_at: value.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct GroupDependentsLookup {
    hashes: i64,
    redirects: i64,
    assignees: i64,
    metas: i64,
    resolutions: i64,
}

impl TryFrom<GroupDependentsLookup> for GroupDependents {
    type Error = std::num::TryFromIntError;

    fn try_from(value: GroupDependentsLookup) -> Result<Self, Self::Error> {
        Ok(GroupDependents {
            hashes: value.hashes.try_into()?,
            redirects: value.redirects.try_into()?,
            assignees: value.assignees.try_into()?,
            metas: value.metas.try_into()?,
            resolutions: value.resolutions.try_into()?,
        })
    }
}

#[async_trait]
impl GroupRepository for PgGroupRepository<'_> {
    type Error = DatabaseError;

    #[tracing::instrument(
        name = "db.group.lookup",
        skip_all,
        fields(
            db.query.text,
            group.id = %id,
        ),
        err,
    )]
    async fn lookup(&mut self, id: Ulid) -> Result<Option<Group>, Self::Error> {
        let res = sqlx::query_as::<_, GroupLookup>(
            r#"
                SELECT group_id
                     , project_id
                     , status
                     , created_at
                FROM error_groups
                WHERE group_id = $1
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
        name = "db.group.add",
        skip_all,
        fields(
            db.query.text,
            group.id,
            %project.id,
        ),
        err,
    )]
    async fn add(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        project: &Project,
        status: EntityStatus,
    ) -> Result<Group, Self::Error> {
        let created_at = clock.now();
        let id = Ulid::from_datetime_with_source(created_at.into(), rng);
        tracing::Span::current().record("group.id", tracing::field::display(id));

        sqlx::query(
            r#"
                INSERT INTO error_groups (group_id, project_id, status, created_at)
                VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(Uuid::from(id))
        .bind(Uuid::from(project.id))
        .bind(status.as_str())
        .bind(created_at)
        .traced()
        .execute(&mut *self.conn)
        .await?;

        Ok(Group {
            id,
            project_id: project.id,
            status,
            created_at,
        })
    }

    #[tracing::instrument(
        name = "db.group.list_for_project",
        skip_all,
        fields(
            db.query.text,
            project.id = %project_id,
        ),
        err,
    )]
    async fn list_for_project(&mut self, project_id: Ulid) -> Result<Vec<Group>, Self::Error> {
        let res = sqlx::query_as::<_, GroupLookup>(
            r#"
                SELECT group_id
                     , project_id
                     , status
                     , created_at
                FROM error_groups
                WHERE project_id = $1
                ORDER BY group_id
            "#,
        )
        .bind(Uuid::from(project_id))
        .traced()
        .fetch_all(&mut *self.conn)
        .await?;

        let groups = res
            .into_iter()
            .map(TryInto::try_into)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(groups)
    }

    #[tracing::instrument(
        name = "db.group.add_hash",
        skip_all,
        fields(
            db.query.text,
            group_hash.id,
            %group.id,
        ),
        err,
    )]
    async fn add_hash(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        group: &Group,
        hash: String,
    ) -> Result<GroupHash, Self::Error> {
        let id = Ulid::from_datetime_with_source(clock.now().into(), rng);
        tracing::Span::current().record("group_hash.id", tracing::field::display(id));

        sqlx::query(
            r#"
                INSERT INTO group_hashes (group_hash_id, project_id, group_id, hash)
                VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(Uuid::from(id))
        .bind(Uuid::from(group.project_id))
        .bind(Uuid::from(group.id))
        .bind(&hash)
        .traced()
        .execute(&mut *self.conn)
        .await?;

        Ok(GroupHash {
            id,
            project_id: group.project_id,
            group_id: group.id,
            hash,
        })
    }

    #[tracing::instrument(
        name = "db.group.add_redirect",
        skip_all,
        fields(
            db.query.text,
            group_redirect.id,
            %group.id,
            group_redirect.previous_group_id = %previous_group_id,
        ),
        err,
    )]
    async fn add_redirect(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        group: &Group,
        previous_group_id: Ulid,
    ) -> Result<GroupRedirect, Self::Error> {
        let id = Ulid::from_datetime_with_source(clock.now().into(), rng);
        tracing::Span::current().record("group_redirect.id", tracing::field::display(id));

        sqlx::query(
            r#"
                INSERT INTO group_redirects (group_redirect_id, group_id, previous_group_id)
                VALUES ($1, $2, $3)
            "#,
        )
        .bind(Uuid::from(id))
        .bind(Uuid::from(group.id))
        .bind(Uuid::from(previous_group_id))
        .traced()
        .execute(&mut *self.conn)
        .await?;

        Ok(GroupRedirect {
            id,
            group_id: group.id,
            previous_group_id,
        })
    }

    #[tracing::instrument(
        name = "db.group.add_assignee",
        skip_all,
        fields(
            db.query.text,
            group_assignee.id,
            %group.id,
            user.id = %user_id,
        ),
        err,
    )]
    async fn add_assignee(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        group: &Group,
        user_id: Ulid,
    ) -> Result<GroupAssignee, Self::Error> {
        let id = Ulid::from_datetime_with_source(clock.now().into(), rng);
        tracing::Span::current().record("group_assignee.id", tracing::field::display(id));

        sqlx::query(
            r#"
                INSERT INTO group_assignees (group_assignee_id, group_id, project_id, user_id)
                VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(Uuid::from(id))
        .bind(Uuid::from(group.id))
        .bind(Uuid::from(group.project_id))
        .bind(Uuid::from(user_id))
        .traced()
        .execute(&mut *self.conn)
        .await?;

        Ok(GroupAssignee {
            id,
            group_id: group.id,
            project_id: group.project_id,
            user_id,
        })
    }

    #[tracing::instrument(
        name = "db.group.add_meta",
        skip_all,
        fields(
            db.query.text,
            group_meta.id,
            group_meta.key = %key,
            %group.id,
        ),
        err,
    )]
    async fn add_meta(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        group: &Group,
        key: String,
        value: String,
    ) -> Result<GroupMeta, Self::Error> {
        let id = Ulid::from_datetime_with_source(clock.now().into(), rng);
        tracing::Span::current().record("group_meta.id", tracing::field::display(id));

        sqlx::query(
            r#"
                INSERT INTO group_metas (group_meta_id, group_id, key, value)
                VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(Uuid::from(id))
        .bind(Uuid::from(group.id))
        .bind(&key)
        .bind(&value)
        .traced()
        .execute(&mut *self.conn)
        .await?;

        Ok(GroupMeta {
            id,
            group_id: group.id,
            key,
            value,
        })
    }

    #[tracing::instrument(
        name = "db.group.add_resolution",
        skip_all,
        fields(
            db.query.text,
            group_resolution.id,
            %group.id,
            %release.id,
        ),
        err,
    )]
    async fn add_resolution(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        group: &Group,
        release: &Release,
    ) -> Result<GroupResolution, Self::Error> {
        let id = Ulid::from_datetime_with_source(clock.now().into(), rng);
        tracing::Span::current().record("group_resolution.id", tracing::field::display(id));

        sqlx::query(
            r#"
                INSERT INTO group_resolutions (group_resolution_id, group_id, release_id)
                VALUES ($1, $2, $3)
            "#,
        )
        .bind(Uuid::from(id))
        .bind(Uuid::from(group.id))
        .bind(Uuid::from(release.id))
        .traced()
        .execute(&mut *self.conn)
        .await?;

        Ok(GroupResolution {
            id,
            group_id: group.id,
            release_id: release.id,
        })
    }

    #[tracing::instrument(
        name = "db.group.dependents",
        skip_all,
        fields(
            db.query.text,
            group.id = %group_id,
        ),
        err,
    )]
    async fn dependents(&mut self, group_id: Ulid) -> Result<GroupDependents, Self::Error> {
        let res = sqlx::query_as::<_, GroupDependentsLookup>(
            r#"
                SELECT (SELECT COUNT(*) FROM group_hashes WHERE group_id = $1) AS hashes
                     , (SELECT COUNT(*) FROM group_redirects WHERE group_id = $1) AS redirects
                     , (SELECT COUNT(*) FROM group_assignees WHERE group_id = $1) AS assignees
                     , (SELECT COUNT(*) FROM group_metas WHERE group_id = $1) AS metas
                     , (SELECT COUNT(*) FROM group_resolutions WHERE group_id = $1) AS resolutions
            "#,
        )
        .bind(Uuid::from(group_id))
        .traced()
        .fetch_one(&mut *self.conn)
        .await?;

        res.try_into().map_err(DatabaseError::to_invalid_operation)
    }

    #[tracing::instrument(
        name = "db.group.delete_hashes",
        skip_all,
        fields(db.query.text, db.rows_affected, group.id = %group_id),
        err,
    )]
    async fn delete_hashes(&mut self, group_id: Ulid) -> Result<usize, Self::Error> {
        self.delete_dependent("group_hashes", group_id).await
    }

    #[tracing::instrument(
        name = "db.group.delete_redirects",
        skip_all,
        fields(db.query.text, db.rows_affected, group.id = %group_id),
        err,
    )]
    async fn delete_redirects(&mut self, group_id: Ulid) -> Result<usize, Self::Error> {
        self.delete_dependent("group_redirects", group_id).await
    }

    #[tracing::instrument(
        name = "db.group.delete_assignees",
        skip_all,
        fields(db.query.text, db.rows_affected, group.id = %group_id),
        err,
    )]
    async fn delete_assignees(&mut self, group_id: Ulid) -> Result<usize, Self::Error> {
        self.delete_dependent("group_assignees", group_id).await
    }

    #[tracing::instrument(
        name = "db.group.delete_metas",
        skip_all,
        fields(db.query.text, db.rows_affected, group.id = %group_id),
        err,
    )]
    async fn delete_metas(&mut self, group_id: Ulid) -> Result<usize, Self::Error> {
        self.delete_dependent("group_metas", group_id).await
    }

    #[tracing::instrument(
        name = "db.group.delete_resolutions",
        skip_all,
        fields(db.query.text, db.rows_affected, group.id = %group_id),
        err,
    )]
    async fn delete_resolutions(&mut self, group_id: Ulid) -> Result<usize, Self::Error> {
        self.delete_dependent("group_resolutions", group_id).await
    }
}

/// An implementation of [`EventRepository`] for a PostgreSQL connection
pub struct PgEventRepository<'c> {
    conn: &'c mut PgConnection,
}

impl<'c> PgEventRepository<'c> {
    /// Create a new [`PgEventRepository`] from an active PostgreSQL
    /// connection
    pub fn new(conn: &'c mut PgConnection) -> Self {
        Self { conn }
    }
}

#[derive(sqlx::FromRow)]
struct EventLookup {
    project_id: Uuid,
    event_id: String,
    group_id: Uuid,
    created_at: DateTime<Utc>,
}

impl From<EventLookup> for Event {
    fn from(value: EventLookup) -> Self {
        Event {
            project_id: value.project_id.into(),
            event_id: value.event_id,
            group_id: value.group_id.into(),
            created_at: value.created_at,
        }
    }
}

#[async_trait]
impl EventRepository for PgEventRepository<'_> {
    type Error = DatabaseError;

    #[tracing::instrument(
        name = "db.event.add",
        skip_all,
        fields(
            db.query.text,
            event.id = %event_id,
            %group.id,
        ),
        err,
    )]
    async fn add(
        &mut self,
        clock: &dyn Clock,
        group: &Group,
        event_id: String,
    ) -> Result<Event, Self::Error> {
        let created_at = clock.now();

        sqlx::query(
            r#"
                INSERT INTO events (project_id, event_id, group_id, created_at)
                VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(Uuid::from(group.project_id))
        .bind(&event_id)
        .bind(Uuid::from(group.id))
        .bind(created_at)
        .traced()
        .execute(&mut *self.conn)
        .await?;

        Ok(Event {
            project_id: group.project_id,
            event_id,
            group_id: group.id,
            created_at,
        })
    }

    #[tracing::instrument(
        name = "db.event.list_for_group",
        skip_all,
        fields(
            db.query.text,
            group.id = %group_id,
        ),
        err,
    )]
    async fn list_for_group(&mut self, group_id: Ulid) -> Result<Vec<Event>, Self::Error> {
        let res = sqlx::query_as::<_, EventLookup>(
            r#"
                SELECT project_id
                     , event_id
                     , group_id
                     , created_at
                FROM events
                WHERE group_id = $1
                ORDER BY created_at, event_id
            "#,
        )
        .bind(Uuid::from(group_id))
        .traced()
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(res.into_iter().map(Into::into).collect())
    }

    #[tracing::instrument(
        name = "db.event.delete_for_group",
        skip_all,
        fields(
            db.query.text,
            db.rows_affected,
            group.id = %group_id,
        ),
        err,
    )]
    async fn delete_for_group(&mut self, group_id: Ulid) -> Result<usize, Self::Error> {
        let res = sqlx::query(
            r#"
                DELETE FROM events
                WHERE group_id = $1
            "#,
        )
        .bind(Uuid::from(group_id))
        .traced()
        .execute(&mut *self.conn)
        .await?;

        Ok(rows_deleted("events", &res))
    }
}
