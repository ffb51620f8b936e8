// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

//! A module containing the PostgreSQL implementation of the
//! [`RuleRepository`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use purge_data_model::{AlertRule, Clock, Organization, Project, Rule, Team};
use purge_storage::rule::RuleRepository;
use rand_core::RngCore;
use sqlx::PgConnection;
use ulid::Ulid;
use uuid::Uuid;

use crate::{
    DatabaseError, ExecuteExt,
    tracing::{rows_affected, rows_deleted},
};

/// An implementation of [`RuleRepository`] for a PostgreSQL connection
pub struct PgRuleRepository<'c> {
    conn: &'c mut PgConnection,
}

impl<'c> PgRuleRepository<'c> {
    /// Create a new [`PgRuleRepository`] from an active PostgreSQL connection
    pub fn new(conn: &'c mut PgConnection) -> Self {
        Self { conn }
    }
}

#[derive(sqlx::FromRow)]
struct RuleLookup {
    rule_id: Uuid,
    project_id: Uuid,
    label: String,
    owner_team_id: Option<Uuid>,
    created_at: DateTime<Utc>,
}

impl From<RuleLookup> for Rule {
    fn from(value: RuleLookup) -> Self {
        Rule {
            id: value.rule_id.into(),
            project_id: value.project_id.into(),
            label: value.label,
            owner_team_id: value.owner_team_id.map(Ulid::from),
            created_at: value.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct AlertRuleLookup {
    alert_rule_id: Uuid,
    organization_id: Uuid,
    name: String,
    owner_team_id: Option<Uuid>,
    created_at: DateTime<Utc>,
}

impl From<AlertRuleLookup> for AlertRule {
    fn from(value: AlertRuleLookup) -> Self {
        AlertRule {
            id: value.alert_rule_id.into(),
            organization_id: value.organization_id.into(),
            name: value.name,
            owner_team_id: value.owner_team_id.map(Ulid::from),
            created_at: value.created_at,
        }
    }
}

#[async_trait]
impl RuleRepository for PgRuleRepository<'_> {
    type Error = DatabaseError;

    #[tracing::instrument(
        name = "db.rule.lookup",
        skip_all,
        fields(
            db.query.text,
            rule.id = %id,
        ),
        err,
    )]
    async fn lookup(&mut self, id: Ulid) -> Result<Option<Rule>, Self::Error> {
        let res = sqlx::query_as::<_, RuleLookup>(
            r#"
                SELECT rule_id
                     , project_id
                     , label
                     , owner_team_id
                     , created_at
                FROM rules
                WHERE rule_id = $1
            "#,
        )
        .bind(Uuid::from(id))
        .traced()
        .fetch_optional(&mut *self.conn)
        .await?;

        Ok(res.map(Into::into))
    }

    #[tracing::instrument(
        name = "db.rule.add",
        skip_all,
        fields(
            db.query.text,
            rule.id,
            rule.label = %label,
            %project.id,
        ),
        err,
    )]
    async fn add(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        project: &Project,
        label: String,
        owner: Option<&Team>,
    ) -> Result<Rule, Self::Error> {
        let created_at = clock.now();
        let id = Ulid::from_datetime_with_source(created_at.into(), rng);
        tracing::Span::current().record("rule.id", tracing::field::display(id));

        let owner_team_id = owner.map(|team| team.id);

        sqlx::query(
            r#"
                INSERT INTO rules (rule_id, project_id, label, owner_team_id, created_at)
                VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(Uuid::from(id))
        .bind(Uuid::from(project.id))
        .bind(&label)
        .bind(owner_team_id.map(Uuid::from))
        .bind(created_at)
        .traced()
        .execute(&mut *self.conn)
        .await?;

        Ok(Rule {
            id,
            project_id: project.id,
            label,
            owner_team_id,
            created_at,
        })
    }

    #[tracing::instrument(
        name = "db.rule.lookup_alert_rule",
        skip_all,
        fields(
            db.query.text,
            alert_rule.id = %id,
        ),
        err,
    )]
    async fn lookup_alert_rule(&mut self, id: Ulid) -> Result<Option<AlertRule>, Self::Error> {
        let res = sqlx::query_as::<_, AlertRuleLookup>(
            r#"
                SELECT alert_rule_id
                     , organization_id
                     , name
                     , owner_team_id
                     , created_at
                FROM alert_rules
                WHERE alert_rule_id = $1
            "#,
        )
        .bind(Uuid::from(id))
        .traced()
        .fetch_optional(&mut *self.conn)
        .await?;

        Ok(res.map(Into::into))
    }

    #[tracing::instrument(
        name = "db.rule.add_alert_rule",
        skip_all,
        fields(
            db.query.text,
            alert_rule.id,
            alert_rule.name = %name,
            %organization.id,
        ),
        err,
    )]
    async fn add_alert_rule(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        organization: &Organization,
        name: String,
        owner: Option<&Team>,
    ) -> Result<AlertRule, Self::Error> {
        let created_at = clock.now();
        let id = Ulid::from_datetime_with_source(created_at.into(), rng);
        tracing::Span::current().record("alert_rule.id", tracing::field::display(id));

        let owner_team_id = owner.map(|team| team.id);

        sqlx::query(
            r#"
                INSERT INTO alert_rules
                    ( alert_rule_id
                    , organization_id
                    , name
                    , owner_team_id
                    , created_at
                    )
                VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(Uuid::from(id))
        .bind(Uuid::from(organization.id))
        .bind(&name)
        .bind(owner_team_id.map(Uuid::from))
        .bind(created_at)
        .traced()
        .execute(&mut *self.conn)
        .await?;

        Ok(AlertRule {
            id,
            organization_id: organization.id,
            name,
            owner_team_id,
            created_at,
        })
    }

    #[tracing::instrument(
        name = "db.rule.detach_team",
        skip_all,
        fields(
            db.query.text,
            db.rows_affected,
            team.id = %team_id,
        ),
        err,
    )]
    async fn detach_team(&mut self, team_id: Ulid) -> Result<usize, Self::Error> {
        let rules = sqlx::query(
            r#"
                UPDATE rules
                SET owner_team_id = NULL
                WHERE owner_team_id = $1
            "#,
        )
        .bind(Uuid::from(team_id))
        .traced()
        .execute(&mut *self.conn)
        .await?;

        let alert_rules = sqlx::query(
            r#"
                UPDATE alert_rules
                SET owner_team_id = NULL
                WHERE owner_team_id = $1
            "#,
        )
        .bind(Uuid::from(team_id))
        .traced()
        .execute(&mut *self.conn)
        .await?;

        let detached = rows_affected(&rules) + rows_affected(&alert_rules);
        tracing::Span::current().record("db.rows_affected", detached);

        Ok(detached)
    }

    #[tracing::instrument(
        name = "db.rule.delete_for_project",
        skip_all,
        fields(
            db.query.text,
            db.rows_affected,
            project.id = %project_id,
        ),
        err,
    )]
    async fn delete_for_project(&mut self, project_id: Ulid) -> Result<usize, Self::Error> {
        let res = sqlx::query(
            r#"
                DELETE FROM rules
                WHERE project_id = $1
            "#,
        )
        .bind(Uuid::from(project_id))
        .traced()
        .execute(&mut *self.conn)
        .await?;

        Ok(rows_deleted("rules", &res))
    }

    #[tracing::instrument(
        name = "db.rule.delete_alert_rules_for_organization",
        skip_all,
        fields(
            db.query.text,
            db.rows_affected,
            organization.id = %organization_id,
        ),
        err,
    )]
    async fn delete_alert_rules_for_organization(
        &mut self,
        organization_id: Ulid,
    ) -> Result<usize, Self::Error> {
        let res = sqlx::query(
            r#"
                DELETE FROM alert_rules
                WHERE organization_id = $1
            "#,
        )
        .bind(Uuid::from(organization_id))
        .traced()
        .execute(&mut *self.conn)
        .await?;

        Ok(rows_deleted("alert_rules", &res))
    }
}
