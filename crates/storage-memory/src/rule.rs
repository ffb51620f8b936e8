// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use async_trait::async_trait;
use purge_data_model::{AlertRule, Clock, Organization, Project, Rule, Team};
use purge_storage::rule::RuleRepository;
use rand_core::RngCore;
use ulid::Ulid;

use crate::{
    MemoryError,
    tables::{TablesMut, remove_where},
};

#[async_trait]
impl RuleRepository for TablesMut<'_> {
    type Error = MemoryError;

    async fn lookup(&mut self, id: Ulid) -> Result<Option<Rule>, Self::Error> {
        Ok(self.tables.rules.get(&id).cloned())
    }

    async fn add(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        project: &Project,
        label: String,
        owner: Option<&Team>,
    ) -> Result<Rule, Self::Error> {
        self.faults.check("rules")?;

        let created_at = clock.now();
        let rule = Rule {
            id: Ulid::from_datetime_with_source(created_at.into(), rng),
            project_id: project.id,
            label,
            owner_team_id: owner.map(|team| team.id),
            created_at,
        };

        self.tables.rules.insert(rule.id, rule.clone());
        Ok(rule)
    }

    async fn lookup_alert_rule(&mut self, id: Ulid) -> Result<Option<AlertRule>, Self::Error> {
        Ok(self.tables.alert_rules.get(&id).cloned())
    }

    async fn add_alert_rule(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        organization: &Organization,
        name: String,
        owner: Option<&Team>,
    ) -> Result<AlertRule, Self::Error> {
        self.faults.check("alert_rules")?;

        let created_at = clock.now();
        let alert_rule = AlertRule {
            id: Ulid::from_datetime_with_source(created_at.into(), rng),
            organization_id: organization.id,
            name,
            owner_team_id: owner.map(|team| team.id),
            created_at,
        };

        self.tables
            .alert_rules
            .insert(alert_rule.id, alert_rule.clone());
        Ok(alert_rule)
    }

    async fn detach_team(&mut self, team_id: Ulid) -> Result<usize, Self::Error> {
        self.faults.check("rules")?;
        self.faults.check("alert_rules")?;

        let mut detached = 0;

        for rule in self.tables.rules.values_mut() {
            if rule.owner_team_id == Some(team_id) {
                rule.owner_team_id = None;
                detached += 1;
            }
        }

        for alert_rule in self.tables.alert_rules.values_mut() {
            if alert_rule.owner_team_id == Some(team_id) {
                alert_rule.owner_team_id = None;
                detached += 1;
            }
        }

        Ok(detached)
    }

    async fn delete_for_project(&mut self, project_id: Ulid) -> Result<usize, Self::Error> {
        self.faults.check("rules")?;
        Ok(remove_where(&mut self.tables.rules, |rule| {
            rule.project_id == project_id
        }))
    }

    async fn delete_alert_rules_for_organization(
        &mut self,
        organization_id: Ulid,
    ) -> Result<usize, Self::Error> {
        self.faults.check("alert_rules")?;
        Ok(remove_where(&mut self.tables.alert_rules, |alert_rule| {
            alert_rule.organization_id == organization_id
        }))
    }
}
