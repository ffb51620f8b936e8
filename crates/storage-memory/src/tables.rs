// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::{Arc, Mutex, PoisonError},
};

use purge_data_model::{
    AlertRule, ApiApplication, ApiGrant, ApiToken, CodeRepository, Commit, CommitAuthor,
    EntityKind, EntityRef, EntityStatus, Environment, Event, Group, GroupAssignee, GroupHash,
    GroupMeta, GroupRedirect, GroupResolution, Organization, Project, Release, ReleaseCommit,
    ReleaseEnvironment, Rule, ScheduledDeletion, Team,
};
use ulid::Ulid;

use crate::MemoryError;

/// Every table of the backend
///
/// Link tables are sets of `(owner, project)` pairs.
#[derive(Debug, Clone, Default)]
pub(crate) struct Tables {
    pub organizations: BTreeMap<Ulid, Organization>,
    pub teams: BTreeMap<Ulid, Team>,
    pub projects: BTreeMap<Ulid, Project>,
    pub project_teams: BTreeSet<(Ulid, Ulid)>,
    pub code_repositories: BTreeMap<Ulid, CodeRepository>,
    pub commit_authors: BTreeMap<Ulid, CommitAuthor>,
    pub commits: BTreeMap<Ulid, Commit>,
    pub releases: BTreeMap<Ulid, Release>,
    pub release_projects: BTreeSet<(Ulid, Ulid)>,
    pub release_commits: BTreeMap<Ulid, ReleaseCommit>,
    pub environments: BTreeMap<Ulid, Environment>,
    pub environment_projects: BTreeSet<(Ulid, Ulid)>,
    pub release_environments: BTreeMap<Ulid, ReleaseEnvironment>,
    pub groups: BTreeMap<Ulid, Group>,
    pub group_hashes: BTreeMap<Ulid, GroupHash>,
    pub group_redirects: BTreeMap<Ulid, GroupRedirect>,
    pub group_assignees: BTreeMap<Ulid, GroupAssignee>,
    pub group_metas: BTreeMap<Ulid, GroupMeta>,
    pub group_resolutions: BTreeMap<Ulid, GroupResolution>,
    pub events: BTreeMap<(Ulid, String), Event>,
    pub rules: BTreeMap<Ulid, Rule>,
    pub alert_rules: BTreeMap<Ulid, AlertRule>,
    pub api_applications: BTreeMap<Ulid, ApiApplication>,
    pub api_grants: BTreeMap<Ulid, ApiGrant>,
    pub api_tokens: BTreeMap<Ulid, ApiToken>,
    pub scheduled_deletions: BTreeMap<Ulid, ScheduledDeletion>,
}

/// Name of the table holding the root rows of an entity kind
pub(crate) const fn entity_table(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Organization => "organizations",
        EntityKind::Team => "teams",
        EntityKind::Project => "projects",
        EntityKind::Repository => "code_repositories",
        EntityKind::Group => "error_groups",
        EntityKind::ApiApplication => "api_applications",
    }
}

impl Tables {
    /// Find a table which still references the row `id` of `table`
    fn referenced_by(&self, table: &'static str, id: Ulid) -> Option<&'static str> {
        let checks: Vec<(&'static str, bool)> = match table {
            "organizations" => vec![
                ("teams", self.teams.values().any(|r| r.organization_id == id)),
                (
                    "projects",
                    self.projects.values().any(|r| r.organization_id == id),
                ),
                (
                    "code_repositories",
                    self.code_repositories
                        .values()
                        .any(|r| r.organization_id == id),
                ),
                (
                    "commit_authors",
                    self.commit_authors.values().any(|r| r.organization_id == id),
                ),
                ("commits", self.commits.values().any(|r| r.organization_id == id)),
                (
                    "releases",
                    self.releases.values().any(|r| r.organization_id == id),
                ),
                (
                    "release_commits",
                    self.release_commits
                        .values()
                        .any(|r| r.organization_id == id),
                ),
                (
                    "environments",
                    self.environments.values().any(|r| r.organization_id == id),
                ),
                (
                    "release_environments",
                    self.release_environments
                        .values()
                        .any(|r| r.organization_id == id),
                ),
                (
                    "alert_rules",
                    self.alert_rules.values().any(|r| r.organization_id == id),
                ),
            ],
            "teams" => vec![
                (
                    "project_teams",
                    self.project_teams.iter().any(|(team, _)| *team == id),
                ),
                (
                    "rules",
                    self.rules.values().any(|r| r.owner_team_id == Some(id)),
                ),
                (
                    "alert_rules",
                    self.alert_rules
                        .values()
                        .any(|r| r.owner_team_id == Some(id)),
                ),
            ],
            "projects" => vec![
                (
                    "project_teams",
                    self.project_teams.iter().any(|(_, project)| *project == id),
                ),
                (
                    "release_projects",
                    self.release_projects
                        .iter()
                        .any(|(_, project)| *project == id),
                ),
                (
                    "environment_projects",
                    self.environment_projects
                        .iter()
                        .any(|(_, project)| *project == id),
                ),
                (
                    "error_groups",
                    self.groups.values().any(|r| r.project_id == id),
                ),
                ("rules", self.rules.values().any(|r| r.project_id == id)),
            ],
            "code_repositories" => vec![(
                "commits",
                self.commits.values().any(|r| r.repository_id == id),
            )],
            "commit_authors" => vec![(
                "commits",
                self.commits.values().any(|r| r.author_id == Some(id)),
            )],
            "commits" => vec![(
                "release_commits",
                self.release_commits.values().any(|r| r.commit_id == id),
            )],
            "releases" => vec![
                (
                    "release_projects",
                    self.release_projects
                        .iter()
                        .any(|(release, _)| *release == id),
                ),
                (
                    "release_commits",
                    self.release_commits.values().any(|r| r.release_id == id),
                ),
                (
                    "release_environments",
                    self.release_environments
                        .values()
                        .any(|r| r.release_id == id),
                ),
                (
                    "group_resolutions",
                    self.group_resolutions
                        .values()
                        .any(|r| r.release_id == id),
                ),
            ],
            "environments" => vec![
                (
                    "environment_projects",
                    self.environment_projects
                        .iter()
                        .any(|(environment, _)| *environment == id),
                ),
                (
                    "release_environments",
                    self.release_environments
                        .values()
                        .any(|r| r.environment_id == id),
                ),
            ],
            "error_groups" => vec![
                (
                    "group_hashes",
                    self.group_hashes.values().any(|r| r.group_id == id),
                ),
                (
                    "group_redirects",
                    self.group_redirects.values().any(|r| r.group_id == id),
                ),
                (
                    "group_assignees",
                    self.group_assignees.values().any(|r| r.group_id == id),
                ),
                (
                    "group_metas",
                    self.group_metas.values().any(|r| r.group_id == id),
                ),
                (
                    "group_resolutions",
                    self.group_resolutions.values().any(|r| r.group_id == id),
                ),
                ("events", self.events.values().any(|r| r.group_id == id)),
            ],
            "api_applications" => vec![
                (
                    "api_grants",
                    self.api_grants.values().any(|r| r.application_id == id),
                ),
                (
                    "api_tokens",
                    self.api_tokens.values().any(|r| r.application_id == id),
                ),
            ],
            _ => Vec::new(),
        };

        checks
            .iter()
            .find_map(|(referenced_by, found)| found.then_some(*referenced_by))
    }

    /// Fail if the row `id` of `table` is still referenced
    pub fn ensure_unreferenced(&self, table: &'static str, id: Ulid) -> Result<(), MemoryError> {
        match self.referenced_by(table, id) {
            Some(referenced_by) => Err(MemoryError::ForeignKey {
                table,
                referenced_by,
            }),
            None => Ok(()),
        }
    }

    pub fn entity_status(&self, entity: EntityRef) -> Option<EntityStatus> {
        let id = &entity.id;
        match entity.kind {
            EntityKind::Organization => self.organizations.get(id).map(|r| r.status),
            EntityKind::Team => self.teams.get(id).map(|r| r.status),
            EntityKind::Project => self.projects.get(id).map(|r| r.status),
            EntityKind::Repository => self.code_repositories.get(id).map(|r| r.status),
            EntityKind::Group => self.groups.get(id).map(|r| r.status),
            EntityKind::ApiApplication => self.api_applications.get(id).map(|r| r.status),
        }
    }

    pub fn entity_status_mut(&mut self, entity: EntityRef) -> Option<&mut EntityStatus> {
        let id = &entity.id;
        match entity.kind {
            EntityKind::Organization => self.organizations.get_mut(id).map(|r| &mut r.status),
            EntityKind::Team => self.teams.get_mut(id).map(|r| &mut r.status),
            EntityKind::Project => self.projects.get_mut(id).map(|r| &mut r.status),
            EntityKind::Repository => self.code_repositories.get_mut(id).map(|r| &mut r.status),
            EntityKind::Group => self.groups.get_mut(id).map(|r| &mut r.status),
            EntityKind::ApiApplication => self.api_applications.get_mut(id).map(|r| &mut r.status),
        }
    }

    /// Remove the root row of an entity, once nothing references it anymore
    pub fn remove_entity(&mut self, entity: EntityRef) -> Result<bool, MemoryError> {
        if self.entity_status(entity).is_none() {
            return Ok(false);
        }

        self.ensure_unreferenced(entity_table(entity.kind), entity.id)?;

        let id = &entity.id;
        let removed = match entity.kind {
            EntityKind::Organization => self.organizations.remove(id).is_some(),
            EntityKind::Team => self.teams.remove(id).is_some(),
            EntityKind::Project => self.projects.remove(id).is_some(),
            EntityKind::Repository => self.code_repositories.remove(id).is_some(),
            EntityKind::Group => self.groups.remove(id).is_some(),
            EntityKind::ApiApplication => self.api_applications.remove(id).is_some(),
        };

        Ok(removed)
    }
}

/// Removes the values matching `predicate` from a map, returning how many were
/// removed
pub(crate) fn remove_where<K: Ord, V>(
    map: &mut BTreeMap<K, V>,
    mut predicate: impl FnMut(&V) -> bool,
) -> usize {
    let before = map.len();
    map.retain(|_, value| !predicate(value));
    before - map.len()
}

/// Same as [`remove_where`] for link tables
pub(crate) fn remove_links_where(
    set: &mut BTreeSet<(Ulid, Ulid)>,
    mut predicate: impl FnMut(&(Ulid, Ulid)) -> bool,
) -> usize {
    let before = set.len();
    set.retain(|link| !predicate(link));
    before - set.len()
}

/// The set of tables on which writes currently fail
#[derive(Debug, Clone, Default)]
pub(crate) struct Faults(Arc<Mutex<BTreeSet<&'static str>>>);

impl Faults {
    pub fn insert(&self, table: &'static str) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(table);
    }

    pub fn clear(&self) {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }

    /// Fail if writes to `table` should fail
    pub fn check(&self, table: &'static str) -> Result<(), MemoryError> {
        let faults = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        if faults.contains(table) {
            tracing::debug!(table, "Injecting a write failure");
            return Err(MemoryError::Injected { table });
        }

        Ok(())
    }
}

/// Borrowed access to the tables, implementing every repository trait
pub(crate) struct TablesMut<'c> {
    pub tables: &'c mut Tables,
    pub faults: &'c Faults,
}
