// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use async_trait::async_trait;
use purge_data_model::{Deletable, Organization};
use purge_storage::{BoxRepository, RepositoryAccess, RepositoryError};
use ulid::Ulid;

use super::{
    Action, CascadeError, CascadeExecutor, PostCommit, ensure_pending, project, repository, step,
    team,
};

/// Deletes an organization and everything it owns.
///
/// Teams, projects and repositories go through their own cascade, whatever
/// their status. Every repository is deregistered from its provider once the
/// transaction is committed.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrganizationExecutor;

#[async_trait]
impl CascadeExecutor for OrganizationExecutor {
    #[tracing::instrument(
        name = "cascade.organization",
        skip_all,
        fields(organization.id = %id),
        err,
    )]
    async fn execute(
        &self,
        repo: &mut BoxRepository,
        id: Ulid,
    ) -> Result<PostCommit, CascadeError> {
        let Some(organization) = repo.organization().lookup(id).await? else {
            tracing::info!("Organization is already gone");
            return Ok(PostCommit::default());
        };

        ensure_pending(&organization)?;

        let mut post_commit = PostCommit::default();
        cascade(repo, &organization, &mut post_commit).await?;
        Ok(post_commit)
    }
}

async fn cascade(
    repo: &mut BoxRepository,
    organization: &Organization,
    post_commit: &mut PostCommit,
) -> Result<(), RepositoryError> {
    let entity = organization.entity_ref();
    let id = organization.id;

    let teams = repo.team().list_for_organization(id).await?;
    for team in &teams {
        team::cascade(repo, team).await?;
    }
    step(entity, Action::Delete, "teams", teams.len());

    let projects = repo.project().list_for_organization(id).await?;
    for project in &projects {
        project::cascade(repo, project, post_commit).await?;
    }
    step(entity, Action::Delete, "projects", projects.len());

    let count = repo
        .environment()
        .delete_releases_for_organization(id)
        .await?;
    step(entity, Action::Delete, "release_environments", count);

    let count = repo
        .environment()
        .remove_project_links_for_organization(id)
        .await?;
    step(entity, Action::Delete, "environment_projects", count);

    let count = repo.environment().delete_for_organization(id).await?;
    step(entity, Action::Delete, "environments", count);

    let count = repo.release().delete_commits_for_organization(id).await?;
    step(entity, Action::Delete, "release_commits", count);

    let count = repo
        .release()
        .remove_project_links_for_organization(id)
        .await?;
    step(entity, Action::Delete, "release_projects", count);

    let count = repo.release().delete_for_organization(id).await?;
    step(entity, Action::Delete, "releases", count);

    let count = repo.commit().delete_for_organization(id).await?;
    step(entity, Action::Delete, "commits", count);

    let count = repo.commit().delete_authors_for_organization(id).await?;
    step(entity, Action::Delete, "commit_authors", count);

    let repositories = repo.code_repository().list_for_organization(id).await?;
    let count = repositories.len();
    for repository in repositories {
        repository::cascade(repo, repository, post_commit).await?;
    }
    step(entity, Action::Delete, "code_repositories", count);

    let count = repo
        .rule()
        .delete_alert_rules_for_organization(id)
        .await?;
    step(entity, Action::Delete, "alert_rules", count);

    repo.entity().delete(entity).await?;
    Ok(())
}
