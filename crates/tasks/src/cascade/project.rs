// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use async_trait::async_trait;
use purge_data_model::{Deletable, Project};
use purge_storage::{BoxRepository, RepositoryAccess, RepositoryError};
use ulid::Ulid;

use super::{Action, CascadeError, CascadeExecutor, PostCommit, ensure_pending, group, step};

/// Deletes a project, its rules and its groups.
///
/// Environments, releases and release commits are shared with the rest of the
/// organization: only their links to the project are removed.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProjectExecutor;

#[async_trait]
impl CascadeExecutor for ProjectExecutor {
    #[tracing::instrument(name = "cascade.project", skip_all, fields(project.id = %id), err)]
    async fn execute(
        &self,
        repo: &mut BoxRepository,
        id: Ulid,
    ) -> Result<PostCommit, CascadeError> {
        let Some(project) = repo.project().lookup(id).await? else {
            tracing::info!("Project is already gone");
            return Ok(PostCommit::default());
        };

        ensure_pending(&project)?;

        let mut post_commit = PostCommit::default();
        cascade(repo, &project, &mut post_commit).await?;
        Ok(post_commit)
    }
}

/// Delete a project and its dependents, without checking its status
pub(crate) async fn cascade(
    repo: &mut BoxRepository,
    project: &Project,
    post_commit: &mut PostCommit,
) -> Result<(), RepositoryError> {
    let entity = project.entity_ref();

    let count = repo
        .team()
        .remove_project_links_for_project(project.id)
        .await?;
    step(entity, Action::Delete, "project_teams", count);

    let count = repo.rule().delete_for_project(project.id).await?;
    step(entity, Action::Delete, "rules", count);

    let count = repo
        .release()
        .remove_project_links_for_project(project.id)
        .await?;
    step(entity, Action::Delete, "release_projects", count);

    let count = repo
        .environment()
        .remove_project_links_for_project(project.id)
        .await?;
    step(entity, Action::Delete, "environment_projects", count);

    let groups = repo.group().list_for_project(project.id).await?;
    for group in &groups {
        group::cascade(repo, group, post_commit).await?;
    }
    step(entity, Action::Delete, "error_groups", groups.len());

    repo.entity().delete(entity).await?;
    Ok(())
}
