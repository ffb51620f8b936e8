// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use async_trait::async_trait;
use purge_data_model::{CodeRepository, Deletable};
use purge_storage::{BoxRepository, RepositoryAccess, RepositoryError};
use ulid::Ulid;

use super::{Action, CascadeError, CascadeExecutor, PostCommit, ensure_pending, step};

/// Deletes a code repository and its commits. Commits of other repositories
/// are never touched, even when they share the same key.
///
/// Once committed, the repository is deregistered from its version-control
/// provider.
#[derive(Debug, Clone, Copy, Default)]
pub struct RepositoryExecutor;

#[async_trait]
impl CascadeExecutor for RepositoryExecutor {
    #[tracing::instrument(name = "cascade.repository", skip_all, fields(repository.id = %id), err)]
    async fn execute(
        &self,
        repo: &mut BoxRepository,
        id: Ulid,
    ) -> Result<PostCommit, CascadeError> {
        let Some(repository) = repo.code_repository().lookup(id).await? else {
            tracing::info!("Repository is already gone");
            return Ok(PostCommit::default());
        };

        ensure_pending(&repository)?;

        let mut post_commit = PostCommit::default();
        cascade(repo, repository, &mut post_commit).await?;
        Ok(post_commit)
    }
}

/// Delete a repository and its commits, without checking its status
pub(crate) async fn cascade(
    repo: &mut BoxRepository,
    repository: CodeRepository,
    post_commit: &mut PostCommit,
) -> Result<(), RepositoryError> {
    let entity = repository.entity_ref();

    let count = repo
        .release()
        .delete_commits_for_repository(repository.id)
        .await?;
    step(entity, Action::Delete, "release_commits", count);

    let count = repo.commit().delete_for_repository(repository.id).await?;
    step(entity, Action::Delete, "commits", count);

    repo.entity().delete(entity).await?;
    post_commit.deregister(repository);
    Ok(())
}
