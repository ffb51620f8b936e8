// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use async_trait::async_trait;
use purge_data_model::{Deletable, Group};
use purge_storage::{BoxRepository, RepositoryAccess, RepositoryError};
use ulid::Ulid;

use super::{Action, CascadeError, CascadeExecutor, PostCommit, ensure_pending, step};

/// Deletes an error group, its dependent rows and its events.
///
/// The event payloads are deleted from the node store after the commit.
#[derive(Debug, Clone, Copy, Default)]
pub struct GroupExecutor;

#[async_trait]
impl CascadeExecutor for GroupExecutor {
    #[tracing::instrument(name = "cascade.group", skip_all, fields(group.id = %id), err)]
    async fn execute(
        &self,
        repo: &mut BoxRepository,
        id: Ulid,
    ) -> Result<PostCommit, CascadeError> {
        delete_groups(repo, &[id]).await
    }
}

/// Delete a batch of groups in one go.
///
/// Groups which do not exist are skipped.
///
/// # Errors
///
/// Returns [`CascadeError::Aborted`] without deleting anything if one of the
/// groups is not pending deletion.
pub async fn delete_groups(
    repo: &mut BoxRepository,
    ids: &[Ulid],
) -> Result<PostCommit, CascadeError> {
    let mut groups = Vec::with_capacity(ids.len());
    for id in ids {
        match repo.group().lookup(*id).await? {
            Some(group) => {
                ensure_pending(&group)?;
                groups.push(group);
            }
            None => tracing::info!(group.id = %id, "Group is already gone"),
        }
    }

    let mut post_commit = PostCommit::default();
    for group in &groups {
        cascade(repo, group, &mut post_commit).await?;
    }

    Ok(post_commit)
}

/// Delete a group and its dependents, without checking its status
pub(crate) async fn cascade(
    repo: &mut BoxRepository,
    group: &Group,
    post_commit: &mut PostCommit,
) -> Result<(), RepositoryError> {
    let entity = group.entity_ref();

    let count = repo.group().delete_hashes(group.id).await?;
    step(entity, Action::Delete, "group_hashes", count);

    let count = repo.group().delete_redirects(group.id).await?;
    step(entity, Action::Delete, "group_redirects", count);

    let count = repo.group().delete_assignees(group.id).await?;
    step(entity, Action::Delete, "group_assignees", count);

    let count = repo.group().delete_metas(group.id).await?;
    step(entity, Action::Delete, "group_metas", count);

    let count = repo.group().delete_resolutions(group.id).await?;
    step(entity, Action::Delete, "group_resolutions", count);

    let events = repo.event().list_for_group(group.id).await?;
    for event in &events {
        post_commit.delete_node(event.node_id());
    }

    let count = repo.event().delete_for_group(group.id).await?;
    step(entity, Action::Delete, "events", count);

    repo.entity().delete(entity).await?;
    Ok(())
}
