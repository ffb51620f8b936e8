// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use async_trait::async_trait;
use purge_data_model::{Deletable, Team};
use purge_storage::{BoxRepository, RepositoryAccess, RepositoryError};
use ulid::Ulid;

use super::{Action, CascadeError, CascadeExecutor, PostCommit, ensure_pending, step};

/// Deletes a team. Rules and alert rules owned by the team are kept, without
/// an owner.
#[derive(Debug, Clone, Copy, Default)]
pub struct TeamExecutor;

#[async_trait]
impl CascadeExecutor for TeamExecutor {
    #[tracing::instrument(name = "cascade.team", skip_all, fields(team.id = %id), err)]
    async fn execute(
        &self,
        repo: &mut BoxRepository,
        id: Ulid,
    ) -> Result<PostCommit, CascadeError> {
        let Some(team) = repo.team().lookup(id).await? else {
            tracing::info!("Team is already gone");
            return Ok(PostCommit::default());
        };

        ensure_pending(&team)?;
        cascade(repo, &team).await?;

        Ok(PostCommit::default())
    }
}

/// Delete a team and its dependents, without checking its status
pub(crate) async fn cascade(repo: &mut BoxRepository, team: &Team) -> Result<(), RepositoryError> {
    let entity = team.entity_ref();

    let count = repo.rule().detach_team(team.id).await?;
    step(entity, Action::Detach, "rules", count);

    let count = repo.team().remove_project_links_for_team(team.id).await?;
    step(entity, Action::Delete, "project_teams", count);

    repo.entity().delete(entity).await?;
    Ok(())
}
