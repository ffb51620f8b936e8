// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use async_trait::async_trait;
use purge_data_model::Deletable;
use purge_storage::{BoxRepository, RepositoryAccess};
use ulid::Ulid;

use super::{Action, CascadeError, CascadeExecutor, PostCommit, ensure_pending, step};

/// Deletes an API application, with all the grants and tokens issued for it
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiApplicationExecutor;

#[async_trait]
impl CascadeExecutor for ApiApplicationExecutor {
    #[tracing::instrument(
        name = "cascade.api_application",
        skip_all,
        fields(api_application.id = %id),
        err,
    )]
    async fn execute(
        &self,
        repo: &mut BoxRepository,
        id: Ulid,
    ) -> Result<PostCommit, CascadeError> {
        let Some(application) = repo.api_application().lookup(id).await? else {
            tracing::info!("API application is already gone");
            return Ok(PostCommit::default());
        };

        ensure_pending(&application)?;
        let entity = application.entity_ref();

        let count = repo.api_grant().delete_for_application(id).await?;
        step(entity, Action::Delete, "api_grants", count);

        let count = repo.api_token().delete_for_application(id, None).await?;
        step(entity, Action::Delete, "api_tokens", count);

        repo.entity().delete(entity).await?;
        Ok(PostCommit::default())
    }
}
