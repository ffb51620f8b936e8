// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use async_trait::async_trait;
use purge_data_model::{EntityKind, EntityRef};
use purge_storage::{BoxRepository, RepositoryAccess};
use ulid::Ulid;

use super::{CascadeError, CascadeExecutor, PostCommit};

/// Deletes the entity row alone, if it is pending deletion.
///
/// This fails if other rows still reference the entity.
#[derive(Debug, Clone, Copy)]
pub struct GenericExecutor {
    kind: EntityKind,
}

impl GenericExecutor {
    /// Create a [`GenericExecutor`] for the given kind of entity
    #[must_use]
    pub const fn new(kind: EntityKind) -> Self {
        Self { kind }
    }
}

#[async_trait]
impl CascadeExecutor for GenericExecutor {
    #[tracing::instrument(
        name = "cascade.generic",
        skip_all,
        fields(entity.kind = %self.kind, entity.id = %id),
        err,
    )]
    async fn execute(
        &self,
        repo: &mut BoxRepository,
        id: Ulid,
    ) -> Result<PostCommit, CascadeError> {
        let entity = EntityRef::new(self.kind, id);

        let Some(status) = repo.entity().lookup_status(entity).await? else {
            tracing::info!("Entity is already gone");
            return Ok(PostCommit::default());
        };

        if !status.is_pending_deletion() {
            return Err(CascadeError::Aborted { entity, status });
        }

        repo.entity().delete(entity).await?;
        Ok(PostCommit::default())
    }
}
