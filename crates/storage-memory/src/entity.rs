// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use async_trait::async_trait;
use purge_data_model::{EntityRef, EntityStatus};
use purge_storage::entity::EntityRepository;

use crate::{
    MemoryError,
    tables::{TablesMut, entity_table},
};

#[async_trait]
impl EntityRepository for TablesMut<'_> {
    type Error = MemoryError;

    async fn lookup_status(
        &mut self,
        entity: EntityRef,
    ) -> Result<Option<EntityStatus>, Self::Error> {
        Ok(self.tables.entity_status(entity))
    }

    async fn set_status(
        &mut self,
        entity: EntityRef,
        status: EntityStatus,
    ) -> Result<bool, Self::Error> {
        self.faults.check(entity_table(entity.kind))?;

        let Some(current) = self.tables.entity_status_mut(entity) else {
            return Ok(false);
        };

        *current = status;
        Ok(true)
    }

    async fn delete(&mut self, entity: EntityRef) -> Result<bool, Self::Error> {
        self.faults.check(entity_table(entity.kind))?;
        self.tables.remove_entity(entity)
    }
}
