// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use purge_data_model::{ApiApplication, ApiGrant, ApiToken, Clock, EntityStatus};
use purge_storage::api::{ApiApplicationRepository, ApiGrantRepository, ApiTokenRepository};
use rand_core::RngCore;
use ulid::Ulid;

use crate::{
    MemoryError,
    tables::{TablesMut, remove_where},
};

#[async_trait]
impl ApiApplicationRepository for TablesMut<'_> {
    type Error = MemoryError;

    async fn lookup(&mut self, id: Ulid) -> Result<Option<ApiApplication>, Self::Error> {
        Ok(self.tables.api_applications.get(&id).cloned())
    }

    async fn add(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        owner_id: Ulid,
        name: String,
        status: EntityStatus,
    ) -> Result<ApiApplication, Self::Error> {
        self.faults.check("api_applications")?;

        let created_at = clock.now();
        let application = ApiApplication {
            id: Ulid::from_datetime_with_source(created_at.into(), rng),
            owner_id,
            name,
            status,
            created_at,
        };

        self.tables
            .api_applications
            .insert(application.id, application.clone());
        Ok(application)
    }
}

#[async_trait]
impl ApiTokenRepository for TablesMut<'_> {
    type Error = MemoryError;

    async fn lookup(&mut self, id: Ulid) -> Result<Option<ApiToken>, Self::Error> {
        Ok(self.tables.api_tokens.get(&id).cloned())
    }

    async fn add(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        application: &ApiApplication,
        user_id: Ulid,
    ) -> Result<ApiToken, Self::Error> {
        self.faults.check("api_tokens")?;

        let created_at = clock.now();
        let token = ApiToken {
            id: Ulid::from_datetime_with_source(created_at.into(), rng),
            application_id: application.id,
            user_id,
            created_at,
        };

        self.tables.api_tokens.insert(token.id, token.clone());
        Ok(token)
    }

    async fn delete_for_application(
        &mut self,
        application_id: Ulid,
        cutoff: Option<DateTime<Utc>>,
    ) -> Result<usize, Self::Error> {
        self.faults.check("api_tokens")?;
        Ok(remove_where(&mut self.tables.api_tokens, |token| {
            token.application_id == application_id
                && cutoff.is_none_or(|cutoff| token.created_at <= cutoff)
        }))
    }
}

#[async_trait]
impl ApiGrantRepository for TablesMut<'_> {
    type Error = MemoryError;

    async fn lookup(&mut self, id: Ulid) -> Result<Option<ApiGrant>, Self::Error> {
        Ok(self.tables.api_grants.get(&id).cloned())
    }

    async fn add(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        application: &ApiApplication,
        user_id: Ulid,
        redirect_uri: String,
    ) -> Result<ApiGrant, Self::Error> {
        self.faults.check("api_grants")?;

        let created_at = clock.now();
        let grant = ApiGrant {
            id: Ulid::from_datetime_with_source(created_at.into(), rng),
            application_id: application.id,
            user_id,
            redirect_uri,
            created_at,
        };

        self.tables.api_grants.insert(grant.id, grant.clone());
        Ok(grant)
    }

    async fn delete_for_application(
        &mut self,
        application_id: Ulid,
    ) -> Result<usize, Self::Error> {
        self.faults.check("api_grants")?;
        Ok(remove_where(&mut self.tables.api_grants, |grant| {
            grant.application_id == application_id
        }))
    }
}
