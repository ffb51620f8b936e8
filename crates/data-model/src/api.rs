// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use chrono::{DateTime, Utc};
use serde::Serialize;
use ulid::Ulid;

use crate::{EntityKind, EntityStatus, entity::impl_deletable};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiApplication {
    pub id: Ulid,
    pub owner_id: Ulid,
    pub name: String,
    pub status: EntityStatus,
    pub created_at: DateTime<Utc>,
}

impl_deletable!(ApiApplication, EntityKind::ApiApplication);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiGrant {
    pub id: Ulid,
    pub application_id: Ulid,
    pub user_id: Ulid,
    pub redirect_uri: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiToken {
    pub id: Ulid,
    pub application_id: Ulid,
    pub user_id: Ulid,
    pub created_at: DateTime<Utc>,
}
