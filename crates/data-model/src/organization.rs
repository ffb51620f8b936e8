// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use chrono::{DateTime, Utc};
use serde::Serialize;
use ulid::Ulid;

use crate::{EntityKind, EntityStatus, entity::impl_deletable};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Organization {
    pub id: Ulid,
    pub name: String,
    pub status: EntityStatus,
    pub created_at: DateTime<Utc>,
}

impl_deletable!(Organization, EntityKind::Organization);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Team {
    pub id: Ulid,
    pub organization_id: Ulid,
    pub name: String,
    pub status: EntityStatus,
    pub created_at: DateTime<Utc>,
}

impl_deletable!(Team, EntityKind::Team);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Project {
    pub id: Ulid,
    pub organization_id: Ulid,
    pub name: String,
    pub status: EntityStatus,
    pub created_at: DateTime<Utc>,
}

impl_deletable!(Project, EntityKind::Project);
