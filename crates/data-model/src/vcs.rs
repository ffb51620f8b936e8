// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use chrono::{DateTime, Utc};
use serde::Serialize;
use ulid::Ulid;

use crate::{EntityKind, EntityStatus, entity::impl_deletable};

/// A source code repository linked to an organization
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CodeRepository {
    pub id: Ulid,
    pub organization_id: Ulid,
    pub name: String,

    /// The name of the version-control provider integration, if any
    pub provider: Option<String>,
    pub status: EntityStatus,
    pub created_at: DateTime<Utc>,
}

impl_deletable!(CodeRepository, EntityKind::Repository);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitAuthor {
    pub id: Ulid,
    pub organization_id: Ulid,
    pub name: String,
    pub email: String,
}

/// A commit, scoped to a repository.
///
/// The same `key` can exist in multiple repositories of an organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Commit {
    pub id: Ulid,
    pub organization_id: Ulid,
    pub repository_id: Ulid,
    pub author_id: Option<Ulid>,
    pub key: String,
    pub created_at: DateTime<Utc>,
}
