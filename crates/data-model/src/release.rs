// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use chrono::{DateTime, Utc};
use serde::Serialize;
use ulid::Ulid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Release {
    pub id: Ulid,
    pub organization_id: Ulid,
    pub version: String,
    pub created_at: DateTime<Utc>,
}

/// Links a commit to a release
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReleaseCommit {
    pub id: Ulid,
    pub organization_id: Ulid,
    pub release_id: Ulid,
    pub commit_id: Ulid,

    /// The project this link was recorded for. This is informational only,
    /// the link belongs to the organization
    pub project_id: Option<Ulid>,
    pub order: i32,
}

/// Records that a release was seen in an environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReleaseEnvironment {
    pub id: Ulid,
    pub organization_id: Ulid,
    pub release_id: Ulid,
    pub environment_id: Ulid,
    pub project_id: Option<Ulid>,
    pub first_seen: DateTime<Utc>,
}

/// An environment is scoped to an organization and shared between projects
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Environment {
    pub id: Ulid,
    pub organization_id: Ulid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}
