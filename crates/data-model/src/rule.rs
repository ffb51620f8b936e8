// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use chrono::{DateTime, Utc};
use serde::Serialize;
use ulid::Ulid;

/// An issue alert rule, attached to a project. It may be owned by a team
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rule {
    pub id: Ulid,
    pub project_id: Ulid,
    pub label: String,
    pub owner_team_id: Option<Ulid>,
    pub created_at: DateTime<Utc>,
}

/// A metric alert rule, attached to an organization. It may be owned by a
/// team
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlertRule {
    pub id: Ulid,
    pub organization_id: Ulid,
    pub name: String,
    pub owner_team_id: Option<Ulid>,
    pub created_at: DateTime<Utc>,
}
