// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

#![allow(clippy::module_name_repetitions)]

pub mod clock;
mod entity;
mod status;

pub(crate) mod api;
pub(crate) mod group;
pub(crate) mod organization;
pub(crate) mod release;
pub(crate) mod rule;
pub(crate) mod scheduled_deletion;
pub(crate) mod vcs;

pub use ulid::Ulid;

pub use self::{
    api::{ApiApplication, ApiGrant, ApiToken},
    clock::{Clock, SystemClock},
    entity::{Deletable, EntityKind, EntityRef, InvalidEntityKind},
    group::{
        Event, Group, GroupAssignee, GroupDependents, GroupHash, GroupMeta, GroupRedirect,
        GroupResolution,
    },
    organization::{Organization, Project, Team},
    release::{Environment, Release, ReleaseCommit, ReleaseEnvironment},
    rule::{AlertRule, Rule},
    scheduled_deletion::ScheduledDeletion,
    status::{EntityStatus, InvalidEntityStatus},
    vcs::{CodeRepository, Commit, CommitAuthor},
};
