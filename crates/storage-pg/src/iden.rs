// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

//! Table and column identifiers used by [`sea_query`]

#[derive(sea_query::Iden)]
pub enum Organizations {
    Table,
    OrganizationId,
    Status,
}

#[derive(sea_query::Iden)]
pub enum Teams {
    Table,
    TeamId,
    Status,
}

#[derive(sea_query::Iden)]
pub enum Projects {
    Table,
    ProjectId,
    Status,
}

#[derive(sea_query::Iden)]
pub enum CodeRepositories {
    Table,
    CodeRepositoryId,
    Status,
}

#[derive(sea_query::Iden)]
#[iden = "error_groups"]
pub enum Groups {
    Table,
    GroupId,
    Status,
}

#[derive(sea_query::Iden)]
pub enum ApiApplications {
    Table,
    ApiApplicationId,
    Status,
}

/// Runs `$body` with `$table`, `$id` and `$status` bound to the identifiers
/// of the root table of an entity kind
macro_rules! with_entity_table {
    ($kind:expr, |$table:ident, $id:ident, $status:ident| $body:expr) => {
        match $kind {
            ::purge_data_model::EntityKind::Organization => {
                let ($table, $id, $status) = (
                    $crate::iden::Organizations::Table,
                    $crate::iden::Organizations::OrganizationId,
                    $crate::iden::Organizations::Status,
                );
                $body
            }
            ::purge_data_model::EntityKind::Team => {
                let ($table, $id, $status) = (
                    $crate::iden::Teams::Table,
                    $crate::iden::Teams::TeamId,
                    $crate::iden::Teams::Status,
                );
                $body
            }
            ::purge_data_model::EntityKind::Project => {
                let ($table, $id, $status) = (
                    $crate::iden::Projects::Table,
                    $crate::iden::Projects::ProjectId,
                    $crate::iden::Projects::Status,
                );
                $body
            }
            ::purge_data_model::EntityKind::Repository => {
                let ($table, $id, $status) = (
                    $crate::iden::CodeRepositories::Table,
                    $crate::iden::CodeRepositories::CodeRepositoryId,
                    $crate::iden::CodeRepositories::Status,
                );
                $body
            }
            ::purge_data_model::EntityKind::Group => {
                let ($table, $id, $status) = (
                    $crate::iden::Groups::Table,
                    $crate::iden::Groups::GroupId,
                    $crate::iden::Groups::Status,
                );
                $body
            }
            ::purge_data_model::EntityKind::ApiApplication => {
                let ($table, $id, $status) = (
                    $crate::iden::ApiApplications::Table,
                    $crate::iden::ApiApplications::ApiApplicationId,
                    $crate::iden::ApiApplications::Status,
                );
                $body
            }
        }
    };
}

pub(crate) use with_entity_table;
