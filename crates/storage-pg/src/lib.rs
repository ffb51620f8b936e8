// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

//! An implementation of the storage traits for a PostgreSQL database
//!
//! Every [`PgRepository`] wraps a single database transaction, which is
//! committed by [`RepositoryTransaction::save`] and rolled back by
//! [`RepositoryTransaction::cancel`] or when the repository is dropped.
//!
//! # Writing a new query
//!
//! Queries are written with the runtime [`sqlx::query`] family of functions,
//! binding the parameters with `.bind()`. IDs are stored as `UUID`s and
//! converted from and to [`Ulid`]s at the edge.
//!
//! Each method is instrumented with a span named after the repository and the
//! operation, like `db.scheduled_deletion.claim_due`. The query text is
//! recorded in that span by calling [`ExecuteExt::traced`] on the query.
//! Bulk deletions record the number of rows they removed in the
//! `db.rows_affected` field.
//!
//! Statements whose target table depends on the [`EntityKind`] are built with
//! [`sea_query`], see the `entity` module.
//!
//! # Migrations
//!
//! The migrations live in the `migrations` directory of this crate, and are
//! embedded in the [`MIGRATOR`].
//!
//! [`RepositoryTransaction::save`]: purge_storage::RepositoryTransaction::save
//! [`RepositoryTransaction::cancel`]: purge_storage::RepositoryTransaction::cancel
//! [`EntityKind`]: purge_data_model::EntityKind

#![deny(clippy::future_not_send, missing_docs)]
#![allow(clippy::module_name_repetitions)]

use purge_data_model::EntityStatus;
use sqlx::migrate::Migrator;
use ulid::Ulid;

pub mod api;
pub mod deletion;
pub mod entity;
pub mod group;
pub mod organization;
pub mod release;
pub mod rule;
pub mod vcs;

mod errors;
mod iden;
mod repository;
pub(crate) mod telemetry;
pub(crate) mod tracing;

pub use self::{
    errors::{DatabaseError, DatabaseInconsistencyError},
    repository::{PgRepository, PgRepositoryFactory},
    tracing::ExecuteExt,
};

/// Embedded migrations, allowing them to run on startup
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Parse the `status` column of a deletable entity
pub(crate) fn parse_status(
    table: &'static str,
    id: Ulid,
    value: &str,
) -> Result<EntityStatus, DatabaseInconsistencyError> {
    value.parse().map_err(|e| {
        DatabaseInconsistencyError::on(table)
            .column("status")
            .row(id)
            .source(e)
    })
}

#[cfg(test)]
mod tests;
