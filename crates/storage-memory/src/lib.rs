// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

//! An in-memory implementation of the storage traits
//!
//! All the data lives in a single set of tables behind an async mutex. A
//! [`MemoryRepository`] holds that mutex for its whole lifetime, so
//! transactions are fully serialized: a second call to
//! [`RepositoryFactory::create`] waits until the first repository is saved,
//! cancelled or dropped. Code using this backend must therefore never hold
//! two repositories at once.
//!
//! Changes are applied directly to the tables. A snapshot taken when the
//! repository is created is restored on [`RepositoryTransaction::cancel`] or
//! when the repository is dropped without being saved.
//!
//! Like the PostgreSQL schema, the tables enforce foreign keys on deletion:
//! deleting a row which is still referenced fails with
//! [`MemoryError::ForeignKey`].
//!
//! [`RepositoryFactory::create`]: purge_storage::RepositoryFactory::create
//! [`RepositoryTransaction::cancel`]: purge_storage::RepositoryTransaction::cancel

#![deny(clippy::future_not_send, missing_docs)]
#![allow(clippy::module_name_repetitions)]

mod api;
mod deletion;
mod entity;
mod group;
mod organization;
mod release;
mod repository;
mod rule;
mod tables;
mod vcs;

pub use self::repository::{MemoryRepository, MemoryRepositoryFactory};

/// An error returned by the in-memory backend
#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    /// A write was refused because failures were injected on that table
    #[error("injected failure while writing to {table}")]
    Injected {
        /// The table being written to
        table: &'static str,
    },

    /// A row could not be inserted because it conflicts with an existing one
    #[error("unique constraint violated on {table}")]
    Conflict {
        /// The table being inserted into
        table: &'static str,
    },

    /// A row could not be deleted because another row still references it
    #[error("row of {table} is still referenced by {referenced_by}")]
    ForeignKey {
        /// The table of the row being deleted
        table: &'static str,

        /// The table holding the reference
        referenced_by: &'static str,
    },
}

#[cfg(test)]
mod tests;
