// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

//! Interactions with the storage backend
//!
//! This crate provides a set of traits that can be implemented to interact with
//! the storage backend. Those traits are called repositories and are grouped by
//! the type of data they manage.
//!
//! Each of those repositories can be accessed via the [`RepositoryAccess`]
//! trait. This trait can be wrapped in a [`BoxRepository`] to allow using it
//! without caring about the underlying storage backend, and without carrying
//! around the generic type parameter.
//!
//! A repository is a transaction: nothing it does is visible to other
//! repositories until [`RepositoryTransaction::save`] is called, and
//! everything it did is discarded by [`RepositoryTransaction::cancel`].
//!
//! # Conventions
//!
//!   1. Every repository trait has an associated error type, and all its
//!      methods are fallible and use that error type
//!   2. Lookups return a `Result<Option<T>, Self::Error>`, because 'not found'
//!      is usually handled differently from a failure
//!   3. Bulk deletions return the number of rows they removed, and deleting
//!      nothing is a success. This makes every cascade step safe to re-run.
//!   4. Operations that record the current time take a [`Clock`]. Operations
//!      that generate new IDs also take a random number generator.
//!
//! Each trait is followed by a [`repository_impl!`] invocation, which
//! implements it for [`Box<R>`] and for [`MapErr`].

#![deny(clippy::future_not_send)]
#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]

pub(crate) mod repository;
mod utils;

pub mod api;
pub mod deletion;
pub mod entity;
pub mod group;
pub mod organization;
pub mod release;
pub mod rule;
pub mod vcs;

pub use purge_data_model::{Clock, SystemClock, clock};

pub use self::{
    repository::{
        BoxRepository, BoxRepositoryFactory, Repository, RepositoryAccess, RepositoryError,
        RepositoryFactory, RepositoryTransaction,
    },
    utils::MapErr,
};
