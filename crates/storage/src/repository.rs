// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use thiserror::Error;

use crate::{
    MapErr,
    api::{ApiApplicationRepository, ApiGrantRepository, ApiTokenRepository},
    deletion::ScheduledDeletionRepository,
    entity::EntityRepository,
    group::{EventRepository, GroupRepository},
    organization::{OrganizationRepository, ProjectRepository, TeamRepository},
    release::{EnvironmentRepository, ReleaseRepository},
    rule::RuleRepository,
    vcs::{CodeRepositoryRepository, CommitRepository},
};

/// A [`RepositoryFactory`] is a factory that can create a [`BoxRepository`]
#[async_trait]
pub trait RepositoryFactory: Send + Sync {
    /// Create a new [`BoxRepository`], starting a new transaction
    ///
    /// # Errors
    ///
    /// Returns a [`RepositoryError`] if the transaction could not be started
    async fn create(&self) -> Result<BoxRepository, RepositoryError>;
}

/// A type-erased [`RepositoryFactory`]
pub type BoxRepositoryFactory = Box<dyn RepositoryFactory + 'static>;

/// A [`Repository`] helps interacting with the underlying storage backend.
pub trait Repository<E>:
    RepositoryAccess<Error = E> + RepositoryTransaction<Error = E> + Send
where
    E: std::error::Error + Send + Sync + 'static,
{
    /// Construct a (boxed) typed-erased repository
    fn boxed(self) -> BoxRepository
    where
        Self: Sync + Sized + 'static,
    {
        Box::new(MapErr::new(self, RepositoryError::from_error))
    }
}

/// An opaque, type-erased error
#[derive(Debug, Error)]
#[error(transparent)]
pub struct RepositoryError {
    source: Box<dyn std::error::Error + Send + Sync + 'static>,
}

impl RepositoryError {
    /// Construct a [`RepositoryError`] from any error kind
    pub fn from_error<E>(value: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self {
            source: Box::new(value),
        }
    }
}

/// A type-erased [`Repository`]
pub type BoxRepository = Box<dyn Repository<RepositoryError> + Send + Sync + 'static>;

/// A [`RepositoryTransaction`] can be saved or cancelled, after a series
/// of operations.
pub trait RepositoryTransaction {
    /// The error type used by the [`Self::save`] and [`Self::cancel`] functions
    type Error;

    /// Commit the transaction
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage backend failed to commit the
    /// transaction.
    fn save(self: Box<Self>) -> BoxFuture<'static, Result<(), Self::Error>>;

    /// Rollback the transaction
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage backend failed to rollback
    /// the transaction.
    fn cancel(self: Box<Self>) -> BoxFuture<'static, Result<(), Self::Error>>;
}

/// Access the various repositories the backend implements.
///
/// All the methods return a boxed trait object, which can be used to access a
/// particular repository. The lifetime of the returned object is bound to the
/// lifetime of the whole repository, so that only one mutable reference to the
/// repository is used at a time.
///
/// When adding a new repository, you should add a new method to this trait, and
/// update the implementations for [`MapErr`] and [`Box<R>`] below.
pub trait RepositoryAccess: Send {
    /// The backend-specific error type used by each repository.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Get an [`EntityRepository`], which works on any deletable entity
    fn entity<'c>(&'c mut self) -> Box<dyn EntityRepository<Error = Self::Error> + 'c>;

    /// Get a [`ScheduledDeletionRepository`]
    fn scheduled_deletion<'c>(
        &'c mut self,
    ) -> Box<dyn ScheduledDeletionRepository<Error = Self::Error> + 'c>;

    /// Get an [`OrganizationRepository`]
    fn organization<'c>(&'c mut self)
    -> Box<dyn OrganizationRepository<Error = Self::Error> + 'c>;

    /// Get a [`TeamRepository`]
    fn team<'c>(&'c mut self) -> Box<dyn TeamRepository<Error = Self::Error> + 'c>;

    /// Get a [`ProjectRepository`]
    fn project<'c>(&'c mut self) -> Box<dyn ProjectRepository<Error = Self::Error> + 'c>;

    /// Get a [`CodeRepositoryRepository`]
    fn code_repository<'c>(
        &'c mut self,
    ) -> Box<dyn CodeRepositoryRepository<Error = Self::Error> + 'c>;

    /// Get a [`CommitRepository`]
    fn commit<'c>(&'c mut self) -> Box<dyn CommitRepository<Error = Self::Error> + 'c>;

    /// Get a [`ReleaseRepository`]
    fn release<'c>(&'c mut self) -> Box<dyn ReleaseRepository<Error = Self::Error> + 'c>;

    /// Get an [`EnvironmentRepository`]
    fn environment<'c>(&'c mut self) -> Box<dyn EnvironmentRepository<Error = Self::Error> + 'c>;

    /// Get a [`GroupRepository`]
    fn group<'c>(&'c mut self) -> Box<dyn GroupRepository<Error = Self::Error> + 'c>;

    /// Get an [`EventRepository`]
    fn event<'c>(&'c mut self) -> Box<dyn EventRepository<Error = Self::Error> + 'c>;

    /// Get a [`RuleRepository`]
    fn rule<'c>(&'c mut self) -> Box<dyn RuleRepository<Error = Self::Error> + 'c>;

    /// Get an [`ApiApplicationRepository`]
    fn api_application<'c>(
        &'c mut self,
    ) -> Box<dyn ApiApplicationRepository<Error = Self::Error> + 'c>;

    /// Get an [`ApiTokenRepository`]
    fn api_token<'c>(&'c mut self) -> Box<dyn ApiTokenRepository<Error = Self::Error> + 'c>;

    /// Get an [`ApiGrantRepository`]
    fn api_grant<'c>(&'c mut self) -> Box<dyn ApiGrantRepository<Error = Self::Error> + 'c>;
}

/// Implementations of the [`RepositoryAccess`], [`RepositoryTransaction`] and
/// [`Repository`] for the [`MapErr`] wrapper and [`Box<R>`]
mod impls {
    use futures_util::{FutureExt, TryFutureExt, future::BoxFuture};

    use super::RepositoryAccess;
    use crate::{
        MapErr, Repository, RepositoryTransaction,
        api::{ApiApplicationRepository, ApiGrantRepository, ApiTokenRepository},
        deletion::ScheduledDeletionRepository,
        entity::EntityRepository,
        group::{EventRepository, GroupRepository},
        organization::{OrganizationRepository, ProjectRepository, TeamRepository},
        release::{EnvironmentRepository, ReleaseRepository},
        rule::RuleRepository,
        vcs::{CodeRepositoryRepository, CommitRepository},
    };

    // --- Repository ---
    impl<R, F, E1, E2> Repository<E2> for MapErr<R, F>
    where
        R: Repository<E1> + RepositoryAccess<Error = E1> + RepositoryTransaction<Error = E1>,
        F: FnMut(E1) -> E2 + Send + Sync + 'static,
        E1: std::error::Error + Send + Sync + 'static,
        E2: std::error::Error + Send + Sync + 'static,
    {
    }

    // --- RepositoryTransaction --
    impl<R, F, E> RepositoryTransaction for MapErr<R, F>
    where
        R: RepositoryTransaction,
        R::Error: 'static,
        F: FnMut(R::Error) -> E + Send + Sync + 'static,
        E: std::error::Error,
    {
        type Error = E;

        fn save(self: Box<Self>) -> BoxFuture<'static, Result<(), Self::Error>> {
            Box::new(self.inner).save().map_err(self.mapper).boxed()
        }

        fn cancel(self: Box<Self>) -> BoxFuture<'static, Result<(), Self::Error>> {
            Box::new(self.inner).cancel().map_err(self.mapper).boxed()
        }
    }

    // --- RepositoryAccess --
    impl<R, F, E> RepositoryAccess for MapErr<R, F>
    where
        R: RepositoryAccess,
        R::Error: 'static,
        F: FnMut(R::Error) -> E + Send + Sync + 'static,
        E: std::error::Error + Send + Sync + 'static,
    {
        type Error = E;

        fn entity<'c>(&'c mut self) -> Box<dyn EntityRepository<Error = Self::Error> + 'c> {
            Box::new(MapErr::new(self.inner.entity(), &mut self.mapper))
        }

        fn scheduled_deletion<'c>(
            &'c mut self,
        ) -> Box<dyn ScheduledDeletionRepository<Error = Self::Error> + 'c> {
            Box::new(MapErr::new(self.inner.scheduled_deletion(), &mut self.mapper))
        }

        fn organization<'c>(
            &'c mut self,
        ) -> Box<dyn OrganizationRepository<Error = Self::Error> + 'c> {
            Box::new(MapErr::new(self.inner.organization(), &mut self.mapper))
        }

        fn team<'c>(&'c mut self) -> Box<dyn TeamRepository<Error = Self::Error> + 'c> {
            Box::new(MapErr::new(self.inner.team(), &mut self.mapper))
        }

        fn project<'c>(&'c mut self) -> Box<dyn ProjectRepository<Error = Self::Error> + 'c> {
            Box::new(MapErr::new(self.inner.project(), &mut self.mapper))
        }

        fn code_repository<'c>(
            &'c mut self,
        ) -> Box<dyn CodeRepositoryRepository<Error = Self::Error> + 'c> {
            Box::new(MapErr::new(self.inner.code_repository(), &mut self.mapper))
        }

        fn commit<'c>(&'c mut self) -> Box<dyn CommitRepository<Error = Self::Error> + 'c> {
            Box::new(MapErr::new(self.inner.commit(), &mut self.mapper))
        }

        fn release<'c>(&'c mut self) -> Box<dyn ReleaseRepository<Error = Self::Error> + 'c> {
            Box::new(MapErr::new(self.inner.release(), &mut self.mapper))
        }

        fn environment<'c>(
            &'c mut self,
        ) -> Box<dyn EnvironmentRepository<Error = Self::Error> + 'c> {
            Box::new(MapErr::new(self.inner.environment(), &mut self.mapper))
        }

        fn group<'c>(&'c mut self) -> Box<dyn GroupRepository<Error = Self::Error> + 'c> {
            Box::new(MapErr::new(self.inner.group(), &mut self.mapper))
        }

        fn event<'c>(&'c mut self) -> Box<dyn EventRepository<Error = Self::Error> + 'c> {
            Box::new(MapErr::new(self.inner.event(), &mut self.mapper))
        }

        fn rule<'c>(&'c mut self) -> Box<dyn RuleRepository<Error = Self::Error> + 'c> {
            Box::new(MapErr::new(self.inner.rule(), &mut self.mapper))
        }

        fn api_application<'c>(
            &'c mut self,
        ) -> Box<dyn ApiApplicationRepository<Error = Self::Error> + 'c> {
            Box::new(MapErr::new(self.inner.api_application(), &mut self.mapper))
        }

        fn api_token<'c>(&'c mut self) -> Box<dyn ApiTokenRepository<Error = Self::Error> + 'c> {
            Box::new(MapErr::new(self.inner.api_token(), &mut self.mapper))
        }

        fn api_grant<'c>(&'c mut self) -> Box<dyn ApiGrantRepository<Error = Self::Error> + 'c> {
            Box::new(MapErr::new(self.inner.api_grant(), &mut self.mapper))
        }
    }

    impl<R: RepositoryAccess + ?Sized> RepositoryAccess for Box<R> {
        type Error = R::Error;

        fn entity<'c>(&'c mut self) -> Box<dyn EntityRepository<Error = Self::Error> + 'c> {
            (**self).entity()
        }

        fn scheduled_deletion<'c>(
            &'c mut self,
        ) -> Box<dyn ScheduledDeletionRepository<Error = Self::Error> + 'c> {
            (**self).scheduled_deletion()
        }

        fn organization<'c>(
            &'c mut self,
        ) -> Box<dyn OrganizationRepository<Error = Self::Error> + 'c> {
            (**self).organization()
        }

        fn team<'c>(&'c mut self) -> Box<dyn TeamRepository<Error = Self::Error> + 'c> {
            (**self).team()
        }

        fn project<'c>(&'c mut self) -> Box<dyn ProjectRepository<Error = Self::Error> + 'c> {
            (**self).project()
        }

        fn code_repository<'c>(
            &'c mut self,
        ) -> Box<dyn CodeRepositoryRepository<Error = Self::Error> + 'c> {
            (**self).code_repository()
        }

        fn commit<'c>(&'c mut self) -> Box<dyn CommitRepository<Error = Self::Error> + 'c> {
            (**self).commit()
        }

        fn release<'c>(&'c mut self) -> Box<dyn ReleaseRepository<Error = Self::Error> + 'c> {
            (**self).release()
        }

        fn environment<'c>(
            &'c mut self,
        ) -> Box<dyn EnvironmentRepository<Error = Self::Error> + 'c> {
            (**self).environment()
        }

        fn group<'c>(&'c mut self) -> Box<dyn GroupRepository<Error = Self::Error> + 'c> {
            (**self).group()
        }

        fn event<'c>(&'c mut self) -> Box<dyn EventRepository<Error = Self::Error> + 'c> {
            (**self).event()
        }

        fn rule<'c>(&'c mut self) -> Box<dyn RuleRepository<Error = Self::Error> + 'c> {
            (**self).rule()
        }

        fn api_application<'c>(
            &'c mut self,
        ) -> Box<dyn ApiApplicationRepository<Error = Self::Error> + 'c> {
            (**self).api_application()
        }

        fn api_token<'c>(&'c mut self) -> Box<dyn ApiTokenRepository<Error = Self::Error> + 'c> {
            (**self).api_token()
        }

        fn api_grant<'c>(&'c mut self) -> Box<dyn ApiGrantRepository<Error = Self::Error> + 'c> {
            (**self).api_grant()
        }
    }
}
