// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::{FutureExt, future::BoxFuture};
use purge_storage::{
    BoxRepository, BoxRepositoryFactory, MapErr, Repository, RepositoryAccess, RepositoryError,
    RepositoryFactory, RepositoryTransaction,
    api::{ApiApplicationRepository, ApiGrantRepository, ApiTokenRepository},
    deletion::ScheduledDeletionRepository,
    entity::EntityRepository,
    group::{EventRepository, GroupRepository},
    organization::{OrganizationRepository, ProjectRepository, TeamRepository},
    release::{EnvironmentRepository, ReleaseRepository},
    rule::RuleRepository,
    vcs::{CodeRepositoryRepository, CommitRepository},
};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{
    MemoryError,
    tables::{Faults, Tables, TablesMut},
};

/// An implementation of the [`RepositoryFactory`] trait keeping everything in
/// memory
///
/// Cloning the factory shares the underlying tables.
#[derive(Clone, Default)]
pub struct MemoryRepositoryFactory {
    tables: Arc<Mutex<Tables>>,
    faults: Faults,
}

impl MemoryRepositoryFactory {
    /// Create a new, empty [`MemoryRepositoryFactory`]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Box the factory
    #[must_use]
    pub fn boxed(self) -> BoxRepositoryFactory {
        Box::new(self)
    }

    /// Start a new transaction, waiting for the current one to finish
    pub async fn repository(&self) -> MemoryRepository {
        let guard = Arc::clone(&self.tables).lock_owned().await;
        let snapshot = Some(guard.clone());
        MemoryRepository {
            guard,
            snapshot,
            faults: self.faults.clone(),
        }
    }

    /// Make every subsequent write to `table` fail with
    /// [`MemoryError::Injected`]
    pub fn fail_writes_to(&self, table: &'static str) {
        self.faults.insert(table);
    }

    /// Stop injecting write failures
    pub fn clear_failures(&self) {
        self.faults.clear();
    }
}

#[async_trait]
impl RepositoryFactory for MemoryRepositoryFactory {
    async fn create(&self) -> Result<BoxRepository, RepositoryError> {
        Ok(self.repository().await.boxed())
    }
}

/// An implementation of the [`Repository`] trait over the in-memory tables
///
/// The tables stay locked until the repository is saved, cancelled or
/// dropped.
pub struct MemoryRepository {
    guard: OwnedMutexGuard<Tables>,
    snapshot: Option<Tables>,
    faults: Faults,
}

impl MemoryRepository {
    /// Transform the repository into a type-erased [`BoxRepository`]
    pub fn boxed(self) -> BoxRepository {
        Box::new(MapErr::new(self, RepositoryError::from_error))
    }

    fn tables(&mut self) -> TablesMut<'_> {
        TablesMut {
            tables: &mut *self.guard,
            faults: &self.faults,
        }
    }

    fn rollback(&mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            *self.guard = snapshot;
        }
    }
}

impl Drop for MemoryRepository {
    fn drop(&mut self) {
        self.rollback();
    }
}

impl Repository<MemoryError> for MemoryRepository {}

impl RepositoryTransaction for MemoryRepository {
    type Error = MemoryError;

    fn save(mut self: Box<Self>) -> BoxFuture<'static, Result<(), Self::Error>> {
        tracing::debug!("Committing in-memory transaction");
        self.snapshot = None;
        drop(self);
        futures_util::future::ready(Ok(())).boxed()
    }

    fn cancel(mut self: Box<Self>) -> BoxFuture<'static, Result<(), Self::Error>> {
        tracing::debug!("Rolling back in-memory transaction");
        self.rollback();
        drop(self);
        futures_util::future::ready(Ok(())).boxed()
    }
}

impl RepositoryAccess for MemoryRepository {
    type Error = MemoryError;

    fn entity<'c>(&'c mut self) -> Box<dyn EntityRepository<Error = Self::Error> + 'c> {
        Box::new(self.tables())
    }

    fn scheduled_deletion<'c>(
        &'c mut self,
    ) -> Box<dyn ScheduledDeletionRepository<Error = Self::Error> + 'c> {
        Box::new(self.tables())
    }

    fn organization<'c>(
        &'c mut self,
    ) -> Box<dyn OrganizationRepository<Error = Self::Error> + 'c> {
        Box::new(self.tables())
    }

    fn team<'c>(&'c mut self) -> Box<dyn TeamRepository<Error = Self::Error> + 'c> {
        Box::new(self.tables())
    }

    fn project<'c>(&'c mut self) -> Box<dyn ProjectRepository<Error = Self::Error> + 'c> {
        Box::new(self.tables())
    }

    fn code_repository<'c>(
        &'c mut self,
    ) -> Box<dyn CodeRepositoryRepository<Error = Self::Error> + 'c> {
        Box::new(self.tables())
    }

    fn commit<'c>(&'c mut self) -> Box<dyn CommitRepository<Error = Self::Error> + 'c> {
        Box::new(self.tables())
    }

    fn release<'c>(&'c mut self) -> Box<dyn ReleaseRepository<Error = Self::Error> + 'c> {
        Box::new(self.tables())
    }

    fn environment<'c>(
        &'c mut self,
    ) -> Box<dyn EnvironmentRepository<Error = Self::Error> + 'c> {
        Box::new(self.tables())
    }

    fn group<'c>(&'c mut self) -> Box<dyn GroupRepository<Error = Self::Error> + 'c> {
        Box::new(self.tables())
    }

    fn event<'c>(&'c mut self) -> Box<dyn EventRepository<Error = Self::Error> + 'c> {
        Box::new(self.tables())
    }

    fn rule<'c>(&'c mut self) -> Box<dyn RuleRepository<Error = Self::Error> + 'c> {
        Box::new(self.tables())
    }

    fn api_application<'c>(
        &'c mut self,
    ) -> Box<dyn ApiApplicationRepository<Error = Self::Error> + 'c> {
        Box::new(self.tables())
    }

    fn api_token<'c>(&'c mut self) -> Box<dyn ApiTokenRepository<Error = Self::Error> + 'c> {
        Box::new(self.tables())
    }

    fn api_grant<'c>(&'c mut self) -> Box<dyn ApiGrantRepository<Error = Self::Error> + 'c> {
        Box::new(self.tables())
    }
}
