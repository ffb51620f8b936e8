// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use std::ops::{Deref, DerefMut};

use async_trait::async_trait;
use futures_util::{FutureExt, TryFutureExt, future::BoxFuture};
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
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use tracing::Instrument;

use crate::{
    DatabaseError,
    api::{PgApiApplicationRepository, PgApiGrantRepository, PgApiTokenRepository},
    deletion::PgScheduledDeletionRepository,
    entity::PgEntityRepository,
    group::{PgEventRepository, PgGroupRepository},
    organization::{PgOrganizationRepository, PgProjectRepository, PgTeamRepository},
    release::{PgEnvironmentRepository, PgReleaseRepository},
    rule::PgRuleRepository,
    telemetry::DB_CLIENT_CONNECTIONS_CREATE_TIME_HISTOGRAM,
    vcs::{PgCodeRepositoryRepository, PgCommitRepository},
};

/// An implementation of the [`RepositoryFactory`] trait backed by a PostgreSQL
/// connection pool.
#[derive(Clone)]
pub struct PgRepositoryFactory {
    pool: PgPool,
}

impl PgRepositoryFactory {
    /// Create a new [`PgRepositoryFactory`] from a PostgreSQL connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Box the factory
    #[must_use]
    pub fn boxed(self) -> BoxRepositoryFactory {
        Box::new(self)
    }

    /// Get the underlying PostgreSQL connection pool
    #[must_use]
    pub fn pool(&self) -> PgPool {
        self.pool.clone()
    }
}

#[async_trait]
impl RepositoryFactory for PgRepositoryFactory {
    async fn create(&self) -> Result<BoxRepository, RepositoryError> {
        let start = std::time::Instant::now();
        let repo = PgRepository::from_pool(&self.pool)
            .await
            .map_err(RepositoryError::from_error)?
            .boxed();

        // Measure the time it took to create the connection
        let duration = start.elapsed();
        let duration_ms = duration.as_millis().try_into().unwrap_or(u64::MAX);
        DB_CLIENT_CONNECTIONS_CREATE_TIME_HISTOGRAM.record(duration_ms, &[]);

        Ok(repo)
    }
}

/// An implementation of the [`Repository`] trait backed by a PostgreSQL
/// transaction.
pub struct PgRepository<C = Transaction<'static, Postgres>> {
    conn: C,
}

impl PgRepository {
    /// Create a new [`PgRepository`] from a PostgreSQL connection pool,
    /// starting a transaction.
    ///
    /// # Errors
    ///
    /// Returns a [`DatabaseError`] if the transaction could not be started.
    pub async fn from_pool(pool: &PgPool) -> Result<Self, DatabaseError> {
        let txn = pool.begin().await?;
        Ok(Self::from_conn(txn))
    }

    /// Transform the repository into a type-erased [`BoxRepository`]
    pub fn boxed(self) -> BoxRepository {
        Box::new(MapErr::new(self, RepositoryError::from_error))
    }
}

impl<C> PgRepository<C> {
    /// Create a new [`PgRepository`] from an existing PostgreSQL connection
    /// with a transaction
    pub fn from_conn(conn: C) -> Self {
        PgRepository { conn }
    }

    /// Consume this [`PgRepository`], returning the underlying connection.
    pub fn into_inner(self) -> C {
        self.conn
    }
}

impl<C> AsRef<C> for PgRepository<C> {
    fn as_ref(&self) -> &C {
        &self.conn
    }
}

impl<C> AsMut<C> for PgRepository<C> {
    fn as_mut(&mut self) -> &mut C {
        &mut self.conn
    }
}

impl<C> Deref for PgRepository<C> {
    type Target = C;

    fn deref(&self) -> &Self::Target {
        &self.conn
    }
}

impl<C> DerefMut for PgRepository<C> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.conn
    }
}

impl Repository<DatabaseError> for PgRepository {}

impl RepositoryTransaction for PgRepository {
    type Error = DatabaseError;

    fn save(self: Box<Self>) -> BoxFuture<'static, Result<(), Self::Error>> {
        let span = tracing::info_span!("db.save");
        self.conn
            .commit()
            .map_err(DatabaseError::from)
            .instrument(span)
            .boxed()
    }

    fn cancel(self: Box<Self>) -> BoxFuture<'static, Result<(), Self::Error>> {
        let span = tracing::info_span!("db.cancel");
        self.conn
            .rollback()
            .map_err(DatabaseError::from)
            .instrument(span)
            .boxed()
    }
}

impl<C> RepositoryAccess for PgRepository<C>
where
    C: AsMut<PgConnection> + Send,
{
    type Error = DatabaseError;

    fn entity<'c>(&'c mut self) -> Box<dyn EntityRepository<Error = Self::Error> + 'c> {
        Box::new(PgEntityRepository::new(self.conn.as_mut()))
    }

    fn scheduled_deletion<'c>(
        &'c mut self,
    ) -> Box<dyn ScheduledDeletionRepository<Error = Self::Error> + 'c> {
        Box::new(PgScheduledDeletionRepository::new(self.conn.as_mut()))
    }

    fn organization<'c>(
        &'c mut self,
    ) -> Box<dyn OrganizationRepository<Error = Self::Error> + 'c> {
        Box::new(PgOrganizationRepository::new(self.conn.as_mut()))
    }

    fn team<'c>(&'c mut self) -> Box<dyn TeamRepository<Error = Self::Error> + 'c> {
        Box::new(PgTeamRepository::new(self.conn.as_mut()))
    }

    fn project<'c>(&'c mut self) -> Box<dyn ProjectRepository<Error = Self::Error> + 'c> {
        Box::new(PgProjectRepository::new(self.conn.as_mut()))
    }

    fn code_repository<'c>(
        &'c mut self,
    ) -> Box<dyn CodeRepositoryRepository<Error = Self::Error> + 'c> {
        Box::new(PgCodeRepositoryRepository::new(self.conn.as_mut()))
    }

    fn commit<'c>(&'c mut self) -> Box<dyn CommitRepository<Error = Self::Error> + 'c> {
        Box::new(PgCommitRepository::new(self.conn.as_mut()))
    }

    fn release<'c>(&'c mut self) -> Box<dyn ReleaseRepository<Error = Self::Error> + 'c> {
        Box::new(PgReleaseRepository::new(self.conn.as_mut()))
    }

    fn environment<'c>(
        &'c mut self,
    ) -> Box<dyn EnvironmentRepository<Error = Self::Error> + 'c> {
        Box::new(PgEnvironmentRepository::new(self.conn.as_mut()))
    }

    fn group<'c>(&'c mut self) -> Box<dyn GroupRepository<Error = Self::Error> + 'c> {
        Box::new(PgGroupRepository::new(self.conn.as_mut()))
    }

    fn event<'c>(&'c mut self) -> Box<dyn EventRepository<Error = Self::Error> + 'c> {
        Box::new(PgEventRepository::new(self.conn.as_mut()))
    }

    fn rule<'c>(&'c mut self) -> Box<dyn RuleRepository<Error = Self::Error> + 'c> {
        Box::new(PgRuleRepository::new(self.conn.as_mut()))
    }

    fn api_application<'c>(
        &'c mut self,
    ) -> Box<dyn ApiApplicationRepository<Error = Self::Error> + 'c> {
        Box::new(PgApiApplicationRepository::new(self.conn.as_mut()))
    }

    fn api_token<'c>(&'c mut self) -> Box<dyn ApiTokenRepository<Error = Self::Error> + 'c> {
        Box::new(PgApiTokenRepository::new(self.conn.as_mut()))
    }

    fn api_grant<'c>(&'c mut self) -> Box<dyn ApiGrantRepository<Error = Self::Error> + 'c> {
        Box::new(PgApiGrantRepository::new(self.conn.as_mut()))
    }
}
