// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

//! Background tasks of the deletion engine
//!
//! Deletions are requested with [`schedule`], which records a
//! [`ScheduledDeletion`] job. The scheduler ([`run_scheduled_deletions`])
//! periodically claims due jobs and runs the [`CascadeExecutor`] registered
//! for the kind of entity they target. The reaper ([`reattempt_deletions`])
//! releases jobs which stayed claimed for too long, so that they get retried.
//!
//! Every cascade can also be started directly, without a scheduled job, see
//! the functions in [`jobs`].
//!
//! [`ScheduledDeletion`]: purge_data_model::ScheduledDeletion

use std::sync::{Arc, LazyLock};

use opentelemetry::metrics::Meter;
use purge_data_model::Clock;
use purge_nodestore::{BoxNodeStore, NodeStore};
use purge_storage::{BoxRepository, RepositoryError, RepositoryFactory};
use rand::SeedableRng;

pub mod cascade;
pub mod jobs;
mod providers;
mod reaper;
mod schedule;
mod scheduler;
mod signals;
mod worker;

pub use self::{
    cascade::{CascadeError, CascadeExecutor, ExecutorRegistry, PostCommit},
    providers::{ProviderRegistry, RepositoryProvider},
    reaper::reattempt_deletions,
    schedule::{ScheduleError, schedule},
    scheduler::{SchedulerReport, run_scheduled_deletions},
    signals::{PendingDeleteListener, PendingDeleteSignal},
    worker::{WorkerSettings, init_and_run, run_reaper, run_scheduler},
};

static METER: LazyLock<Meter> = LazyLock::new(|| {
    let scope = opentelemetry::InstrumentationScope::builder(env!("CARGO_PKG_NAME"))
        .with_version(env!("CARGO_PKG_VERSION"))
        .with_schema_url(opentelemetry_semantic_conventions::SCHEMA_URL)
        .build();

    opentelemetry::global::meter_with_scope(scope)
});

/// Everything the tasks need to run
#[derive(Clone)]
pub struct State {
    repository_factory: Arc<dyn RepositoryFactory>,
    clock: Arc<dyn Clock>,
    nodestore: BoxNodeStore,
    signal: PendingDeleteSignal,
    providers: ProviderRegistry,
    executors: ExecutorRegistry,
}

impl State {
    /// Create a new [`State`], with the default set of cascade executors
    pub fn new(
        repository_factory: impl RepositoryFactory + 'static,
        clock: impl Clock + 'static,
        nodestore: impl NodeStore + 'static,
        signal: PendingDeleteSignal,
        providers: ProviderRegistry,
    ) -> Self {
        Self {
            repository_factory: Arc::new(repository_factory),
            clock: Arc::new(clock),
            nodestore: Arc::new(nodestore),
            signal,
            providers,
            executors: ExecutorRegistry::default(),
        }
    }

    /// Replace the cascade executors
    #[must_use]
    pub fn with_executors(mut self, executors: ExecutorRegistry) -> Self {
        self.executors = executors;
        self
    }

    pub fn clock(&self) -> &dyn Clock {
        &self.clock
    }

    pub fn nodestore(&self) -> &dyn NodeStore {
        self.nodestore.as_ref()
    }

    pub fn signal(&self) -> &PendingDeleteSignal {
        &self.signal
    }

    pub fn providers(&self) -> &ProviderRegistry {
        &self.providers
    }

    pub fn executors(&self) -> &ExecutorRegistry {
        &self.executors
    }

    /// Get a fresh random number generator
    #[allow(clippy::unused_self)]
    pub fn rng(&self) -> rand_chacha::ChaChaRng {
        rand_chacha::ChaChaRng::from_entropy()
    }

    /// Start a new transaction
    ///
    /// # Errors
    ///
    /// Returns an error if the storage backend could not start a transaction
    pub async fn repository(&self) -> Result<BoxRepository, RepositoryError> {
        self.repository_factory.create().await
    }
}

#[cfg(test)]
mod tests;
