// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use std::time::Duration;

use anyhow::Context;
use purge_config::{DatabaseConfig, DeletionsConfig};
use purge_data_model::SystemClock;
use purge_nodestore::MemoryNodeStore;
use purge_storage_pg::PgRepositoryFactory;
use purge_tasks::{PendingDeleteSignal, ProviderRegistry, State, WorkerSettings};
use sqlx::{
    ConnectOptions, PgConnection, PgPool,
    postgres::{PgConnectOptions, PgPoolOptions},
};
use tracing::log::LevelFilter;

fn database_connect_options_from_config(
    config: &DatabaseConfig,
) -> Result<PgConnectOptions, anyhow::Error> {
    let options: PgConnectOptions = config
        .uri
        .parse()
        .context("could not parse database connection string")?;

    Ok(options
        .application_name("purge")
        .log_statements(LevelFilter::Debug)
        .log_slow_statements(LevelFilter::Warn, Duration::from_millis(100)))
}

/// Create a database connection pool from the configuration
#[tracing::instrument(name = "db.connect", skip_all)]
pub async fn database_pool_from_config(config: &DatabaseConfig) -> Result<PgPool, anyhow::Error> {
    let options = database_connect_options_from_config(config)?;
    PgPoolOptions::new()
        .max_connections(config.max_connections.into())
        .min_connections(config.min_connections)
        .acquire_timeout(config.connect_timeout)
        .idle_timeout(config.idle_timeout)
        .max_lifetime(config.max_lifetime)
        .connect_with(options)
        .await
        .context("could not connect to the database")
}

/// Create a single database connection from the configuration
#[tracing::instrument(name = "db.connect", skip_all)]
pub async fn database_connection_from_config(
    config: &DatabaseConfig,
) -> Result<PgConnection, anyhow::Error> {
    database_connect_options_from_config(config)?
        .connect()
        .await
        .context("could not connect to the database")
}

/// Build the state shared by the deletion jobs
///
/// The binary ships without a persistent node store and without repository
/// providers: event payloads are kept in a process-local [`MemoryNodeStore`],
/// and repositories are never deregistered from their provider. Deployments
/// needing either embed `purge-tasks` and build their own [`State`].
pub fn state_from_pool(pool: PgPool) -> State {
    tracing::warn!(
        "Using an in-memory node store and no repository provider, event payloads and provider integrations are left untouched"
    );
    State::new(
        PgRepositoryFactory::new(pool),
        SystemClock::default(),
        MemoryNodeStore::new(),
        PendingDeleteSignal::new(),
        ProviderRegistry::new(),
    )
}

pub fn worker_settings_from_config(config: &DeletionsConfig) -> WorkerSettings {
    WorkerSettings {
        scheduler_interval: config.scheduler_interval,
        reaper_interval: config.reaper_interval,
        staleness_threshold: config.staleness_threshold,
        batch_size: config.batch_size,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_settings_from_default_config() {
        let settings = worker_settings_from_config(&DeletionsConfig::default());
        assert_eq!(settings, WorkerSettings::default());
    }

    #[test]
    fn test_connect_options_from_config() {
        let config = DatabaseConfig {
            uri: "postgresql://user@db.example.com:5433/purge".to_owned(),
            ..DatabaseConfig::default()
        };

        let options = database_connect_options_from_config(&config).unwrap();
        assert_eq!(options.get_host(), "db.example.com");
        assert_eq!(options.get_port(), 5433);
        assert_eq!(options.get_database(), Some("purge"));

        let config = DatabaseConfig {
            uri: "not a uri".to_owned(),
            ..DatabaseConfig::default()
        };
        assert!(database_connect_options_from_config(&config).is_err());
    }

    #[tokio::test]
    async fn test_state_has_no_external_integrations() {
        let options = database_connect_options_from_config(&DatabaseConfig::default()).unwrap();
        let pool = PgPoolOptions::new().connect_lazy_with(options);
        let state = state_from_pool(pool);

        assert!(state.providers().get("github").is_none());
        assert!(state.nodestore().get("missing").await.unwrap().is_none());
    }
}
