// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use std::process::ExitCode;

use clap::Parser;
use figment::Figment;
use purge_config::{ConfigurationSection, RootConfig};
use tracing::{info, info_span};

use crate::{
    shutdown::ShutdownManager,
    util::{database_pool_from_config, state_from_pool, worker_settings_from_config},
};

#[derive(Parser, Debug, Default)]
pub(super) struct Options {}

impl Options {
    pub async fn run(self, figment: &Figment) -> anyhow::Result<ExitCode> {
        let shutdown = ShutdownManager::new()?;
        let span = info_span!("cli.worker.init").entered();
        let config = RootConfig::extract(figment).map_err(anyhow::Error::from_boxed)?;

        info!("Connecting to the database");
        let pool = database_pool_from_config(&config.database).await?;
        let state = state_from_pool(pool);
        let settings = worker_settings_from_config(&config.deletions);
        drop(config);

        info!(?settings, "Starting the deletion worker");
        purge_tasks::init_and_run(
            &state,
            settings,
            &shutdown.soft_shutdown_token(),
            shutdown.task_tracker(),
        );
        span.exit();

        shutdown.run().await;

        Ok(ExitCode::SUCCESS)
    }
}
