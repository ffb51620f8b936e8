// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use figment::Figment;
use purge_config::{ConfigurationSectionExt, DatabaseConfig};
use purge_storage_pg::MIGRATOR;
use tracing::{Instrument, info, info_span};

use crate::util::database_connection_from_config;

#[derive(Parser, Debug)]
pub(super) struct Options {
    #[command(subcommand)]
    subcommand: Subcommand,
}

#[derive(Parser, Debug)]
enum Subcommand {
    /// Run database migrations
    Migrate,
}

impl Options {
    pub async fn run(self, figment: &Figment) -> anyhow::Result<ExitCode> {
        let Subcommand::Migrate = self.subcommand;

        let _span = info_span!("cli.database.migrate").entered();
        let config =
            DatabaseConfig::extract_or_default(figment).map_err(anyhow::Error::from_boxed)?;
        let mut conn = database_connection_from_config(&config).await?;

        MIGRATOR
            .run(&mut conn)
            .instrument(info_span!("db.migrate"))
            .await
            .context("could not run migrations")?;

        info!("Database is up to date");
        Ok(ExitCode::SUCCESS)
    }
}
