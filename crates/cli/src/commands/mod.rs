// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::Parser;
use figment::Figment;

mod config;
mod database;
mod deletions;
mod worker;

#[derive(Parser, Debug)]
enum Subcommand {
    /// Configuration-related commands
    Config(self::config::Options),

    /// Manage the database
    Database(self::database::Options),

    /// Schedule and run deletions by hand
    ///
    /// Event payloads and repository provider integrations are not cleaned up
    /// by this binary, only the database rows are deleted.
    Deletions(self::deletions::Options),

    /// Run the scheduler and the reaper until interrupted
    ///
    /// Event payloads and repository provider integrations are not cleaned up
    /// by this binary, only the database rows are deleted.
    Worker(self::worker::Options),
}

#[derive(Parser, Debug)]
#[command(version)]
pub struct Options {
    /// Path to the configuration file
    #[arg(short, long, global = true, action = clap::ArgAction::Append)]
    config: Vec<Utf8PathBuf>,

    #[command(subcommand)]
    subcommand: Subcommand,
}

impl Options {
    pub async fn run(self, figment: &Figment) -> anyhow::Result<ExitCode> {
        use Subcommand as S;
        match self.subcommand {
            S::Config(c) => Box::pin(c.run(figment)).await,
            S::Database(c) => Box::pin(c.run(figment)).await,
            S::Deletions(c) => Box::pin(c.run(figment)).await,
            S::Worker(c) => Box::pin(c.run(figment)).await,
        }
    }

    /// Load the configuration files, then the `PURGE_` environment variables
    pub fn figment(&self) -> Figment {
        let files = if self.config.is_empty() {
            // Read the PURGE_CONFIG environment variable
            std::env::var("PURGE_CONFIG")
                // Default to "config.yaml"
                .unwrap_or_else(|_| "config.yaml".to_owned())
                // Split the file list on `:`
                .split(':')
                .map(Utf8PathBuf::from)
                .collect()
        } else {
            self.config.clone()
        };

        purge_config::load(&files)
    }
}
