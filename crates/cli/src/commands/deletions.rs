// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use std::process::ExitCode;

use clap::Parser;
use figment::Figment;
use purge_config::{ConfigurationSection, RootConfig};
use purge_data_model::{EntityKind, EntityRef};
use tracing::{info, info_span, warn};
use ulid::Ulid;

use crate::util::{database_pool_from_config, state_from_pool};

#[derive(Parser, Debug)]
pub(super) struct Options {
    #[command(subcommand)]
    subcommand: Subcommand,
}

#[derive(Parser, Debug)]
enum Subcommand {
    /// Schedule the deletion of an entity
    ///
    /// The entity should already be marked as pending deletion, otherwise
    /// the job is dropped once it runs.
    Schedule {
        /// The kind of entity, like `organization` or `api_application`
        kind: EntityKind,

        /// The ID of the entity
        id: Ulid,

        /// Days to wait before deleting the entity. Defaults to the
        /// configured delay.
        #[arg(long)]
        delay_days: Option<u32>,

        /// The user who requested the deletion
        #[arg(long)]
        actor: Option<Ulid>,
    },

    /// Run a single scheduler pass
    RunOnce,

    /// Release the jobs which have been in progress for too long
    Reattempt,
}

impl Options {
    pub async fn run(self, figment: &Figment) -> anyhow::Result<ExitCode> {
        use Subcommand as SC;

        let config = RootConfig::extract(figment).map_err(anyhow::Error::from_boxed)?;
        let pool = database_pool_from_config(&config.database).await?;
        let state = state_from_pool(pool);

        match self.subcommand {
            SC::Schedule {
                kind,
                id,
                delay_days,
                actor,
            } => {
                let _span = info_span!("cli.deletions.schedule").entered();
                let delay = delay_days.map_or(config.deletions.default_delay, |days| {
                    chrono::Duration::days(days.into())
                });

                let entity = EntityRef::new(kind, id);
                match purge_tasks::schedule(&state, entity, actor, delay).await {
                    Ok(job) => {
                        info!(
                            scheduled_deletion.id = %job.id,
                            date_scheduled = %job.date_scheduled,
                            "Deletion scheduled",
                        );
                    }
                    Err(purge_tasks::ScheduleError::Conflict { existing, .. }) => {
                        warn!(
                            scheduled_deletion.id = existing.map(tracing::field::display),
                            "A deletion is already scheduled for {entity}",
                        );
                        return Ok(ExitCode::FAILURE);
                    }
                    Err(e) => return Err(e.into()),
                }
            }

            SC::RunOnce => {
                let _span = info_span!("cli.deletions.run_once").entered();
                let report =
                    purge_tasks::run_scheduled_deletions(&state, config.deletions.batch_size)
                        .await?;

                info!(
                    deleted = report.deleted,
                    aborted = report.aborted,
                    gone = report.gone,
                    failed = report.failed,
                    "Scheduler pass done",
                );

                if report.failed > 0 {
                    return Ok(ExitCode::FAILURE);
                }
            }

            SC::Reattempt => {
                let _span = info_span!("cli.deletions.reattempt").entered();
                let released =
                    purge_tasks::reattempt_deletions(&state, config.deletions.staleness_threshold)
                        .await?;

                info!(released, "Released stale deletions");
            }
        }

        Ok(ExitCode::SUCCESS)
    }
}
