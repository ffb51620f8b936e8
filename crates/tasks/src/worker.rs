// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::{sync::CancellationToken, task::TaskTracker};

use crate::{State, reattempt_deletions, run_scheduled_deletions};

/// How often the scheduler and the reaper run, and with which parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerSettings {
    /// Time between two scheduler passes
    pub scheduler_interval: Duration,

    /// Time between two reaper passes
    pub reaper_interval: Duration,

    /// How long a claimed job can stay in progress before it is released
    pub staleness_threshold: chrono::Duration,

    /// How many jobs a single scheduler pass claims at most
    pub batch_size: usize,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            scheduler_interval: Duration::from_secs(60),
            reaper_interval: Duration::from_secs(15 * 60),
            staleness_threshold: chrono::Duration::hours(6),
            batch_size: 100,
        }
    }
}

fn ticker(period: Duration) -> tokio::time::Interval {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

/// Run the scheduler every `period`, until the cancellation token is
/// triggered
pub async fn run_scheduler(
    state: State,
    period: Duration,
    batch_size: usize,
    cancellation_token: CancellationToken,
) {
    // Make sure the whole process shuts down if this task crashes
    let _guard = cancellation_token.clone().drop_guard();
    let mut interval = ticker(period);

    loop {
        tokio::select! {
            () = cancellation_token.cancelled() => {
                tracing::debug!("Shutting down the deletion scheduler");
                break;
            }

            _ = interval.tick() => {}
        }

        match run_scheduled_deletions(&state, batch_size).await {
            Ok(report) if report.total() > 0 => tracing::info!(
                deleted = report.deleted,
                aborted = report.aborted,
                gone = report.gone,
                failed = report.failed,
                "Scheduler pass done"
            ),
            Ok(_) => {}
            Err(e) => tracing::error!(
                error = &e as &dyn std::error::Error,
                "Failed to claim due deletions"
            ),
        }
    }
}

/// Run the reaper every `period`, until the cancellation token is triggered
pub async fn run_reaper(
    state: State,
    period: Duration,
    threshold: chrono::Duration,
    cancellation_token: CancellationToken,
) {
    let _guard = cancellation_token.clone().drop_guard();
    let mut interval = ticker(period);

    loop {
        tokio::select! {
            () = cancellation_token.cancelled() => {
                tracing::debug!("Shutting down the deletion reaper");
                break;
            }

            _ = interval.tick() => {}
        }

        if let Err(e) = reattempt_deletions(&state, threshold).await {
            tracing::error!(
                error = &e as &dyn std::error::Error,
                "Failed to release stale deletions"
            );
        }
    }
}

/// Start the scheduler and the reaper on the task tracker
pub fn init_and_run(
    state: &State,
    settings: WorkerSettings,
    cancellation_token: &CancellationToken,
    task_tracker: &TaskTracker,
) {
    tracing::info!(
        scheduler_interval = ?settings.scheduler_interval,
        reaper_interval = ?settings.reaper_interval,
        staleness_threshold = %settings.staleness_threshold,
        batch_size = settings.batch_size,
        "Starting the deletion worker"
    );

    task_tracker.spawn(run_scheduler(
        state.clone(),
        settings.scheduler_interval,
        settings.batch_size,
        cancellation_token.clone(),
    ));

    task_tracker.spawn(run_reaper(
        state.clone(),
        settings.reaper_interval,
        settings.staleness_threshold,
        cancellation_token.clone(),
    ));
}
