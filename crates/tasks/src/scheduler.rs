// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use std::sync::LazyLock;

use opentelemetry::{Key, KeyValue, metrics::Counter};
use purge_data_model::ScheduledDeletion;
use purge_storage::{RepositoryAccess, RepositoryError};

use crate::{CascadeError, METER, State};

static JOBS_COUNTER: LazyLock<Counter<u64>> = LazyLock::new(|| {
    METER
        .u64_counter("purge.deletion.jobs")
        .with_description("How many scheduled deletions were processed")
        .with_unit("{job}")
        .build()
});
const RESULT: Key = Key::from_static_str("result");

/// How a single scheduled deletion ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    /// The entity and the job were deleted
    Deleted,

    /// The entity was not pending deletion, only the job was deleted
    Aborted,

    /// The entity did not exist anymore, only the job was deleted
    Gone,

    /// Something failed, the job stays claimed until the reaper releases it
    Failed,
}

impl Outcome {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Deleted => "deleted",
            Self::Aborted => "aborted",
            Self::Gone => "gone",
            Self::Failed => "failed",
        }
    }
}

/// What happened during one scheduler pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerReport {
    /// Entities deleted along with their job
    pub deleted: usize,

    /// Jobs dropped because their entity was not pending deletion
    pub aborted: usize,

    /// Jobs dropped because their entity was already gone
    pub gone: usize,

    /// Jobs which failed and are left claimed
    pub failed: usize,
}

impl SchedulerReport {
    /// The number of jobs claimed during the pass
    #[must_use]
    pub fn total(&self) -> usize {
        self.deleted + self.aborted + self.gone + self.failed
    }

    fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Deleted => self.deleted += 1,
            Outcome::Aborted => self.aborted += 1,
            Outcome::Gone => self.gone += 1,
            Outcome::Failed => self.failed += 1,
        }
    }
}

/// Claim the due scheduled deletions and run them, one after the other.
///
/// At most `batch_size` jobs are claimed. A job which fails stays claimed:
/// [`reattempt_deletions`] releases it once it becomes stale.
///
/// # Errors
///
/// Returns an error if the due jobs could not be claimed. Failures of
/// individual jobs are logged and counted in the [`SchedulerReport`].
///
/// [`reattempt_deletions`]: crate::reattempt_deletions
#[tracing::instrument(name = "job.run_scheduled_deletions", skip_all)]
pub async fn run_scheduled_deletions(
    state: &State,
    batch_size: usize,
) -> Result<SchedulerReport, RepositoryError> {
    let mut repo = state.repository().await?;
    let jobs = repo
        .scheduled_deletion()
        .claim_due(state.clock().now(), batch_size)
        .await?;
    repo.save().await?;

    let mut report = SchedulerReport::default();
    if jobs.is_empty() {
        tracing::debug!("No deletion due");
        return Ok(report);
    }

    tracing::info!(count = jobs.len(), "Claimed due deletions");

    for job in &jobs {
        let outcome = run_job(state, job).await;
        JOBS_COUNTER.add(1, &[KeyValue::new(RESULT, outcome.as_str())]);
        report.record(outcome);
    }

    Ok(report)
}

#[tracing::instrument(
    name = "job.scheduled_deletion",
    skip_all,
    fields(
        scheduled_deletion.id = %job.id,
        entity = %job.entity(),
    ),
)]
async fn run_job(state: &State, job: &ScheduledDeletion) -> Outcome {
    match try_run_job(state, job).await {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::error!(
                error = &e as &dyn std::error::Error,
                "Scheduled deletion failed, it will be retried once released"
            );
            Outcome::Failed
        }
    }
}

async fn try_run_job(state: &State, job: &ScheduledDeletion) -> Result<Outcome, RepositoryError> {
    let entity = job.entity();

    let mut repo = state.repository().await?;
    if repo.entity().lookup_status(entity).await?.is_none() {
        repo.scheduled_deletion().delete(job.id).await?;
        repo.save().await?;
        tracing::info!("Entity is already gone, dropped the job");
        return Ok(Outcome::Gone);
    }
    repo.cancel().await?;

    state.signal().publish(entity, job.actor_id).await;

    let executor = state.executors().get(entity.kind);
    let mut repo = state.repository().await?;
    match executor.execute(&mut repo, entity.id).await {
        Ok(post_commit) => {
            repo.scheduled_deletion().delete(job.id).await?;
            repo.save().await?;
            post_commit.run(state).await;

            tracing::info!("Entity deleted");
            Ok(Outcome::Deleted)
        }

        Err(CascadeError::Aborted { status, .. }) => {
            repo.cancel().await?;

            let mut repo = state.repository().await?;
            repo.scheduled_deletion().delete(job.id).await?;
            repo.save().await?;

            tracing::info!(%status, "Entity is not pending deletion, dropped the job");
            Ok(Outcome::Aborted)
        }

        Err(CascadeError::Repository(e)) => {
            repo.cancel().await?;
            Err(e)
        }
    }
}
