// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use std::sync::LazyLock;

use chrono::Duration;
use opentelemetry::metrics::Counter;
use purge_storage::{RepositoryAccess, RepositoryError};

use crate::{METER, State};

static RELEASED_COUNTER: LazyLock<Counter<u64>> = LazyLock::new(|| {
    METER
        .u64_counter("purge.deletion.released")
        .with_description("How many stale scheduled deletions were released for a retry")
        .with_unit("{job}")
        .build()
});

/// Release the scheduled deletions which were claimed, but did not complete
/// within `threshold` of their scheduled date, so that the scheduler picks
/// them up again.
///
/// Returns how many jobs were released.
///
/// # Errors
///
/// Returns an error if the storage backend fails
#[tracing::instrument(name = "job.reattempt_deletions", skip_all)]
pub async fn reattempt_deletions(
    state: &State,
    threshold: Duration,
) -> Result<usize, RepositoryError> {
    let mut repo = state.repository().await?;
    let released = repo
        .scheduled_deletion()
        .release_stale(state.clock().now(), threshold)
        .await?;
    repo.save().await?;

    if released == 0 {
        tracing::debug!("No stale deletion to release");
    } else {
        tracing::warn!(count = released, "Released stale deletions");
        RELEASED_COUNTER.add(u64::try_from(released).unwrap_or(u64::MAX), &[]);
    }

    Ok(released)
}
