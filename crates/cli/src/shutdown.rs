// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use std::time::Duration;

use tokio::signal::unix::{Signal, SignalKind};
use tokio_util::{sync::CancellationToken, task::TaskTracker};

/// Graceful shutdown of the worker
///
/// The first SIGTERM or SIGINT triggers a soft shutdown: the loops stop
/// picking up new work, and the passes currently running get to finish. A
/// second signal, or the timeout, returns right away, dropping whatever is
/// still running with the runtime.
///
/// A task stopping on its own also triggers the soft shutdown, through its
/// drop guard on the soft shutdown token.
pub struct ShutdownManager {
    soft_shutdown_token: CancellationToken,
    task_tracker: TaskTracker,
    sigterm: Signal,
    sigint: Signal,
    timeout: Duration,
}

impl ShutdownManager {
    /// Create a new shutdown manager, installing the signal handlers
    ///
    /// # Errors
    ///
    /// Returns an error if the signal handler could not be installed
    pub fn new() -> Result<Self, std::io::Error> {
        let soft_shutdown_token = CancellationToken::new();
        let sigterm = tokio::signal::unix::signal(SignalKind::terminate())?;
        let sigint = tokio::signal::unix::signal(SignalKind::interrupt())?;
        let timeout = Duration::from_secs(60);
        let task_tracker = TaskTracker::new();

        Ok(Self {
            soft_shutdown_token,
            task_tracker,
            sigterm,
            sigint,
            timeout,
        })
    }

    #[must_use]
    pub fn task_tracker(&self) -> &TaskTracker {
        &self.task_tracker
    }

    /// Token cancelled once the deletion loops should stop
    #[must_use]
    pub fn soft_shutdown_token(&self) -> CancellationToken {
        self.soft_shutdown_token.clone()
    }

    /// Run until we finish completely shutting down.
    pub async fn run(mut self) {
        tokio::select! {
            _ = self.sigterm.recv() => {
                tracing::info!("Shutdown signal received (SIGTERM), shutting down");
            },
            _ = self.sigint.recv() => {
                tracing::info!("Shutdown signal received (SIGINT), shutting down");
            },
            () = self.soft_shutdown_token.cancelled() => {
                tracing::warn!("A background task stopped, shutting down");
            },
        };

        self.soft_shutdown_token.cancel();
        self.task_tracker.close();

        let timeout = tokio::time::sleep(self.timeout);
        tokio::select! {
            _ = self.sigterm.recv() => {
                tracing::warn!("Second shutdown signal received (SIGTERM), abort");
            },
            _ = self.sigint.recv() => {
                tracing::warn!("Second shutdown signal received (SIGINT), abort");
            },
            () = timeout => {
                tracing::warn!("Shutdown timeout reached, abort");
            },
            () = self.task_tracker.wait() => {
                tracing::info!("All tasks are done, exiting");
            },
        }
    }
}
