// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use std::{any::Any, panic::AssertUnwindSafe, sync::Arc};

use async_trait::async_trait;
use futures_util::FutureExt;
use purge_data_model::EntityRef;
use ulid::Ulid;

/// Something interested in entities about to be deleted
#[async_trait]
pub trait PendingDeleteListener: Send + Sync {
    /// Called once per scheduled deletion, right before the cascade runs
    ///
    /// # Errors
    ///
    /// Errors are logged and never stop the deletion
    async fn on_pending_delete(&self, entity: EntityRef, actor_id: Option<Ulid>)
    -> anyhow::Result<()>;
}

/// Notifies [`PendingDeleteListener`]s that an entity is about to be deleted
#[derive(Clone, Default)]
pub struct PendingDeleteSignal {
    listeners: Vec<Arc<dyn PendingDeleteListener>>,
}

impl PendingDeleteSignal {
    /// Create a signal without any listener
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a listener
    #[must_use]
    pub fn connect(mut self, listener: impl PendingDeleteListener + 'static) -> Self {
        self.listeners.push(Arc::new(listener));
        self
    }

    /// Notify every listener. Listener failures and panics are logged and
    /// swallowed.
    #[tracing::instrument(
        name = "signal.pending_delete",
        skip_all,
        fields(%entity, actor.id = actor_id.map(tracing::field::display)),
    )]
    pub async fn publish(&self, entity: EntityRef, actor_id: Option<Ulid>) {
        for listener in &self.listeners {
            let res = AssertUnwindSafe(listener.on_pending_delete(entity, actor_id))
                .catch_unwind()
                .await;

            match res {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::warn!(
                        error = &*e as &dyn std::error::Error,
                        "Pending delete listener failed"
                    );
                }
                Err(panic) => {
                    tracing::error!(
                        panic = panic_message(&*panic),
                        "Pending delete listener panicked"
                    );
                }
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}
