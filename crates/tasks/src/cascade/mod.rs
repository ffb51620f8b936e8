// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

//! Cascade executors
//!
//! A cascade deletes an entity along with every record depending on it, in a
//! single transaction. Each kind of entity has its own, fixed, order of
//! dependents:
//!
//! - [`OrganizationExecutor`]: teams and projects (through their own
//!   cascades), environments, releases, commits, commit authors, repositories
//!   (through their own cascade) and alert rules
//! - [`TeamExecutor`]: detaches the rules owned by the team, then removes its
//!   project links
//! - [`ProjectExecutor`]: team, release and environment links, rules and
//!   groups (through their own cascade)
//! - [`GroupExecutor`]: hashes, redirects, assignees, metadata, resolutions
//!   and events
//! - [`ApiApplicationExecutor`]: grants and tokens
//! - [`RepositoryExecutor`]: release commits and commits of the repository
//!
//! Kinds without a dedicated executor use the [`GenericExecutor`], which only
//! deletes the entity row.
//!
//! Before touching anything, an executor checks that the entity is still
//! pending deletion, and fails with [`CascadeError::Aborted`] otherwise. An
//! entity which does not exist anymore is considered deleted. Every step
//! deletes rows by foreign key, so running a cascade twice is harmless.
//!
//! Side effects outside of the database, like deleting event payloads from the
//! node store, are collected in a [`PostCommit`] and must only be run once the
//! transaction has been committed.

use std::{collections::BTreeMap, sync::Arc};

use async_trait::async_trait;
use purge_data_model::{CodeRepository, Deletable, EntityKind, EntityRef, EntityStatus};
use purge_storage::{BoxRepository, RepositoryError};
use thiserror::Error;
use ulid::Ulid;

use crate::State;

mod api;
mod generic;
mod group;
mod organization;
mod project;
mod repository;
mod team;

pub use self::{
    api::ApiApplicationExecutor,
    generic::GenericExecutor,
    group::{GroupExecutor, delete_groups},
    organization::OrganizationExecutor,
    project::ProjectExecutor,
    repository::RepositoryExecutor,
    team::TeamExecutor,
};

/// An error which occurred while running a cascade
#[derive(Debug, Error)]
pub enum CascadeError {
    /// The entity is not pending deletion anymore, nothing was deleted
    #[error("deletion of {entity} aborted, its status is {status}")]
    Aborted {
        /// The entity which was about to be deleted
        entity: EntityRef,

        /// Its current status
        status: EntityStatus,
    },

    /// The storage backend failed
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Fail with [`CascadeError::Aborted`] unless the entity is pending deletion
pub(crate) fn ensure_pending<T: Deletable>(entity: &T) -> Result<(), CascadeError> {
    let status = entity.status();
    if status.is_pending_deletion() {
        Ok(())
    } else {
        Err(CascadeError::Aborted {
            entity: entity.entity_ref(),
            status,
        })
    }
}

/// What a cascade step does to the dependent rows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Action {
    /// The rows are deleted
    Delete,

    /// The rows are kept, but their reference to the entity is cleared
    Detach,
}

impl Action {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Delete => "delete",
            Self::Detach => "detach",
        }
    }
}

/// Log the outcome of a cascade step
pub(crate) fn step(entity: EntityRef, action: Action, dependent: &'static str, count: usize) {
    tracing::debug!(
        %entity,
        action = action.as_str(),
        dependent,
        count,
        "Cascade step done"
    );
}

/// Side effects of a cascade, to run once its transaction is committed
#[derive(Debug, Default)]
#[must_use]
pub struct PostCommit {
    node_ids: Vec<String>,
    repositories: Vec<CodeRepository>,
}

impl PostCommit {
    /// The node store keys of the event payloads to delete
    #[must_use]
    pub fn node_ids(&self) -> &[String] {
        &self.node_ids
    }

    /// The repositories to deregister from their provider
    #[must_use]
    pub fn repositories(&self) -> &[CodeRepository] {
        &self.repositories
    }

    /// Returns `true` if there is nothing to do after the commit
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.node_ids.is_empty() && self.repositories.is_empty()
    }

    pub(crate) fn delete_node(&mut self, node_id: String) {
        self.node_ids.push(node_id);
    }

    pub(crate) fn deregister(&mut self, repository: CodeRepository) {
        self.repositories.push(repository);
    }

    /// Merge the actions of another cascade into this one
    pub fn extend(&mut self, other: PostCommit) {
        self.node_ids.extend(other.node_ids);
        self.repositories.extend(other.repositories);
    }

    /// Run the side effects. Failures are logged, never returned: the rows
    /// are already gone at this point.
    pub async fn run(self, state: &State) {
        if !self.node_ids.is_empty() {
            match state.nodestore().delete_many(&self.node_ids).await {
                Ok(()) => tracing::debug!(count = self.node_ids.len(), "Deleted event payloads"),
                Err(e) => tracing::error!(
                    error = &e as &dyn std::error::Error,
                    count = self.node_ids.len(),
                    "Failed to delete event payloads, they are left orphaned"
                ),
            }
        }

        for repository in &self.repositories {
            state.providers().deregister(repository).await;
        }
    }
}

/// Deletes one kind of entity and its dependents
#[async_trait]
pub trait CascadeExecutor: Send + Sync {
    /// Run the cascade for the entity `id`, inside the transaction `repo`.
    ///
    /// The caller is responsible for saving the transaction and then running
    /// the returned [`PostCommit`].
    ///
    /// # Errors
    ///
    /// Returns [`CascadeError::Aborted`] if the entity is not pending
    /// deletion, or [`CascadeError::Repository`] if the storage backend
    /// failed. In both cases the transaction should be cancelled.
    async fn execute(&self, repo: &mut BoxRepository, id: Ulid)
    -> Result<PostCommit, CascadeError>;
}

/// Maps each [`EntityKind`] to its [`CascadeExecutor`]
#[derive(Clone)]
pub struct ExecutorRegistry {
    executors: BTreeMap<EntityKind, Arc<dyn CascadeExecutor>>,
}

impl Default for ExecutorRegistry {
    fn default() -> Self {
        Self::empty()
            .register(EntityKind::Organization, OrganizationExecutor)
            .register(EntityKind::Team, TeamExecutor)
            .register(EntityKind::Project, ProjectExecutor)
            .register(EntityKind::Repository, RepositoryExecutor)
            .register(EntityKind::Group, GroupExecutor)
            .register(EntityKind::ApiApplication, ApiApplicationExecutor)
    }
}

impl ExecutorRegistry {
    /// A registry without any dedicated executor, every kind uses the
    /// [`GenericExecutor`]
    #[must_use]
    pub fn empty() -> Self {
        Self {
            executors: BTreeMap::new(),
        }
    }

    /// Register the executor for a kind, replacing the previous one
    #[must_use]
    pub fn register(mut self, kind: EntityKind, executor: impl CascadeExecutor + 'static) -> Self {
        self.executors.insert(kind, Arc::new(executor));
        self
    }

    /// Get the executor for a kind
    #[must_use]
    pub fn get(&self, kind: EntityKind) -> Arc<dyn CascadeExecutor> {
        match self.executors.get(&kind) {
            Some(executor) => Arc::clone(executor),
            None => Arc::new(GenericExecutor::new(kind)),
        }
    }
}
