// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

//! Entry points running a cascade right away, without going through a
//! scheduled deletion
//!
//! Each of them runs in its own transaction. The post-commit actions of the
//! cascade run once the transaction is committed.

use chrono::{DateTime, Utc};
use purge_data_model::EntityRef;
use purge_storage::{RepositoryAccess, RepositoryError};
use ulid::Ulid;

use crate::{
    CascadeError, State,
    cascade::{
        self, ApiApplicationExecutor, CascadeExecutor, GenericExecutor, OrganizationExecutor,
        ProjectExecutor, RepositoryExecutor, TeamExecutor,
    },
};

async fn execute(
    state: &State,
    executor: &dyn CascadeExecutor,
    id: Ulid,
) -> Result<(), CascadeError> {
    let mut repo = state.repository().await?;

    let post_commit = match executor.execute(&mut repo, id).await {
        Ok(post_commit) => post_commit,
        Err(e) => {
            repo.cancel().await?;
            return Err(e);
        }
    };

    repo.save().await?;
    post_commit.run(state).await;
    Ok(())
}

/// Delete an organization and everything it owns
///
/// # Errors
///
/// Returns [`CascadeError::Aborted`] if the organization is not pending
/// deletion, or [`CascadeError::Repository`] if the storage backend fails
#[tracing::instrument(name = "job.delete_organization", skip_all, fields(organization.id = %id), err)]
pub async fn delete_organization(state: &State, id: Ulid) -> Result<(), CascadeError> {
    execute(state, &OrganizationExecutor, id).await
}

/// Delete a team, keeping the rules it owned
///
/// # Errors
///
/// Returns [`CascadeError::Aborted`] if the team is not pending deletion, or
/// [`CascadeError::Repository`] if the storage backend fails
#[tracing::instrument(name = "job.delete_team", skip_all, fields(team.id = %id), err)]
pub async fn delete_team(state: &State, id: Ulid) -> Result<(), CascadeError> {
    execute(state, &TeamExecutor, id).await
}

/// Delete a project, its rules and its groups
///
/// # Errors
///
/// Returns [`CascadeError::Aborted`] if the project is not pending deletion,
/// or [`CascadeError::Repository`] if the storage backend fails
#[tracing::instrument(name = "job.delete_project", skip_all, fields(project.id = %id), err)]
pub async fn delete_project(state: &State, id: Ulid) -> Result<(), CascadeError> {
    execute(state, &ProjectExecutor, id).await
}

/// Delete a set of groups, in a single transaction
///
/// # Errors
///
/// Returns [`CascadeError::Aborted`] if any of the groups is not pending
/// deletion, in which case none of them is deleted, or
/// [`CascadeError::Repository`] if the storage backend fails
#[tracing::instrument(name = "job.delete_groups", skip_all, fields(count = ids.len()), err)]
pub async fn delete_groups(state: &State, ids: &[Ulid]) -> Result<(), CascadeError> {
    let mut repo = state.repository().await?;

    let post_commit = match cascade::delete_groups(&mut repo, ids).await {
        Ok(post_commit) => post_commit,
        Err(e) => {
            repo.cancel().await?;
            return Err(e);
        }
    };

    repo.save().await?;
    post_commit.run(state).await;
    Ok(())
}

/// Delete an API application with its grants and tokens
///
/// # Errors
///
/// Returns [`CascadeError::Aborted`] if the application is not pending
/// deletion, or [`CascadeError::Repository`] if the storage backend fails
#[tracing::instrument(
    name = "job.delete_api_application",
    skip_all,
    fields(api_application.id = %id),
    err,
)]
pub async fn delete_api_application(state: &State, id: Ulid) -> Result<(), CascadeError> {
    execute(state, &ApiApplicationExecutor, id).await
}

/// Delete a code repository and its commits
///
/// # Errors
///
/// Returns [`CascadeError::Aborted`] if the repository is not pending
/// deletion, or [`CascadeError::Repository`] if the storage backend fails
#[tracing::instrument(name = "job.delete_repository", skip_all, fields(repository.id = %id), err)]
pub async fn delete_repository(state: &State, id: Ulid) -> Result<(), CascadeError> {
    execute(state, &RepositoryExecutor, id).await
}

/// Delete a single entity row, if it is pending deletion, without looking at
/// its dependents
///
/// # Errors
///
/// Returns [`CascadeError::Aborted`] if the entity is not pending deletion,
/// or [`CascadeError::Repository`] if the storage backend fails, including
/// when other rows still reference the entity
#[tracing::instrument(name = "job.generic_delete", skip_all, fields(%entity), err)]
pub async fn generic_delete(state: &State, entity: EntityRef) -> Result<(), CascadeError> {
    execute(state, &GenericExecutor::new(entity.kind), entity.id).await
}

/// Revoke the tokens of an API application.
///
/// With a `cutoff`, only the tokens created at or before it are revoked. The
/// application itself is left untouched, whatever its status.
///
/// Returns how many tokens were revoked.
///
/// # Errors
///
/// Returns an error if the storage backend fails
#[tracing::instrument(
    name = "job.revoke_api_tokens",
    skip_all,
    fields(
        api_application.id = %application_id,
        cutoff = cutoff.map(tracing::field::display),
    ),
    err,
)]
pub async fn revoke_api_tokens(
    state: &State,
    application_id: Ulid,
    cutoff: Option<DateTime<Utc>>,
) -> Result<usize, RepositoryError> {
    let mut repo = state.repository().await?;
    let count = repo
        .api_token()
        .delete_for_application(application_id, cutoff)
        .await?;
    repo.save().await?;

    if count == 0 {
        tracing::debug!("No token to revoke");
    } else {
        tracing::info!(count, "Revoked API tokens");
    }

    Ok(count)
}
