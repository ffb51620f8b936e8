// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use async_trait::async_trait;
use purge_data_model::{Clock, CodeRepository, Commit, CommitAuthor, EntityStatus, Organization};
use purge_storage::vcs::{CodeRepositoryRepository, CommitRepository};
use rand_core::RngCore;
use ulid::Ulid;

use crate::{
    MemoryError,
    tables::{TablesMut, remove_where},
};

impl TablesMut<'_> {
    /// Delete the commits matching `predicate`, once no release references
    /// them anymore
    fn delete_commits_where(
        &mut self,
        predicate: impl Fn(&Commit) -> bool,
    ) -> Result<usize, MemoryError> {
        self.faults.check("commits")?;

        for commit in self.tables.commits.values().filter(|&commit| predicate(commit)) {
            self.tables.ensure_unreferenced("commits", commit.id)?;
        }

        Ok(remove_where(&mut self.tables.commits, predicate))
    }
}

#[async_trait]
impl CodeRepositoryRepository for TablesMut<'_> {
    type Error = MemoryError;

    async fn lookup(&mut self, id: Ulid) -> Result<Option<CodeRepository>, Self::Error> {
        Ok(self.tables.code_repositories.get(&id).cloned())
    }

    async fn add(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        organization: &Organization,
        name: String,
        provider: Option<String>,
        status: EntityStatus,
    ) -> Result<CodeRepository, Self::Error> {
        self.faults.check("code_repositories")?;

        let created_at = clock.now();
        let repository = CodeRepository {
            id: Ulid::from_datetime_with_source(created_at.into(), rng),
            organization_id: organization.id,
            name,
            provider,
            status,
            created_at,
        };

        self.tables
            .code_repositories
            .insert(repository.id, repository.clone());
        Ok(repository)
    }

    async fn list_for_organization(
        &mut self,
        organization_id: Ulid,
    ) -> Result<Vec<CodeRepository>, Self::Error> {
        Ok(self
            .tables
            .code_repositories
            .values()
            .filter(|repository| repository.organization_id == organization_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl CommitRepository for TablesMut<'_> {
    type Error = MemoryError;

    async fn lookup(&mut self, id: Ulid) -> Result<Option<Commit>, Self::Error> {
        Ok(self.tables.commits.get(&id).cloned())
    }

    async fn add(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        repository: &CodeRepository,
        author: Option<&CommitAuthor>,
        key: String,
    ) -> Result<Commit, Self::Error> {
        self.faults.check("commits")?;

        if self
            .tables
            .commits
            .values()
            .any(|commit| commit.repository_id == repository.id && commit.key == key)
        {
            return Err(MemoryError::Conflict { table: "commits" });
        }

        let created_at = clock.now();
        let commit = Commit {
            id: Ulid::from_datetime_with_source(created_at.into(), rng),
            organization_id: repository.organization_id,
            repository_id: repository.id,
            author_id: author.map(|author| author.id),
            key,
            created_at,
        };

        self.tables.commits.insert(commit.id, commit.clone());
        Ok(commit)
    }

    async fn lookup_author(&mut self, id: Ulid) -> Result<Option<CommitAuthor>, Self::Error> {
        Ok(self.tables.commit_authors.get(&id).cloned())
    }

    async fn add_author(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        organization: &Organization,
        name: String,
        email: String,
    ) -> Result<CommitAuthor, Self::Error> {
        self.faults.check("commit_authors")?;

        let author = CommitAuthor {
            id: Ulid::from_datetime_with_source(clock.now().into(), rng),
            organization_id: organization.id,
            name,
            email,
        };

        self.tables.commit_authors.insert(author.id, author.clone());
        Ok(author)
    }

    async fn delete_for_repository(&mut self, repository_id: Ulid) -> Result<usize, Self::Error> {
        self.delete_commits_where(|commit| commit.repository_id == repository_id)
    }

    async fn delete_for_organization(
        &mut self,
        organization_id: Ulid,
    ) -> Result<usize, Self::Error> {
        self.delete_commits_where(|commit| commit.organization_id == organization_id)
    }

    async fn delete_authors_for_organization(
        &mut self,
        organization_id: Ulid,
    ) -> Result<usize, Self::Error> {
        self.faults.check("commit_authors")?;

        for author in self
            .tables
            .commit_authors
            .values()
            .filter(|author| author.organization_id == organization_id)
        {
            self.tables.ensure_unreferenced("commit_authors", author.id)?;
        }

        Ok(remove_where(&mut self.tables.commit_authors, |author| {
            author.organization_id == organization_id
        }))
    }
}
