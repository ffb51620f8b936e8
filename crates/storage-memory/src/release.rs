// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use async_trait::async_trait;
use purge_data_model::{
    Clock, Commit, Environment, Organization, Project, Release, ReleaseCommit, ReleaseEnvironment,
};
use purge_storage::release::{EnvironmentRepository, ReleaseRepository};
use rand_core::RngCore;
use ulid::Ulid;

use crate::{
    MemoryError,
    tables::{TablesMut, remove_links_where, remove_where},
};

#[async_trait]
impl ReleaseRepository for TablesMut<'_> {
    type Error = MemoryError;

    async fn lookup(&mut self, id: Ulid) -> Result<Option<Release>, Self::Error> {
        Ok(self.tables.releases.get(&id).cloned())
    }

    async fn add(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        organization: &Organization,
        version: String,
    ) -> Result<Release, Self::Error> {
        self.faults.check("releases")?;

        let created_at = clock.now();
        let release = Release {
            id: Ulid::from_datetime_with_source(created_at.into(), rng),
            organization_id: organization.id,
            version,
            created_at,
        };

        self.tables.releases.insert(release.id, release.clone());
        Ok(release)
    }

    async fn add_project(
        &mut self,
        release: &Release,
        project: &Project,
    ) -> Result<(), Self::Error> {
        self.faults.check("release_projects")?;
        self.tables.release_projects.insert((release.id, project.id));
        Ok(())
    }

    async fn project_ids(&mut self, release_id: Ulid) -> Result<Vec<Ulid>, Self::Error> {
        Ok(self
            .tables
            .release_projects
            .iter()
            .filter(|(release, _)| *release == release_id)
            .map(|(_, project)| *project)
            .collect())
    }

    async fn remove_project_links_for_project(
        &mut self,
        project_id: Ulid,
    ) -> Result<usize, Self::Error> {
        self.faults.check("release_projects")?;
        Ok(remove_links_where(
            &mut self.tables.release_projects,
            |(_, project)| *project == project_id,
        ))
    }

    async fn remove_project_links_for_organization(
        &mut self,
        organization_id: Ulid,
    ) -> Result<usize, Self::Error> {
        self.faults.check("release_projects")?;
        let releases = &self.tables.releases;
        Ok(remove_links_where(
            &mut self.tables.release_projects,
            |(release, _)| {
                releases
                    .get(release)
                    .is_some_and(|release| release.organization_id == organization_id)
            },
        ))
    }

    async fn lookup_commit(&mut self, id: Ulid) -> Result<Option<ReleaseCommit>, Self::Error> {
        Ok(self.tables.release_commits.get(&id).cloned())
    }

    async fn add_commit(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        release: &Release,
        commit: &Commit,
        project: Option<&Project>,
        order: i32,
    ) -> Result<ReleaseCommit, Self::Error> {
        self.faults.check("release_commits")?;

        let release_commit = ReleaseCommit {
            id: Ulid::from_datetime_with_source(clock.now().into(), rng),
            organization_id: release.organization_id,
            release_id: release.id,
            commit_id: commit.id,
            project_id: project.map(|project| project.id),
            order,
        };

        self.tables
            .release_commits
            .insert(release_commit.id, release_commit.clone());
        Ok(release_commit)
    }

    async fn delete_commits_for_repository(
        &mut self,
        repository_id: Ulid,
    ) -> Result<usize, Self::Error> {
        self.faults.check("release_commits")?;
        let commits = &self.tables.commits;
        Ok(remove_where(&mut self.tables.release_commits, |link| {
            commits
                .get(&link.commit_id)
                .is_some_and(|commit| commit.repository_id == repository_id)
        }))
    }

    async fn delete_commits_for_organization(
        &mut self,
        organization_id: Ulid,
    ) -> Result<usize, Self::Error> {
        self.faults.check("release_commits")?;
        Ok(remove_where(&mut self.tables.release_commits, |link| {
            link.organization_id == organization_id
        }))
    }

    async fn delete_for_organization(
        &mut self,
        organization_id: Ulid,
    ) -> Result<usize, Self::Error> {
        self.faults.check("releases")?;

        for release in self
            .tables
            .releases
            .values()
            .filter(|release| release.organization_id == organization_id)
        {
            self.tables.ensure_unreferenced("releases", release.id)?;
        }

        Ok(remove_where(&mut self.tables.releases, |release| {
            release.organization_id == organization_id
        }))
    }
}

#[async_trait]
impl EnvironmentRepository for TablesMut<'_> {
    type Error = MemoryError;

    async fn lookup(&mut self, id: Ulid) -> Result<Option<Environment>, Self::Error> {
        Ok(self.tables.environments.get(&id).cloned())
    }

    async fn add(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        organization: &Organization,
        name: String,
    ) -> Result<Environment, Self::Error> {
        self.faults.check("environments")?;

        let created_at = clock.now();
        let environment = Environment {
            id: Ulid::from_datetime_with_source(created_at.into(), rng),
            organization_id: organization.id,
            name,
            created_at,
        };

        self.tables
            .environments
            .insert(environment.id, environment.clone());
        Ok(environment)
    }

    async fn add_project(
        &mut self,
        environment: &Environment,
        project: &Project,
    ) -> Result<(), Self::Error> {
        self.faults.check("environment_projects")?;
        self.tables
            .environment_projects
            .insert((environment.id, project.id));
        Ok(())
    }

    async fn project_ids(&mut self, environment_id: Ulid) -> Result<Vec<Ulid>, Self::Error> {
        Ok(self
            .tables
            .environment_projects
            .iter()
            .filter(|(environment, _)| *environment == environment_id)
            .map(|(_, project)| *project)
            .collect())
    }

    async fn remove_project_links_for_project(
        &mut self,
        project_id: Ulid,
    ) -> Result<usize, Self::Error> {
        self.faults.check("environment_projects")?;
        Ok(remove_links_where(
            &mut self.tables.environment_projects,
            |(_, project)| *project == project_id,
        ))
    }

    async fn remove_project_links_for_organization(
        &mut self,
        organization_id: Ulid,
    ) -> Result<usize, Self::Error> {
        self.faults.check("environment_projects")?;
        let environments = &self.tables.environments;
        Ok(remove_links_where(
            &mut self.tables.environment_projects,
            |(environment, _)| {
                environments
                    .get(environment)
                    .is_some_and(|environment| environment.organization_id == organization_id)
            },
        ))
    }

    async fn lookup_release(
        &mut self,
        id: Ulid,
    ) -> Result<Option<ReleaseEnvironment>, Self::Error> {
        Ok(self.tables.release_environments.get(&id).cloned())
    }

    async fn add_release(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        release: &Release,
        environment: &Environment,
        project: Option<&Project>,
    ) -> Result<ReleaseEnvironment, Self::Error> {
        self.faults.check("release_environments")?;

        let first_seen = clock.now();
        let release_environment = ReleaseEnvironment {
            id: Ulid::from_datetime_with_source(first_seen.into(), rng),
            organization_id: release.organization_id,
            release_id: release.id,
            environment_id: environment.id,
            project_id: project.map(|project| project.id),
            first_seen,
        };

        self.tables
            .release_environments
            .insert(release_environment.id, release_environment.clone());
        Ok(release_environment)
    }

    async fn delete_releases_for_organization(
        &mut self,
        organization_id: Ulid,
    ) -> Result<usize, Self::Error> {
        self.faults.check("release_environments")?;
        Ok(remove_where(&mut self.tables.release_environments, |row| {
            row.organization_id == organization_id
        }))
    }

    async fn delete_for_organization(
        &mut self,
        organization_id: Ulid,
    ) -> Result<usize, Self::Error> {
        self.faults.check("environments")?;

        for environment in self
            .tables
            .environments
            .values()
            .filter(|environment| environment.organization_id == organization_id)
        {
            self.tables
                .ensure_unreferenced("environments", environment.id)?;
        }

        Ok(remove_where(&mut self.tables.environments, |environment| {
            environment.organization_id == organization_id
        }))
    }
}
