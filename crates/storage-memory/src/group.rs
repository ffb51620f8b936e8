// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use async_trait::async_trait;
use purge_data_model::{
    Clock, EntityStatus, Event, Group, GroupAssignee, GroupDependents, GroupHash, GroupMeta,
    GroupRedirect, GroupResolution, Project, Release,
};
use purge_storage::group::{EventRepository, GroupRepository};
use rand_core::RngCore;
use ulid::Ulid;

use crate::{
    MemoryError,
    tables::{TablesMut, remove_where},
};

#[async_trait]
impl GroupRepository for TablesMut<'_> {
    type Error = MemoryError;

    async fn lookup(&mut self, id: Ulid) -> Result<Option<Group>, Self::Error> {
        Ok(self.tables.groups.get(&id).cloned())
    }

    async fn add(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        project: &Project,
        status: EntityStatus,
    ) -> Result<Group, Self::Error> {
        self.faults.check("error_groups")?;

        let created_at = clock.now();
        let group = Group {
            id: Ulid::from_datetime_with_source(created_at.into(), rng),
            project_id: project.id,
            status,
            created_at,
        };

        self.tables.groups.insert(group.id, group.clone());
        Ok(group)
    }

    async fn list_for_project(&mut self, project_id: Ulid) -> Result<Vec<Group>, Self::Error> {
        Ok(self
            .tables
            .groups
            .values()
            .filter(|group| group.project_id == project_id)
            .cloned()
            .collect())
    }

    async fn add_hash(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        group: &Group,
        hash: String,
    ) -> Result<GroupHash, Self::Error> {
        self.faults.check("group_hashes")?;

        let taken = self
            .tables
            .group_hashes
            .values()
            .any(|row| row.project_id == group.project_id && row.hash == hash);
        if taken {
            return Err(MemoryError::Conflict {
                table: "group_hashes",
            });
        }

        let row = GroupHash {
            id: Ulid::from_datetime_with_source(clock.now().into(), rng),
            project_id: group.project_id,
            group_id: group.id,
            hash,
        };

        self.tables.group_hashes.insert(row.id, row.clone());
        Ok(row)
    }

    async fn add_redirect(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        group: &Group,
        previous_group_id: Ulid,
    ) -> Result<GroupRedirect, Self::Error> {
        self.faults.check("group_redirects")?;

        let row = GroupRedirect {
            id: Ulid::from_datetime_with_source(clock.now().into(), rng),
            group_id: group.id,
            previous_group_id,
        };

        self.tables.group_redirects.insert(row.id, row.clone());
        Ok(row)
    }

    async fn add_assignee(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        group: &Group,
        user_id: Ulid,
    ) -> Result<GroupAssignee, Self::Error> {
        self.faults.check("group_assignees")?;

        let row = GroupAssignee {
            id: Ulid::from_datetime_with_source(clock.now().into(), rng),
            group_id: group.id,
            project_id: group.project_id,
            user_id,
        };

        self.tables.group_assignees.insert(row.id, row.clone());
        Ok(row)
    }

    async fn add_meta(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        group: &Group,
        key: String,
        value: String,
    ) -> Result<GroupMeta, Self::Error> {
        self.faults.check("group_metas")?;

        let row = GroupMeta {
            id: Ulid::from_datetime_with_source(clock.now().into(), rng),
            group_id: group.id,
            key,
            value,
        };

        self.tables.group_metas.insert(row.id, row.clone());
        Ok(row)
    }

    async fn add_resolution(
        &mut self,
        rng: &mut (dyn RngCore + Send),
        clock: &dyn Clock,
        group: &Group,
        release: &Release,
    ) -> Result<GroupResolution, Self::Error> {
        self.faults.check("group_resolutions")?;

        let row = GroupResolution {
            id: Ulid::from_datetime_with_source(clock.now().into(), rng),
            group_id: group.id,
            release_id: release.id,
        };

        self.tables.group_resolutions.insert(row.id, row.clone());
        Ok(row)
    }

    async fn dependents(&mut self, group_id: Ulid) -> Result<GroupDependents, Self::Error> {
        let tables = &*self.tables;
        Ok(GroupDependents {
            hashes: tables
                .group_hashes
                .values()
                .filter(|row| row.group_id == group_id)
                .count(),
            redirects: tables
                .group_redirects
                .values()
                .filter(|row| row.group_id == group_id)
                .count(),
            assignees: tables
                .group_assignees
                .values()
                .filter(|row| row.group_id == group_id)
                .count(),
            metas: tables
                .group_metas
                .values()
                .filter(|row| row.group_id == group_id)
                .count(),
            resolutions: tables
                .group_resolutions
                .values()
                .filter(|row| row.group_id == group_id)
                .count(),
        })
    }

    async fn delete_hashes(&mut self, group_id: Ulid) -> Result<usize, Self::Error> {
        self.faults.check("group_hashes")?;
        Ok(remove_where(&mut self.tables.group_hashes, |row| {
            row.group_id == group_id
        }))
    }

    async fn delete_redirects(&mut self, group_id: Ulid) -> Result<usize, Self::Error> {
        self.faults.check("group_redirects")?;
        Ok(remove_where(&mut self.tables.group_redirects, |row| {
            row.group_id == group_id
        }))
    }

    async fn delete_assignees(&mut self, group_id: Ulid) -> Result<usize, Self::Error> {
        self.faults.check("group_assignees")?;
        Ok(remove_where(&mut self.tables.group_assignees, |row| {
            row.group_id == group_id
        }))
    }

    async fn delete_metas(&mut self, group_id: Ulid) -> Result<usize, Self::Error> {
        self.faults.check("group_metas")?;
        Ok(remove_where(&mut self.tables.group_metas, |row| {
            row.group_id == group_id
        }))
    }

    async fn delete_resolutions(&mut self, group_id: Ulid) -> Result<usize, Self::Error> {
        self.faults.check("group_resolutions")?;
        Ok(remove_where(&mut self.tables.group_resolutions, |row| {
            row.group_id == group_id
        }))
    }
}

#[async_trait]
impl EventRepository for TablesMut<'_> {
    type Error = MemoryError;

    async fn add(
        &mut self,
        clock: &dyn Clock,
        group: &Group,
        event_id: String,
    ) -> Result<Event, Self::Error> {
        self.faults.check("events")?;

        let key = (group.project_id, event_id);
        if self.tables.events.contains_key(&key) {
            return Err(MemoryError::Conflict { table: "events" });
        }

        let event = Event {
            project_id: group.project_id,
            event_id: key.1.clone(),
            group_id: group.id,
            created_at: clock.now(),
        };

        self.tables.events.insert(key, event.clone());
        Ok(event)
    }

    async fn list_for_group(&mut self, group_id: Ulid) -> Result<Vec<Event>, Self::Error> {
        let mut events: Vec<Event> = self
            .tables
            .events
            .values()
            .filter(|event| event.group_id == group_id)
            .cloned()
            .collect();
        events.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.event_id.cmp(&b.event_id))
        });
        Ok(events)
    }

    async fn delete_for_group(&mut self, group_id: Ulid) -> Result<usize, Self::Error> {
        self.faults.check("events")?;
        Ok(remove_where(&mut self.tables.events, |event| {
            event.group_id == group_id
        }))
    }
}
