// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use chrono::Duration;
use purge_data_model::{EntityKind, EntityRef, EntityStatus, clock::MockClock};
use purge_storage::{Clock, RepositoryAccess};
use rand::SeedableRng;
use rand_chacha::ChaChaRng;
use sqlx::PgPool;

use crate::PgRepository;

#[sqlx::test(migrator = "crate::MIGRATOR")]
async fn test_scheduled_deletion_claim_and_release(pool: PgPool) {
    let mut rng = ChaChaRng::seed_from_u64(42);
    let clock = MockClock::default();
    let mut repo = PgRepository::from_pool(&pool).await.unwrap().boxed();

    let organization = repo
        .organization()
        .add(
            &mut rng,
            &clock,
            "acme".to_owned(),
            EntityStatus::PendingDeletion,
        )
        .await
        .unwrap();
    let project = repo
        .project()
        .add(
            &mut rng,
            &clock,
            &organization,
            "web".to_owned(),
            EntityStatus::PendingDeletion,
        )
        .await
        .unwrap();

    let due = repo
        .scheduled_deletion()
        .add(
            &mut rng,
            &clock,
            EntityRef::new(EntityKind::Organization, organization.id),
            None,
            clock.now() - Duration::minutes(1),
        )
        .await
        .unwrap()
        .unwrap();
    let later = repo
        .scheduled_deletion()
        .add(
            &mut rng,
            &clock,
            EntityRef::new(EntityKind::Project, project.id),
            None,
            clock.now() + Duration::days(1),
        )
        .await
        .unwrap()
        .unwrap();

    // Only the due job is claimed, and only once
    let claimed = repo
        .scheduled_deletion()
        .claim_due(clock.now(), 10)
        .await
        .unwrap();
    assert_eq!(claimed.len(), 1);
    assert_eq!(claimed[0].id, due.id);
    assert!(claimed[0].in_progress);

    let claimed = repo
        .scheduled_deletion()
        .claim_due(clock.now(), 10)
        .await
        .unwrap();
    assert!(claimed.is_empty());

    // The job was scheduled only a minute ago, so it is not stale yet
    let released = repo
        .scheduled_deletion()
        .release_stale(clock.now(), Duration::hours(6))
        .await
        .unwrap();
    assert_eq!(released, 0);

    clock.advance(Duration::hours(7));
    let released = repo
        .scheduled_deletion()
        .release_stale(clock.now(), Duration::hours(6))
        .await
        .unwrap();
    assert_eq!(released, 1);

    let job = repo.scheduled_deletion().lookup(due.id).await.unwrap().unwrap();
    assert!(!job.in_progress);

    let job = repo
        .scheduled_deletion()
        .find_by_entity(EntityRef::new(EntityKind::Project, project.id))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(job.id, later.id);

    assert!(repo.scheduled_deletion().delete(due.id).await.unwrap());
    assert!(!repo.scheduled_deletion().delete(due.id).await.unwrap());

    repo.save().await.unwrap();
}

#[sqlx::test(migrator = "crate::MIGRATOR")]
async fn test_claim_is_exclusive_across_transactions(pool: PgPool) {
    let mut rng = ChaChaRng::seed_from_u64(42);
    let clock = MockClock::default();

    let mut repo = PgRepository::from_pool(&pool).await.unwrap().boxed();
    for _ in 0..4 {
        let application = repo
            .api_application()
            .add(
                &mut rng,
                &clock,
                ulid::Ulid::from_parts(1, 1),
                "app".to_owned(),
                EntityStatus::PendingDeletion,
            )
            .await
            .unwrap();
        repo.scheduled_deletion()
            .add(
                &mut rng,
                &clock,
                EntityRef::new(EntityKind::ApiApplication, application.id),
                None,
                clock.now(),
            )
            .await
            .unwrap();
    }
    repo.save().await.unwrap();

    let mut first = PgRepository::from_pool(&pool).await.unwrap().boxed();
    let mut second = PgRepository::from_pool(&pool).await.unwrap().boxed();

    let a = first
        .scheduled_deletion()
        .claim_due(clock.now(), 3)
        .await
        .unwrap();
    let b = second
        .scheduled_deletion()
        .claim_due(clock.now(), 3)
        .await
        .unwrap();

    assert_eq!(a.len(), 3);
    assert_eq!(b.len(), 1);
    assert!(a.iter().all(|job| b.iter().all(|other| other.id != job.id)));

    first.save().await.unwrap();
    second.save().await.unwrap();
}

#[sqlx::test(migrator = "crate::MIGRATOR")]
async fn test_entity_status_by_kind(pool: PgPool) {
    let mut rng = ChaChaRng::seed_from_u64(42);
    let clock = MockClock::default();
    let mut repo = PgRepository::from_pool(&pool).await.unwrap().boxed();

    let organization = repo
        .organization()
        .add(&mut rng, &clock, "acme".to_owned(), EntityStatus::Active)
        .await
        .unwrap();
    let team = repo
        .team()
        .add(
            &mut rng,
            &clock,
            &organization,
            "core".to_owned(),
            EntityStatus::Active,
        )
        .await
        .unwrap();

    let entity = EntityRef::new(EntityKind::Team, team.id);
    assert_eq!(
        repo.entity().lookup_status(entity).await.unwrap(),
        Some(EntityStatus::Active)
    );

    assert!(
        repo.entity()
            .set_status(entity, EntityStatus::PendingDeletion)
            .await
            .unwrap()
    );
    let team = repo.team().lookup(team.id).await.unwrap().unwrap();
    assert_eq!(team.status, EntityStatus::PendingDeletion);

    // The team ID does not exist as an organization
    let wrong_kind = EntityRef::new(EntityKind::Organization, team.id);
    assert_eq!(repo.entity().lookup_status(wrong_kind).await.unwrap(), None);

    assert!(repo.entity().delete(entity).await.unwrap());
    assert!(!repo.entity().delete(entity).await.unwrap());
    assert_eq!(repo.entity().lookup_status(entity).await.unwrap(), None);

    repo.save().await.unwrap();
}

#[sqlx::test(migrator = "crate::MIGRATOR")]
async fn test_group_dependents(pool: PgPool) {
    let mut rng = ChaChaRng::seed_from_u64(42);
    let clock = MockClock::default();
    let mut repo = PgRepository::from_pool(&pool).await.unwrap().boxed();

    let organization = repo
        .organization()
        .add(&mut rng, &clock, "acme".to_owned(), EntityStatus::Active)
        .await
        .unwrap();
    let project = repo
        .project()
        .add(
            &mut rng,
            &clock,
            &organization,
            "web".to_owned(),
            EntityStatus::Active,
        )
        .await
        .unwrap();
    let release = repo
        .release()
        .add(&mut rng, &clock, &organization, "1.0.0".to_owned())
        .await
        .unwrap();
    let group = repo
        .group()
        .add(&mut rng, &clock, &project, EntityStatus::Active)
        .await
        .unwrap();

    assert!(repo.group().dependents(group.id).await.unwrap().is_empty());

    repo.group()
        .add_hash(&mut rng, &clock, &group, "a".repeat(32))
        .await
        .unwrap();
    repo.group()
        .add_hash(&mut rng, &clock, &group, "b".repeat(32))
        .await
        .unwrap();
    repo.group()
        .add_meta(&mut rng, &clock, &group, "count".to_owned(), "3".to_owned())
        .await
        .unwrap();
    repo.group()
        .add_resolution(&mut rng, &clock, &group, &release)
        .await
        .unwrap();

    let dependents = repo.group().dependents(group.id).await.unwrap();
    assert_eq!(dependents.hashes, 2);
    assert_eq!(dependents.metas, 1);
    assert_eq!(dependents.resolutions, 1);
    assert_eq!(dependents.redirects, 0);

    assert_eq!(repo.group().delete_hashes(group.id).await.unwrap(), 2);
    assert_eq!(repo.group().delete_hashes(group.id).await.unwrap(), 0);

    repo.cancel().await.unwrap();
}

#[sqlx::test(migrator = "crate::MIGRATOR")]
async fn test_api_token_cutoff(pool: PgPool) {
    let mut rng = ChaChaRng::seed_from_u64(42);
    let clock = MockClock::default();
    let mut repo = PgRepository::from_pool(&pool).await.unwrap().boxed();

    let user_id = ulid::Ulid::from_parts(1, 1);
    let application = repo
        .api_application()
        .add(&mut rng, &clock, user_id, "app".to_owned(), EntityStatus::Active)
        .await
        .unwrap();

    let old = repo
        .api_token()
        .add(&mut rng, &clock, &application, user_id)
        .await
        .unwrap();
    let cutoff = clock.now();
    clock.advance(Duration::minutes(5));
    let new = repo
        .api_token()
        .add(&mut rng, &clock, &application, user_id)
        .await
        .unwrap();

    let deleted = repo
        .api_token()
        .delete_for_application(application.id, Some(cutoff))
        .await
        .unwrap();
    assert_eq!(deleted, 1);
    assert!(repo.api_token().lookup(old.id).await.unwrap().is_none());
    assert!(repo.api_token().lookup(new.id).await.unwrap().is_some());

    let deleted = repo
        .api_token()
        .delete_for_application(application.id, None)
        .await
        .unwrap();
    assert_eq!(deleted, 1);

    repo.save().await.unwrap();
}

#[sqlx::test(migrator = "crate::MIGRATOR")]
async fn test_concurrent_schedules_insert_one_job(pool: PgPool) {
    let mut rng = ChaChaRng::seed_from_u64(42);
    let clock = MockClock::default();
    let entity = EntityRef::new(EntityKind::Team, ulid::Ulid::from_parts(1, 1));

    let mut first = PgRepository::from_pool(&pool).await.unwrap().boxed();
    let job = first
        .scheduled_deletion()
        .add(&mut rng, &clock, entity, None, clock.now())
        .await
        .unwrap()
        .unwrap();

    // The second insertion waits on the first transaction's row
    let mut second = PgRepository::from_pool(&pool).await.unwrap().boxed();
    let handle = tokio::spawn(async move {
        let mut rng = ChaChaRng::seed_from_u64(43);
        let clock = MockClock::default();
        let res = second
            .scheduled_deletion()
            .add(&mut rng, &clock, entity, None, clock.now())
            .await
            .unwrap();
        second.save().await.unwrap();
        res
    });

    first.save().await.unwrap();
    assert!(handle.await.unwrap().is_none());

    let mut repo = PgRepository::from_pool(&pool).await.unwrap().boxed();
    let existing = repo
        .scheduled_deletion()
        .find_by_entity(entity)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(existing.id, job.id);
    repo.cancel().await.unwrap();
}
