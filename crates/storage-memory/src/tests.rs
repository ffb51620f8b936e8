// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use assert_matches::assert_matches;
use chrono::Duration;
use purge_data_model::{EntityKind, EntityRef, EntityStatus, clock::MockClock};
use purge_storage::{
    Clock, RepositoryAccess, RepositoryError, RepositoryFactory, RepositoryTransaction,
};
use rand::SeedableRng;
use rand_chacha::ChaChaRng;

use crate::{MemoryError, MemoryRepositoryFactory};

#[tokio::test]
async fn test_scheduled_deletion_claim_and_release() {
    let mut rng = ChaChaRng::seed_from_u64(42);
    let clock = MockClock::default();
    let factory = MemoryRepositoryFactory::new();
    let mut repo = factory.repository().await;

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
    let entity = EntityRef::new(EntityKind::Organization, organization.id);

    let job = repo
        .scheduled_deletion()
        .add(&mut rng, &clock, entity, None, clock.now())
        .await
        .unwrap()
        .unwrap();
    assert!(!job.in_progress);

    // A second job for the same entity is not inserted
    let res = repo
        .scheduled_deletion()
        .add(&mut rng, &clock, entity, None, clock.now() + Duration::days(1))
        .await
        .unwrap();
    assert!(res.is_none());
    let existing = repo
        .scheduled_deletion()
        .find_by_entity(entity)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(existing, job);

    let claimed = repo
        .scheduled_deletion()
        .claim_due(clock.now(), 10)
        .await
        .unwrap();
    assert_eq!(claimed.len(), 1);
    assert_eq!(claimed[0].id, job.id);
    assert!(claimed[0].in_progress);

    // In-progress jobs are not claimed twice
    let claimed = repo
        .scheduled_deletion()
        .claim_due(clock.now(), 10)
        .await
        .unwrap();
    assert!(claimed.is_empty());

    clock.advance(Duration::hours(5));
    let released = repo
        .scheduled_deletion()
        .release_stale(clock.now(), Duration::hours(6))
        .await
        .unwrap();
    assert_eq!(released, 0);

    clock.advance(Duration::hours(2));
    let released = repo
        .scheduled_deletion()
        .release_stale(clock.now(), Duration::hours(6))
        .await
        .unwrap();
    assert_eq!(released, 1);

    let claimed = repo
        .scheduled_deletion()
        .claim_due(clock.now(), 10)
        .await
        .unwrap();
    assert_eq!(claimed.len(), 1);

    assert!(repo.scheduled_deletion().delete(job.id).await.unwrap());
    assert!(!repo.scheduled_deletion().delete(job.id).await.unwrap());
}

#[tokio::test]
async fn test_claim_due_respects_order_and_limit() {
    let mut rng = ChaChaRng::seed_from_u64(42);
    let clock = MockClock::default();
    let factory = MemoryRepositoryFactory::new();
    let mut repo = factory.repository().await;

    let owner = ulid::Ulid::from_parts(1, 1);
    let mut jobs = Vec::new();
    for offset in [3, 1, 2] {
        let application = repo
            .api_application()
            .add(
                &mut rng,
                &clock,
                owner,
                format!("app-{offset}"),
                EntityStatus::PendingDeletion,
            )
            .await
            .unwrap();
        let job = repo
            .scheduled_deletion()
            .add(
                &mut rng,
                &clock,
                EntityRef::new(EntityKind::ApiApplication, application.id),
                None,
                clock.now() - Duration::minutes(offset),
            )
            .await
            .unwrap()
            .unwrap();
        jobs.push(job);
    }

    // One more scheduled in the future, never claimed
    let application = repo
        .api_application()
        .add(
            &mut rng,
            &clock,
            owner,
            "later".to_owned(),
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
            clock.now() + Duration::days(1),
        )
        .await
        .unwrap();

    let claimed = repo
        .scheduled_deletion()
        .claim_due(clock.now(), 2)
        .await
        .unwrap();
    let ids: Vec<_> = claimed.iter().map(|job| job.id).collect();
    assert_eq!(ids, vec![jobs[0].id, jobs[2].id]);

    let claimed = repo
        .scheduled_deletion()
        .claim_due(clock.now(), 10)
        .await
        .unwrap();
    let ids: Vec<_> = claimed.iter().map(|job| job.id).collect();
    assert_eq!(ids, vec![jobs[1].id]);
}

#[tokio::test]
async fn test_cancel_and_drop_roll_back() {
    let mut rng = ChaChaRng::seed_from_u64(42);
    let clock = MockClock::default();
    let factory = MemoryRepositoryFactory::new();

    let mut repo = factory.create().await.unwrap();
    let organization = repo
        .organization()
        .add(&mut rng, &clock, "acme".to_owned(), EntityStatus::Active)
        .await
        .unwrap();
    repo.save().await.unwrap();

    let entity = EntityRef::new(EntityKind::Organization, organization.id);

    let mut repo = factory.create().await.unwrap();
    repo.entity()
        .set_status(entity, EntityStatus::PendingDeletion)
        .await
        .unwrap();
    repo.cancel().await.unwrap();

    let mut repo = factory.create().await.unwrap();
    assert_eq!(
        repo.entity().lookup_status(entity).await.unwrap(),
        Some(EntityStatus::Active)
    );
    assert!(repo.entity().delete(entity).await.unwrap());
    drop(repo);

    let mut repo = factory.create().await.unwrap();
    assert_eq!(
        repo.entity().lookup_status(entity).await.unwrap(),
        Some(EntityStatus::Active)
    );
    repo.save().await.unwrap();
}

#[tokio::test]
async fn test_foreign_keys_are_enforced_on_delete() {
    let mut rng = ChaChaRng::seed_from_u64(42);
    let clock = MockClock::default();
    let factory = MemoryRepositoryFactory::new();
    let mut repo = factory.repository().await;

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
    let group = repo
        .group()
        .add(&mut rng, &clock, &project, EntityStatus::Active)
        .await
        .unwrap();
    repo.group()
        .add_meta(&mut rng, &clock, &group, "count".to_owned(), "1".to_owned())
        .await
        .unwrap();

    let res = repo
        .entity()
        .delete(EntityRef::new(EntityKind::Group, group.id))
        .await;
    assert_matches!(
        res,
        Err(MemoryError::ForeignKey {
            table: "error_groups",
            referenced_by: "group_metas",
        })
    );

    let res = repo
        .entity()
        .delete(EntityRef::new(EntityKind::Organization, organization.id))
        .await;
    assert_matches!(res, Err(MemoryError::ForeignKey { .. }));

    assert_eq!(repo.group().delete_metas(group.id).await.unwrap(), 1);
    assert!(
        repo.entity()
            .delete(EntityRef::new(EntityKind::Group, group.id))
            .await
            .unwrap()
    );
    assert!(
        repo.entity()
            .delete(EntityRef::new(EntityKind::Project, project.id))
            .await
            .unwrap()
    );
    assert!(
        repo.entity()
            .delete(EntityRef::new(EntityKind::Organization, organization.id))
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn test_injected_failures() {
    let mut rng = ChaChaRng::seed_from_u64(42);
    let clock = MockClock::default();
    let factory = MemoryRepositoryFactory::new();

    factory.fail_writes_to("organizations");
    let mut repo = factory.create().await.unwrap();
    let res = repo
        .organization()
        .add(&mut rng, &clock, "acme".to_owned(), EntityStatus::Active)
        .await;
    let err: RepositoryError = res.unwrap_err();
    assert!(err.to_string().contains("organizations"));
    repo.cancel().await.unwrap();

    factory.clear_failures();
    let mut repo = factory.create().await.unwrap();
    repo.organization()
        .add(&mut rng, &clock, "acme".to_owned(), EntityStatus::Active)
        .await
        .unwrap();
    repo.save().await.unwrap();
}

#[tokio::test]
async fn test_team_detach_keeps_rules() {
    let mut rng = ChaChaRng::seed_from_u64(42);
    let clock = MockClock::default();
    let factory = MemoryRepositoryFactory::new();
    let mut repo = factory.repository().await;

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
    let rule = repo
        .rule()
        .add(&mut rng, &clock, &project, "errors".to_owned(), Some(&team))
        .await
        .unwrap();
    let alert_rule = repo
        .rule()
        .add_alert_rule(&mut rng, &clock, &organization, "p1".to_owned(), Some(&team))
        .await
        .unwrap();

    assert_eq!(repo.rule().detach_team(team.id).await.unwrap(), 2);
    assert_eq!(repo.rule().detach_team(team.id).await.unwrap(), 0);

    let rule = repo.rule().lookup(rule.id).await.unwrap().unwrap();
    assert_eq!(rule.owner_team_id, None);
    let alert_rule = repo
        .rule()
        .lookup_alert_rule(alert_rule.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(alert_rule.owner_team_id, None);
}

#[tokio::test]
async fn test_api_token_cutoff() {
    let mut rng = ChaChaRng::seed_from_u64(42);
    let clock = MockClock::default();
    let factory = MemoryRepositoryFactory::new();
    let mut repo = factory.repository().await;

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
}
