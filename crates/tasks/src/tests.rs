// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

use std::sync::{Arc, Mutex};

use assert_matches::assert_matches;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Duration;
use purge_data_model::{
    ApiApplication, Clock, CodeRepository, Commit, CommitAuthor, Deletable, EntityKind,
    EntityRef, EntityStatus, Environment, Event, Group, Organization, Project, Release,
    ReleaseCommit, ReleaseEnvironment, ScheduledDeletion, Team, clock::MockClock,
};
use purge_nodestore::{MemoryNodeStore, NodeStore};
use purge_storage::{BoxRepository, RepositoryAccess, RepositoryFactory};
use purge_storage_memory::MemoryRepositoryFactory;
use rand::SeedableRng;
use rand_chacha::ChaChaRng;
use ulid::Ulid;

use crate::{
    CascadeError, ExecutorRegistry, PendingDeleteListener, PendingDeleteSignal, ProviderRegistry,
    RepositoryProvider, ScheduleError, State, jobs, reattempt_deletions, run_scheduled_deletions,
    schedule,
};

const BATCH_SIZE: usize = 100;

#[derive(Clone, Default)]
struct RecordingProvider {
    calls: Arc<Mutex<Vec<Ulid>>>,
    fail: bool,
}

impl RecordingProvider {
    fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    fn calls(&self) -> Vec<Ulid> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl RepositoryProvider for RecordingProvider {
    async fn deregister(&self, repository: &CodeRepository) -> anyhow::Result<()> {
        self.calls.lock().unwrap().push(repository.id);
        if self.fail {
            anyhow::bail!("provider is unreachable");
        }
        Ok(())
    }
}

#[derive(Clone, Default)]
struct RecordingListener {
    calls: Arc<Mutex<Vec<(EntityRef, Option<Ulid>)>>>,
    fail: bool,
}

impl RecordingListener {
    fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    fn calls(&self) -> Vec<(EntityRef, Option<Ulid>)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl PendingDeleteListener for RecordingListener {
    async fn on_pending_delete(
        &self,
        entity: EntityRef,
        actor_id: Option<Ulid>,
    ) -> anyhow::Result<()> {
        self.calls.lock().unwrap().push((entity, actor_id));
        if self.fail {
            anyhow::bail!("listener crashed");
        }
        Ok(())
    }
}

struct TestContext {
    factory: MemoryRepositoryFactory,
    nodestore: MemoryNodeStore,
    clock: Arc<MockClock>,
    provider: RecordingProvider,
    listener: RecordingListener,
    state: State,
}

impl TestContext {
    fn new() -> Self {
        Self::with(RecordingProvider::default(), RecordingListener::default())
    }

    fn with(provider: RecordingProvider, listener: RecordingListener) -> Self {
        let signal = PendingDeleteSignal::new().connect(listener.clone());
        Self::with_signal(provider, listener, signal)
    }

    /// `listener` is expected to be connected to `signal`
    fn with_signal(
        provider: RecordingProvider,
        listener: RecordingListener,
        signal: PendingDeleteSignal,
    ) -> Self {
        let factory = MemoryRepositoryFactory::new();
        let nodestore = MemoryNodeStore::new();
        let clock = Arc::new(MockClock::default());

        let state = State::new(
            factory.clone(),
            Arc::clone(&clock),
            nodestore.clone(),
            signal,
            ProviderRegistry::new().register("dummy", provider.clone()),
        );

        Self {
            factory,
            nodestore,
            clock,
            provider,
            listener,
            state,
        }
    }

    async fn repo(&self) -> BoxRepository {
        self.factory.create().await.unwrap()
    }

    async fn status(&self, entity: EntityRef) -> Option<EntityStatus> {
        let mut repo = self.repo().await;
        let status = repo.entity().lookup_status(entity).await.unwrap();
        repo.cancel().await.unwrap();
        status
    }

    async fn job_for(&self, entity: EntityRef) -> Option<ScheduledDeletion> {
        let mut repo = self.repo().await;
        let job = repo
            .scheduled_deletion()
            .find_by_entity(entity)
            .await
            .unwrap();
        repo.cancel().await.unwrap();
        job
    }
}

/// Everything an organization can own
struct OrganizationFixture {
    organization: Organization,
    team: Team,
    project: Project,
    repository: CodeRepository,
    author: CommitAuthor,
    commit: Commit,
    release: Release,
    release_commit: ReleaseCommit,
    environment: Environment,
    release_environment: ReleaseEnvironment,
    group: Group,
    event: Event,
}

async fn organization_fixture(
    ctx: &TestContext,
    rng: &mut ChaChaRng,
    status: EntityStatus,
    provider: Option<&str>,
) -> OrganizationFixture {
    let clock = &ctx.clock;
    let mut repo = ctx.repo().await;

    let organization = repo
        .organization()
        .add(rng, clock, "acme".to_owned(), status)
        .await
        .unwrap();
    let team = repo
        .team()
        .add(
            rng,
            clock,
            &organization,
            "core".to_owned(),
            EntityStatus::Active,
        )
        .await
        .unwrap();
    let project = repo
        .project()
        .add(
            rng,
            clock,
            &organization,
            "web".to_owned(),
            EntityStatus::Active,
        )
        .await
        .unwrap();
    repo.team().add_project(&team, &project).await.unwrap();

    let repository = repo
        .code_repository()
        .add(
            rng,
            clock,
            &organization,
            "acme/web".to_owned(),
            provider.map(ToOwned::to_owned),
            EntityStatus::Active,
        )
        .await
        .unwrap();
    let author = repo
        .commit()
        .add_author(
            rng,
            clock,
            &organization,
            "Alice".to_owned(),
            "alice@example.com".to_owned(),
        )
        .await
        .unwrap();
    let commit = repo
        .commit()
        .add(rng, clock, &repository, Some(&author), "1234abcd".to_owned())
        .await
        .unwrap();

    let release = repo
        .release()
        .add(rng, clock, &organization, "1.0.0".to_owned())
        .await
        .unwrap();
    repo.release().add_project(&release, &project).await.unwrap();
    let release_commit = repo
        .release()
        .add_commit(rng, clock, &release, &commit, Some(&project), 0)
        .await
        .unwrap();

    let environment = repo
        .environment()
        .add(rng, clock, &organization, "production".to_owned())
        .await
        .unwrap();
    repo.environment()
        .add_project(&environment, &project)
        .await
        .unwrap();
    let release_environment = repo
        .environment()
        .add_release(rng, clock, &release, &environment, Some(&project))
        .await
        .unwrap();

    let group = repo
        .group()
        .add(rng, clock, &project, EntityStatus::Active)
        .await
        .unwrap();
    repo.group()
        .add_resolution(rng, clock, &group, &release)
        .await
        .unwrap();
    let event = repo
        .event()
        .add(clock, &group, "a".repeat(32))
        .await
        .unwrap();

    repo.rule()
        .add(rng, clock, &project, "errors".to_owned(), Some(&team))
        .await
        .unwrap();
    repo.rule()
        .add_alert_rule(rng, clock, &organization, "p1".to_owned(), Some(&team))
        .await
        .unwrap();

    repo.save().await.unwrap();

    ctx.nodestore
        .set(&event.node_id(), Bytes::from_static(b"{}"))
        .await
        .unwrap();

    OrganizationFixture {
        organization,
        team,
        project,
        repository,
        author,
        commit,
        release,
        release_commit,
        environment,
        release_environment,
        group,
        event,
    }
}

/// Check that nothing the fixture created is left
async fn assert_organization_deleted(ctx: &TestContext, fixture: &OrganizationFixture) {
    let mut repo = ctx.repo().await;
    for entity in [
        fixture.organization.entity_ref(),
        fixture.team.entity_ref(),
        fixture.project.entity_ref(),
        fixture.repository.entity_ref(),
        fixture.group.entity_ref(),
    ] {
        assert_eq!(repo.entity().lookup_status(entity).await.unwrap(), None);
    }
    assert!(repo.release().lookup(fixture.release.id).await.unwrap().is_none());
    assert!(
        repo.release()
            .lookup_commit(fixture.release_commit.id)
            .await
            .unwrap()
            .is_none()
    );
    assert!(repo.commit().lookup(fixture.commit.id).await.unwrap().is_none());
    assert!(
        repo.commit()
            .lookup_author(fixture.author.id)
            .await
            .unwrap()
            .is_none()
    );
    assert!(
        repo.environment()
            .lookup(fixture.environment.id)
            .await
            .unwrap()
            .is_none()
    );
    assert!(
        repo.environment()
            .lookup_release(fixture.release_environment.id)
            .await
            .unwrap()
            .is_none()
    );
    repo.cancel().await.unwrap();

    assert!(ctx.nodestore.is_empty().await);
}

async fn add_team(ctx: &TestContext, rng: &mut ChaChaRng, status: EntityStatus) -> Team {
    let mut repo = ctx.repo().await;
    let organization = repo
        .organization()
        .add(rng, &ctx.clock, "acme".to_owned(), EntityStatus::Active)
        .await
        .unwrap();
    let team = repo
        .team()
        .add(rng, &ctx.clock, &organization, "core".to_owned(), status)
        .await
        .unwrap();
    repo.save().await.unwrap();
    team
}

async fn add_project(ctx: &TestContext, rng: &mut ChaChaRng, status: EntityStatus) -> Project {
    let mut repo = ctx.repo().await;
    let organization = repo
        .organization()
        .add(rng, &ctx.clock, "acme".to_owned(), EntityStatus::Active)
        .await
        .unwrap();
    let project = repo
        .project()
        .add(rng, &ctx.clock, &organization, "web".to_owned(), status)
        .await
        .unwrap();
    repo.save().await.unwrap();
    project
}

async fn add_application(
    ctx: &TestContext,
    rng: &mut ChaChaRng,
    status: EntityStatus,
) -> ApiApplication {
    let mut repo = ctx.repo().await;
    let application = repo
        .api_application()
        .add(
            rng,
            &ctx.clock,
            Ulid::from_parts(1, 1),
            "app".to_owned(),
            status,
        )
        .await
        .unwrap();
    repo.save().await.unwrap();
    application
}

#[tokio::test]
async fn test_scheduled_deletion_of_pending_entity() {
    let mut rng = ChaChaRng::seed_from_u64(42);
    let ctx = TestContext::new();
    let actor = Ulid::from_parts(1, 99);

    let team = add_team(&ctx, &mut rng, EntityStatus::PendingDeletion).await;
    let job = schedule(&ctx.state, team.entity_ref(), Some(actor), Duration::zero())
        .await
        .unwrap();
    assert!(!job.in_progress);
    assert_eq!(job.date_scheduled, job.date_added);

    let report = run_scheduled_deletions(&ctx.state, BATCH_SIZE)
        .await
        .unwrap();
    assert_eq!(report.deleted, 1);
    assert_eq!(report.total(), 1);

    assert_eq!(ctx.status(team.entity_ref()).await, None);
    assert!(ctx.job_for(team.entity_ref()).await.is_none());

    // The listeners were told who asked for the deletion
    assert_eq!(ctx.listener.calls(), vec![(team.entity_ref(), Some(actor))]);
}

#[tokio::test]
async fn test_scheduled_deletion_of_active_entity_is_dropped() {
    let mut rng = ChaChaRng::seed_from_u64(42);
    let ctx = TestContext::new();

    let mut repo = ctx.repo().await;
    let organization = repo
        .organization()
        .add(&mut rng, &ctx.clock, "acme".to_owned(), EntityStatus::Active)
        .await
        .unwrap();
    let repository = repo
        .code_repository()
        .add(
            &mut rng,
            &ctx.clock,
            &organization,
            "acme/web".to_owned(),
            Some("dummy".to_owned()),
            EntityStatus::Active,
        )
        .await
        .unwrap();
    repo.save().await.unwrap();

    schedule(&ctx.state, repository.entity_ref(), None, Duration::zero())
        .await
        .unwrap();

    let report = run_scheduled_deletions(&ctx.state, BATCH_SIZE)
        .await
        .unwrap();
    assert_eq!(report.aborted, 1);
    assert_eq!(report.deleted, 0);

    assert_eq!(
        ctx.status(repository.entity_ref()).await,
        Some(EntityStatus::Active)
    );
    assert!(ctx.job_for(repository.entity_ref()).await.is_none());
    assert!(ctx.provider.calls().is_empty());
}

#[tokio::test]
async fn test_schedule_conflict() {
    let mut rng = ChaChaRng::seed_from_u64(42);
    let ctx = TestContext::new();

    let team = add_team(&ctx, &mut rng, EntityStatus::PendingDeletion).await;
    let job = schedule(&ctx.state, team.entity_ref(), None, Duration::days(30))
        .await
        .unwrap();

    let res = schedule(&ctx.state, team.entity_ref(), None, Duration::zero()).await;
    assert_matches!(res, Err(ScheduleError::Conflict { existing, .. }) if existing == Some(job.id));

    // The original job is untouched
    let existing = ctx.job_for(team.entity_ref()).await.unwrap();
    assert_eq!(existing, job);
}

#[tokio::test]
async fn test_future_schedule_is_left_alone() {
    let mut rng = ChaChaRng::seed_from_u64(42);
    let ctx = TestContext::new();

    let team = add_team(&ctx, &mut rng, EntityStatus::PendingDeletion).await;
    schedule(&ctx.state, team.entity_ref(), None, Duration::days(1))
        .await
        .unwrap();

    let report = run_scheduled_deletions(&ctx.state, BATCH_SIZE)
        .await
        .unwrap();
    assert_eq!(report.total(), 0);

    assert_eq!(
        ctx.status(team.entity_ref()).await,
        Some(EntityStatus::PendingDeletion)
    );
    let job = ctx.job_for(team.entity_ref()).await.unwrap();
    assert!(!job.in_progress);
    assert!(ctx.listener.calls().is_empty());

    // Once due, it runs
    ctx.clock.advance(Duration::days(1));
    let report = run_scheduled_deletions(&ctx.state, BATCH_SIZE)
        .await
        .unwrap();
    assert_eq!(report.deleted, 1);
}

#[tokio::test]
async fn test_in_progress_job_waits_for_the_reaper() {
    let mut rng = ChaChaRng::seed_from_u64(42);
    let ctx = TestContext::new();

    let team = add_team(&ctx, &mut rng, EntityStatus::PendingDeletion).await;
    schedule(&ctx.state, team.entity_ref(), None, Duration::zero())
        .await
        .unwrap();

    // Another worker claimed the job, then crashed
    let mut repo = ctx.repo().await;
    let claimed = repo
        .scheduled_deletion()
        .claim_due(ctx.clock.now(), BATCH_SIZE)
        .await
        .unwrap();
    assert_eq!(claimed.len(), 1);
    repo.save().await.unwrap();

    let report = run_scheduled_deletions(&ctx.state, BATCH_SIZE)
        .await
        .unwrap();
    assert_eq!(report.total(), 0);
    assert_eq!(
        ctx.status(team.entity_ref()).await,
        Some(EntityStatus::PendingDeletion)
    );

    // The job is too recent to be released
    let released = reattempt_deletions(&ctx.state, Duration::hours(6))
        .await
        .unwrap();
    assert_eq!(released, 0);
    assert!(ctx.job_for(team.entity_ref()).await.unwrap().in_progress);

    ctx.clock.advance(Duration::hours(7));
    let released = reattempt_deletions(&ctx.state, Duration::hours(6))
        .await
        .unwrap();
    assert_eq!(released, 1);
    assert!(!ctx.job_for(team.entity_ref()).await.unwrap().in_progress);

    let report = run_scheduled_deletions(&ctx.state, BATCH_SIZE)
        .await
        .unwrap();
    assert_eq!(report.deleted, 1);
    assert_eq!(ctx.status(team.entity_ref()).await, None);
}

#[tokio::test]
async fn test_job_for_missing_entity_is_dropped() {
    let ctx = TestContext::new();
    let entity = EntityRef::new(EntityKind::Project, Ulid::from_parts(1, 7));

    schedule(&ctx.state, entity, None, Duration::zero())
        .await
        .unwrap();

    let report = run_scheduled_deletions(&ctx.state, BATCH_SIZE)
        .await
        .unwrap();
    assert_eq!(report.gone, 1);
    assert!(ctx.job_for(entity).await.is_none());

    // Nothing to notify about
    assert!(ctx.listener.calls().is_empty());
}

#[tokio::test]
async fn test_failing_listener_does_not_block_deletion() {
    let mut rng = ChaChaRng::seed_from_u64(42);
    let ctx = TestContext::with(RecordingProvider::default(), RecordingListener::failing());

    let team = add_team(&ctx, &mut rng, EntityStatus::PendingDeletion).await;
    schedule(&ctx.state, team.entity_ref(), None, Duration::zero())
        .await
        .unwrap();

    let report = run_scheduled_deletions(&ctx.state, BATCH_SIZE)
        .await
        .unwrap();
    assert_eq!(report.deleted, 1);
    assert_eq!(ctx.listener.calls().len(), 1);
    assert_eq!(ctx.status(team.entity_ref()).await, None);
}

#[tokio::test]
async fn test_transient_failure_leaves_job_in_progress() {
    let mut rng = ChaChaRng::seed_from_u64(42);
    let ctx = TestContext::new();

    let fixture =
        organization_fixture(&ctx, &mut rng, EntityStatus::PendingDeletion, Some("dummy")).await;
    let entity = fixture.organization.entity_ref();
    schedule(&ctx.state, entity, None, Duration::zero())
        .await
        .unwrap();

    ctx.factory.fail_writes_to("commits");
    let report = run_scheduled_deletions(&ctx.state, BATCH_SIZE)
        .await
        .unwrap();
    assert_eq!(report.failed, 1);

    // The whole cascade was rolled back
    assert_eq!(ctx.status(entity).await, Some(EntityStatus::PendingDeletion));
    assert_eq!(
        ctx.status(fixture.team.entity_ref()).await,
        Some(EntityStatus::Active)
    );
    assert!(ctx.job_for(entity).await.unwrap().in_progress);
    assert!(ctx.provider.calls().is_empty());
    assert!(ctx.nodestore.contains(&fixture.event.node_id()).await);

    // Still claimed, so the next pass ignores it
    ctx.factory.clear_failures();
    let report = run_scheduled_deletions(&ctx.state, BATCH_SIZE)
        .await
        .unwrap();
    assert_eq!(report.total(), 0);

    ctx.clock.advance(Duration::hours(7));
    let released = reattempt_deletions(&ctx.state, Duration::hours(6))
        .await
        .unwrap();
    assert_eq!(released, 1);

    let report = run_scheduled_deletions(&ctx.state, BATCH_SIZE)
        .await
        .unwrap();
    assert_eq!(report.deleted, 1);
    assert_eq!(ctx.status(entity).await, None);
    assert!(ctx.job_for(entity).await.is_none());
}

#[tokio::test]
async fn test_delete_organization() {
    let mut rng = ChaChaRng::seed_from_u64(42);
    let ctx = TestContext::new();

    let fixture =
        organization_fixture(&ctx, &mut rng, EntityStatus::PendingDeletion, Some("dummy")).await;

    jobs::delete_organization(&ctx.state, fixture.organization.id)
        .await
        .unwrap();

    assert_organization_deleted(&ctx, &fixture).await;
    assert_eq!(ctx.provider.calls(), vec![fixture.repository.id]);
}

#[tokio::test]
async fn test_delete_organization_aborts_when_active() {
    let mut rng = ChaChaRng::seed_from_u64(42);
    let ctx = TestContext::new();

    let fixture = organization_fixture(&ctx, &mut rng, EntityStatus::Active, Some("dummy")).await;

    let res = jobs::delete_organization(&ctx.state, fixture.organization.id).await;
    assert_matches!(
        res,
        Err(CascadeError::Aborted {
            status: EntityStatus::Active,
            ..
        })
    );

    assert_eq!(
        ctx.status(fixture.organization.entity_ref()).await,
        Some(EntityStatus::Active)
    );
    assert_eq!(
        ctx.status(fixture.repository.entity_ref()).await,
        Some(EntityStatus::Active)
    );
    assert!(ctx.provider.calls().is_empty());
}

#[tokio::test]
async fn test_provider_failure_does_not_abort_organization_deletion() {
    let mut rng = ChaChaRng::seed_from_u64(42);
    let ctx = TestContext::with(RecordingProvider::failing(), RecordingListener::default());

    let fixture =
        organization_fixture(&ctx, &mut rng, EntityStatus::PendingDeletion, Some("dummy")).await;

    jobs::delete_organization(&ctx.state, fixture.organization.id)
        .await
        .unwrap();

    assert_eq!(ctx.status(fixture.organization.entity_ref()).await, None);
    assert_eq!(ctx.status(fixture.repository.entity_ref()).await, None);
    assert_eq!(ctx.provider.calls(), vec![fixture.repository.id]);
}

#[tokio::test]
async fn test_repository_without_known_provider_is_not_deregistered() {
    let mut rng = ChaChaRng::seed_from_u64(42);
    let ctx = TestContext::new();

    let without = organization_fixture(&ctx, &mut rng, EntityStatus::PendingDeletion, None).await;
    let unknown =
        organization_fixture(&ctx, &mut rng, EntityStatus::PendingDeletion, Some("gitlab")).await;

    jobs::delete_organization(&ctx.state, without.organization.id)
        .await
        .unwrap();
    jobs::delete_organization(&ctx.state, unknown.organization.id)
        .await
        .unwrap();

    assert_eq!(ctx.status(without.repository.entity_ref()).await, None);
    assert_eq!(ctx.status(unknown.repository.entity_ref()).await, None);
    assert!(ctx.provider.calls().is_empty());
}

#[tokio::test]
async fn test_delete_team_keeps_rules() {
    let mut rng = ChaChaRng::seed_from_u64(42);
    let ctx = TestContext::new();

    let fixture = organization_fixture(&ctx, &mut rng, EntityStatus::Active, None).await;

    let mut repo = ctx.repo().await;
    repo.entity()
        .set_status(fixture.team.entity_ref(), EntityStatus::PendingDeletion)
        .await
        .unwrap();
    repo.save().await.unwrap();

    jobs::delete_team(&ctx.state, fixture.team.id).await.unwrap();

    let mut repo = ctx.repo().await;
    assert!(repo.team().lookup(fixture.team.id).await.unwrap().is_none());
    assert!(
        repo.team()
            .project_ids(fixture.team.id)
            .await
            .unwrap()
            .is_empty()
    );

    // The project and its rules survive the team
    assert!(
        repo.project()
            .lookup(fixture.project.id)
            .await
            .unwrap()
            .is_some()
    );
    let rules = repo
        .rule()
        .delete_for_project(fixture.project.id)
        .await
        .unwrap();
    assert_eq!(rules, 1);
    let alert_rules = repo
        .rule()
        .delete_alert_rules_for_organization(fixture.organization.id)
        .await
        .unwrap();
    assert_eq!(alert_rules, 1);
    repo.cancel().await.unwrap();
}

#[tokio::test]
async fn test_delete_team_clears_rule_owner() {
    let mut rng = ChaChaRng::seed_from_u64(42);
    let ctx = TestContext::new();

    let team = add_team(&ctx, &mut rng, EntityStatus::PendingDeletion).await;
    let mut repo = ctx.repo().await;
    let organization = repo
        .organization()
        .lookup(team.organization_id)
        .await
        .unwrap()
        .unwrap();
    let project = repo
        .project()
        .add(
            &mut rng,
            &ctx.clock,
            &organization,
            "web".to_owned(),
            EntityStatus::Active,
        )
        .await
        .unwrap();
    let rule = repo
        .rule()
        .add(&mut rng, &ctx.clock, &project, "errors".to_owned(), Some(&team))
        .await
        .unwrap();
    let alert_rule = repo
        .rule()
        .add_alert_rule(&mut rng, &ctx.clock, &organization, "p1".to_owned(), Some(&team))
        .await
        .unwrap();
    repo.save().await.unwrap();

    jobs::delete_team(&ctx.state, team.id).await.unwrap();

    let mut repo = ctx.repo().await;
    let rule = repo.rule().lookup(rule.id).await.unwrap().unwrap();
    assert_eq!(rule.owner_team_id, None);
    let alert_rule = repo
        .rule()
        .lookup_alert_rule(alert_rule.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(alert_rule.owner_team_id, None);
    repo.cancel().await.unwrap();
}

#[tokio::test]
async fn test_delete_team_aborts_when_active() {
    let mut rng = ChaChaRng::seed_from_u64(42);
    let ctx = TestContext::new();

    let team = add_team(&ctx, &mut rng, EntityStatus::Active).await;
    let res = jobs::delete_team(&ctx.state, team.id).await;
    assert_matches!(res, Err(CascadeError::Aborted { .. }));
    assert_eq!(
        ctx.status(team.entity_ref()).await,
        Some(EntityStatus::Active)
    );
}

#[tokio::test]
async fn test_delete_project_keeps_shared_records() {
    let mut rng = ChaChaRng::seed_from_u64(42);
    let ctx = TestContext::new();

    let fixture = organization_fixture(&ctx, &mut rng, EntityStatus::Active, None).await;
    let mut repo = ctx.repo().await;
    repo.entity()
        .set_status(fixture.project.entity_ref(), EntityStatus::PendingDeletion)
        .await
        .unwrap();
    repo.save().await.unwrap();

    jobs::delete_project(&ctx.state, fixture.project.id)
        .await
        .unwrap();

    let mut repo = ctx.repo().await;
    assert!(
        repo.project()
            .lookup(fixture.project.id)
            .await
            .unwrap()
            .is_none()
    );
    assert!(
        repo.environment()
            .project_ids(fixture.environment.id)
            .await
            .unwrap()
            .is_empty()
    );
    assert!(
        repo.release()
            .project_ids(fixture.release.id)
            .await
            .unwrap()
            .is_empty()
    );

    // Shared with the rest of the organization
    assert!(
        repo.environment()
            .lookup(fixture.environment.id)
            .await
            .unwrap()
            .is_some()
    );
    assert!(repo.release().lookup(fixture.release.id).await.unwrap().is_some());
    assert!(
        repo.release()
            .lookup_commit(fixture.release_commit.id)
            .await
            .unwrap()
            .is_some()
    );
    assert!(repo.commit().lookup(fixture.commit.id).await.unwrap().is_some());
    assert!(repo.team().lookup(fixture.team.id).await.unwrap().is_some());

    // The groups of the project are gone, with their payloads
    assert!(repo.group().lookup(fixture.group.id).await.unwrap().is_none());
    repo.cancel().await.unwrap();
    assert!(!ctx.nodestore.contains(&fixture.event.node_id()).await);
}

#[tokio::test]
async fn test_delete_project_aborts_when_active() {
    let mut rng = ChaChaRng::seed_from_u64(42);
    let ctx = TestContext::new();

    let project = add_project(&ctx, &mut rng, EntityStatus::Active).await;
    let res = jobs::delete_project(&ctx.state, project.id).await;
    assert_matches!(res, Err(CascadeError::Aborted { .. }));
    assert_eq!(
        ctx.status(project.entity_ref()).await,
        Some(EntityStatus::Active)
    );
}

#[tokio::test]
async fn test_delete_groups() {
    let mut rng = ChaChaRng::seed_from_u64(42);
    let ctx = TestContext::new();

    let project = add_project(&ctx, &mut rng, EntityStatus::Active).await;
    let mut repo = ctx.repo().await;
    let group = repo
        .group()
        .add(&mut rng, &ctx.clock, &project, EntityStatus::PendingDeletion)
        .await
        .unwrap();
    let first = repo
        .event()
        .add(&ctx.clock, &group, "a".repeat(32))
        .await
        .unwrap();
    let second = repo
        .event()
        .add(&ctx.clock, &group, "b".repeat(32))
        .await
        .unwrap();
    repo.group()
        .add_assignee(&mut rng, &ctx.clock, &group, Ulid::from_parts(1, 1))
        .await
        .unwrap();
    repo.group()
        .add_hash(&mut rng, &ctx.clock, &group, "c".repeat(32))
        .await
        .unwrap();
    repo.group()
        .add_meta(&mut rng, &ctx.clock, &group, "foo".to_owned(), "bar".to_owned())
        .await
        .unwrap();
    repo.group()
        .add_redirect(&mut rng, &ctx.clock, &group, Ulid::from_parts(1, 2))
        .await
        .unwrap();
    repo.save().await.unwrap();

    let first_node = Event::generate_node_id(project.id, &"a".repeat(32));
    let second_node = Event::generate_node_id(project.id, &"b".repeat(32));
    assert_eq!(first.node_id(), first_node);
    assert_eq!(second.node_id(), second_node);
    for node_id in [&first_node, &second_node] {
        ctx.nodestore
            .set(node_id, Bytes::from_static(b"{}"))
            .await
            .unwrap();
    }

    jobs::delete_groups(&ctx.state, &[group.id]).await.unwrap();

    let mut repo = ctx.repo().await;
    assert!(repo.group().lookup(group.id).await.unwrap().is_none());
    assert!(repo.group().dependents(group.id).await.unwrap().is_empty());
    assert!(repo.event().list_for_group(group.id).await.unwrap().is_empty());
    repo.cancel().await.unwrap();

    assert!(ctx.nodestore.get(&first_node).await.unwrap().is_none());
    assert!(ctx.nodestore.get(&second_node).await.unwrap().is_none());
}

#[tokio::test]
async fn test_delete_groups_is_all_or_nothing() {
    let mut rng = ChaChaRng::seed_from_u64(42);
    let ctx = TestContext::new();

    let project = add_project(&ctx, &mut rng, EntityStatus::Active).await;
    let mut repo = ctx.repo().await;
    let pending = repo
        .group()
        .add(&mut rng, &ctx.clock, &project, EntityStatus::PendingDeletion)
        .await
        .unwrap();
    let active = repo
        .group()
        .add(&mut rng, &ctx.clock, &project, EntityStatus::Active)
        .await
        .unwrap();
    repo.save().await.unwrap();

    let res = jobs::delete_groups(&ctx.state, &[pending.id, active.id]).await;
    assert_matches!(res, Err(CascadeError::Aborted { entity, .. }) if entity == active.entity_ref());

    assert!(ctx.status(pending.entity_ref()).await.is_some());
    assert!(ctx.status(active.entity_ref()).await.is_some());
}

#[tokio::test]
async fn test_payload_deletion_failure_does_not_fail_the_cascade() {
    let mut rng = ChaChaRng::seed_from_u64(42);
    let ctx = TestContext::new();

    let project = add_project(&ctx, &mut rng, EntityStatus::Active).await;
    let mut repo = ctx.repo().await;
    let group = repo
        .group()
        .add(&mut rng, &ctx.clock, &project, EntityStatus::PendingDeletion)
        .await
        .unwrap();
    let event = repo
        .event()
        .add(&ctx.clock, &group, "a".repeat(32))
        .await
        .unwrap();
    repo.save().await.unwrap();
    ctx.nodestore
        .set(&event.node_id(), Bytes::from_static(b"{}"))
        .await
        .unwrap();

    ctx.nodestore.set_fail_deletes(true);
    jobs::delete_groups(&ctx.state, &[group.id]).await.unwrap();

    // The rows are gone, the payload is orphaned
    assert_eq!(ctx.status(group.entity_ref()).await, None);
    assert!(ctx.nodestore.contains(&event.node_id()).await);
}

#[tokio::test]
async fn test_delete_api_application() {
    let mut rng = ChaChaRng::seed_from_u64(42);
    let ctx = TestContext::new();
    let user_id = Ulid::from_parts(1, 1);

    let application = add_application(&ctx, &mut rng, EntityStatus::PendingDeletion).await;
    let mut repo = ctx.repo().await;
    let token = repo
        .api_token()
        .add(&mut rng, &ctx.clock, &application, user_id)
        .await
        .unwrap();
    let grant = repo
        .api_grant()
        .add(
            &mut rng,
            &ctx.clock,
            &application,
            user_id,
            "http://example.com".to_owned(),
        )
        .await
        .unwrap();
    repo.save().await.unwrap();

    jobs::delete_api_application(&ctx.state, application.id)
        .await
        .unwrap();

    let mut repo = ctx.repo().await;
    assert!(
        repo.api_application()
            .lookup(application.id)
            .await
            .unwrap()
            .is_none()
    );
    assert!(repo.api_token().lookup(token.id).await.unwrap().is_none());
    assert!(repo.api_grant().lookup(grant.id).await.unwrap().is_none());
    repo.cancel().await.unwrap();
}

#[tokio::test]
async fn test_revoke_api_tokens() {
    let mut rng = ChaChaRng::seed_from_u64(42);
    let ctx = TestContext::new();

    let application = add_application(&ctx, &mut rng, EntityStatus::Active).await;
    let mut repo = ctx.repo().await;
    let first = repo
        .api_token()
        .add(&mut rng, &ctx.clock, &application, Ulid::from_parts(1, 1))
        .await
        .unwrap();
    let second = repo
        .api_token()
        .add(&mut rng, &ctx.clock, &application, Ulid::from_parts(1, 2))
        .await
        .unwrap();
    repo.save().await.unwrap();

    let revoked = jobs::revoke_api_tokens(&ctx.state, application.id, None)
        .await
        .unwrap();
    assert_eq!(revoked, 2);

    let mut repo = ctx.repo().await;
    assert!(repo.api_token().lookup(first.id).await.unwrap().is_none());
    assert!(repo.api_token().lookup(second.id).await.unwrap().is_none());

    // The application itself is kept
    assert!(
        repo.api_application()
            .lookup(application.id)
            .await
            .unwrap()
            .is_some()
    );
    repo.cancel().await.unwrap();
}

#[tokio::test]
async fn test_revoke_api_tokens_with_cutoff() {
    let mut rng = ChaChaRng::seed_from_u64(42);
    let ctx = TestContext::new();

    let application = add_application(&ctx, &mut rng, EntityStatus::Active).await;
    let mut repo = ctx.repo().await;
    let old = repo
        .api_token()
        .add(&mut rng, &ctx.clock, &application, Ulid::from_parts(1, 1))
        .await
        .unwrap();
    let cutoff = ctx.clock.now();
    ctx.clock.advance(Duration::days(1));
    let new = repo
        .api_token()
        .add(&mut rng, &ctx.clock, &application, Ulid::from_parts(1, 2))
        .await
        .unwrap();
    repo.save().await.unwrap();

    let revoked = jobs::revoke_api_tokens(&ctx.state, application.id, Some(cutoff))
        .await
        .unwrap();
    assert_eq!(revoked, 1);

    let mut repo = ctx.repo().await;
    assert!(repo.api_token().lookup(old.id).await.unwrap().is_none());
    assert!(repo.api_token().lookup(new.id).await.unwrap().is_some());
    repo.cancel().await.unwrap();
}

#[tokio::test]
async fn test_generic_delete() {
    let mut rng = ChaChaRng::seed_from_u64(42);
    let ctx = TestContext::new();

    let visible = add_project(&ctx, &mut rng, EntityStatus::Active).await;
    let res = jobs::generic_delete(&ctx.state, visible.entity_ref()).await;
    assert_matches!(res, Err(CascadeError::Aborted { .. }));
    assert_eq!(
        ctx.status(visible.entity_ref()).await,
        Some(EntityStatus::Active)
    );

    let pending = add_project(&ctx, &mut rng, EntityStatus::PendingDeletion).await;
    jobs::generic_delete(&ctx.state, pending.entity_ref())
        .await
        .unwrap();
    assert_eq!(ctx.status(pending.entity_ref()).await, None);

    // Already gone
    jobs::generic_delete(&ctx.state, pending.entity_ref())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_generic_executor_is_the_default() {
    let mut rng = ChaChaRng::seed_from_u64(42);
    let ctx = TestContext::new();
    let state = ctx.state.clone().with_executors(ExecutorRegistry::empty());

    let project = add_project(&ctx, &mut rng, EntityStatus::PendingDeletion).await;
    schedule(&state, project.entity_ref(), None, Duration::zero())
        .await
        .unwrap();

    let report = run_scheduled_deletions(&state, BATCH_SIZE).await.unwrap();
    assert_eq!(report.deleted, 1);
    assert_eq!(ctx.status(project.entity_ref()).await, None);
}

#[tokio::test]
async fn test_delete_repository_aborts_when_active() {
    let mut rng = ChaChaRng::seed_from_u64(42);
    let ctx = TestContext::new();

    let fixture = organization_fixture(&ctx, &mut rng, EntityStatus::Active, Some("dummy")).await;
    let res = jobs::delete_repository(&ctx.state, fixture.repository.id).await;
    assert_matches!(res, Err(CascadeError::Aborted { .. }));

    assert_eq!(
        ctx.status(fixture.repository.entity_ref()).await,
        Some(EntityStatus::Active)
    );
    assert!(ctx.provider.calls().is_empty());
}

#[tokio::test]
async fn test_delete_repository_keeps_sibling_commits() {
    let mut rng = ChaChaRng::seed_from_u64(42);
    let ctx = TestContext::new();

    let mut repo = ctx.repo().await;
    let organization = repo
        .organization()
        .add(&mut rng, &ctx.clock, "acme".to_owned(), EntityStatus::Active)
        .await
        .unwrap();
    let mut repositories = Vec::new();
    let mut commits = Vec::new();
    for name in ["example/example", "example/example2"] {
        let repository = repo
            .code_repository()
            .add(
                &mut rng,
                &ctx.clock,
                &organization,
                name.to_owned(),
                Some("dummy".to_owned()),
                EntityStatus::PendingDeletion,
            )
            .await
            .unwrap();
        let commit = repo
            .commit()
            .add(&mut rng, &ctx.clock, &repository, None, "1234abcd".to_owned())
            .await
            .unwrap();
        repositories.push(repository);
        commits.push(commit);
    }
    repo.save().await.unwrap();

    jobs::delete_repository(&ctx.state, repositories[0].id)
        .await
        .unwrap();

    let mut repo = ctx.repo().await;
    assert!(
        repo.code_repository()
            .lookup(repositories[0].id)
            .await
            .unwrap()
            .is_none()
    );
    assert!(repo.commit().lookup(commits[0].id).await.unwrap().is_none());
    assert!(
        repo.code_repository()
            .lookup(repositories[1].id)
            .await
            .unwrap()
            .is_some()
    );
    assert!(repo.commit().lookup(commits[1].id).await.unwrap().is_some());
    repo.cancel().await.unwrap();

    assert_eq!(ctx.provider.calls(), vec![repositories[0].id]);
}

#[tokio::test]
async fn test_executors_are_idempotent() {
    let mut rng = ChaChaRng::seed_from_u64(42);
    let ctx = TestContext::new();

    let fixture =
        organization_fixture(&ctx, &mut rng, EntityStatus::PendingDeletion, Some("dummy")).await;
    jobs::delete_organization(&ctx.state, fixture.organization.id)
        .await
        .unwrap();
    jobs::delete_organization(&ctx.state, fixture.organization.id)
        .await
        .unwrap();
    assert_eq!(ctx.provider.calls().len(), 1);

    let team = add_team(&ctx, &mut rng, EntityStatus::PendingDeletion).await;
    jobs::delete_team(&ctx.state, team.id).await.unwrap();
    jobs::delete_team(&ctx.state, team.id).await.unwrap();

    let project = add_project(&ctx, &mut rng, EntityStatus::PendingDeletion).await;
    jobs::delete_project(&ctx.state, project.id).await.unwrap();
    jobs::delete_project(&ctx.state, project.id).await.unwrap();

    let application = add_application(&ctx, &mut rng, EntityStatus::PendingDeletion).await;
    jobs::delete_api_application(&ctx.state, application.id)
        .await
        .unwrap();
    jobs::delete_api_application(&ctx.state, application.id)
        .await
        .unwrap();

    jobs::delete_groups(&ctx.state, &[fixture.group.id])
        .await
        .unwrap();
    jobs::delete_repository(&ctx.state, fixture.repository.id)
        .await
        .unwrap();
    assert_eq!(ctx.provider.calls().len(), 1);
}

/// Create an entity of any kind, with the given status
async fn add_entity(
    ctx: &TestContext,
    rng: &mut ChaChaRng,
    kind: EntityKind,
    status: EntityStatus,
) -> EntityRef {
    match kind {
        EntityKind::Organization => {
            let mut repo = ctx.repo().await;
            let organization = repo
                .organization()
                .add(rng, &ctx.clock, "acme".to_owned(), status)
                .await
                .unwrap();
            repo.save().await.unwrap();
            organization.entity_ref()
        }
        EntityKind::Team => add_team(ctx, rng, status).await.entity_ref(),
        EntityKind::Project => add_project(ctx, rng, status).await.entity_ref(),
        EntityKind::Repository => {
            let mut repo = ctx.repo().await;
            let organization = repo
                .organization()
                .add(rng, &ctx.clock, "acme".to_owned(), EntityStatus::Active)
                .await
                .unwrap();
            let repository = repo
                .code_repository()
                .add(
                    rng,
                    &ctx.clock,
                    &organization,
                    "acme/web".to_owned(),
                    Some("dummy".to_owned()),
                    status,
                )
                .await
                .unwrap();
            repo.save().await.unwrap();
            repository.entity_ref()
        }
        EntityKind::Group => {
            let project = add_project(ctx, rng, EntityStatus::Active).await;
            let mut repo = ctx.repo().await;
            let group = repo
                .group()
                .add(rng, &ctx.clock, &project, status)
                .await
                .unwrap();
            repo.save().await.unwrap();
            group.entity_ref()
        }
        EntityKind::ApiApplication => add_application(ctx, rng, status).await.entity_ref(),
    }
}

#[tokio::test]
async fn test_scheduled_deletion_of_every_kind() {
    let mut rng = ChaChaRng::seed_from_u64(42);
    let ctx = TestContext::new();

    for kind in EntityKind::ALL {
        for status in [EntityStatus::PendingDeletion, EntityStatus::DeletionInProgress] {
            let entity = add_entity(&ctx, &mut rng, kind, status).await;
            schedule(&ctx.state, entity, None, Duration::zero())
                .await
                .unwrap();

            let report = run_scheduled_deletions(&ctx.state, BATCH_SIZE)
                .await
                .unwrap();
            assert_eq!(report.deleted, 1, "{entity} in status {status}");
            assert_eq!(report.total(), 1);
            assert_eq!(ctx.status(entity).await, None);
            assert!(ctx.job_for(entity).await.is_none());
        }

        let entity = add_entity(&ctx, &mut rng, kind, EntityStatus::Active).await;
        schedule(&ctx.state, entity, None, Duration::zero())
            .await
            .unwrap();

        let report = run_scheduled_deletions(&ctx.state, BATCH_SIZE)
            .await
            .unwrap();
        assert_eq!(report.aborted, 1, "{entity} while active");
        assert_eq!(report.total(), 1);
        assert_eq!(ctx.status(entity).await, Some(EntityStatus::Active));
        assert!(ctx.job_for(entity).await.is_none());
    }
}

#[tokio::test]
async fn test_schedule_delay_out_of_range() {
    let mut rng = ChaChaRng::seed_from_u64(42);
    let ctx = TestContext::new();

    let team = add_team(&ctx, &mut rng, EntityStatus::PendingDeletion).await;
    let delay = Duration::days(u32::MAX.into());
    let res = schedule(&ctx.state, team.entity_ref(), None, delay).await;
    assert_matches!(res, Err(ScheduleError::DelayOutOfRange { delay: d }) if d == delay);
    assert!(ctx.job_for(team.entity_ref()).await.is_none());

    // A reasonable delay still works afterwards
    schedule(&ctx.state, team.entity_ref(), None, Duration::days(30))
        .await
        .unwrap();
}

struct PanickingListener;

#[async_trait]
impl PendingDeleteListener for PanickingListener {
    async fn on_pending_delete(
        &self,
        _entity: EntityRef,
        _actor_id: Option<Ulid>,
    ) -> anyhow::Result<()> {
        panic!("listener panicked");
    }
}

#[tokio::test]
async fn test_panicking_listener_does_not_block_deletion() {
    let mut rng = ChaChaRng::seed_from_u64(42);
    let listener = RecordingListener::default();
    let signal = PendingDeleteSignal::new()
        .connect(PanickingListener)
        .connect(listener.clone());
    let ctx = TestContext::with_signal(RecordingProvider::default(), listener, signal);

    let first = add_team(&ctx, &mut rng, EntityStatus::PendingDeletion).await;
    let second = add_team(&ctx, &mut rng, EntityStatus::PendingDeletion).await;
    for team in [&first, &second] {
        schedule(&ctx.state, team.entity_ref(), None, Duration::zero())
            .await
            .unwrap();
    }

    let report = run_scheduled_deletions(&ctx.state, BATCH_SIZE)
        .await
        .unwrap();
    assert_eq!(report.deleted, 2);

    // Listeners after the panicking one are still notified
    assert_eq!(ctx.listener.calls().len(), 2);
    assert_eq!(ctx.status(first.entity_ref()).await, None);
    assert_eq!(ctx.status(second.entity_ref()).await, None);
}

#[tokio::test]
async fn test_organization_cascade_resumes_after_partial_run() {
    let mut rng = ChaChaRng::seed_from_u64(42);
    let ctx = TestContext::new();

    let fixture =
        organization_fixture(&ctx, &mut rng, EntityStatus::PendingDeletion, Some("dummy")).await;
    let organization_id = fixture.organization.id;

    // A previous attempt already removed some of the dependents
    let mut repo = ctx.repo().await;
    let count = repo
        .environment()
        .delete_releases_for_organization(organization_id)
        .await
        .unwrap();
    assert_eq!(count, 1);
    let count = repo
        .group()
        .delete_resolutions(fixture.group.id)
        .await
        .unwrap();
    assert_eq!(count, 1);
    let count = repo.rule().detach_team(fixture.team.id).await.unwrap();
    assert_eq!(count, 2);
    repo.save().await.unwrap();
    ctx.nodestore.delete(&fixture.event.node_id()).await.unwrap();

    // Then failed again before the end
    ctx.factory.fail_writes_to("code_repositories");
    let res = jobs::delete_organization(&ctx.state, organization_id).await;
    assert_matches!(res, Err(CascadeError::Repository(_)));
    assert_eq!(
        ctx.status(fixture.organization.entity_ref()).await,
        Some(EntityStatus::PendingDeletion)
    );
    ctx.factory.clear_failures();

    jobs::delete_organization(&ctx.state, organization_id)
        .await
        .unwrap();
    jobs::delete_organization(&ctx.state, organization_id)
        .await
        .unwrap();

    assert_organization_deleted(&ctx, &fixture).await;
    assert_eq!(ctx.provider.calls(), vec![fixture.repository.id]);
}

#[tokio::test]
async fn test_team_and_project_cascades_resume_after_partial_run() {
    let mut rng = ChaChaRng::seed_from_u64(42);
    let ctx = TestContext::new();

    let fixture = organization_fixture(&ctx, &mut rng, EntityStatus::Active, None).await;
    let mut repo = ctx.repo().await;
    for entity in [fixture.team.entity_ref(), fixture.project.entity_ref()] {
        repo.entity()
            .set_status(entity, EntityStatus::PendingDeletion)
            .await
            .unwrap();
    }
    let count = repo
        .team()
        .remove_project_links_for_team(fixture.team.id)
        .await
        .unwrap();
    assert_eq!(count, 1);
    let count = repo
        .environment()
        .remove_project_links_for_project(fixture.project.id)
        .await
        .unwrap();
    assert_eq!(count, 1);
    repo.save().await.unwrap();

    for _ in 0..2 {
        jobs::delete_team(&ctx.state, fixture.team.id).await.unwrap();
        jobs::delete_project(&ctx.state, fixture.project.id)
            .await
            .unwrap();
    }

    assert_eq!(ctx.status(fixture.team.entity_ref()).await, None);
    assert_eq!(ctx.status(fixture.project.entity_ref()).await, None);
    assert_eq!(ctx.status(fixture.group.entity_ref()).await, None);

    let mut repo = ctx.repo().await;
    assert!(
        repo.environment()
            .lookup(fixture.environment.id)
            .await
            .unwrap()
            .is_some()
    );
    assert!(repo.release().lookup(fixture.release.id).await.unwrap().is_some());
    repo.cancel().await.unwrap();
    assert!(!ctx.nodestore.contains(&fixture.event.node_id()).await);
}

#[tokio::test]
async fn test_group_api_and_repository_cascades_resume_after_partial_run() {
    let mut rng = ChaChaRng::seed_from_u64(42);
    let ctx = TestContext::new();
    let user_id = Ulid::from_parts(1, 1);

    let group = add_entity(&ctx, &mut rng, EntityKind::Group, EntityStatus::PendingDeletion).await;
    let application = add_application(&ctx, &mut rng, EntityStatus::PendingDeletion).await;
    let repository = add_entity(
        &ctx,
        &mut rng,
        EntityKind::Repository,
        EntityStatus::PendingDeletion,
    )
    .await;

    let mut repo = ctx.repo().await;
    let row = repo.group().lookup(group.id).await.unwrap().unwrap();
    for hash in ["a", "b"] {
        repo.group()
            .add_hash(&mut rng, &ctx.clock, &row, hash.repeat(32))
            .await
            .unwrap();
    }
    repo.group()
        .add_meta(&mut rng, &ctx.clock, &row, "foo".to_owned(), "bar".to_owned())
        .await
        .unwrap();
    repo.api_token()
        .add(&mut rng, &ctx.clock, &application, user_id)
        .await
        .unwrap();
    repo.api_grant()
        .add(
            &mut rng,
            &ctx.clock,
            &application,
            user_id,
            "http://example.com".to_owned(),
        )
        .await
        .unwrap();
    let code_repository = repo
        .code_repository()
        .lookup(repository.id)
        .await
        .unwrap()
        .unwrap();
    repo.commit()
        .add(&mut rng, &ctx.clock, &code_repository, None, "1234abcd".to_owned())
        .await
        .unwrap();
    repo.save().await.unwrap();

    // Part of each cascade already happened
    let mut repo = ctx.repo().await;
    assert_eq!(repo.group().delete_hashes(group.id).await.unwrap(), 2);
    assert_eq!(
        repo.api_grant()
            .delete_for_application(application.id)
            .await
            .unwrap(),
        1
    );
    assert_eq!(
        repo.commit()
            .delete_for_repository(repository.id)
            .await
            .unwrap(),
        1
    );
    repo.save().await.unwrap();

    for _ in 0..2 {
        jobs::delete_groups(&ctx.state, &[group.id]).await.unwrap();
        jobs::delete_api_application(&ctx.state, application.id)
            .await
            .unwrap();
        jobs::delete_repository(&ctx.state, repository.id)
            .await
            .unwrap();
    }

    assert_eq!(ctx.status(group).await, None);
    assert_eq!(ctx.status(application.entity_ref()).await, None);
    assert_eq!(ctx.status(repository).await, None);

    let mut repo = ctx.repo().await;
    assert!(repo.group().dependents(group.id).await.unwrap().is_empty());
    let deleted = repo
        .api_token()
        .delete_for_application(application.id, None)
        .await
        .unwrap();
    assert_eq!(deleted, 0);
    repo.cancel().await.unwrap();

    assert_eq!(ctx.provider.calls(), vec![repository.id]);
}

#[tokio::test]
async fn test_cascades_defer_side_effects_until_commit() {
    let mut rng = ChaChaRng::seed_from_u64(42);
    let ctx = TestContext::new();

    let fixture =
        organization_fixture(&ctx, &mut rng, EntityStatus::PendingDeletion, Some("dummy")).await;

    let executor = ctx.state.executors().get(EntityKind::Organization);
    let mut repo = ctx.repo().await;
    let post_commit = executor
        .execute(&mut repo, fixture.organization.id)
        .await
        .unwrap();

    assert!(!post_commit.is_empty());
    assert_eq!(post_commit.node_ids(), [fixture.event.node_id()]);
    let repositories: Vec<_> = post_commit.repositories().iter().map(|r| r.id).collect();
    assert_eq!(repositories, vec![fixture.repository.id]);

    // Nothing outside of the transaction happened yet
    assert!(ctx.provider.calls().is_empty());
    assert!(ctx.nodestore.contains(&fixture.event.node_id()).await);

    repo.save().await.unwrap();
    post_commit.run(&ctx.state).await;

    assert_organization_deleted(&ctx, &fixture).await;
    assert_eq!(ctx.provider.calls(), vec![fixture.repository.id]);

    // Running the cascade on a deleted entity has nothing left to do
    let mut repo = ctx.repo().await;
    let post_commit = executor
        .execute(&mut repo, fixture.organization.id)
        .await
        .unwrap();
    assert!(post_commit.is_empty());
    repo.cancel().await.unwrap();
}
