//! Task repository behaviour against an embedded `PostgreSQL` database.

use crate::relay_postgres::helpers::{PostgresContext, new_task, postgres, registry_config};
use eyre::{bail, ensure};
use image_relay::registry::ports::RegistryConfigRepository;
use image_relay::task::{
    domain::{NewTask, Task, TaskStatus},
    ports::{TaskRepository, TaskRepositoryError},
};
use image_relay::transfer::domain::TransferStep;
use mockable::DefaultClock;
use rstest::rstest;

#[rstest]
fn stored_tasks_round_trip(postgres: PostgresContext) -> eyre::Result<()> {
    let context = postgres;
    context.rt.block_on(async {
        let repository = context.tasks();
        let mut task = Task::new(new_task("nginx:1.25"), &DefaultClock);
        repository.store(&task).await?;
        task.start(&DefaultClock)?;
        task.advance(TransferStep::Push)?;
        repository.update(&mut task).await?;

        let stored = repository.find_by_id(task.id()).await?;

        let Some(found) = stored else {
            bail!("task {} should be stored", task.id());
        };
        ensure!(found.status() == TaskStatus::Running);
        ensure!(found.step() == TransferStep::Push);
        ensure!(found.progress() == 60);
        ensure!(found.version() == 1);
        ensure!(found.target_reference() == "harbor.example.com/transform/nginx:1.25");
        eyre::Ok(())
    })
}

#[rstest]
fn stale_update_is_a_version_conflict(postgres: PostgresContext) -> eyre::Result<()> {
    let context = postgres;
    context.rt.block_on(async {
        let repository = context.tasks();
        let mut task = Task::new(new_task("redis:7"), &DefaultClock);
        repository.store(&task).await?;
        let mut stale = task.clone();

        task.cancel("Task cancelled", &DefaultClock)?;
        repository.update(&mut task).await?;
        stale.start(&DefaultClock)?;
        let result = repository.update(&mut stale).await;

        ensure!(
            matches!(result, Err(TaskRepositoryError::VersionConflict { expected: 0, .. })),
            "expected a version conflict, got {result:?}"
        );
        let stored = repository.find_by_id(task.id()).await?;
        ensure!(stored.map(|found| found.status()) == Some(TaskStatus::Cancelled));
        eyre::Ok(())
    })
}

#[rstest]
fn history_and_stats_cover_finished_tasks(postgres: PostgresContext) -> eyre::Result<()> {
    let context = postgres;
    context.rt.block_on(async {
        let repository = context.tasks();
        let mut finished = Vec::new();
        for source in ["alpine", "busybox", "debian"] {
            let mut task = Task::new(new_task(source), &DefaultClock);
            repository.store(&task).await?;
            task.start(&DefaultClock)?;
            task.complete(4, &DefaultClock)?;
            repository.update(&mut task).await?;
            finished.push(task.id());
        }
        let queued = Task::new(new_task("nginx"), &DefaultClock);
        repository.store(&queued).await?;

        let (page, total) = repository.history(2, 0).await?;
        let stats = repository.stats().await?;
        let pending = repository.list_pending().await?;

        ensure!(total == 3);
        ensure!(page.len() == 2);
        ensure!(page.iter().all(|task| finished.contains(&task.id())));
        ensure!(stats.total == 4);
        ensure!(stats.succeeded == 3);
        ensure!(stats.queued == 1);
        ensure!(stats.avg_duration_secs == Some(4.0));
        ensure!(pending.iter().map(Task::id).eq([queued.id()]));
        eyre::Ok(())
    })
}

#[rstest]
fn deleting_a_configuration_detaches_its_tasks(postgres: PostgresContext) -> eyre::Result<()> {
    let context = postgres;
    context.rt.block_on(async {
        let registries = context.registries();
        let tasks = context.tasks();
        let config = registry_config("harbor", true);
        registries.store(&config).await?;
        let task = Task::new(
            NewTask {
                config_id: Some(config.id()),
                ..new_task("nginx")
            },
            &DefaultClock,
        );
        tasks.store(&task).await?;

        registries.delete(config.id()).await?;

        let stored = tasks.find_by_id(task.id()).await?;
        let Some(found) = stored else {
            bail!("task {} should survive the configuration", task.id());
        };
        ensure!(found.config_id().is_none());
        eyre::Ok(())
    })
}

#[rstest]
fn delete_terminal_keeps_active_tasks(postgres: PostgresContext) -> eyre::Result<()> {
    let context = postgres;
    context.rt.block_on(async {
        let repository = context.tasks();
        let pending = Task::new(new_task("nginx"), &DefaultClock);
        let mut failed = Task::new(new_task("redis"), &DefaultClock);
        repository.store(&pending).await?;
        repository.store(&failed).await?;
        failed.start(&DefaultClock)?;
        failed.fail("failed to pull image: not found", 1, &DefaultClock)?;
        repository.update(&mut failed).await?;

        let removed = repository.delete_terminal().await?;

        ensure!(removed == 1);
        ensure!(repository.find_by_id(pending.id()).await?.is_some());
        ensure!(repository.find_by_id(failed.id()).await?.is_none());
        eyre::Ok(())
    })
}

#[rstest]
fn each_test_gets_its_own_migrated_database(
    postgres: PostgresContext,
    #[from(postgres)] neighbour: PostgresContext,
) -> eyre::Result<()> {
    let context = postgres;
    let ours = context.rt.block_on(async {
        let repository = context.tasks();
        repository
            .store(&Task::new(new_task("nginx"), &DefaultClock))
            .await?;
        repository.stats().await
    })?;
    let theirs = neighbour.rt.block_on(neighbour.tasks().stats())?;

    ensure!(ours.total == 1);
    ensure!(theirs.total == 0);
    Ok(())
}
