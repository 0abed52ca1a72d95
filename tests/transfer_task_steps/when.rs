//! When steps for transfer task BDD scenarios.

use std::time::Duration;

use super::world::{TransferWorld, WAIT_LIMIT, run_async};
use image_relay::task::services::CreateTaskRequest;
use image_relay::transfer::domain::TransferStep;
use rstest_bdd_macros::when;

#[when(r#"a transfer of "{source}" is requested"#)]
fn transfer_requested(world: &mut TransferWorld, source: String) -> Result<(), eyre::Report> {
    let destination = world
        .destination
        .clone()
        .ok_or_else(|| eyre::eyre!("missing destination in scenario world"))?;
    let result = run_async(
        world
            .service
            .create_task(CreateTaskRequest::new(source, destination)),
    );
    world.creation = Some(result);
    Ok(())
}

#[when("the task finishes")]
fn task_finishes(world: &mut TransferWorld) -> Result<(), eyre::Report> {
    let task_id = world.task_id()?;
    run_async(tokio::time::timeout(WAIT_LIMIT, async {
        while world.service.is_executing(task_id) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }))
    .map_err(|_| eyre::eyre!("task {task_id} did not finish in time"))
}

#[when("the task reaches the push step")]
fn task_reaches_push(world: &mut TransferWorld) -> Result<(), eyre::Report> {
    let task_id = world.task_id()?;
    run_async(tokio::time::timeout(WAIT_LIMIT, async {
        loop {
            let view = world.service.get_task(task_id).await?;
            if view.task.step() >= TransferStep::Push {
                return Ok::<_, eyre::Report>(());
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }))
    .map_err(|_| eyre::eyre!("task {task_id} never reached the push step"))?
}

#[when("the task is cancelled")]
fn task_cancelled(world: &mut TransferWorld) -> Result<(), eyre::Report> {
    let task_id = world.task_id()?;
    let result = run_async(world.service.cancel_task(task_id));
    world.cancellation = Some(result);
    Ok(())
}
