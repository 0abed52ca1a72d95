//! Then steps for transfer task BDD scenarios.

use super::world::{TransferWorld, run_async};
use image_relay::registry::services::CredentialError;
use image_relay::task::{domain::TaskStatus, services::TaskLifecycleError};
use rstest_bdd_macros::then;

#[then(r#"the task status is "{status}""#)]
fn task_status_is(world: &TransferWorld, status: String) -> Result<(), eyre::Report> {
    let expected = TaskStatus::try_from(status.as_str())
        .map_err(|err| eyre::eyre!("invalid expected status in scenario: {err}"))?;
    let task_id = world.task_id()?;
    let view = run_async(world.service.get_task(task_id))?;

    if view.task.status() != expected {
        return Err(eyre::eyre!(
            "expected status {}, found {}",
            expected.as_str(),
            view.task.status().as_str()
        ));
    }
    Ok(())
}

#[then(r#"the image was pushed as "{reference}""#)]
fn image_pushed_as(world: &TransferWorld, reference: String) -> Result<(), eyre::Report> {
    let pushed = world.images.pushed();
    eyre::ensure!(
        pushed.iter().any(|image| image.reference == reference),
        "expected a push of {reference}, saw {pushed:?}"
    );
    Ok(())
}

#[then("nothing was pushed")]
fn nothing_pushed(world: &TransferWorld) -> Result<(), eyre::Report> {
    let pushed = world.images.pushed();
    eyre::ensure!(pushed.is_empty(), "expected no pushes, saw {pushed:?}");
    Ok(())
}

#[then(r#"the task error mentions "{fragment}""#)]
fn task_error_mentions(world: &TransferWorld, fragment: String) -> Result<(), eyre::Report> {
    let task_id = world.task_id()?;
    let view = run_async(world.service.get_task(task_id))?;
    let message = view
        .task
        .error_message()
        .ok_or_else(|| eyre::eyre!("task has no error message"))?;
    eyre::ensure!(
        message.contains(&fragment),
        "expected error to mention {fragment:?}, got {message:?}"
    );
    Ok(())
}

#[then("the request is rejected as an invalid reference")]
fn rejected_as_invalid_reference(world: &TransferWorld) -> Result<(), eyre::Report> {
    let result = world
        .creation
        .as_ref()
        .ok_or_else(|| eyre::eyre!("missing creation result"))?;
    if !matches!(result, Err(TaskLifecycleError::InvalidReference(_))) {
        return Err(eyre::eyre!("expected InvalidReference error, got {result:?}"));
    }
    Ok(())
}

#[then("the request is rejected as an incomplete configuration")]
fn rejected_as_incomplete(world: &TransferWorld) -> Result<(), eyre::Report> {
    let result = world
        .creation
        .as_ref()
        .ok_or_else(|| eyre::eyre!("missing creation result"))?;
    if !matches!(
        result,
        Err(TaskLifecycleError::Credentials(
            CredentialError::IncompleteConfiguration
        ))
    ) {
        return Err(eyre::eyre!(
            "expected IncompleteConfiguration error, got {result:?}"
        ));
    }
    Ok(())
}

#[then("the cancellation is refused because the task is finished")]
fn cancellation_refused(world: &TransferWorld) -> Result<(), eyre::Report> {
    let result = world
        .cancellation
        .as_ref()
        .ok_or_else(|| eyre::eyre!("missing cancellation result"))?;
    if !matches!(result, Err(TaskLifecycleError::NotFoundOrTerminal(_))) {
        return Err(eyre::eyre!(
            "expected NotFoundOrTerminal error, got {result:?}"
        ));
    }
    Ok(())
}
