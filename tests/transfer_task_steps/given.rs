//! Given steps for transfer task BDD scenarios.

use std::time::Duration;

use super::world::TransferWorld;
use image_relay::registry::services::DestinationRequest;
use image_relay::transfer::adapters::ImageOperation;
use rstest_bdd_macros::given;

#[given(r#"an inline destination "{url}" for user "{username}""#)]
fn inline_destination(world: &mut TransferWorld, url: String, username: String) {
    world.destination = Some(DestinationRequest::inline(url, username, "s3cret"));
}

#[given("a destination without credentials")]
fn destination_without_credentials(world: &mut TransferWorld) {
    world.destination = Some(DestinationRequest::default());
}

#[given(r#"the registry rejects pushes with "{message}""#)]
fn registry_rejects_pushes(world: &mut TransferWorld, message: String) {
    world.images.fail_on(ImageOperation::Push, message);
}

#[given("pushes stall for {seconds:u64} seconds")]
fn pushes_stall(world: &mut TransferWorld, seconds: u64) {
    world
        .images
        .delay_on(ImageOperation::Push, Duration::from_secs(seconds));
}
