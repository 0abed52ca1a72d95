//! Domain model for image transfers.

mod credentials;
mod error;
mod step;

pub use credentials::RegistryCredentials;
pub use error::TransferError;
pub use step::{TransferOutcome, TransferStep};
