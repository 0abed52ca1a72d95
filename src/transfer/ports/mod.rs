//! Port contracts for image transfers.

pub mod image_client;
pub mod observer;

pub use image_client::{ImageClient, ImageClientError, ImageClientResult, run_cancellable};
pub use observer::StepObserver;
