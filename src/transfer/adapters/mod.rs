//! Adapter implementations for the image client port.

pub mod memory;
pub mod oci;

pub use memory::{ImageCall, ImageOperation, InMemoryImageClient, PushedImage};
pub use oci::OciImageClient;
