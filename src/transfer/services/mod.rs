//! Transfer orchestration services.

mod pipeline;

pub use pipeline::TransferPipeline;
