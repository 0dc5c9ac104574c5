//! Worker dispatch: queue consumers and the pipeline seam.

pub mod pipeline;
pub mod worker;

pub use pipeline::{CardPipeline, PipelineEvent, StubPipeline};
pub use worker::{Worker, spawn_workers};
