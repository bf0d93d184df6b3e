//! Frame-processing substrate: processor runtime and pipeline orchestrator
//!
//! This crate provides the per-stage runtime and the pipeline that
//! composes stages:
//! - [`Processor`]: dual-priority queues, cooperative scheduler,
//!   pause/resume, built-in lifecycle frame handling, error recovery
//! - [`FrameHandler`]: the per-frame logic a stage implements
//! - [`Pipeline`]: source/sink bookends, bidirectional linking,
//!   collective lifecycle, external queueing
//! - Utility stages (passthrough, collector)

pub mod pipeline;
pub mod processor;
pub mod stages;

pub use pipeline::{FrameCallback, Pipeline, PipelineBuilder, PipelineState};
pub use processor::{
    FrameHandler, Processor, ProcessorContext, ProcessorState, StatsSnapshot,
};
pub use stages::{collector, CollectorStage, PassthroughStage};
