//! Reusable utility stages
//!
//! Small handlers used in composition and tests: a passthrough that
//! forwards everything and a collector that records what reaches it.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use voicepipe_core::{Direction, Frame, Result};

use crate::processor::{FrameHandler, ProcessorContext};

/// Forwards every frame unchanged.
pub struct PassthroughStage {
    name: String,
}

impl PassthroughStage {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl FrameHandler for PassthroughStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle_frame(
        &self,
        frame: Frame,
        direction: Direction,
        ctx: &ProcessorContext,
    ) -> Result<()> {
        ctx.push(frame, direction);
        Ok(())
    }
}

/// Records every frame it sees, then forwards it unchanged.
///
/// Keep a clone of the `Arc<CollectorStage>` to read back what arrived.
#[derive(Default)]
pub struct CollectorStage {
    frames: Mutex<Vec<Frame>>,
}

impl CollectorStage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the collected frames, in arrival order.
    pub fn frames(&self) -> Vec<Frame> {
        self.frames.lock().clone()
    }

    /// Number of frames collected so far.
    pub fn len(&self) -> usize {
        self.frames.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.lock().is_empty()
    }

    /// Drop everything collected so far.
    pub fn clear(&self) {
        self.frames.lock().clear();
    }
}

#[async_trait]
impl FrameHandler for CollectorStage {
    fn name(&self) -> &str {
        "collector"
    }

    async fn handle_frame(
        &self,
        frame: Frame,
        direction: Direction,
        ctx: &ProcessorContext,
    ) -> Result<()> {
        self.frames.lock().push(frame.clone());
        ctx.push(frame, direction);
        Ok(())
    }
}

/// Convenience: a collector wrapped for sharing between the pipeline and
/// the test observing it.
pub fn collector() -> Arc<CollectorStage> {
    Arc::new(CollectorStage::new())
}
