//! Pipeline orchestrator
//!
//! A [`Pipeline`] wraps an ordered list of processors with a source and a
//! sink, links adjacent pairs in both directions, and manages the
//! collective lifecycle. Frames queued on the pipeline enter at the
//! source; frames reaching the sink are handed to the caller's downstream
//! callback; frames arriving back at the source travel to the caller's
//! upstream callback.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, error, info};
use uuid::Uuid;

use voicepipe_core::{Direction, Error, Frame, Result, SystemFrame};

use crate::processor::{FrameHandler, Processor, ProcessorContext, StatsSnapshot};

/// Callback invoked for frames exiting the pipeline at a boundary.
pub type FrameCallback = Arc<dyn Fn(Frame) + Send + Sync>;

/// Lifecycle state of the pipeline as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Constructed,
    Running,
    Stopped,
}

/// Boundary adapter at the head of the chain.
struct SourceHandler {
    upstream_callback: Option<FrameCallback>,
}

#[async_trait]
impl FrameHandler for SourceHandler {
    fn name(&self) -> &str {
        "source"
    }

    async fn handle_frame(
        &self,
        frame: Frame,
        direction: Direction,
        ctx: &ProcessorContext,
    ) -> Result<()> {
        match direction {
            Direction::Downstream => ctx.push(frame, Direction::Downstream),
            Direction::Upstream => match &self.upstream_callback {
                Some(callback) => callback(frame),
                None => debug!(frame = %frame, "no upstream consumer, dropping frame"),
            },
        }
        Ok(())
    }
}

/// Boundary adapter at the tail of the chain.
struct SinkHandler {
    downstream_callback: Option<FrameCallback>,
}

#[async_trait]
impl FrameHandler for SinkHandler {
    fn name(&self) -> &str {
        "sink"
    }

    async fn handle_frame(
        &self,
        frame: Frame,
        direction: Direction,
        ctx: &ProcessorContext,
    ) -> Result<()> {
        match direction {
            Direction::Downstream => match &self.downstream_callback {
                Some(callback) => callback(frame),
                None => debug!(frame = %frame, "no downstream consumer, dropping frame"),
            },
            Direction::Upstream => ctx.push(frame, Direction::Upstream),
        }
        Ok(())
    }
}

/// An ordered chain of processors bracketed by a source and a sink.
pub struct Pipeline {
    id: Uuid,
    processors: Vec<Arc<Processor>>,
    source: Arc<Processor>,
    sink: Arc<Processor>,
    allow_interruptions: bool,
    state: Mutex<PipelineState>,
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// Pipeline id, for logging.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> PipelineState {
        *self.state.lock()
    }

    /// Set up every processor in order, then start them all, then emit
    /// the start frame. A setup failure aborts and leaves no processor
    /// running.
    pub async fn start(&self) -> Result<()> {
        {
            let state = self.state.lock();
            if *state != PipelineState::Constructed {
                return Ok(());
            }
        }

        for (index, processor) in self.processors.iter().enumerate() {
            if let Err(setup_error) = processor.setup().await {
                error!(
                    pipeline = %self.id,
                    processor = processor.name(),
                    error = %setup_error,
                    "setup failed, aborting pipeline start"
                );
                for ready in self.processors[..index].iter().rev() {
                    ready.stop().await;
                }
                *self.state.lock() = PipelineState::Stopped;
                return Err(Error::lifecycle(processor.name(), setup_error.to_string()));
            }
        }

        for processor in &self.processors {
            processor.start();
        }
        *self.state.lock() = PipelineState::Running;
        info!(pipeline = %self.id, stages = self.processors.len(), "pipeline started");

        self.source.queue(Frame::system(SystemFrame::Start {
            allow_interruptions: self.allow_interruptions,
        }));
        Ok(())
    }

    /// Stop every processor in reverse order. Each processor drains its
    /// current frame, exits its loop, and runs cleanup. Idempotent.
    pub async fn stop(&self) {
        {
            let mut state = self.state.lock();
            if *state == PipelineState::Stopped {
                return;
            }
            *state = PipelineState::Stopped;
        }
        for processor in self.processors.iter().rev() {
            processor.stop().await;
        }
        info!(pipeline = %self.id, "pipeline stopped");
    }

    /// Deposit a frame at the source, travelling downstream. The standard
    /// external entry point.
    pub fn queue(&self, frame: Frame) {
        self.source.queue(frame);
    }

    /// Deposit a frame at the sink, travelling upstream.
    pub fn queue_upstream(&self, frame: Frame) {
        self.sink.queue_directed(frame, Direction::Upstream);
    }

    /// The source boundary processor.
    pub fn source(&self) -> &Arc<Processor> {
        &self.source
    }

    /// The sink boundary processor.
    pub fn sink(&self) -> &Arc<Processor> {
        &self.sink
    }

    /// Counter snapshots for every processor, source and sink included.
    pub fn stats(&self) -> Vec<(String, StatsSnapshot)> {
        self.processors
            .iter()
            .map(|p| (p.name().to_string(), p.stats()))
            .collect()
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("id", &self.id)
            .field("stages", &self.processors.len())
            .field("state", &self.state())
            .finish()
    }
}

/// Builder for [`Pipeline`].
pub struct PipelineBuilder {
    stages: Vec<Arc<Processor>>,
    downstream_callback: Option<FrameCallback>,
    upstream_callback: Option<FrameCallback>,
    allow_interruptions: bool,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self {
            stages: Vec::new(),
            downstream_callback: None,
            upstream_callback: None,
            allow_interruptions: true,
        }
    }

    /// Append a processor to the chain.
    pub fn stage(mut self, processor: Arc<Processor>) -> Self {
        self.stages.push(processor);
        self
    }

    /// Append a bare handler, wrapping it in a default processor.
    pub fn handler(self, handler: Arc<dyn FrameHandler>) -> Self {
        self.stage(Processor::new(handler))
    }

    /// Receive frames that exit through the sink.
    pub fn on_downstream(mut self, callback: impl Fn(Frame) + Send + Sync + 'static) -> Self {
        self.downstream_callback = Some(Arc::new(callback));
        self
    }

    /// Receive frames that exit through the source (back-channel).
    pub fn on_upstream(mut self, callback: impl Fn(Frame) + Send + Sync + 'static) -> Self {
        self.upstream_callback = Some(Arc::new(callback));
        self
    }

    /// Whether cancel/interruption frames may discard queued content.
    pub fn allow_interruptions(mut self, allow: bool) -> Self {
        self.allow_interruptions = allow;
        self
    }

    pub fn build(self) -> Pipeline {
        let source = Processor::new(Arc::new(SourceHandler {
            upstream_callback: self.upstream_callback,
        }));
        let sink = Processor::new(Arc::new(SinkHandler {
            downstream_callback: self.downstream_callback,
        }));

        let mut processors = Vec::with_capacity(self.stages.len() + 2);
        processors.push(Arc::clone(&source));
        processors.extend(self.stages);
        processors.push(Arc::clone(&sink));

        for pair in processors.windows(2) {
            pair[0].link(&pair[1]);
        }

        Pipeline {
            id: Uuid::new_v4(),
            processors,
            source,
            sink,
            allow_interruptions: self.allow_interruptions,
            state: Mutex::new(PipelineState::Constructed),
        }
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
