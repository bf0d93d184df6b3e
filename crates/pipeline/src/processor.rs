//! Per-stage processor runtime
//!
//! A [`Processor`] is a single-stage compute unit: an identity, two FIFO
//! queues, optional upstream/downstream neighbors, a cooperative scheduler
//! task, and a user-defined [`FrameHandler`]. System-category frames land
//! in the priority queue and preempt Data/Control frames; within each
//! queue arrival order is preserved.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use voicepipe_config::ProcessorConfig;
use voicepipe_core::{
    ControlFrame, Direction, Frame, FrameCategory, FramePayload, ProcessorTarget, Result,
    SystemFrame,
};

/// Process-wide processor id counter.
static NEXT_PROCESSOR_ID: AtomicU64 = AtomicU64::new(1);

/// Idle yield between scheduler iterations when both queues are empty.
const IDLE_YIELD: Duration = Duration::from_millis(1);

/// User-defined per-frame logic hosted by a [`Processor`].
///
/// The runtime intercepts lifecycle system frames (start, cancel, stop,
/// interruption, pause, resume) and the end control frame before this
/// trait sees anything; every other frame is passed to `handle_frame`.
/// A returned error is recovered by the runtime: counted, logged, and
/// surfaced downstream as a non-fatal error frame.
#[async_trait]
pub trait FrameHandler: Send + Sync + 'static {
    /// Stage name used for the processor identity and logging.
    fn name(&self) -> &str;

    /// Acquire resources. Called once by the pipeline before any frame
    /// is dispatched; a failure aborts pipeline start.
    async fn setup(&self, _ctx: &ProcessorContext) -> Result<()> {
        Ok(())
    }

    /// Handle one frame travelling in `direction`. Implementations that
    /// do not consume the frame forward it with `ctx.push`.
    async fn handle_frame(
        &self,
        frame: Frame,
        direction: Direction,
        ctx: &ProcessorContext,
    ) -> Result<()>;

    /// Release resources. Runs in the scheduler task after the loop has
    /// exited, or directly if the processor never started.
    async fn cleanup(&self) -> Result<()> {
        Ok(())
    }
}

/// Lifecycle state of a processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorState {
    Constructed,
    Running,
    Stopped,
}

/// Point-in-time counters for one processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub handled: u64,
    pub system: u64,
    pub control: u64,
    pub data: u64,
    pub errors: u64,
    pub priority_depth: usize,
    pub ordinary_depth: usize,
}

#[derive(Default)]
struct Counters {
    handled: AtomicU64,
    system: AtomicU64,
    control: AtomicU64,
    data: AtomicU64,
    errors: AtomicU64,
}

impl Counters {
    fn record(&self, category: FrameCategory) {
        self.handled.fetch_add(1, Ordering::Relaxed);
        let counter = match category {
            FrameCategory::System => &self.system,
            FrameCategory::Control => &self.control,
            FrameCategory::Data => &self.data,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

struct QueuedFrame {
    frame: Frame,
    direction: Direction,
}

/// Built-in handling decisions for intercepted frames.
enum BuiltIn {
    RecordStart(bool),
    DiscardOrdinary,
    Stop,
    Pause(ProcessorTarget),
    Resume(ProcessorTarget),
    ForwardOnly,
}

/// A single-stage compute unit with dual-priority queues and a
/// cooperative scheduler.
pub struct Processor {
    id: u64,
    name: String,
    handler: Arc<dyn FrameHandler>,
    priority: Mutex<VecDeque<QueuedFrame>>,
    ordinary: Mutex<VecDeque<QueuedFrame>>,
    downstream: Mutex<Option<Weak<Processor>>>,
    upstream: Mutex<Option<Weak<Processor>>>,
    state: Mutex<ProcessorState>,
    paused: AtomicBool,
    allow_interruptions: AtomicBool,
    stop_requested: AtomicBool,
    enable_logging: bool,
    enable_metrics: bool,
    counters: Counters,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Processor {
    /// Create a processor with the default configuration.
    pub fn new(handler: Arc<dyn FrameHandler>) -> Arc<Self> {
        Self::with_config(handler, &ProcessorConfig::default())
    }

    /// Create a processor with an explicit configuration.
    pub fn with_config(handler: Arc<dyn FrameHandler>, config: &ProcessorConfig) -> Arc<Self> {
        let id = config
            .id
            .unwrap_or_else(|| NEXT_PROCESSOR_ID.fetch_add(1, Ordering::Relaxed));
        let name = config
            .name
            .clone()
            .unwrap_or_else(|| handler.name().to_string());
        Arc::new(Self {
            id,
            name,
            handler,
            priority: Mutex::new(VecDeque::new()),
            ordinary: Mutex::new(VecDeque::new()),
            downstream: Mutex::new(None),
            upstream: Mutex::new(None),
            state: Mutex::new(ProcessorState::Constructed),
            paused: AtomicBool::new(false),
            allow_interruptions: AtomicBool::new(true),
            stop_requested: AtomicBool::new(false),
            enable_logging: config.enable_logging,
            enable_metrics: config.enable_metrics,
            counters: Counters::default(),
            task: Mutex::new(None),
        })
    }

    /// Unique processor id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Human-readable name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ProcessorState {
        *self.state.lock()
    }

    /// Whether the ordinary queue is currently paused.
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    /// Establish bidirectional neighbor references: self → `downstream`
    /// and `downstream` → self (upstream). The links are non-owning.
    pub fn link(self: &Arc<Self>, downstream: &Arc<Processor>) {
        *self.downstream.lock() = Some(Arc::downgrade(downstream));
        *downstream.upstream.lock() = Some(Arc::downgrade(self));
    }

    /// Append a frame to this processor's queues, travelling downstream.
    pub fn queue(&self, frame: Frame) {
        self.queue_directed(frame, Direction::Downstream);
    }

    /// Append a frame to this processor's queues with an explicit travel
    /// direction. Non-blocking; always succeeds.
    pub fn queue_directed(&self, frame: Frame, direction: Direction) {
        let item = QueuedFrame { frame, direction };
        match item.frame.category() {
            FrameCategory::System => self.priority.lock().push_back(item),
            FrameCategory::Control | FrameCategory::Data => self.ordinary.lock().push_back(item),
        }
    }

    /// Synchronously enqueue a frame on the neighbor in `direction`.
    /// Without a neighbor the frame is dropped with a log line.
    pub fn push(&self, frame: Frame, direction: Direction) {
        match self.neighbor(direction) {
            Some(peer) => peer.queue_directed(frame, direction),
            None => {
                if self.enable_logging {
                    debug!(
                        processor = %self.name,
                        frame = %frame,
                        ?direction,
                        "no peer in direction, dropping frame"
                    );
                }
            }
        }
    }

    fn neighbor(&self, direction: Direction) -> Option<Arc<Processor>> {
        let slot = match direction {
            Direction::Downstream => &self.downstream,
            Direction::Upstream => &self.upstream,
        };
        slot.lock().as_ref().and_then(Weak::upgrade)
    }

    /// The context handed to the frame handler and adapter callbacks.
    pub fn context(self: &Arc<Self>) -> ProcessorContext {
        ProcessorContext {
            processor: Arc::downgrade(self),
        }
    }

    /// Run the handler's resource acquisition.
    pub async fn setup(self: &Arc<Self>) -> Result<()> {
        let ctx = self.context();
        self.handler.setup(&ctx).await
    }

    /// Spawn the scheduler task. Idempotent once running.
    pub fn start(self: &Arc<Self>) {
        let mut state = self.state.lock();
        if *state != ProcessorState::Constructed {
            return;
        }
        *state = ProcessorState::Running;
        drop(state);

        let processor = Arc::clone(self);
        let task = tokio::spawn(async move { processor.run_loop().await });
        *self.task.lock() = Some(task);
        if self.enable_logging {
            info!(processor = %self.name, id = self.id, "processor started");
        }
    }

    /// Signal the scheduler to exit after the current frame, await it,
    /// and let it run `cleanup`. Idempotent.
    pub async fn stop(&self) {
        enum Pending {
            Await(JoinHandle<()>),
            CleanupDirect,
            Nothing,
        }

        let pending = {
            let mut state = self.state.lock();
            match *state {
                ProcessorState::Stopped => Pending::Nothing,
                ProcessorState::Constructed => {
                    *state = ProcessorState::Stopped;
                    Pending::CleanupDirect
                }
                ProcessorState::Running => {
                    self.stop_requested.store(true, Ordering::Release);
                    match self.task.lock().take() {
                        Some(task) => Pending::Await(task),
                        None => Pending::Nothing,
                    }
                }
            }
        };

        match pending {
            Pending::Await(task) => {
                let _ = task.await;
            }
            Pending::CleanupDirect => {
                if let Err(error) = self.handler.cleanup().await {
                    warn!(processor = %self.name, %error, "cleanup failed");
                }
            }
            Pending::Nothing => {}
        }
    }

    /// Point-in-time counters and queue depths. Readable at any time.
    pub fn stats(&self) -> StatsSnapshot {
        StatsSnapshot {
            handled: self.counters.handled.load(Ordering::Relaxed),
            system: self.counters.system.load(Ordering::Relaxed),
            control: self.counters.control.load(Ordering::Relaxed),
            data: self.counters.data.load(Ordering::Relaxed),
            errors: self.counters.errors.load(Ordering::Relaxed),
            priority_depth: self.priority.lock().len(),
            ordinary_depth: self.ordinary.lock().len(),
        }
    }

    /// Dequeue the next frame: priority first, then (unless paused) the
    /// ordinary queue.
    fn dequeue(&self) -> Option<QueuedFrame> {
        if let Some(item) = self.priority.lock().pop_front() {
            return Some(item);
        }
        if self.paused.load(Ordering::Acquire) {
            return None;
        }
        self.ordinary.lock().pop_front()
    }

    fn clear_ordinary(&self) -> usize {
        let mut ordinary = self.ordinary.lock();
        let discarded = ordinary.len();
        ordinary.clear();
        discarded
    }

    async fn run_loop(self: Arc<Self>) {
        let ctx = self.context();
        loop {
            match self.dequeue() {
                Some(item) => {
                    self.dispatch(item, &ctx).await;
                    if self.stop_requested.load(Ordering::Acquire) {
                        break;
                    }
                }
                None => {
                    if self.stop_requested.load(Ordering::Acquire) {
                        break;
                    }
                    sleep(IDLE_YIELD).await;
                }
            }
        }

        if let Err(error) = self.handler.cleanup().await {
            warn!(processor = %self.name, %error, "cleanup failed");
        }
        *self.state.lock() = ProcessorState::Stopped;
        if self.enable_metrics {
            let stats = self.stats();
            debug!(
                processor = %self.name,
                handled = stats.handled,
                errors = stats.errors,
                "processor stopped"
            );
        }
    }

    async fn dispatch(&self, item: QueuedFrame, ctx: &ProcessorContext) {
        let QueuedFrame { frame, direction } = item;
        self.counters.record(frame.category());

        let builtin = match &frame.payload {
            FramePayload::System(system) => match system {
                SystemFrame::Start {
                    allow_interruptions,
                } => Some(BuiltIn::RecordStart(*allow_interruptions)),
                SystemFrame::Cancel | SystemFrame::Interruption => Some(BuiltIn::DiscardOrdinary),
                SystemFrame::Stop => Some(BuiltIn::Stop),
                SystemFrame::PauseProcessor { target } => Some(BuiltIn::Pause(target.clone())),
                SystemFrame::ResumeProcessor { target } => Some(BuiltIn::Resume(target.clone())),
                _ => None,
            },
            FramePayload::Control(ControlFrame::End) => Some(BuiltIn::ForwardOnly),
            _ => None,
        };

        let Some(builtin) = builtin else {
            if let Err(error) = self.handler.handle_frame(frame, direction, ctx).await {
                self.counters.errors.fetch_add(1, Ordering::Relaxed);
                warn!(processor = %self.name, %error, "frame handler error");
                ctx.push_error(&error.to_string(), false);
            }
            return;
        };

        let is_stop = matches!(builtin, BuiltIn::Stop);
        match builtin {
            BuiltIn::RecordStart(allow) => {
                self.allow_interruptions.store(allow, Ordering::Release);
            }
            BuiltIn::DiscardOrdinary => {
                if self.allow_interruptions.load(Ordering::Acquire) {
                    let discarded = self.clear_ordinary();
                    if discarded > 0 && self.enable_logging {
                        debug!(
                            processor = %self.name,
                            discarded,
                            "discarded queued frames on interruption"
                        );
                    }
                }
            }
            BuiltIn::Pause(target) => {
                if target.matches(self.id, &self.name) {
                    self.paused.store(true, Ordering::Release);
                    if self.enable_logging {
                        debug!(processor = %self.name, "paused");
                    }
                }
            }
            BuiltIn::Resume(target) => {
                if target.matches(self.id, &self.name) {
                    self.paused.store(false, Ordering::Release);
                    if self.enable_logging {
                        debug!(processor = %self.name, "resumed");
                    }
                }
            }
            BuiltIn::Stop | BuiltIn::ForwardOnly => {}
        }

        // Forward before the stop flag takes effect so the stop frame
        // reaches the peer ahead of this processor's own exit.
        self.push(frame, direction);
        if is_stop {
            self.stop_requested.store(true, Ordering::Release);
        }
    }
}

impl std::fmt::Debug for Processor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Processor")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("state", &self.state())
            .finish()
    }
}

/// The frame contract offered to handlers and adapter callbacks.
///
/// Holds a non-owning reference to the processor; once the processor is
/// dropped every operation becomes a quiet no-op.
#[derive(Clone)]
pub struct ProcessorContext {
    processor: Weak<Processor>,
}

impl ProcessorContext {
    /// Emit a frame to the peer in the given direction.
    pub fn push(&self, frame: Frame, direction: Direction) {
        if let Some(processor) = self.processor.upgrade() {
            processor.push(frame, direction);
        }
    }

    /// Synthesize and push an error frame downstream.
    pub fn push_error(&self, message: &str, fatal: bool) {
        self.push(Frame::error(message, fatal), Direction::Downstream);
    }

    /// Post a frame back into the owning processor's own queues. Used by
    /// adapter callbacks (reader tasks, streaming results) so that all
    /// handling stays on the single scheduler.
    pub fn enqueue(&self, frame: Frame, direction: Direction) {
        if let Some(processor) = self.processor.upgrade() {
            processor.queue_directed(frame, direction);
        }
    }

    /// Owning processor id, when it is still alive.
    pub fn processor_id(&self) -> Option<u64> {
        self.processor.upgrade().map(|p| p.id())
    }

    /// Owning processor name, when it is still alive.
    pub fn processor_name(&self) -> Option<String> {
        self.processor.upgrade().map(|p| p.name().to_string())
    }
}
