//! Per-frame loop: capture, detect, post-process, render.
//!
//! Collaborators are reached through the [`FrameSource`], [`Detector`] and
//! [`Renderer`] traits so the loop can be driven by OpenCV in the binaries and
//! by scripted fakes in tests.

use std::ops::{Deref, DerefMut};
use std::thread;

use crossbeam_channel::{Receiver, Sender, TryRecvError, TrySendError};

use crate::error::{DetectorError, Result};
use crate::fps::FpsCounter;
use crate::postprocess::{Detection, DetectionPostProcessor, RawOutput};

/// Pixel dimensions of a captured frame.
pub trait Frame {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
}

pub trait FrameSource {
    type Frame: Frame;

    /// Next frame, `None` once the stream has ended.
    fn read_frame(&mut self) -> Result<Option<Self::Frame>>;

    /// Release the underlying device. Must be safe to call more than once.
    fn release(&mut self);
}

pub trait Detector<F> {
    /// Raw output tensors for one frame, one entry per output layer.
    fn infer(&mut self, frame: &F) -> Result<Vec<RawOutput>>;
}

pub trait Renderer<F> {
    /// Draw detections and the FPS overlay, then present the frame.
    fn render(&mut self, frame: &mut F, detections: &[Detection], fps: f64) -> Result<Flow>;
}

/// Whether the loop should keep going after a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

/// Releases the wrapped source when dropped, on every exit path.
pub struct SourceGuard<S: FrameSource> {
    source: S,
}

impl<S: FrameSource> SourceGuard<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }
}

impl<S: FrameSource> Deref for SourceGuard<S> {
    type Target = S;

    fn deref(&self) -> &S {
        &self.source
    }
}

impl<S: FrameSource> DerefMut for SourceGuard<S> {
    fn deref_mut(&mut self) -> &mut S {
        &mut self.source
    }
}

impl<S: FrameSource> Drop for SourceGuard<S> {
    fn drop(&mut self) {
        self.source.release();
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum FrameOutcome {
    Rendered {
        detections: Vec<Detection>,
        flow: Flow,
    },
    /// Detector output did not match the class table; the frame was dropped.
    Skipped,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunStats {
    pub frames_rendered: u64,
    pub frames_skipped: u64,
}

impl RunStats {
    fn record(&mut self, outcome: &FrameOutcome) -> Flow {
        match outcome {
            FrameOutcome::Rendered { flow, .. } => {
                self.frames_rendered += 1;
                *flow
            }
            FrameOutcome::Skipped => {
                self.frames_skipped += 1;
                Flow::Continue
            }
        }
    }
}

pub struct Pipeline<D, R> {
    detector: D,
    post_processor: DetectionPostProcessor,
    renderer: R,
    fps: FpsCounter,
}

impl<D, R> Pipeline<D, R> {
    pub fn new(detector: D, post_processor: DetectionPostProcessor, renderer: R) -> Self {
        Self {
            detector,
            post_processor,
            renderer,
            fps: FpsCounter::new(),
        }
    }

    pub fn fps(&self) -> f64 {
        self.fps.fps()
    }

    pub fn post_processor(&self) -> &DetectionPostProcessor {
        &self.post_processor
    }

    /// Run one frame through detect, post-process and render.
    pub fn process_frame<F>(&mut self, frame: &mut F) -> Result<FrameOutcome>
    where
        F: Frame,
        D: Detector<F>,
        R: Renderer<F>,
    {
        let detections = match self.detect(frame) {
            Ok(detections) => detections,
            Err(err) if err.is_frame_local() => {
                log::warn!("Skipping frame: {}", err);
                return Ok(FrameOutcome::Skipped);
            }
            Err(err) => return Err(err),
        };
        let fps = self.fps.tick();
        let flow = self.renderer.render(frame, &detections, fps)?;
        Ok(FrameOutcome::Rendered { detections, flow })
    }

    fn detect<F>(&mut self, frame: &F) -> Result<Vec<Detection>>
    where
        F: Frame,
        D: Detector<F>,
    {
        let outputs = self.detector.infer(frame)?;
        self.post_processor
            .process(&outputs, frame.width(), frame.height())
    }

    /// Sequential loop on the calling thread until the stream ends or the
    /// renderer asks to stop. The source is released on return, including errors.
    pub fn run<S>(&mut self, source: S) -> Result<RunStats>
    where
        S: FrameSource,
        D: Detector<S::Frame>,
        R: Renderer<S::Frame>,
    {
        let mut source = SourceGuard::new(source);
        let mut stats = RunStats::default();
        while let Some(mut frame) = source.read_frame()? {
            let outcome = self.process_frame(&mut frame)?;
            if stats.record(&outcome) == Flow::Stop {
                log::info!("Renderer requested stop");
                break;
            }
        }
        log::info!(
            "Pipeline finished: {} frames rendered, {} skipped",
            stats.frames_rendered,
            stats.frames_skipped
        );
        Ok(stats)
    }

    /// Like [`Pipeline::run`], but capture happens on its own thread and only
    /// the newest frame is kept while detection is busy.
    pub fn run_threaded<S>(&mut self, source: S) -> Result<RunStats>
    where
        S: FrameSource + Send + 'static,
        S::Frame: Send + 'static,
        D: Detector<S::Frame>,
        R: Renderer<S::Frame>,
    {
        let (producer, consumer) = latest_frame_queue::<Captured<S::Frame>>();
        let capture = thread::Builder::new()
            .name("capture".to_string())
            .spawn(move || capture_loop(SourceGuard::new(source), producer))
            .map_err(|err| DetectorError::Device(format!("failed to spawn capture thread: {}", err)))?;

        let result = self.consume(&consumer);
        // closing the queue stops the capture thread, which releases the source
        drop(consumer);
        let dropped = capture
            .join()
            .map_err(|_| DetectorError::Device("capture thread panicked".to_string()))?;
        log::debug!("Capture thread dropped {} stale frames", dropped);
        result
    }

    fn consume<F>(&mut self, consumer: &FrameConsumer<Captured<F>>) -> Result<RunStats>
    where
        F: Frame,
        D: Detector<F>,
        R: Renderer<F>,
    {
        let mut stats = RunStats::default();
        while let Some(captured) = consumer.recv() {
            let mut frame = match captured {
                Captured::Frame(frame) => frame,
                Captured::Failed(err) => return Err(err),
            };
            let outcome = self.process_frame(&mut frame)?;
            if stats.record(&outcome) == Flow::Stop {
                log::info!("Renderer requested stop");
                break;
            }
        }
        log::info!(
            "Pipeline finished: {} frames rendered, {} skipped",
            stats.frames_rendered,
            stats.frames_skipped
        );
        Ok(stats)
    }
}

enum Captured<F> {
    Frame(F),
    Failed(DetectorError),
}

/// Returns the number of stale frames that were replaced.
fn capture_loop<S: FrameSource>(
    mut source: SourceGuard<S>,
    producer: FrameProducer<Captured<S::Frame>>,
) -> u64 {
    let mut dropped = 0;
    while !producer.is_closed() {
        let captured = match source.read_frame() {
            Ok(Some(frame)) => Captured::Frame(frame),
            Ok(None) => break,
            Err(err) => Captured::Failed(err),
        };
        let failed = matches!(captured, Captured::Failed(_));
        match producer.offer(captured) {
            Offer::Queued => {}
            Offer::ReplacedStale => dropped += 1,
            Offer::Closed => break,
        }
        if failed {
            break;
        }
    }
    dropped
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Offer {
    Queued,
    /// The queue was full; the older item was discarded.
    ReplacedStale,
    Closed,
}

/// Single-slot queue where a new item replaces the one still waiting.
pub fn latest_frame_queue<T>() -> (FrameProducer<T>, FrameConsumer<T>) {
    let (tx, rx) = crossbeam_channel::bounded(1);
    let (stop_tx, stop_rx) = crossbeam_channel::bounded(1);
    (
        FrameProducer {
            tx,
            stale: rx.clone(),
            stop: stop_rx,
        },
        FrameConsumer { rx, _stop: stop_tx },
    )
}

pub struct FrameProducer<T> {
    tx: Sender<T>,
    stale: Receiver<T>,
    stop: Receiver<()>,
}

impl<T> FrameProducer<T> {
    pub fn offer(&self, item: T) -> Offer {
        if self.is_closed() {
            return Offer::Closed;
        }
        match self.tx.try_send(item) {
            Ok(()) => Offer::Queued,
            Err(TrySendError::Full(item)) => {
                let replaced = self.stale.try_recv().is_ok();
                // only this producer sends, so the slot is free now
                match self.tx.send(item) {
                    Ok(()) if replaced => Offer::ReplacedStale,
                    Ok(()) => Offer::Queued,
                    Err(_) => Offer::Closed,
                }
            }
            Err(TrySendError::Disconnected(_)) => Offer::Closed,
        }
    }

    /// True once the consumer has been dropped.
    pub fn is_closed(&self) -> bool {
        matches!(self.stop.try_recv(), Err(TryRecvError::Disconnected))
    }
}

pub struct FrameConsumer<T> {
    rx: Receiver<T>,
    _stop: Sender<()>,
}

impl<T> FrameConsumer<T> {
    /// Blocks for the next item, `None` once the producer is gone and the slot is empty.
    pub fn recv(&self) -> Option<T> {
        self.rx.recv().ok()
    }
}
