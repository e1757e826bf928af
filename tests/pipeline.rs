use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use object_detector::{
    ClassTable, Detection, DetectionPostProcessor, Detector, DetectorError, Flow, Frame,
    FrameOutcome, FrameSource, LabelPolicy, LabelPreset, Pipeline, PostProcessConfig,
    RawDetectionRow, RawOutput, Renderer, Result,
};

#[derive(Debug, Clone, Copy, PartialEq)]
struct TestFrame {
    id: u32,
}

impl Frame for TestFrame {
    fn width(&self) -> u32 {
        640
    }

    fn height(&self) -> u32 {
        480
    }
}

/// Yields `count` frames, optionally failing on one of them.
struct ScriptedSource {
    next: u32,
    count: u32,
    fail_at: Option<u32>,
    released: Arc<AtomicBool>,
}

impl ScriptedSource {
    fn new(count: u32, released: Arc<AtomicBool>) -> Self {
        Self {
            next: 0,
            count,
            fail_at: None,
            released,
        }
    }
}

impl FrameSource for ScriptedSource {
    type Frame = TestFrame;

    fn read_frame(&mut self) -> Result<Option<TestFrame>> {
        if self.fail_at == Some(self.next) {
            return Err(DetectorError::Device("camera unplugged".to_string()));
        }
        if self.next >= self.count {
            return Ok(None);
        }
        let frame = TestFrame { id: self.next };
        self.next += 1;
        Ok(Some(frame))
    }

    fn release(&mut self) {
        self.released.store(true, Ordering::SeqCst);
    }
}

/// Emits one person row per frame whose x center encodes the frame id.
/// Frames listed in `malformed` get a row with too few scores.
struct EchoDetector {
    malformed: Vec<u32>,
}

impl Detector<TestFrame> for EchoDetector {
    fn infer(&mut self, frame: &TestFrame) -> Result<Vec<RawOutput>> {
        let scores = if self.malformed.contains(&frame.id) {
            vec![0.9]
        } else {
            vec![0.9, 0.0, 0.0]
        };
        let center_x = (frame.id as f32 + 1.0) / 1000.0;
        Ok(vec![vec![RawDetectionRow::new(center_x, 0.5, 0.001, 0.1, scores)]])
    }
}

#[derive(Default)]
struct RecordingRenderer {
    rendered: Arc<Mutex<Vec<(u32, Vec<Detection>)>>>,
    stop_after: Option<usize>,
}

impl Renderer<TestFrame> for RecordingRenderer {
    fn render(&mut self, frame: &mut TestFrame, detections: &[Detection], _fps: f64) -> Result<Flow> {
        let mut rendered = self.rendered.lock().unwrap();
        rendered.push((frame.id, detections.to_vec()));
        match self.stop_after {
            Some(limit) if rendered.len() >= limit => Ok(Flow::Stop),
            _ => Ok(Flow::Continue),
        }
    }
}

fn post_processor() -> DetectionPostProcessor {
    DetectionPostProcessor::new(
        ClassTable::new(["person", "cat", "dog"]),
        PostProcessConfig::default(),
        LabelPolicy::from_preset(LabelPreset::English),
    )
    .unwrap()
}

fn frame_id_from(detection: &Detection) -> u32 {
    let center_x = (detection.bbox.left + detection.bbox.width / 2.0) / 640.0;
    (center_x * 1000.0).round() as u32 - 1
}

#[test]
fn runs_until_stream_ends_and_releases_source() {
    let released = Arc::new(AtomicBool::new(false));
    let renderer = RecordingRenderer::default();
    let rendered = renderer.rendered.clone();
    let mut pipeline = Pipeline::new(EchoDetector { malformed: vec![] }, post_processor(), renderer);

    let stats = pipeline
        .run(ScriptedSource::new(5, released.clone()))
        .unwrap();

    assert_eq!(stats.frames_rendered, 5);
    assert_eq!(stats.frames_skipped, 0);
    assert!(released.load(Ordering::SeqCst));
    let rendered = rendered.lock().unwrap();
    for (frame_id, detections) in rendered.iter() {
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].label, "Human");
        assert_eq!(frame_id_from(&detections[0]), *frame_id);
    }
}

#[test]
fn malformed_frames_are_skipped_not_fatal() {
    let released = Arc::new(AtomicBool::new(false));
    let renderer = RecordingRenderer::default();
    let rendered = renderer.rendered.clone();
    let mut pipeline = Pipeline::new(
        EchoDetector {
            malformed: vec![1, 3],
        },
        post_processor(),
        renderer,
    );

    let stats = pipeline
        .run(ScriptedSource::new(5, released.clone()))
        .unwrap();

    assert_eq!(stats.frames_rendered, 3);
    assert_eq!(stats.frames_skipped, 2);
    let ids: Vec<u32> = rendered.lock().unwrap().iter().map(|(id, _)| *id).collect();
    assert_eq!(ids, vec![0, 2, 4]);
}

#[test]
fn renderer_stop_ends_the_loop() {
    let released = Arc::new(AtomicBool::new(false));
    let renderer = RecordingRenderer {
        stop_after: Some(2),
        ..Default::default()
    };
    let mut pipeline = Pipeline::new(EchoDetector { malformed: vec![] }, post_processor(), renderer);

    let stats = pipeline
        .run(ScriptedSource::new(100, released.clone()))
        .unwrap();

    assert_eq!(stats.frames_rendered, 2);
    assert!(released.load(Ordering::SeqCst));
}

#[test]
fn device_error_propagates_and_still_releases() {
    let released = Arc::new(AtomicBool::new(false));
    let mut source = ScriptedSource::new(10, released.clone());
    source.fail_at = Some(3);
    let mut pipeline = Pipeline::new(
        EchoDetector { malformed: vec![] },
        post_processor(),
        RecordingRenderer::default(),
    );

    let err = pipeline.run(source).unwrap_err();

    assert!(matches!(err, DetectorError::Device(_)));
    assert!(released.load(Ordering::SeqCst));
}

#[test]
fn process_frame_reports_detections() {
    let mut pipeline = Pipeline::new(
        EchoDetector { malformed: vec![7] },
        post_processor(),
        RecordingRenderer::default(),
    );

    let outcome = pipeline.process_frame(&mut TestFrame { id: 0 }).unwrap();
    match outcome {
        FrameOutcome::Rendered { detections, flow } => {
            assert_eq!(flow, Flow::Continue);
            assert_eq!(detections.len(), 1);
            assert_eq!(detections[0].class_id, 0);
        }
        FrameOutcome::Skipped => panic!("frame should have been rendered"),
    }

    let outcome = pipeline.process_frame(&mut TestFrame { id: 7 }).unwrap();
    assert_eq!(outcome, FrameOutcome::Skipped);
}

#[test]
fn threaded_run_keeps_detections_with_their_frame() {
    let released = Arc::new(AtomicBool::new(false));
    let renderer = RecordingRenderer::default();
    let rendered = renderer.rendered.clone();
    let mut pipeline = Pipeline::new(EchoDetector { malformed: vec![] }, post_processor(), renderer);

    let stats = pipeline
        .run_threaded(ScriptedSource::new(50, released.clone()))
        .unwrap();

    assert!(released.load(Ordering::SeqCst));
    assert!(stats.frames_rendered >= 1);
    let rendered = rendered.lock().unwrap();
    assert_eq!(rendered.len() as u64, stats.frames_rendered);
    let mut previous = None;
    for (frame_id, detections) in rendered.iter() {
        assert_eq!(detections.len(), 1);
        assert_eq!(frame_id_from(&detections[0]), *frame_id);
        // stale frames may be dropped, but order is never reversed
        if let Some(previous) = previous {
            assert!(*frame_id > previous);
        }
        previous = Some(*frame_id);
    }
}

#[test]
fn threaded_run_surfaces_capture_errors() {
    let released = Arc::new(AtomicBool::new(false));
    let mut source = ScriptedSource::new(10, released.clone());
    source.fail_at = Some(0);
    let mut pipeline = Pipeline::new(
        EchoDetector { malformed: vec![] },
        post_processor(),
        RecordingRenderer::default(),
    );

    let err = pipeline.run_threaded(source).unwrap_err();

    assert!(matches!(err, DetectorError::Device(_)));
    assert!(released.load(Ordering::SeqCst));
}
