//! Webcam object detection.
//!
//! A detector (YOLO darknet network or Haar face cascade, run through OpenCV)
//! produces raw rows per frame. [`DetectionPostProcessor`] filters them by
//! confidence, converts them to pixel boxes, removes overlaps with
//! class-agnostic non-maximum suppression and attaches display labels.
//! [`Pipeline`] drives capture, detection, post-processing and rendering.
//!
//! OpenCV collaborators live in [`vision`] behind the `vision` feature.

pub mod classes;
pub mod config;
mod error;
pub mod fps;
pub mod geometry;
pub mod labels;
pub mod pipeline;
pub mod postprocess;
#[cfg(feature = "vision")]
pub mod vision;

pub use classes::ClassTable;
pub use config::AppConfig;
pub use error::{DetectorError, Result};
pub use fps::FpsCounter;
pub use geometry::BoundingBox;
pub use labels::{LabelFallback, LabelPolicy, LabelPreset};
pub use pipeline::{Detector, Flow, Frame, FrameOutcome, FrameSource, Pipeline, Renderer, RunStats};
pub use postprocess::{
    Detection, DetectionPostProcessor, PostProcessConfig, RawDetectionRow, RawOutput, ScoredBox,
};
