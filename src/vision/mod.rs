//! OpenCV collaborators: webcam capture, darknet and cascade detectors,
//! highgui rendering and JPEG transport helpers.

mod camera;
mod cascade;
mod darknet;
mod display;

use opencv::prelude::*;
use opencv::{core, imgcodecs};

pub use camera::CameraSource;
pub use cascade::{convert_to_grayscale, CascadeDetector, FACE_CLASS};
pub use darknet::DarknetDetector;
pub use display::{draw_detections, WindowRenderer};

use crate::classes::ClassTable;
use crate::config::{ModelConfig, ModelKind};
use crate::error::{DetectorError, Result};
use crate::pipeline::Detector;
use crate::postprocess::RawOutput;

/// Detector chosen by [`ModelKind`].
pub enum ModelDetector {
    Darknet(DarknetDetector),
    HaarCascade(CascadeDetector),
}

impl ModelDetector {
    /// Load the configured model together with the class table it scores against.
    pub fn load(config: &ModelConfig) -> Result<(Self, ClassTable)> {
        match config.kind {
            ModelKind::Darknet => {
                let classes = ClassTable::load(&config.classes)?;
                let detector = DarknetDetector::load(config)?;
                Ok((ModelDetector::Darknet(detector), classes))
            }
            ModelKind::HaarCascade => {
                let detector = CascadeDetector::new(&config.cascade)?;
                Ok((
                    ModelDetector::HaarCascade(detector),
                    CascadeDetector::class_table(),
                ))
            }
        }
    }
}

impl Detector<Mat> for ModelDetector {
    fn infer(&mut self, frame: &Mat) -> Result<Vec<RawOutput>> {
        match self {
            ModelDetector::Darknet(detector) => detector.infer(frame),
            ModelDetector::HaarCascade(detector) => detector.infer(frame),
        }
    }
}

pub fn jpeg_to_mat(data: &[u8]) -> Result<Mat> {
    let buffer = core::Vector::<u8>::from_slice(data);
    let frame = imgcodecs::imdecode(&buffer, imgcodecs::IMREAD_COLOR)?;
    if frame.empty() {
        return Err(DetectorError::Device("failed to decode JPEG frame".to_string()));
    }
    Ok(frame)
}

pub fn mat_to_jpeg(frame: &Mat) -> Result<Vec<u8>> {
    let mut buffer: core::Vector<u8> = Default::default();
    imgcodecs::imencode_def(".jpg", frame, &mut buffer)?;
    Ok(buffer.to_vec())
}
