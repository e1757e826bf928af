use opencv::prelude::*;
use opencv::{core, imgproc, objdetect};

use crate::classes::ClassTable;
use crate::error::{DetectorError, Result};
use crate::pipeline::{Detector, Frame};
use crate::postprocess::{RawDetectionRow, RawOutput};

pub const FACE_CLASS: &str = "face";

/// Haar cascade face classifier. Every hit becomes a row scoring 1.0 for
/// the single `face` class.
pub struct CascadeDetector {
    classifier: objdetect::CascadeClassifier,
}

impl CascadeDetector {
    pub fn new(cascade: &str) -> Result<Self> {
        let xml = core::find_file_def(cascade).map_err(|err| {
            DetectorError::Configuration(format!(
                "cascade {} not found: {}",
                cascade, err.message
            ))
        })?;
        let classifier = objdetect::CascadeClassifier::new(&xml)?;
        log::info!("Loaded cascade {}", xml);
        Ok(Self { classifier })
    }

    pub fn class_table() -> ClassTable {
        ClassTable::new([FACE_CLASS])
    }

    pub fn detect(&mut self, image: &Mat) -> Result<core::Vector<core::Rect>> {
        let mut faces = core::Vector::<core::Rect>::new();

        self.classifier.detect_multi_scale(
            image,
            &mut faces,
            1.1,
            2,
            objdetect::CASCADE_SCALE_IMAGE,
            core::Size {
                width: 30,
                height: 30,
            },
            core::Size {
                width: 0,
                height: 0,
            },
        )?;
        Ok(faces)
    }
}

impl Detector<Mat> for CascadeDetector {
    fn infer(&mut self, frame: &Mat) -> Result<Vec<RawOutput>> {
        let gray = convert_to_grayscale(frame)?;
        let faces = self.detect(&gray)?;
        let (width, height) = (frame.width() as f32, frame.height() as f32);
        let rows = faces
            .iter()
            .map(|face| {
                RawDetectionRow::new(
                    (face.x as f32 + face.width as f32 / 2.0) / width,
                    (face.y as f32 + face.height as f32 / 2.0) / height,
                    face.width as f32 / width,
                    face.height as f32 / height,
                    vec![1.0],
                )
            })
            .collect();
        Ok(vec![rows])
    }
}

pub fn convert_to_grayscale(image: &Mat) -> Result<Mat> {
    let mut gray: Mat = Mat::default();
    imgproc::cvt_color_def(&image, &mut gray, imgproc::COLOR_BGR2GRAY)?;
    Ok(gray)
}
