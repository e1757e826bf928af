use opencv::prelude::*;
use opencv::{core, imgproc, videoio};

use crate::config::CameraConfig;
use crate::error::{DetectorError, Result};
use crate::pipeline::{Frame, FrameSource};

impl Frame for Mat {
    fn width(&self) -> u32 {
        self.cols().max(0) as u32
    }

    fn height(&self) -> u32 {
        self.rows().max(0) as u32
    }
}

/// Webcam frames through `VideoCapture`. Released on drop.
pub struct CameraSource {
    capture: videoio::VideoCapture,
    size: core::Size,
    released: bool,
}

impl CameraSource {
    pub fn open(device: i32) -> Result<Self> {
        let capture = videoio::VideoCapture::new(device, videoio::CAP_ANY)?;
        if !videoio::VideoCapture::is_opened(&capture)? {
            return Err(DetectorError::Device(format!(
                "unable to open camera {}",
                device
            )));
        }
        log::info!("Opened camera {}", device);
        Ok(Self {
            capture,
            size: core::Size::default(),
            released: false,
        })
    }

    pub fn from_config(config: &CameraConfig) -> Result<Self> {
        let mut source = Self::open(config.device)?;
        source.set_resolution(config.width, config.height)?;
        Ok(source)
    }

    /// Ask the device for a resolution. Frames that still arrive at another
    /// size are resized to it.
    pub fn set_resolution(&mut self, width: u32, height: u32) -> Result<()> {
        self.capture
            .set(videoio::CAP_PROP_FRAME_WIDTH, width as f64)?;
        self.capture
            .set(videoio::CAP_PROP_FRAME_HEIGHT, height as f64)?;
        self.size = core::Size::new(width as i32, height as i32);
        Ok(())
    }

    fn fit_to_size(&self, frame: Mat) -> Result<Mat> {
        if self.size.width == 0 || frame.size()? == self.size {
            return Ok(frame);
        }
        let mut resized = Mat::default();
        imgproc::resize(
            &frame,
            &mut resized,
            self.size,
            0.0,
            0.0,
            imgproc::INTER_LINEAR,
        )?;
        Ok(resized)
    }
}

impl FrameSource for CameraSource {
    type Frame = Mat;

    fn read_frame(&mut self) -> Result<Option<Mat>> {
        if self.released {
            return Err(DetectorError::Device("camera already released".to_string()));
        }
        let mut frame = Mat::default();
        if !self.capture.read(&mut frame)? || frame.empty() {
            log::warn!("Camera stopped producing frames");
            return Ok(None);
        }
        self.fit_to_size(frame).map(Some)
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        match self.capture.release() {
            Ok(()) => log::info!("Camera released"),
            Err(err) => log::error!("Failed to release camera: {}", err),
        }
    }
}

impl Drop for CameraSource {
    fn drop(&mut self) {
        self.release();
    }
}
