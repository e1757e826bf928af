use std::path::Path;

use opencv::prelude::*;
use opencv::{core, dnn};

use crate::config::ModelConfig;
use crate::error::{DetectorError, Result};
use crate::pipeline::Detector;
use crate::postprocess::{RawDetectionRow, RawOutput};

/// YOLO network loaded from darknet cfg/weights through OpenCV dnn.
pub struct DarknetDetector {
    net: dnn::Net,
    output_names: core::Vector<String>,
    input_size: core::Size,
    scale: f64,
    swap_rb: bool,
}

impl DarknetDetector {
    pub fn load(config: &ModelConfig) -> Result<Self> {
        let cfg = path_str(&config.config)?;
        let weights = path_str(&config.weights)?;
        let net = dnn::read_net_from_darknet(cfg, weights).map_err(|err| {
            DetectorError::Configuration(format!(
                "failed to load darknet model {} / {}: {}",
                cfg, weights, err.message
            ))
        })?;
        let output_names = net.get_unconnected_out_layers_names()?;
        log::info!(
            "Loaded darknet model {} with outputs {:?}",
            cfg,
            output_names.to_vec()
        );
        Ok(Self {
            net,
            output_names,
            input_size: core::Size::new(config.input_width as i32, config.input_height as i32),
            scale: config.scale,
            swap_rb: config.swap_rb,
        })
    }
}

impl Detector<Mat> for DarknetDetector {
    fn infer(&mut self, frame: &Mat) -> Result<Vec<RawOutput>> {
        let blob = dnn::blob_from_image(
            frame,
            self.scale,
            self.input_size,
            core::Scalar::default(),
            self.swap_rb,
            false,
            core::CV_32F,
        )?;
        self.net.set_input(&blob, "", 1.0, core::Scalar::default())?;

        let mut layers: core::Vector<Mat> = Default::default();
        self.net.forward(&mut layers, &self.output_names)?;

        let mut outputs = Vec::with_capacity(layers.len());
        for layer in &layers {
            let mut rows = RawOutput::with_capacity(layer.rows().max(0) as usize);
            for i in 0..layer.rows() {
                rows.push(RawDetectionRow::from_darknet(layer.at_row::<f32>(i)?)?);
            }
            outputs.push(rows);
        }
        Ok(outputs)
    }
}

fn path_str(path: &Path) -> Result<&str> {
    if !path.exists() {
        return Err(DetectorError::Configuration(format!(
            "model file {} does not exist",
            path.display()
        )));
    }
    path.to_str().ok_or_else(|| {
        DetectorError::Configuration(format!("model path {} is not UTF-8", path.display()))
    })
}
