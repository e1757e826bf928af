use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use object_detector::config::{AppConfig, ModelKind};
use object_detector::vision::{CameraSource, ModelDetector, WindowRenderer};
use object_detector::{DetectionPostProcessor, Pipeline};

#[derive(Parser, Debug)]
#[command(about = "Detect objects in a webcam stream")]
struct Args {
    /// TOML config file.
    #[clap(short, long, env = "OBJECT_DETECTOR_CONFIG")]
    config: Option<PathBuf>,

    /// Camera device index.
    #[clap(short, long)]
    device: Option<i32>,

    /// Use the Haar face cascade instead of the darknet model.
    #[clap(long)]
    faces: bool,

    /// Darknet network configuration (.cfg).
    #[clap(long, env = "OBJECT_DETECTOR_MODEL_CONFIG")]
    model_config: Option<PathBuf>,

    /// Darknet weights.
    #[clap(long, env = "OBJECT_DETECTOR_MODEL_WEIGHTS")]
    model_weights: Option<PathBuf>,

    /// Newline-delimited class names.
    #[clap(long, env = "OBJECT_DETECTOR_CLASSES")]
    classes: Option<PathBuf>,

    /// Minimum confidence, exclusive.
    #[clap(long)]
    confidence_threshold: Option<f32>,

    /// IoU at which overlapping boxes are suppressed.
    #[clap(long)]
    nms_threshold: Option<f32>,

    /// Capture on a separate thread.
    #[clap(long)]
    threaded: bool,
}

impl Args {
    fn apply(self, cfg: &mut AppConfig) {
        if let Some(device) = self.device {
            cfg.camera.device = device;
        }
        if self.faces {
            cfg.model.kind = ModelKind::HaarCascade;
        }
        if let Some(path) = self.model_config {
            cfg.model.config = path;
        }
        if let Some(path) = self.model_weights {
            cfg.model.weights = path;
        }
        if let Some(path) = self.classes {
            cfg.model.classes = path;
        }
        if let Some(threshold) = self.confidence_threshold {
            cfg.detection.confidence_threshold = threshold;
        }
        if let Some(threshold) = self.nms_threshold {
            cfg.detection.nms_iou_threshold = threshold;
        }
        cfg.pipeline.threaded |= self.threaded;
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args: Args = Args::parse();

    let mut cfg = AppConfig::load(args.config.as_deref()).context("failed to load config")?;
    args.apply(&mut cfg);
    cfg.validate()?;

    let (detector, classes) = ModelDetector::load(&cfg.model).context("failed to load model")?;
    let post_processor = DetectionPostProcessor::new(classes, cfg.detection, cfg.labels.policy())?;
    let renderer = WindowRenderer::new(cfg.render.clone())?;
    let camera = CameraSource::from_config(&cfg.camera).context("failed to open camera")?;

    let mut pipeline = Pipeline::new(detector, post_processor, renderer);
    let stats = if cfg.pipeline.threaded {
        pipeline.run_threaded(camera)?
    } else {
        pipeline.run(camera)?
    };
    log::info!(
        "Done after {} frames ({} skipped)",
        stats.frames_rendered,
        stats.frames_skipped
    );
    Ok(())
}
