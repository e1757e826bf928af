use std::path::PathBuf;

use clap::Parser;
use object_detector::config::AppConfig;
use object_detector::vision::{jpeg_to_mat, ModelDetector, WindowRenderer};
use object_detector::{DetectionPostProcessor, DetectorError, Flow, FrameOutcome, Pipeline};
use zenoh::prelude::r#async::*;

const IMAGE_TOPIC: &str = "object-detector/image";
const DETECTIONS_TOPIC: &str = "object-detector/detections";

#[derive(Parser, Debug)]
#[command()]
struct Args {
    /// Endpoints to connect to.
    #[clap(short = 'e', long)]
    connect: Vec<zenoh_config::EndPoint>,

    /// Endpoints to listen on.
    #[clap(long)]
    listen: Vec<zenoh_config::EndPoint>,

    /// TOML config file.
    #[clap(short, long, env = "OBJECT_DETECTOR_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args: Args = Args::parse();

    let cfg = AppConfig::load(args.config.as_deref())?;
    let (detector, classes) = ModelDetector::load(&cfg.model)?;
    let post_processor = DetectionPostProcessor::new(classes, cfg.detection, cfg.labels.policy())?;
    let renderer = WindowRenderer::new(cfg.render.clone())?;
    let mut pipeline = Pipeline::new(detector, post_processor, renderer);

    // configure zenoh
    let mut zenoh_config = Config::default();
    if !args.listen.is_empty() {
        zenoh_config.listen.endpoints = args.listen.clone();
        log::info!(
            "Configured listening endpoints {:?}",
            zenoh_config.listen.endpoints
        );
    }
    if !args.connect.is_empty() {
        zenoh_config.connect.endpoints = args.connect.clone();
        log::info!(
            "Configured connect endpoints {:?}",
            zenoh_config.connect.endpoints
        );
    }

    let zenoh_session = zenoh::open(zenoh_config)
        .res()
        .await
        .map_err(DetectorError::Zenoh)?;
    let zenoh_session = zenoh_session.into_arc();

    let subscriber = zenoh_session
        .declare_subscriber(IMAGE_TOPIC)
        .best_effort()
        .res()
        .await
        .map_err(DetectorError::Zenoh)?;

    let publisher = zenoh_session
        .declare_publisher(DETECTIONS_TOPIC)
        .congestion_control(CongestionControl::Drop)
        .res()
        .await
        .map_err(DetectorError::Zenoh)?;

    loop {
        let msg = subscriber.recv_async().await?;
        let payload: Vec<u8> = msg.value.try_into()?;

        let mut frame = match jpeg_to_mat(&payload) {
            Ok(frame) => frame,
            Err(err) => {
                log::warn!("Dropping undecodable frame: {}", err);
                continue;
            }
        };

        match pipeline.process_frame(&mut frame)? {
            FrameOutcome::Rendered { detections, flow } => {
                let json = serde_json::to_string(&detections)?;
                publisher
                    .put(json)
                    .res()
                    .await
                    .map_err(DetectorError::Zenoh)?;
                if flow == Flow::Stop {
                    log::info!("Window closed");
                    return Ok(());
                }
            }
            FrameOutcome::Skipped => {}
        }
    }
}
