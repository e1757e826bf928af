use std::path::PathBuf;

use clap::Parser;
use object_detector::config::AppConfig;
use object_detector::vision::{mat_to_jpeg, CameraSource};
use object_detector::{DetectorError, FrameSource};
use opencv::highgui;
use zenoh::prelude::r#async::*;

const IMAGE_TOPIC: &str = "object-detector/image";

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

    /// Camera device index.
    #[clap(short, long)]
    device: Option<i32>,

    /// Also show the captured frames locally.
    #[clap(long)]
    show: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args: Args = Args::parse();

    let mut cfg = AppConfig::load(args.config.as_deref())?;
    if let Some(device) = args.device {
        cfg.camera.device = device;
    }

    let window = cfg.render.window_title.clone();
    if args.show {
        highgui::named_window_def(&window)?;
    }

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

    let publisher = zenoh_session
        .declare_publisher(IMAGE_TOPIC)
        .congestion_control(CongestionControl::Drop)
        .priority(Priority::InteractiveHigh)
        .res()
        .await
        .map_err(DetectorError::Zenoh)?;

    let mut camera = CameraSource::from_config(&cfg.camera)?;

    while let Some(frame) = camera.read_frame()? {
        let data = mat_to_jpeg(&frame)?;

        publisher
            .put(data)
            .res()
            .await
            .map_err(DetectorError::Zenoh)?;

        if args.show {
            highgui::imshow(&window, &frame)?;
            _ = highgui::poll_key()?;
        }
    }
    log::info!("Camera stream ended");
    Ok(())
}
