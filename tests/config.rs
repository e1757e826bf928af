use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use tempfile::NamedTempFile;

use object_detector::config::{AppConfig, ModelKind, CONFIG_ENV};
use object_detector::{DetectorError, LabelFallback};

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp config");
    file.write_all(contents.as_bytes()).expect("write config");
    file
}

#[test]
fn loads_defaults_without_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    std::env::remove_var(CONFIG_ENV);

    let cfg = AppConfig::load(None).expect("load defaults");
    assert_eq!(cfg, AppConfig::default());
}

#[test]
fn loads_file_from_env() {
    let _guard = ENV_LOCK.lock().unwrap();
    let file = write_config(
        r#"
        [camera]
        device = 2

        [model]
        config = "models/yolov3-tiny.cfg"
        weights = "models/yolov3-tiny.weights"
        classes = "models/coco.names"
        input_width = 320
        input_height = 320

        [labels]
        fallback = "unknown"

        [pipeline]
        threaded = true
        "#,
    );
    std::env::set_var(CONFIG_ENV, file.path());

    let cfg = AppConfig::load(None).expect("load config");
    std::env::remove_var(CONFIG_ENV);

    assert_eq!(cfg.camera.device, 2);
    assert_eq!(cfg.camera.width, 640);
    assert_eq!(cfg.model.kind, ModelKind::Darknet);
    assert_eq!(cfg.model.config, PathBuf::from("models/yolov3-tiny.cfg"));
    assert_eq!(cfg.model.input_height, 320);
    assert_eq!(cfg.labels.fallback, LabelFallback::Unknown);
    assert!(cfg.pipeline.threaded);
}

#[test]
fn explicit_path_wins_over_env() {
    let _guard = ENV_LOCK.lock().unwrap();
    let from_env = write_config("[camera]\ndevice = 1\n");
    let explicit = write_config("[camera]\ndevice = 3\n");
    std::env::set_var(CONFIG_ENV, from_env.path());

    let cfg = AppConfig::load(Some(explicit.path())).expect("load config");
    std::env::remove_var(CONFIG_ENV);

    assert_eq!(cfg.camera.device, 3);
}

#[test]
fn invalid_thresholds_fail_at_load() {
    let _guard = ENV_LOCK.lock().unwrap();
    std::env::remove_var(CONFIG_ENV);
    let file = write_config("[detection]\nconfidence_threshold = 2.0\n");

    let err = AppConfig::load(Some(file.path())).unwrap_err();
    assert!(matches!(err, DetectorError::Configuration(_)));
}

#[test]
fn missing_file_is_configuration_error() {
    let _guard = ENV_LOCK.lock().unwrap();
    let dir = tempfile::tempdir().expect("temp dir");

    let err = AppConfig::load(Some(&dir.path().join("missing.toml"))).unwrap_err();
    assert!(matches!(err, DetectorError::Configuration(_)));
}
