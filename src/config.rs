use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{DetectorError, Result};
use crate::labels::{LabelFallback, LabelPolicy, LabelPreset, DEFAULT_UNKNOWN_LABEL};
use crate::postprocess::PostProcessConfig;

/// Environment variable pointing at a TOML config file.
pub const CONFIG_ENV: &str = "OBJECT_DETECTOR_CONFIG";

const DEFAULT_CASCADE: &str = "haarcascades/haarcascade_frontalface_alt.xml";

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub camera: CameraConfig,
    pub model: ModelConfig,
    pub detection: PostProcessConfig,
    pub labels: LabelConfig,
    pub render: RenderConfig,
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct CameraConfig {
    pub device: i32,
    pub width: u32,
    pub height: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device: 0,
            width: 640,
            height: 480,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModelKind {
    /// YOLO network in darknet cfg/weights format.
    #[default]
    Darknet,
    /// OpenCV Haar cascade face classifier.
    HaarCascade,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModelConfig {
    pub kind: ModelKind,
    pub config: PathBuf,
    pub weights: PathBuf,
    pub classes: PathBuf,
    /// Cascade file, looked up through OpenCV's data search path.
    pub cascade: String,
    pub input_width: u32,
    pub input_height: u32,
    pub scale: f64,
    pub swap_rb: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            kind: ModelKind::default(),
            config: PathBuf::from("yolov3.cfg"),
            weights: PathBuf::from("yolov3.weights"),
            classes: PathBuf::from("coco.names"),
            cascade: DEFAULT_CASCADE.to_string(),
            input_width: 416,
            input_height: 416,
            scale: 1.0 / 255.0,
            swap_rb: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct LabelConfig {
    pub preset: LabelPreset,
    pub fallback: LabelFallback,
    pub unknown_label: String,
    /// Class name to display label, applied over the preset.
    pub overrides: HashMap<String, String>,
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            preset: LabelPreset::default(),
            fallback: LabelFallback::default(),
            unknown_label: DEFAULT_UNKNOWN_LABEL.to_string(),
            overrides: HashMap::new(),
        }
    }
}

impl LabelConfig {
    pub fn policy(&self) -> LabelPolicy {
        self.overrides.iter().fold(
            LabelPolicy::from_preset(self.preset)
                .with_fallback(self.fallback)
                .with_unknown_label(self.unknown_label.clone()),
            |policy, (name, label)| policy.with_override(name.clone(), label.clone()),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct RenderConfig {
    pub window_title: String,
    /// BGR, as OpenCV draws it.
    pub color: [u8; 3],
    pub box_thickness: i32,
    pub label_thickness: i32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            window_title: "Object Detection".to_string(),
            color: [0, 255, 0],
            box_thickness: 2,
            label_thickness: 1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Capture on a separate thread, always processing the newest frame.
    pub threaded: bool,
}

impl AppConfig {
    /// Load from `path`, or from `$OBJECT_DETECTOR_CONFIG`, or fall back to defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let env_path = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
        let cfg = match path.or(env_path.as_deref()) {
            Some(path) => Self::read_file(path)?,
            None => {
                log::info!("No config file given, using defaults");
                Self::default()
            }
        };
        cfg.validate()?;
        Ok(cfg)
    }

    fn read_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|err| {
            DetectorError::Configuration(format!(
                "failed to read config {}: {}",
                path.display(),
                err
            ))
        })?;
        log::info!("Loaded config from {}", path.display());
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents)
            .map_err(|err| DetectorError::Configuration(format!("invalid config: {}", err)))
    }

    pub fn validate(&self) -> Result<()> {
        self.detection.validate()?;
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(DetectorError::Configuration(
                "camera resolution must be non-zero".to_string(),
            ));
        }
        if self.model.input_width == 0 || self.model.input_height == 0 {
            return Err(DetectorError::Configuration(
                "model input size must be non-zero".to_string(),
            ));
        }
        if !(self.model.scale.is_finite() && self.model.scale > 0.0) {
            return Err(DetectorError::Configuration(format!(
                "model scale must be positive, got {}",
                self.model.scale
            )));
        }
        if self.render.box_thickness < 1 || self.render.label_thickness < 1 {
            return Err(DetectorError::Configuration(
                "line thickness must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let cfg = AppConfig::from_toml_str("").unwrap();
        assert_eq!(cfg, AppConfig::default());
        assert_eq!(cfg.detection.confidence_threshold, 0.5);
        assert_eq!(cfg.detection.nms_iou_threshold, 0.4);
        assert_eq!(cfg.model.input_width, 416);
        assert_eq!(cfg.render.color, [0, 255, 0]);
        cfg.validate().unwrap();
    }

    #[test]
    fn parses_partial_sections() {
        let cfg = AppConfig::from_toml_str(
            r#"
            [model]
            kind = "haar-cascade"
            input_width = 320
            input_height = 320

            [detection]
            confidence_threshold = 0.95

            [labels]
            preset = "portuguese"
            fallback = "unknown"
            unknown_label = "Desconhecido"

            [labels.overrides]
            "traffic light" = "Semaforo"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.model.kind, ModelKind::HaarCascade);
        assert_eq!(cfg.model.input_width, 320);
        assert_eq!(cfg.model.weights, PathBuf::from("yolov3.weights"));
        assert_eq!(cfg.detection.confidence_threshold, 0.95);
        assert_eq!(cfg.detection.nms_iou_threshold, 0.4);

        let policy = cfg.labels.policy();
        assert_eq!(policy.resolve(Some("person")), "Humano");
        assert_eq!(policy.resolve(Some("traffic light")), "Semaforo");
        assert_eq!(policy.resolve(Some("car")), "Desconhecido");
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = AppConfig::from_toml_str("[detection]\nconfidence = 0.3\n").unwrap_err();
        assert!(matches!(err, DetectorError::Configuration(_)));
    }

    #[test]
    fn validation_rejects_bad_values() {
        let mut cfg = AppConfig::default();
        cfg.model.scale = 0.0;
        assert!(cfg.validate().is_err());

        let mut cfg = AppConfig::default();
        cfg.camera.width = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = AppConfig::default();
        cfg.detection.nms_iou_threshold = -0.1;
        assert!(cfg.validate().is_err());
    }
}
