use std::collections::HashMap;

use serde::{Deserialize, Serialize};

pub const DEFAULT_UNKNOWN_LABEL: &str = "Unknown";

/// Built-in override tables.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LabelPreset {
    #[default]
    English,
    Portuguese,
    None,
}

impl LabelPreset {
    fn overrides(self) -> &'static [(&'static str, &'static str)] {
        match self {
            LabelPreset::English => &[
                ("person", "Human"),
                ("cat", "Cat"),
                ("dog", "Dog"),
                ("cell phone", "Cell Phone"),
            ],
            LabelPreset::Portuguese => &[
                ("person", "Humano"),
                ("cat", "Gato"),
                ("dog", "Cachorro"),
                ("cell phone", "Celular"),
            ],
            LabelPreset::None => &[],
        }
    }
}

/// What to show for a class that has no override.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LabelFallback {
    /// Show the raw class name.
    #[default]
    PassThrough,
    /// Show the configured unknown label.
    Unknown,
}

/// Maps raw class names to display labels.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LabelPolicy {
    overrides: HashMap<String, String>,
    fallback: LabelFallback,
    unknown_label: String,
}

impl LabelPolicy {
    pub fn from_preset(preset: LabelPreset) -> Self {
        Self {
            overrides: preset
                .overrides()
                .iter()
                .map(|(name, label)| (name.to_string(), label.to_string()))
                .collect(),
            fallback: LabelFallback::default(),
            unknown_label: DEFAULT_UNKNOWN_LABEL.to_string(),
        }
    }

    pub fn with_override(mut self, class_name: impl Into<String>, label: impl Into<String>) -> Self {
        self.overrides.insert(class_name.into(), label.into());
        self
    }

    pub fn with_fallback(mut self, fallback: LabelFallback) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn with_unknown_label(mut self, label: impl Into<String>) -> Self {
        self.unknown_label = label.into();
        self
    }

    pub fn fallback(&self) -> LabelFallback {
        self.fallback
    }

    /// Display label for a class name, `None` when the class id had no name.
    pub fn resolve(&self, class_name: Option<&str>) -> String {
        if let Some(label) = class_name.and_then(|name| self.overrides.get(name)) {
            return label.clone();
        }
        match (self.fallback, class_name) {
            (LabelFallback::PassThrough, Some(name)) => name.to_string(),
            _ => self.unknown_label.clone(),
        }
    }
}

impl Default for LabelPolicy {
    fn default() -> Self {
        Self::from_preset(LabelPreset::default())
    }
}
