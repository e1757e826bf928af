use std::path::Path;

use crate::error::{DetectorError, Result};

/// Ordered class names, index = class id.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClassTable {
    names: Vec<String>,
}

impl ClassTable {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Load a newline-delimited class list (darknet `.names` format).
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|err| {
            DetectorError::Configuration(format!(
                "failed to read class names from {}: {}",
                path.display(),
                err
            ))
        })?;
        let table = Self::parse(&contents);
        log::info!("Loaded {} class names from {}", table.len(), path.display());
        Ok(table)
    }

    /// Parse class names, one per line. Interior blank lines keep their index,
    /// trailing blank lines are dropped.
    pub fn parse(contents: &str) -> Self {
        let mut names: Vec<String> = contents
            .lines()
            .map(|line| line.trim_end_matches('\r').to_string())
            .collect();
        while names.last().is_some_and(|name| name.trim().is_empty()) {
            names.pop();
        }
        Self { names }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn name(&self, class_id: usize) -> Option<&str> {
        self.names.get(class_id).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}
