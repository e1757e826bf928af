use thiserror::Error;

#[derive(Error, Debug)]
pub enum DetectorError {
    /// Missing or unreadable model/class files, empty class table, bad thresholds.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Frame source could not be opened or stopped producing frames.
    #[error("Device error: {0}")]
    Device(String),

    /// Raw detector output does not line up with the class table.
    #[error("Data shape error: expected {expected} values, got {actual}")]
    DataShape { expected: usize, actual: usize },

    #[cfg(feature = "vision")]
    #[error("OpenCV error {0:?}")]
    Vision(#[from] opencv::Error),

    #[cfg(feature = "remote")]
    #[error("Zenoh error {0:?}")]
    Zenoh(#[from] zenoh::Error),
}

impl DetectorError {
    /// Per-frame anomalies that should skip the frame instead of stopping the loop.
    pub fn is_frame_local(&self) -> bool {
        matches!(self, DetectorError::DataShape { .. })
    }
}

pub type Result<T, E = DetectorError> = std::result::Result<T, E>;
