// src/error.rs
use pagechain_device::DeviceError;
use thiserror::Error;

/// Errors from building a chain or replaying drawing through it.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Device error: {0}")]
    Device(#[from] DeviceError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Display list error at operation {index}: {message}")]
    DisplayList { index: usize, message: String },
}
