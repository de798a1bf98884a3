use crate::memory::Arena;
use crate::op::Op;
use pagechain_types::InvalidProfileType;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("allocation of {requested} bytes from the {arena:?} arena failed ({client})")]
    AllocationFailure {
        arena: Arena,
        requested: usize,
        client: &'static str,
    },

    #[error("operation '{}' is not supported by this device", .0.name())]
    Unsupported(Op),

    #[error("range check: {0}")]
    Range(String),

    #[error("device chain is inconsistent: {0}")]
    Structural(String),

    #[error("undefined: {0}")]
    Undefined(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("PDF error: {0}")]
    Pdf(String),
}

impl From<InvalidProfileType> for DeviceError {
    fn from(err: InvalidProfileType) -> Self {
        DeviceError::Range(err.to_string())
    }
}

pub type DeviceResult<T> = Result<T, DeviceError>;
