use thiserror::Error;

/// Failures reported by a block storage backend.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("block starting at sample {start} is not available yet")]
    Unavailable { start: u64 },
    #[error("range {start}+{len} exceeds sequence length {available}")]
    OutOfRange { start: u64, len: u64, available: u64 },
    #[error("storage rejected the request: {0}")]
    Rejected(String),
}

/// Errors raised by track and clip edits.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EditError {
    #[error("interval end {t1} precedes start {t0}")]
    Ordering { t0: f64, t1: f64 },
    #[error("not enough room available to {0}")]
    Capacity(&'static str),
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl EditError {
    pub fn is_capacity(&self) -> bool {
        matches!(self, EditError::Capacity(_))
    }
}

pub type Result<T> = std::result::Result<T, EditError>;

pub(crate) fn ensure_ordered(t0: f64, t1: f64) -> Result<()> {
    if t1 < t0 {
        return Err(EditError::Ordering { t0, t1 });
    }
    Ok(())
}
