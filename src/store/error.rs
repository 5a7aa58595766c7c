use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Empty range: {op} needs at least one byte")]
    EmptyRange { op: &'static str },

    #[error("Out of bounds: {op} at {index} for {len} bytes, store holds {size}")]
    OutOfBounds {
        op: &'static str,
        index: usize,
        len: usize,
        size: usize,
    },

    #[error("Invalid transfer range: [{start}, {stop}] of a {size} byte source")]
    InvalidTransferRange {
        start: usize,
        stop: usize,
        size: usize,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Page not found: no page covers offset {0}")]
    PageNotFound(usize),

    #[error("Invalid page size: expected {expected}, got {actual}")]
    InvalidPageSize { expected: usize, actual: usize },

    #[error("Invariant violated: {0}")]
    InvariantViolation(String),
}

impl StoreError {
    /// Invalid offsets, lengths or settings. The store was left untouched.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            StoreError::EmptyRange { .. }
                | StoreError::OutOfBounds { .. }
                | StoreError::InvalidTransferRange { .. }
                | StoreError::InvalidConfig(_)
        )
    }

    /// Disk failures and broken page lookups. The call that raised it is aborted.
    pub fn is_storage_fault(&self) -> bool {
        matches!(
            self,
            StoreError::Io(_)
                | StoreError::PageNotFound(_)
                | StoreError::InvalidPageSize { .. }
                | StoreError::InvariantViolation(_)
        )
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
