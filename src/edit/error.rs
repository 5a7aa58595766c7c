use thiserror::Error;

use crate::store::StoreError;

/// Result type for document edits
pub type EditResult<T> = Result<T, EditError>;

/// Errors that can occur while editing a document
#[derive(Debug, Error)]
pub enum EditError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Channel {0} not found")]
    NoSuchChannel(usize),

    #[error("A document needs at least one channel")]
    NoChannels,

    #[error("Channels have different lengths: {lengths:?}")]
    ChannelMismatch { lengths: Vec<usize> },

    #[error("Range [{at}, {at}+{len}) is outside a document of {size} bytes")]
    OutOfRange { at: usize, len: usize, size: usize },

    #[error("Nothing to undo")]
    NothingToUndo,

    #[error("Nothing to redo")]
    NothingToRedo,

    #[error("Clipboard is empty")]
    EmptyClipboard,
}
