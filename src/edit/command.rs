use std::fmt;

use super::document::Document;
use super::error::{EditError, EditResult};
use crate::store::PagedStore;

/// The edits a document supports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditKind {
    /// Insert `len` uninitialized bytes at `at`
    Insert { at: usize, len: usize },
    /// Remove `len` bytes at `at`
    Delete { at: usize, len: usize },
    /// Remove `len` bytes at `at` into the clipboard
    Cut { at: usize, len: usize },
    /// Copy `len` bytes at `at` into the clipboard
    Copy { at: usize, len: usize },
    /// Insert the clipboard at `at`
    Paste { at: usize },
}

impl EditKind {
    /// Whether the edit changes the document and so belongs in the history
    pub fn is_undoable(&self) -> bool {
        !matches!(self, EditKind::Copy { .. })
    }

    /// Offset the edit starts at
    pub fn at(&self) -> usize {
        match *self {
            EditKind::Insert { at, .. }
            | EditKind::Delete { at, .. }
            | EditKind::Cut { at, .. }
            | EditKind::Copy { at, .. }
            | EditKind::Paste { at } => at,
        }
    }
}

impl fmt::Display for EditKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EditKind::Insert { at, len } => write!(f, "insert {} bytes at {}", len, at),
            EditKind::Delete { at, len } => write!(f, "delete {} bytes at {}", len, at),
            EditKind::Cut { at, len } => write!(f, "cut {} bytes at {}", len, at),
            EditKind::Copy { at, len } => write!(f, "copy {} bytes at {}", len, at),
            EditKind::Paste { at } => write!(f, "paste at {}", at),
        }
    }
}

/// An applied edit together with the bytes it needs to be undone or redone.
///
/// Removed or pasted bytes live in `saved`, one private store per channel;
/// they only ever move through `PagedStore::transfer`.
pub struct EditCommand {
    kind: EditKind,
    saved: Vec<PagedStore>,
    /// Number of bytes the edit covers in each channel
    len: usize,
}

impl EditCommand {
    pub fn new(kind: EditKind, document: &Document) -> EditResult<Self> {
        let mut saved = Vec::with_capacity(document.channel_count());
        for _ in 0..document.channel_count() {
            saved.push(document.new_store()?);
        }
        let len = match kind {
            EditKind::Insert { len, .. }
            | EditKind::Delete { len, .. }
            | EditKind::Cut { len, .. }
            | EditKind::Copy { len, .. } => len,
            EditKind::Paste { .. } => document.clipboard_len(),
        };
        Ok(Self { kind, saved, len })
    }

    pub fn kind(&self) -> EditKind {
        self.kind
    }

    /// Apply (or re-apply) the edit to `document`.
    ///
    /// A failure after some channels have changed puts those channels back
    /// before the error is returned.
    pub fn apply(&mut self, document: &mut Document) -> EditResult<()> {
        self.check_apply(document)?;

        let size = document.len();
        if let Err(e) = self.apply_channels(document) {
            log::warn!("{} failed, restoring channels: {}", self.kind, e);
            self.restore(document, size);
            return Err(e);
        }

        log::info!("applied {}", self.kind);
        Ok(())
    }

    /// Revert the edit on `document`, putting channels back on failure
    pub fn undo(&mut self, document: &mut Document) -> EditResult<()> {
        self.check_undo(document)?;

        let size = document.len();
        if let Err(e) = self.undo_channels(document) {
            log::warn!("undo of {} failed, restoring channels: {}", self.kind, e);
            self.restore(document, size);
            return Err(e);
        }

        log::info!("undid {}", self.kind);
        Ok(())
    }

    fn check_apply(&self, document: &Document) -> EditResult<()> {
        match self.kind {
            EditKind::Insert { at, len } => {
                document.check_position(at)?;
                if len == 0 {
                    return Err(EditError::OutOfRange {
                        at,
                        len,
                        size: document.len(),
                    });
                }
                Ok(())
            }
            EditKind::Delete { at, len } | EditKind::Cut { at, len } | EditKind::Copy { at, len } => {
                document.check_range(at, len)
            }
            EditKind::Paste { at } => {
                document.check_position(at)?;
                if self.len == 0 {
                    return Err(EditError::EmptyClipboard);
                }
                Ok(())
            }
        }
    }

    fn check_undo(&self, document: &Document) -> EditResult<()> {
        match self.kind {
            EditKind::Insert { at, len } => document.check_range(at, len),
            EditKind::Delete { at, .. } | EditKind::Cut { at, .. } => document.check_position(at),
            EditKind::Copy { .. } => Ok(()),
            EditKind::Paste { at } => document.check_range(at, self.len),
        }
    }

    fn apply_channels(&mut self, document: &mut Document) -> EditResult<()> {
        match self.kind {
            EditKind::Insert { at, len } => {
                for channel in &mut document.channels {
                    channel.malloc(at, len)?;
                }
            }
            EditKind::Delete { at, len } => {
                self.remove(document, at, len)?;
            }
            EditKind::Cut { at, len } => {
                self.remove(document, at, len)?;
                let saved = self.saved.iter_mut();
                fill_clipboard(&mut document.clipboard, saved, 0, len)?;
            }
            EditKind::Copy { at, len } => {
                let channels = document.channels.iter_mut();
                fill_clipboard(&mut document.clipboard, channels, at, len)?;
            }
            EditKind::Paste { at } => {
                let len = self.len;
                // The first apply snapshots the clipboard so a redo pastes the
                // same bytes even if the clipboard has changed since
                if self.saved.iter().all(PagedStore::is_empty) {
                    self.snapshot_clipboard(document)?;
                }
                for (channel, saved) in document.channels.iter_mut().zip(&mut self.saved) {
                    channel.transfer(saved, 0, len - 1, at)?;
                }
            }
        }
        Ok(())
    }

    fn undo_channels(&mut self, document: &mut Document) -> EditResult<()> {
        match self.kind {
            EditKind::Insert { at, len } => {
                for channel in &mut document.channels {
                    channel.free(at, len)?;
                }
            }
            EditKind::Delete { at, len } | EditKind::Cut { at, len } => {
                for (channel, saved) in document.channels.iter_mut().zip(&mut self.saved) {
                    channel.transfer(saved, 0, len - 1, at)?;
                }
            }
            EditKind::Copy { .. } => {}
            EditKind::Paste { at } => {
                for channel in &mut document.channels {
                    channel.free(at, self.len)?;
                }
            }
        }
        Ok(())
    }

    fn snapshot_clipboard(&mut self, document: &mut Document) -> EditResult<()> {
        let len = self.len;
        let mut result = Ok(());
        for (saved, clipboard) in self.saved.iter_mut().zip(&mut document.clipboard) {
            result = saved.transfer(clipboard, 0, len - 1, 0);
            if result.is_err() {
                break;
            }
        }

        if let Err(e) = result {
            for saved in &mut self.saved {
                if let Err(e) = saved.dispose() {
                    log::warn!("failed to drop partial clipboard snapshot: {}", e);
                }
            }
            return Err(e.into());
        }
        Ok(())
    }

    /// Move `[at, at + len)` of every channel into `saved`
    fn remove(&mut self, document: &mut Document, at: usize, len: usize) -> EditResult<()> {
        for (saved, channel) in self.saved.iter_mut().zip(&mut document.channels) {
            saved.dispose()?;
            saved.transfer(channel, at, at + len - 1, 0)?;
            channel.free(at, len)?;
        }
        Ok(())
    }

    /// Bring every channel changed by a failed edit back to `size` bytes.
    /// A channel that grew by the edit length loses the inserted bytes; one
    /// that shrank gets its saved bytes back.
    fn restore(&mut self, document: &mut Document, size: usize) {
        let len = self.len;
        let at = self.kind.at();
        if len == 0 {
            return;
        }

        for (index, (channel, saved)) in document
            .channels
            .iter_mut()
            .zip(&mut self.saved)
            .enumerate()
        {
            let used = channel.used_size();
            let result = if used == size + len {
                channel.free(at, len)
            } else if used + len == size && saved.used_size() == len {
                channel.transfer(saved, 0, len - 1, at)
            } else if used + len == size {
                channel.malloc(at, len)
            } else {
                Ok(())
            };
            if let Err(e) = result {
                log::warn!("could not restore channel {}: {}", index, e);
            }
        }
    }
}

/// Replace each clipboard store with `[at, at + len)` of the matching source.
/// On failure every clipboard is left empty.
fn fill_clipboard<'a>(
    clipboard: &mut [PagedStore],
    sources: impl Iterator<Item = &'a mut PagedStore>,
    at: usize,
    len: usize,
) -> EditResult<()> {
    let mut result = Ok(());
    for (target, source) in clipboard.iter_mut().zip(sources) {
        result = target
            .dispose()
            .and_then(|_| target.transfer(source, at, at + len - 1, 0));
        if result.is_err() {
            break;
        }
    }

    if let Err(e) = result {
        for target in clipboard.iter_mut() {
            if let Err(e) = target.dispose() {
                log::warn!("failed to empty clipboard: {}", e);
            }
        }
        return Err(e.into());
    }
    Ok(())
}
