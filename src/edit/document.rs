use super::error::{EditError, EditResult};
use crate::store::{PagedStore, StoreConfig, StoreStats};

/// Multi-channel sample data: one paged store per channel, all the same
/// length, plus a clipboard store per channel
pub struct Document {
    pub(super) channels: Vec<PagedStore>,
    pub(super) clipboard: Vec<PagedStore>,
    config: StoreConfig,
}

impl Document {
    /// Create an empty document with `channels` channels
    pub fn new(channels: usize, config: StoreConfig) -> EditResult<Self> {
        if channels == 0 {
            return Err(EditError::NoChannels);
        }
        config.validate()?;

        let mut document = Self {
            channels: Vec::with_capacity(channels),
            clipboard: Vec::with_capacity(channels),
            config,
        };
        for _ in 0..channels {
            let channel = document.new_store()?;
            let clipboard = document.new_store()?;
            document.channels.push(channel);
            document.clipboard.push(clipboard);
        }
        Ok(document)
    }

    /// A fresh store configured like the document's channels
    pub fn new_store(&self) -> EditResult<PagedStore> {
        Ok(PagedStore::with_config(self.config.clone())?)
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Length of the first channel in bytes; every channel has this length
    /// unless single channels were resized directly
    pub fn len(&self) -> usize {
        self.channels.first().map_or(0, PagedStore::used_size)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Length of the clipboard in bytes
    pub fn clipboard_len(&self) -> usize {
        self.clipboard.first().map_or(0, PagedStore::used_size)
    }

    pub fn channel(&self, channel: usize) -> EditResult<&PagedStore> {
        self.channels
            .get(channel)
            .ok_or(EditError::NoSuchChannel(channel))
    }

    pub fn channel_mut(&mut self, channel: usize) -> EditResult<&mut PagedStore> {
        self.channels
            .get_mut(channel)
            .ok_or(EditError::NoSuchChannel(channel))
    }

    /// Read `amount` bytes of one channel
    pub fn read(&mut self, channel: usize, index: usize, amount: usize) -> EditResult<Vec<u8>> {
        Ok(self.channel_mut(channel)?.read(index, amount)?)
    }

    /// Overwrite bytes of one channel in place
    pub fn write(&mut self, channel: usize, index: usize, data: &[u8]) -> EditResult<()> {
        Ok(self.channel_mut(channel)?.write(index, data)?)
    }

    /// Stats of every channel
    pub fn stats(&self) -> Vec<StoreStats> {
        self.channels.iter().map(PagedStore::stats).collect()
    }

    /// Write all dirty frames of every channel back to disk
    pub fn flush(&mut self) -> EditResult<()> {
        for channel in &mut self.channels {
            channel.flush()?;
        }
        Ok(())
    }

    /// Empty every channel and the clipboard
    pub fn dispose(&mut self) -> EditResult<()> {
        for store in self.channels.iter_mut().chain(self.clipboard.iter_mut()) {
            store.dispose()?;
        }
        Ok(())
    }

    /// Length of each channel in bytes
    pub fn channel_lengths(&self) -> Vec<usize> {
        self.channels.iter().map(PagedStore::used_size).collect()
    }

    /// Check that every channel has the same length
    pub(super) fn check_aligned(&self) -> EditResult<()> {
        let size = self.len();
        if self.channels.iter().any(|channel| channel.used_size() != size) {
            return Err(EditError::ChannelMismatch {
                lengths: self.channel_lengths(),
            });
        }
        Ok(())
    }

    /// Check that `[at, at + len)` lies within the document
    pub(super) fn check_range(&self, at: usize, len: usize) -> EditResult<()> {
        self.check_aligned()?;
        let size = self.len();
        match at.checked_add(len) {
            Some(end) if len > 0 && end <= size => Ok(()),
            _ => Err(EditError::OutOfRange { at, len, size }),
        }
    }

    /// Check that `at` is a valid insertion point
    pub(super) fn check_position(&self, at: usize) -> EditResult<()> {
        self.check_aligned()?;
        let size = self.len();
        if at > size {
            return Err(EditError::OutOfRange { at, len: 0, size });
        }
        Ok(())
    }
}
