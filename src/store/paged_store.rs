use super::config::StoreConfig;
use super::error::{StoreError, StoreResult};
use super::frame_cache::FrameCache;
use super::page::{Extent, Page, PageTable};
use super::PageId;

/// Snapshot of a store's size and cache counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StoreStats {
    pub used_size: usize,
    pub page_count: usize,
    pub frame_capacity: usize,
    pub cached_frames: usize,
    pub dirty_frames: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub write_backs: u64,
}

/// One piece of a region being repacked into pages
enum Segment<'a> {
    /// Bytes that survive from an existing page
    Data(&'a [u8]),
    /// Newly allocated bytes with unspecified content
    Gap(usize),
}

impl Segment<'_> {
    fn len(&self) -> usize {
        match self {
            Segment::Data(data) => data.len(),
            Segment::Gap(len) => *len,
        }
    }
}

/// A contiguous, randomly addressable byte buffer that keeps at most
/// `frame_count` pages in memory and spills the rest to temp files.
///
/// Offsets are byte offsets into `[0, used_size)`. Every operation either
/// leaves the pages partitioning that range or fails; precondition failures
/// never change the store.
pub struct PagedStore {
    /// Ordered pages
    table: PageTable,
    /// In-memory frames
    frames: FrameCache,
    config: StoreConfig,
}

impl PagedStore {
    /// Create an empty store with the default configuration
    pub fn new() -> Self {
        Self::build(StoreConfig::default())
    }

    /// Create an empty store with the given configuration
    pub fn with_config(config: StoreConfig) -> StoreResult<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: StoreConfig) -> Self {
        Self {
            table: PageTable::new(config.temp_dir.clone()),
            frames: FrameCache::with_capacity(config.frame_count),
            config,
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Number of bytes in the store
    pub fn used_size(&self) -> usize {
        self.table.used_size()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn page_count(&self) -> usize {
        self.table.len()
    }

    /// Extents of every page, ordered by offset
    pub fn extents(&self) -> &[Extent] {
        self.table.extents()
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            used_size: self.used_size(),
            page_count: self.page_count(),
            frame_capacity: self.frames.capacity(),
            cached_frames: self.frames.len(),
            dirty_frames: self.frames.dirty_count(),
            hits: self.frames.hits(),
            misses: self.frames.misses(),
            evictions: self.frames.evictions(),
            write_backs: self.frames.write_backs(),
        }
    }

    /// Insert `bytes` uninitialized bytes at `index`, shifting everything
    /// from `index` onwards
    pub fn malloc(&mut self, index: usize, bytes: usize) -> StoreResult<()> {
        let size = self.used_size();
        if bytes == 0 {
            return Err(StoreError::EmptyRange { op: "malloc" });
        }
        if index > size || size.checked_add(bytes).is_none() {
            return Err(StoreError::OutOfBounds {
                op: "malloc",
                index,
                len: bytes,
                size,
            });
        }

        let split = self
            .table
            .locate(index)
            .and_then(|position| self.table.extent(position).map(|e| (position, e)))
            .filter(|(_, extent)| extent.start < index);

        let removed = match split {
            Some((position, extent)) => {
                // Inside a page: rebuild it around the new span
                let content = self.page_content(extent.page)?;
                let (prefix, suffix) = content.split_at(index - extent.start);
                let pages = self.repack(&[
                    Segment::Data(prefix),
                    Segment::Gap(bytes),
                    Segment::Data(suffix),
                ])?;
                self.table.replace(position..position + 1, extent.start, pages)
            }
            None => {
                // On a page boundary: slot new pages in between
                let position = self.table.insertion_point(index);
                let pages = self.repack(&[Segment::Gap(bytes)])?;
                self.table.replace(position..position, index, pages)
            }
        };

        log::debug!(
            "malloc {} bytes at {}: {} bytes in {} pages",
            bytes,
            index,
            self.used_size(),
            self.page_count()
        );
        self.destroy_pages(removed)
    }

    /// Remove `[index, index + bytes)`, shifting everything after it back
    pub fn free(&mut self, index: usize, bytes: usize) -> StoreResult<()> {
        if bytes == 0 {
            return Err(StoreError::EmptyRange { op: "free" });
        }
        let end = self.check_range("free", index, bytes)?;

        let first = self
            .table
            .locate(index)
            .ok_or(StoreError::PageNotFound(index))?;
        let last = self
            .table
            .locate(end - 1)
            .ok_or(StoreError::PageNotFound(end - 1))?;
        let first_extent = self
            .table
            .extent(first)
            .ok_or(StoreError::PageNotFound(index))?;
        let last_extent = self
            .table
            .extent(last)
            .ok_or(StoreError::PageNotFound(end - 1))?;

        // Bytes of the straddling pages that survive the cut
        let prefix_len = index - first_extent.start;
        let suffix_len = last_extent.end() - end;

        let mut prefix = Vec::new();
        if prefix_len > 0 {
            prefix = self.page_content(first_extent.page)?;
            prefix.truncate(prefix_len);
        }
        let mut suffix = Vec::new();
        if suffix_len > 0 {
            let mut content = self.page_content(last_extent.page)?;
            suffix = content.split_off(content.len() - suffix_len);
        }

        let pages = self.repack(&[Segment::Data(&prefix), Segment::Data(&suffix)])?;
        let removed = self
            .table
            .replace(first..last + 1, first_extent.start, pages);

        log::debug!(
            "freed {} bytes at {}: {} bytes in {} pages",
            bytes,
            index,
            self.used_size(),
            self.page_count()
        );
        self.destroy_pages(removed)
    }

    /// Read `amount` bytes starting at `index`
    pub fn read(&mut self, index: usize, amount: usize) -> StoreResult<Vec<u8>> {
        self.check_range("read", index, amount)?;
        let mut buffer = vec![0u8; amount];
        self.read_into(index, &mut buffer)?;
        Ok(buffer)
    }

    /// Fill `buffer` with the bytes starting at `index`
    pub fn read_into(&mut self, index: usize, buffer: &mut [u8]) -> StoreResult<()> {
        self.check_range("read", index, buffer.len())?;

        let mut done = 0;
        while done < buffer.len() {
            let cursor = index + done;
            let (extent, frame) = self.frames.swap(&mut self.table, cursor)?;
            let offset = cursor - extent.start;
            let take = (extent.len - offset).min(buffer.len() - done);
            buffer[done..done + take].copy_from_slice(&frame.data()[offset..offset + take]);
            done += take;
        }
        Ok(())
    }

    /// Overwrite the bytes starting at `index` with `data`
    pub fn write(&mut self, index: usize, data: &[u8]) -> StoreResult<()> {
        self.check_range("write", index, data.len())?;

        let mut done = 0;
        while done < data.len() {
            let cursor = index + done;
            let (extent, frame) = self.frames.swap(&mut self.table, cursor)?;
            let offset = cursor - extent.start;
            let take = (extent.len - offset).min(data.len() - done);
            frame.data_mut()[offset..offset + take].copy_from_slice(&data[done..done + take]);
            done += take;
        }
        Ok(())
    }

    /// Copy the inclusive range `[start, stop]` of `source` into this store
    /// at `put_at`, growing this store by `stop - start + 1` bytes.
    ///
    /// Bytes are streamed one page at a time, so neither store has to fit in
    /// memory. `source` is left unchanged apart from its frame cache.
    pub fn transfer(
        &mut self,
        source: &mut PagedStore,
        start: usize,
        stop: usize,
        put_at: usize,
    ) -> StoreResult<()> {
        let source_size = source.used_size();
        if start > stop || stop >= source_size {
            return Err(StoreError::InvalidTransferRange {
                start,
                stop,
                size: source_size,
            });
        }
        let len = stop - start + 1;
        if put_at > self.used_size() {
            return Err(StoreError::OutOfBounds {
                op: "transfer",
                index: put_at,
                len,
                size: self.used_size(),
            });
        }

        self.malloc(put_at, len)?;
        if let Err(e) = self.copy_from(source, start, put_at, len) {
            log::warn!("transfer of {} bytes aborted: {}", len, e);
            if let Err(rollback) = self.free(put_at, len) {
                log::warn!("could not roll back aborted transfer: {}", rollback);
            }
            return Err(e);
        }
        Ok(())
    }

    fn copy_from(
        &mut self,
        source: &mut PagedStore,
        start: usize,
        put_at: usize,
        len: usize,
    ) -> StoreResult<()> {
        let chunk = self.config.max_page_size.min(len);
        let mut buffer = vec![0u8; chunk];

        let mut done = 0;
        while done < len {
            let n = chunk.min(len - done);
            source.read_into(start + done, &mut buffer[..n])?;
            self.write(put_at + done, &buffer[..n])?;
            done += n;
        }
        Ok(())
    }

    /// Release every page and its backing file, leaving the store empty
    pub fn dispose(&mut self) -> StoreResult<()> {
        let size = self.used_size();
        if size == 0 {
            return Ok(());
        }
        // No flush: dirty frames belong to pages that are deleted here
        self.free(0, size)
    }

    /// Write every dirty frame back to disk
    pub fn flush(&mut self) -> StoreResult<()> {
        self.frames.flush(&mut self.table)
    }

    /// Verify the page partition and the frame cache against each other
    pub fn check_invariants(&self) -> StoreResult<()> {
        self.table.check_invariants(self.config.max_page_size)?;

        if self.frames.len() > self.frames.capacity() {
            return Err(StoreError::InvariantViolation(format!(
                "{} frames cached, capacity {}",
                self.frames.len(),
                self.frames.capacity()
            )));
        }
        for frame in self.frames.cached() {
            match self.table.page(frame.page()) {
                Some(page) if page.len() == frame.data().len() => {}
                Some(page) => {
                    return Err(StoreError::InvariantViolation(format!(
                        "frame for page {} holds {} bytes, page has {}",
                        frame.page(),
                        frame.data().len(),
                        page.len()
                    )));
                }
                None => {
                    return Err(StoreError::InvariantViolation(format!(
                        "frame caches destroyed page {}",
                        frame.page()
                    )));
                }
            }
        }
        Ok(())
    }

    /// End offset of `[index, index + len)` if it lies within the store
    fn check_range(&self, op: &'static str, index: usize, len: usize) -> StoreResult<usize> {
        let size = self.used_size();
        index
            .checked_add(len)
            .filter(|&end| end <= size)
            .ok_or(StoreError::OutOfBounds {
                op,
                index,
                len,
                size,
            })
    }

    /// Current bytes of a page; a cached frame wins over the disk copy
    fn page_content(&mut self, page: PageId) -> StoreResult<Vec<u8>> {
        if let Some(data) = self.frames.peek(page) {
            return Ok(data.to_vec());
        }
        self.table
            .page_mut(page)
            .ok_or_else(|| {
                StoreError::InvariantViolation(format!("page {} is not in the page table", page))
            })?
            .read_all()
    }

    /// Cut the concatenation of `segments` into as few pages as the page
    /// size allows. Pages lying entirely in a gap are left uninitialized.
    fn repack(&mut self, segments: &[Segment<'_>]) -> StoreResult<Vec<Page>> {
        let total: usize = segments.iter().map(Segment::len).sum();
        let max_page_size = self.config.max_page_size;
        let mut pages = Vec::with_capacity(total.div_ceil(max_page_size));

        let mut chunk_start = 0;
        while chunk_start < total {
            let chunk_len = max_page_size.min(total - chunk_start);
            let chunk_end = chunk_start + chunk_len;

            let mut buffer: Option<Vec<u8>> = None;
            let mut segment_start = 0;
            for segment in segments {
                let segment_end = segment_start + segment.len();
                if let Segment::Data(data) = segment {
                    let from = segment_start.max(chunk_start);
                    let to = segment_end.min(chunk_end);
                    if from < to {
                        let buf = buffer.get_or_insert_with(|| vec![0u8; chunk_len]);
                        buf[from - chunk_start..to - chunk_start]
                            .copy_from_slice(&data[from - segment_start..to - segment_start]);
                    }
                }
                segment_start = segment_end;
            }

            let page = match buffer {
                Some(data) => self.table.create_page_with(&data)?,
                None => self.table.create_page(chunk_len)?,
            };
            pages.push(page);
            chunk_start = chunk_end;
        }
        Ok(pages)
    }

    /// Drop cached frames of removed pages and delete their files
    fn destroy_pages(&mut self, pages: Vec<Page>) -> StoreResult<()> {
        let mut result = Ok(());
        for page in pages {
            let id = page.id();
            self.frames.invalidate(id);
            if let Err(e) = page.destroy() {
                log::warn!("failed to delete backing file of page {}: {}", id, e);
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }
        result
    }
}

impl Default for PagedStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for PagedStore {
    fn drop(&mut self) {
        if let Err(e) = self.dispose() {
            log::warn!("failed to dispose paged store: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup_store(frames: usize, page_size: usize) -> (TempDir, PagedStore) {
        let temp_dir = tempfile::tempdir().unwrap();
        let config = StoreConfig::default()
            .with_frame_count(frames)
            .with_max_page_size(page_size)
            .with_temp_dir(temp_dir.path());
        let store = PagedStore::with_config(config).unwrap();
        (temp_dir, store)
    }

    fn backing_file_count(temp_dir: &TempDir) -> usize {
        std::fs::read_dir(temp_dir.path()).unwrap().count()
    }

    #[test]
    fn test_new_store_is_empty() {
        let (_temp_dir, store) = setup_store(4, 16);
        assert_eq!(store.used_size(), 0);
        assert!(store.is_empty());
        store.check_invariants().unwrap();
    }

    #[test]
    fn test_with_config_rejects_invalid() {
        let result = PagedStore::with_config(StoreConfig::default().with_frame_count(0));
        assert!(matches!(result, Err(StoreError::InvalidConfig(_))));
    }

    #[test]
    fn test_malloc_chunks_into_pages() {
        let (temp_dir, mut store) = setup_store(4, 16);

        store.malloc(0, 40).unwrap();
        assert_eq!(store.used_size(), 40);
        assert_eq!(store.page_count(), 3);
        let lengths: Vec<usize> = store.extents().iter().map(|e| e.len).collect();
        assert_eq!(lengths, vec![16, 16, 8]);
        assert_eq!(backing_file_count(&temp_dir), 3);
        store.check_invariants().unwrap();
    }

    #[test]
    fn test_malloc_inside_page_keeps_content() {
        let (_temp_dir, mut store) = setup_store(4, 16);
        store.malloc(0, 10).unwrap();
        store.write(0, b"0123456789").unwrap();

        store.malloc(4, 3).unwrap();
        assert_eq!(store.used_size(), 13);
        assert_eq!(store.read(0, 4).unwrap(), b"0123");
        assert_eq!(store.read(7, 6).unwrap(), b"456789");
        store.check_invariants().unwrap();
    }

    #[test]
    fn test_malloc_on_boundary_keeps_pages() {
        let (_temp_dir, mut store) = setup_store(4, 8);
        store.malloc(0, 16).unwrap();
        let before: Vec<PageId> = store.extents().iter().map(|e| e.page).collect();

        store.malloc(8, 4).unwrap();
        let after: Vec<PageId> = store.extents().iter().map(|e| e.page).collect();
        assert_eq!(after.len(), 3);
        assert_eq!(after[0], before[0]);
        assert_eq!(after[2], before[1]);
        assert_eq!(store.extents()[2].start, 12);
        store.check_invariants().unwrap();
    }

    #[test]
    fn test_malloc_at_end_appends() {
        let (_temp_dir, mut store) = setup_store(4, 8);
        store.malloc(0, 5).unwrap();
        store.write(0, b"abcde").unwrap();

        store.malloc(5, 3).unwrap();
        store.write(5, b"fgh").unwrap();
        assert_eq!(store.read(0, 8).unwrap(), b"abcdefgh");
        store.check_invariants().unwrap();
    }

    #[test]
    fn test_malloc_uses_cached_frame_content() {
        let (_temp_dir, mut store) = setup_store(4, 16);
        store.malloc(0, 8).unwrap();
        store.write(0, b"ABCDEFGH").unwrap();
        // The write is only in the frame at this point
        assert_eq!(store.stats().dirty_frames, 1);

        store.malloc(2, 2).unwrap();
        assert_eq!(store.read(0, 2).unwrap(), b"AB");
        assert_eq!(store.read(4, 6).unwrap(), b"CDEFGH");
    }

    #[test]
    fn test_malloc_invalid() {
        let (_temp_dir, mut store) = setup_store(4, 16);
        store.malloc(0, 10).unwrap();

        let result = store.malloc(11, 5);
        assert!(matches!(result, Err(StoreError::OutOfBounds { .. })));
        let result = store.malloc(0, 0);
        assert!(matches!(result, Err(StoreError::EmptyRange { .. })));
        assert!(result.unwrap_err().is_precondition());
        assert_eq!(store.used_size(), 10);
    }

    #[test]
    fn test_free_whole_pages_deletes_files() {
        let (temp_dir, mut store) = setup_store(4, 8);
        store.malloc(0, 24).unwrap();
        assert_eq!(backing_file_count(&temp_dir), 3);

        store.free(8, 8).unwrap();
        assert_eq!(store.used_size(), 16);
        assert_eq!(store.page_count(), 2);
        assert_eq!(backing_file_count(&temp_dir), 2);
        store.check_invariants().unwrap();
    }

    #[test]
    fn test_free_across_pages_repacks_survivors() {
        let (_temp_dir, mut store) = setup_store(4, 8);
        store.malloc(0, 24).unwrap();
        let data: Vec<u8> = (0..24).collect();
        store.write(0, &data).unwrap();

        // Cut from the middle of page 0 to the middle of page 2
        store.free(5, 14).unwrap();
        assert_eq!(store.used_size(), 10);
        assert_eq!(store.page_count(), 2);
        assert_eq!(store.read(0, 10).unwrap(), vec![0, 1, 2, 3, 4, 19, 20, 21, 22, 23]);
        store.check_invariants().unwrap();
    }

    #[test]
    fn test_free_inside_single_page() {
        let (_temp_dir, mut store) = setup_store(4, 16);
        store.malloc(0, 10).unwrap();
        store.write(0, b"0123456789").unwrap();

        store.free(3, 4).unwrap();
        assert_eq!(store.page_count(), 1);
        assert_eq!(store.read(0, 6).unwrap(), b"012789");
        store.check_invariants().unwrap();
    }

    #[test]
    fn test_free_invalid() {
        let (_temp_dir, mut store) = setup_store(4, 16);
        store.malloc(0, 10).unwrap();

        assert!(matches!(
            store.free(5, 6),
            Err(StoreError::OutOfBounds { .. })
        ));
        assert!(matches!(
            store.free(usize::MAX, 2),
            Err(StoreError::OutOfBounds { .. })
        ));
        assert!(matches!(store.free(0, 0), Err(StoreError::EmptyRange { .. })));
        assert_eq!(store.used_size(), 10);
    }

    #[test]
    fn test_read_write_across_pages() {
        let (_temp_dir, mut store) = setup_store(2, 4);
        store.malloc(0, 20).unwrap();

        let data: Vec<u8> = (100..120).collect();
        store.write(0, &data).unwrap();
        assert_eq!(store.read(0, 20).unwrap(), data);
        assert_eq!(store.read(3, 6).unwrap(), vec![103, 104, 105, 106, 107, 108]);
    }

    #[test]
    fn test_read_empty_range() {
        let (_temp_dir, mut store) = setup_store(2, 4);
        store.malloc(0, 4).unwrap();
        assert!(store.read(4, 0).unwrap().is_empty());
    }

    #[test]
    fn test_read_write_out_of_bounds() {
        let (_temp_dir, mut store) = setup_store(2, 4);
        store.malloc(0, 8).unwrap();

        assert!(matches!(
            store.read(6, 3),
            Err(StoreError::OutOfBounds { .. })
        ));
        assert!(matches!(
            store.write(7, b"ab"),
            Err(StoreError::OutOfBounds { .. })
        ));
        assert_eq!(store.used_size(), 8);
    }

    #[test]
    fn test_write_back_survives_eviction() {
        let (_temp_dir, mut store) = setup_store(1, 4);
        store.malloc(0, 8).unwrap();

        store.write(0, b"abcd").unwrap();
        // Touching the second page evicts the first one
        store.write(4, b"efgh").unwrap();
        let stats = store.stats();
        assert_eq!(stats.cached_frames, 1);
        assert_eq!(stats.write_backs, 1);

        assert_eq!(store.read(0, 8).unwrap(), b"abcdefgh");
    }

    #[test]
    fn test_flush_cleans_frames() {
        let (_temp_dir, mut store) = setup_store(4, 4);
        store.malloc(0, 8).unwrap();
        store.write(0, b"abcdefgh").unwrap();
        assert_eq!(store.stats().dirty_frames, 2);

        store.flush().unwrap();
        assert_eq!(store.stats().dirty_frames, 0);
        assert_eq!(store.read(0, 8).unwrap(), b"abcdefgh");
    }

    #[test]
    fn test_transfer() {
        let (_temp_a, mut source) = setup_store(2, 4);
        let (_temp_b, mut target) = setup_store(2, 4);
        source.malloc(0, 10).unwrap();
        source.write(0, b"0123456789").unwrap();
        target.malloc(0, 4).unwrap();
        target.write(0, b"abcd").unwrap();

        target.transfer(&mut source, 2, 5, 2).unwrap();
        assert_eq!(target.used_size(), 8);
        assert_eq!(target.read(0, 8).unwrap(), b"ab2345cd");
        assert_eq!(source.used_size(), 10);
        assert_eq!(source.read(0, 10).unwrap(), b"0123456789");
        target.check_invariants().unwrap();
    }

    #[test]
    fn test_transfer_invalid() {
        let (_temp_a, mut source) = setup_store(2, 4);
        let (_temp_b, mut target) = setup_store(2, 4);
        source.malloc(0, 10).unwrap();

        assert!(matches!(
            target.transfer(&mut source, 5, 4, 0),
            Err(StoreError::InvalidTransferRange { .. })
        ));
        assert!(matches!(
            target.transfer(&mut source, 0, 10, 0),
            Err(StoreError::InvalidTransferRange { .. })
        ));
        assert!(matches!(
            target.transfer(&mut source, 0, 3, 1),
            Err(StoreError::OutOfBounds { .. })
        ));
        assert_eq!(target.used_size(), 0);
    }

    /// Cut a page's backing file to zero bytes so that loading it fails
    fn truncate_backing_file(store: &PagedStore, position: usize) {
        let page = store.extents()[position].page;
        let path = store.table.page(page).unwrap().path();
        std::fs::OpenOptions::new()
            .write(true)
            .open(path)
            .unwrap()
            .set_len(0)
            .unwrap();
    }

    #[test]
    fn test_unreadable_page_leaves_splices_unapplied() {
        let (temp_dir, mut store) = setup_store(1, 16);
        let data: Vec<u8> = (0..48).collect();
        store.malloc(0, 48).unwrap();
        store.write(0, &data).unwrap();
        store.flush().unwrap();
        truncate_backing_file(&store, 0);

        let extents = store.extents().to_vec();
        assert_eq!(backing_file_count(&temp_dir), 3);

        let err = store.malloc(5, 3).unwrap_err();
        assert!(err.is_storage_fault());
        assert_eq!(store.extents(), extents.as_slice());
        assert_eq!(store.used_size(), 48);
        assert_eq!(backing_file_count(&temp_dir), 3);

        let err = store.free(5, 20).unwrap_err();
        assert!(err.is_storage_fault());
        assert_eq!(store.extents(), extents.as_slice());
        assert_eq!(store.used_size(), 48);
        assert_eq!(backing_file_count(&temp_dir), 3);

        assert_eq!(store.read(16, 32).unwrap(), &data[16..]);
        store.check_invariants().unwrap();
    }

    #[test]
    fn test_page_creation_failure_leaves_store_unchanged() {
        let (temp_dir, mut store) = setup_store(4, 16);
        let data: Vec<u8> = (0..32).collect();
        store.malloc(0, 32).unwrap();
        store.write(0, &data).unwrap();
        let extents = store.extents().to_vec();

        // New backing files can no longer be created
        std::fs::remove_dir_all(temp_dir.path()).unwrap();

        let err = store.malloc(8, 40).unwrap_err();
        assert!(matches!(err, StoreError::Io(_)));
        assert_eq!(store.extents(), extents.as_slice());
        assert_eq!(store.used_size(), 32);

        let err = store.free(4, 8).unwrap_err();
        assert!(matches!(err, StoreError::Io(_)));
        assert_eq!(store.extents(), extents.as_slice());

        assert_eq!(store.read(0, 32).unwrap(), data);
        store.check_invariants().unwrap();
    }

    #[test]
    fn test_transfer_rolls_back_on_read_failure() {
        let (_temp_a, mut source) = setup_store(1, 4);
        let (temp_b, mut target) = setup_store(2, 4);
        source.malloc(0, 12).unwrap();
        source.write(0, b"0123456789ab").unwrap();
        source.flush().unwrap();
        truncate_backing_file(&source, 0);

        target.malloc(0, 8).unwrap();
        target.write(0, b"abcdefgh").unwrap();
        let extents = target.extents().to_vec();
        assert_eq!(backing_file_count(&temp_b), 2);

        let err = target.transfer(&mut source, 0, 5, 4).unwrap_err();
        assert!(err.is_storage_fault());
        assert_eq!(target.extents(), extents.as_slice());
        assert_eq!(target.used_size(), 8);
        assert_eq!(backing_file_count(&temp_b), 2);
        assert_eq!(target.read(0, 8).unwrap(), b"abcdefgh");
        assert_eq!(source.used_size(), 12);
        target.check_invariants().unwrap();
    }

    #[test]
    fn test_dispose() {
        let (temp_dir, mut store) = setup_store(2, 4);
        store.malloc(0, 17).unwrap();
        store.write(0, &[7u8; 17]).unwrap();
        assert_eq!(backing_file_count(&temp_dir), 5);

        store.dispose().unwrap();
        assert_eq!(store.used_size(), 0);
        assert_eq!(store.stats().cached_frames, 0);
        assert_eq!(backing_file_count(&temp_dir), 0);

        // The store can be reused
        store.malloc(0, 3).unwrap();
        store.write(0, b"xyz").unwrap();
        assert_eq!(store.read(0, 3).unwrap(), b"xyz");
    }

    #[test]
    fn test_drop_deletes_backing_files() {
        let (temp_dir, mut store) = setup_store(2, 4);
        store.malloc(0, 12).unwrap();
        assert_eq!(backing_file_count(&temp_dir), 3);

        drop(store);
        assert_eq!(backing_file_count(&temp_dir), 0);
    }
}
