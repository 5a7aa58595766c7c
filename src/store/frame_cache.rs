use lru::LruCache;
use std::num::NonZeroUsize;

use super::error::{StoreError, StoreResult};
use super::page::{Extent, PageTable};
use super::PageId;

/// In-memory copy of one page
pub struct Frame {
    /// The page this frame caches
    page: PageId,
    /// The page bytes, authoritative until evicted
    data: Vec<u8>,
    /// Whether the buffer differs from the page on disk
    dirty: bool,
}

impl Frame {
    pub fn page(&self) -> PageId {
        self.page
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Mutable access to the buffer; marks the frame dirty
    pub fn data_mut(&mut self) -> &mut [u8] {
        self.dirty = true;
        &mut self.data
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }
}

/// Bounded set of frames with LRU eviction and write-back.
///
/// The recency order of the cache stands in for per-frame access
/// timestamps: the least recently touched frame is always the victim.
pub struct FrameCache {
    /// Frames by page ID, in recency order
    frames: LruCache<PageId, Frame>,
    /// Maximum number of frames
    capacity: usize,
    /// Buffer recycled from the last eviction
    spare: Vec<u8>,
    hits: u64,
    misses: u64,
    evictions: u64,
    write_backs: u64,
}

impl FrameCache {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            frames: LruCache::new(capacity),
            capacity: capacity.get(),
            spare: Vec::new(),
            hits: 0,
            misses: 0,
            evictions: 0,
            write_backs: 0,
        }
    }

    /// Cached bytes for `page` without touching its recency
    pub fn peek(&self, page: PageId) -> Option<&[u8]> {
        self.frames.peek(&page).map(|frame| frame.data.as_slice())
    }

    /// Frame caching the page that covers `index`, loading it on a miss.
    /// Returns the page's extent alongside the frame.
    pub fn swap(&mut self, table: &mut PageTable, index: usize) -> StoreResult<(Extent, &mut Frame)> {
        let extent = table
            .locate(index)
            .and_then(|position| table.extent(position))
            .ok_or(StoreError::PageNotFound(index))?;

        if self.is_cached(extent.page) {
            self.hits += 1;
            log::trace!("frame hit for page {}", extent.page);
        } else {
            self.misses += 1;
            log::trace!("frame miss for page {}", extent.page);
            self.load(table, extent.page)?;
        }

        let frame = self
            .frames
            .get_mut(&extent.page)
            .ok_or(StoreError::PageNotFound(index))?;
        Ok((extent, frame))
    }

    /// Load a page into a free frame, evicting the LRU frame when full
    fn load(&mut self, table: &mut PageTable, page: PageId) -> StoreResult<()> {
        while self.frames.len() >= self.capacity {
            self.evict_lru(table)?;
        }

        let mut data = std::mem::take(&mut self.spare);
        let result = match table.page_mut(page) {
            Some(backing) => backing.read_into(&mut data),
            None => Err(StoreError::InvariantViolation(format!(
                "page {} is not in the page table",
                page
            ))),
        };
        if let Err(e) = result {
            self.spare = data;
            return Err(e);
        }

        self.frames.put(
            page,
            Frame {
                page,
                data,
                dirty: false,
            },
        );
        Ok(())
    }

    /// Evict the least recently used frame, writing it back if dirty
    fn evict_lru(&mut self, table: &mut PageTable) -> StoreResult<()> {
        if let Some((page, frame)) = self.frames.peek_lru()
            && frame.dirty
            && let Some(backing) = table.page_mut(*page)
        {
            backing.write_all(&frame.data)?;
            self.write_backs += 1;
        }

        if let Some((page, evicted)) = self.frames.pop_lru() {
            self.evictions += 1;
            log::debug!("evicted frame for page {}", page);
            self.spare = evicted.data;
        }
        Ok(())
    }

    /// Drop the frame for `page` without writing it back
    pub fn invalidate(&mut self, page: PageId) {
        if let Some(frame) = self.frames.pop(&page) {
            self.spare = frame.data;
        }
    }

    /// Write every dirty frame back to its page
    pub fn flush(&mut self, table: &mut PageTable) -> StoreResult<()> {
        for (page, frame) in self.frames.iter_mut() {
            if !frame.dirty {
                continue;
            }
            if let Some(backing) = table.page_mut(*page) {
                backing.write_all(&frame.data)?;
                backing.sync()?;
                self.write_backs += 1;
            }
            frame.dirty = false;
        }
        Ok(())
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of frames currently holding a page
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Every cached frame, most recently used first
    pub fn cached(&self) -> impl Iterator<Item = &Frame> {
        self.frames.iter().map(|(_, frame)| frame)
    }

    pub fn is_cached(&self, page: PageId) -> bool {
        self.frames.contains(&page)
    }

    pub fn dirty_count(&self) -> usize {
        self.frames.iter().filter(|(_, f)| f.is_dirty()).count()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }

    pub fn evictions(&self) -> u64 {
        self.evictions
    }

    pub fn write_backs(&self) -> u64 {
        self.write_backs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup_test_env(lengths: &[usize]) -> (TempDir, PageTable) {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut table = PageTable::new(Some(temp_dir.path().to_path_buf()));

        let mut pages = Vec::new();
        for (i, &len) in lengths.iter().enumerate() {
            pages.push(table.create_page_with(&vec![i as u8; len]).unwrap());
        }
        table.replace(0..0, 0, pages);

        (temp_dir, table)
    }

    #[test]
    fn test_swap_loads_page() {
        let (_temp_dir, mut table) = setup_test_env(&[10, 10]);
        let mut cache = FrameCache::with_capacity(2);

        let (extent, frame) = cache.swap(&mut table, 15).unwrap();
        assert_eq!(extent.start, 10);
        assert_eq!(frame.data(), &[1u8; 10]);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.misses(), 1);
    }

    #[test]
    fn test_swap_cached() {
        let (_temp_dir, mut table) = setup_test_env(&[10]);
        let mut cache = FrameCache::with_capacity(2);

        cache.swap(&mut table, 0).unwrap();
        cache.swap(&mut table, 9).unwrap();
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.hits(), 1);
        assert_eq!(cache.misses(), 1);
    }

    #[test]
    fn test_swap_not_found() {
        let (_temp_dir, mut table) = setup_test_env(&[10]);
        let mut cache = FrameCache::with_capacity(2);

        let result = cache.swap(&mut table, 10);
        assert!(matches!(result, Err(StoreError::PageNotFound(10))));
    }

    #[test]
    fn test_lru_eviction() {
        let (_temp_dir, mut table) = setup_test_env(&[4, 4, 4, 4]);
        let ids: Vec<PageId> = table.extents().iter().map(|e| e.page).collect();
        let mut cache = FrameCache::with_capacity(3);

        // Load 3 pages
        cache.swap(&mut table, 0).unwrap();
        cache.swap(&mut table, 4).unwrap();
        cache.swap(&mut table, 8).unwrap();
        assert_eq!(cache.len(), 3);

        // Load a 4th page - should evict page 0 (LRU)
        cache.swap(&mut table, 12).unwrap();
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.evictions(), 1);
        assert!(!cache.is_cached(ids[0]));
        assert!(cache.is_cached(ids[1]));
        assert!(cache.is_cached(ids[2]));
        assert!(cache.is_cached(ids[3]));
    }

    #[test]
    fn test_lru_update_on_access() {
        let (_temp_dir, mut table) = setup_test_env(&[4, 4, 4, 4]);
        let ids: Vec<PageId> = table.extents().iter().map(|e| e.page).collect();
        let mut cache = FrameCache::with_capacity(3);

        cache.swap(&mut table, 0).unwrap();
        cache.swap(&mut table, 4).unwrap();
        cache.swap(&mut table, 8).unwrap();

        // Access page 0 again to make it recently used
        cache.swap(&mut table, 1).unwrap();

        // Load a 4th page - should evict page 1 (now LRU)
        cache.swap(&mut table, 12).unwrap();
        assert!(cache.is_cached(ids[0]));
        assert!(!cache.is_cached(ids[1]));
        assert!(cache.is_cached(ids[2]));
        assert!(cache.is_cached(ids[3]));
    }

    #[test]
    fn test_dirty_frame_written_back_on_eviction() {
        let (_temp_dir, mut table) = setup_test_env(&[4, 4]);
        let first = table.extent(0).unwrap().page;
        let mut cache = FrameCache::with_capacity(1);

        {
            let (_, frame) = cache.swap(&mut table, 0).unwrap();
            frame.data_mut()[0] = 77;
        }
        assert_eq!(cache.dirty_count(), 1);

        // Loading the second page evicts the first
        cache.swap(&mut table, 4).unwrap();
        assert_eq!(cache.write_backs(), 1);
        assert!(!cache.is_cached(first));

        let on_disk = table.page_mut(first).unwrap().read_all().unwrap();
        assert_eq!(on_disk, vec![77, 0, 0, 0]);
    }

    #[test]
    fn test_clean_frame_not_written_back() {
        let (_temp_dir, mut table) = setup_test_env(&[4, 4]);
        let mut cache = FrameCache::with_capacity(1);

        cache.swap(&mut table, 0).unwrap();
        cache.swap(&mut table, 4).unwrap();
        assert_eq!(cache.evictions(), 1);
        assert_eq!(cache.write_backs(), 0);
    }

    #[test]
    fn test_invalidate_discards_changes() {
        let (_temp_dir, mut table) = setup_test_env(&[4]);
        let page = table.extent(0).unwrap().page;
        let mut cache = FrameCache::with_capacity(1);

        {
            let (_, frame) = cache.swap(&mut table, 0).unwrap();
            frame.data_mut()[0] = 9;
        }
        cache.invalidate(page);
        assert_eq!(cache.len(), 0);

        let on_disk = table.page_mut(page).unwrap().read_all().unwrap();
        assert_eq!(on_disk, vec![0, 0, 0, 0]);
    }

    #[test]
    fn test_flush() {
        let (_temp_dir, mut table) = setup_test_env(&[4, 4]);
        let mut cache = FrameCache::with_capacity(2);

        for index in [0, 4] {
            let (_, frame) = cache.swap(&mut table, index).unwrap();
            frame.data_mut()[1] = 55;
        }
        assert_eq!(cache.dirty_count(), 2);

        cache.flush(&mut table).unwrap();
        assert_eq!(cache.dirty_count(), 0);
        assert_eq!(cache.len(), 2);

        for extent in table.extents().to_vec() {
            let on_disk = table.page_mut(extent.page).unwrap().read_all().unwrap();
            assert_eq!(on_disk[1], 55);
        }
    }

    #[test]
    fn test_hit_touches_recency() {
        let (_temp_dir, mut table) = setup_test_env(&[4, 4, 4]);
        let ids: Vec<PageId> = table.extents().iter().map(|e| e.page).collect();
        let mut cache = FrameCache::with_capacity(2);

        cache.swap(&mut table, 0).unwrap();
        cache.swap(&mut table, 4).unwrap();
        cache.swap(&mut table, 3).unwrap();
        assert_eq!(cache.hits(), 1);

        cache.swap(&mut table, 8).unwrap();
        assert!(cache.is_cached(ids[0]));
        assert!(!cache.is_cached(ids[1]));
    }
}
