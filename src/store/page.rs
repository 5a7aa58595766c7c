use ahash::AHashMap;
use std::io::{Read, Seek, SeekFrom, Write};
use std::ops::Range;
use std::path::{Path, PathBuf};
use tempfile::{Builder, NamedTempFile};

use super::PageId;
use super::error::{StoreError, StoreResult};

/// One contiguous extent of a store, kept in its own temporary file
pub struct Page {
    id: PageId,
    len: usize,
    file: NamedTempFile,
}

impl Page {
    /// Create a page backed by a new temp file of exactly `len` bytes.
    /// The content is unspecified until written.
    pub fn create(id: PageId, len: usize, temp_dir: Option<&Path>) -> StoreResult<Self> {
        let mut builder = Builder::new();
        builder.prefix("pagestore-").suffix(".page");
        let file = match temp_dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        file.as_file().set_len(len as u64)?;

        let page = Self { id, len, file };
        log::debug!("created page {} ({} bytes) at {}", id, len, page.path().display());
        Ok(page)
    }

    /// Create a page holding `data`
    pub fn create_with(id: PageId, data: &[u8], temp_dir: Option<&Path>) -> StoreResult<Self> {
        let mut page = Self::create(id, data.len(), temp_dir)?;
        page.write_all(data)?;
        Ok(page)
    }

    pub fn id(&self) -> PageId {
        self.id
    }

    pub fn len(&self) -> usize {
        self.len
    }

    /// Location of the backing file
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Read the whole page
    pub fn read_all(&mut self) -> StoreResult<Vec<u8>> {
        let mut buffer = Vec::new();
        self.read_into(&mut buffer)?;
        Ok(buffer)
    }

    /// Read the whole page into `buffer`, resizing it to the page length
    pub fn read_into(&mut self, buffer: &mut Vec<u8>) -> StoreResult<()> {
        buffer.clear();
        buffer.resize(self.len, 0);

        let file = self.file.as_file_mut();
        file.seek(SeekFrom::Start(0))?;
        file.read_exact(buffer)?;
        Ok(())
    }

    /// Overwrite the whole page
    pub fn write_all(&mut self, data: &[u8]) -> StoreResult<()> {
        if data.len() != self.len {
            return Err(StoreError::InvalidPageSize {
                expected: self.len,
                actual: data.len(),
            });
        }

        let file = self.file.as_file_mut();
        file.seek(SeekFrom::Start(0))?;
        file.write_all(data)?;
        Ok(())
    }

    /// Flush OS buffers for the backing file
    pub fn sync(&mut self) -> StoreResult<()> {
        self.file.as_file().sync_data()?;
        Ok(())
    }

    /// Close and delete the backing file
    pub fn destroy(self) -> StoreResult<()> {
        let id = self.id;
        self.file.close()?;
        log::debug!("destroyed page {}", id);
        Ok(())
    }
}

/// Position of one page in the logical address space
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extent {
    pub start: usize,
    pub len: usize,
    pub page: PageId,
}

impl Extent {
    pub fn end(&self) -> usize {
        self.start + self.len
    }

    pub fn contains(&self, index: usize) -> bool {
        self.start <= index && index < self.end()
    }
}

/// Ordered page table: extents sorted by start, partitioning `[0, used_size)`
pub struct PageTable {
    /// Extents ordered by start offset
    extents: Vec<Extent>,
    /// Backing pages by ID
    pages: AHashMap<PageId, Page>,
    /// Next page ID, never reused
    next_id: PageId,
    /// Directory for backing files
    temp_dir: Option<PathBuf>,
}

impl PageTable {
    pub fn new(temp_dir: Option<PathBuf>) -> Self {
        Self {
            extents: Vec::new(),
            pages: AHashMap::new(),
            next_id: 0,
            temp_dir,
        }
    }

    /// Total length of all pages
    pub fn used_size(&self) -> usize {
        self.extents.last().map_or(0, Extent::end)
    }

    /// Number of pages
    pub fn len(&self) -> usize {
        self.extents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extents.is_empty()
    }

    pub fn extents(&self) -> &[Extent] {
        &self.extents
    }

    pub fn extent(&self, position: usize) -> Option<Extent> {
        self.extents.get(position).copied()
    }

    /// Position of the extent covering `index`
    pub fn locate(&self, index: usize) -> Option<usize> {
        let position = self.extents.partition_point(|e| e.end() <= index);
        match self.extents.get(position) {
            Some(extent) if extent.contains(index) => Some(position),
            _ => None,
        }
    }

    /// Position at which a page starting at `index` would be inserted
    pub fn insertion_point(&self, index: usize) -> usize {
        self.extents.partition_point(|e| e.start < index)
    }

    pub fn page(&self, id: PageId) -> Option<&Page> {
        self.pages.get(&id)
    }

    pub fn page_mut(&mut self, id: PageId) -> Option<&mut Page> {
        self.pages.get_mut(&id)
    }

    /// Allocate an uninitialized page that is not yet part of the table
    pub fn create_page(&mut self, len: usize) -> StoreResult<Page> {
        let id = self.allocate_id();
        Page::create(id, len, self.temp_dir.as_deref())
    }

    /// Allocate a page holding `data` that is not yet part of the table
    pub fn create_page_with(&mut self, data: &[u8]) -> StoreResult<Page> {
        let id = self.allocate_id();
        Page::create_with(id, data, self.temp_dir.as_deref())
    }

    fn allocate_id(&mut self) -> PageId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Replace the extents at `positions` with `pages`, laid out back to back
    /// from the start of the first replaced extent (or from `start` when
    /// `positions` is empty). Every later extent is repacked to follow on
    /// without a gap. Returns the removed pages; the caller destroys them.
    pub fn replace(&mut self, positions: Range<usize>, start: usize, pages: Vec<Page>) -> Vec<Page> {
        let mut offset = if positions.is_empty() {
            start
        } else {
            self.extents.get(positions.start).map_or(start, |e| e.start)
        };

        let mut inserted = Vec::with_capacity(pages.len());
        for page in &pages {
            inserted.push(Extent {
                start: offset,
                len: page.len(),
                page: page.id(),
            });
            offset += page.len();
        }
        let after = positions.start + inserted.len();

        let removed: Vec<Extent> = self.extents.splice(positions, inserted).collect();

        for extent in &mut self.extents[after..] {
            extent.start = offset;
            offset += extent.len;
        }

        for page in pages {
            self.pages.insert(page.id(), page);
        }
        removed
            .iter()
            .filter_map(|extent| self.pages.remove(&extent.page))
            .collect()
    }

    /// Verify that the extents partition `[0, used_size)` and match their pages
    pub fn check_invariants(&self, max_page_size: usize) -> StoreResult<()> {
        let mut expected_start = 0;
        for extent in &self.extents {
            if extent.start != expected_start {
                return Err(StoreError::InvariantViolation(format!(
                    "page {} starts at {}, expected {}",
                    extent.page, extent.start, expected_start
                )));
            }
            if extent.len == 0 || extent.len > max_page_size {
                return Err(StoreError::InvariantViolation(format!(
                    "page {} has length {} (max {})",
                    extent.page, extent.len, max_page_size
                )));
            }
            match self.pages.get(&extent.page) {
                Some(page) if page.len() == extent.len => {}
                Some(page) => {
                    return Err(StoreError::InvariantViolation(format!(
                        "page {} backs {} bytes but its extent covers {}",
                        extent.page,
                        page.len(),
                        extent.len
                    )));
                }
                None => {
                    return Err(StoreError::InvariantViolation(format!(
                        "extent at {} refers to missing page {}",
                        extent.start, extent.page
                    )));
                }
            }
            expected_start = extent.end();
        }
        if self.pages.len() != self.extents.len() {
            return Err(StoreError::InvariantViolation(format!(
                "{} pages held for {} extents",
                self.pages.len(),
                self.extents.len()
            )));
        }
        Ok(())
    }
}
