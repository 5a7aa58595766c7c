mod config;
mod error;
mod frame_cache;
mod page;
mod paged_store;


pub use config::StoreConfig;
pub use error::{StoreError, StoreResult};
pub use frame_cache::{Frame, FrameCache};
pub use page::{Extent, Page, PageTable};
pub use paged_store::{PagedStore, StoreStats};

/// Largest extent a single page may cover, in bytes (8KB)
pub const PAGE_SIZE: usize = 8192;

/// Number of frames kept in memory per store
/// With 100 frames × 8KB = 800KB resident per store, whatever its size
pub const FRAME_COUNT: usize = 100;

/// Page ID type
pub type PageId = usize;
