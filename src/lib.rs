pub mod edit;
pub mod script;
pub mod shell;
pub mod store;

pub use edit::{Document, EditCommand, EditError, EditKind, EditResult, History};
pub use shell::{Shell, ShellError, ShellResult};
pub use store::{
    FRAME_COUNT, Extent, Frame, FrameCache, PAGE_SIZE, Page, PageId, PageTable, PagedStore,
    StoreConfig, StoreError, StoreResult, StoreStats,
};
