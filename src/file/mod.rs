mod buffer_manager;
mod error;
mod file_manager;
mod guard;
mod storage;

pub use buffer_manager::BufferManager;
pub use error::{FileError, FileResult};
pub use file_manager::{FileHandle, PagedFileManager};
pub use guard::{OpenFileGuard, PinnedPage};
pub use storage::{PageHandle, PagedStorage};

/// Page size in bytes (8KB)
pub const PAGE_SIZE: usize = 8192;

/// Number of pages in the buffer pool
pub const BUFFER_POOL_SIZE: usize = 1024;

/// Default limit on simultaneously open files
pub const MAX_OPEN_FILES: usize = 128;

/// Page ID type
pub type PageId = usize;
