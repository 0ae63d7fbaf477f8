use std::path::Path;

use super::error::FileResult;
use super::file_manager::FileHandle;
use super::PageId;

/// A page pinned in the buffer pool, as returned by `allocate_page` and
/// `get_first_page`. Holding a `PageHandle` does not keep the page pinned;
/// the pin is released with `PagedStorage::unpin_page`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageHandle {
    file: FileHandle,
    page_id: PageId,
}

impl PageHandle {
    pub fn new(file: FileHandle, page_id: PageId) -> Self {
        Self { file, page_id }
    }

    pub fn file(&self) -> FileHandle {
        self.file
    }

    pub fn page_num(&self) -> PageId {
        self.page_id
    }
}

/// Page-level storage capability consumed by the record layer.
///
/// Every page handed out by `allocate_page` or `get_first_page` is pinned and
/// must be released by exactly one `unpin_page` call.
pub trait PagedStorage {
    fn create_file(&mut self, path: &Path) -> FileResult<()>;

    fn destroy_file(&mut self, path: &Path) -> FileResult<()>;

    fn open_file(&mut self, path: &Path) -> FileResult<FileHandle>;

    /// Flush and close a file. Fails if any page of the file is still pinned.
    fn close_file(&mut self, file: FileHandle) -> FileResult<()>;

    /// Append a zeroed page to the file and pin it
    fn allocate_page(&mut self, file: FileHandle) -> FileResult<PageHandle>;

    /// Pin page 0 of the file
    fn get_first_page(&mut self, file: FileHandle) -> FileResult<PageHandle>;

    /// Writable view of a pinned page, exactly `PAGE_SIZE` bytes
    fn page_data(&mut self, page: &PageHandle) -> FileResult<&mut [u8]>;

    fn mark_dirty(&mut self, file: FileHandle, page_id: PageId) -> FileResult<()>;

    fn unpin_page(&mut self, file: FileHandle, page_id: PageId) -> FileResult<()>;

    /// Write every dirty page of the file back to disk
    fn flush_pages(&mut self, file: FileHandle) -> FileResult<()>;

    /// Total pins currently held across all files
    fn pinned_page_count(&self) -> usize;

    fn is_file_open(&self, file: FileHandle) -> bool;

    fn open_file_count(&self) -> usize;
}
