//! Scoped ownership of engine resources.
//!
//! An open file and a pinned page are each released when their guard goes out
//! of scope, on success and error paths alike. A `PinnedPage` mutably borrows
//! the storage it was pinned from, so it is always released before the
//! `OpenFileGuard` that produced it can close the file.

use log::warn;
use std::path::Path;

use super::error::FileResult;
use super::file_manager::FileHandle;
use super::storage::{PageHandle, PagedStorage};
use super::PageId;

/// An open file that is closed on drop unless ownership is handed off
pub struct OpenFileGuard<'a, S: PagedStorage + ?Sized> {
    storage: &'a mut S,
    file: FileHandle,
    open: bool,
}

impl<'a, S: PagedStorage + ?Sized> OpenFileGuard<'a, S> {
    pub fn open(storage: &'a mut S, path: &Path) -> FileResult<Self> {
        let file = storage.open_file(path)?;
        Ok(Self {
            storage,
            file,
            open: true,
        })
    }

    pub fn file(&self) -> FileHandle {
        self.file
    }

    /// Allocate and pin a new page of this file
    pub fn allocate_page(&mut self) -> FileResult<PinnedPage<'_, S>> {
        PinnedPage::allocate(&mut *self.storage, self.file)
    }

    /// Pin the first page of this file
    pub fn first_page(&mut self) -> FileResult<PinnedPage<'_, S>> {
        PinnedPage::first(&mut *self.storage, self.file)
    }

    pub fn flush(&mut self) -> FileResult<()> {
        self.storage.flush_pages(self.file)
    }

    /// Close the file now and report the engine's result. If the engine
    /// reports an error the guard stays armed and drop tries the close again.
    pub fn close(mut self) -> FileResult<()> {
        let result = self.storage.close_file(self.file);
        if result.is_ok() {
            self.open = false;
        }
        result
    }

    /// Keep the file open and hand its handle to the caller
    pub fn into_file(mut self) -> FileHandle {
        self.open = false;
        self.file
    }
}

impl<S: PagedStorage + ?Sized> Drop for OpenFileGuard<'_, S> {
    fn drop(&mut self) {
        if self.open
            && let Err(e) = self.storage.close_file(self.file)
        {
            warn!("failed to close file handle {}: {}", self.file.as_usize(), e);
        }
    }
}

/// A pinned page that is unpinned on drop unless already unpinned explicitly
pub struct PinnedPage<'a, S: PagedStorage + ?Sized> {
    storage: &'a mut S,
    page: PageHandle,
    pinned: bool,
}

impl<'a, S: PagedStorage + ?Sized> PinnedPage<'a, S> {
    pub fn allocate(storage: &'a mut S, file: FileHandle) -> FileResult<Self> {
        let page = storage.allocate_page(file)?;
        Ok(Self {
            storage,
            page,
            pinned: true,
        })
    }

    pub fn first(storage: &'a mut S, file: FileHandle) -> FileResult<Self> {
        let page = storage.get_first_page(file)?;
        Ok(Self {
            storage,
            page,
            pinned: true,
        })
    }

    pub fn page_num(&self) -> PageId {
        self.page.page_num()
    }

    pub fn data(&mut self) -> FileResult<&mut [u8]> {
        self.storage.page_data(&self.page)
    }

    pub fn mark_dirty(&mut self) -> FileResult<()> {
        self.storage.mark_dirty(self.page.file(), self.page.page_num())
    }

    /// Release the pin now. On an engine error the guard stays armed, so drop
    /// makes one more attempt before the borrow of the storage ends.
    pub fn unpin(mut self) -> FileResult<()> {
        let result = self
            .storage
            .unpin_page(self.page.file(), self.page.page_num());
        if result.is_ok() {
            self.pinned = false;
        }
        result
    }
}

impl<S: PagedStorage + ?Sized> Drop for PinnedPage<'_, S> {
    fn drop(&mut self) {
        if self.pinned
            && let Err(e) = self
                .storage
                .unpin_page(self.page.file(), self.page.page_num())
        {
            warn!(
                "failed to unpin page {} of file handle {}: {}",
                self.page.page_num(),
                self.page.file().as_usize(),
                e
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::{BufferManager, FileError, PagedFileManager};
    use std::io;
    use tempfile::TempDir;

    /// Engine whose first unpin and first close report an error without acting
    struct FailFirstRelease {
        inner: BufferManager,
        unpin_failures: usize,
        close_failures: usize,
    }

    impl FailFirstRelease {
        fn new() -> Self {
            Self {
                inner: BufferManager::new(PagedFileManager::new()),
                unpin_failures: 1,
                close_failures: 1,
            }
        }
    }

    fn transient(what: &str) -> FileError {
        FileError::Io(io::Error::other(format!("transient {} failure", what)))
    }

    impl PagedStorage for FailFirstRelease {
        fn create_file(&mut self, path: &Path) -> FileResult<()> {
            self.inner.create_file(path)
        }

        fn destroy_file(&mut self, path: &Path) -> FileResult<()> {
            self.inner.destroy_file(path)
        }

        fn open_file(&mut self, path: &Path) -> FileResult<FileHandle> {
            self.inner.open_file(path)
        }

        fn close_file(&mut self, file: FileHandle) -> FileResult<()> {
            if self.close_failures > 0 {
                self.close_failures -= 1;
                return Err(transient("close"));
            }
            self.inner.close_file(file)
        }

        fn allocate_page(&mut self, file: FileHandle) -> FileResult<PageHandle> {
            self.inner.allocate_page(file)
        }

        fn get_first_page(&mut self, file: FileHandle) -> FileResult<PageHandle> {
            self.inner.get_first_page(file)
        }

        fn page_data(&mut self, page: &PageHandle) -> FileResult<&mut [u8]> {
            self.inner.page_data(page)
        }

        fn mark_dirty(&mut self, file: FileHandle, page_id: PageId) -> FileResult<()> {
            self.inner.mark_dirty(file, page_id)
        }

        fn unpin_page(&mut self, file: FileHandle, page_id: PageId) -> FileResult<()> {
            if self.unpin_failures > 0 {
                self.unpin_failures -= 1;
                return Err(transient("unpin"));
            }
            self.inner.unpin_page(file, page_id)
        }

        fn flush_pages(&mut self, file: FileHandle) -> FileResult<()> {
            self.inner.flush_pages(file)
        }

        fn pinned_page_count(&self) -> usize {
            self.inner.pinned_page_count()
        }

        fn is_file_open(&self, file: FileHandle) -> bool {
            self.inner.is_file_open(file)
        }

        fn open_file_count(&self) -> usize {
            self.inner.open_file_count()
        }
    }

    fn setup_test_env() -> (TempDir, BufferManager, std::path::PathBuf) {
        let temp_dir = tempfile::tempdir().unwrap();
        let test_file = temp_dir.path().join("orders.tbl");
        let mut bm = BufferManager::new(PagedFileManager::new());
        bm.create_file(&test_file).unwrap();
        (temp_dir, bm, test_file)
    }

    #[test]
    fn test_dropped_guards_release_everything() {
        let (_temp_dir, mut bm, path) = setup_test_env();

        {
            let mut file = OpenFileGuard::open(&mut bm, &path).unwrap();
            let page = file.allocate_page().unwrap();
            assert_eq!(page.page_num(), 0);
        }

        assert_eq!(bm.pinned_page_count(), 0);
        assert_eq!(bm.open_file_count(), 0);
    }

    #[test]
    fn test_explicit_unpin_is_not_repeated() {
        let (_temp_dir, mut bm, path) = setup_test_env();

        let handle = {
            let mut file = OpenFileGuard::open(&mut bm, &path).unwrap();
            let mut page = file.allocate_page().unwrap();
            page.data().unwrap()[0] = 1;
            page.mark_dirty().unwrap();
            page.unpin().unwrap();
            file.into_file()
        };

        assert_eq!(bm.pinned_page_count(), 0);
        assert!(bm.is_file_open(handle));
        bm.close_file(handle).unwrap();
    }

    #[test]
    fn test_close_reports_engine_result() {
        let (_temp_dir, mut bm, path) = setup_test_env();

        let mut file = OpenFileGuard::open(&mut bm, &path).unwrap();
        assert!(file.first_page().is_err());
        {
            let mut page = file.allocate_page().unwrap();
            page.mark_dirty().unwrap();
        }
        assert_eq!(file.first_page().unwrap().page_num(), 0);
        file.flush().unwrap();
        file.close().unwrap();

        assert_eq!(bm.open_file_count(), 0);
    }

    #[test]
    fn test_open_failure_leaves_nothing_open() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut bm = BufferManager::new(PagedFileManager::new());

        let missing = temp_dir.path().join("missing.tbl");
        assert!(OpenFileGuard::open(&mut bm, &missing).is_err());
        assert_eq!(bm.open_file_count(), 0);
    }

    #[test]
    fn test_failed_unpin_retried_on_drop() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("orders.tbl");
        let mut storage = FailFirstRelease::new();
        storage.create_file(&path).unwrap();

        {
            let mut file = OpenFileGuard::open(&mut storage, &path).unwrap();
            let page = file.allocate_page().unwrap();
            assert!(page.unpin().is_err());
            assert!(file.close().is_err());
        }

        assert_eq!(storage.pinned_page_count(), 0);
        assert_eq!(storage.open_file_count(), 0);
        storage.destroy_file(&path).unwrap();
    }

    #[test]
    fn test_failed_close_retried_on_drop() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("orders.tbl");
        let mut storage = FailFirstRelease::new();
        storage.unpin_failures = 0;
        storage.create_file(&path).unwrap();

        let file = OpenFileGuard::open(&mut storage, &path).unwrap();
        assert!(file.close().is_err());

        assert_eq!(storage.open_file_count(), 0);
    }
}
