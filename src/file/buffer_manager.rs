use log::{debug, warn};
use lru::LruCache;
use std::num::NonZeroUsize;
use std::path::Path;

use super::error::{FileError, FileResult};
use super::file_manager::{FileHandle, PagedFileManager};
use super::storage::{PageHandle, PagedStorage};
use super::{BUFFER_POOL_SIZE, PAGE_SIZE, PageId};

/// A key identifying a page in the buffer pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct BufferKey {
    file: FileHandle,
    page_id: PageId,
}

/// Entry in the buffer pool
struct BufferEntry {
    /// The actual page data
    data: Vec<u8>,
    /// Whether this page has been modified
    dirty: bool,
    /// Outstanding pins; a pinned page is never evicted
    pin_count: usize,
}

/// Manages a buffer pool with LRU eviction of unpinned pages
pub struct BufferManager {
    /// Underlying file manager
    file_manager: PagedFileManager,
    /// Combined buffer pool and LRU tracker
    buffer_pool: LruCache<BufferKey, BufferEntry>,
    /// Maximum size of the buffer pool
    max_pool_size: usize,
    /// Reusable buffer for loading pages
    load_buffer: Vec<u8>,
}

impl BufferManager {
    /// Create a new buffer manager
    pub fn new(file_manager: PagedFileManager) -> Self {
        Self::with_capacity(file_manager, BUFFER_POOL_SIZE)
    }

    /// Create a new buffer manager with specified capacity (at least one page)
    pub fn with_capacity(file_manager: PagedFileManager, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            file_manager,
            buffer_pool: LruCache::new(capacity),
            max_pool_size: capacity.get(),
            load_buffer: vec![0u8; PAGE_SIZE],
        }
    }

    /// Get a mutable reference to the file manager
    pub fn file_manager_mut(&mut self) -> &mut PagedFileManager {
        &mut self.file_manager
    }

    /// Pin a page, loading it from disk if necessary
    fn pin_page(&mut self, file: FileHandle, page_id: PageId) -> FileResult<()> {
        let key = BufferKey { file, page_id };

        if self.buffer_pool.peek(&key).is_none() {
            self.load_page(file, page_id)?;
        }

        // get_mut also promotes the page in the LRU order
        let entry = self
            .buffer_pool
            .get_mut(&key)
            .ok_or(FileError::PageNotFound(page_id))?;
        entry.pin_count += 1;
        Ok(())
    }

    /// Look up a page that the caller is required to hold pinned
    fn pinned_entry(&mut self, file: FileHandle, page_id: PageId) -> FileResult<&mut BufferEntry> {
        let key = BufferKey { file, page_id };
        let entry = self
            .buffer_pool
            .peek_mut(&key)
            .ok_or(FileError::PageNotPinned(page_id))?;
        if entry.pin_count == 0 {
            return Err(FileError::PageNotPinned(page_id));
        }
        Ok(entry)
    }

    /// Flush all dirty pages of every file to disk
    pub fn flush_all(&mut self) -> FileResult<()> {
        let dirty_pages: Vec<BufferKey> = self
            .buffer_pool
            .iter()
            .filter(|(_, entry)| entry.dirty)
            .map(|(key, _)| *key)
            .collect();

        for key in dirty_pages {
            if let Some(entry) = self.buffer_pool.peek_mut(&key)
                && entry.dirty
            {
                self.file_manager
                    .write_page(key.file, key.page_id, &entry.data)?;
                entry.dirty = false;
            }
        }

        self.file_manager.sync_all()?;

        Ok(())
    }

    /// Drop every buffered page of a file. Dirty contents must already be flushed.
    fn discard_file_pages(&mut self, file: FileHandle) {
        let keys: Vec<BufferKey> = self
            .buffer_pool
            .iter()
            .filter(|(key, _)| key.file == file)
            .map(|(key, _)| *key)
            .collect();

        for key in keys {
            self.buffer_pool.pop(&key);
        }
    }

    /// Load a page from disk into the buffer pool
    fn load_page(&mut self, file: FileHandle, page_id: PageId) -> FileResult<()> {
        let key = BufferKey { file, page_id };

        while self.buffer_pool.len() >= self.max_pool_size {
            self.evict_unpinned_page()?;
        }

        if self.load_buffer.len() != PAGE_SIZE {
            self.load_buffer = vec![0u8; PAGE_SIZE];
        }

        self.file_manager
            .read_page(file, page_id, &mut self.load_buffer)?;

        let data = std::mem::take(&mut self.load_buffer);

        self.buffer_pool.put(
            key,
            BufferEntry {
                data,
                dirty: false,
                pin_count: 0,
            },
        );

        Ok(())
    }

    /// Evict the least recently used page that nobody holds pinned
    fn evict_unpinned_page(&mut self) -> FileResult<()> {
        let victim = self
            .buffer_pool
            .iter()
            .rev()
            .find(|(_, entry)| entry.pin_count == 0)
            .map(|(key, _)| *key)
            .ok_or(FileError::BufferPoolFull)?;

        if let Some(entry) = self.buffer_pool.peek(&victim)
            && entry.dirty
        {
            self.file_manager
                .write_page(victim.file, victim.page_id, &entry.data)?;
        }

        if let Some(entry) = self.buffer_pool.pop(&victim) {
            // Recycle the evicted buffer for the next load
            self.load_buffer = entry.data;
        }

        Ok(())
    }

    /// Get the number of pages currently in the buffer pool
    pub fn buffer_pool_size(&self) -> usize {
        self.buffer_pool.len()
    }

    /// Check if a page is in the buffer pool
    pub fn is_page_cached(&self, file: FileHandle, page_id: PageId) -> bool {
        let key = BufferKey { file, page_id };
        self.buffer_pool.contains(&key)
    }

    /// Get the number of dirty pages in the buffer pool
    pub fn dirty_page_count(&self) -> usize {
        self.buffer_pool.iter().filter(|(_, e)| e.dirty).count()
    }

    /// Current pin count of a page, 0 if it is not buffered
    pub fn pin_count(&self, file: FileHandle, page_id: PageId) -> usize {
        let key = BufferKey { file, page_id };
        self.buffer_pool.peek(&key).map_or(0, |entry| entry.pin_count)
    }
}

impl PagedStorage for BufferManager {
    fn create_file(&mut self, path: &Path) -> FileResult<()> {
        self.file_manager.create_file(path)
    }

    fn destroy_file(&mut self, path: &Path) -> FileResult<()> {
        self.file_manager.destroy_file(path)
    }

    fn open_file(&mut self, path: &Path) -> FileResult<FileHandle> {
        self.file_manager.open_file(path)
    }

    fn close_file(&mut self, file: FileHandle) -> FileResult<()> {
        if !self.file_manager.is_file_open(file) {
            return Err(FileError::InvalidHandle(file.as_usize()));
        }

        let pinned = self
            .buffer_pool
            .iter()
            .find(|(key, entry)| key.file == file && entry.pin_count > 0)
            .map(|(key, _)| key.page_id);
        let unpinned = match pinned {
            Some(page_id) => {
                warn!(
                    "closing file handle {} while page {} is still pinned",
                    file.as_usize(),
                    page_id
                );
                Err(FileError::PagePinned(page_id))
            }
            None => Ok(()),
        };

        // The table entry is released even when the flush fails
        let flushed = self.flush_pages(file);
        if let Err(e) = &flushed {
            warn!(
                "flush before closing file handle {} failed: {}",
                file.as_usize(),
                e
            );
        }
        self.discard_file_pages(file);
        let closed = self.file_manager.close_file(file);

        unpinned.and(flushed).and(closed)
    }

    fn allocate_page(&mut self, file: FileHandle) -> FileResult<PageHandle> {
        let page_id = self.file_manager.get_page_count(file)?;

        // Extend the file so the page exists on disk before it is pinned
        self.file_manager
            .write_page(file, page_id, &vec![0u8; PAGE_SIZE])?;
        self.pin_page(file, page_id)?;

        debug!("allocated page {} in file handle {}", page_id, file.as_usize());
        Ok(PageHandle::new(file, page_id))
    }

    fn get_first_page(&mut self, file: FileHandle) -> FileResult<PageHandle> {
        if !self.is_page_cached(file, 0) && self.file_manager.get_page_count(file)? == 0 {
            return Err(FileError::PageNotFound(0));
        }

        self.pin_page(file, 0)?;
        Ok(PageHandle::new(file, 0))
    }

    fn page_data(&mut self, page: &PageHandle) -> FileResult<&mut [u8]> {
        let entry = self.pinned_entry(page.file(), page.page_num())?;
        Ok(entry.data.as_mut_slice())
    }

    fn mark_dirty(&mut self, file: FileHandle, page_id: PageId) -> FileResult<()> {
        let entry = self.pinned_entry(file, page_id)?;
        entry.dirty = true;
        Ok(())
    }

    fn unpin_page(&mut self, file: FileHandle, page_id: PageId) -> FileResult<()> {
        let entry = self.pinned_entry(file, page_id)?;
        entry.pin_count -= 1;
        Ok(())
    }

    fn flush_pages(&mut self, file: FileHandle) -> FileResult<()> {
        let dirty_pages: Vec<BufferKey> = self
            .buffer_pool
            .iter()
            .filter(|(key, entry)| key.file == file && entry.dirty)
            .map(|(key, _)| *key)
            .collect();

        for key in dirty_pages {
            if let Some(entry) = self.buffer_pool.peek_mut(&key) {
                self.file_manager
                    .write_page(key.file, key.page_id, &entry.data)?;
                entry.dirty = false;
            }
        }

        self.file_manager.sync_file(file)
    }

    fn pinned_page_count(&self) -> usize {
        self.buffer_pool.iter().map(|(_, e)| e.pin_count).sum()
    }

    fn is_file_open(&self, file: FileHandle) -> bool {
        self.file_manager.is_file_open(file)
    }

    fn open_file_count(&self) -> usize {
        self.file_manager.open_file_count()
    }
}

impl Drop for BufferManager {
    fn drop(&mut self) {
        // Flush all dirty pages when the buffer manager is dropped
        let _ = self.flush_all();
    }
}
