use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use log::debug;

use super::error::{FileError, FileResult};
use super::{MAX_OPEN_FILES, PAGE_SIZE, PageId};

/// Handle to an open file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileHandle(usize);

impl FileHandle {
    pub fn as_usize(&self) -> usize {
        self.0
    }
}

/// Manages paged file operations
pub struct PagedFileManager {
    /// Map from file handles to open files
    open_files: HashMap<FileHandle, FileEntry>,
    /// Map from file paths to handles (for checking if already open)
    path_to_handle: HashMap<PathBuf, FileHandle>,
    /// Next available file handle
    next_handle: usize,
    /// Maximum number of open files
    max_open_files: usize,
}

struct FileEntry {
    file: File,
    path: PathBuf,
}

impl PagedFileManager {
    /// Create a new paged file manager
    pub fn new() -> Self {
        Self::with_max_files(MAX_OPEN_FILES)
    }

    /// Create a new paged file manager with specified max open files
    pub fn with_max_files(max_open_files: usize) -> Self {
        Self {
            open_files: HashMap::new(),
            path_to_handle: HashMap::new(),
            next_handle: 0,
            max_open_files,
        }
    }

    /// Create a new, empty file. An existing file is never truncated.
    pub fn create_file<P: AsRef<Path>>(&mut self, path: P) -> FileResult<()> {
        let path = path.as_ref();

        // Create parent directories if they don't exist
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        // create_new fails atomically if the file is already there
        OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|e| match e.kind() {
                ErrorKind::AlreadyExists => {
                    FileError::FileAlreadyExists(path.display().to_string())
                }
                _ => FileError::Io(e),
            })?;

        debug!("created paged file {}", path.display());
        Ok(())
    }

    /// Open an existing file. A path may only be open once at a time.
    pub fn open_file<P: AsRef<Path>>(&mut self, path: P) -> FileResult<FileHandle> {
        let path_ref = path.as_ref();
        let path = path_ref
            .canonicalize()
            .map_err(|_| FileError::FileNotFound(path_ref.display().to_string()))?;

        // A path is owned by at most one handle
        if self.path_to_handle.contains_key(&path) {
            return Err(FileError::FileAlreadyOpen(path.display().to_string()));
        }

        // Check if we've reached the max open files limit
        if self.open_files.len() >= self.max_open_files {
            return Err(FileError::TooManyOpenFiles);
        }

        // Open the file for reading and writing
        let file = OpenOptions::new().read(true).write(true).open(&path)?;

        let handle = FileHandle(self.next_handle);
        self.next_handle += 1;

        debug!("opened paged file {} as handle {}", path.display(), handle.0);
        self.open_files.insert(
            handle,
            FileEntry {
                file,
                path: path.clone(),
            },
        );
        self.path_to_handle.insert(path, handle);

        Ok(handle)
    }

    /// Close a file
    pub fn close_file(&mut self, handle: FileHandle) -> FileResult<()> {
        let entry = self
            .open_files
            .remove(&handle)
            .ok_or(FileError::InvalidHandle(handle.0))?;

        // Dropping the entry closes the underlying file
        self.path_to_handle.remove(&entry.path);
        debug!("closed paged file handle {}", handle.0);
        Ok(())
    }

    /// Delete a file from disk. Open files are refused.
    pub fn destroy_file<P: AsRef<Path>>(&mut self, path: P) -> FileResult<()> {
        let path_ref = path.as_ref();
        let path = path_ref
            .canonicalize()
            .map_err(|_| FileError::FileNotFound(path_ref.display().to_string()))?;

        // Refuse to delete a file that is still open
        if self.path_to_handle.contains_key(&path) {
            return Err(FileError::FileOpen(path.display().to_string()));
        }

        std::fs::remove_file(&path)?;
        debug!("destroyed paged file {}", path.display());
        Ok(())
    }

    /// Read a page from a file
    pub fn read_page(
        &mut self,
        handle: FileHandle,
        page_id: PageId,
        buffer: &mut [u8],
    ) -> FileResult<()> {
        if buffer.len() != PAGE_SIZE {
            return Err(FileError::InvalidPageSize {
                expected: PAGE_SIZE,
                actual: buffer.len(),
            });
        }

        let entry = self
            .open_files
            .get_mut(&handle)
            .ok_or(FileError::InvalidHandle(handle.0))?;

        let offset = (page_id * PAGE_SIZE) as u64;
        entry.file.seek(SeekFrom::Start(offset))?;

        let bytes_read = entry.file.read(buffer)?;

        // Short reads past the end of file come back zeroed
        if bytes_read < PAGE_SIZE {
            buffer[bytes_read..].fill(0);
        }

        Ok(())
    }

    /// Write a page to a file
    pub fn write_page(&mut self, handle: FileHandle, page_id: PageId, buffer: &[u8]) -> FileResult<()> {
        if buffer.len() != PAGE_SIZE {
            return Err(FileError::InvalidPageSize {
                expected: PAGE_SIZE,
                actual: buffer.len(),
            });
        }

        let entry = self
            .open_files
            .get_mut(&handle)
            .ok_or(FileError::InvalidHandle(handle.0))?;

        let offset = (page_id * PAGE_SIZE) as u64;
        let required_size = offset + PAGE_SIZE as u64;

        // Extend file if necessary to ensure we can write at this offset
        let current_size = entry.file.metadata()?.len();
        if current_size < required_size {
            entry.file.set_len(required_size)?;
        }

        entry.file.seek(SeekFrom::Start(offset))?;
        entry.file.write_all(buffer)?;
        // No sync here; flush_pages and sync_all decide when data reaches the disk

        Ok(())
    }

    /// Get the number of pages in a file
    pub fn get_page_count(&mut self, handle: FileHandle) -> FileResult<usize> {
        let entry = self
            .open_files
            .get_mut(&handle)
            .ok_or(FileError::InvalidHandle(handle.0))?;

        let file_size = entry.file.metadata()?.len();
        let page_count = file_size.div_ceil(PAGE_SIZE as u64) as usize;
        Ok(page_count)
    }

    /// Sync a file to disk (flush all OS buffers)
    pub fn sync_file(&mut self, handle: FileHandle) -> FileResult<()> {
        let entry = self
            .open_files
            .get_mut(&handle)
            .ok_or(FileError::InvalidHandle(handle.0))?;

        entry.file.sync_data()?;
        Ok(())
    }

    /// Sync all open files to disk
    pub fn sync_all(&mut self) -> FileResult<()> {
        for entry in self.open_files.values_mut() {
            entry.file.sync_data()?;
        }
        Ok(())
    }

    /// Check if a file is open
    pub fn is_file_open(&self, handle: FileHandle) -> bool {
        self.open_files.contains_key(&handle)
    }

    /// Get the number of currently open files
    pub fn open_file_count(&self) -> usize {
        self.open_files.len()
    }
}

impl Default for PagedFileManager {
    fn default() -> Self {
        Self::new()
    }
}
