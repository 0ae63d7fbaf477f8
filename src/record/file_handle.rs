use super::header::RecordFileHeader;
use crate::file::{FileHandle, PAGE_SIZE};

/// An open record file.
///
/// Owns the engine's file handle until it is passed back to
/// `RecordFileManager::close_file`, which consumes it.
#[derive(Debug)]
#[must_use = "a record file handle must be closed with RecordFileManager::close_file"]
pub struct RecordFileHandle {
    header: RecordFileHeader,
    header_dirty: bool,
    file: FileHandle,
}

impl RecordFileHandle {
    pub(crate) fn new(header: RecordFileHeader, file: FileHandle) -> Self {
        Self {
            header,
            header_dirty: false,
            file,
        }
    }

    pub(crate) fn into_parts(self) -> (RecordFileHeader, bool, FileHandle) {
        (self.header, self.header_dirty, self.file)
    }

    /// Cached header, as loaded when the file was opened
    pub fn header(&self) -> &RecordFileHeader {
        &self.header
    }

    /// Mutable access to the cached header. Marks it for write-back on close.
    /// The record size stays read-only; only the reserved fields can change.
    pub fn header_mut(&mut self) -> &mut RecordFileHeader {
        self.header_dirty = true;
        &mut self.header
    }

    pub fn is_header_dirty(&self) -> bool {
        self.header_dirty
    }

    pub fn record_size(&self) -> usize {
        self.header.record_size()
    }

    /// Number of fixed-size records that fit in one page
    pub fn records_per_page(&self) -> usize {
        PAGE_SIZE / self.header.record_size()
    }

    pub fn file(&self) -> FileHandle {
        self.file
    }
}
