use log::{debug, info, warn};
use std::path::Path;

use super::error::{FileOp, PageOp, RecordError, RecordResult};
use super::file_handle::RecordFileHandle;
use super::header::RecordFileHeader;
use crate::file::{FileHandle, OpenFileGuard, PagedStorage, PinnedPage};

/// Creates, destroys, opens and closes record files on top of a paged storage engine
pub struct RecordFileManager<S: PagedStorage> {
    storage: S,
}

impl<S: PagedStorage> RecordFileManager<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    pub fn into_storage(self) -> S {
        self.storage
    }

    /// Create a record file holding records of `record_size` bytes.
    ///
    /// Either the file ends up on disk with a flushed header page, or no file
    /// is left behind: a failure after the engine created the file destroys it.
    pub fn create_file<P: AsRef<Path>>(&mut self, path: P, record_size: usize) -> RecordResult<()> {
        let path = path.as_ref();
        let header = RecordFileHeader::new(record_size)?;

        self.storage
            .create_file(path)
            .map_err(RecordError::file(FileOp::Create))?;

        if let Err(e) = Self::write_new_header(&mut self.storage, path, &header) {
            if let Err(cleanup) = self.storage.destroy_file(path) {
                warn!(
                    "could not remove partially created {}: {}",
                    path.display(),
                    cleanup
                );
            }
            return Err(e);
        }

        info!(
            "created record file {} with record size {}",
            path.display(),
            record_size
        );
        Ok(())
    }

    fn write_new_header(
        storage: &mut S,
        path: &Path,
        header: &RecordFileHeader,
    ) -> RecordResult<()> {
        let mut file =
            OpenFileGuard::open(storage, path).map_err(RecordError::file(FileOp::Open))?;

        {
            let mut page = file
                .allocate_page()
                .map_err(RecordError::page(PageOp::Allocate))?;
            debug!(
                "allocated header page {} for {}",
                page.page_num(),
                path.display()
            );

            let data = page.data().map_err(RecordError::page(PageOp::GetData))?;
            header.write_to(data)?;

            page.mark_dirty().map_err(RecordError::page(PageOp::MarkDirty))?;
            page.unpin().map_err(RecordError::page(PageOp::Unpin))?;
        }

        file.flush().map_err(RecordError::page(PageOp::Flush))?;
        file.close().map_err(RecordError::file(FileOp::Close))
    }

    /// Delete a record file. The file must not be open.
    pub fn destroy_file<P: AsRef<Path>>(&mut self, path: P) -> RecordResult<()> {
        let path = path.as_ref();
        self.storage
            .destroy_file(path)
            .map_err(RecordError::file(FileOp::Destroy))?;
        info!("destroyed record file {}", path.display());
        Ok(())
    }

    /// Open a record file and cache its header.
    ///
    /// The header page is unpinned before the handle is returned; on any
    /// failure the file is closed again and no handle is produced.
    pub fn open_file<P: AsRef<Path>>(&mut self, path: P) -> RecordResult<RecordFileHandle> {
        let path = path.as_ref();
        let mut file = OpenFileGuard::open(&mut self.storage, path)
            .map_err(RecordError::file(FileOp::Open))?;

        let mut page = file
            .first_page()
            .map_err(RecordError::page(PageOp::GetFirstPage))?;
        let data = page.data().map_err(RecordError::page(PageOp::GetData))?;
        let header = RecordFileHeader::deserialize(data)?;
        page.unpin().map_err(RecordError::page(PageOp::Unpin))?;

        let handle = RecordFileHandle::new(header, file.into_file());
        info!(
            "opened record file {} (record size {})",
            path.display(),
            handle.record_size()
        );
        Ok(handle)
    }

    /// Close a record file, writing the cached header back first if it changed.
    ///
    /// The handle is consumed and the engine releases the file whatever the
    /// outcome. If both the write-back and the close fail, the write-back error
    /// is reported.
    pub fn close_file(&mut self, handle: RecordFileHandle) -> RecordResult<()> {
        let (header, header_dirty, file) = handle.into_parts();

        let written = if header_dirty {
            Self::write_back_header(&mut self.storage, file, &header)
        } else {
            Ok(())
        };

        let closed = self
            .storage
            .close_file(file)
            .map_err(RecordError::file(FileOp::Close));

        if let Err(e) = &closed {
            warn!("closing record file handle {} failed: {}", file.as_usize(), e);
        } else {
            info!("closed record file handle {}", file.as_usize());
        }

        written.and(closed)
    }

    fn write_back_header(
        storage: &mut S,
        file: FileHandle,
        header: &RecordFileHeader,
    ) -> RecordResult<()> {
        let mut page =
            PinnedPage::first(storage, file).map_err(RecordError::page(PageOp::GetFirstPage))?;
        let data = page.data().map_err(RecordError::page(PageOp::GetData))?;
        header.write_to(data)?;
        page.mark_dirty().map_err(RecordError::page(PageOp::MarkDirty))?;
        page.unpin().map_err(RecordError::page(PageOp::Unpin))?;
        debug!("wrote back header of file handle {}", file.as_usize());
        Ok(())
    }
}
