pub mod file;
pub mod record;

pub use file::{
    BUFFER_POOL_SIZE, BufferManager, FileError, FileHandle, FileResult, MAX_OPEN_FILES, PAGE_SIZE,
    PageHandle, PagedFileManager, PagedStorage,
};
pub use record::{
    FileOp, PageOp, RecordError, RecordFileHandle, RecordFileHeader, RecordFileManager,
    RecordResult,
};
