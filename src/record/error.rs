use crate::file::FileError;
use std::fmt;
use thiserror::Error;

/// File-level engine call that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOp {
    Create,
    Open,
    Close,
    Destroy,
}

impl fmt::Display for FileOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FileOp::Create => "create",
            FileOp::Open => "open",
            FileOp::Close => "close",
            FileOp::Destroy => "destroy",
        };
        f.write_str(name)
    }
}

/// Page-level engine call that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageOp {
    Allocate,
    GetFirstPage,
    GetData,
    MarkDirty,
    Unpin,
    Flush,
}

impl fmt::Display for PageOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PageOp::Allocate => "allocate page",
            PageOp::GetFirstPage => "get first page",
            PageOp::GetData => "get page data",
            PageOp::MarkDirty => "mark dirty",
            PageOp::Unpin => "unpin page",
            PageOp::Flush => "flush pages",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("Record size {record_size} exceeds page capacity {capacity}")]
    OversizeRecord { record_size: usize, capacity: usize },

    #[error("Invalid record size: {0}")]
    InvalidRecordSize(usize),

    #[error("File operation failed ({op}): {source}")]
    FileOperationFailed {
        op: FileOp,
        #[source]
        source: FileError,
    },

    #[error("Page operation failed ({op}): {source}")]
    PageOperationFailed {
        op: PageOp,
        #[source]
        source: FileError,
    },

    #[error("Corrupt record file header: {0}")]
    CorruptHeader(String),
}

impl RecordError {
    pub fn file(op: FileOp) -> impl FnOnce(FileError) -> Self {
        move |source| RecordError::FileOperationFailed { op, source }
    }

    pub fn page(op: PageOp) -> impl FnOnce(FileError) -> Self {
        move |source| RecordError::PageOperationFailed { op, source }
    }
}

pub type RecordResult<T> = Result<T, RecordError>;
