mod error;
mod file_handle;
mod header;
mod manager;

pub use error::{FileOp, PageOp, RecordError, RecordResult};
pub use file_handle::RecordFileHandle;
pub use header::RecordFileHeader;
pub use manager::RecordFileManager;
