use thiserror::Error;

use crate::ports::StoreError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VfsError {
    #[error("handle was not opened for reading")]
    NotReadable,

    #[error("handle was not opened for writing")]
    NotWritable,

    #[error("seek to {requested} outside of 0..={size}")]
    SeekOutOfRange { requested: i128, size: u64 },

    #[error("an async read is still outstanding on this handle")]
    ReadPending,

    #[error("no read has completed on this handle")]
    NoReadResult,

    #[error("vfs worker went away before completing the read")]
    WorkerGone,

    #[error(transparent)]
    Store(#[from] StoreError),
}
