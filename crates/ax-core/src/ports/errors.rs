use thiserror::Error;

use crate::blob::BlobKey;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("blob {0} not found")]
    NotFound(BlobKey),

    #[error("blob {0} already exists")]
    AlreadyExists(BlobKey),

    #[error("write of {len} bytes at {offset} exceeds max size {max_size} of blob {key}")]
    ExceedsMaxSize {
        key: BlobKey,
        offset: u64,
        len: usize,
        max_size: u64,
    },

    #[error("blob {0} is locked")]
    Locked(BlobKey),

    #[error("store i/o error: {0}")]
    Io(String),
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io(err.to_string())
    }
}
