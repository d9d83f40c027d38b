//! Transfer source kinds backed by infrastructure outside the block store.

mod file_source;

pub use file_source::FileTransferSource;
