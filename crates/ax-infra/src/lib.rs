pub mod fetch;
pub mod store;
pub mod transfer;
pub mod vfs;

pub use fetch::CachingFetchService;
pub use store::{FsBlockStore, MemoryBlockStore};
pub use transfer::FileTransferSource;
pub use vfs::VfsWorker;
