//! Block store adapters.

pub mod fs;
mod locks;
pub mod memory;

pub use fs::FsBlockStore;
pub use locks::LockTable;
pub use memory::MemoryBlockStore;
