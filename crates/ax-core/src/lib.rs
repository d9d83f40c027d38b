//! # ax-core
//!
//! Core domain models, ports and the transfer-source streaming engine.
//!
//! This crate holds no infrastructure: stores, workers, fetch services and
//! the registry are plugged in through [`ports`].

pub mod blob;
pub mod config;
pub mod ids;
pub mod ports;
pub mod transfer;
pub mod vfile;

#[cfg(test)]
mod test_support;

// Re-export commonly used types at the crate root
pub use blob::{BlobKey, BlobType};
pub use config::TransferConfig;
pub use ids::{BlobId, TransferId};
pub use transfer::{PacketResponse, TransferSource, TransferStatus};
pub use vfile::{OpenMode, VirtualFile};
