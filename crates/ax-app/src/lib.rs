//! assetxfer application layer
//!
//! Hosts the transfer registry that drives sources, plus the use cases built
//! on top of it.

pub mod deps;
pub mod transfer_manager;
pub mod usecases;

pub use deps::{SourceFactory, TransferDeps};
pub use transfer_manager::{PullOutcome, TransferEvent, TransferManager, TransferManagerError};
pub use usecases::{StreamBlob, StreamReport};
