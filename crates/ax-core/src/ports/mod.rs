//! Port interfaces for the transfer engine
//!
//! Ports define the contract between the streaming logic and the stores,
//! fetch services and registries it is plugged into. Implementations live in
//! `ax-infra` (stores, worker, fetch) and `ax-app` (registry).

mod blob_store;
pub mod errors;
mod fetch;
mod transfer_registry;
mod vfs_worker;

pub use blob_store::{BlobStorePort, LockKind};
pub use errors::StoreError;
pub use fetch::{
    FetchCallback, FetchCompletion, FetchRequest, FetchResult, FetchServicePort, FetchToken,
};
pub use transfer_registry::TransferRegistryPort;
pub use vfs_worker::{ReadReply, VfsReadJob, VfsWorkerPort};

#[cfg(test)]
pub use blob_store::MockBlobStore;
