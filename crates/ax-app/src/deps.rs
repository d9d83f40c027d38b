//! # Transfer Dependencies / 传输依赖
//!
//! Dependency grouping for [`crate::TransferManager`] construction.
//! Not a builder: no defaults, no hidden logic, just parameters.

use std::sync::{Arc, Weak};

use ax_core::ports::{BlobStorePort, FetchServicePort, TransferRegistryPort};
use ax_core::transfer::TransferSource;
use ax_core::TransferId;

/// Builds a source for a transfer kind the core does not own (file sources
/// live next to the filesystem they serve).
pub type SourceFactory = Arc<
    dyn Fn(TransferId, f32, Weak<dyn TransferRegistryPort>) -> Box<dyn TransferSource>
        + Send
        + Sync,
>;

pub struct TransferDeps {
    // Storage / 存储
    pub store: Arc<dyn BlobStorePort>,
    pub fetch: Arc<dyn FetchServicePort>,

    // Optional source kinds / 可选来源类型
    pub file_sources: Option<SourceFactory>,
}
