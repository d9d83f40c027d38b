use std::sync::atomic::AtomicU32;
use std::sync::Arc;

use tokio::sync::oneshot;

use crate::blob::BlobKey;

use super::blob_store::BlobStorePort;
use super::errors::StoreError;

pub type ReadReply = oneshot::Receiver<Result<Vec<u8>, StoreError>>;

/// One queued read.
pub struct VfsReadJob {
    pub store: Arc<dyn BlobStorePort>,
    pub key: BlobKey,
    pub offset: u64,
    pub len: usize,
    /// Already mapped into the worker band, see `vfile::thread_priority`.
    /// Shared with the issuing handle so it can be bumped while queued.
    pub priority: Arc<AtomicU32>,
}

/// Background executor for virtual file reads.
///
/// Priority only changes how soon a job runs.
pub trait VfsWorkerPort: Send + Sync {
    fn submit_read(&self, job: VfsReadJob) -> ReadReply;
}
