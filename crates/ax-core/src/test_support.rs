//! In-crate fakes shared by unit tests.

use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::Mutex;

use crate::blob::BlobKey;
use crate::ids::TransferId;
use crate::ports::{
    BlobStorePort, FetchCallback, FetchCompletion, FetchRequest, FetchResult, FetchServicePort,
    LockKind, ReadReply, StoreError, TransferRegistryPort, VfsReadJob, VfsWorkerPort,
};
use crate::transfer::{AssetTransferSource, TransferSource, TransferStatus};

#[derive(Default)]
struct Block {
    data: Vec<u8>,
    max_size: u64,
}

/// Minimal map-backed store.
#[derive(Default)]
pub struct MapStore {
    blocks: Mutex<HashMap<BlobKey, Block>>,
    locks: Mutex<HashMap<BlobKey, [u32; 3]>>,
}

impl MapStore {
    pub fn with_blob(key: BlobKey, data: &[u8]) -> Self {
        let store = Self::default();
        store.blocks.lock().unwrap().insert(
            key,
            Block {
                data: data.to_vec(),
                max_size: data.len() as u64,
            },
        );
        store
    }

    pub fn lock_count(&self, key: &BlobKey, kind: LockKind) -> u32 {
        self.locks
            .lock()
            .unwrap()
            .get(key)
            .map(|l| l[kind.index()])
            .unwrap_or(0)
    }
}

impl BlobStorePort for MapStore {
    fn exists(&self, key: &BlobKey) -> bool {
        self.blocks.lock().unwrap().contains_key(key)
    }

    fn size(&self, key: &BlobKey) -> Result<u64, StoreError> {
        self.blocks
            .lock()
            .unwrap()
            .get(key)
            .map(|b| b.data.len() as u64)
            .ok_or(StoreError::NotFound(*key))
    }

    fn max_size(&self, key: &BlobKey) -> Result<u64, StoreError> {
        self.blocks
            .lock()
            .unwrap()
            .get(key)
            .map(|b| b.max_size)
            .ok_or(StoreError::NotFound(*key))
    }

    fn set_max_size(&self, key: &BlobKey, size: u64) -> Result<(), StoreError> {
        let mut blocks = self.blocks.lock().unwrap();
        let block = blocks.entry(*key).or_default();
        block.max_size = size;
        block.data.truncate(size as usize);
        Ok(())
    }

    fn read_at(&self, key: &BlobKey, offset: u64, buf: &mut [u8]) -> Result<usize, StoreError> {
        let blocks = self.blocks.lock().unwrap();
        let block = blocks.get(key).ok_or(StoreError::NotFound(*key))?;
        let start = (offset as usize).min(block.data.len());
        let n = buf.len().min(block.data.len() - start);
        buf[..n].copy_from_slice(&block.data[start..start + n]);
        Ok(n)
    }

    fn write_at(&self, key: &BlobKey, offset: u64, data: &[u8]) -> Result<usize, StoreError> {
        let mut blocks = self.blocks.lock().unwrap();
        let block = blocks.get_mut(key).ok_or(StoreError::NotFound(*key))?;
        let end = offset as usize + data.len();
        if end as u64 > block.max_size {
            return Err(StoreError::ExceedsMaxSize {
                key: *key,
                offset,
                len: data.len(),
                max_size: block.max_size,
            });
        }
        if block.data.len() < end {
            block.data.resize(end, 0);
        }
        block.data[offset as usize..end].copy_from_slice(data);
        Ok(data.len())
    }

    fn rename(&self, from: &BlobKey, to: &BlobKey) -> Result<(), StoreError> {
        let mut blocks = self.blocks.lock().unwrap();
        let block = blocks.remove(from).ok_or(StoreError::NotFound(*from))?;
        blocks.insert(*to, block);
        Ok(())
    }

    fn remove(&self, key: &BlobKey) -> Result<(), StoreError> {
        self.blocks
            .lock()
            .unwrap()
            .remove(key)
            .map(|_| ())
            .ok_or(StoreError::NotFound(*key))
    }

    fn inc_lock(&self, key: &BlobKey, kind: LockKind) {
        self.locks.lock().unwrap().entry(*key).or_default()[kind.index()] += 1;
    }

    fn dec_lock(&self, key: &BlobKey, kind: LockKind) {
        if let Some(l) = self.locks.lock().unwrap().get_mut(key) {
            l[kind.index()] = l[kind.index()].saturating_sub(1);
        }
    }

    fn is_locked(&self, key: &BlobKey, kind: LockKind) -> bool {
        self.lock_count(key, kind) > 0
    }
}

/// Worker that parks jobs until the test runs them.
#[derive(Default)]
pub struct ParkedWorker {
    jobs: Mutex<Vec<(VfsReadJob, tokio::sync::oneshot::Sender<Result<Vec<u8>, StoreError>>)>>,
}

impl ParkedWorker {
    pub fn queued(&self) -> usize {
        self.jobs.lock().unwrap().len()
    }

    pub fn queued_priorities(&self) -> Vec<u32> {
        self.jobs
            .lock()
            .unwrap()
            .iter()
            .map(|(job, _)| job.priority.load(Ordering::Relaxed))
            .collect()
    }

    pub fn run_all(&self) {
        for (job, reply) in self.jobs.lock().unwrap().drain(..) {
            let mut buf = vec![0u8; job.len];
            let result = job.store.read_at(&job.key, job.offset, &mut buf).map(|n| {
                buf.truncate(n);
                buf
            });
            let _ = reply.send(result);
        }
    }

    pub fn drop_all(&self) {
        self.jobs.lock().unwrap().clear();
    }
}

impl VfsWorkerPort for ParkedWorker {
    fn submit_read(&self, job: VfsReadJob) -> ReadReply {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.jobs.lock().unwrap().push((job, tx));
        rx
    }
}

/// Fetch service that parks every request until the test completes it.
#[derive(Default)]
pub struct ParkedFetch {
    parked: Mutex<Vec<(FetchRequest, FetchCallback)>>,
    issued: Mutex<Vec<(BlobKey, TransferId, bool)>>,
}

impl ParkedFetch {
    /// Every request ever issued: (key, tag, is_temp).
    pub fn issued(&self) -> Vec<(BlobKey, TransferId, bool)> {
        self.issued.lock().unwrap().clone()
    }

    pub fn complete_all(&self, result: FetchResult) {
        let parked: Vec<_> = self.parked.lock().unwrap().drain(..).collect();
        for (request, callback) in parked {
            callback(FetchCompletion {
                key: request.key,
                token: request.token,
                result: result.clone(),
            });
        }
    }
}

impl FetchServicePort for ParkedFetch {
    fn fetch(&self, request: FetchRequest, callback: FetchCallback) {
        self.issued.lock().unwrap().push((
            request.key,
            *request.token.transfer_id(),
            request.is_temp,
        ));
        self.parked.lock().unwrap().push((request, callback));
    }
}

/// Registry that owns sources in a map and records every status it is sent.
#[derive(Default)]
pub struct RecordingRegistry {
    sources: Mutex<HashMap<TransferId, Box<dyn TransferSource>>>,
    statuses: Mutex<Vec<(TransferId, TransferStatus)>>,
}

impl RecordingRegistry {
    pub fn insert(&self, source: Box<dyn TransferSource>) {
        self.sources.lock().unwrap().insert(*source.id(), source);
    }

    pub fn remove(&self, id: &TransferId) -> Option<Box<dyn TransferSource>> {
        self.sources.lock().unwrap().remove(id)
    }

    pub fn statuses(&self) -> Vec<(TransferId, TransferStatus)> {
        self.statuses.lock().unwrap().clone()
    }

    pub fn with_asset<R>(
        &self,
        id: &TransferId,
        f: impl FnOnce(&mut AssetTransferSource) -> R,
    ) -> R {
        let mut sources = self.sources.lock().unwrap();
        let source = sources.get_mut(id).expect("source registered");
        let asset = source
            .as_any_mut()
            .downcast_mut::<AssetTransferSource>()
            .expect("asset source");
        f(asset)
    }
}

impl TransferRegistryPort for RecordingRegistry {
    fn with_source(&self, id: &TransferId, f: &mut dyn FnMut(&mut dyn TransferSource)) -> bool {
        match self.sources.lock().unwrap().get_mut(id) {
            Some(source) => {
                f(source.as_mut());
                true
            }
            None => false,
        }
    }

    fn send_status(&self, id: &TransferId, status: TransferStatus) {
        self.statuses.lock().unwrap().push((*id, status));
    }
}
