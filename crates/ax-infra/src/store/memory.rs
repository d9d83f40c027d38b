use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use ax_core::ports::{BlobStorePort, LockKind, StoreError};
use ax_core::BlobKey;

use super::locks::LockTable;

#[derive(Debug, Default)]
struct MemoryBlock {
    data: Vec<u8>,
    max_size: u64,
}

/// Block store held entirely in memory. Used for temporary blobs and tests.
#[derive(Debug, Default)]
pub struct MemoryBlockStore {
    blocks: Mutex<HashMap<BlobKey, MemoryBlock>>,
    locks: LockTable,
}

impl MemoryBlockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `data` as a complete block, replacing any previous content.
    pub fn insert(&self, key: BlobKey, data: Vec<u8>) {
        let max_size = data.len() as u64;
        self.blocks().insert(key, MemoryBlock { data, max_size });
    }

    pub fn len(&self) -> usize {
        self.blocks().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks().is_empty()
    }

    pub fn lock_count(&self, key: &BlobKey, kind: LockKind) -> u32 {
        self.locks.count(key, kind)
    }

    fn blocks(&self) -> std::sync::MutexGuard<'_, HashMap<BlobKey, MemoryBlock>> {
        self.blocks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl BlobStorePort for MemoryBlockStore {
    fn exists(&self, key: &BlobKey) -> bool {
        self.blocks().contains_key(key)
    }

    fn size(&self, key: &BlobKey) -> Result<u64, StoreError> {
        self.blocks()
            .get(key)
            .map(|b| b.data.len() as u64)
            .ok_or(StoreError::NotFound(*key))
    }

    fn max_size(&self, key: &BlobKey) -> Result<u64, StoreError> {
        self.blocks()
            .get(key)
            .map(|b| b.max_size)
            .ok_or(StoreError::NotFound(*key))
    }

    fn set_max_size(&self, key: &BlobKey, size: u64) -> Result<(), StoreError> {
        let mut blocks = self.blocks();
        let block = blocks.entry(*key).or_default();
        block.max_size = size;
        block.data.truncate(size as usize);
        Ok(())
    }

    fn read_at(&self, key: &BlobKey, offset: u64, buf: &mut [u8]) -> Result<usize, StoreError> {
        let blocks = self.blocks();
        let block = blocks.get(key).ok_or(StoreError::NotFound(*key))?;
        let start = (offset as usize).min(block.data.len());
        let n = buf.len().min(block.data.len() - start);
        buf[..n].copy_from_slice(&block.data[start..start + n]);
        Ok(n)
    }

    fn write_at(&self, key: &BlobKey, offset: u64, data: &[u8]) -> Result<usize, StoreError> {
        let mut blocks = self.blocks();
        let block = blocks.get_mut(key).ok_or(StoreError::NotFound(*key))?;
        let end = offset + data.len() as u64;
        if end > block.max_size {
            return Err(StoreError::ExceedsMaxSize {
                key: *key,
                offset,
                len: data.len(),
                max_size: block.max_size,
            });
        }
        let (start, end) = (offset as usize, end as usize);
        if block.data.len() < end {
            block.data.resize(end, 0);
        }
        block.data[start..end].copy_from_slice(data);
        Ok(data.len())
    }

    fn rename(&self, from: &BlobKey, to: &BlobKey) -> Result<(), StoreError> {
        let mut blocks = self.blocks();
        let block = blocks.remove(from).ok_or(StoreError::NotFound(*from))?;
        if blocks.insert(*to, block).is_some() {
            tracing::debug!(from = %from, to = %to, "rename replaced existing block");
        }
        Ok(())
    }

    fn remove(&self, key: &BlobKey) -> Result<(), StoreError> {
        self.blocks()
            .remove(key)
            .map(|_| ())
            .ok_or(StoreError::NotFound(*key))
    }

    fn inc_lock(&self, key: &BlobKey, kind: LockKind) {
        self.locks.inc(key, kind)
    }

    fn dec_lock(&self, key: &BlobKey, kind: LockKind) {
        self.locks.dec(key, kind)
    }

    fn is_locked(&self, key: &BlobKey, kind: LockKind) -> bool {
        self.locks.is_locked(key, kind)
    }
}
