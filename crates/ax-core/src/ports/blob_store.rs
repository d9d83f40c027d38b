use std::sync::Arc;

use crate::blob::BlobKey;

use super::errors::StoreError;

/// Cooperative lock classes tracked per block.
///
/// Locks are counters, not exclusive guards: a handle increments them to
/// advertise activity and other handles poll them before racing a resize or
/// a read against it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockKind {
    /// Held by every open handle for its whole lifetime.
    Open,
    /// Held while an async read is queued on the worker.
    Read,
    /// Held while a write that extends the block is in flight.
    Append,
}

impl LockKind {
    pub const ALL: [LockKind; 3] = [LockKind::Open, LockKind::Read, LockKind::Append];

    pub fn index(&self) -> usize {
        match self {
            LockKind::Open => 0,
            LockKind::Read => 1,
            LockKind::Append => 2,
        }
    }
}

/// Content-addressable block storage keyed by (id, type).
///
/// Blocking by contract: callers that must not block go through the VFS
/// worker. `size` is the written length; `max_size` is the reserved
/// capacity a block may be written up to.
pub trait BlobStorePort: Send + Sync {
    fn exists(&self, key: &BlobKey) -> bool;

    fn size(&self, key: &BlobKey) -> Result<u64, StoreError>;

    fn max_size(&self, key: &BlobKey) -> Result<u64, StoreError>;

    /// Reserve capacity, creating the block when absent. Shrinking below the
    /// written length truncates the content.
    fn set_max_size(&self, key: &BlobKey, size: u64) -> Result<(), StoreError>;

    /// Copy up to `buf.len()` bytes starting at `offset`; returns the count
    /// copied, which is short only at the end of the block.
    fn read_at(&self, key: &BlobKey, offset: u64, buf: &mut [u8]) -> Result<usize, StoreError>;

    /// Write `data` at `offset`; fails when the write would pass `max_size`.
    fn write_at(&self, key: &BlobKey, offset: u64, data: &[u8]) -> Result<usize, StoreError>;

    fn rename(&self, from: &BlobKey, to: &BlobKey) -> Result<(), StoreError>;

    fn remove(&self, key: &BlobKey) -> Result<(), StoreError>;

    fn inc_lock(&self, key: &BlobKey, kind: LockKind);

    fn dec_lock(&self, key: &BlobKey, kind: LockKind);

    fn is_locked(&self, key: &BlobKey, kind: LockKind) -> bool;
}

impl<T: BlobStorePort + ?Sized> BlobStorePort for Arc<T> {
    fn exists(&self, key: &BlobKey) -> bool {
        (**self).exists(key)
    }

    fn size(&self, key: &BlobKey) -> Result<u64, StoreError> {
        (**self).size(key)
    }

    fn max_size(&self, key: &BlobKey) -> Result<u64, StoreError> {
        (**self).max_size(key)
    }

    fn set_max_size(&self, key: &BlobKey, size: u64) -> Result<(), StoreError> {
        (**self).set_max_size(key, size)
    }

    fn read_at(&self, key: &BlobKey, offset: u64, buf: &mut [u8]) -> Result<usize, StoreError> {
        (**self).read_at(key, offset, buf)
    }

    fn write_at(&self, key: &BlobKey, offset: u64, data: &[u8]) -> Result<usize, StoreError> {
        (**self).write_at(key, offset, data)
    }

    fn rename(&self, from: &BlobKey, to: &BlobKey) -> Result<(), StoreError> {
        (**self).rename(from, to)
    }

    fn remove(&self, key: &BlobKey) -> Result<(), StoreError> {
        (**self).remove(key)
    }

    fn inc_lock(&self, key: &BlobKey, kind: LockKind) {
        (**self).inc_lock(key, kind)
    }

    fn dec_lock(&self, key: &BlobKey, kind: LockKind) {
        (**self).dec_lock(key, kind)
    }

    fn is_locked(&self, key: &BlobKey, kind: LockKind) -> bool {
        (**self).is_locked(key, kind)
    }
}

#[cfg(test)]
mockall::mock! {
    pub BlobStore {}

    impl BlobStorePort for BlobStore {
        fn exists(&self, key: &BlobKey) -> bool;
        fn size(&self, key: &BlobKey) -> Result<u64, StoreError>;
        fn max_size(&self, key: &BlobKey) -> Result<u64, StoreError>;
        fn set_max_size(&self, key: &BlobKey, size: u64) -> Result<(), StoreError>;
        fn read_at(&self, key: &BlobKey, offset: u64, buf: &mut [u8]) -> Result<usize, StoreError>;
        fn write_at(&self, key: &BlobKey, offset: u64, data: &[u8]) -> Result<usize, StoreError>;
        fn rename(&self, from: &BlobKey, to: &BlobKey) -> Result<(), StoreError>;
        fn remove(&self, key: &BlobKey) -> Result<(), StoreError>;
        fn inc_lock(&self, key: &BlobKey, kind: LockKind);
        fn dec_lock(&self, key: &BlobKey, kind: LockKind);
        fn is_locked(&self, key: &BlobKey, kind: LockKind) -> bool;
    }
}
