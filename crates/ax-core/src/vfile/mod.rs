//! Virtual file facade over the block store.
//!
//! A [`VirtualFile`] is bound to one (id, type) block for its lifetime and
//! keeps only a cursor and the result of its last read; size and end-of-file
//! are always derived from the store.

mod error;
mod priority;

pub use error::VfsError;
pub use priority::{
    thread_priority, DEFAULT_PRIORITY, PRIORITY_HIGH, PRIORITY_LOW, PRIORITY_NORMAL,
};

use std::io::SeekFrom;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot::error::TryRecvError;
use tracing::{debug, warn};

use crate::blob::BlobKey;
use crate::ports::{BlobStorePort, LockKind, ReadReply, VfsReadJob, VfsWorkerPort};

const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    Read,
    Write,
    ReadWrite,
    Append,
}

impl OpenMode {
    pub fn is_readable(&self) -> bool {
        matches!(self, OpenMode::Read | OpenMode::ReadWrite)
    }

    pub fn is_writable(&self) -> bool {
        !matches!(self, OpenMode::Read)
    }
}

struct PendingRead {
    reply: ReadReply,
    requested: usize,
    priority: Arc<AtomicU32>,
}

pub struct VirtualFile {
    store: Arc<dyn BlobStorePort>,
    key: BlobKey,
    mode: OpenMode,
    position: u64,
    priority: f32,
    bytes_read: usize,
    short_read: bool,
    worker: Option<Arc<dyn VfsWorkerPort>>,
    pending: Option<PendingRead>,
    completed: Option<Result<Vec<u8>, VfsError>>,
}

impl VirtualFile {
    pub fn open(store: Arc<dyn BlobStorePort>, key: BlobKey, mode: OpenMode) -> Self {
        store.inc_lock(&key, LockKind::Open);
        Self {
            store,
            key,
            mode,
            position: 0,
            priority: DEFAULT_PRIORITY,
            bytes_read: 0,
            short_read: false,
            worker: None,
            pending: None,
            completed: None,
        }
    }

    /// Route [`VirtualFile::read_async`] through `worker` instead of reading inline.
    pub fn with_worker(mut self, worker: Arc<dyn VfsWorkerPort>) -> Self {
        self.worker = Some(worker);
        self
    }

    pub fn key(&self) -> &BlobKey {
        &self.key
    }

    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    /// Blocking read into `buf`, up to `buf.len()` bytes.
    ///
    /// Reading at the end of the block succeeds with zero bytes. Only a store
    /// failure or a wrong mode is an error.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize, VfsError> {
        if !self.mode.is_readable() {
            return Err(VfsError::NotReadable);
        }
        if self.pending.is_some() {
            return Err(VfsError::ReadPending);
        }

        // pending appends from other handles would make the length move under us
        self.wait_for_lock(LockKind::Append);

        let n = self.store.read_at(&self.key, self.position, buf)?;
        self.record_read(n, buf.len());
        Ok(n)
    }

    /// Queue a read of up to `len` bytes on the worker.
    ///
    /// Poll [`VirtualFile::is_read_complete`] and collect the bytes with
    /// [`VirtualFile::take_read_result`]. Without a worker the read happens
    /// inline and is complete on return.
    pub fn read_async(&mut self, len: usize, priority: f32) -> Result<(), VfsError> {
        if !self.mode.is_readable() {
            return Err(VfsError::NotReadable);
        }
        if self.pending.is_some() {
            return Err(VfsError::ReadPending);
        }
        self.priority = priority;
        self.completed = None;

        let Some(worker) = self.worker.clone() else {
            let mut buf = vec![0u8; len];
            let result = self.read(&mut buf).map(|n| {
                buf.truncate(n);
                buf
            });
            self.completed = Some(result);
            return Ok(());
        };

        let shared_priority = Arc::new(AtomicU32::new(thread_priority(priority)));
        self.store.inc_lock(&self.key, LockKind::Read);
        let reply = worker.submit_read(VfsReadJob {
            store: Arc::clone(&self.store),
            key: self.key,
            offset: self.position,
            len,
            priority: Arc::clone(&shared_priority),
        });
        self.pending = Some(PendingRead {
            reply,
            requested: len,
            priority: shared_priority,
        });
        Ok(())
    }

    /// `true` once no async read is outstanding.
    pub fn is_read_complete(&mut self) -> bool {
        let Some(pending) = self.pending.as_mut() else {
            return true;
        };
        let outcome = match pending.reply.try_recv() {
            Ok(result) => result.map_err(VfsError::from),
            Err(TryRecvError::Empty) => return false,
            Err(TryRecvError::Closed) => Err(VfsError::WorkerGone),
        };
        let requested = pending.requested;
        self.pending = None;
        self.complete_read(requested, outcome);
        true
    }

    /// Block the calling thread until the outstanding async read lands.
    ///
    /// Must not be called from inside an async runtime worker thread.
    pub fn wait_for_read(&mut self) -> Result<Vec<u8>, VfsError> {
        if let Some(pending) = self.pending.take() {
            let outcome = match pending.reply.blocking_recv() {
                Ok(result) => result.map_err(VfsError::from),
                Err(_) => Err(VfsError::WorkerGone),
            };
            self.complete_read(pending.requested, outcome);
        }
        self.take_read_result()
    }

    /// Hand over the bytes of the last completed async read.
    pub fn take_read_result(&mut self) -> Result<Vec<u8>, VfsError> {
        if self.pending.is_some() {
            return Err(VfsError::ReadPending);
        }
        self.completed.take().unwrap_or(Err(VfsError::NoReadResult))
    }

    pub fn set_read_priority(&mut self, priority: f32) {
        self.priority = priority;
        if let Some(pending) = self.pending.as_ref() {
            pending
                .priority
                .store(thread_priority(priority), Ordering::Relaxed);
        }
    }

    pub fn read_priority(&self) -> f32 {
        self.priority
    }

    pub fn last_bytes_read(&self) -> usize {
        self.bytes_read
    }

    /// `true` when the most recent read ran into the end of the block.
    pub fn eof(&self) -> bool {
        self.short_read
    }

    pub fn write(&mut self, data: &[u8]) -> Result<(), VfsError> {
        if !self.mode.is_writable() {
            return Err(VfsError::NotWritable);
        }
        if self.mode == OpenMode::Append {
            self.position = self.size_or_zero()?;
        }

        self.store.inc_lock(&self.key, LockKind::Append);
        let written = self.store.write_at(&self.key, self.position, data);
        self.store.dec_lock(&self.key, LockKind::Append);

        self.position += written? as u64;
        Ok(())
    }

    /// Move the cursor. Out-of-range targets clamp the cursor to the nearest
    /// bound and fail.
    pub fn seek(&mut self, pos: SeekFrom) -> Result<u64, VfsError> {
        let size = self.size_or_zero()?;
        let requested: i128 = match pos {
            SeekFrom::Start(offset) => offset as i128,
            SeekFrom::End(delta) => size as i128 + delta as i128,
            SeekFrom::Current(delta) => self.position as i128 + delta as i128,
        };
        self.short_read = false;

        if requested > size as i128 {
            warn!(key = %self.key, requested, size, "Attempt to seek past end of file");
            self.position = size;
            return Err(VfsError::SeekOutOfRange { requested, size });
        }
        if requested < 0 {
            warn!(key = %self.key, requested, "Attempt to seek past beginning of file");
            self.position = 0;
            return Err(VfsError::SeekOutOfRange { requested, size });
        }

        self.position = requested as u64;
        Ok(self.position)
    }

    pub fn tell(&self) -> u64 {
        self.position
    }

    pub fn size(&self) -> Result<u64, VfsError> {
        Ok(self.store.size(&self.key)?)
    }

    pub fn max_size(&self) -> Result<u64, VfsError> {
        Ok(self.store.max_size(&self.key)?)
    }

    /// Reserve capacity for the block. Waits out async reads on other
    /// handles so that a shrink never races them.
    pub fn set_max_size(&mut self, size: u64) -> Result<(), VfsError> {
        if !self.mode.is_writable() {
            return Err(VfsError::NotWritable);
        }
        if self.pending.is_some() {
            return Err(VfsError::ReadPending);
        }
        self.wait_for_lock(LockKind::Read);
        self.store.set_max_size(&self.key, size)?;
        if self.position > size {
            self.position = size;
        }
        Ok(())
    }

    pub fn rename(&mut self, new_key: BlobKey) -> Result<(), VfsError> {
        if !self.mode.is_writable() {
            return Err(VfsError::NotWritable);
        }
        if self.pending.is_some() {
            return Err(VfsError::ReadPending);
        }
        self.wait_for_lock(LockKind::Read);
        self.store.rename(&self.key, &new_key)?;
        self.store.dec_lock(&self.key, LockKind::Open);
        self.store.inc_lock(&new_key, LockKind::Open);
        debug!(from = %self.key, to = %new_key, "renamed blob");
        self.key = new_key;
        Ok(())
    }

    pub fn remove(&mut self) -> Result<(), VfsError> {
        if !self.mode.is_writable() {
            return Err(VfsError::NotWritable);
        }
        if self.pending.is_some() {
            return Err(VfsError::ReadPending);
        }
        self.wait_for_lock(LockKind::Read);
        self.store.remove(&self.key)?;
        self.position = 0;
        Ok(())
    }

    pub fn is_locked(&self, kind: LockKind) -> bool {
        self.store.is_locked(&self.key, kind)
    }

    /// Spin (with a short sleep) until nobody holds `kind` on this block.
    pub fn wait_for_lock(&self, kind: LockKind) {
        while self.store.is_locked(&self.key, kind) {
            std::thread::sleep(LOCK_POLL_INTERVAL);
        }
    }

    /// Read a whole block in one call.
    pub fn read_file(store: Arc<dyn BlobStorePort>, key: BlobKey) -> Result<Vec<u8>, VfsError> {
        let mut file = VirtualFile::open(store, key, OpenMode::Read);
        let size = file.size()?;
        let mut buf = vec![0u8; size as usize];
        let n = file.read(&mut buf)?;
        buf.truncate(n);
        Ok(buf)
    }

    /// Create or replace a block with exactly `data`.
    pub fn write_file(
        store: Arc<dyn BlobStorePort>,
        key: BlobKey,
        data: &[u8],
    ) -> Result<(), VfsError> {
        let mut file = VirtualFile::open(store, key, OpenMode::Write);
        file.set_max_size(data.len() as u64)?;
        file.write(data)
    }

    fn record_read(&mut self, n: usize, requested: usize) {
        self.position += n as u64;
        self.bytes_read = n;
        self.short_read = n < requested;
    }

    fn complete_read(&mut self, requested: usize, outcome: Result<Vec<u8>, VfsError>) {
        self.store.dec_lock(&self.key, LockKind::Read);
        if let Ok(bytes) = &outcome {
            self.record_read(bytes.len(), requested);
        }
        self.completed = Some(outcome);
    }

    fn size_or_zero(&self) -> Result<u64, VfsError> {
        match self.store.size(&self.key) {
            Ok(size) => Ok(size),
            Err(crate::ports::StoreError::NotFound(_)) => Ok(0),
            Err(err) => Err(err.into()),
        }
    }
}

impl Drop for VirtualFile {
    fn drop(&mut self) {
        if self.pending.take().is_some() {
            self.store.dec_lock(&self.key, LockKind::Read);
        }
        self.store.dec_lock(&self.key, LockKind::Open);
    }
}

impl std::fmt::Debug for VirtualFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VirtualFile")
            .field("key", &self.key)
            .field("mode", &self.mode)
            .field("position", &self.position)
            .field("bytes_read", &self.bytes_read)
            .field("pending", &self.pending.is_some())
            .finish()
    }
}
