//! Background worker serving async virtual file reads.
//! 为虚拟文件异步读取服务的后台工作者。
//!
//! One dedicated thread drains a queue of read jobs, always running the
//! highest-priority job first and FIFO among equals. A process-wide instance
//! is managed with [`init_global`] / [`cleanup_global`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;

use ax_core::ports::{ReadReply, StoreError, VfsReadJob, VfsWorkerPort};
use once_cell::sync::Lazy;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, trace};

const WORKER_THREAD_NAME: &str = "ax-vfs-worker";

struct QueuedRead {
    job: VfsReadJob,
    reply: oneshot::Sender<Result<Vec<u8>, StoreError>>,
    seq: u64,
}

impl QueuedRead {
    fn rank(&self) -> (u32, std::cmp::Reverse<u64>) {
        (
            self.job.priority.load(Ordering::Relaxed),
            std::cmp::Reverse(self.seq),
        )
    }
}

pub struct VfsWorker {
    sender: Mutex<Option<mpsc::UnboundedSender<QueuedRead>>>,
    thread: Mutex<Option<JoinHandle<()>>>,
    next_seq: AtomicU64,
}

impl VfsWorker {
    pub fn spawn() -> std::io::Result<Self> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let thread = std::thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || run(receiver))?;
        info!("vfs worker started");
        Ok(Self {
            sender: Mutex::new(Some(sender)),
            thread: Mutex::new(Some(thread)),
            next_seq: AtomicU64::new(0),
        })
    }

    /// Stop accepting jobs, finish the queued ones and join the thread.
    pub fn shutdown(&self) {
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if sender.is_none() {
            return;
        }
        drop(sender);
        let thread = self
            .thread
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(thread) = thread {
            if thread.join().is_err() {
                tracing::error!("vfs worker thread panicked");
            }
        }
        info!("vfs worker stopped");
    }

    pub fn is_running(&self) -> bool {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl VfsWorkerPort for VfsWorker {
    fn submit_read(&self, job: VfsReadJob) -> ReadReply {
        let (reply, rx) = oneshot::channel();
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let guard = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        match guard.as_ref() {
            Some(sender) => {
                // a send error drops `reply`, which the handle sees as WorkerGone
                let _ = sender.send(QueuedRead { job, reply, seq });
            }
            None => debug!(blob = %job.key, "vfs worker stopped, read rejected"),
        }
        rx
    }
}

impl Drop for VfsWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run(mut receiver: mpsc::UnboundedReceiver<QueuedRead>) {
    let mut queue: Vec<QueuedRead> = Vec::new();
    loop {
        if queue.is_empty() {
            match receiver.blocking_recv() {
                Some(job) => queue.push(job),
                None => break,
            }
        }
        while let Ok(job) = receiver.try_recv() {
            queue.push(job);
        }

        let next = queue
            .iter()
            .enumerate()
            .max_by_key(|(_, queued)| queued.rank())
            .map(|(idx, _)| idx);
        if let Some(idx) = next {
            execute(queue.swap_remove(idx));
        }
    }
}

fn execute(queued: QueuedRead) {
    let QueuedRead { job, reply, seq } = queued;
    if reply.is_closed() {
        trace!(seq, blob = %job.key, "read abandoned before it ran");
        return;
    }
    let mut buf = vec![0u8; job.len];
    let result = job.store.read_at(&job.key, job.offset, &mut buf).map(|n| {
        buf.truncate(n);
        buf
    });
    let _ = reply.send(result);
}

static GLOBAL_WORKER: Lazy<Mutex<Option<Arc<VfsWorker>>>> = Lazy::new(|| Mutex::new(None));

/// Start the process-wide worker. Calling it again returns the running one.
pub fn init_global() -> std::io::Result<Arc<VfsWorker>> {
    let mut slot = GLOBAL_WORKER
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    if let Some(worker) = slot.as_ref() {
        return Ok(Arc::clone(worker));
    }
    let worker = Arc::new(VfsWorker::spawn()?);
    *slot = Some(Arc::clone(&worker));
    Ok(worker)
}

pub fn global() -> Option<Arc<VfsWorker>> {
    GLOBAL_WORKER
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

/// Stop the process-wide worker. A no-op when none is running.
pub fn cleanup_global() {
    let worker = GLOBAL_WORKER
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .take();
    if let Some(worker) = worker {
        worker.shutdown();
    }
}
