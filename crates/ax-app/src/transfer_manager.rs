//! # Transfer Manager / 传输管理器
//!
//! Owns live transfer sources by id and pumps packets out of them.
//!
//! ## Behavior / 行为
//! - Sources are created, initialised and pulled through one map lock; a
//!   source is never driven from two places at once.
//! - Packet ids are handed out sequentially per transfer. `Skip` does not
//!   advance the id.
//! - Every transfer completes exactly once: the source is removed from the
//!   map before its `completion_callback` runs.
//! - Status notifications from sources are recorded without touching the
//!   source map, so a source may report while it is being driven.
//! - A protocol violation reported by a source fails the whole transfer.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use ax_core::ports::TransferRegistryPort;
use ax_core::transfer::{
    AssetTransferSource, TransferContext, TransferError, TransferParamsAsset, TransferSource,
    TransferSourceType, TransferStatus,
};
use ax_core::{TransferConfig, TransferId};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};

use crate::deps::TransferDeps;

#[derive(Debug, Error)]
pub enum TransferManagerError {
    #[error("no active transfer {0}")]
    UnknownTransfer(TransferId),

    #[error(transparent)]
    Transfer(#[from] TransferError),

    #[error("pull task failed: {0}")]
    PullTask(#[from] tokio::task::JoinError),
}

/// Notifications about transfers, in the order they happened.
#[derive(Debug, Clone, PartialEq)]
pub enum TransferEvent {
    /// A source reported a status (fetch landed, request refused, ...).
    Status {
        transfer_id: TransferId,
        status: TransferStatus,
    },
    /// The transfer ended and its source is gone.
    Completed {
        transfer_id: TransferId,
        status: TransferStatus,
    },
}

/// Result of one [`TransferManager::pull_next`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PullOutcome {
    /// Nothing to deliver yet; pull again later.
    Pending,
    Data(Vec<u8>),
    Finished {
        status: TransferStatus,
        payload: Option<Vec<u8>>,
    },
}

struct SourceEntry {
    source: Box<dyn TransferSource>,
    next_packet_id: i32,
    priority: f32,
}

pub struct TransferManager {
    deps: TransferDeps,
    packet_size: usize,
    skip_backoff: Duration,
    sources: Mutex<HashMap<TransferId, SourceEntry>>,
    reported: Mutex<HashMap<TransferId, TransferStatus>>,
    events: mpsc::UnboundedSender<TransferEvent>,
    self_ref: Weak<TransferManager>,
}

impl TransferManager {
    pub fn new(
        deps: TransferDeps,
        config: &TransferConfig,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<TransferEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let manager = Arc::new_cyclic(|self_ref| Self {
            deps,
            packet_size: config.packet_size,
            skip_backoff: Duration::from_millis(config.skip_backoff_ms),
            sources: Mutex::new(HashMap::new()),
            reported: Mutex::new(HashMap::new()),
            events,
            self_ref: self_ref.clone(),
        });
        (manager, receiver)
    }

    pub fn packet_size(&self) -> usize {
        self.packet_size
    }

    fn registry_handle(&self) -> Weak<dyn TransferRegistryPort> {
        self.self_ref.clone()
    }

    fn sources(&self) -> MutexGuard<'_, HashMap<TransferId, SourceEntry>> {
        self.sources.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn reported(&self) -> MutexGuard<'_, HashMap<TransferId, TransferStatus>> {
        self.reported.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: TransferEvent) {
        // nobody listening is fine
        let _ = self.events.send(event);
    }

    /// Start streaming the blob named by `params`.
    pub fn start_asset_transfer(&self, params: TransferParamsAsset, priority: f32) -> TransferId {
        let id = TransferId::new();
        let source = AssetTransferSource::new(id, priority, self.context()).with_params(params);
        info!(transfer_id = %id, blob = %params.key(), priority, "starting asset transfer");
        self.register(Box::new(source), priority);
        id
    }

    /// Start a transfer from a wire request: source kind plus packed params.
    pub fn start_transfer(
        &self,
        kind: TransferSourceType,
        params: &[u8],
        priority: f32,
    ) -> Result<TransferId, TransferManagerError> {
        let id = TransferId::new();
        let mut source: Box<dyn TransferSource> = match kind {
            TransferSourceType::Asset => {
                Box::new(AssetTransferSource::new(id, priority, self.context()))
            }
            TransferSourceType::File => match self.deps.file_sources.as_ref() {
                Some(factory) => factory(id, priority, self.registry_handle()),
                None => return Err(TransferError::UnsupportedSourceType(kind).into()),
            },
            _ => {
                warn!(?kind, "Unknown transfer source type");
                return Err(TransferError::UnsupportedSourceType(kind).into());
            }
        };
        source.unpack_params(params).map_err(TransferError::from)?;

        info!(transfer_id = %id, ?kind, priority, "starting transfer");
        self.register(source, priority);
        Ok(id)
    }

    fn context(&self) -> TransferContext {
        TransferContext {
            store: Arc::clone(&self.deps.store),
            fetch: Arc::clone(&self.deps.fetch),
            registry: self.registry_handle(),
        }
    }

    fn register(&self, source: Box<dyn TransferSource>, priority: f32) {
        let id = *source.id();
        let mut sources = self.sources();
        let entry = sources.entry(id).or_insert(SourceEntry {
            source,
            next_packet_id: 0,
            priority,
        });
        // fetch services never complete inside `fetch`, so holding the map
        // lock across init cannot deadlock with a completion
        entry.source.init_transfer();
    }

    pub fn is_active(&self, id: &TransferId) -> bool {
        self.sources().contains_key(id)
    }

    pub fn active_count(&self) -> usize {
        self.sources().len()
    }

    /// Last status a source reported for a still-active transfer.
    pub fn reported_status(&self, id: &TransferId) -> Option<TransferStatus> {
        self.reported().get(id).copied()
    }

    /// Pull the next packet of transfer `id`.
    pub fn pull_next(&self, id: &TransferId) -> Result<PullOutcome, TransferManagerError> {
        let mut sources = self.sources();
        let entry = sources
            .get_mut(id)
            .ok_or(TransferManagerError::UnknownTransfer(*id))?;

        let reported = self.reported().get(id).copied();
        if let Some(status) = reported.filter(TransferStatus::is_failure) {
            debug!(transfer_id = %id, %status, "source reported failure, finishing");
            self.finish(&mut sources, id, status);
            return Ok(PullOutcome::Finished {
                status,
                payload: None,
            });
        }

        let packet_id = entry.next_packet_id;
        let response = match entry.source.data_callback(packet_id, self.packet_size) {
            Ok(response) => response,
            Err(err) if err.is_fatal() => {
                error!(
                    transfer_id = %id,
                    packet_id,
                    error = %err,
                    "protocol violation, failing transfer"
                );
                self.finish(&mut sources, id, TransferStatus::Error);
                return Err(err.into());
            }
            Err(err) => return Err(err.into()),
        };
        trace!(
            transfer_id = %id,
            packet_id,
            status = %response.status,
            bytes = response.payload_len(),
            "pulled packet"
        );

        match response.status {
            TransferStatus::Skip => Ok(PullOutcome::Pending),
            TransferStatus::Ok => {
                entry.next_packet_id += 1;
                Ok(PullOutcome::Data(response.payload.unwrap_or_default()))
            }
            status => {
                self.finish(&mut sources, id, status);
                Ok(PullOutcome::Finished {
                    status,
                    payload: response.payload,
                })
            }
        }
    }

    /// Stop transfer `id` from outside. Returns `false` when it already ended.
    pub fn abort_transfer(&self, id: &TransferId) -> bool {
        let mut sources = self.sources();
        if !sources.contains_key(id) {
            return false;
        }
        info!(transfer_id = %id, "aborting transfer");
        self.finish(&mut sources, id, TransferStatus::Abort);
        true
    }

    /// Let every source recompute its priority.
    pub fn update_priorities(&self) {
        for (id, entry) in self.sources().iter_mut() {
            let priority = entry.source.update_priority();
            if priority != entry.priority {
                trace!(transfer_id = %id, from = entry.priority, to = priority, "priority changed");
            }
            entry.priority = priority;
        }
    }

    pub fn priority_of(&self, id: &TransferId) -> Option<f32> {
        self.sources().get(id).map(|entry| entry.priority)
    }

    /// Pump transfer `id` until it ends, handing every payload to `sink`.
    ///
    /// Each pull runs on the blocking pool since sources read their stores
    /// synchronously. Waits `skip_backoff` between pulls answered with `Skip`.
    pub async fn stream_to_end<F>(
        &self,
        id: &TransferId,
        mut sink: F,
    ) -> Result<TransferStatus, TransferManagerError>
    where
        F: FnMut(&[u8]),
    {
        loop {
            match self.pull_off_runtime(*id).await? {
                PullOutcome::Pending => tokio::time::sleep(self.skip_backoff).await,
                PullOutcome::Data(bytes) => sink(&bytes),
                PullOutcome::Finished { status, payload } => {
                    if let Some(bytes) = payload {
                        sink(&bytes);
                    }
                    return Ok(status);
                }
            }
        }
    }

    async fn pull_off_runtime(&self, id: TransferId) -> Result<PullOutcome, TransferManagerError> {
        let Some(manager) = self.self_ref.upgrade() else {
            return Err(TransferManagerError::UnknownTransfer(id));
        };
        tokio::task::spawn_blocking(move || manager.pull_next(&id)).await?
    }

    fn finish(
        &self,
        sources: &mut HashMap<TransferId, SourceEntry>,
        id: &TransferId,
        status: TransferStatus,
    ) {
        let Some(mut entry) = sources.remove(id) else {
            return;
        };
        self.reported().remove(id);
        entry.source.completion_callback(status);
        info!(transfer_id = %id, %status, packets = entry.next_packet_id, "transfer finished");
        self.emit(TransferEvent::Completed {
            transfer_id: *id,
            status,
        });
    }
}

impl TransferRegistryPort for TransferManager {
    fn with_source(&self, id: &TransferId, f: &mut dyn FnMut(&mut dyn TransferSource)) -> bool {
        match self.sources().get_mut(id) {
            Some(entry) => {
                f(entry.source.as_mut());
                true
            }
            None => false,
        }
    }

    fn send_status(&self, id: &TransferId, status: TransferStatus) {
        debug!(transfer_id = %id, %status, "source status");
        self.reported().insert(*id, status);
        self.emit(TransferEvent::Status {
            transfer_id: *id,
            status,
        });
    }
}
