use std::any::Any;
use std::sync::{Arc, Weak};

use crate::ids::TransferId;
use crate::ports::{BlobStorePort, FetchServicePort, TransferRegistryPort};

use super::error::TransferError;
use super::params::{ParamsError, TransferSourceType};
use super::status::{PacketResponse, TransferStatus};

/// A producer of packets for one transfer, driven by the registry.
///
/// The registry calls `data_callback` at most once at a time per source,
/// from its own pump, so implementations need no internal locking for their
/// cursor state.
pub trait TransferSource: Send + 'static {
    fn id(&self) -> &TransferId;

    fn source_type(&self) -> TransferSourceType;

    /// Priority given at creation.
    fn priority(&self) -> f32;

    /// Start whatever has to happen before packets can flow. May report a
    /// terminal status synchronously through the registry.
    fn init_transfer(&mut self);

    fn update_priority(&mut self) -> f32;

    /// Produce packet `packet_id` of at most `max_bytes` bytes.
    ///
    /// `Err` is reserved for protocol violations that must abort the
    /// transfer; every recoverable or terminal outcome is a status.
    fn data_callback(
        &mut self,
        packet_id: i32,
        max_bytes: usize,
    ) -> Result<PacketResponse, TransferError>;

    /// Streaming ended for whatever reason. Must be idempotent.
    fn completion_callback(&mut self, status: TransferStatus);

    fn unpack_params(&mut self, block: &[u8]) -> Result<(), ParamsError>;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Collaborators handed to a source at construction.
#[derive(Clone)]
pub struct TransferContext {
    pub store: Arc<dyn BlobStorePort>,
    pub fetch: Arc<dyn FetchServicePort>,
    /// Weak so that a source never keeps its owner alive.
    pub registry: Weak<dyn TransferRegistryPort>,
}

impl TransferContext {
    pub fn send_status(&self, id: &TransferId, status: TransferStatus) {
        match self.registry.upgrade() {
            Some(registry) => registry.send_status(id, status),
            None => tracing::debug!(transfer_id = %id, %status, "registry gone, status dropped"),
        }
    }
}
