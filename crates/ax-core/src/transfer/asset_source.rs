//! Asset transfer source: streams one blob straight out of the block store.
//!
//! ## Lifecycle / 生命周期
//!
//! ```text
//! Created --init (type blocked)--> Error
//! Created --init--> AwaitingFetch --fetch ok--> Streaming --> Done | Error
//!                                 --not in store--> UnknownSource
//!                                 --fetch failed--> Error
//! ```
//!
//! The fetch callback never holds a reference to the source. It carries the
//! transfer id back and re-resolves the source through the registry, so a
//! source the manager already dropped is simply not found.

use std::any::Any;
use std::io::SeekFrom;
use std::sync::Weak;

use tracing::{debug, error, info, warn};

use crate::ids::TransferId;
use crate::ports::{FetchCompletion, FetchRequest, FetchResult, FetchToken, TransferRegistryPort};
use crate::vfile::{OpenMode, VirtualFile};

use super::error::TransferError;
use super::params::{ParamsError, TransferParamsAsset, TransferSourceType};
use super::source::{TransferContext, TransferSource};
use super::status::{PacketResponse, TransferStatus};

/// Asset sources do not reprioritise; this is what `update_priority` reports.
pub const STATIC_PRIORITY: f32 = 0.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetSourceState {
    Created,
    AwaitingFetch,
    Streaming,
    Done,
    Error,
    UnknownSource,
}

pub struct AssetTransferSource {
    id: TransferId,
    priority: f32,
    params: TransferParamsAsset,
    ctx: TransferContext,
    state: AssetSourceState,
    fetch_issued: bool,
    fetch_completed: bool,
    cursor: u64,
    blob_size: Option<u64>,
    last_packet_id: i32,
    vfile: Option<VirtualFile>,
}

impl AssetTransferSource {
    pub fn new(id: TransferId, priority: f32, ctx: TransferContext) -> Self {
        Self {
            id,
            priority,
            params: TransferParamsAsset::default(),
            ctx,
            state: AssetSourceState::Created,
            fetch_issued: false,
            fetch_completed: false,
            cursor: 0,
            blob_size: None,
            last_packet_id: -1,
            vfile: None,
        }
    }

    pub fn with_params(mut self, params: TransferParamsAsset) -> Self {
        self.params = params;
        self
    }

    pub fn params(&self) -> &TransferParamsAsset {
        &self.params
    }

    pub fn state(&self) -> AssetSourceState {
        self.state
    }

    pub fn fetch_completed(&self) -> bool {
        self.fetch_completed
    }

    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    pub fn blob_size(&self) -> Option<u64> {
        self.blob_size
    }

    pub fn last_packet_id(&self) -> i32 {
        self.last_packet_id
    }

    pub fn has_open_file(&self) -> bool {
        self.vfile.is_some()
    }

    /// Record the fetch outcome and return the status to notify.
    ///
    /// `fetch_completed` is set whatever the result, so later pulls stop
    /// answering `Skip` and discover the failure themselves.
    pub fn on_fetch_response(&mut self, result: &FetchResult) -> TransferStatus {
        self.fetch_completed = true;
        match result {
            FetchResult::NoError => {
                self.blob_size = self.ctx.store.size(&self.params.key()).ok();
                self.state = AssetSourceState::Streaming;
                TransferStatus::Ok
            }
            FetchResult::NotInStore => {
                self.state = AssetSourceState::UnknownSource;
                TransferStatus::UnknownSource
            }
            FetchResult::OtherFailure(_) => {
                self.state = AssetSourceState::Error;
                TransferStatus::Error
            }
        }
    }

    fn fail(&mut self) -> PacketResponse {
        self.state = AssetSourceState::Error;
        PacketResponse::error()
    }
}

impl TransferSource for AssetTransferSource {
    fn id(&self) -> &TransferId {
        &self.id
    }

    fn source_type(&self) -> TransferSourceType {
        TransferSourceType::Asset
    }

    fn priority(&self) -> f32 {
        self.priority
    }

    fn init_transfer(&mut self) {
        let key = self.params.key();
        if !key.blob_type.is_directly_streamable() {
            warn!(
                transfer_id = %self.id,
                blob_id = %key.id,
                blob_type = key.blob_type.human_readable(),
                "Attempted to request blocked asset"
            );
            self.state = AssetSourceState::Error;
            self.ctx.send_status(&self.id, TransferStatus::Error);
            return;
        }
        if self.fetch_issued {
            warn!(transfer_id = %self.id, "init_transfer called twice, fetch already issued");
            return;
        }

        self.fetch_issued = true;
        self.state = AssetSourceState::AwaitingFetch;
        debug!(transfer_id = %self.id, blob = %key, "requesting blob fetch");

        let registry = self.ctx.registry.clone();
        self.ctx.fetch.fetch(
            FetchRequest {
                key,
                token: FetchToken::issue(self.id),
                is_temp: false,
            },
            Box::new(move |completion| on_fetch_completion(&registry, completion)),
        );
    }

    fn update_priority(&mut self) -> f32 {
        STATIC_PRIORITY
    }

    fn data_callback(
        &mut self,
        packet_id: i32,
        max_bytes: usize,
    ) -> Result<PacketResponse, TransferError> {
        if !self.fetch_completed {
            return Ok(PacketResponse::skip());
        }

        let key = self.params.key();
        let store = &self.ctx.store;
        let vfile = self
            .vfile
            .get_or_insert_with(|| VirtualFile::open(store.clone(), key, OpenMode::Read));

        let size = match vfile.size() {
            Ok(size) if size > 0 => size,
            _ => {
                debug!(transfer_id = %self.id, blob = %key, "blob empty or missing");
                return Ok(self.fail());
            }
        };

        if packet_id != self.last_packet_id + 1 {
            error!(
                transfer_id = %self.id,
                expected = self.last_packet_id + 1,
                got = packet_id,
                "Can't handle out of order file transfer"
            );
            self.state = AssetSourceState::Error;
            return Err(TransferError::OutOfOrderPacket {
                transfer_id: self.id,
                expected: self.last_packet_id + 1,
                got: packet_id,
            });
        }

        if max_bytes == 0 {
            warn!(transfer_id = %self.id, "zero-length packet requested");
            return Ok(self.fail());
        }

        if let Err(err) = vfile.seek(SeekFrom::Start(self.cursor)) {
            warn!(
                transfer_id = %self.id,
                blob_id = %key.id,
                cursor = self.cursor,
                size,
                error = %err,
                "Can't seek to cursor"
            );
            return Ok(self.fail());
        }

        let mut buf = vec![0u8; max_bytes];
        let n = match vfile.read(&mut buf) {
            Ok(n) => n,
            Err(err) => {
                warn!(transfer_id = %self.id, blob_id = %key.id, error = %err, "read failed");
                return Ok(self.fail());
            }
        };
        let at_end = vfile.eof();

        self.cursor += n as u64;
        self.last_packet_id = packet_id;
        buf.truncate(n);

        if at_end {
            self.state = AssetSourceState::Done;
            let payload = if n == 0 { None } else { Some(buf) };
            return Ok(PacketResponse::done(payload));
        }
        Ok(PacketResponse::ok(buf))
    }

    fn completion_callback(&mut self, status: TransferStatus) {
        if self.vfile.take().is_some() {
            debug!(transfer_id = %self.id, %status, "closed virtual file");
        }
    }

    fn unpack_params(&mut self, block: &[u8]) -> Result<(), ParamsError> {
        self.params = TransferParamsAsset::from_bytes(block)?;
        Ok(())
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Completion path of the one fetch an asset source issues.
fn on_fetch_completion(registry: &Weak<dyn TransferRegistryPort>, completion: FetchCompletion) {
    let FetchCompletion { key, token, result } = completion;
    let transfer_id = token.into_transfer_id();

    let Some(registry) = registry.upgrade() else {
        info!(transfer_id = %transfer_id, "Aborting transfer callback, registry went away");
        return;
    };

    if !result.is_ok() {
        info!(blob = %key, error = result.error_string(), "Blob fetch failed");
    }

    // status goes out while the source is still held, so no pull can see the
    // completed fetch before the registry has heard about it
    let found = registry.with_source(&transfer_id, &mut |source: &mut dyn TransferSource| {
        match source.as_any_mut().downcast_mut::<AssetTransferSource>() {
            Some(asset) => {
                let status = asset.on_fetch_response(&result);
                registry.send_status(&transfer_id, status);
            }
            None => warn!(transfer_id = %transfer_id, "fetch completion for a non-asset source"),
        }
    });

    if !found {
        info!(transfer_id = %transfer_id, "Aborting transfer callback, transfer source went away");
    }
}

#[cfg(test)]
mod tests;
