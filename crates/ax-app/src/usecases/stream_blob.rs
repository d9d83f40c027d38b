use std::sync::Arc;

use anyhow::{bail, Result};
use ax_core::transfer::{TransferParamsAsset, TransferStatus};
use ax_core::TransferId;
use tracing::info;

use crate::transfer_manager::TransferManager;

/// What a finished stream delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamReport {
    pub transfer_id: TransferId,
    pub status: TransferStatus,
    pub bytes: u64,
    pub packets: u32,
}

/// Use case for streaming one blob end to end through the transfer manager.
/// 通过传输管理器完整流式传输一个数据块的用例。
pub struct StreamBlob {
    manager: Arc<TransferManager>,
}

impl StreamBlob {
    pub fn new(manager: Arc<TransferManager>) -> Self {
        Self { manager }
    }

    /// Streams the blob named by `params`, appending every payload to `out`.
    ///
    /// # Returns
    /// The report of a transfer that ended with `Done`; any other terminal
    /// status is an error and `out` may hold a partial payload.
    #[tracing::instrument(
        name = "usecase.stream_blob.execute",
        skip(self, params, out),
        fields(blob = %params.key())
    )]
    pub async fn execute(
        &self,
        params: TransferParamsAsset,
        priority: f32,
        out: &mut Vec<u8>,
    ) -> Result<StreamReport> {
        let transfer_id = self.manager.start_asset_transfer(params, priority);

        let mut packets = 0u32;
        let start = out.len();
        let status = self
            .manager
            .stream_to_end(&transfer_id, |chunk| {
                packets += 1;
                out.extend_from_slice(chunk);
            })
            .await?;
        let bytes = (out.len() - start) as u64;

        if status != TransferStatus::Done {
            bail!("transfer {transfer_id} ended with status {status} ({bytes} bytes delivered)");
        }

        info!(transfer_id = %transfer_id, bytes, packets, "Streamed blob successfully");
        Ok(StreamReport {
            transfer_id,
            status,
            bytes,
            packets,
        })
    }
}
