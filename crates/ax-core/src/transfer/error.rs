use thiserror::Error;

use crate::ids::TransferId;

use super::params::{ParamsError, TransferSourceType};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransferError {
    /// The source keeps no replay buffer; anything but the next packet is a
    /// protocol violation and ends the whole transfer.
    #[error("transfer {transfer_id}: out of order packet {got}, expected {expected}")]
    OutOfOrderPacket {
        transfer_id: TransferId,
        expected: i32,
        got: i32,
    },

    #[error("unsupported transfer source type {0:?}")]
    UnsupportedSourceType(TransferSourceType),

    #[error(transparent)]
    Params(#[from] ParamsError),
}

impl TransferError {
    /// Non-recoverable errors must fail the transfer, never be retried.
    pub fn is_fatal(&self) -> bool {
        matches!(self, TransferError::OutOfOrderPacket { .. })
    }
}
