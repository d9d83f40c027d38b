//! Pull-based transfer sources and their wire-level vocabulary.

mod asset_source;
mod error;
pub mod params;
mod source;
mod status;

pub use asset_source::{AssetSourceState, AssetTransferSource, STATIC_PRIORITY};
pub use error::TransferError;
pub use params::{ParamsError, TransferParamsAsset, TransferParamsFile, TransferSourceType};
pub use source::{TransferContext, TransferSource};
pub use status::{PacketResponse, TransferStatus};
