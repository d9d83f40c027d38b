//! Parameter blocks that say what a transfer should deliver.
//!
//! Layout is fixed and unpadded, integers little-endian:
//! - asset: `blob id (16 bytes) | blob type (i32)`
//! - file:  `file name (NUL-terminated UTF-8) | delete flag (u8)`

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

use crate::blob::{BlobKey, BlobType};
use crate::ids::BlobId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParamsError {
    #[error("parameter block truncated: needed {needed} bytes, {available} left")]
    Truncated { needed: usize, available: usize },

    #[error("malformed parameter block: {0}")]
    Malformed(String),
}

/// Kind of transfer source a request addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransferSourceType {
    Unknown,
    File,
    Asset,
    SimInventoryItem,
    SimEstate,
}

impl TransferSourceType {
    pub fn code(&self) -> i32 {
        match self {
            TransferSourceType::Unknown => 0,
            TransferSourceType::File => 1,
            TransferSourceType::Asset => 2,
            TransferSourceType::SimInventoryItem => 3,
            TransferSourceType::SimEstate => 4,
        }
    }

    pub fn from_code(code: i32) -> Self {
        match code {
            1 => TransferSourceType::File,
            2 => TransferSourceType::Asset,
            3 => TransferSourceType::SimInventoryItem,
            4 => TransferSourceType::SimEstate,
            _ => TransferSourceType::Unknown,
        }
    }
}

fn ensure(buf: &impl Buf, needed: usize) -> Result<(), ParamsError> {
    if buf.remaining() < needed {
        return Err(ParamsError::Truncated {
            needed,
            available: buf.remaining(),
        });
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferParamsAsset {
    pub blob_id: BlobId,
    pub blob_type: BlobType,
}

impl TransferParamsAsset {
    pub const ENCODED_LEN: usize = BlobId::LEN + 4;

    pub fn new(blob_id: BlobId, blob_type: BlobType) -> Self {
        Self { blob_id, blob_type }
    }

    pub fn key(&self) -> BlobKey {
        BlobKey::new(self.blob_id, self.blob_type)
    }

    pub fn pack(&self, buf: &mut impl BufMut) {
        buf.put_slice(self.blob_id.as_bytes());
        buf.put_i32_le(self.blob_type.code());
    }

    /// Structural decode only: any type code is accepted here.
    pub fn unpack(buf: &mut impl Buf) -> Result<Self, ParamsError> {
        ensure(&*buf, Self::ENCODED_LEN)?;
        let mut id = [0u8; BlobId::LEN];
        buf.copy_to_slice(&mut id);
        let code = buf.get_i32_le();
        Ok(Self {
            blob_id: BlobId::from_bytes(id),
            blob_type: BlobType::from_code(code),
        })
    }

    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(Self::ENCODED_LEN);
        self.pack(&mut buf);
        buf.freeze()
    }

    pub fn from_bytes(mut block: &[u8]) -> Result<Self, ParamsError> {
        Self::unpack(&mut block)
    }
}

impl Default for TransferParamsAsset {
    fn default() -> Self {
        Self::new(BlobId::nil(), BlobType::None)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferParamsFile {
    pub file_name: String,
    pub delete_on_completion: bool,
}

impl TransferParamsFile {
    pub fn new(file_name: impl Into<String>, delete_on_completion: bool) -> Self {
        Self {
            file_name: file_name.into(),
            delete_on_completion,
        }
    }

    pub fn pack(&self, buf: &mut impl BufMut) {
        buf.put_slice(self.file_name.as_bytes());
        buf.put_u8(0);
        buf.put_u8(u8::from(self.delete_on_completion));
    }

    pub fn unpack(buf: &mut impl Buf) -> Result<Self, ParamsError> {
        let mut name = Vec::new();
        loop {
            ensure(&*buf, 1)?;
            match buf.get_u8() {
                0 => break,
                byte => name.push(byte),
            }
        }
        let file_name = String::from_utf8(name)
            .map_err(|err| ParamsError::Malformed(format!("file name is not utf-8: {err}")))?;
        ensure(&*buf, 1)?;
        let delete_on_completion = buf.get_u8() != 0;
        Ok(Self {
            file_name,
            delete_on_completion,
        })
    }

    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.file_name.len() + 2);
        self.pack(&mut buf);
        buf.freeze()
    }

    pub fn from_bytes(mut block: &[u8]) -> Result<Self, ParamsError> {
        Self::unpack(&mut block)
    }
}
