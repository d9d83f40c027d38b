//! Blob identity: what a block-store entry is and how it is addressed.

mod blob_type;

pub use blob_type::BlobType;

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::ids::BlobId;

/// Full block-store key. A blob is only ever addressed by both halves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlobKey {
    pub id: BlobId,
    pub blob_type: BlobType,
}

impl BlobKey {
    pub fn new(id: BlobId, blob_type: BlobType) -> Self {
        Self { id, blob_type }
    }
}

impl Display for BlobKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.id, self.blob_type)
    }
}
