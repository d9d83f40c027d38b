use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::id_macro::impl_uuid_id;

/// Content address of a blob in the block store.
///
/// Together with a [`crate::BlobType`] it forms the full store key; the same
/// id may exist under several types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlobId(Uuid);

impl_uuid_id!(BlobId);
