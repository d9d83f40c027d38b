use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::id_macro::impl_uuid_id;

/// Identifies one logical transfer inside the transfer registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransferId(Uuid);

impl_uuid_id!(TransferId);
