//! ID type wrappers for type safety.

mod id_macro;

pub mod blob_id;
pub mod transfer_id;

pub use blob_id::BlobId;
pub use transfer_id::TransferId;
