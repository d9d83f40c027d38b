use crate::ids::TransferId;
use crate::transfer::{TransferSource, TransferStatus};

/// The side of the transfer manager a source is allowed to see.
///
/// Sources keep only a `Weak` handle to it and re-resolve themselves by id
/// after any async hop; a lookup miss is a normal outcome.
pub trait TransferRegistryPort: Send + Sync {
    /// Run `f` against the live source registered under `id`.
    ///
    /// Returns `false` when no such source exists any more.
    fn with_source(&self, id: &TransferId, f: &mut dyn FnMut(&mut dyn TransferSource)) -> bool;

    /// Status notification from a source. Must not call back into the
    /// source; it may be invoked while the registry is driving that source.
    fn send_status(&self, id: &TransferId, status: TransferStatus);
}
