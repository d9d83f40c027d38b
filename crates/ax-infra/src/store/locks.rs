use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use ax_core::ports::LockKind;
use ax_core::BlobKey;

/// Per-block cooperative lock counters.
///
/// Counters live independently of block content so a handle can hold an
/// OPEN lock on a block that does not exist yet.
#[derive(Debug, Default)]
pub struct LockTable {
    counts: Mutex<HashMap<BlobKey, [u32; 3]>>,
}

impl LockTable {
    pub fn inc(&self, key: &BlobKey, kind: LockKind) {
        let mut counts = self.counts.lock().unwrap_or_else(PoisonError::into_inner);
        counts.entry(*key).or_default()[kind.index()] += 1;
    }

    pub fn dec(&self, key: &BlobKey, kind: LockKind) {
        let mut counts = self.counts.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(slots) = counts.get_mut(key) else {
            tracing::warn!(blob = %key, ?kind, "unlocking a block that holds no locks");
            return;
        };
        let slot = &mut slots[kind.index()];
        if *slot == 0 {
            tracing::warn!(blob = %key, ?kind, "lock count underflow");
        }
        *slot = slot.saturating_sub(1);
        if slots.iter().all(|c| *c == 0) {
            counts.remove(key);
        }
    }

    pub fn count(&self, key: &BlobKey, kind: LockKind) -> u32 {
        self.counts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .map_or(0, |slots| slots[kind.index()])
    }

    pub fn is_locked(&self, key: &BlobKey, kind: LockKind) -> bool {
        self.count(key, kind) > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ax_core::{BlobId, BlobType};

    #[test]
    fn counts_per_kind_and_drops_empty_entries() {
        let table = LockTable::default();
        let key = BlobKey::new(BlobId::new(), BlobType::Sound);

        table.inc(&key, LockKind::Open);
        table.inc(&key, LockKind::Open);
        table.inc(&key, LockKind::Read);
        assert_eq!(table.count(&key, LockKind::Open), 2);
        assert!(table.is_locked(&key, LockKind::Read));
        assert!(!table.is_locked(&key, LockKind::Append));

        table.dec(&key, LockKind::Read);
        table.dec(&key, LockKind::Open);
        table.dec(&key, LockKind::Open);
        assert!(table.counts.lock().unwrap().is_empty());

        // underflow is tolerated
        table.dec(&key, LockKind::Open);
        assert_eq!(table.count(&key, LockKind::Open), 0);
    }
}
