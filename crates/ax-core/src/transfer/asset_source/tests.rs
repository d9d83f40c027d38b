use std::sync::{Arc, Weak};

use super::*;
use crate::blob::{BlobKey, BlobType};
use crate::ids::BlobId;
use crate::ports::{BlobStorePort, MockBlobStore, StoreError};
use crate::test_support::{MapStore, ParkedFetch, RecordingRegistry};

struct Harness {
    store: Arc<dyn BlobStorePort>,
    fetch: Arc<ParkedFetch>,
    registry: Arc<RecordingRegistry>,
}

impl Harness {
    fn new(store: Arc<dyn BlobStorePort>) -> Self {
        Self {
            store,
            fetch: Arc::new(ParkedFetch::default()),
            registry: Arc::new(RecordingRegistry::default()),
        }
    }

    fn with_blob(key: BlobKey, data: &[u8]) -> Self {
        Self::new(Arc::new(MapStore::with_blob(key, data)))
    }

    fn ctx(&self) -> TransferContext {
        let registry: Weak<dyn TransferRegistryPort> = Arc::downgrade(&self.registry) as Weak<RecordingRegistry>;
        TransferContext {
            store: self.store.clone(),
            fetch: self.fetch.clone(),
            registry,
        }
    }

    /// Register a source for `key` and run `init_transfer` on it.
    fn start(&self, key: BlobKey) -> TransferId {
        let id = TransferId::new();
        let source = AssetTransferSource::new(id, 1.0, self.ctx())
            .with_params(TransferParamsAsset::new(key.id, key.blob_type));
        self.registry.insert(Box::new(source));
        self.registry.with_source(&id, &mut |s: &mut dyn TransferSource| s.init_transfer());
        id
    }

    fn pull(&self, id: &TransferId, packet_id: i32, max_bytes: usize) -> PacketResponse {
        self.try_pull(id, packet_id, max_bytes).expect("in-order pull")
    }

    fn try_pull(
        &self,
        id: &TransferId,
        packet_id: i32,
        max_bytes: usize,
    ) -> Result<PacketResponse, TransferError> {
        self.registry
            .with_asset(id, |s| s.data_callback(packet_id, max_bytes))
    }
}

fn sound_key() -> BlobKey {
    BlobKey::new(BlobId::new(), BlobType::Sound)
}

fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

#[test]
fn blocked_types_report_error_and_never_fetch() {
    let mut blocked: Vec<BlobType> = BlobType::ALL
        .into_iter()
        .filter(|t| !t.is_directly_streamable())
        .collect();
    blocked.push(BlobType::Unknown(99));

    for blob_type in blocked {
        let key = BlobKey::new(BlobId::new(), blob_type);
        let h = Harness::with_blob(key, b"secret");
        let id = h.start(key);

        assert!(h.fetch.issued().is_empty(), "{blob_type} must not be fetched");
        assert_eq!(h.registry.statuses(), vec![(id, TransferStatus::Error)]);
        assert_eq!(
            h.registry.with_asset(&id, |s| s.state()),
            AssetSourceState::Error
        );
        assert_eq!(h.pull(&id, 0, 64), PacketResponse::skip());
    }
}

#[test]
fn allowed_types_issue_exactly_one_tagged_fetch() {
    for blob_type in BlobType::ALL.into_iter().filter(|t| t.is_directly_streamable()) {
        let key = BlobKey::new(BlobId::new(), blob_type);
        let h = Harness::with_blob(key, b"data");
        let id = h.start(key);

        assert_eq!(h.fetch.issued(), vec![(key, id, false)]);
        assert!(h.registry.statuses().is_empty());
        assert_eq!(
            h.registry.with_asset(&id, |s| s.state()),
            AssetSourceState::AwaitingFetch
        );

        h.registry
            .with_source(&id, &mut |s: &mut dyn TransferSource| s.init_transfer());
        assert_eq!(h.fetch.issued().len(), 1, "fetch is never re-issued");
    }
}

#[test]
fn pulls_before_fetch_completion_skip_without_touching_the_store() {
    // no expectations: any store access panics
    let h = Harness::new(Arc::new(MockBlobStore::new()));
    let id = TransferId::new();
    let mut source = AssetTransferSource::new(id, 1.0, h.ctx())
        .with_params(TransferParamsAsset::new(BlobId::new(), BlobType::Gesture));

    for packet_id in [0, 7, -3, 0] {
        assert_eq!(
            source.data_callback(packet_id, 1024).unwrap(),
            PacketResponse::skip()
        );
    }
    assert_eq!(source.last_packet_id(), -1);
    assert_eq!(source.cursor(), 0);
    assert!(!source.has_open_file());
}

#[test]
fn fetch_success_reports_ok_and_records_size() {
    let key = sound_key();
    let h = Harness::with_blob(key, &pattern(42));
    let id = h.start(key);

    h.fetch.complete_all(FetchResult::NoError);

    assert_eq!(h.registry.statuses(), vec![(id, TransferStatus::Ok)]);
    h.registry.with_asset(&id, |s| {
        assert!(s.fetch_completed());
        assert_eq!(s.blob_size(), Some(42));
        assert_eq!(s.state(), AssetSourceState::Streaming);
    });
}

#[test]
fn small_blob_finishes_in_one_packet_with_data() {
    let key = sound_key();
    let h = Harness::with_blob(key, &pattern(10));
    let id = h.start(key);
    h.fetch.complete_all(FetchResult::NoError);

    let response = h.pull(&id, 0, 100);
    assert_eq!(response, PacketResponse::done(Some(pattern(10))));
    assert_eq!(h.registry.with_asset(&id, |s| s.cursor()), 10);
}

#[test]
fn exact_fit_blob_ends_with_empty_done() {
    let key = sound_key();
    let h = Harness::with_blob(key, &pattern(1000));
    let id = h.start(key);
    h.fetch.complete_all(FetchResult::NoError);

    let first = h.pull(&id, 0, 1000);
    assert_eq!(first.status, TransferStatus::Ok);
    assert_eq!(first.payload_len(), 1000);

    let second = h.pull(&id, 1, 1000);
    assert_eq!(second, PacketResponse::done(None));
    h.registry.with_asset(&id, |s| {
        assert_eq!(s.last_packet_id(), 1);
        assert_eq!(s.cursor(), 1000);
        assert_eq!(s.state(), AssetSourceState::Done);
    });
}

#[test]
fn packets_concatenate_to_the_blob() {
    for size in [1usize, 2, 7, 64, 999, 1000, 1001, 4096] {
        for max_bytes in [1usize, 3, 64, 1000, 5000] {
            let key = sound_key();
            let blob = pattern(size);
            let h = Harness::with_blob(key, &blob);
            let id = h.start(key);
            h.fetch.complete_all(FetchResult::NoError);

            let mut out = Vec::new();
            let mut packet_id = 0;
            loop {
                let response = h.pull(&id, packet_id, max_bytes);
                assert!(response.payload_len() <= max_bytes);
                if let Some(payload) = &response.payload {
                    out.extend_from_slice(payload);
                }
                match response.status {
                    TransferStatus::Ok => packet_id += 1,
                    TransferStatus::Done => break,
                    other => panic!("unexpected status {other} (size {size}, max {max_bytes})"),
                }
                assert!(packet_id as usize <= size + 1, "stream must terminate");
            }
            assert_eq!(out, blob, "size {size}, max_bytes {max_bytes}");
        }
    }
}

#[test]
fn out_of_order_packet_is_fatal() {
    let key = sound_key();
    let h = Harness::with_blob(key, &pattern(100));
    let id = h.start(key);
    h.fetch.complete_all(FetchResult::NoError);

    h.pull(&id, 0, 10);
    let err = h.try_pull(&id, 2, 10).unwrap_err();
    assert_eq!(
        err,
        TransferError::OutOfOrderPacket {
            transfer_id: id,
            expected: 1,
            got: 2
        }
    );
    assert!(err.is_fatal());

    // a replay of an already-served packet is just as fatal
    assert!(h.try_pull(&id, 0, 10).is_err());
    assert_eq!(h.registry.with_asset(&id, |s| s.cursor()), 10);
}

#[test]
fn not_in_store_reports_unknown_source_then_pulls_error() {
    let key = sound_key();
    let h = Harness::new(Arc::new(MapStore::default()));
    let id = h.start(key);

    assert_eq!(h.pull(&id, 0, 100), PacketResponse::skip());
    h.fetch.complete_all(FetchResult::NotInStore);

    assert_eq!(h.registry.statuses(), vec![(id, TransferStatus::UnknownSource)]);
    assert_eq!(h.pull(&id, 0, 100), PacketResponse::error());
}

#[test]
fn other_fetch_failure_reports_error() {
    let key = sound_key();
    let h = Harness::new(Arc::new(MapStore::default()));
    let id = h.start(key);

    h.fetch
        .complete_all(FetchResult::OtherFailure("upstream timed out".into()));

    assert_eq!(h.registry.statuses(), vec![(id, TransferStatus::Error)]);
    h.registry.with_asset(&id, |s| {
        assert!(s.fetch_completed());
        assert_eq!(s.state(), AssetSourceState::Error);
    });
}

#[test]
fn discarded_source_makes_fetch_completion_a_no_op() {
    let key = sound_key();
    let h = Harness::with_blob(key, b"abc");
    let id = h.start(key);

    assert!(h.registry.remove(&id).is_some());
    h.fetch.complete_all(FetchResult::NoError);

    assert!(h.registry.statuses().is_empty());
}

#[test]
fn dead_registry_makes_fetch_completion_a_no_op() {
    let key = sound_key();
    let h = Harness::with_blob(key, b"abc");
    let id = TransferId::new();
    let mut source =
        AssetTransferSource::new(id, 1.0, h.ctx()).with_params(TransferParamsAsset::new(
            key.id,
            key.blob_type,
        ));
    source.init_transfer();

    let Harness {
        fetch, registry, ..
    } = h;
    drop(registry);
    fetch.complete_all(FetchResult::NoError);
    assert!(!source.fetch_completed());
}

#[test]
fn zero_sized_blob_is_an_error() {
    let key = sound_key();
    let h = Harness::with_blob(key, b"");
    let id = h.start(key);
    h.fetch.complete_all(FetchResult::NoError);
    assert_eq!(h.pull(&id, 0, 100), PacketResponse::error());
}

#[test]
fn truncated_blob_fails_the_seek() {
    let key = sound_key();
    let store = Arc::new(MapStore::with_blob(key, &pattern(8)));
    let h = Harness::new(store.clone());
    let id = h.start(key);
    h.fetch.complete_all(FetchResult::NoError);

    assert_eq!(h.pull(&id, 0, 4).payload_len(), 4);
    store.set_max_size(&key, 2).unwrap();
    assert_eq!(h.pull(&id, 1, 4), PacketResponse::error());
}

#[test]
fn read_failure_returns_error_without_payload() {
    let key = sound_key();
    let mut store = MockBlobStore::new();
    store.expect_inc_lock().return_const(());
    store.expect_dec_lock().return_const(());
    store.expect_is_locked().return_const(false);
    store.expect_size().returning(|_| Ok(16));
    store
        .expect_read_at()
        .returning(|_, _, _| Err(StoreError::Io("bad sector".into())));

    let h = Harness::new(Arc::new(store));
    let id = h.start(key);
    h.fetch.complete_all(FetchResult::NoError);

    assert_eq!(h.pull(&id, 0, 8), PacketResponse::error());
    h.registry.with_asset(&id, |s| {
        assert_eq!(s.cursor(), 0);
        assert_eq!(s.last_packet_id(), -1);
    });
}

#[test]
fn completion_releases_the_file_and_is_idempotent() {
    let key = sound_key();
    let store = Arc::new(MapStore::with_blob(key, &pattern(50)));
    let h = Harness::new(store.clone());
    let id = h.start(key);
    h.fetch.complete_all(FetchResult::NoError);
    h.pull(&id, 0, 10);

    assert!(store.is_locked(&key, crate::ports::LockKind::Open));
    h.registry.with_asset(&id, |s| {
        s.completion_callback(TransferStatus::Abort);
        s.completion_callback(TransferStatus::Abort);
        assert!(!s.has_open_file());
    });
    assert!(!store.is_locked(&key, crate::ports::LockKind::Open));

    let mut fresh = AssetTransferSource::new(TransferId::new(), 1.0, h.ctx());
    fresh.completion_callback(TransferStatus::Error);
}

#[test]
fn priority_is_fixed() {
    let h = Harness::new(Arc::new(MapStore::default()));
    let mut source = AssetTransferSource::new(TransferId::new(), 42.0, h.ctx());
    assert_eq!(source.priority(), 42.0);
    assert_eq!(source.update_priority(), STATIC_PRIORITY);
    assert_eq!(source.priority(), 42.0);
}

#[test]
fn unpack_params_through_the_trait() {
    let h = Harness::new(Arc::new(MapStore::default()));
    let params = TransferParamsAsset::new(BlobId::new(), BlobType::Landmark);
    let mut source: Box<dyn TransferSource> =
        Box::new(AssetTransferSource::new(TransferId::new(), 1.0, h.ctx()));

    source.unpack_params(&params.to_bytes()).unwrap();
    assert_eq!(source.source_type(), TransferSourceType::Asset);
    let asset = source
        .as_any_mut()
        .downcast_mut::<AssetTransferSource>()
        .unwrap();
    assert_eq!(asset.params(), &params);

    assert!(source.unpack_params(&[0u8; 3]).is_err());
}
