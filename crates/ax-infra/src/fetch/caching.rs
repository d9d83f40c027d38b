//! Fetch service that resolves blobs from the local store, falling back to an
//! optional upstream store and caching what it pulls from there.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use ax_core::ports::{
    BlobStorePort, FetchCallback, FetchCompletion, FetchRequest, FetchResult, FetchServicePort,
    FetchToken, StoreError,
};
use ax_core::vfile::{VfsError, VirtualFile};
use ax_core::{BlobId, BlobKey};
use tokio::runtime::Handle;
use tracing::{debug, info, info_span, warn};

type Waiters = Vec<(FetchToken, FetchCallback)>;

pub struct CachingFetchService {
    local: Arc<dyn BlobStorePort>,
    upstream: Option<Arc<dyn BlobStorePort>>,
    runtime: Handle,
    in_flight: Arc<Mutex<HashMap<BlobKey, Waiters>>>,
}

impl CachingFetchService {
    /// Resolution runs as blocking tasks on `runtime`; callbacks fire there.
    pub fn new(
        local: Arc<dyn BlobStorePort>,
        upstream: Option<Arc<dyn BlobStorePort>>,
        runtime: Handle,
    ) -> Self {
        Self {
            local,
            upstream,
            runtime,
            in_flight: Arc::default(),
        }
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl FetchServicePort for CachingFetchService {
    fn fetch(&self, request: FetchRequest, callback: FetchCallback) {
        let FetchRequest {
            key,
            token,
            is_temp,
        } = request;

        {
            let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(waiters) = in_flight.get_mut(&key) {
                debug!(blob = %key, "joining in-flight fetch");
                waiters.push((token, callback));
                return;
            }
            in_flight.insert(key, vec![(token, callback)]);
        }

        let local = Arc::clone(&self.local);
        let upstream = self.upstream.clone();
        let in_flight = Arc::clone(&self.in_flight);
        self.runtime.spawn_blocking(move || {
            let span = info_span!("infra.fetch.resolve", blob = %key, is_temp);
            let result = span.in_scope(|| resolve(&local, upstream.as_ref(), &key));

            let waiters = in_flight
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&key)
                .unwrap_or_default();
            for (token, callback) in waiters {
                callback(FetchCompletion {
                    key,
                    token,
                    result: result.clone(),
                });
            }
        });
    }
}

fn resolve(
    local: &Arc<dyn BlobStorePort>,
    upstream: Option<&Arc<dyn BlobStorePort>>,
    key: &BlobKey,
) -> FetchResult {
    if local.exists(key) {
        return FetchResult::NoError;
    }
    let Some(upstream) = upstream.filter(|u| u.exists(key)) else {
        return FetchResult::NotInStore;
    };

    match copy_block(upstream, local, key) {
        Ok(bytes) => {
            info!(bytes, "cached blob from upstream");
            FetchResult::NoError
        }
        Err(err) => {
            warn!(error = %err, "failed to cache blob from upstream");
            FetchResult::OtherFailure(format!("upstream copy failed: {err}"))
        }
    }
}

/// Copy a block into `to` under a scratch key, renaming it onto `key` only
/// once every byte landed. A failed copy leaves nothing behind under `key`.
fn copy_block(
    from: &Arc<dyn BlobStorePort>,
    to: &Arc<dyn BlobStorePort>,
    key: &BlobKey,
) -> Result<usize, VfsError> {
    let data = VirtualFile::read_file(Arc::clone(from), *key)?;
    let scratch = BlobKey::new(BlobId::new(), key.blob_type);

    let copied = VirtualFile::write_file(Arc::clone(to), scratch, &data)
        .and_then(|()| to.rename(&scratch, key).map_err(VfsError::from));
    if let Err(err) = copied {
        match to.remove(&scratch) {
            Ok(()) | Err(StoreError::NotFound(_)) => {}
            Err(cleanup) => {
                warn!(blob = %scratch, error = %cleanup, "failed to drop partial copy");
            }
        }
        return Err(err);
    }
    Ok(data.len())
}
