use std::fmt::{Display, Formatter};

use crate::blob::BlobKey;
use crate::ids::TransferId;

/// Single-use tag carried through a fetch and handed back to its callback.
///
/// Not `Clone`: the fetch service owns it from the moment the request is
/// issued until it moves it into the one completion it delivers.
#[derive(Debug, PartialEq, Eq)]
pub struct FetchToken(TransferId);

impl FetchToken {
    pub fn issue(transfer_id: TransferId) -> Self {
        Self(transfer_id)
    }

    pub fn transfer_id(&self) -> &TransferId {
        &self.0
    }

    pub fn into_transfer_id(self) -> TransferId {
        self.0
    }
}

/// Outcome of a fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchResult {
    NoError,
    /// The store (and any upstream) explicitly has no such blob.
    NotInStore,
    OtherFailure(String),
}

impl FetchResult {
    pub fn is_ok(&self) -> bool {
        matches!(self, FetchResult::NoError)
    }

    pub fn error_string(&self) -> &str {
        match self {
            FetchResult::NoError => "No error",
            FetchResult::NotInStore => "Asset request: asset not found in database",
            FetchResult::OtherFailure(msg) => msg,
        }
    }
}

impl Display for FetchResult {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.error_string())
    }
}

#[derive(Debug)]
pub struct FetchRequest {
    pub key: BlobKey,
    pub token: FetchToken,
    /// Temporary blobs are not persisted past the session by the store.
    pub is_temp: bool,
}

#[derive(Debug)]
pub struct FetchCompletion {
    pub key: BlobKey,
    pub token: FetchToken,
    pub result: FetchResult,
}

pub type FetchCallback = Box<dyn FnOnce(FetchCompletion) + Send + 'static>;

/// "Make this blob available in the local store."
///
/// Contract:
/// - `callback` fires exactly once per `fetch`, with the request's token.
/// - It must never fire re-entrantly from inside `fetch`; it may fire on any
///   other thread at any later time.
/// - There is no cancellation. A caller that lost interest simply finds
///   nothing when the callback arrives.
pub trait FetchServicePort: Send + Sync {
    fn fetch(&self, request: FetchRequest, callback: FetchCallback);
}
