//! Fetch service adapters.

mod caching;

pub use caching::CachingFetchService;
