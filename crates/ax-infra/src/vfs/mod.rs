//! Virtual file system runtime support.

pub mod worker;

pub use worker::{cleanup_global, global, init_global, VfsWorker};
