pub mod config;
pub mod tracing;
pub mod wiring;

pub use config::{default_store_root, load_config};
pub use self::tracing::init_tracing_subscriber;
pub use wiring::{local_store, wire, Wired};
