pub mod stream_blob;

pub use stream_blob::{StreamBlob, StreamReport};
