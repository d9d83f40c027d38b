//! # Pure Data Module / 纯数据模块
//!
//! Configuration DTOs for the transfer engine. Mapping from TOML only: no
//! validation, no policy. Missing keys take the documented defaults.

use std::path::PathBuf;

/// Default packet size when nothing is configured.
pub const DEFAULT_PACKET_SIZE: usize = 1000;

/// Default wait between pulls while a fetch is still pending.
pub const DEFAULT_SKIP_BACKOFF_MS: u64 = 10;

/// Transfer engine configuration DTO (pure data, no logic)
#[derive(Debug, Clone, PartialEq)]
pub struct TransferConfig {
    /// Root of the local block store.
    pub store_root: PathBuf,

    /// Optional upstream store consulted when a blob is missing locally.
    pub upstream_root: Option<PathBuf>,

    /// Directory served by file transfers; file transfers are refused when
    /// unset.
    pub file_root: Option<PathBuf>,

    /// Bytes requested per packet pull.
    pub packet_size: usize,

    /// Delay before re-pulling a packet answered with `Skip`.
    pub skip_backoff_ms: u64,

    /// Directory for the log file; stdout only when unset.
    pub log_dir: Option<PathBuf>,
}

impl TransferConfig {
    /// Create TransferConfig from a TOML value
    ///
    /// ```toml
    /// [store]
    /// root = "/var/lib/assetxfer"
    /// upstream = "/mnt/upstream"
    /// files = "/srv/outbox"
    ///
    /// [transfer]
    /// packet_size = 1000
    /// skip_backoff_ms = 10
    ///
    /// [logging]
    /// dir = "/var/log/assetxfer"
    /// ```
    pub fn from_toml(toml_value: &toml::Value) -> anyhow::Result<Self> {
        let str_at = |section: &str, key: &str| {
            toml_value
                .get(section)
                .and_then(|s| s.get(key))
                .and_then(|v| v.as_str())
                .map(PathBuf::from)
        };
        let int_at = |section: &str, key: &str| {
            toml_value
                .get(section)
                .and_then(|s| s.get(key))
                .and_then(|v| v.as_integer())
        };

        Ok(Self {
            store_root: str_at("store", "root").unwrap_or_default(),
            upstream_root: str_at("store", "upstream"),
            file_root: str_at("store", "files"),
            packet_size: int_at("transfer", "packet_size")
                .map(|v| v.max(0) as usize)
                .unwrap_or(DEFAULT_PACKET_SIZE),
            skip_backoff_ms: int_at("transfer", "skip_backoff_ms")
                .map(|v| v.max(0) as u64)
                .unwrap_or(DEFAULT_SKIP_BACKOFF_MS),
            log_dir: str_at("logging", "dir"),
        })
    }

    /// Config rooted at `store_root` with every other field defaulted.
    pub fn with_store_root(store_root: PathBuf) -> Self {
        Self {
            store_root,
            upstream_root: None,
            file_root: None,
            packet_size: DEFAULT_PACKET_SIZE,
            skip_backoff_ms: DEFAULT_SKIP_BACKOFF_MS,
            log_dir: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_every_section() {
        let value: toml::Value = toml::from_str(
            r#"
            [store]
            root = "/data/blocks"
            upstream = "/data/upstream"
            files = "/data/outbox"

            [transfer]
            packet_size = 4096
            skip_backoff_ms = 25

            [logging]
            dir = "/data/logs"
            "#,
        )
        .unwrap();

        let config = TransferConfig::from_toml(&value).unwrap();
        assert_eq!(config.store_root, PathBuf::from("/data/blocks"));
        assert_eq!(config.upstream_root, Some(PathBuf::from("/data/upstream")));
        assert_eq!(config.file_root, Some(PathBuf::from("/data/outbox")));
        assert_eq!(config.packet_size, 4096);
        assert_eq!(config.skip_backoff_ms, 25);
        assert_eq!(config.log_dir, Some(PathBuf::from("/data/logs")));
    }

    #[test]
    fn missing_keys_take_defaults() {
        let value: toml::Value = toml::from_str("").unwrap();
        let config = TransferConfig::from_toml(&value).unwrap();
        assert_eq!(config, TransferConfig::with_store_root(PathBuf::new()));
    }
}
