//! # Configuration Loader / 配置加载器
//!
//! Reads a TOML file into [`TransferConfig`]. Pure data loading: no
//! validation, whatever the file says is taken as fact.

use std::path::{Path, PathBuf};

use anyhow::Context;
use ax_core::TransferConfig;

/// Load configuration from a TOML file
/// 从 TOML 文件加载配置
///
/// # Errors / 错误
///
/// Returns error if the file cannot be read or is not valid TOML.
pub fn load_config(config_path: &Path) -> anyhow::Result<TransferConfig> {
    let content = std::fs::read_to_string(config_path)
        .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;
    let toml_value: toml::Value =
        toml::from_str(&content).context("Failed to parse config as TOML")?;
    TransferConfig::from_toml(&toml_value)
}

/// Store root used when neither a config file nor `--store` names one.
pub fn default_store_root() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("assetxfer")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config_reads_valid_toml() {
        let toml_content = r#"
            [store]
            root = "/srv/blocks"
            files = "/srv/outbox"

            [transfer]
            packet_size = 512

            [logging]
            dir = "/var/log/assetxfer"
        "#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();

        let config = load_config(temp_file.path()).unwrap();

        assert_eq!(config.store_root, PathBuf::from("/srv/blocks"));
        assert_eq!(config.file_root, Some(PathBuf::from("/srv/outbox")));
        assert_eq!(config.upstream_root, None);
        assert_eq!(config.packet_size, 512);
        assert_eq!(config.log_dir, Some(PathBuf::from("/var/log/assetxfer")));
    }

    #[test]
    fn test_load_config_accepts_zero_packet_size() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"[transfer]\npacket_size = 0\n")
            .unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.packet_size, 0);
        assert_eq!(config.store_root, PathBuf::new());
    }

    #[test]
    fn test_load_config_reports_missing_file() {
        let err = load_config(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_load_config_reports_invalid_toml() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"[store\nroot = ").unwrap();

        let err = load_config(temp_file.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config as TOML"));
    }
}
