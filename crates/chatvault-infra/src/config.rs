//! Configuration loader for chatvault.
//!
//! Reads `config.toml` from the data directory (`~/.chatvault/` by default)
//! and deserializes it into [`VaultConfig`]. Falls back to defaults when the
//! file is missing or malformed. The encryption key never lives on disk: it is
//! taken from `CHATVAULT_ENCRYPTION_KEY` as base64.

use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chatvault_types::config::VaultConfig;
use chatvault_types::error::CryptoError;
use secrecy::{ExposeSecret, SecretSlice, SecretString};

use crate::sqlite::pool::default_database_url;

pub const DATA_DIR_ENV: &str = "CHATVAULT_DATA_DIR";
pub const ENCRYPTION_KEY_ENV: &str = "CHATVAULT_ENCRYPTION_KEY";

/// `$CHATVAULT_DATA_DIR`, else `~/.chatvault`.
pub fn default_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        if !dir.is_empty() {
            return PathBuf::from(dir);
        }
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".chatvault")
}

/// Load configuration from `{data_dir}/config.toml`.
///
/// - Missing file: [`VaultConfig::default()`].
/// - Unreadable or unparsable file: logs a warning and returns the default.
pub async fn load_config(data_dir: &Path) -> VaultConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return VaultConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return VaultConfig::default();
        }
    };

    match toml::from_str::<VaultConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            VaultConfig::default()
        }
    }
}

/// The configured database URL, or the default file under `data_dir`.
pub fn resolve_database_url(config: &VaultConfig, data_dir: &Path) -> String {
    match config.database_url.as_deref() {
        Some(url) if !url.trim().is_empty() => url.to_string(),
        _ => default_database_url(data_dir),
    }
}

/// Read the encryption key from the environment. Unset means no encryption.
pub fn encryption_key_from_env() -> Result<SecretSlice<u8>, CryptoError> {
    let encoded = std::env::var(ENCRYPTION_KEY_ENV).ok().map(SecretString::from);
    decode_encryption_key(encoded.as_ref())
}

/// Decode a base64 key. `None` or blank yields an empty key (encryption off).
///
/// Only the encoding is checked here; key length is validated by the codec.
pub fn decode_encryption_key(encoded: Option<&SecretString>) -> Result<SecretSlice<u8>, CryptoError> {
    let Some(encoded) = encoded else {
        return Ok(SecretSlice::from(Vec::new()));
    };
    let trimmed = encoded.expose_secret().trim();
    if trimmed.is_empty() {
        return Ok(SecretSlice::from(Vec::new()));
    }

    STANDARD
        .decode(trimmed)
        .map(SecretSlice::from)
        .map_err(|e| CryptoError::Base64Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    #[tokio::test]
    async fn load_config_missing_file_returns_default() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(tmp.path()).await;
        assert_eq!(config, VaultConfig::default());
        assert_eq!(config.retry.max_attempts, 3);
    }

    #[tokio::test]
    async fn load_config_valid_toml_returns_parsed() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(
            tmp.path().join("config.toml"),
            r#"
database_url = "sqlite:///srv/chat/sessions.db"

[retry]
max_attempts = 5
initial_delay_ms = 50
max_delay_ms = 1000
"#,
        )
        .await
        .unwrap();

        let config = load_config(tmp.path()).await;
        assert_eq!(
            config.database_url.as_deref(),
            Some("sqlite:///srv/chat/sessions.db")
        );
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.initial_delay, Duration::from_millis(50));
        assert_eq!(config.retry.max_delay, Duration::from_secs(1));
        assert_eq!(config.retry.multiplier, 2.0);
    }

    #[tokio::test]
    async fn load_config_invalid_toml_returns_default() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(tmp.path().join("config.toml"), "this is not { valid toml !!!")
            .await
            .unwrap();

        let config = load_config(tmp.path()).await;
        assert_eq!(config, VaultConfig::default());
    }

    #[test]
    fn resolve_database_url_prefers_config() {
        let dir = Path::new("/data");
        let mut config = VaultConfig::default();
        assert!(resolve_database_url(&config, dir).ends_with("chatvault.db?mode=rwc"));

        config.database_url = Some("sqlite://elsewhere.db".to_string());
        assert_eq!(resolve_database_url(&config, dir), "sqlite://elsewhere.db");

        config.database_url = Some("   ".to_string());
        assert!(resolve_database_url(&config, dir).starts_with("sqlite:///data/"));
    }

    #[test]
    fn decode_key_absent_or_blank_disables_encryption() {
        assert!(decode_encryption_key(None).unwrap().expose_secret().is_empty());
        let blank = SecretString::from("  ");
        assert!(decode_encryption_key(Some(&blank)).unwrap().expose_secret().is_empty());
    }

    #[test]
    fn decode_key_base64() {
        let encoded = SecretString::from(STANDARD.encode([7u8; 32]));
        let key = decode_encryption_key(Some(&encoded)).unwrap();
        assert_eq!(key.expose_secret(), &[7u8; 32][..]);
    }

    #[test]
    fn decode_key_malformed_never_echoes_input() {
        let encoded = SecretString::from("hunter2!!not-base64");
        let err = decode_encryption_key(Some(&encoded)).unwrap_err();
        assert!(matches!(err, CryptoError::Base64Decode(_)));
        assert!(!err.to_string().contains("hunter2"));
    }
}
