//! Application state wiring the store components together.
//!
//! Resolves the data directory, loads `config.toml`, decodes the encryption key
//! from the environment, opens the database and makes sure the session indexes
//! exist. Index failures are logged and tolerated; the store still works, only
//! slower.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chatvault_core::retry::RetryExecutor;
use chatvault_infra::ChatVault;
use chatvault_infra::config::{
    ENCRYPTION_KEY_ENV, default_data_dir, encryption_key_from_env, load_config,
    resolve_database_url,
};
use chatvault_types::config::VaultConfig;
use chatvault_types::error::CryptoError;
use secrecy::ExposeSecret;
use tokio_util::sync::CancellationToken;

pub struct AppState {
    pub vault: ChatVault,
    pub config: VaultConfig,
    pub data_dir: PathBuf,
    /// Cancelled on Ctrl+C; aborts any pending retry wait.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub async fn init(data_dir: Option<PathBuf>) -> Result<Self> {
        let data_dir = data_dir.unwrap_or_else(default_data_dir);

        tokio::fs::create_dir_all(&data_dir)
            .await
            .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;

        let config = load_config(&data_dir).await;
        let database_url = resolve_database_url(&config, &data_dir);

        let key = encryption_key_from_env()
            .with_context(|| format!("{ENCRYPTION_KEY_ENV} is not valid base64"))?;
        let key_len = key.expose_secret().len();
        if !matches!(key_len, 0 | 16 | 24 | 32) {
            return Err(CryptoError::InvalidKeySize(key_len))
                .with_context(|| format!("{ENCRYPTION_KEY_ENV} has the wrong length"));
        }
        if key_len == 0 {
            tracing::warn!("{ENCRYPTION_KEY_ENV} not set, message content is stored unencrypted");
        }

        let shutdown = CancellationToken::new();
        let retry = RetryExecutor::new(config.retry.clone()).with_cancellation(shutdown.clone());

        let vault = ChatVault::open(&database_url, key.expose_secret(), retry)
            .await
            .context("failed to open session store")?;

        if let Err(e) = vault.indexes.ensure_indexes().await {
            tracing::warn!(error = %e, "failed to ensure session indexes, continuing without them");
        }

        Ok(Self {
            vault,
            config,
            data_dir,
            shutdown,
        })
    }
}
