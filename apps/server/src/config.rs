use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use rilievo_core::sync::{PrefixedIdFallback, SyncConfig};

const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8088";
const DEFAULT_DATA_DIR: &str = "./data";
const DEFAULT_MAX_BODY_MB: usize = 64;

fn env_value(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: SocketAddr,
    pub data_dir: PathBuf,
    pub sync: SyncConfig,
    pub max_body_bytes: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let listen_addr = env_value("RILIEVO_LISTEN_ADDR")
            .unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string());
        let listen_addr = listen_addr
            .parse()
            .with_context(|| format!("Invalid RILIEVO_LISTEN_ADDR '{}'", listen_addr))?;

        let data_dir = PathBuf::from(
            env_value("RILIEVO_DATA_DIR").unwrap_or_else(|| DEFAULT_DATA_DIR.to_string()),
        );

        let prefixed_id_fallback = match env_value("RILIEVO_PREFIXED_ID_FALLBACK") {
            Some(value) => value.parse::<PrefixedIdFallback>()?,
            None => PrefixedIdFallback::default(),
        };

        let max_body_mb = match env_value("RILIEVO_MAX_BODY_MB") {
            Some(value) => value
                .parse::<usize>()
                .with_context(|| format!("Invalid RILIEVO_MAX_BODY_MB '{}'", value))?,
            None => DEFAULT_MAX_BODY_MB,
        };

        Ok(Self {
            listen_addr,
            data_dir,
            sync: SyncConfig {
                prefixed_id_fallback,
            },
            max_body_bytes: max_body_mb * 1024 * 1024,
        })
    }

    /// Defaults rooted at `data_dir`.
    #[cfg(test)]
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            data_dir: data_dir.into(),
            sync: SyncConfig::default(),
            max_body_bytes: DEFAULT_MAX_BODY_MB * 1024 * 1024,
        }
    }
}
