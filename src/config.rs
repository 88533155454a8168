//! Issuer configuration
//!
//! TOML-backed configuration for the CLI. Everything here is explicit
//! run input; the dispatcher itself takes a `DispatchConfig` built from
//! this plus CLI flags.

use serde::Deserialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Default config location relative to the working directory
pub const DEFAULT_CONFIG_PATH: &str = "issuance.toml";

/// Errors loading configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config not found: {0}")]
    NotFound(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Issuer configuration (issuance.toml)
#[derive(Debug, Clone, Deserialize)]
pub struct IssuerConfig {
    /// Path to the registry data file
    pub registry_path: PathBuf,

    /// Root directory of the immutable store
    pub store_root: PathBuf,

    /// Base URL published packs are served from
    pub base_url: String,

    /// Directory for run reports (optional; reports are skipped without it)
    #[serde(default)]
    pub report_dir: Option<PathBuf>,
}

impl IssuerConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let text = fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }
}
