//! Local project configuration (`openmods.json`).

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::manifest::ZapTargetConfig;

/// Config file name inside a project directory.
pub const CONFIG_FILENAME: &str = "openmods.json";

/// Errors that can occur while loading or saving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Local signer configuration: sign with a local secret, or hand unsigned
/// events to a remote signer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignerConfig {
    #[serde(default)]
    pub mode: SignerMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delegated: Option<DelegatedSigner>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignerMode {
    #[default]
    Local,
    Delegated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelegatedSigner {
    /// Relay the remote signer listens on.
    pub relay: String,
    /// npub of the remote signer.
    pub remote_pubkey: String,
    #[serde(default = "default_capabilities")]
    pub capabilities: Vec<SignerCapability>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignerCapability {
    #[serde(rename = "kind30078")]
    Kind30078,
    #[serde(rename = "kind30079")]
    Kind30079,
    #[serde(rename = "zap")]
    Zap,
}

fn default_capabilities() -> Vec<SignerCapability> {
    vec![SignerCapability::Kind30078, SignerCapability::Kind30079]
}

/// The `openmods.json` document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenModsConfig {
    pub game_id: String,
    pub project_slug: String,
    pub relays: Vec<String>,
    /// bech32 npub the records should claim as author.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_pubkey: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zap: Option<ZapTargetConfig>,
    pub release: ReleasePaths,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signer: Option<SignerConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleasePaths {
    pub artifacts_dir: String,
    pub torrents_dir: String,
}

impl OpenModsConfig {
    /// Structural checks beyond what serde enforces.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.relays.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one relay is required".to_string(),
            ));
        }
        if let Some(signer) = &self.signer
            && signer.mode == SignerMode::Delegated
            && signer.delegated.is_none()
        {
            return Err(ConfigError::Invalid(
                "delegated signer details required when mode is 'delegated'".to_string(),
            ));
        }
        Ok(())
    }
}

/// Loads and persists `openmods.json` inside a project directory.
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(project_dir: impl AsRef<Path>) -> Self {
        Self {
            path: project_dir.as_ref().join(CONFIG_FILENAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    pub fn load(&self) -> Result<OpenModsConfig, ConfigError> {
        let raw = fs::read_to_string(&self.path)?;
        let config: OpenModsConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, config: &OpenModsConfig) -> Result<(), ConfigError> {
        config.validate()?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let serialized = serde_json::to_string_pretty(config)?;
        fs::write(&self.path, serialized + "\n")?;
        Ok(())
    }

    /// Replace the configured author identity and persist.
    pub fn rotate_author_pubkey(&self, npub: &str) -> Result<OpenModsConfig, ConfigError> {
        let mut config = self.load()?;
        config.author_pubkey = Some(npub.to_string());
        self.save(&config)?;
        Ok(config)
    }

    /// Replace the signer configuration and persist.
    pub fn set_signer(&self, signer: SignerConfig) -> Result<OpenModsConfig, ConfigError> {
        let mut config = self.load()?;
        config.signer = Some(signer);
        self.save(&config)?;
        Ok(config)
    }
}
