//! Configuration Management
//!
//! Handles persistent configuration storage for gcp-estate.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Directory name under the platform config dir
pub const APP_DIR: &str = "gcp-estate";

/// `<config_dir>/gcp-estate`
pub fn app_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join(APP_DIR))
}

/// User configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Config {
    /// Organization used when a command is given none ("organizations/123" or "123")
    #[serde(default)]
    pub default_organization: Option<String>,
    /// Project billed for API quota
    #[serde(default)]
    pub quota_project: Option<String>,
    /// Admin configuration used by admin commands
    #[serde(default)]
    pub admin_config: Option<String>,
}

impl Config {
    /// Get the config file path
    fn config_path() -> Option<PathBuf> {
        app_config_dir().map(|p| p.join("config.json"))
    }

    /// Load configuration from disk
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    /// Load from `path`; a missing or malformed file yields the defaults
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("Ignoring malformed config {}: {}", path.display(), e);
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        let Some(path) = Self::config_path() else {
            return Ok(());
        };
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create parent directory
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::Config(format!("cannot create {}: {}", parent.display(), e))
            })?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)
            .map_err(|e| Error::Config(format!("cannot write {}: {}", path.display(), e)))?;

        Ok(())
    }

    /// Get effective quota project (config > environment > gcloud default)
    pub fn effective_quota_project(&self) -> Option<String> {
        self.quota_project
            .clone()
            .or_else(crate::gcp::auth::get_default_project)
    }

    /// Set the default organization and save
    pub fn set_default_organization(&mut self, organization: &str) -> Result<()> {
        self.default_organization = Some(organization.to_string());
        self.save()
    }

    /// Set the quota project and save
    pub fn set_quota_project(&mut self, project_id: &str) -> Result<()> {
        self.quota_project = Some(project_id.to_string());
        self.save()
    }
}
