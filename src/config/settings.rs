//! On-disk settings for the CLI

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use super::{Endpoints, SharePointConfig, DEFAULT_TIMEOUT};

/// Settings file contents. Every field is optional so CLI flags and
/// environment variables can fill the gaps.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub tenant_id: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    /// SharePoint hostname, e.g. `contoso.sharepoint.com`
    pub hostname: Option<String>,
    /// Server-relative site path, e.g. `/sites/Team`
    pub site_path: Option<String>,
    /// Document library display name
    pub drive_name: Option<String>,
    pub timeout_secs: Option<u64>,
    /// Override for every remote endpoint (testing against a local mock)
    pub base_url: Option<String>,
}

impl Settings {
    fn config_dir() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("com", "sharepoint-cli", "sharepoint-cli")
            .context("Could not determine config directory")?;
        Ok(proj_dirs.config_dir().to_path_buf())
    }

    /// Default settings file path
    pub fn default_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load from `path`, or from the default location when `None`.
    /// A missing default file yields empty settings; a missing explicit file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (Self::default_path()?, false),
        };

        if !path.exists() {
            if explicit {
                anyhow::bail!("Config file {} does not exist", path.display());
            }
            tracing::debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Values from `other` win where present.
    pub fn merge(self, other: Settings) -> Settings {
        Settings {
            tenant_id: other.tenant_id.or(self.tenant_id),
            client_id: other.client_id.or(self.client_id),
            client_secret: other.client_secret.or(self.client_secret),
            hostname: other.hostname.or(self.hostname),
            site_path: other.site_path.or(self.site_path),
            drive_name: other.drive_name.or(self.drive_name),
            timeout_secs: other.timeout_secs.or(self.timeout_secs),
            base_url: other.base_url.or(self.base_url),
        }
    }

    /// Build the validated library configuration.
    pub fn to_config(&self) -> Result<SharePointConfig> {
        let timeout = self
            .timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TIMEOUT);
        let config = SharePointConfig::new(
            require(&self.tenant_id, "tenant_id", "SHAREPOINT_TENANT_ID")?,
            require(&self.client_id, "client_id", "SHAREPOINT_CLIENT_ID")?,
            require(&self.client_secret, "client_secret", "SHAREPOINT_CLIENT_SECRET")?,
            timeout,
        )?;
        match self.base_url {
            Some(ref base) => Ok(config.with_endpoints(Endpoints::single_origin(base))?),
            None => Ok(config),
        }
    }

    pub fn hostname(&self) -> Result<&str> {
        require(&self.hostname, "hostname", "SHAREPOINT_HOSTNAME")
    }

    pub fn site_path(&self) -> Result<&str> {
        require(&self.site_path, "site_path", "SHAREPOINT_SITE_PATH")
    }

    pub fn drive_name(&self) -> Result<&str> {
        require(&self.drive_name, "drive_name", "SHAREPOINT_DRIVE")
    }
}

fn require<'a>(value: &'a Option<String>, key: &str, env: &str) -> Result<&'a str> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => anyhow::bail!(
            "Missing '{}': set it in the config file, via --{} or {}",
            key,
            key.replace('_', "-"),
            env
        ),
    }
}
