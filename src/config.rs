use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{env, path::PathBuf};

use crate::models::content_url::DEFAULT_PROTOCOL;

/// Content store configuration.
///
/// Credentials are only carried here; loading them and building the bucket
/// client happens outside this crate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Name of the bucket content is stored into.
    pub bucket_name: String,

    /// Directory inside the bucket that object keys are placed under.
    /// Blank means keys are the bare relative paths.
    #[serde(default)]
    pub root_dir: String,

    /// Protocol used for newly generated content URLs.
    #[serde(default = "default_protocol")]
    pub protocol: String,

    /// Local directory for write buffers.
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,

    /// Location of the credentials used to build the bucket client.
    #[serde(default)]
    pub credentials_path: Option<PathBuf>,
}

fn default_protocol() -> String {
    DEFAULT_PROTOCOL.to_string()
}

fn default_temp_dir() -> PathBuf {
    env::temp_dir().join("content-store")
}

impl StoreConfig {
    pub fn new(bucket_name: impl Into<String>) -> Self {
        Self {
            bucket_name: bucket_name.into(),
            root_dir: String::new(),
            protocol: default_protocol(),
            temp_dir: default_temp_dir(),
            credentials_path: None,
        }
    }

    pub fn with_root_dir(mut self, root_dir: impl Into<String>) -> Self {
        self.root_dir = root_dir.into();
        self
    }

    pub fn with_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = protocol.into();
        self
    }

    pub fn with_temp_dir(mut self, temp_dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = temp_dir.into();
        self
    }

    pub fn with_credentials_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.credentials_path = Some(path.into());
        self
    }

    /// Load configuration from environment variables.
    ///
    /// - `CONTENT_STORE_BUCKET` (required)
    /// - `CONTENT_STORE_ROOT_DIR` (default empty)
    /// - `CONTENT_STORE_PROTOCOL` (default `store`)
    /// - `CONTENT_STORE_TEMP_DIR` (default `<system temp>/content-store`)
    /// - `CONTENT_STORE_CREDENTIALS` (optional)
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name))
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Result<String, env::VarError>,
    {
        let optional = |name: &str| -> Result<Option<String>> {
            match lookup(name) {
                Ok(value) => Ok(Some(value)),
                Err(env::VarError::NotPresent) => Ok(None),
                Err(err) => Err(err).with_context(|| format!("reading {}", name)),
            }
        };

        let bucket_name = optional("CONTENT_STORE_BUCKET")?
            .filter(|value| !value.trim().is_empty())
            .context("CONTENT_STORE_BUCKET must name the bucket to store content into")?;

        let mut cfg = Self::new(bucket_name);
        if let Some(root_dir) = optional("CONTENT_STORE_ROOT_DIR")? {
            cfg.root_dir = root_dir;
        }
        if let Some(protocol) = optional("CONTENT_STORE_PROTOCOL")? {
            if protocol.is_empty() || protocol.contains('/') || protocol.contains(':') {
                anyhow::bail!("CONTENT_STORE_PROTOCOL value `{}` is not a protocol", protocol);
            }
            cfg.protocol = protocol;
        }
        if let Some(temp_dir) = optional("CONTENT_STORE_TEMP_DIR")? {
            cfg.temp_dir = PathBuf::from(temp_dir);
        }
        cfg.credentials_path = optional("CONTENT_STORE_CREDENTIALS")?.map(PathBuf::from);

        Ok(cfg)
    }
}
