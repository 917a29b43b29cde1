//! Resolve the config file and environment secrets into one desired state
//!
//! Resolution happens once, before any network activity. A missing secret
//! aborts the run here instead of half-way through reconciling.

use crate::schema::{ConfigFile, InstanceType, LibrarySection, MediaManagement};
use indexmap::IndexMap;
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const ENV_USERNAME: &str = "ULTRA_USERNAME";
pub const ENV_SERVERNAME: &str = "ULTRA_SERVERNAME";
pub const ENV_QBIT_USER: &str = "QBIT_USER";
pub const ENV_QBIT_PASS: &str = "QBIT_PASS";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Required environment variable '{0}' is not set")]
    MissingEnv(String),

    #[error("Could not read config file {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml_ng::Error,
    },

    #[error("No instance named '{0}' in config")]
    MissingInstance(String),
}

/// Fully-resolved desired state; read-only once built
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub username: String,
    /// `{user}.{server}.{domain}`
    pub server_host: String,
    /// `https://{server_host}`
    pub base_url: String,
    /// `/home/{user}`
    pub home_dir: String,
    /// Public port for cross-service connections
    pub port: u16,
    pub use_ssl: bool,
    pub qbittorrent: QbittorrentConfig,
    pub instances: IndexMap<String, InstanceConfig>,
    pub media_management: MediaManagement,
    tags: IndexMap<String, Vec<String>>,
}

#[derive(Debug, Clone)]
pub struct QbittorrentConfig {
    pub url: String,
    pub app_path: String,
    pub username: String,
    pub password: String,
    /// Absolute
    pub default_save_path: String,
    pub preferences: IndexMap<String, Value>,
    /// Category name to save path
    pub categories: IndexMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct InstanceConfig {
    pub name: String,
    pub kind: InstanceType,
    pub url: String,
    pub app_path: String,
    pub api_key: String,
    /// Absolute
    pub root_folder: Option<String>,
    pub category: Option<String>,
    pub quality_profile: Option<String>,
    pub libraries: Option<Vec<LibrarySection>>,
}

impl ResolvedConfig {
    /// Read and resolve a config file
    pub fn load(path: &Path, env: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let file: ConfigFile =
            serde_yaml_ng::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        Self::resolve(file, env)
    }

    /// Merge a parsed config file with environment secrets
    pub fn resolve(file: ConfigFile, env: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let username = require_env(env, ENV_USERNAME)?;
        let servername = require_env(env, ENV_SERVERNAME)?;

        let server_host = format!("{username}.{servername}.{}", file.domain);
        let base_url = format!("https://{server_host}");
        let home_dir = format!("/home/{username}");

        let qbit = file.qbittorrent;
        let categories = qbit
            .categories
            .into_iter()
            .map(|(name, section)| {
                let path = section.and_then(|s| s.save_path).unwrap_or_else(|| name.clone());
                (name, path)
            })
            .collect();
        let qbittorrent = QbittorrentConfig {
            url: format!("{base_url}{}", qbit.app_path),
            default_save_path: home_path(&home_dir, &qbit.default_save_path),
            app_path: qbit.app_path,
            username: require_env(env, ENV_QBIT_USER)?,
            password: require_env(env, ENV_QBIT_PASS)?,
            preferences: qbit.preferences,
            categories,
        };

        let mut instances = IndexMap::new();
        for (name, section) in file.instances {
            let instance = InstanceConfig {
                url: format!("{base_url}{}", section.app_path),
                api_key: require_env(env, &section.api_key_secret)?,
                root_folder: section.root_folder.map(|p| home_path(&home_dir, &p)),
                kind: section.kind,
                app_path: section.app_path,
                category: section.category,
                quality_profile: section.quality_profile,
                libraries: section.libraries,
                name: name.clone(),
            };
            instances.insert(name, instance);
        }

        Ok(Self {
            username,
            server_host,
            base_url,
            home_dir,
            port: file.port,
            use_ssl: file.use_ssl,
            qbittorrent,
            instances,
            media_management: file.media_management,
            tags: file.tags,
        })
    }

    /// Look up an instance by name
    pub fn instance(&self, name: &str) -> Result<&InstanceConfig, ConfigError> {
        self.instances
            .get(name)
            .ok_or_else(|| ConfigError::MissingInstance(name.to_string()))
    }

    /// Instances of one type, in declaration order
    pub fn instances_of(&self, kind: InstanceType) -> impl Iterator<Item = &InstanceConfig> {
        self.instances.values().filter(move |inst| inst.kind == kind)
    }

    /// Absolute path for a home-relative one
    pub fn home_path(&self, relative: &str) -> String {
        home_path(&self.home_dir, relative)
    }

    /// Tags for an instance: by name first, then by type
    pub fn tags_for(&self, instance: &InstanceConfig) -> &[String] {
        self.tags
            .get(&instance.name)
            .or_else(|| self.tags.get(instance.kind.as_str()))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

fn require_env(env: &HashMap<String, String>, key: &str) -> Result<String, ConfigError> {
    env.get(key)
        .filter(|value| !value.is_empty())
        .cloned()
        .ok_or_else(|| ConfigError::MissingEnv(key.to_string()))
}

fn home_path(home_dir: &str, relative: &str) -> String {
    if relative.starts_with('/') {
        relative.to_string()
    } else {
        format!("{}/{}", home_dir.trim_end_matches('/'), relative)
    }
}
