use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// Main Config Schema
// ============================================================================

/// The declarative stack configuration, as written in `config/config.yml`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Provider domain; hosts are `{user}.{server}.{domain}`
    #[serde(default = "default_domain")]
    pub domain: String,

    /// Public HTTPS port every service is reachable on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Whether cross-service connections use TLS
    #[serde(default = "default_true")]
    pub use_ssl: bool,

    /// Download client settings
    #[serde(default)]
    pub qbittorrent: QbittorrentSection,

    /// Named service instances (Sonarr, Radarr, Prowlarr, Jellyfin, Jellyseerr)
    #[serde(default)]
    pub instances: IndexMap<String, InstanceSection>,

    /// Shared Sonarr/Radarr media-management policy
    #[serde(default)]
    pub media_management: MediaManagement,

    /// Tags to create, keyed by instance name or instance type
    #[serde(default)]
    pub tags: IndexMap<String, Vec<String>>,
}

fn default_domain() -> String {
    "usbx.me".to_string()
}

fn default_port() -> u16 {
    443
}

fn default_true() -> bool {
    true
}

// ============================================================================
// qBittorrent
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QbittorrentSection {
    #[serde(default = "default_qbit_path")]
    pub app_path: String,

    /// Home-relative unless absolute
    #[serde(default = "default_save_path")]
    pub default_save_path: String,

    /// Config-level preference names and values (see the qBittorrent reconciler
    /// for the mapping onto API keys)
    #[serde(default)]
    pub preferences: IndexMap<String, Value>,

    /// Category name to settings; an empty entry uses the name as save path
    #[serde(default)]
    pub categories: IndexMap<String, Option<CategorySection>>,
}

impl Default for QbittorrentSection {
    fn default() -> Self {
        Self {
            app_path: default_qbit_path(),
            default_save_path: default_save_path(),
            preferences: IndexMap::new(),
            categories: IndexMap::new(),
        }
    }
}

fn default_qbit_path() -> String {
    "/qbittorrent".to_string()
}

fn default_save_path() -> String {
    "downloads/qbittorrent".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CategorySection {
    #[serde(default)]
    pub save_path: Option<String>,
}

// ============================================================================
// Instances
// ============================================================================

/// Kind of software an instance runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceType {
    Sonarr,
    Radarr,
    Prowlarr,
    Jellyfin,
    Jellyseerr,
}

impl InstanceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sonarr => "sonarr",
            Self::Radarr => "radarr",
            Self::Prowlarr => "prowlarr",
            Self::Jellyfin => "jellyfin",
            Self::Jellyseerr => "jellyseerr",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceSection {
    #[serde(rename = "type")]
    pub kind: InstanceType,

    /// Reverse-proxy path under the shared base URL, e.g. `/sonarr`
    #[serde(default)]
    pub app_path: String,

    /// Name of the environment variable holding this instance's API key
    pub api_key_secret: String,

    /// Home-relative unless absolute
    #[serde(default)]
    pub root_folder: Option<String>,

    /// qBittorrent category this instance files downloads under
    #[serde(default)]
    pub category: Option<String>,

    /// Quality profile name Jellyseerr should request with
    #[serde(default)]
    pub quality_profile: Option<String>,

    /// Jellyfin libraries; defaults apply when omitted
    #[serde(default)]
    pub libraries: Option<Vec<LibrarySection>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibrarySection {
    pub name: String,
    #[serde(rename = "collectionType", alias = "collection_type")]
    pub collection_type: String,
    /// Home-relative unless absolute
    pub path: String,
}

// ============================================================================
// Media Management
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaManagement {
    /// Hardlink instead of copy (the API flag is the inverse, `hardlinksCopy`)
    #[serde(default = "default_true")]
    pub hardlinks: bool,

    #[serde(default)]
    pub analyze_video: bool,

    #[serde(default = "default_propers")]
    pub propers_and_repacks: String,
}

impl Default for MediaManagement {
    fn default() -> Self {
        Self {
            hardlinks: true,
            analyze_video: false,
            propers_and_repacks: default_propers(),
        }
    }
}

fn default_propers() -> String {
    "doNotPrefer".to_string()
}
