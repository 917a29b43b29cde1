//! The fixed catalogue of managed services

use crate::schema::InstanceType;
use std::fmt;
use std::str::FromStr;

/// A service this tool knows how to reconcile.
///
/// Variant order is dependency order: the download client comes before the
/// library managers, which come before the indexer aggregator, the media
/// server, and finally the request portal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ServiceName {
    Qbittorrent,
    Sonarr,
    Sonarr2,
    Radarr,
    Radarr2,
    Prowlarr,
    Jellyfin,
    Jellyseerr,
}

impl ServiceName {
    /// Every service, in dependency order
    pub const ALL: [Self; 8] = [
        Self::Qbittorrent,
        Self::Sonarr,
        Self::Sonarr2,
        Self::Radarr,
        Self::Radarr2,
        Self::Prowlarr,
        Self::Jellyfin,
        Self::Jellyseerr,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Qbittorrent => "qbittorrent",
            Self::Sonarr => "sonarr",
            Self::Sonarr2 => "sonarr2",
            Self::Radarr => "radarr",
            Self::Radarr2 => "radarr2",
            Self::Prowlarr => "prowlarr",
            Self::Jellyfin => "jellyfin",
            Self::Jellyseerr => "jellyseerr",
        }
    }

    /// Instance type backing this service; `None` for qBittorrent, which is
    /// configured in its own section rather than under `instances`.
    pub fn instance_type(&self) -> Option<InstanceType> {
        match self {
            Self::Qbittorrent => None,
            Self::Sonarr | Self::Sonarr2 => Some(InstanceType::Sonarr),
            Self::Radarr | Self::Radarr2 => Some(InstanceType::Radarr),
            Self::Prowlarr => Some(InstanceType::Prowlarr),
            Self::Jellyfin => Some(InstanceType::Jellyfin),
            Self::Jellyseerr => Some(InstanceType::Jellyseerr),
        }
    }
}

impl fmt::Display for ServiceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|service| service.as_str() == wanted)
            .ok_or_else(|| format!("unknown service '{}'", s.trim()))
    }
}

/// Whether an instance name denotes the 4K deployment (`sonarr2`, `radarr2`)
pub fn is_4k(instance: &str) -> bool {
    instance.ends_with('2')
}

/// Human-facing label for an instance: `sonarr2` becomes `Sonarr 4K`
pub fn display_name(instance: &str) -> String {
    let base = instance.strip_suffix('2').unwrap_or(instance);
    let mut chars = base.chars();
    let mut name = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    };
    if is_4k(instance) {
        name.push_str(" 4K");
    }
    name
}
