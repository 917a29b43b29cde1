//! Client factory shared by the prober and the reconcilers

use crate::config::{InstanceConfig, QbittorrentConfig};
use crate::schema::InstanceType;
use restkit::{Auth, RetryConfig, ServiceClient, Transport};
use std::sync::Arc;

/// Transport, retry policy, and dry-run flag for one run
pub struct Clients {
    transport: Arc<dyn Transport>,
    retry: RetryConfig,
    dry_run: bool,
}

impl Clients {
    pub fn new(transport: Arc<dyn Transport>, dry_run: bool) -> Self {
        Self {
            transport,
            retry: RetryConfig::default(),
            dry_run,
        }
    }

    #[cfg(test)]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    fn build(&self, service: &str, url: &str, auth: Auth) -> ServiceClient {
        ServiceClient::new(service, url, auth, Arc::clone(&self.transport))
            .with_retry(self.retry.clone())
            .with_dry_run(self.dry_run)
    }

    /// Session-authenticated qBittorrent client
    pub fn qbittorrent(&self, qbit: &QbittorrentConfig) -> ServiceClient {
        let auth = Auth::Session {
            username: qbit.username.clone(),
            password: qbit.password.clone(),
        };
        self.build("qbittorrent", &qbit.url, auth)
    }

    /// Client for an instance, authenticated the way its software expects
    pub fn instance(&self, instance: &InstanceConfig) -> ServiceClient {
        let key = instance.api_key.clone();
        let auth = match instance.kind {
            InstanceType::Jellyfin => Auth::MediaBrowser(key),
            InstanceType::Sonarr
            | InstanceType::Radarr
            | InstanceType::Prowlarr
            | InstanceType::Jellyseerr => Auth::ApiKey(key),
        };
        self.build(&instance.name, &instance.url, auth)
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use restkit::MockTransport;
    use std::time::Duration;

    /// Clients over a mock transport with millisecond backoff
    pub fn clients(mock: &MockTransport, dry_run: bool) -> Clients {
        Clients::new(Arc::new(mock.clone()), dry_run)
            .with_retry(RetryConfig::new(3, Duration::from_millis(1), 1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::fixture;
    use restkit::{Method, MockTransport};

    #[test]
    fn test_auth_per_instance_type() {
        let config = fixture::config();
        let mock = MockTransport::new();
        let clients = testing::clients(&mock, false);

        let _ = clients.instance(config.instance("jellyfin").unwrap()).get("System/Info");
        let _ = clients.instance(config.instance("sonarr").unwrap()).get("api/v3/tag");

        let requests = mock.requests();
        assert_eq!(
            requests[0].header_value("Authorization"),
            Some("MediaBrowser Token=\"jellyfin-key\"")
        );
        assert_eq!(requests[1].header_value("X-Api-Key"), Some("sonarr-key"));
        assert_eq!(requests[1].url, "https://alice.lw1.usbx.me/sonarr/api/v3/tag");
    }

    #[test]
    fn test_dry_run_propagates() {
        let config = fixture::config();
        let mock = MockTransport::new();
        let clients = testing::clients(&mock, true);
        assert!(clients.is_dry_run());

        let client = clients.instance(config.instance("radarr").unwrap());
        assert!(client.is_dry_run());
        let body = client.post_empty("api/v3/command").unwrap();
        assert!(!body.is_applied());
        assert!(mock.requests_to(Method::Post, &client.url("api/v3/command")).is_empty());
    }
}
