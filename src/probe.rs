//! Connectivity prober
//!
//! One cheap read per requested service before anything is mutated. A
//! service that fails its probe is left out of the run and reported as
//! skipped, not failed.

use crate::clients::Clients;
use crate::config::ResolvedConfig;
use crate::schema::InstanceType;
use crate::service::ServiceName;
use anyhow::{Result, bail};

/// Health endpoint for an instance type
fn health_endpoint(kind: InstanceType) -> &'static str {
    match kind {
        InstanceType::Sonarr | InstanceType::Radarr => "api/v3/system/status",
        InstanceType::Prowlarr => "api/v1/system/status",
        InstanceType::Jellyfin => "System/Info",
        InstanceType::Jellyseerr => "api/v1/status",
    }
}

fn check(config: &ResolvedConfig, clients: &Clients, service: ServiceName) -> Result<()> {
    let Some(expected) = service.instance_type() else {
        // Login doubles as the health check
        clients.qbittorrent(&config.qbittorrent).login()?;
        return Ok(());
    };

    let instance = config.instance(service.as_str())?;
    if instance.kind != expected {
        bail!(
            "instance '{service}' is configured as {}, expected {}",
            instance.kind.as_str(),
            expected.as_str()
        );
    }
    clients.instance(instance).get(health_endpoint(instance.kind))?;
    Ok(())
}

/// The requested services that answered, in the order given
pub fn probe(
    config: &ResolvedConfig,
    clients: &Clients,
    requested: &[ServiceName],
) -> Vec<ServiceName> {
    requested
        .iter()
        .copied()
        .filter(|&service| match check(config, clients, service) {
            Ok(()) => {
                log::info!("[probe] {service}: OK");
                true
            }
            Err(e) => {
                log::warn!("[probe] {service}: UNREACHABLE ({e:#})");
                false
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::testing;
    use crate::config::fixture;
    use restkit::{Method, MockTransport, RawResponse};
    use serde_json::json;

    const BASE: &str = "https://alice.lw1.usbx.me";

    #[test]
    fn test_reachable_subset() {
        let config = fixture::config();
        let mock = MockTransport::new();
        mock.on(
            Method::Post,
            &format!("{BASE}/qbittorrent/api/v2/auth/login"),
            RawResponse::text(200, "Ok.").with_header("set-cookie", "SID=abc123"),
        );
        mock.on_json(
            Method::Get,
            &format!("{BASE}/sonarr/api/v3/system/status"),
            200,
            &json!({"version": "4.0.0"}),
        );
        mock.on_json(
            Method::Get,
            &format!("{BASE}/prowlarr/api/v1/system/status"),
            200,
            &json!({}),
        );
        mock.fail(
            Method::Get,
            &format!("{BASE}/radarr/api/v3/system/status"),
            "connection refused",
        );
        mock.on_json(Method::Get, &format!("{BASE}/jellyfin/System/Info"), 200, &json!({}));

        let requested = [
            ServiceName::Qbittorrent,
            ServiceName::Sonarr,
            ServiceName::Radarr,
            ServiceName::Prowlarr,
            ServiceName::Jellyfin,
            ServiceName::Jellyseerr,
        ];
        let reachable = probe(&config, &testing::clients(&mock, false), &requested);
        assert_eq!(
            reachable,
            vec![
                ServiceName::Qbittorrent,
                ServiceName::Sonarr,
                ServiceName::Prowlarr,
                ServiceName::Jellyfin,
            ]
        );
        // connection failures are retried before giving up
        let radarr = format!("{BASE}/radarr/api/v3/system/status");
        assert_eq!(mock.requests_to(Method::Get, &radarr).len(), 3);
    }

    #[test]
    fn test_bad_qbittorrent_credentials_unreachable() {
        let config = fixture::config();
        let mock = MockTransport::new();
        mock.on(
            Method::Post,
            &format!("{BASE}/qbittorrent/api/v2/auth/login"),
            RawResponse::text(200, "Fails."),
        );
        let clients = testing::clients(&mock, false);
        let reachable = probe(&config, &clients, &[ServiceName::Qbittorrent]);
        assert!(reachable.is_empty());
    }

    #[test]
    fn test_unconfigured_instance_unreachable() {
        let config = fixture::config();
        let mock = MockTransport::new();
        let reachable = probe(&config, &testing::clients(&mock, false), &[ServiceName::Sonarr2]);
        assert!(reachable.is_empty());
        assert!(mock.requests().is_empty());
    }

    #[test]
    fn test_mistyped_instance_unreachable() {
        let mut config = fixture::config();
        config.instances.get_mut("sonarr").unwrap().kind = InstanceType::Radarr;
        let mock = MockTransport::new();
        let reachable = probe(&config, &testing::clients(&mock, false), &[ServiceName::Sonarr]);
        assert!(reachable.is_empty());
        assert!(mock.requests().is_empty());
    }

    #[test]
    fn test_probe_runs_in_dry_run() {
        let config = fixture::config();
        let mock = MockTransport::new();
        mock.on_json(Method::Get, &format!("{BASE}/jellyseerr/api/v1/status"), 200, &json!({}));
        let reachable = probe(&config, &testing::clients(&mock, true), &[ServiceName::Jellyseerr]);
        assert_eq!(reachable, vec![ServiceName::Jellyseerr]);
    }
}
