//! Per-service reconcilers
//!
//! Each reconciler fetches the live collection, works out the desired
//! entries from the resolved config, matches them by natural key, and
//! creates or updates only what differs. Running one twice in a row makes
//! no writes the second time.

mod arr;
mod jellyfin;
mod jellyseerr;
mod prowlarr;
mod qbittorrent;

use crate::clients::Clients;
use crate::config::ResolvedConfig;
use crate::service::ServiceName;
use anyhow::{Result, bail};
use restkit::Body;
use serde_json::Value;

/// Run the reconciler for one service.
///
/// Applied changes land in `applied` as they happen, so a reconciler that
/// fails halfway still reports what it already changed.
pub fn reconcile(
    service: ServiceName,
    config: &ResolvedConfig,
    clients: &Clients,
    applied: &mut Vec<String>,
) -> Result<()> {
    let changes = &mut Changes(applied);
    match service {
        ServiceName::Qbittorrent => qbittorrent::reconcile(config, clients, changes),
        ServiceName::Sonarr | ServiceName::Sonarr2 | ServiceName::Radarr | ServiceName::Radarr2 => {
            arr::reconcile(config, clients, service.as_str(), changes)
        }
        ServiceName::Prowlarr => prowlarr::reconcile(config, clients, changes),
        ServiceName::Jellyfin => jellyfin::reconcile(config, clients, changes),
        ServiceName::Jellyseerr => jellyseerr::reconcile(config, clients, changes),
    }
}

/// Ordered change descriptions for one service
#[derive(Debug)]
struct Changes<'a>(&'a mut Vec<String>);

impl Changes<'_> {
    /// Record a change if the write reached the service
    ///
    /// A dry-run write only logs what it would have done.
    fn record(&mut self, body: &Body, message: impl Into<String>) {
        let message = message.into();
        if body.is_applied() {
            self.0.push(message);
        } else {
            log::info!("[DRY-RUN] {message}");
        }
    }
}

/// Run a reconciler against a fresh change list
#[cfg(test)]
fn collect<F>(run: F) -> Result<Vec<String>>
where
    F: FnOnce(&mut Changes<'_>) -> Result<()>,
{
    let mut applied = Vec::new();
    run(&mut Changes(&mut applied))?;
    Ok(applied)
}

/// Borrow a fetched collection, failing on any other shape
fn as_array<'a>(value: &'a Value, what: &str) -> Result<&'a [Value]> {
    match value {
        Value::Array(items) => Ok(items.as_slice()),
        Value::Null => Ok(&[][..]),
        other => bail!("expected a list of {what}, got: {}", truncate(&other.to_string())),
    }
}

/// Scalar for change messages: strings unquoted
fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn truncate(text: &str) -> String {
    const MAX: usize = 120;
    if text.chars().count() <= MAX {
        text.to_string()
    } else {
        let cut: String = text.chars().take(MAX).collect();
        format!("{cut}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::testing;
    use crate::config::fixture;
    use restkit::{Method, MockTransport, RawResponse};
    use serde_json::json;

    #[test]
    fn test_changes_skip_dry_run_writes() {
        let mut applied = Vec::new();
        let mut changes = Changes(&mut applied);
        changes.record(&Body::Json(Value::Null), "Created tag: anime");
        changes.record(&Body::Skipped, "Created tag: kids");
        assert_eq!(applied, vec!["Created tag: anime".to_string()]);
    }

    #[test]
    fn test_partial_changes_survive_failure() {
        let config = fixture::config();
        let mock = MockTransport::new();
        let clients = testing::clients(&mock, false);
        let url = |path: &str| format!("https://alice.lw1.usbx.me/jellyfin/{path}");
        mock.on_json(Method::Get, &url("Library/VirtualFolders"), 200, &json!([]));
        mock.on_json(Method::Post, &url("Library/VirtualFolders"), 204, &Value::Null);
        mock.on(
            Method::Post,
            &url("Library/Refresh"),
            RawResponse::text(400, "refresh rejected"),
        );

        let mut applied = Vec::new();
        let result = reconcile(ServiceName::Jellyfin, &config, &clients, &mut applied);
        assert!(result.is_err());
        assert_eq!(applied.len(), 4);
        assert!(applied[0].starts_with("Created library: "));
    }

    #[test]
    fn test_as_array() {
        assert_eq!(as_array(&json!([1, 2]), "tags").unwrap().len(), 2);
        assert!(as_array(&Value::Null, "tags").unwrap().is_empty());
        let err = as_array(&json!({"error": "nope"}), "tags").unwrap_err();
        assert!(err.to_string().starts_with("expected a list of tags"));
    }

    #[test]
    fn test_display_value() {
        assert_eq!(display_value(&json!("Subfolder")), "Subfolder");
        assert_eq!(display_value(&json!(true)), "true");
        assert_eq!(display_value(&json!(3)), "3");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short"), "short");
        assert_eq!(truncate(&"x".repeat(200)).len(), 123);
    }
}
