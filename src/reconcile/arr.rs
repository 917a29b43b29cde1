//! Sonarr and Radarr: root folder, download client, media management, tags
//!
//! Both speak the same v3 API. The only difference this reconciler cares
//! about is the name of the download-client category field.

use super::{Changes, as_array};
use crate::clients::Clients;
use crate::config::{InstanceConfig, ResolvedConfig};
use crate::schema::InstanceType;
use anyhow::{Context, Result, bail};
use declarative::{
    drifted, entity_id, field_list, field_values, find_by_key, find_where, same_path,
};
use restkit::ServiceClient;
use serde_json::{Map, Value, json};
use std::collections::HashSet;

const ROOT_FOLDER: &str = "api/v3/rootfolder";
const DOWNLOAD_CLIENT: &str = "api/v3/downloadclient";
const MEDIA_MANAGEMENT: &str = "api/v3/config/mediamanagement";
const TAG: &str = "api/v3/tag";

const QBIT_IMPLEMENTATION: &str = "QBittorrent";

pub fn reconcile(
    config: &ResolvedConfig,
    clients: &Clients,
    name: &str,
    changes: &mut Changes<'_>,
) -> Result<()> {
    let instance = config.instance(name)?;
    let category_field = match instance.kind {
        InstanceType::Sonarr => "tvCategory",
        InstanceType::Radarr => "movieCategory",
        other => bail!("instance '{name}' is a {}, not Sonarr or Radarr", other.as_str()),
    };
    let client = clients.instance(instance);

    ensure_root_folder(&client, instance, changes).context("Failed to reconcile root folder")?;
    ensure_download_client(&client, config, instance, category_field, changes)
        .context("Failed to reconcile download client")?;
    set_media_management(&client, config, changes)
        .context("Failed to reconcile media management")?;
    ensure_tags(&client, config.tags_for(instance), changes)
        .context("Failed to reconcile tags")?;
    Ok(())
}

fn ensure_root_folder(
    client: &ServiceClient,
    instance: &InstanceConfig,
    changes: &mut Changes<'_>,
) -> Result<()> {
    let Some(desired) = instance.root_folder.as_deref() else {
        log::debug!("{}: no root folder configured", instance.name);
        return Ok(());
    };

    let folders = client.get_json(ROOT_FOLDER)?;
    let exists = find_where(as_array(&folders, "root folders")?, |folder| {
        folder
            .get("path")
            .and_then(Value::as_str)
            .is_some_and(|path| same_path(path, desired))
    })
    .is_some();

    if exists {
        log::info!("{}: root folder already exists: {desired}", instance.name);
    } else {
        let body = client.post_json(ROOT_FOLDER, &json!({ "path": desired }))?;
        changes.record(&body, format!("Added root folder: {desired}"));
    }
    Ok(())
}

/// Desired `fields` of the qBittorrent download client, in payload order
fn download_client_fields(
    config: &ResolvedConfig,
    instance: &InstanceConfig,
    category_field: &str,
) -> Map<String, Value> {
    let qbit = &config.qbittorrent;
    let mut fields = Map::new();
    fields.insert("host".into(), json!(config.server_host));
    fields.insert("port".into(), json!(config.port));
    fields.insert("urlBase".into(), json!(qbit.app_path));
    fields.insert("username".into(), json!(qbit.username));
    fields.insert("password".into(), json!(qbit.password));
    fields.insert(
        category_field.into(),
        json!(instance.category.as_deref().unwrap_or_default()),
    );
    fields.insert("useSsl".into(), json!(config.use_ssl));
    fields
}

fn download_client_payload(fields: &Map<String, Value>) -> Value {
    json!({
        "name": "qBittorrent",
        "implementation": QBIT_IMPLEMENTATION,
        "configContract": "QBittorrentSettings",
        "enable": true,
        "protocol": "torrent",
        "fields": field_list(fields),
    })
}

fn ensure_download_client(
    client: &ServiceClient,
    config: &ResolvedConfig,
    instance: &InstanceConfig,
    category_field: &str,
    changes: &mut Changes<'_>,
) -> Result<()> {
    let existing = client.get_json(DOWNLOAD_CLIENT)?;
    let existing = find_by_key(
        as_array(&existing, "download clients")?,
        "implementation",
        QBIT_IMPLEMENTATION,
    );
    let desired = download_client_fields(config, instance, category_field);

    let Some(current) = existing else {
        let body = client.post_json(DOWNLOAD_CLIENT, &download_client_payload(&desired))?;
        changes.record(&body, "Added qBittorrent download client");
        return Ok(());
    };

    // The API masks the password, so the config value is always sent and never compared
    let drift = drifted(&field_values(current), &desired, &["password"]);
    if drift.is_empty() {
        log::info!("{}: download client already configured correctly", instance.name);
        return Ok(());
    }
    log::debug!("{}: download client drifted on {}", instance.name, drift.join(", "));

    let id = entity_id(current).context("download client has no id")?;
    let mut payload = download_client_payload(&desired);
    payload["id"] = json!(id);
    let body = client.put_json(&format!("{DOWNLOAD_CLIENT}/{id}"), &payload)?;
    changes.record(&body, "Updated qBittorrent download client settings");
    Ok(())
}

/// Read-modify-write of the media-management settings
fn set_media_management(
    client: &ServiceClient,
    config: &ResolvedConfig,
    changes: &mut Changes<'_>,
) -> Result<()> {
    let policy = &config.media_management;
    let current = client.get_json(MEDIA_MANAGEMENT)?;
    let Some(current) = current.as_object() else {
        bail!("media management settings are not an object");
    };

    let hardlinks_copy = !policy.hardlinks;
    let desired = [
        (
            "hardlinksCopy",
            json!(hardlinks_copy),
            format!(
                "Set hardlinks: {}",
                if policy.hardlinks { "enabled" } else { "disabled" }
            ),
        ),
        (
            "enableMediaInfo",
            json!(policy.analyze_video),
            format!("Set analyze video: {}", policy.analyze_video),
        ),
        (
            "downloadPropersAndRepacks",
            json!(policy.propers_and_repacks),
            format!("Set propers/repacks: {}", policy.propers_and_repacks),
        ),
    ];

    let mut payload = current.clone();
    let mut messages = Vec::new();
    for (key, value, message) in desired {
        if current.get(key) != Some(&value) {
            payload.insert(key.to_string(), value);
            messages.push(message);
        }
    }

    if messages.is_empty() {
        log::info!("{}: media management settings already correct", client.service());
        return Ok(());
    }

    let body = client.put_json(MEDIA_MANAGEMENT, &Value::Object(payload))?;
    for message in messages {
        changes.record(&body, message);
    }
    Ok(())
}

/// Create any missing tags; labels match case-insensitively
fn ensure_tags(
    client: &ServiceClient,
    desired: &[String],
    changes: &mut Changes<'_>,
) -> Result<()> {
    if desired.is_empty() {
        return Ok(());
    }

    let existing = client.get_json(TAG)?;
    let mut labels: HashSet<String> = as_array(&existing, "tags")?
        .iter()
        .filter_map(|tag| tag.get("label").and_then(Value::as_str))
        .map(str::to_lowercase)
        .collect();

    for tag in desired {
        if labels.insert(tag.to_lowercase()) {
            let body = client.post_json(TAG, &json!({ "label": tag }))?;
            changes.record(&body, format!("Created tag: {tag}"));
        } else {
            log::info!("{}: tag already exists: {tag}", client.service());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::testing;
    use crate::config::fixture;
    use crate::reconcile::collect;
    use restkit::{Method, MockTransport, Request};

    fn run(
        config: &ResolvedConfig,
        mock: &MockTransport,
        dry_run: bool,
        name: &str,
    ) -> Result<Vec<String>> {
        let clients = testing::clients(mock, dry_run);
        collect(|changes| reconcile(config, &clients, name, changes))
    }

    const RADARR: &str = "https://alice.lw1.usbx.me/radarr";

    fn url(path: &str) -> String {
        format!("{RADARR}/{path}")
    }

    fn converged_client(category: &str) -> Value {
        json!({
            "id": 4,
            "name": "qBittorrent",
            "implementation": "QBittorrent",
            "fields": [
                {"name": "host", "value": "alice.lw1.usbx.me"},
                {"name": "port", "value": 443},
                {"name": "urlBase", "value": "/qbittorrent"},
                {"name": "username", "value": "qbit"},
                {"name": "password", "value": "********"},
                {"name": "movieCategory", "value": category},
                {"name": "useSsl", "value": true}
            ]
        })
    }

    fn converged_media() -> Value {
        json!({
            "id": 1,
            "hardlinksCopy": false,
            "enableMediaInfo": false,
            "downloadPropersAndRepacks": "doNotPrefer",
            "recycleBin": ""
        })
    }

    /// A Radarr with the given state on every endpoint; writes answer 201
    fn radarr(folders: Value, clients: Value, media: Value, tags: Value) -> MockTransport {
        let mock = MockTransport::new();
        mock.on_json(Method::Get, &url(ROOT_FOLDER), 200, &folders);
        mock.on_json(Method::Get, &url(DOWNLOAD_CLIENT), 200, &clients);
        mock.on_json(Method::Get, &url(MEDIA_MANAGEMENT), 200, &media);
        mock.on_json(Method::Get, &url(TAG), 200, &tags);
        mock.on_json(Method::Post, &url(ROOT_FOLDER), 201, &json!({"id": 1}));
        mock.on_json(Method::Post, &url(DOWNLOAD_CLIENT), 201, &json!({"id": 4}));
        mock.on_json(Method::Put, &url("api/v3/downloadclient/4"), 202, &json!({"id": 4}));
        mock.on_json(Method::Put, &url(MEDIA_MANAGEMENT), 202, &json!({"id": 1}));
        mock.on_json(Method::Post, &url(TAG), 201, &json!({"id": 9}));
        mock
    }

    fn converged() -> MockTransport {
        radarr(
            json!([{"id": 1, "path": "/home/alice/media/movies"}]),
            json!([converged_client("radarr")]),
            converged_media(),
            json!([{"id": 1, "label": "Kids"}]),
        )
    }

    fn field<'a>(request: &'a Request, name: &str) -> &'a Value {
        let fields = request.json_body().unwrap()["fields"].as_array().unwrap();
        &fields.iter().find(|f| f["name"] == name).unwrap()["value"]
    }

    #[test]
    fn test_first_run_then_second_run_is_noop() {
        let config = fixture::config();
        let media = json!({"id": 1, "hardlinksCopy": true});
        let empty = radarr(json!([]), json!([]), media, json!([]));

        let changes = run(&config, &empty, false, "radarr").unwrap();
        assert_eq!(
            changes,
            vec![
                "Added root folder: /home/alice/media/movies",
                "Added qBittorrent download client",
                "Set hardlinks: enabled",
                "Set analyze video: false",
                "Set propers/repacks: doNotPrefer",
                "Created tag: kids",
            ]
        );

        let again = converged();
        let changes = run(&config, &again, false, "radarr").unwrap();
        assert!(changes.is_empty());
        assert!(again.writes().is_empty());
    }

    #[test]
    fn test_root_folder_scenario() {
        let config = fixture::config();
        let mock = radarr(
            json!([]),
            json!([converged_client("radarr")]),
            converged_media(),
            json!([{"label": "kids"}]),
        );

        let changes = run(&config, &mock, false, "radarr").unwrap();
        assert_eq!(changes, vec!["Added root folder: /home/alice/media/movies"]);
        let posted = mock.requests_to(Method::Post, &url(ROOT_FOLDER));
        assert_eq!(posted[0].json_body(), Some(&json!({"path": "/home/alice/media/movies"})));
    }

    #[test]
    fn test_category_change_updates_once_with_config_password() {
        let config = fixture::config();
        let mock = radarr(
            json!([{"path": "/home/alice/media/movies"}]),
            json!([converged_client("movies-old")]),
            converged_media(),
            json!([{"label": "kids"}]),
        );

        let changes = run(&config, &mock, false, "radarr").unwrap();
        assert_eq!(changes, vec!["Updated qBittorrent download client settings"]);

        let writes = mock.writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].url, url("api/v3/downloadclient/4"));
        assert_eq!(writes[0].json_body().unwrap()["id"], 4);
        assert_eq!(field(&writes[0], "movieCategory"), "radarr");
        assert_eq!(field(&writes[0], "password"), "qbit-pass");
    }

    #[test]
    fn test_media_management_merges_current() {
        let config = fixture::config();
        let mut media = converged_media();
        media["enableMediaInfo"] = json!(true);
        let mock = radarr(
            json!([{"path": "/home/alice/media/movies"}]),
            json!([converged_client("radarr")]),
            media,
            json!([{"label": "kids"}]),
        );

        let changes = run(&config, &mock, false, "radarr").unwrap();
        assert_eq!(changes, vec!["Set analyze video: false"]);
        let put = mock.requests_to(Method::Put, &url(MEDIA_MANAGEMENT));
        let body = put[0].json_body().unwrap();
        assert_eq!(body["enableMediaInfo"], false);
        assert_eq!(body["recycleBin"], "");
        assert_eq!(body["id"], 1);
    }

    #[test]
    fn test_dry_run_records_nothing() {
        let config = fixture::config();
        let mock = radarr(json!([]), json!([]), json!({}), json!([]));

        let changes = run(&config, &mock, true, "radarr").unwrap();
        assert!(changes.is_empty());
        assert!(mock.writes().is_empty());
        assert_eq!(mock.requests().len(), 4);
    }

    #[test]
    fn test_sonarr_uses_tv_category() {
        let config = fixture::config();
        let base = "https://alice.lw1.usbx.me/sonarr";
        let mock = MockTransport::new();
        let url = |path: &str| format!("{base}/{path}");
        let folders = json!([{"path": "/home/alice/media/tv"}]);
        mock.on_json(Method::Get, &url(ROOT_FOLDER), 200, &folders);
        mock.on_json(Method::Get, &url(DOWNLOAD_CLIENT), 200, &json!([]));
        mock.on_json(Method::Get, &url(MEDIA_MANAGEMENT), 200, &converged_media());
        mock.on_json(Method::Get, &url(TAG), 200, &json!([{"label": "anime"}]));
        mock.on_json(Method::Post, &url(DOWNLOAD_CLIENT), 201, &json!({}));

        let changes = run(&config, &mock, false, "sonarr").unwrap();
        assert_eq!(changes, vec!["Added qBittorrent download client"]);
        let posted = &mock.writes()[0];
        assert_eq!(field(posted, "tvCategory"), "tv-sonarr");
        assert_eq!(posted.json_body().unwrap()["implementation"], "QBittorrent");
    }

    #[test]
    fn test_tags_created_once_per_label() {
        let config = fixture::config();
        let mock = converged();
        let desired = vec!["Kids".to_string(), "kids".to_string(), "family".to_string()];
        let client = testing::clients(&mock, false).instance(config.instance("radarr").unwrap());

        let changes = collect(|changes| ensure_tags(&client, &desired, changes)).unwrap();
        assert_eq!(changes, vec!["Created tag: family"]);
        assert_eq!(mock.requests_to(Method::Post, &url(TAG)).len(), 1);
    }

    #[test]
    fn test_missing_instance_fails() {
        let config = fixture::config();
        let mock = MockTransport::new();
        let err = run(&config, &mock, false, "sonarr2").unwrap_err();
        assert!(err.to_string().contains("sonarr2"));
        assert!(mock.requests().is_empty());
    }

    #[test]
    fn test_server_error_aborts_service() {
        let config = fixture::config();
        let mock = MockTransport::new();
        mock.on(Method::Get, &url(ROOT_FOLDER), restkit::RawResponse::text(500, "boom"));

        let err = run(&config, &mock, false, "radarr").unwrap_err();
        assert!(format!("{err:#}").contains("root folder"));
        assert_eq!(mock.requests().len(), 3);
    }
}
