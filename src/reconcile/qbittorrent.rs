//! qBittorrent: global preferences and categories

use super::{Changes, display_value};
use crate::clients::Clients;
use crate::config::{QbittorrentConfig, ResolvedConfig};
use anyhow::{Context, Result};
use declarative::{same_path, values_equal};
use restkit::ServiceClient;
use serde_json::{Map, Value};

const PREFERENCES: &str = "api/v2/app/preferences";
const SET_PREFERENCES: &str = "api/v2/app/setPreferences";
const CATEGORIES: &str = "api/v2/torrents/categories";
const CREATE_CATEGORY: &str = "api/v2/torrents/createCategory";
const EDIT_CATEGORY: &str = "api/v2/torrents/editCategory";

/// Config preference name to API preference key
const PREFERENCE_KEYS: [(&str, &str); 4] = [
    ("torrent_management_mode", "auto_tmm_enabled"),
    ("torrent_content_layout", "torrent_content_layout"),
    ("relocate_on_category_change", "torrent_changed_tmm_enabled"),
    (
        "relocate_on_default_save_path_change",
        "save_path_changed_tmm_enabled",
    ),
];

pub fn reconcile(
    config: &ResolvedConfig,
    clients: &Clients,
    changes: &mut Changes<'_>,
) -> Result<()> {
    let qbit = &config.qbittorrent;
    let client = clients.qbittorrent(qbit);
    client.login()?;

    set_preferences(&client, qbit, changes).context("Failed to reconcile preferences")?;
    set_categories(&client, qbit, changes).context("Failed to reconcile categories")?;
    Ok(())
}

fn api_key_for(config_key: &str) -> Option<&'static str> {
    PREFERENCE_KEYS
        .iter()
        .find(|(key, _)| *key == config_key)
        .map(|(_, api_key)| *api_key)
}

/// Translate a config value to what the API stores
fn api_value(config_key: &str, value: &Value) -> Value {
    match (config_key, value.as_str()) {
        ("torrent_management_mode", Some("automatic")) => Value::Bool(true),
        ("torrent_management_mode", Some("manual")) => Value::Bool(false),
        _ => value.clone(),
    }
}

/// One batched update for the save path and every drifted preference
fn set_preferences(
    client: &ServiceClient,
    qbit: &QbittorrentConfig,
    changes: &mut Changes<'_>,
) -> Result<()> {
    let current = client.get_json(PREFERENCES)?;
    let mut updates = Map::new();
    let mut messages = Vec::new();

    let current_save_path = current
        .get("save_path")
        .and_then(Value::as_str)
        .unwrap_or_default();
    if !same_path(current_save_path, &qbit.default_save_path) {
        updates.insert(
            "save_path".to_string(),
            Value::String(qbit.default_save_path.clone()),
        );
        messages.push(format!("Set default save path: {}", qbit.default_save_path));
    }

    for (config_key, value) in &qbit.preferences {
        let Some(api_key) = api_key_for(config_key) else {
            log::warn!("qBittorrent: unknown preference '{config_key}', ignoring");
            continue;
        };
        let desired = api_value(config_key, value);
        if !values_equal(current.get(api_key).unwrap_or(&Value::Null), &desired) {
            messages.push(format!("Set {api_key}: {}", display_value(&desired)));
            updates.insert(api_key.to_string(), desired);
        }
    }

    if updates.is_empty() {
        log::info!("qBittorrent: all preferences already correct");
        return Ok(());
    }

    let payload = serde_json::to_string(&Value::Object(updates))?;
    let body = client.post_form(SET_PREFERENCES, &[("json", payload.as_str())])?;
    for message in messages {
        changes.record(&body, message);
    }
    Ok(())
}

/// Create missing categories and fix mismatched save paths, one call each
fn set_categories(
    client: &ServiceClient,
    qbit: &QbittorrentConfig,
    changes: &mut Changes<'_>,
) -> Result<()> {
    let current = client.get_json(CATEGORIES)?;
    let empty = Map::new();
    let existing = current.as_object().unwrap_or(&empty);

    for (name, path) in &qbit.categories {
        let form = [("category", name.as_str()), ("savePath", path.as_str())];
        match existing.get(name) {
            None => {
                let body = client.post_form(CREATE_CATEGORY, &form)?;
                changes.record(&body, format!("Created category: {name} (path: {path})"));
            }
            Some(category) => {
                let current_path = category
                    .get("savePath")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                if same_path(current_path, path) {
                    log::info!("qBittorrent: category {name} already correct");
                } else {
                    let body = client.post_form(EDIT_CATEGORY, &form)?;
                    changes.record(&body, format!("Updated category {name} path: {path}"));
                }
            }
        }
    }
    Ok(())
}
