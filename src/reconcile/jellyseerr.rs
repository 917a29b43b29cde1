//! Jellyseerr: Sonarr and Radarr server connections
//!
//! Profile ids are resolved against each target instance's own API before
//! the connection payload is built. A profile name the instance does not
//! know degrades to a warning. A lookup that fails outright fails the
//! service, so a flaky instance never overwrites a correct connection.

use super::{Changes, as_array};
use crate::clients::Clients;
use crate::config::{InstanceConfig, ResolvedConfig};
use crate::schema::InstanceType;
use crate::service::{ServiceName, display_name, is_4k};
use anyhow::{Context, Result};
use declarative::{drifted_object, entity_id, find_by_key, find_by_key_ignore_case};
use restkit::{Error as HttpError, ServiceClient};
use serde_json::{Map, Value, json};

const QUALITY_PROFILE: &str = "api/v3/qualityprofile";
const LANGUAGE_PROFILE: &str = "api/v3/languageprofile";

/// Used when Sonarr has no language-profile endpoint (v4) or no profiles
const FALLBACK_LANGUAGE_PROFILE: i64 = 1;

pub fn reconcile(
    config: &ResolvedConfig,
    clients: &Clients,
    changes: &mut Changes<'_>,
) -> Result<()> {
    let instance = config.instance(ServiceName::Jellyseerr.as_str())?;
    let client = clients.instance(instance);

    for kind in [InstanceType::Sonarr, InstanceType::Radarr] {
        configure_servers(&client, config, clients, kind, changes)
            .with_context(|| format!("Failed to configure {} servers", kind.as_str()))?;
    }
    Ok(())
}

fn configure_servers(
    client: &ServiceClient,
    config: &ResolvedConfig,
    clients: &Clients,
    kind: InstanceType,
    changes: &mut Changes<'_>,
) -> Result<()> {
    let settings = format!("api/v1/settings/{}", kind.as_str());
    let label = display_name(kind.as_str());

    let existing = client.get_json(&settings)?;
    let existing = as_array(&existing, "servers")?;

    for instance in config.instances_of(kind) {
        let payload = server_payload(config, clients, instance)
            .with_context(|| format!("Failed to resolve profiles on {}", instance.name))?;
        let Some(server) = find_by_key(existing, "baseUrl", &instance.app_path) else {
            let body = client.post_json(&settings, &Value::Object(payload))?;
            changes.record(
                &body,
                format!("Added Jellyseerr {label} server: {}", instance.name),
            );
            continue;
        };

        // apiKey is never echoed back
        if drifted_object(server, &payload, &["apiKey"]).is_empty() {
            log::info!("Jellyseerr {label} server already configured: {}", instance.name);
            continue;
        }

        // The id is read-only and travels in the URL only
        let id = entity_id(server).context("server has no id")?;
        let body = client.put_json(&format!("{settings}/{id}"), &Value::Object(payload))?;
        changes.record(
            &body,
            format!("Updated Jellyseerr {label} server: {}", instance.name),
        );
    }
    Ok(())
}

fn server_payload(
    config: &ResolvedConfig,
    clients: &Clients,
    instance: &InstanceConfig,
) -> Result<Map<String, Value>> {
    let arr = clients.instance(instance);
    let (profile_id, profile_name) = resolve_quality_profile(&arr, instance)?;
    let four_k = is_4k(&instance.name);

    let mut payload = Map::new();
    payload.insert("name".into(), json!(display_name(&instance.name)));
    payload.insert("hostname".into(), json!(config.server_host));
    payload.insert("port".into(), json!(config.port));
    payload.insert("useSsl".into(), json!(config.use_ssl));
    payload.insert("apiKey".into(), json!(instance.api_key));
    payload.insert("baseUrl".into(), json!(instance.app_path));
    payload.insert("activeProfileId".into(), json!(profile_id));
    payload.insert("activeProfileName".into(), json!(profile_name));
    payload.insert(
        "activeDirectory".into(),
        json!(instance.root_folder.as_deref().unwrap_or_default()),
    );
    payload.insert("isDefault".into(), json!(!four_k));
    payload.insert("is4k".into(), json!(four_k));

    match instance.kind {
        InstanceType::Sonarr => {
            payload.insert(
                "activeLanguageProfileId".into(),
                json!(resolve_language_profile(&arr, instance)?),
            );
            payload.insert("enableSeasonFolders".into(), json!(true));
        }
        _ => {
            payload.insert("minimumAvailability".into(), json!("released"));
        }
    }
    Ok(payload)
}

/// Quality profile (id, name) on the target instance.
///
/// No configured name yields `(0, "")` without a lookup. An unknown name
/// falls back to the first profile with a warning.
fn resolve_quality_profile(
    arr: &ServiceClient,
    instance: &InstanceConfig,
) -> restkit::Result<(i64, String)> {
    let Some(wanted) = instance.quality_profile.as_deref() else {
        return Ok((0, String::new()));
    };

    let profiles = arr.get_json(QUALITY_PROFILE)?;
    let profiles = profiles.as_array().map(Vec::as_slice).unwrap_or_default();

    let chosen = find_by_key(profiles, "name", wanted).or_else(|| {
        log::warn!(
            "Quality profile '{wanted}' not found on {}, using first available",
            instance.name
        );
        profiles.first()
    });

    Ok(chosen
        .and_then(|profile| {
            let id = entity_id(profile)?;
            let name = profile.get("name")?.as_str()?;
            Some((id, name.to_string()))
        })
        .unwrap_or((0, String::new())))
}

/// Sonarr v3 language profile: English if present, else the first one.
///
/// Sonarr v4 dropped the endpoint, so a 404 means the fallback id.
fn resolve_language_profile(
    arr: &ServiceClient,
    instance: &InstanceConfig,
) -> restkit::Result<i64> {
    let profiles = match arr.get_json(LANGUAGE_PROFILE) {
        Ok(profiles) => profiles,
        Err(HttpError::ClientHttp { status: 404, .. }) => {
            log::warn!(
                "{} has no language profiles endpoint, using id {FALLBACK_LANGUAGE_PROFILE}",
                instance.name
            );
            return Ok(FALLBACK_LANGUAGE_PROFILE);
        }
        Err(e) => return Err(e),
    };
    let profiles = profiles.as_array().map(Vec::as_slice).unwrap_or_default();

    Ok(find_by_key_ignore_case(profiles, "name", "english")
        .or_else(|| profiles.first())
        .and_then(entity_id)
        .unwrap_or(FALLBACK_LANGUAGE_PROFILE))
}
