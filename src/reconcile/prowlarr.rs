//! Prowlarr: one application connection per Sonarr/Radarr instance

use super::{Changes, as_array};
use crate::clients::Clients;
use crate::config::{InstanceConfig, ResolvedConfig};
use crate::schema::InstanceType;
use crate::service::{ServiceName, display_name};
use anyhow::{Context, Result};
use declarative::{drifted, entity_id, field_list, field_values, find_where};
use restkit::ServiceClient;
use serde_json::{Map, Value, json};

const APPLICATIONS: &str = "api/v1/applications";
const COMMAND: &str = "api/v1/command";
const SYNC_COMMAND: &str = "ApplicationIndexerSync";

pub fn reconcile(
    config: &ResolvedConfig,
    clients: &Clients,
    changes: &mut Changes<'_>,
) -> Result<()> {
    let prowlarr = config.instance(ServiceName::Prowlarr.as_str())?;
    let client = clients.instance(prowlarr);

    let apps = client.get_json(APPLICATIONS)?;
    let apps = as_array(&apps, "applications")?;

    let mut touched = false;
    for kind in [InstanceType::Sonarr, InstanceType::Radarr] {
        for instance in config.instances_of(kind) {
            touched |= connect(&client, apps, prowlarr, instance, changes)
                .with_context(|| format!("Failed to connect {}", instance.name))?;
        }
    }

    if touched {
        let body = client.post_json(COMMAND, &json!({ "name": SYNC_COMMAND }))?;
        changes.record(&body, format!("Triggered {SYNC_COMMAND}"));
    }
    Ok(())
}

/// Create or update the application for one instance.
///
/// Returns whether a write was issued (or would have been, in dry-run).
fn connect(
    client: &ServiceClient,
    apps: &[Value],
    prowlarr: &InstanceConfig,
    instance: &InstanceConfig,
    changes: &mut Changes<'_>,
) -> Result<bool> {
    let mut fields = Map::new();
    fields.insert("baseUrl".into(), json!(instance.url));
    fields.insert("apiKey".into(), json!(instance.api_key));
    fields.insert("prowlarrUrl".into(), json!(prowlarr.url));

    let name = display_name(&instance.name);
    let existing = find_where(apps, |app| {
        field_values(app).get("baseUrl").and_then(Value::as_str) == Some(instance.url.as_str())
    });

    match existing {
        None => {
            let body = client.post_json(APPLICATIONS, &payload(&name, instance, &fields))?;
            changes.record(&body, format!("Added Prowlarr app: {name}"));
        }
        Some(app) => {
            if drifted(&field_values(app), &fields, &["apiKey"]).is_empty() {
                log::info!("Prowlarr app already configured: {name}");
                return Ok(false);
            }
            let id = entity_id(app).context("application has no id")?;
            let mut payload = payload(&name, instance, &fields);
            payload["id"] = json!(id);
            let body = client.put_json(&format!("{APPLICATIONS}/{id}"), &payload)?;
            changes.record(&body, format!("Updated Prowlarr app: {name}"));
        }
    }
    Ok(true)
}

fn payload(name: &str, instance: &InstanceConfig, fields: &Map<String, Value>) -> Value {
    let implementation = match instance.kind {
        InstanceType::Sonarr => "Sonarr",
        _ => "Radarr",
    };
    json!({
        "name": name,
        "syncLevel": "fullSync",
        "implementation": implementation,
        "configContract": format!("{implementation}Settings"),
        "fields": field_list(fields),
    })
}
