//! Jellyfin: media libraries

use super::{Changes, as_array};
use crate::clients::Clients;
use crate::config::ResolvedConfig;
use crate::schema::LibrarySection;
use crate::service::ServiceName;
use anyhow::Result;
use restkit::{Method, RequestBody};
use serde_json::{Value, json};
use std::collections::HashSet;

const VIRTUAL_FOLDERS: &str = "Library/VirtualFolders";
const REFRESH: &str = "Library/Refresh";

/// Libraries created when the config declares none
fn default_libraries() -> Vec<LibrarySection> {
    [
        ("TV Shows", "tvshows", "media/all/tv"),
        ("TV Shows UHD", "tvshows", "media/all/tv-uhd"),
        ("Movies", "movies", "media/all/movies"),
        ("Movies UHD", "movies", "media/all/movies-uhd"),
    ]
    .into_iter()
    .map(|(name, collection_type, path)| LibrarySection {
        name: name.to_string(),
        collection_type: collection_type.to_string(),
        path: path.to_string(),
    })
    .collect()
}

pub fn reconcile(
    config: &ResolvedConfig,
    clients: &Clients,
    changes: &mut Changes<'_>,
) -> Result<()> {
    let instance = config.instance(ServiceName::Jellyfin.as_str())?;
    let client = clients.instance(instance);
    let libraries = instance.libraries.clone().unwrap_or_else(default_libraries);

    let existing = client.get_json(VIRTUAL_FOLDERS)?;
    let existing: HashSet<&str> = as_array(&existing, "libraries")?
        .iter()
        .filter_map(|folder| folder.get("Name").and_then(Value::as_str))
        .collect();

    let mut created_any = false;
    for library in &libraries {
        if existing.contains(library.name.as_str()) {
            log::info!("Jellyfin library already exists: {}", library.name);
            continue;
        }

        let path = config.home_path(&library.path);
        // Refresh once at the end rather than per library
        let query = [
            ("name", library.name.as_str()),
            ("collectionType", library.collection_type.as_str()),
            ("paths", path.as_str()),
            ("refreshLibrary", "false"),
        ];
        let body = client.send(
            Method::Post,
            VIRTUAL_FOLDERS,
            &query,
            RequestBody::Json(json!({ "LibraryOptions": {} })),
        )?;
        changes.record(&body, format!("Created library: {} ({path})", library.name));
        created_any = true;
    }

    if created_any {
        let body = client.post_empty(REFRESH)?;
        changes.record(&body, "Triggered library refresh");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::testing;
    use crate::config::fixture;
    use crate::reconcile::collect;
    use restkit::{MockTransport, RawResponse};

    fn run(config: &ResolvedConfig, mock: &MockTransport, dry_run: bool) -> Result<Vec<String>> {
        let clients = testing::clients(mock, dry_run);
        collect(|changes| reconcile(config, &clients, changes))
    }

    const JELLYFIN: &str = "https://alice.lw1.usbx.me/jellyfin";

    fn url(path: &str) -> String {
        format!("{JELLYFIN}/{path}")
    }

    fn mock_with(folders: &Value) -> MockTransport {
        let mock = MockTransport::new();
        mock.on_json(Method::Get, &url(VIRTUAL_FOLDERS), 200, folders);
        mock.on(Method::Post, &url(VIRTUAL_FOLDERS), RawResponse::new(204, ""));
        mock.on(Method::Post, &url(REFRESH), RawResponse::new(204, ""));
        mock
    }

    #[test]
    fn test_creates_missing_defaults_and_refreshes_once() {
        let config = fixture::config();
        let mock = mock_with(&json!([{"Name": "TV Shows"}, {"Name": "Movies"}]));

        let changes = run(&config, &mock, false).unwrap();
        assert_eq!(
            changes,
            vec![
                "Created library: TV Shows UHD (/home/alice/media/all/tv-uhd)",
                "Created library: Movies UHD (/home/alice/media/all/movies-uhd)",
                "Triggered library refresh",
            ]
        );

        let created = mock.requests_to(Method::Post, &url(VIRTUAL_FOLDERS));
        assert_eq!(created.len(), 2);
        let query = &created[0].query;
        assert!(query.contains(&("collectionType".into(), "tvshows".into())));
        assert!(query.contains(&("paths".into(), "/home/alice/media/all/tv-uhd".into())));
        assert!(query.contains(&("refreshLibrary".into(), "false".into())));
        assert_eq!(created[0].json_body(), Some(&json!({"LibraryOptions": {}})));
        assert_eq!(mock.requests_to(Method::Post, &url(REFRESH)).len(), 1);
    }

    #[test]
    fn test_all_present_means_no_refresh() {
        let config = fixture::config();
        let mock = mock_with(&json!([
            {"Name": "TV Shows"},
            {"Name": "TV Shows UHD"},
            {"Name": "Movies"},
            {"Name": "Movies UHD"}
        ]));

        let changes = run(&config, &mock, false).unwrap();
        assert!(changes.is_empty());
        assert!(mock.writes().is_empty());
    }

    #[test]
    fn test_configured_libraries_replace_defaults() {
        let mut config = fixture::config();
        config.instances.get_mut("jellyfin").unwrap().libraries = Some(vec![LibrarySection {
            name: "Anime".into(),
            collection_type: "tvshows".into(),
            path: "media/anime".into(),
        }]);
        let mock = mock_with(&json!([]));

        let changes = run(&config, &mock, false).unwrap();
        assert_eq!(
            changes,
            vec![
                "Created library: Anime (/home/alice/media/anime)",
                "Triggered library refresh",
            ]
        );
    }

    #[test]
    fn test_dry_run_reads_only() {
        let config = fixture::config();
        let mock = mock_with(&json!([]));

        let changes = run(&config, &mock, true).unwrap();
        assert!(changes.is_empty());
        assert!(mock.writes().is_empty());
        assert_eq!(mock.requests().len(), 1);
    }

    #[test]
    fn test_library_names_match_exactly() {
        let config = fixture::config();
        let mock = mock_with(&json!([
            {"Name": "tv shows"},
            {"Name": "TV Shows UHD"},
            {"Name": "Movies"},
            {"Name": "Movies UHD"}
        ]));

        let changes = run(&config, &mock, false).unwrap();
        assert_eq!(changes[0], "Created library: TV Shows (/home/alice/media/all/tv)");
    }
}
