//! Natural-key lookup and drift detection over fetched collections
//!
//! The target APIs hand out numeric ids only after creation, so an entity
//! from a previous run is found again by an attribute we control: a path,
//! a label, an implementation name, a base URL. Ids are read off the match
//! and used for the update call only.

use serde_json::{Map, Value};

/// Find the first entry whose string `field` equals `wanted`
pub fn find_by_key<'a>(items: &'a [Value], field: &str, wanted: &str) -> Option<&'a Value> {
    find_where(items, |item| item.get(field).and_then(Value::as_str) == Some(wanted))
}

/// Find the first entry whose string `field` equals `wanted`, ignoring case
pub fn find_by_key_ignore_case<'a>(
    items: &'a [Value],
    field: &str,
    wanted: &str,
) -> Option<&'a Value> {
    find_where(items, |item| {
        item.get(field)
            .and_then(Value::as_str)
            .is_some_and(|v| v.eq_ignore_ascii_case(wanted))
    })
}

/// Find the first entry matching a predicate
pub fn find_where<'a, F>(items: &'a [Value], predicate: F) -> Option<&'a Value>
where
    F: Fn(&Value) -> bool,
{
    items.iter().find(|item| predicate(item))
}

/// Server-assigned id of a fetched entity
pub fn entity_id(entity: &Value) -> Option<i64> {
    entity.get("id").and_then(Value::as_i64)
}

/// Flatten an Arr-style `fields: [{name, value}]` list into a map
///
/// Entries without a value map to `null`.
pub fn field_values(entity: &Value) -> Map<String, Value> {
    entity
        .get("fields")
        .and_then(Value::as_array)
        .map(|fields| {
            fields
                .iter()
                .filter_map(|f| {
                    let name = f.get("name")?.as_str()?;
                    Some((
                        name.to_string(),
                        f.get("value").cloned().unwrap_or(Value::Null),
                    ))
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Build an Arr-style `[{name, value}]` list, keeping key order
pub fn field_list(fields: &Map<String, Value>) -> Value {
    Value::Array(
        fields
            .iter()
            .map(|(name, value)| serde_json::json!({ "name": name, "value": value }))
            .collect(),
    )
}

/// Keys of `desired` whose current value differs
///
/// Keys listed in `secrets` are never compared: the read APIs do not echo
/// them back. A key missing from `current` counts as `null`.
pub fn drifted<'a>(
    current: &Map<String, Value>,
    desired: &'a Map<String, Value>,
    secrets: &[&str],
) -> Vec<&'a str> {
    desired
        .iter()
        .filter(|(key, _)| !secrets.contains(&key.as_str()))
        .filter(|(key, want)| {
            !values_equal(current.get(key.as_str()).unwrap_or(&Value::Null), want)
        })
        .map(|(key, _)| key.as_str())
        .collect()
}

/// [`drifted`] against a fetched object's top-level keys
pub fn drifted_object<'a>(
    current: &Value,
    desired: &'a Map<String, Value>,
    secrets: &[&str],
) -> Vec<&'a str> {
    match current.as_object() {
        Some(object) => drifted(object, desired, secrets),
        None => drifted(&Map::new(), desired, secrets),
    }
}

/// JSON equality that treats `443` and `443.0` as the same number
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x == y,
            _ => match (x.as_f64(), y.as_f64()) {
                (Some(x), Some(y)) => (x - y).abs() < f64::EPSILON,
                _ => false,
            },
        },
        _ => a == b,
    }
}

/// Compare filesystem paths, ignoring a trailing slash
pub fn same_path(a: &str, b: &str) -> bool {
    let trim = |p: &str| {
        let t = p.trim_end_matches('/');
        if t.is_empty() { "/" } else { t }.to_string()
    };
    trim(a) == trim(b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn download_client() -> Value {
        json!({
            "id": 7,
            "implementation": "QBittorrent",
            "fields": [
                {"name": "host", "value": "alice.lw1.usbx.me"},
                {"name": "port", "value": 443},
                {"name": "password", "value": "********"},
                {"name": "tvCategory", "value": "sonarr"},
                {"name": "useSsl", "value": true},
                {"name": "recentTvPriority"}
            ]
        })
    }

    fn desired(category: &str) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("host".into(), json!("alice.lw1.usbx.me"));
        map.insert("port".into(), json!(443));
        map.insert("password".into(), json!("from-config"));
        map.insert("tvCategory".into(), json!(category));
        map.insert("useSsl".into(), json!(true));
        map
    }

    #[test]
    fn test_find_by_key() {
        let items = vec![json!({"path": "/a"}), json!({"path": "/b", "id": 2})];
        assert_eq!(entity_id(find_by_key(&items, "path", "/b").unwrap()), Some(2));
        assert!(find_by_key(&items, "path", "/c").is_none());
    }

    #[test]
    fn test_find_by_key_ignore_case() {
        let items = vec![json!({"label": "Anime"})];
        assert!(find_by_key_ignore_case(&items, "label", "anime").is_some());
        assert!(find_by_key(&items, "label", "anime").is_none());
    }

    #[test]
    fn test_field_values_flattens() {
        let fields = field_values(&download_client());
        assert_eq!(fields["host"], "alice.lw1.usbx.me");
        assert_eq!(fields["recentTvPriority"], Value::Null);
        assert!(field_values(&json!({})).is_empty());
    }

    #[test]
    fn test_no_drift_when_equal_except_secret() {
        let current = field_values(&download_client());
        assert!(drifted(&current, &desired("sonarr"), &["password"]).is_empty());
    }

    #[test]
    fn test_drift_reports_changed_key() {
        let current = field_values(&download_client());
        let want = desired("tv");
        assert_eq!(drifted(&current, &want, &["password"]), vec!["tvCategory"]);
    }

    #[test]
    fn test_secret_is_compared_when_not_excluded() {
        let current = field_values(&download_client());
        let want = desired("sonarr");
        assert_eq!(drifted(&current, &want, &[]), vec!["password"]);
    }

    #[test]
    fn test_missing_key_is_drift() {
        let mut want = Map::new();
        want.insert("urlBase".into(), json!("/qbittorrent"));
        assert_eq!(drifted(&Map::new(), &want, &[]), vec!["urlBase"]);
    }

    #[test]
    fn test_drifted_object() {
        let mut want = Map::new();
        want.insert("baseUrl".into(), json!("/sonarr"));
        want.insert("apiKey".into(), json!("k"));
        let current = json!({"id": 1, "baseUrl": "/sonarr"});
        assert!(drifted_object(&current, &want, &["apiKey"]).is_empty());
        assert_eq!(drifted_object(&json!(null), &want, &["apiKey"]), vec!["baseUrl"]);
    }

    #[test]
    fn test_values_equal_numbers() {
        assert!(values_equal(&json!(443), &json!(443.0)));
        assert!(!values_equal(&json!(443), &json!(80)));
        assert!(!values_equal(&json!("443"), &json!(443)));
    }

    #[test]
    fn test_field_list_round_shape() {
        let list = field_list(&desired("sonarr"));
        assert_eq!(list[0], json!({"name": "host", "value": "alice.lw1.usbx.me"}));
        assert_eq!(list.as_array().unwrap().len(), 5);
    }

    #[test]
    fn test_same_path() {
        assert!(same_path("/home/alice/media/", "/home/alice/media"));
        assert!(!same_path("/home/alice/media", "/home/alice/Media"));
        assert!(same_path("/", "/"));
    }
}
