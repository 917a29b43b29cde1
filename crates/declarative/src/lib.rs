//! # Declarative
//!
//! Primitives for reconciling remote services toward a declared state.
//!
//! ## Core Concepts
//!
//! - **Natural key**: an attribute we control (path, label, base URL) used to
//!   find an entity again, since the remote side only hands out ids after
//!   creation. See [`find_by_key`].
//! - **Drift**: the declared fields whose live value differs, with secret
//!   fields left out because the read APIs never echo them. See [`drifted`].
//! - **Run summary**: per-service [`Status`], applied changes, and errors,
//!   rendered as a text report or JSON. See [`RunSummary`].
//!
//! ## Example
//!
//! ```
//! use declarative::{RunSummary, drifted, field_values};
//! use serde_json::json;
//!
//! let live = json!({"fields": [{"name": "host", "value": "a"}, {"name": "password"}]});
//! let mut want = serde_json::Map::new();
//! want.insert("host".into(), json!("a"));
//! want.insert("password".into(), json!("s3cret"));
//!
//! assert!(drifted(&field_values(&live), &want, &["password"]).is_empty());
//!
//! let mut summary = RunSummary::new();
//! summary.mark_failed("radarr", "boom");
//! assert_eq!(summary.rerun_services().as_deref(), Some("radarr"));
//! ```

pub mod diff;
pub mod summary;
pub mod types;

pub use diff::{
    drifted, drifted_object, entity_id, field_list, field_values, find_by_key,
    find_by_key_ignore_case, find_where, same_path, values_equal,
};
pub use summary::{RunSummary, SummaryReport};
pub use types::{ServiceRecord, Status, StatusCounts};
