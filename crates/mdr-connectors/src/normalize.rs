//! Structural cleaning and category-aware field selection for raw payloads.
//!
//! Cleaning strips null values, administrative keys and containers that end
//! up empty. Optimization keeps only the fields an analyst needs for the
//! alert's event category, using case-insensitive substring matches on keys.

use mdr_core::RawRecord;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Keys removed by default during cleaning.
pub const DEFAULT_EXCLUDED_KEYS: &[&str] = &["links", "self", "href", "metadata_version"];

const GENERIC_FIELDS: &[&str] = &["id", "type", "severity", "title", "description", "timestamp"];
const FILE_FIELDS: &[&str] = &[
    "name",
    "path",
    "hash",
    "sha256",
    "md5",
    "action",
    "size",
    "process_name",
];
const PROCESS_FIELDS: &[&str] = &[
    "pid",
    "ppid",
    "name",
    "command_line",
    "executable_path",
    "user",
];
const REGISTRY_FIELDS: &[&str] = &["path", "hive", "name", "value", "action"];
const NETWORK_FIELDS: &[&str] = &[
    "source_ip",
    "dest_ip",
    "source_port",
    "dest_port",
    "protocol",
    "domain",
];

/// Event classification used to pick the optimization whitelist.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventCategory {
    File,
    Process,
    Registry,
    Network,
    #[default]
    Generic,
}

impl EventCategory {
    /// Parses a category label. Unknown labels map to `Generic`.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "file" => Self::File,
            "process" => Self::Process,
            "registry" => Self::Registry,
            "network" => Self::Network,
            _ => Self::Generic,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Process => "process",
            Self::Registry => "registry",
            Self::Network => "network",
            Self::Generic => "generic",
        }
    }

    /// Category-specific field fragments, not including the generic set.
    fn fields(&self) -> &'static [&'static str] {
        match self {
            Self::File => FILE_FIELDS,
            Self::Process => PROCESS_FIELDS,
            Self::Registry => REGISTRY_FIELDS,
            Self::Network => NETWORK_FIELDS,
            Self::Generic => &[],
        }
    }

    /// Whether a key survives optimization for this category.
    pub fn retains(&self, key: &str) -> bool {
        let key = key.to_ascii_lowercase();
        GENERIC_FIELDS
            .iter()
            .chain(self.fields())
            .any(|fragment| key.contains(fragment))
    }
}

impl fmt::Display for EventCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recursively removes nulls, excluded keys and emptied containers.
pub fn clean_record(record: &RawRecord, excluded: &[&str]) -> RawRecord {
    let mut cleaned = RawRecord::new();
    for (key, value) in record {
        if value.is_null() || excluded.contains(&key.as_str()) {
            continue;
        }
        if let Some(value) = clean_nested(value, excluded) {
            cleaned.insert(key.clone(), value);
        }
    }
    cleaned
}

/// Cleans a value found under a key or inside a sequence.
///
/// Returns `None` when a container is left empty. Scalars are returned as-is,
/// so nulls inside sequences survive.
fn clean_nested(value: &Value, excluded: &[&str]) -> Option<Value> {
    match value {
        Value::Object(map) => {
            let cleaned = clean_record(map, excluded);
            (!cleaned.is_empty()).then_some(Value::Object(cleaned))
        }
        Value::Array(items) => {
            let cleaned: Vec<Value> = items
                .iter()
                .filter_map(|item| clean_nested(item, excluded))
                .collect();
            (!cleaned.is_empty()).then_some(Value::Array(cleaned))
        }
        scalar => Some(scalar.clone()),
    }
}

/// Keeps only the fields relevant to `category`, at every depth.
pub fn optimize_for_analysis(data: &RawRecord, category: EventCategory) -> RawRecord {
    data.iter()
        .filter(|(key, _)| category.retains(key))
        .map(|(key, value)| (key.clone(), optimize_value(value, category)))
        .collect()
}

fn optimize_value(value: &Value, category: EventCategory) -> Value {
    match value {
        Value::Object(map) => Value::Object(optimize_for_analysis(map, category)),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| optimize_value(item, category))
                .collect(),
        ),
        scalar => scalar.clone(),
    }
}
