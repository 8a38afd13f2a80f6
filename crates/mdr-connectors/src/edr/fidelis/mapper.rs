//! Fidelis alert payload → canonical alert.

use crate::normalize::EventCategory;
use crate::traits::AdapterResult;
use chrono::{DateTime, NaiveDateTime, Utc};
use mdr_core::{Alert, Entity, EntityType, MitreAttack, RawRecord, Severity};
use regex::Regex;
use serde_json::{json, Value};
use std::sync::OnceLock;
use tracing::debug;

pub const VENDOR_NAME: &str = "Fidelis Endpoint";

const DEFAULT_TITLE: &str = "Unknown Alert";
const REGISTRY_EVENT: i64 = 10;

fn mitre_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\(MITRE ATT&CK - ([^)]+)\)").expect("Invalid regex for MITRE tags")
    })
}

/// Maps the Fidelis numeric scale (5 = critical .. 1 = info).
pub fn map_severity(level: i64) -> Severity {
    match level {
        5 => Severity::Critical,
        4 => Severity::High,
        3 => Severity::Medium,
        2 => Severity::Low,
        _ => Severity::Info,
    }
}

/// Maps the Fidelis `eventType` code.
pub fn event_category(raw: &RawRecord) -> Option<EventCategory> {
    let code = raw.get("eventType").and_then(as_i64)?;
    Some(match code {
        0 => EventCategory::Process,
        5 => EventCategory::File,
        REGISTRY_EVENT => EventCategory::Registry,
        _ => EventCategory::Generic,
    })
}

/// Builds an alert from a cleaned Fidelis record.
pub fn map_alert(tenant_id: &str, raw: &RawRecord) -> AdapterResult<Alert> {
    let alert_id = raw.get("id").map(render_scalar).unwrap_or_default();
    let description = raw.get("description").and_then(Value::as_str);
    let enrichments: Vec<String> = raw
        .get("enrichments")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let mut entities = Vec::new();
    for (field, entity_type) in [
        ("endpointName", EntityType::Host),
        ("ipAddress", EntityType::Ip),
        ("userName", EntityType::User),
    ] {
        if let Some(value) = raw.get(field).and_then(Value::as_str).filter(|v| !v.is_empty()) {
            entities.push(Entity::new(entity_type, value));
        }
    }
    if let Some(telemetry) = raw.get("telemetry").and_then(parse_telemetry) {
        entities.extend(telemetry_entities(&telemetry));
    }

    let mut mitre = description.map(parse_mitre_tags).unwrap_or_default();
    mitre.extend(enrichments.iter().filter_map(|e| parse_mitre_enrichment(e)));

    let alert = Alert::builder(alert_id, VENDOR_NAME, tenant_id)
        .timestamp(raw.get("createDate").and_then(parse_timestamp).unwrap_or_else(Utc::now))
        .severity(map_severity(raw.get("severity").and_then(as_i64).unwrap_or(1)))
        .title(raw.get("name").and_then(Value::as_str).unwrap_or(DEFAULT_TITLE))
        .description(description.map(str::to_string))
        .entities(entities)
        .mitre_attack(mitre)
        .enrichments(enrichments)
        .raw_data(raw.clone())
        .build()?;
    Ok(alert)
}

/// Decodes the `telemetry` field, which Fidelis sends as a JSON string.
pub fn parse_telemetry(value: &Value) -> Option<RawRecord> {
    match value {
        Value::Object(map) => Some(map.clone()),
        Value::String(encoded) => match serde_json::from_str::<Value>(encoded) {
            Ok(Value::Object(map)) => Some(map),
            Ok(_) => None,
            Err(e) => {
                debug!(error = %e, "Ignoring undecodable telemetry");
                None
            }
        },
        _ => None,
    }
}

fn telemetry_entities(telemetry: &RawRecord) -> Vec<Entity> {
    let text = |key: &str| telemetry.get(key).and_then(Value::as_str).filter(|v| !v.is_empty());
    let mut entities = Vec::new();

    if let Some(sha256) = text("HashSHA256") {
        let mut file = Entity::new(EntityType::File, sha256).with_metadata("algo", json!("sha256"));
        if let Some(path) = text("Path") {
            file = file.with_metadata("path", json!(path));
        }
        entities.push(file);
    }

    if telemetry.get("EventType").and_then(as_i64) == Some(REGISTRY_EVENT) {
        let key = ["Hive", "Path", "Name"]
            .iter()
            .filter_map(|k| text(k))
            .collect::<Vec<_>>()
            .join("\\");
        if !key.is_empty() {
            entities.push(Entity::new(EntityType::Domain, key).with_metadata("kind", json!("registry")));
        }
    }

    if let Some(pid) = telemetry.get("PID").map(render_scalar).filter(|p| !p.is_empty()) {
        let mut process = Entity::new(EntityType::Process, pid);
        if let Some(name) = text("Name") {
            process = process.with_metadata("name", json!(name));
        }
        entities.push(process);
    }

    entities
}

/// Extracts `(MITRE ATT&CK - TA0011,T1071)` style tags from free text.
pub fn parse_mitre_tags(text: &str) -> Vec<MitreAttack> {
    mitre_pattern()
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .flat_map(|tags| tags.as_str().split(','))
        .filter_map(|tag| classify_mitre_id(tag.trim()))
        .collect()
}

/// Parses an enrichment string such as `T1071 - Application Layer Protocol`.
pub fn parse_mitre_enrichment(enrichment: &str) -> Option<MitreAttack> {
    let (code, name) = enrichment.split_once(" - ")?;
    let annotation = classify_mitre_id(code.trim())?;
    Some(match annotation.technique_id {
        Some(_) => annotation.with_name(name.trim()),
        None => annotation,
    })
}

fn classify_mitre_id(id: &str) -> Option<MitreAttack> {
    if id.starts_with("TA") {
        Some(MitreAttack::tactic(id))
    } else if id.starts_with('T') && id.len() > 1 {
        Some(MitreAttack::technique(id))
    } else {
        None
    }
}

fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    let text = value.as_str()?;
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

pub(crate) fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub(crate) fn render_scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}
