//! Canonical alert model.
//!
//! An [`Alert`] is the vendor-independent representation produced by the
//! normalization pipeline. Alerts are only constructed through
//! [`AlertBuilder::build`], which acts as the validation gate: a record with
//! missing required fields never becomes a partially-populated alert.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// A vendor payload as received, before any cleaning.
pub type RawRecord = serde_json::Map<String, serde_json::Value>;

/// Errors raised when a canonical record fails validation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Entity of type {0} has an empty value")]
    EmptyEntityValue(EntityType),
}

/// Severity levels for canonical alerts.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    /// Informational - no immediate action required
    Info,
    /// Low severity
    Low,
    /// Medium severity
    Medium,
    /// High severity - requires attention
    High,
    /// Critical - immediate response required
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "INFO"),
            Severity::Low => write!(f, "LOW"),
            Severity::Medium => write!(f, "MEDIUM"),
            Severity::High => write!(f, "HIGH"),
            Severity::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// Kinds of observables extracted from alerts.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum EntityType {
    Host,
    Ip,
    File,
    Process,
    User,
    Domain,
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityType::Host => write!(f, "HOST"),
            EntityType::Ip => write!(f, "IP"),
            EntityType::File => write!(f, "FILE"),
            EntityType::Process => write!(f, "PROCESS"),
            EntityType::User => write!(f, "USER"),
            EntityType::Domain => write!(f, "DOMAIN"),
        }
    }
}

/// A typed observable attached to an alert.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Entity {
    /// Observable kind.
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    /// Observable value (hostname, address, hash, ...).
    pub value: String,
    /// Open vendor-specific metadata.
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Entity {
    /// Creates an entity without metadata.
    pub fn new(entity_type: EntityType, value: impl Into<String>) -> Self {
        Self {
            entity_type,
            value: value.into(),
            metadata: HashMap::new(),
        }
    }

    /// Adds a metadata entry.
    pub fn with_metadata(mut self, key: &str, value: serde_json::Value) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.entity_type, self.value)
    }
}

/// A MITRE ATT&CK annotation derived from alert content.
///
/// Annotations are heuristics, not authoritative: several extraction passes
/// may contribute the same technique and duplicates are kept.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MitreAttack {
    pub tactic: Option<String>,
    pub technique_id: Option<String>,
    pub technique_name: Option<String>,
}

impl MitreAttack {
    /// Annotation carrying only a tactic id (e.g. `TA0011`).
    pub fn tactic(id: impl Into<String>) -> Self {
        Self {
            tactic: Some(id.into()),
            ..Default::default()
        }
    }

    /// Annotation carrying a technique id (e.g. `T1071`).
    pub fn technique(id: impl Into<String>) -> Self {
        Self {
            technique_id: Some(id.into()),
            ..Default::default()
        }
    }

    /// Sets the technique's human-readable name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.technique_name = Some(name.into());
        self
    }
}

/// Vendor-independent, size-bounded alert.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Alert {
    pub alert_id: String,
    pub vendor: String,
    pub tenant_id: String,
    pub timestamp: DateTime<Utc>,
    pub severity: Severity,
    pub title: String,
    pub description: Option<String>,
    entities: Vec<Entity>,
    pub mitre_attack: Vec<MitreAttack>,
    pub enrichments: Vec<String>,
    /// Residual vendor payload kept for downstream inspection.
    pub raw_data: RawRecord,
}

impl Alert {
    /// Starts building an alert.
    pub fn builder(
        alert_id: impl Into<String>,
        vendor: impl Into<String>,
        tenant_id: impl Into<String>,
    ) -> AlertBuilder {
        AlertBuilder::new(alert_id, vendor, tenant_id)
    }

    /// Entities in extraction order.
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    /// Appends an entity. Existing entities are never modified.
    pub fn add_entity(&mut self, entity: Entity) -> Result<(), ValidationError> {
        validate_entity(&entity)?;
        self.entities.push(entity);
        Ok(())
    }

    /// Returns the values of all entities of the given type.
    pub fn entity_values(&self, entity_type: EntityType) -> Vec<&str> {
        self.entities
            .iter()
            .filter(|e| e.entity_type == entity_type)
            .map(|e| e.value.as_str())
            .collect()
    }

    /// Re-checks the canonical invariants.
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_non_empty(&self.alert_id, "alert_id")?;
        require_non_empty(&self.vendor, "vendor")?;
        require_non_empty(&self.tenant_id, "tenant_id")?;
        require_non_empty(&self.title, "title")?;
        for entity in &self.entities {
            validate_entity(entity)?;
        }
        Ok(())
    }
}

fn require_non_empty(value: &str, field: &'static str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::MissingField(field));
    }
    Ok(())
}

fn validate_entity(entity: &Entity) -> Result<(), ValidationError> {
    if entity.value.trim().is_empty() {
        return Err(ValidationError::EmptyEntityValue(entity.entity_type));
    }
    Ok(())
}

/// Builder for [`Alert`].
#[derive(Debug, Clone)]
pub struct AlertBuilder {
    alert_id: String,
    vendor: String,
    tenant_id: String,
    timestamp: Option<DateTime<Utc>>,
    severity: Severity,
    title: Option<String>,
    description: Option<String>,
    entities: Vec<Entity>,
    mitre_attack: Vec<MitreAttack>,
    enrichments: Vec<String>,
    raw_data: RawRecord,
}

impl AlertBuilder {
    pub fn new(
        alert_id: impl Into<String>,
        vendor: impl Into<String>,
        tenant_id: impl Into<String>,
    ) -> Self {
        Self {
            alert_id: alert_id.into(),
            vendor: vendor.into(),
            tenant_id: tenant_id.into(),
            timestamp: None,
            severity: Severity::Info,
            title: None,
            description: None,
            entities: Vec::new(),
            mitre_attack: Vec::new(),
            enrichments: Vec::new(),
            raw_data: RawRecord::new(),
        }
    }

    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }

    pub fn entity(mut self, entity: Entity) -> Self {
        self.entities.push(entity);
        self
    }

    pub fn entities(mut self, entities: impl IntoIterator<Item = Entity>) -> Self {
        self.entities.extend(entities);
        self
    }

    pub fn mitre_attack(mut self, annotations: impl IntoIterator<Item = MitreAttack>) -> Self {
        self.mitre_attack.extend(annotations);
        self
    }

    pub fn enrichments(mut self, enrichments: impl IntoIterator<Item = String>) -> Self {
        self.enrichments.extend(enrichments);
        self
    }

    pub fn raw_data(mut self, raw_data: RawRecord) -> Self {
        self.raw_data = raw_data;
        self
    }

    /// Validates and produces the alert. The timestamp defaults to now.
    pub fn build(self) -> Result<Alert, ValidationError> {
        let alert = Alert {
            alert_id: self.alert_id,
            vendor: self.vendor,
            tenant_id: self.tenant_id,
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
            severity: self.severity,
            title: self.title.ok_or(ValidationError::MissingField("title"))?,
            description: self.description,
            entities: self.entities,
            mitre_attack: self.mitre_attack,
            enrichments: self.enrichments,
            raw_data: self.raw_data,
        };
        alert.validate()?;
        Ok(alert)
    }
}
