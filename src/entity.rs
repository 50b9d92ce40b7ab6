use serde::{Deserialize, Serialize};

use crate::{errors::EntitySyncError, tags};

/// Closed set of record kinds managed by the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityKind {
    Person,
    Note,
    Location,
    Media,
    Organization,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Person => "person",
            EntityKind::Note => "note",
            EntityKind::Location => "location",
            EntityKind::Media => "media",
            EntityKind::Organization => "organization",
        }
    }

    pub fn parse(value: &str) -> Result<Self, EntitySyncError> {
        match value {
            "person" => Ok(EntityKind::Person),
            "note" => Ok(EntityKind::Note),
            "location" => Ok(EntityKind::Location),
            "media" => Ok(EntityKind::Media),
            "organization" => Ok(EntityKind::Organization),
            other => Err(EntitySyncError::invalid_input(format!(
                "unknown entity kind: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Entity {
    pub id: i64,
    pub kind: EntityKind,
    pub owner: String,
    pub name: String,
    pub fields: serde_json::Value,
    pub tags: Vec<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Entity {
    /// Stable identity within an owner's dataset, used by import/export.
    pub fn identity(&self) -> String {
        identity_key(self.kind, &self.name)
    }
}

pub fn identity_key(kind: EntityKind, name: &str) -> String {
    format!("{}:{}", kind.as_str(), name)
}

/// Input for a new entity; the store assigns id and timestamps.
#[derive(Debug, Clone)]
pub struct EntityDraft {
    pub kind: EntityKind,
    pub owner: String,
    pub name: String,
    pub fields: serde_json::Value,
    pub tags: Vec<String>,
}

impl EntityDraft {
    pub fn new(kind: EntityKind, owner: &str, name: &str) -> Self {
        Self {
            kind,
            owner: owner.to_string(),
            name: name.to_string(),
            fields: serde_json::Value::Object(serde_json::Map::new()),
            tags: Vec::new(),
        }
    }

    pub fn with_fields(mut self, fields: serde_json::Value) -> Self {
        self.fields = fields;
        self
    }

    pub fn with_tags(mut self, tags: &[&str]) -> Self {
        self.tags = tags.iter().map(|t| t.to_string()).collect();
        self
    }
}

/// Partial update; `None` leaves the current value in place.
#[derive(Debug, Clone, Default)]
pub struct EntityUpdate {
    pub name: Option<String>,
    pub fields: Option<serde_json::Value>,
    pub tags: Option<Vec<String>>,
}

impl EntityUpdate {
    pub fn tags_only(tags: &[&str]) -> Self {
        Self {
            tags: Some(tags.iter().map(|t| t.to_string()).collect()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.fields.is_none() && self.tags.is_none()
    }
}

pub(crate) fn validate_draft(draft: &EntityDraft) -> Result<(), EntitySyncError> {
    if draft.owner.trim().is_empty() {
        return Err(EntitySyncError::invalid_input("entity owner must be set"));
    }
    if draft.name.trim().is_empty() {
        return Err(EntitySyncError::invalid_input("entity name must be set"));
    }
    Ok(())
}

pub(crate) fn normalized_tags(raw: &[String]) -> Vec<String> {
    tags::normalize(raw)
}
