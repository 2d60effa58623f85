//! Deal snapshots as delivered by the CRM webhook

use crate::error::{FlowError, FlowResult};
use crate::pipeline::stage::Stage;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

pub const ADDED_DEAL: &str = "added.deal";
pub const UPDATED_DEAL: &str = "updated.deal";

/// Deal status as reported by the CRM
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DealStatus {
    Open,
    Won,
    Lost,
    Deleted,
    Other(String),
}

impl DealStatus {
    pub fn as_str(&self) -> &str {
        match self {
            DealStatus::Open => "open",
            DealStatus::Won => "won",
            DealStatus::Lost => "lost",
            DealStatus::Deleted => "deleted",
            DealStatus::Other(other) => other,
        }
    }

    pub fn is_won(&self) -> bool {
        matches!(self, DealStatus::Won)
    }
}

impl From<String> for DealStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "open" => DealStatus::Open,
            "won" => DealStatus::Won,
            "lost" => DealStatus::Lost,
            "deleted" => DealStatus::Deleted,
            _ => DealStatus::Other(value),
        }
    }
}

impl From<DealStatus> for String {
    fn from(status: DealStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for DealStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One `current` or `previous` deal record from a webhook payload
///
/// Known fields are typed; every custom field stays in `fields` under its opaque CRM key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DealSnapshot {
    pub id: i64,
    pub org_name: String,
    pub title: String,
    pub stage_id: i64,
    pub pipeline_id: i64,
    pub status: DealStatus,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl DealSnapshot {
    pub fn customer(&self) -> &str {
        &self.org_name
    }

    pub fn project(&self) -> &str {
        &self.title
    }

    pub fn stage(&self) -> FlowResult<Stage> {
        Stage::from_id(self.stage_id).ok_or(FlowError::UnknownStage(self.stage_id))
    }

    /// Raw value of a custom field, `Null` when absent
    pub fn field(&self, key: &str) -> Value {
        self.fields.get(key).cloned().unwrap_or(Value::Null)
    }

    /// The snapshot as a flat key/value map, known fields included
    pub fn to_map(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}

/// Kind of CRM webhook event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    Added,
    Updated,
    Other(String),
}

impl EventKind {
    pub fn parse(event: &str) -> Self {
        match event {
            ADDED_DEAL => EventKind::Added,
            UPDATED_DEAL => EventKind::Updated,
            other => EventKind::Other(other.to_string()),
        }
    }
}

/// A decoded webhook delivery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DealEvent {
    pub event: String,
    pub current: DealSnapshot,
    #[serde(default)]
    pub previous: Option<DealSnapshot>,
}

#[derive(Deserialize)]
struct RawEvent {
    event: String,
    #[serde(default)]
    current: Value,
    #[serde(default)]
    previous: Value,
}

impl DealEvent {
    pub fn kind(&self) -> EventKind {
        EventKind::parse(&self.event)
    }

    /// Parses a webhook body
    ///
    /// Returns `Ok(None)` for event types other than added/updated deals, whose
    /// snapshots are not required to be complete.
    pub fn parse(body: &str) -> FlowResult<Option<DealEvent>> {
        let raw: RawEvent = serde_json::from_str(body)
            .map_err(|e| FlowError::malformed(format!("webhook body: {}", e)))?;

        if let EventKind::Other(_) = EventKind::parse(&raw.event) {
            return Ok(None);
        }

        let current: DealSnapshot = serde_json::from_value(raw.current)
            .map_err(|e| FlowError::malformed(format!("current deal: {}", e)))?;
        let previous = match raw.previous {
            Value::Null => None,
            value => Some(
                serde_json::from_value(value)
                    .map_err(|e| FlowError::malformed(format!("previous deal: {}", e)))?,
            ),
        };

        Ok(Some(DealEvent {
            event: raw.event,
            current,
            previous,
        }))
    }

    /// Event type as a bare string, for payloads that are not deal events
    pub fn peek_event_type(body: &str) -> Option<String> {
        serde_json::from_str::<RawEvent>(body).ok().map(|raw| raw.event)
    }
}

/// Field-level changes: pairs present in `current` but absent by key and value from `previous`
pub fn deal_diff(current: &DealSnapshot, previous: Option<&DealSnapshot>) -> Map<String, Value> {
    let Some(previous) = previous else {
        return Map::new();
    };

    let before = previous.to_map();
    current
        .to_map()
        .into_iter()
        .filter(|(key, value)| before.get(key) != Some(value))
        .collect()
}
