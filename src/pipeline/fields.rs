//! Translation of CRM custom-field keys and option ids into human labels

use crate::pipeline::deal::DealSnapshot;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Enumerated fields whose values are option ids
pub const TRACKED_FIELDS: [&str; 3] = ["Territory", "Solution Program", "Deal Type"];

/// Link fields, matched against the CRM display name
pub const LINK_FIELDS: [&str; 3] = ["GDrive Link", "SOW Link", "APN Portal Opp Link"];

/// Link fields by their space-stripped lookup name; these are never translated
pub const LINK_FIELD_NAMES: [&str; 3] = ["GDriveLink", "SOWLink", "APNPortalOppLink"];

/// A deal field definition from the CRM schema endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub options: Option<Vec<FieldOption>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldOption {
    pub id: Value,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq)]
struct FieldEntry {
    key: String,
    name: String,
    options: HashMap<String, String>,
}

/// Per-invocation map from CRM field key to display name and option labels
#[derive(Debug, Clone, Default)]
pub struct FieldMap {
    entries: Vec<FieldEntry>,
}

/// Option ids arrive as numbers in the schema and as strings or numbers on deals
fn option_key(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

impl FieldMap {
    /// Builds the map for fields whose display name contains one of `tracked`, plus
    /// every link field
    pub fn build(fields: &[FieldDefinition], tracked: &[&str]) -> Self {
        let mut map = FieldMap::default();

        for field in fields {
            if tracked.iter().any(|item| field.name.contains(item)) {
                let options = field
                    .options
                    .iter()
                    .flatten()
                    .filter_map(|option| option_key(&option.id).map(|id| (id, option.label.clone())))
                    .collect();
                map.insert(FieldEntry {
                    key: field.key.clone(),
                    name: field.name.replace(' ', ""),
                    options,
                });
            }
            if LINK_FIELDS.iter().any(|item| field.name.contains(item)) {
                map.insert(FieldEntry {
                    key: field.key.clone(),
                    name: field.name.replace(' ', ""),
                    options: HashMap::new(),
                });
            }
        }

        map
    }

    fn insert(&mut self, entry: FieldEntry) {
        match self.entries.iter_mut().find(|e| e.key == entry.key) {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// CRM key of the field with the given space-stripped name
    pub fn key_for(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.key.as_str())
    }

    /// Resolves a field on `current` by its space-stripped display name
    ///
    /// Link fields return the raw value; enumerated fields return the option label.
    /// Unknown fields and unset values resolve to `Null`.
    pub fn lookup(&self, name: &str, current: &DealSnapshot) -> Value {
        let Some(entry) = self.entries.iter().find(|e| e.name == name) else {
            return Value::Null;
        };

        let raw = current.field(&entry.key);
        if LINK_FIELD_NAMES.contains(&entry.name.as_str()) {
            return raw;
        }

        option_key(&raw)
            .and_then(|id| entry.options.get(&id).cloned())
            .map(Value::String)
            .unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> Vec<FieldDefinition> {
        serde_json::from_value(json!([
            {"key": "title", "name": "Title", "options": null},
            {"key": "abc", "name": "Territory", "options": [
                {"id": 11, "label": "USWEST"},
                {"id": 12, "label": "USEAST"}
            ]},
            {"key": "def", "name": "Deal Type", "options": [{"id": 3, "label": "New Business"}]},
            {"key": "ghi", "name": "Solution Program", "options": [{"id": 7, "label": "DevOps Program"}]},
            {"key": "sow", "name": "SOW Link"},
            {"key": "drv", "name": "GDrive Link"},
            {"key": "apn", "name": "APN Portal Opp Link"}
        ]))
        .unwrap()
    }

    fn deal() -> DealSnapshot {
        serde_json::from_value(json!({
            "id": 1,
            "org_name": "Acme",
            "title": "Migration",
            "stage_id": 2,
            "pipeline_id": 1,
            "status": "open",
            "abc": "12",
            "def": 3,
            "ghi": null,
            "sow": "https://docs.example.com/sow",
            "drv": "7"
        }))
        .unwrap()
    }

    #[test]
    fn test_build_only_keeps_interesting_fields() {
        let map = FieldMap::build(&schema(), &TRACKED_FIELDS);
        assert_eq!(map.len(), 6);
        assert_eq!(map.key_for("DealType"), Some("def"));
        assert_eq!(map.key_for("Title"), None);
    }

    #[test]
    fn test_enumerated_fields_resolve_to_labels() {
        let map = FieldMap::build(&schema(), &TRACKED_FIELDS);
        let deal = deal();

        assert_eq!(map.lookup("Territory", &deal), json!("USEAST"));
        assert_eq!(map.lookup("DealType", &deal), json!("New Business"));
        assert_eq!(map.lookup("SolutionProgram", &deal), Value::Null);
    }

    #[test]
    fn test_link_fields_are_never_translated() {
        let map = FieldMap::build(&schema(), &TRACKED_FIELDS);
        let deal = deal();

        assert_eq!(
            map.lookup("SOWLink", &deal),
            json!("https://docs.example.com/sow")
        );
        // "7" is an option id elsewhere, but link values stay raw
        assert_eq!(map.lookup("GDriveLink", &deal), json!("7"));
        assert_eq!(map.lookup("APNPortalOppLink", &deal), Value::Null);
    }

    #[test]
    fn test_unknown_name_is_null() {
        let map = FieldMap::build(&schema(), &TRACKED_FIELDS);
        assert_eq!(map.lookup("Probability", &deal()), Value::Null);
    }
}
