// src/models/mod.rs

use std::collections::BTreeMap;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// RFC 3339 timestamp with nanosecond precision, as carried in every envelope.
pub fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true)
}

// ───────────────────────────────────────
// Envelopes
// ───────────────────────────────────────
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MessageResponse {
    #[serde(rename = "Type")]
    pub kind: String,
    pub message: String,
    pub time: String,
}

impl MessageResponse {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: "SUCCESS".to_string(),
            message: message.into(),
            time: timestamp(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ErrorResponse {
    pub error_message: String,
    pub time: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self { error_message: message.into(), time: timestamp() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServiceStatus {
    pub service_name: String,
    pub version: String,
    pub status: String,
    pub time: String,
}

// ───────────────────────────────────────
// Attributes (name/value lists)
// ───────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NameValuePair {
    pub name: String,
    pub value: Value,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AttributesRepr {
    List(Vec<NameValuePair>),
    Map(serde_json::Map<String, Value>),
}

impl From<AttributesRepr> for Attributes {
    fn from(repr: AttributesRepr) -> Self {
        let mut attributes = Attributes::default();
        match repr {
            AttributesRepr::List(pairs) => {
                for pair in pairs {
                    attributes.set(pair.name, pair.value);
                }
            }
            AttributesRepr::Map(map) => {
                for (name, value) in map {
                    attributes.set(name, value);
                }
            }
        }
        attributes
    }
}

impl From<Attributes> for Vec<NameValuePair> {
    fn from(attributes: Attributes) -> Self {
        attributes.0
    }
}

/// Ordered name/value pairs. Accepts either `[{"Name":..,"Value":..}]` or a
/// plain JSON object on the way in, always renders the list form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "AttributesRepr", into = "Vec<NameValuePair>")]
pub struct Attributes(Vec<NameValuePair>);

impl Attributes {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.iter().find(|p| p.name == name).map(|p| &p.value)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    /// Replaces an existing value in place, otherwise appends.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        match self.0.iter_mut().find(|p| p.name == name) {
            Some(existing) => existing.value = value,
            None => self.0.push(NameValuePair { name, value }),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        let index = self.0.iter().position(|p| p.name == name)?;
        Some(self.0.remove(index).value)
    }

    pub fn iter(&self) -> impl Iterator<Item = &NameValuePair> {
        self.0.iter()
    }
}

// ───────────────────────────────────────
// Subcatchment views
// ───────────────────────────────────────
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SubcatchmentDetail {
    pub id: u32,
    pub attributes: Attributes,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ApplicableActions {
    pub applicable_actions: Vec<String>,
}

/// Active action types keyed by planning unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ActiveActions {
    pub active_management_actions: BTreeMap<u32, Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn attributes_accept_list_form() {
        let attributes: Attributes = serde_json::from_value(json!([
            {"Name": "Encoding", "Value": "A1"},
            {"Name": "Summary", "Value": "s"}
        ]))
        .unwrap();

        assert_eq!(attributes.get_str("Encoding"), Some("A1"));
        assert_eq!(attributes.get_str("Summary"), Some("s"));
        assert_eq!(attributes.len(), 2);
    }

    #[test]
    fn attributes_accept_object_form() {
        let attributes: Attributes =
            serde_json::from_value(json!({"Encoding": "A3", "Summary": "other"})).unwrap();

        assert_eq!(attributes.get_str("Encoding"), Some("A3"));
        assert_eq!(attributes.get_str("Summary"), Some("other"));
    }

    #[test]
    fn attributes_render_as_list() {
        let mut attributes = Attributes::default();
        attributes.set("ParetoFrontMember", true);
        attributes.set("ParetoFrontMember", false);

        let rendered = serde_json::to_value(&attributes).unwrap();
        assert_eq!(rendered, json!([{"Name": "ParetoFrontMember", "Value": false}]));
    }

    #[test]
    fn error_envelope_uses_pascal_case() {
        let rendered = serde_json::to_value(ErrorResponse::new("boom")).unwrap();
        assert_eq!(rendered["ErrorMessage"], "boom");
        assert!(rendered["Time"].as_str().is_some());
    }

    #[test]
    fn success_message_is_tagged() {
        let rendered = serde_json::to_value(MessageResponse::success("done")).unwrap();
        assert_eq!(rendered["Type"], "SUCCESS");
        assert_eq!(rendered["Message"], "done");
    }
}
