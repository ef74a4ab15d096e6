//! Raw dichotomous key records, in the shape of a KeyBase export.
//!
//! Exports are sometimes wrapped as `{"keybase": {...}}`; [`parse_key_value`] unwraps
//! that before deserializing.

use serde::{Deserialize, Serialize};

use super::RawId;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawScope {
    #[serde(default)]
    pub item_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawFirstStep {
    #[serde(default)]
    pub root_node_id: Option<RawId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawLead {
    pub lead_id: RawId,
    pub parent_id: RawId,
    #[serde(default)]
    pub lead_text: Option<String>,
    #[serde(default)]
    pub item: Option<RawId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawItem {
    pub item_id: RawId,
    #[serde(default)]
    pub item_name: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub to_key: Option<RawId>,
}

/// A dichotomous key as found in the source data
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawDichotomousKey {
    #[serde(default)]
    pub key_id: Option<RawId>,

    #[serde(default)]
    pub key_title: Option<String>,

    #[serde(default)]
    pub taxonomic_scope: Option<RawScope>,

    #[serde(default)]
    pub first_step: Option<RawFirstStep>,

    #[serde(default)]
    pub leads: Vec<RawLead>,

    #[serde(default)]
    pub items: Vec<RawItem>,
}

/// Deserialize a key from an already-parsed JSON value, unwrapping `keybase` if present
///
/// # Errors
///
/// Returns a `serde_json::Error` if the value does not have the shape of a key.
pub fn parse_key_value(
    mut value: serde_json::Value,
) -> Result<RawDichotomousKey, serde_json::Error> {
    if let Some(inner) = value.get_mut("keybase") {
        value = inner.take();
    }
    serde_json::from_value(value)
}

/// Parse a key from JSON text
///
/// # Errors
///
/// Returns a `serde_json::Error` if the text is not valid JSON or not a key.
pub fn parse_key_text(text: &str) -> Result<RawDichotomousKey, serde_json::Error> {
    parse_key_value(serde_json::from_str(text)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = r#"{
        "key_id": 1903, "key_title": "Key to the families",
        "taxonomic_scope": {"item_name": "Magnoliopsida"},
        "first_step": {"root_node_id": 1},
        "leads": [
            {"lead_id": 2, "parent_id": 1, "lead_text": "Flowers in heads"},
            {"lead_id": 3, "parent_id": 1, "lead_text": "Flowers single", "item": 900}
        ],
        "items": [{"item_id": 900, "item_name": "Ranunculaceae", "to_key": "42"}]
    }"#;

    #[test]
    fn test_parse_key_text() {
        let key = parse_key_text(KEY).unwrap();
        assert_eq!(key.key_id, Some(RawId::Int(1903)));
        assert_eq!(key.leads.len(), 2);
        assert_eq!(key.leads[1].item, Some(RawId::Int(900)));
        assert_eq!(key.items[0].to_key, Some(RawId::Str("42".to_string())));
        assert_eq!(
            key.taxonomic_scope.unwrap().item_name.as_deref(),
            Some("Magnoliopsida")
        );
    }

    #[test]
    fn test_unwraps_keybase_envelope() {
        let wrapped = format!(r#"{{"keybase": {KEY}}}"#);
        let key = parse_key_text(&wrapped).unwrap();
        assert_eq!(key.key_title.as_deref(), Some("Key to the families"));
    }

    #[test]
    fn test_missing_root_still_parses() {
        // Structural validation happens when the key is indexed, not here
        let key = parse_key_text(r#"{"key_id": 5, "leads": []}"#).unwrap();
        assert!(key.first_step.is_none());
    }
}
