//! Raw multi-access key records.
//!
//! Lucid keys reach us in two shapes:
//!
//! - the player bundle, a script of the form `var key = {...};` with compressed
//!   `scores` and `measures` maps
//! - scraped JSON, the same object with `decompressedScores` and `decompressedMeasures`
//!   already expanded (a cell that failed to decode is `null`)
//!
//! Both parse into [`RawMultiAccessKey`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use super::RawId;

#[derive(Error, Debug)]
pub enum LucidError {
    #[error("Not a Lucid key bundle: expected `var key = {{...}}`")]
    MissingWrapper,

    #[error("Failed to parse key JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Marker that identifies a taxon profile link among an entity's text entries
pub const TAXON_PROFILE_MARKER: &str = "/flora/taxon/";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawFeature {
    pub id: RawId,
    #[serde(default)]
    pub name: Option<String>,
    /// 0 = grouping, 1 = discrete, 2 = numeric
    #[serde(default, rename = "type")]
    pub kind: Option<i64>,
    #[serde(default)]
    pub parent: Option<RawId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawState {
    pub id: RawId,
    pub feature: RawId,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawEntity {
    pub id: RawId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    /// Attached links; entries with a `path` may point at the taxon profile
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<serde_json::Value>,
}

impl RawEntity {
    /// Display name: `name`, then `title`, then a placeholder built from the id
    #[must_use]
    pub fn display_name(&self, id: &str) -> String {
        [&self.name, &self.title]
            .into_iter()
            .flatten()
            .map(|s| s.trim())
            .find(|s| !s.is_empty())
            .map_or_else(|| format!("Taxon {id}"), str::to_string)
    }

    /// Reference URL: `url`, else the first attached link to a taxon profile
    #[must_use]
    pub fn reference_url(&self) -> Option<String> {
        if let Some(url) = self.url.as_deref().filter(|u| !u.trim().is_empty()) {
            return Some(url.to_string());
        }
        self.text
            .as_ref()
            .and_then(serde_json::Value::as_array)?
            .iter()
            .filter_map(|entry| entry.get("path").and_then(serde_json::Value::as_str))
            .find(|path| path.contains(TAXON_PROFILE_MARKER))
            .map(str::to_string)
    }
}

/// A multi-access key as found in the source data
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawMultiAccessKey {
    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub features: Vec<RawFeature>,

    #[serde(default)]
    pub states: Vec<RawState>,

    #[serde(default)]
    pub entities: Vec<RawEntity>,

    /// Compressed score rows: taxon id -> payload
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub scores: BTreeMap<String, Option<String>>,

    /// Compressed measurements: character id -> taxon id -> payload
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub measures: BTreeMap<String, BTreeMap<String, Option<String>>>,

    /// Pre-decoded score rows; takes precedence over `scores`
    #[serde(
        default,
        rename = "decompressedScores",
        skip_serializing_if = "Option::is_none"
    )]
    pub decompressed_scores: Option<BTreeMap<String, Option<Vec<i32>>>>,

    /// Pre-decoded measurements; NaN fields appear as `null`
    #[serde(
        default,
        rename = "decompressedMeasures",
        skip_serializing_if = "Option::is_none"
    )]
    pub decompressed_measures: Option<BTreeMap<String, BTreeMap<String, Option<Vec<Option<f64>>>>>>,
}

/// Strip the `var key = ...;` wrapper from a Lucid player bundle
#[must_use]
pub fn strip_bundle_wrapper(script: &str) -> Option<&str> {
    let rest = script.trim().strip_prefix("var")?.trim_start();
    let rest = rest.strip_prefix("key")?.trim_start();
    let body = rest.strip_prefix('=')?.trim();
    let body = body.strip_suffix(';').unwrap_or(body).trim_end();
    (body.starts_with('{') && body.ends_with('}')).then_some(body)
}

/// Parse a Lucid player bundle script
///
/// # Errors
///
/// Returns `LucidError::MissingWrapper` if the script is not a `var key = {...}`
/// assignment, or `LucidError::Json` if the object is not a valid key record.
pub fn parse_bundle(script: &str) -> Result<RawMultiAccessKey, LucidError> {
    let body = strip_bundle_wrapper(script).ok_or(LucidError::MissingWrapper)?;
    Ok(serde_json::from_str(body)?)
}

/// Parse a multi-access key from JSON text, or from a bundle script
///
/// # Errors
///
/// Returns a `LucidError` if the text is neither a JSON key record nor a bundle.
pub fn parse_key_text(text: &str) -> Result<RawMultiAccessKey, LucidError> {
    if text.trim_start().starts_with('{') {
        Ok(serde_json::from_str(text)?)
    } else {
        parse_bundle(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_bundle_wrapper() {
        assert_eq!(strip_bundle_wrapper("var key = {\"a\":1};\n"), Some("{\"a\":1}"));
        assert_eq!(strip_bundle_wrapper("var key={}"), Some("{}"));
        assert_eq!(strip_bundle_wrapper("let key = {};"), None);
        assert_eq!(strip_bundle_wrapper("var key = [1];"), None);
    }

    #[test]
    fn test_parse_bundle() {
        let script = r#"var key = {"title":"Wattles","features":[{"id":10,"name":"Leaves","type":1}],
            "states":[{"id":100,"feature":10,"name":"phyllodes"}],
            "entities":[{"id":1,"name":"Acacia dealbata"}],
            "scores":{"1":"AwRgTMQ="}};"#;
        let key = parse_bundle(script).unwrap();
        assert_eq!(key.title.as_deref(), Some("Wattles"));
        assert_eq!(key.features[0].kind, Some(1));
        assert_eq!(key.states[0].feature, RawId::Int(10));
        assert_eq!(key.scores.get("1"), Some(&Some("AwRgTMQ=".to_string())));
        assert!(key.decompressed_scores.is_none());
    }

    #[test]
    fn test_parse_bundle_rejects_plain_text() {
        assert!(matches!(
            parse_bundle("hello"),
            Err(LucidError::MissingWrapper)
        ));
    }

    #[test]
    fn test_parse_decompressed_json() {
        let json = r#"{"features":[],"decompressedScores":{"1":[0,1,2],"2":null},
            "decompressedMeasures":{"10":{"1":[null,5,10]}}}"#;
        let key = parse_key_text(json).unwrap();
        let scores = key.decompressed_scores.unwrap();
        assert_eq!(scores["1"], Some(vec![0, 1, 2]));
        assert_eq!(scores["2"], None);
        let measures = key.decompressed_measures.unwrap();
        assert_eq!(measures["10"]["1"], Some(vec![None, Some(5.0), Some(10.0)]));
    }

    #[test]
    fn test_entity_fallbacks() {
        let entity: RawEntity = serde_json::from_str(
            r#"{"id":5,"title":"Acacia","text":[{"caption":"Image","path":"/img/1.jpg"},
                {"caption":"Information","path":"https://vicflora.rbg.vic.gov.au/flora/taxon/abc"}]}"#,
        )
        .unwrap();
        assert_eq!(entity.display_name("5"), "Acacia");
        assert_eq!(
            entity.reference_url().as_deref(),
            Some("https://vicflora.rbg.vic.gov.au/flora/taxon/abc")
        );

        let bare: RawEntity = serde_json::from_str(r#"{"id":6,"name":"  "}"#).unwrap();
        assert_eq!(bare.display_name("6"), "Taxon 6");
        assert_eq!(bare.reference_url(), None);
    }
}
