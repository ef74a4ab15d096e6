//! Parsers for the source formats identification keys are distributed in.
//!
//! This module provides:
//!
//! - [`codec`]: the LZ-string decoder for compressed score and measurement cells
//! - [`lucid`]: multi-access key records (Lucid player bundles and scraped JSON)
//! - [`keybase`]: dichotomous key records (KeyBase exports)
//!
//! The types here are *raw* records: loosely typed, mirroring the source JSON. They
//! are validated and indexed by [`crate::catalog`] before any identification runs.
//!
//! ## Example
//!
//! ```rust
//! use key_solver::parsing::codec::decode_scores;
//!
//! // One taxon's score row: four characters
//! let codes = decode_scores("AwRgTMQ=").unwrap();
//! assert_eq!(codes, vec![0, 1, 2, 0]);
//! ```
//!
//! ## Identifiers
//!
//! Source data is inconsistent about identifier types: Lucid feature ids are numbers,
//! score maps are keyed by strings, KeyBase `to_key` may be either. [`RawId`] accepts
//! both and normalises to a string.

use serde::{Deserialize, Serialize};

pub mod codec;
pub mod keybase;
pub mod lucid;

/// An identifier that may be written as a JSON number or string
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawId {
    Int(i64),
    Str(String),
}

impl RawId {
    /// Normalised string form; `None` for blank strings
    #[must_use]
    pub fn normalized(&self) -> Option<String> {
        match self {
            Self::Int(n) => Some(n.to_string()),
            Self::Str(s) => {
                let s = s.trim();
                (!s.is_empty()).then(|| s.to_string())
            }
        }
    }
}

/// Normalise an optional raw id, treating `null` and blank strings alike as absent
pub(crate) fn optional_id(id: Option<&RawId>) -> Option<String> {
    id.and_then(RawId::normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_id_accepts_numbers_and_strings() {
        let ids: Vec<RawId> = serde_json::from_str(r#"[42, "42", " 7 ", ""]"#).unwrap();
        assert_eq!(ids[0].normalized().as_deref(), Some("42"));
        assert_eq!(ids[1].normalized().as_deref(), Some("42"));
        assert_eq!(ids[2].normalized().as_deref(), Some("7"));
        assert_eq!(ids[3].normalized(), None);
    }
}
