use serde::{Deserialize, Serialize};

use crate::core::types::TaxonId;

/// A taxon that a multi-access key can identify
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Taxon {
    /// Unique identifier within the key
    pub id: TaxonId,

    /// Display name (usually the scientific name)
    pub name: String,

    /// Link to a taxon profile, when the source provides one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl Taxon {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: TaxonId::new(id),
            name: name.into(),
            url: None,
        }
    }
}
