use serde::{Deserialize, Serialize};

use crate::core::types::{ItemId, KeyId, LeadId};

/// A branch of a dichotomous key: one of the alternatives offered at its parent node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lead {
    pub id: LeadId,

    /// Node this lead is offered at
    pub parent: LeadId,

    /// Statement shown to the user
    pub text: String,

    /// Outcome reached by taking this lead, if it is terminal
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item: Option<ItemId>,
}

/// A terminal outcome of a dichotomous key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,

    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Another key that continues the identification from this item
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_key: Option<KeyId>,
}

impl Item {
    #[must_use]
    pub fn links_to_key(&self) -> bool {
        self.to_key.is_some()
    }
}
