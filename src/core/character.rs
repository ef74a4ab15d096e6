use serde::{Deserialize, Serialize};

use crate::core::types::{CharacterId, CharacterKind, StateId};

/// An observable trait scored in a multi-access key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Character {
    pub id: CharacterId,

    /// Name as recorded in the source; may be empty for sub-characters
    pub name: String,

    pub kind: CharacterKind,

    /// Named trait this character is grouped under
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<CharacterId>,
}

impl Character {
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: CharacterKind) -> Self {
        Self {
            id: CharacterId::new(id),
            name: name.into(),
            kind,
            parent: None,
        }
    }
}

/// One discrete value a character can take
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    pub id: StateId,

    /// Character that owns this state
    pub character: CharacterId,

    pub name: String,

    /// Index among the owning character's states, in declaration order.
    /// This is the value score codes are compared against.
    pub position: usize,
}

impl State {
    pub fn new(
        id: impl Into<String>,
        character: impl Into<String>,
        name: impl Into<String>,
        position: usize,
    ) -> Self {
        Self {
            id: StateId::new(id),
            character: CharacterId::new(character),
            name: name.into(),
            position,
        }
    }
}
