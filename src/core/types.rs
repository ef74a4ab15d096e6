use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

string_id!(
    /// Identifier of a taxon (a Lucid "entity")
    TaxonId
);
string_id!(
    /// Identifier of a character (a Lucid "feature")
    CharacterId
);
string_id!(
    /// Identifier of a character state
    StateId
);
string_id!(
    /// Identifier of a key within a catalog
    KeyId
);
string_id!(
    /// Identifier of a lead (question node) in a dichotomous key
    LeadId
);
string_id!(
    /// Identifier of a terminal item in a dichotomous key
    ItemId
);

/// How a character is used during identification
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CharacterKind {
    /// Heading that groups other characters; never asked
    Grouping,
    /// Character with discrete states
    Discrete,
    /// Character observed as a number
    Numeric,
}

impl CharacterKind {
    /// Map the numeric `type` code used by Lucid feature records
    #[must_use]
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Grouping),
            1 => Some(Self::Discrete),
            2 => Some(Self::Numeric),
            _ => None,
        }
    }

    /// Inverse of [`CharacterKind::from_code`]
    #[must_use]
    pub fn code(self) -> i64 {
        match self {
            Self::Grouping => 0,
            Self::Discrete => 1,
            Self::Numeric => 2,
        }
    }

    #[must_use]
    pub fn is_askable(self) -> bool {
        !matches!(self, Self::Grouping)
    }
}

impl std::fmt::Display for CharacterKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Grouping => write!(f, "grouping"),
            Self::Discrete => write!(f, "discrete"),
            Self::Numeric => write!(f, "numeric"),
        }
    }
}

/// A constraint chosen by the user for one character
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Selection {
    /// A discrete state was observed
    State(StateId),
    /// A numeric value was measured
    Numeric(f64),
}

impl std::fmt::Display for Selection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::State(id) => write!(f, "state {id}"),
            Self::Numeric(value) => write!(f, "{value}"),
        }
    }
}

/// Effect of applying one constraint to the candidate set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Narrowing {
    /// Taxa removed from the candidate set by this call
    pub eliminated: usize,
    /// Taxa still in the candidate set afterwards
    pub remaining: usize,
}

impl Narrowing {
    /// A zero-effect result, used when a reference could not be resolved
    #[must_use]
    pub fn unchanged(remaining: usize) -> Self {
        Self {
            eliminated: 0,
            remaining,
        }
    }
}
