//! Core data types for specimen identification.
//!
//! This module provides the entities that keys are built from:
//!
//! - [`Taxon`](taxon::Taxon): a candidate outcome of a multi-access key
//! - [`Character`](character::Character) and [`State`](character::State): observable
//!   traits and their discrete values
//! - [`Lead`](lead::Lead) and [`Item`](lead::Item): question nodes and terminal outcomes
//!   of a dichotomous key
//! - [`types`]: identifier newtypes, [`CharacterKind`](types::CharacterKind),
//!   [`Selection`](types::Selection) and [`Narrowing`](types::Narrowing)
//!
//! All of these are created once while a key is loaded and are read-only afterwards.
//!
//! ## State positions
//!
//! Score matrices do not refer to states by identifier. A taxon's code for a character
//! is the *position* of the state among that character's states, counted in declaration
//! order:
//!
//! | Declared state | Position | Matching code |
//! |----------------|----------|---------------|
//! | leaves opposite | 0 | 0 |
//! | leaves alternate | 1 | 1 |
//! | (any state) | - | 2 or 4 (wildcard) |

pub mod character;
pub mod lead;
pub mod taxon;
pub mod types;
