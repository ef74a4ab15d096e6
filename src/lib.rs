//! # key-solver
//!
//! A library for identifying biological specimens with identification keys.
//!
//! Two styles of key are supported. A **dichotomous key** is a tree of either/or
//! questions whose leaves name a taxon, and may hand over to another key. A
//! **multi-access key** is a taxon-by-character score matrix that can be queried in any
//! order: each observation removes the taxa that disagree with it, until one (or a small
//! group) remains.
//!
//! ## Features
//!
//! - **Lucid matrix decoding**: LZ-string compressed score rows and measurements
//! - **Candidate narrowing**: state and numeric selections, wildcard scores, undo by replay
//! - **Relevant characters**: only characters that still split the candidates are offered
//! - **Linked dichotomous keys**: navigation follows items into other keys and back
//! - **Quarantine on load**: bad cells and dangling references are reported, not fatal
//!
//! ## Example
//!
//! ```rust,no_run
//! use key_solver::{CandidateEngine, KeyCatalog};
//! use key_solver::core::types::{CharacterId, StateId};
//!
//! // Load the embedded demo catalog
//! let catalog = KeyCatalog::load_embedded().unwrap();
//! let key = &catalog.multi_access_keys()[0];
//!
//! let mut engine = CandidateEngine::new(key);
//! for character in engine.relevant_characters() {
//!     println!("{}", key.character_display_name(&character.id));
//! }
//!
//! let result = engine.choose_state(&CharacterId::new("habit"), &StateId::new("habit-tree"));
//! println!("{} eliminated, {} remaining", result.eliminated, result.remaining);
//! ```
//!
//! ## Modules
//!
//! - [`catalog`]: Key storage, validation and indexing
//! - [`core`]: Core data types for taxa, characters, states, leads and items
//! - [`matching`]: Multi-access engine and dichotomous navigator
//! - [`parsing`]: Matrix codec and raw Lucid / KeyBase records
//! - [`cli`]: Command-line interface implementation
//! - [`web`]: JSON API for browser-based identification

pub mod catalog;
pub mod cli;
pub mod core;
pub mod matching;
pub mod parsing;
pub mod utils;
pub mod web;

// Re-export commonly used types for convenience
pub use catalog::dichotomous::DichotomousKey;
pub use catalog::multi_access::MultiAccessKey;
pub use catalog::store::KeyCatalog;
pub use core::types::*;
pub use matching::engine::{CandidateEngine, EngineConfig, Outcome};
pub use matching::navigator::{KeyNavigator, NavigatorConfig, Transition};
