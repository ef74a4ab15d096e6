//! Identification sessions over loaded keys.
//!
//! This module provides the two session types:
//!
//! - [`CandidateEngine`]: multi-access keying. Holds the live candidate set for one
//!   key, applies state and numeric selections, proposes the characters that can
//!   still split the candidates, and undoes by replaying [`SelectionHistory`]
//! - [`KeyNavigator`]: dichotomous keying. A stack of frames, one per key entered,
//!   with per-frame back-history; linked keys come from a [`KeyLoader`]
//!
//! Neither performs I/O, and both borrow their keys, so any number of sessions can
//! share one [`KeyCatalog`](crate::catalog::store::KeyCatalog).
//!
//! ## Matching Rules
//!
//! A taxon survives a state selection when its code for the character is the state's
//! position, or one of the wildcard codes `2` and `4`. It survives a numeric selection
//! when the value lies within the range of its measurement. Missing data never
//! matches.
//!
//! ## Example
//!
//! ```rust,no_run
//! use key_solver::{CandidateEngine, KeyCatalog};
//!
//! let catalog = KeyCatalog::load_embedded().unwrap();
//! let key = &catalog.multi_access_keys()[0];
//! let mut engine = CandidateEngine::new(key);
//!
//! while let Some(character) = engine.relevant_characters().first().copied() {
//!     let states = engine.states_of(&character.id);
//!     let Some(state) = states.first() else { break };
//!     let result = engine.choose_state(&character.id, &state.id);
//!     println!("{}: {} eliminated, {} left", character.name, result.eliminated, result.remaining);
//! }
//! println!("{:?}", engine.outcome());
//! ```

pub mod engine;
pub mod history;
pub mod navigator;

pub use engine::{CandidateEngine, EngineConfig, Outcome};
pub use history::SelectionHistory;
pub use navigator::{KeyLoader, KeyNavigator, NavigatorConfig, NavigatorError, Transition};
