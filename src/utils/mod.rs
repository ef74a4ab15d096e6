//! Shared helpers: resource limits, identifier validation and number parsing.

pub mod validation;
