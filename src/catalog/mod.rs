//! Identification key storage and indexing.
//!
//! A [`KeyCatalog`](store::KeyCatalog) holds keys of two kinds:
//!
//! - **Multi-access keys** ([`MultiAccessKey`](multi_access::MultiAccessKey)): characters,
//!   states and taxa with a decoded score matrix and measurement table
//! - **Dichotomous keys** ([`DichotomousKey`](dichotomous::DichotomousKey)): leads indexed
//!   by parent node, terminal items, and links onward to other keys
//!
//! Keys are validated once while loading and are read-only afterwards, so one catalog
//! can back any number of concurrent sessions.
//!
//! ## Embedded Catalog
//!
//! A small demo catalog is compiled into the binary: one multi-access key and a pair of
//! linked dichotomous keys (`1903` linking to `42`).
//!
//! ## Example
//!
//! ```rust,no_run
//! use key_solver::KeyCatalog;
//! use key_solver::core::types::KeyId;
//!
//! let catalog = KeyCatalog::load_embedded().unwrap();
//!
//! for key in catalog.list_multi_keys() {
//!     println!("{}: {} taxa", key.title, key.taxa);
//! }
//!
//! let families = catalog.dichotomous(&KeyId::new("1903"));
//! ```
//!
//! ## Loading Keys From Disk
//!
//! ```rust,no_run
//! use key_solver::KeyCatalog;
//! use std::path::Path;
//!
//! // A bundle, a single key file, or a directory of .json / .json.gz / .js files
//! let catalog = KeyCatalog::load(Path::new("vicflora-data")).unwrap();
//! for issue in catalog.issues() {
//!     eprintln!("skipped: {issue}");
//! }
//!
//! // Export everything as one bundle with decoded matrices
//! let json = catalog.to_json().unwrap();
//! ```

pub mod dichotomous;
pub mod matrix;
pub mod multi_access;
pub mod store;
