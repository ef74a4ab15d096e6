//! JSON API for identification sessions.
//!
//! Sessions are not stored on the server. A client keeps its own history (the
//! selections made, or the navigation steps taken) and posts it with every request;
//! the server replays it on a fresh engine and returns where the session stands.
//!
//! ## Starting the Server
//!
//! ```text
//! # Start on default port 8080 with the embedded demo keys
//! key-solver serve
//!
//! # Serve a directory of scraped keys and open a browser
//! key-solver serve --catalog vicflora-data --port 3000 --open
//!
//! # Bind to all interfaces
//! key-solver serve --address 0.0.0.0
//! ```
//!
//! ## API Endpoints
//!
//! - `GET /` - Minimal page for trying the API
//! - `GET /api/keys` - Multi-access and dichotomous key listings
//! - `POST /api/multi/{key_id}/session` - Replay selections on a multi-access key
//! - `POST /api/dichotomous/{key_id}/navigate` - Replay steps through a dichotomous key

pub mod server;
