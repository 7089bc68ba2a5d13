//! Entrance-exam cutoff finder.
//!
//! Loads a cutoff table once, keeps it in memory, and answers "which seats
//! closed near my rank" queries over HTTP.
//!
//! - **`data`**: loading, facet values, the rank-window search engine and CSV export.
//! - **`state`**: the published dataset snapshot and readiness shared by handlers.
//! - **`web`**: axum routes, request translation and HTML rendering.
//! - **`config`** / **`error`**: command-line configuration and HTTP error mapping.

pub mod config;
pub mod data;
pub mod error;
pub mod state;
pub mod web;
