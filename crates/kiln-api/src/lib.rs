//! API server for Kiln.
//!
//! Provides the HTTP endpoints and the adapters for GitHub and Azure Blob
//! storage.

pub mod error;
pub mod routes;
pub mod services;
pub mod state;

pub use state::AppState;
