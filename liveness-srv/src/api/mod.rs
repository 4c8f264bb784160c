//! REST API server module.
//!
//! Provides HTTP endpoints for creating liveness sessions, streaming recorded
//! challenges and fetching verdicts.

pub mod error;
pub mod models;
pub mod routes;
pub mod server;

pub use server::{ApiServer, ApiServerConfig, AppState};
