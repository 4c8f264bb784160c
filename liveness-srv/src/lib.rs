//! liveness-srv library crate.
//!
//! This module exposes the service and API layers for integration testing.

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod remote;
pub mod service;

pub use error::{Error, Result};
