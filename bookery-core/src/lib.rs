//! Bookery Core - tenant resolution, session tokens and access control
//!
//! This crate maps request hosts to businesses, issues and verifies session
//! tokens, keeps the revocation list for logged-out tokens, and guards the
//! REST routes of the Bookery booking platform.

pub mod api;
pub mod auth;
pub mod authz;
pub mod config;
pub mod domain;
pub mod error;
pub mod jwt;
pub mod middleware;
pub mod repository;
pub mod revocation;
pub mod server;
pub mod telemetry;
pub mod tenancy;

// Re-export commonly used types
pub use config::Config;
pub use error::{AppError, Result};
