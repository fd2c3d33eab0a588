//! Data access layer (Repository pattern)

pub mod tenant;

pub use tenant::{TenantRepository, TenantRepositoryImpl};
