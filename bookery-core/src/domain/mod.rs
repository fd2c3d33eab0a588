//! Domain models for Bookery Core

pub mod principal;
pub mod tenant;

pub use principal::*;
pub use tenant::*;
