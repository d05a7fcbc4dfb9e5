//! # Tradelog Core
//!
//! The domain layer of the Tradelog backend.
//! This crate contains the admission-check logic and the port traits,
//! with zero infrastructure dependencies.

pub mod domain;
pub mod error;
pub mod ports;
pub mod rate_limit;

pub use error::{PolicyError, PoolError};
