//! Shared types, the error-context helper, and utilities used across all relay crates.

pub mod error;
pub mod types;

pub use error::FromMessage;
