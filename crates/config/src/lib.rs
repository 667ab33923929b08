//! Environment-sourced bridge configuration.
//!
//! Every setting comes from a process environment variable (a `.env` file is
//! loaded by the binary first). All settings have defaults except the sender
//! allowlist, whose emptiness disables all processing.

pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    loader::{from_env, from_lookup},
    schema::{BridgeConfig, SidecarSettings, TranscriptionSettings},
    validate::{Diagnostic, Severity, ValidationResult, validate},
};
