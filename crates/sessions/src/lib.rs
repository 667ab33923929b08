//! Conversation → continuation token mapping.
//!
//! The AI process keeps its own transcript; the bridge only remembers which
//! opaque token resumes which chat. Nothing is persisted: a restart starts
//! every conversation fresh.

pub mod registry;

pub use registry::SessionRegistry;
