//! Media files on the bridge host: inbound images staged for the agent to
//! read, and the outbox the agent writes files into for delivery.

pub mod error;
pub mod mime;
pub mod outbox;
pub mod store;

pub use {
    error::{Error, Result},
    outbox::{Outbox, OutboxFile},
    store::{ImageStore, MediaStaging},
};
