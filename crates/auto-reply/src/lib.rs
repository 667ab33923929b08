//! Inbound message processing: the glue between the chat transport and the
//! agent.
//!
//! Flow: inbound event → busy check → group/content filter → allow-list →
//! command interception → per-conversation queue → media preprocessing →
//! agent invocation → chunking → delivery → outbox delivery.

pub mod busy;
pub mod chunk;
pub mod commands;
pub mod error;
pub mod handler;
pub mod queue;
pub mod reply;

pub use {
    busy::BusyGuard,
    chunk::chunk_message,
    commands::Command,
    error::{Rejection, Result, TurnError},
    handler::{
        BridgeState, Capabilities, ConversationHandler, Disposition, HandlerSettings,
        RestartTrigger,
    },
    queue::{DispatchError, SerialDispatcher, TaskHandle},
};
