//! WhatsApp Web transport.
//!
//! A Node sidecar holds the WhatsApp Web session and exposes it over a local
//! WebSocket. This crate starts that process, speaks its JSON protocol, and
//! adapts it to the channel traits.

pub mod outbound;
pub mod process;
pub mod sidecar;
pub mod types;

pub use {
    outbound::WhatsAppOutbound,
    process::{SidecarConfig, SidecarProcess, find_sidecar_dir, start_sidecar, ws_url},
    sidecar::{REQUEST_TIMEOUT, SidecarClient},
    types::{GatewayMessage, InboundPayload, PresenceState, SidecarMessage},
};
