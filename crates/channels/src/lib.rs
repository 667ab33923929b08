//! Channel capability traits.
//!
//! The chat transport produces [`InboundMessage`]s and implements
//! [`ChannelOutbound`] for replies and [`ChannelMedia`] for on-demand media
//! downloads. The conversation core only ever talks to these traits.

pub mod error;
pub mod gating;
pub mod plugin;

pub use {
    error::{Error, Result},
    plugin::{ChannelMedia, ChannelOutbound, InboundMessage, MediaPayload},
};
