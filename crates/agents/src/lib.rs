//! AI invocation capability.
//!
//! The bridge hands each prompt to an external agent process and gets back a
//! reply plus optional cost/latency metadata. [`ClaudeCli`] drives the
//! `claude` command line tool; tests substitute their own [`AgentInvoker`].

pub mod claude_cli;
pub mod error;
pub mod invoker;
pub mod output;

pub use {
    claude_cli::{ClaudeCli, OUTBOX_DIR_ENV},
    error::{AgentError, Result},
    invoker::{AgentInvoker, AgentReply},
};
