//! Chat runs over the gateway.
//!
//! A run is started with `chat.send` and followed through pushed `agent` /
//! `chat` events, or, on gateways without `chat.send`, submitted with
//! `agent`, awaited with `agent.wait` and read back from the session
//! transcript. Either way the caller's sink sees zero or more `text` units
//! followed by exactly one `finish` or `error` unit.

pub mod delegate;
pub mod error;
pub mod tracker;

pub use {
    delegate::{ChatDelegate, ChatRequest},
    error::{ChatError, Result},
    tracker::{RunTracker, Step},
};
