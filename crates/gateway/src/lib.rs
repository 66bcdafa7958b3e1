//! WebSocket client for the agent gateway.
//!
//! Covers the connect handshake (with optional device signing), request /
//! response correlation with per-request timeouts, push-event fan-out,
//! capability-aware dispatch of command execution, and typed wrappers for
//! the session, config and diagnostics RPCs.

pub mod client;
pub mod device;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod handshake;
pub mod rpc;
pub mod sink;

#[cfg(any(test, feature = "test-support"))]
#[allow(clippy::unwrap_used, clippy::expect_used)]
pub mod testing;

pub use {
    client::{EventHandler, EventSubscription, GatewayClient, ListenerId},
    device::{DeviceSigner, Ed25519DeviceIdentity},
    dispatch::{CommandOutput, request_first, run_command},
    error::{Error, Result},
    events::forward_gateway_events,
    handshake::ConnectOptions,
    sink::{CollectingSink, JsonLinesSink, OutputSink},
};
