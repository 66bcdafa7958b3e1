//! Tools the model can call, executed on the gateway host.
//!
//! File and search tools are composed onto the single remote
//! command-execution primitive (`exec.bash`, or `node.invoke` on a paired
//! node). Every user-supplied value is single-quoted before it reaches a
//! shell, and `execute_command` is screened against a denylist first.

pub mod bridge;
pub mod definitions;
pub mod error;
pub mod files;
pub mod guard;
pub mod params;
pub mod sessions_spawn;
pub mod shell;
pub mod web;

pub use {
    bridge::{ToolBridge, ToolResult},
    definitions::{ToolDefinition, gateway_tools},
    error::{Error, Result},
};
