//! Configuration for the gateway core: connection identity, chat defaults and
//! tool-bridge limits, loaded from TOML with environment overrides.

pub mod error;
pub mod loader;
pub mod schema;

pub use {
    error::{Error, Result},
    loader::{ENV_CONFIG_PATH, apply_env_overrides, default_config_path, discover_and_load, load_config},
    schema::{ChatConfig, GatewayConfig, NaiaConfig, ToolsConfig},
};
