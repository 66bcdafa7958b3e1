use std::path::PathBuf;

use {
    naia_protocol::{DEFAULT_SESSION_KEY, roles, scopes},
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

/// Root configuration document (`naia.toml`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NaiaConfig {
    pub gateway: GatewayConfig,
    pub chat: ChatConfig,
    pub tools: ToolsConfig,
}

/// How to reach the gateway and how to introduce ourselves to it.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// WebSocket URL, e.g. `ws://127.0.0.1:18789`.
    pub url: String,

    /// Gateway auth token sent in the `connect` request.
    #[serde(serialize_with = "serialize_secret")]
    pub token: Secret<String>,

    pub client_id: String,
    pub platform: String,
    pub mode: String,
    pub role: String,
    pub scopes: Vec<String>,

    /// JSON file holding the device's Ed25519 identity. No device block is
    /// sent when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_identity_path: Option<PathBuf>,

    pub request_timeout_secs: u64,
    pub handshake_timeout_secs: u64,
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("url", &self.url)
            .field("token", &"[REDACTED]")
            .field("client_id", &self.client_id)
            .field("platform", &self.platform)
            .field("mode", &self.mode)
            .field("role", &self.role)
            .field("scopes", &self.scopes)
            .field("device_identity_path", &self.device_identity_path)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("handshake_timeout_secs", &self.handshake_timeout_secs)
            .finish()
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:18789".into(),
            token: Secret::new(String::new()),
            client_id: "cli".into(),
            platform: std::env::consts::OS.into(),
            mode: "cli".into(),
            role: roles::OPERATOR.into(),
            scopes: scopes::DEFAULT.iter().map(|s| (*s).to_string()).collect(),
            device_identity_path: None,
            request_timeout_secs: naia_protocol::REQUEST_TIMEOUT_MS / 1000,
            handshake_timeout_secs: naia_protocol::HANDSHAKE_TIMEOUT_MS / 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Session every chat run is routed to unless the caller names one.
    pub session_key: String,
    pub timeout_secs: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            session_key: DEFAULT_SESSION_KEY.into(),
            timeout_secs: naia_protocol::CHAT_TIMEOUT_MS / 1000,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// File tools refuse paths that resolve outside this directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace_root: Option<PathBuf>,
}

fn serialize_secret<S: serde::Serializer>(
    secret: &Secret<String>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}
