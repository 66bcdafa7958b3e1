//! Challenge/response handshake performed once per connection.
//!
//! ```text
//! gateway → evt connect.challenge {nonce}
//! client  → req connect {auth, minProtocol, maxProtocol, client, role, scopes, device?}
//! gateway → res {ok, payload: {protocol, features: {methods}}}
//! ```

use std::{sync::Arc, time::Duration};

use {
    futures::{Sink, SinkExt, Stream, StreamExt},
    naia_config::GatewayConfig,
    naia_protocol::{
        ClientInfo, ConnectAuth, ConnectChallenge, ConnectParams, DeviceInfo, GatewayFrame,
        HelloOk, PROTOCOL_VERSION, events, methods, roles, scopes,
    },
    secrecy::{ExposeSecret, Secret},
    tokio_tungstenite::tungstenite::{self, Message},
    tracing::{debug, warn},
};

use crate::{
    device::{DeviceSigner, Ed25519DeviceIdentity},
    error::{Error, Result},
};

const HANDSHAKE_FAILED: &str = "Gateway handshake failed";

/// Identity and credentials presented in the `connect` request.
#[derive(Clone)]
pub struct ConnectOptions {
    pub token: Secret<String>,
    pub client_id: String,
    pub platform: String,
    pub mode: String,
    pub version: String,
    pub role: String,
    pub scopes: Vec<String>,
    pub device: Option<Arc<dyn DeviceSigner>>,
    pub handshake_timeout: Duration,
}

impl std::fmt::Debug for ConnectOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectOptions")
            .field("token", &"[REDACTED]")
            .field("client_id", &self.client_id)
            .field("platform", &self.platform)
            .field("mode", &self.mode)
            .field("version", &self.version)
            .field("role", &self.role)
            .field("scopes", &self.scopes)
            .field("device", &self.device.as_ref().map(|d| d.device_id().to_string()))
            .field("handshake_timeout", &self.handshake_timeout)
            .finish()
    }
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            token: Secret::new(String::new()),
            client_id: "cli".into(),
            platform: std::env::consts::OS.into(),
            mode: "cli".into(),
            version: env!("CARGO_PKG_VERSION").into(),
            role: roles::OPERATOR.into(),
            scopes: scopes::DEFAULT.iter().map(|s| (*s).to_string()).collect(),
            device: None,
            handshake_timeout: Duration::from_millis(naia_protocol::HANDSHAKE_TIMEOUT_MS),
        }
    }
}

impl ConnectOptions {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Secret::new(token.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_device(mut self, device: Arc<dyn DeviceSigner>) -> Self {
        self.device = Some(device);
        self
    }

    /// Build options from configuration. An unreadable device identity file
    /// is logged and the connection proceeds without a device block.
    pub fn from_config(config: &GatewayConfig) -> Self {
        let device = config.device_identity_path.as_deref().and_then(|path| {
            match Ed25519DeviceIdentity::load(path) {
                Ok(identity) => Some(Arc::new(identity) as Arc<dyn DeviceSigner>),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to load device identity");
                    None
                },
            }
        });
        Self {
            token: config.token.clone(),
            client_id: config.client_id.clone(),
            platform: config.platform.clone(),
            mode: config.mode.clone(),
            version: env!("CARGO_PKG_VERSION").into(),
            role: config.role.clone(),
            scopes: config.scopes.clone(),
            device,
            handshake_timeout: Duration::from_secs(config.handshake_timeout_secs),
        }
    }
}

/// The exact string a device signs: pipe-joined, version-prefixed.
pub fn device_auth_payload(
    options: &ConnectOptions,
    device_id: &str,
    signed_at_ms: u64,
    nonce: &str,
) -> String {
    let scopes = options.scopes.join(",");
    let signed_at = signed_at_ms.to_string();
    let parts: [&str; 9] = [
        "v2",
        device_id,
        &options.client_id,
        &options.mode,
        &options.role,
        &scopes,
        &signed_at,
        options.token.expose_secret(),
        nonce,
    ];
    parts.join("|")
}

pub fn build_connect_params(options: &ConnectOptions, nonce: &str, now_ms: u64) -> ConnectParams {
    let device = options.device.as_ref().map(|signer| {
        let payload = device_auth_payload(options, signer.device_id(), now_ms, nonce);
        let signature = match signer.sign(payload.as_bytes()) {
            Ok(signature) => Some(signature),
            Err(e) => {
                warn!(error = %e, "device signing failed, connecting without signature");
                None
            },
        };
        DeviceInfo {
            id: signer.device_id().to_string(),
            public_key: signer.public_key().to_string(),
            signature,
            signed_at: now_ms,
            nonce: nonce.to_string(),
        }
    });

    ConnectParams {
        min_protocol: PROTOCOL_VERSION,
        max_protocol: PROTOCOL_VERSION,
        client: ClientInfo {
            id: options.client_id.clone(),
            version: options.version.clone(),
            platform: options.platform.clone(),
            mode: options.mode.clone(),
        },
        role: options.role.clone(),
        scopes: options.scopes.clone(),
        auth: ConnectAuth {
            token: options.token.expose_secret().clone(),
        },
        device,
    }
}

/// Drive the handshake over an already-open socket.
///
/// Unrelated frames are ignored. Only the first challenge produces a
/// `connect` request. The caller bounds this with the handshake timeout.
pub(crate) async fn perform<S, R>(
    sink: &mut S,
    stream: &mut R,
    options: &ConnectOptions,
) -> Result<HelloOk>
where
    S: Sink<Message, Error = tungstenite::Error> + Unpin,
    R: Stream<Item = std::result::Result<Message, tungstenite::Error>> + Unpin,
{
    let mut connect_id: Option<String> = None;

    while let Some(message) = stream.next().await {
        let text = match message {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => return Err(Error::ClosedDuringHandshake),
            Ok(_) => continue,
            Err(e) => {
                debug!(error = %e, "transport error during handshake");
                return Err(Error::ClosedDuringHandshake);
            },
        };
        let Ok(frame) = GatewayFrame::parse(&text) else {
            debug!("ignoring malformed frame during handshake");
            continue;
        };

        match frame {
            GatewayFrame::Event(evt) if evt.event == events::CONNECT_CHALLENGE => {
                if connect_id.is_some() {
                    debug!("ignoring repeated connect challenge");
                    continue;
                }
                let challenge = evt
                    .payload
                    .and_then(|p| serde_json::from_value::<ConnectChallenge>(p).ok());
                let Some(ConnectChallenge { nonce }) = challenge else {
                    warn!("connect challenge without nonce");
                    continue;
                };
                let params = build_connect_params(options, &nonce, now_ms());
                let id = uuid::Uuid::new_v4().to_string();
                let frame =
                    GatewayFrame::request(id.clone(), methods::CONNECT, serde_json::to_value(params)?);
                sink.send(Message::Text(frame.to_json()?.into())).await?;
                connect_id = Some(id);
            },
            GatewayFrame::Response(res) if connect_id.as_deref() == Some(res.id.as_str()) => {
                return match res.into_result() {
                    Ok(payload) => Ok(parse_hello(payload)),
                    Err(shape) => {
                        let message = if shape.message.is_empty() {
                            HANDSHAKE_FAILED.to_string()
                        } else {
                            shape.message
                        };
                        Err(Error::Handshake {
                            code: Some(shape.code),
                            message,
                        })
                    },
                };
            },
            _ => debug!("ignoring frame during handshake"),
        }
    }

    Err(Error::ClosedDuringHandshake)
}

fn parse_hello(payload: serde_json::Value) -> HelloOk {
    serde_json::from_value(payload).unwrap_or_else(|e| {
        warn!(error = %e, "unexpected connect response payload");
        HelloOk::default()
    })
}

fn now_ms() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or_default()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    struct FailingSigner;

    impl DeviceSigner for FailingSigner {
        fn device_id(&self) -> &str {
            "dev-broken"
        }

        fn public_key(&self) -> &str {
            "pk"
        }

        fn sign(&self, _payload: &[u8]) -> Result<String> {
            Err(Error::message("keychain locked"))
        }
    }

    fn options() -> ConnectOptions {
        ConnectOptions {
            version: "0.1.0".into(),
            platform: "linux".into(),
            ..ConnectOptions::new("tok")
        }
    }

    #[test]
    fn defaults_describe_operator_cli() {
        let params = build_connect_params(&options(), "nonce-1", 5);
        let json = serde_json::to_value(params).unwrap();
        assert_eq!(json["minProtocol"], 3);
        assert_eq!(json["maxProtocol"], 3);
        assert_eq!(json["auth"]["token"], "tok");
        assert_eq!(
            json["client"],
            serde_json::json!({"id": "cli", "version": "0.1.0", "platform": "linux", "mode": "cli"})
        );
        assert_eq!(json["role"], "operator");
        assert_eq!(
            json["scopes"],
            serde_json::json!([
                "operator.read",
                "operator.write",
                "operator.admin",
                "operator.approvals"
            ])
        );
        assert!(json.get("device").is_none());
    }

    #[test]
    fn signed_payload_layout() {
        let payload = device_auth_payload(&options(), "dev-1", 1_700_000_000_000, "abc");
        assert_eq!(
            payload,
            "v2|dev-1|cli|cli|operator|operator.read,operator.write,operator.admin,operator.approvals|1700000000000|tok|abc"
        );
    }

    #[test]
    fn device_block_carries_signature() {
        let identity = Arc::new(Ed25519DeviceIdentity::from_seed("dev-1", [5; 32]));
        let opts = options().with_device(identity.clone());
        let params = build_connect_params(&opts, "nonce-9", 42);
        let device = params.device.unwrap();
        assert_eq!(device.id, "dev-1");
        assert_eq!(device.public_key, identity.public_key());
        assert_eq!(device.nonce, "nonce-9");
        assert_eq!(device.signed_at, 42);
        let expected = identity
            .sign(device_auth_payload(&opts, "dev-1", 42, "nonce-9").as_bytes())
            .unwrap();
        assert_eq!(device.signature.as_deref(), Some(expected.as_str()));
    }

    #[test]
    fn signing_failure_omits_signature_key() {
        let opts = options().with_device(Arc::new(FailingSigner));
        let json = serde_json::to_value(build_connect_params(&opts, "n", 1)).unwrap();
        let device = json["device"].as_object().unwrap();
        assert_eq!(device["id"], "dev-broken");
        assert!(!device.contains_key("signature"));
    }

    #[test]
    fn debug_redacts_token() {
        let rendered = format!("{:?}", ConnectOptions::new("very-secret"));
        assert!(!rendered.contains("very-secret"));
    }

    #[test]
    fn from_config_tolerates_missing_identity_file() {
        let config = GatewayConfig {
            device_identity_path: Some("/nonexistent/device.json".into()),
            ..GatewayConfig::default()
        };
        let opts = ConnectOptions::from_config(&config);
        assert!(opts.device.is_none());
        assert_eq!(opts.handshake_timeout, Duration::from_secs(10));
    }

    #[test]
    fn non_object_hello_payload_yields_empty_methods() {
        assert!(parse_hello(serde_json::Value::Null).features.methods.is_empty());
    }
}
