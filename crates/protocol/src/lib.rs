//! Gateway WebSocket/RPC protocol definitions.
//!
//! Protocol version 3. All communication uses JSON frames over a single
//! WebSocket connection.
//!
//! Frame types:
//! - `RequestFrame`:  client → gateway RPC call, correlated by `id`
//! - `ResponseFrame`: gateway → client RPC result for a prior `id`
//! - `EventFrame`   : gateway → client server-push, never correlated

pub mod shell;
pub mod transcript;

use serde::{Deserialize, Serialize};

// ── Constants ────────────────────────────────────────────────────────────────

pub const PROTOCOL_VERSION: u32 = 3;
pub const HANDSHAKE_TIMEOUT_MS: u64 = 10_000; // 10s
pub const REQUEST_TIMEOUT_MS: u64 = 30_000; // 30s
pub const CHAT_TIMEOUT_MS: u64 = 180_000; // 3 min
pub const DEFAULT_SESSION_KEY: &str = "agent:main:main";

// ── Error codes ──────────────────────────────────────────────────────────────

pub mod error_codes {
    pub const UNKNOWN: &str = "UNKNOWN";
    pub const UNKNOWN_METHOD: &str = "UNKNOWN_METHOD";
    pub const INVALID_REQUEST: &str = "INVALID_REQUEST";
    pub const UNAUTHORIZED: &str = "UNAUTHORIZED";
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const UNAVAILABLE: &str = "UNAVAILABLE";
    pub const TIMEOUT: &str = "TIMEOUT";
}

// ── Well-known methods and events ────────────────────────────────────────────

pub mod methods {
    pub const CONNECT: &str = "connect";
    pub const CHAT_SEND: &str = "chat.send";
    pub const CHAT_HISTORY: &str = "chat.history";
    pub const AGENT: &str = "agent";
    pub const AGENT_WAIT: &str = "agent.wait";
    pub const EXEC_BASH: &str = "exec.bash";
    pub const NODE_LIST: &str = "node.list";
    pub const NODE_INVOKE: &str = "node.invoke";
    pub const SKILLS_INVOKE: &str = "skills.invoke";
    pub const BROWSER_REQUEST: &str = "browser.request";
    pub const SESSIONS_LIST: &str = "sessions.list";
    pub const SESSIONS_DELETE: &str = "sessions.delete";
    pub const SESSIONS_COMPACT: &str = "sessions.compact";
    pub const SESSIONS_PREVIEW: &str = "sessions.preview";
    pub const SESSIONS_PATCH: &str = "sessions.patch";
    pub const SESSIONS_RESET: &str = "sessions.reset";
    pub const SESSIONS_SPAWN: &str = "sessions.spawn";
    pub const SESSIONS_TRANSCRIPT: &str = "sessions.transcript";
    pub const CONFIG_GET: &str = "config.get";
    pub const CONFIG_SET: &str = "config.set";
    pub const CONFIG_SCHEMA: &str = "config.schema";
    pub const CONFIG_PATCH: &str = "config.patch";
    pub const MODELS_LIST: &str = "models.list";
    pub const HEALTH: &str = "health";
    pub const STATUS: &str = "status";
    pub const USAGE_STATUS: &str = "usage.status";
    pub const USAGE_COST: &str = "usage.cost";
    pub const LOGS_TAIL: &str = "logs.tail";
}

pub mod events {
    pub const CONNECT_CHALLENGE: &str = "connect.challenge";
    pub const AGENT: &str = "agent";
    pub const CHAT: &str = "chat";
    pub const EXEC_APPROVAL_REQUESTED: &str = "exec.approval.requested";
    pub const LOGS_ENTRY: &str = "logs.entry";
    pub const CHANNEL_MESSAGE: &str = "channel.message";
    pub const CHANNELS_MESSAGE: &str = "channels.message";
}

// ── Roles and scopes ─────────────────────────────────────────────────────────

pub mod roles {
    pub const OPERATOR: &str = "operator";
}

pub mod scopes {
    pub const ADMIN: &str = "operator.admin";
    pub const READ: &str = "operator.read";
    pub const WRITE: &str = "operator.write";
    pub const APPROVALS: &str = "operator.approvals";

    /// Scopes requested by an operator client unless configured otherwise.
    pub const DEFAULT: &[&str] = &[READ, WRITE, ADMIN, APPROVALS];
}

// ── Error shape ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorShape {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorShape {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }
}

// ── Frames ───────────────────────────────────────────────────────────────────

/// Discriminated union of all frame types.
///
/// Gateways in the wild spell the event tag both `"evt"` and `"event"`; both
/// decode to [`GatewayFrame::Event`]. Encoding always writes `"evt"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum GatewayFrame {
    #[serde(rename = "req")]
    Request(RequestFrame),
    #[serde(rename = "res")]
    Response(ResponseFrame),
    #[serde(rename = "evt", alias = "event")]
    Event(EventFrame),
}

impl GatewayFrame {
    pub fn request(
        id: impl Into<String>,
        method: impl Into<String>,
        params: serde_json::Value,
    ) -> Self {
        Self::Request(RequestFrame {
            id: id.into(),
            method: method.into(),
            params,
        })
    }

    /// Decode a text frame. Callers drop frames that fail to decode.
    pub fn parse(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestFrame {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseFrame {
    pub id: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorShape>,
}

impl ResponseFrame {
    pub fn ok(id: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            ok: true,
            payload: Some(payload),
            error: None,
        }
    }

    pub fn err(id: impl Into<String>, error: ErrorShape) -> Self {
        Self {
            id: id.into(),
            ok: false,
            payload: None,
            error: Some(error),
        }
    }

    /// Collapse the `ok`/`payload`/`error` triple into a `Result`.
    ///
    /// A successful response without a payload resolves to `null`; a failed
    /// response without an error body gets a generic `UNKNOWN` error.
    pub fn into_result(self) -> Result<serde_json::Value, ErrorShape> {
        if self.ok {
            Ok(self.payload.unwrap_or(serde_json::Value::Null))
        } else {
            Err(self.error.unwrap_or_else(|| {
                ErrorShape::new(error_codes::UNKNOWN, "Gateway request failed")
            }))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventFrame {
    pub event: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seq: Option<u64>,
}

impl EventFrame {
    pub fn new(event: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            event: event.into(),
            payload: Some(payload),
            seq: None,
        }
    }

    /// Look up a top-level payload field.
    pub fn field(&self, key: &str) -> Option<&serde_json::Value> {
        self.payload.as_ref().and_then(|p| p.get(key))
    }

    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.field(key).and_then(serde_json::Value::as_str)
    }

    /// The run this event belongs to, if the gateway tagged it with one.
    pub fn run_id(&self) -> Option<&str> {
        self.str_field("runId")
    }
}

// ── Connect handshake ────────────────────────────────────────────────────────

/// Payload of the `connect.challenge` event that opens every handshake.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectChallenge {
    pub nonce: String,
}

/// Parameters sent by the client in the single `connect` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectParams {
    #[serde(rename = "minProtocol")]
    pub min_protocol: u32,
    #[serde(rename = "maxProtocol")]
    pub max_protocol: u32,
    pub client: ClientInfo,
    pub role: String,
    pub scopes: Vec<String>,
    pub auth: ConnectAuth,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<DeviceInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientInfo {
    pub id: String,
    pub version: String,
    pub platform: String,
    pub mode: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub id: String,
    #[serde(rename = "publicKey")]
    pub public_key: String,
    /// Omitted entirely when the device could not produce a signature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(rename = "signedAt")]
    pub signed_at: u64,
    pub nonce: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectAuth {
    pub token: String,
}

/// Payload of a successful `connect` response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HelloOk {
    pub protocol: u32,
    pub features: Features,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Features {
    pub methods: Vec<String>,
    pub events: Vec<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    // ── Frame tags ─────────────────────────────────────────────────────

    #[test]
    fn request_frame_serializes_with_req_tag() {
        let frame = GatewayFrame::request("1", "health", serde_json::json!({}));
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["type"], "req");
        assert_eq!(json["id"], "1");
        assert_eq!(json["method"], "health");
        assert!(json["params"].is_object());
    }

    #[test]
    fn event_tag_accepts_both_spellings() {
        for tag in ["evt", "event"] {
            let raw = format!(r#"{{"type":"{tag}","event":"tick","payload":{{}},"seq":4}}"#);
            match GatewayFrame::parse(&raw).unwrap() {
                GatewayFrame::Event(evt) => {
                    assert_eq!(evt.event, "tick");
                    assert_eq!(evt.seq, Some(4));
                },
                other => panic!("expected event frame, got {other:?}"),
            }
        }
    }

    #[test]
    fn event_frames_encode_as_evt() {
        let frame = GatewayFrame::Event(EventFrame::new("chat", serde_json::json!({})));
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["type"], "evt");
    }

    #[test]
    fn unknown_frame_type_fails_to_parse() {
        assert!(GatewayFrame::parse(r#"{"type":"bogus","id":"1"}"#).is_err());
        assert!(GatewayFrame::parse("not json").is_err());
    }

    // ── Responses ──────────────────────────────────────────────────────

    #[test]
    fn ok_response_without_payload_resolves_to_null() {
        let frame: ResponseFrame = serde_json::from_str(r#"{"id":"1","ok":true}"#).unwrap();
        assert_eq!(frame.into_result().unwrap(), serde_json::Value::Null);
    }

    #[test]
    fn failed_response_keeps_remote_code() {
        let frame = ResponseFrame::err("1", ErrorShape::new(error_codes::NOT_FOUND, "missing"));
        let err = frame.into_result().unwrap_err();
        assert_eq!(err.code, "NOT_FOUND");
        assert_eq!(err.message, "missing");
    }

    #[test]
    fn failed_response_without_error_body_gets_generic_error() {
        let frame: ResponseFrame = serde_json::from_str(r#"{"id":"1","ok":false}"#).unwrap();
        let err = frame.into_result().unwrap_err();
        assert_eq!(err.code, error_codes::UNKNOWN);
    }

    #[test]
    fn ok_constructor_omits_error() {
        let json = serde_json::to_value(ResponseFrame::ok("7", serde_json::json!(1))).unwrap();
        assert!(!json.as_object().unwrap().contains_key("error"));
    }

    // ── Events ─────────────────────────────────────────────────────────

    #[test]
    fn event_run_id_lookup() {
        let evt = EventFrame::new("agent", serde_json::json!({"runId": "r-1", "stream": "x"}));
        assert_eq!(evt.run_id(), Some("r-1"));
        assert_eq!(evt.str_field("stream"), Some("x"));
        assert!(EventFrame::new("tick", serde_json::json!({})).run_id().is_none());
    }

    // ── Handshake ──────────────────────────────────────────────────────

    #[test]
    fn device_without_signature_omits_key() {
        let device = DeviceInfo {
            id: "dev".into(),
            public_key: "pk".into(),
            signature: None,
            signed_at: 1,
            nonce: "n".into(),
        };
        let json = serde_json::to_value(&device).unwrap();
        assert!(!json.as_object().unwrap().contains_key("signature"));
        assert_eq!(json["publicKey"], "pk");
        assert_eq!(json["signedAt"], 1);
    }

    #[test]
    fn hello_ok_tolerates_sparse_payload() {
        let hello: HelloOk = serde_json::from_value(serde_json::json!({
            "protocol": 3,
            "features": {"methods": ["chat.send"]}
        }))
        .unwrap();
        assert_eq!(hello.protocol, 3);
        assert_eq!(hello.features.methods, vec!["chat.send"]);
        assert!(hello.features.events.is_empty());

        let empty: HelloOk = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(empty.features.methods.is_empty());
    }

    #[test]
    fn connect_params_use_camel_case_protocol_range() {
        let params = ConnectParams {
            min_protocol: PROTOCOL_VERSION,
            max_protocol: PROTOCOL_VERSION,
            client: ClientInfo {
                id: "cli".into(),
                version: "0.1.0".into(),
                platform: "linux".into(),
                mode: "cli".into(),
            },
            role: roles::OPERATOR.into(),
            scopes: scopes::DEFAULT.iter().map(|s| (*s).to_string()).collect(),
            auth: ConnectAuth {
                token: "tok".into(),
            },
            device: None,
        };
        let json = serde_json::to_value(&params).unwrap();
        assert_eq!(json["minProtocol"], 3);
        assert_eq!(json["maxProtocol"], 3);
        assert_eq!(json["auth"]["token"], "tok");
        assert_eq!(json["scopes"].as_array().unwrap().len(), 4);
        assert!(!json.as_object().unwrap().contains_key("device"));
    }
}
