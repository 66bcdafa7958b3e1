use {
    futures::future::join_all,
    naia_protocol::{methods, transcript},
    serde::{Deserialize, Serialize},
    serde_json::json,
    tracing::debug,
};

use crate::{client::GatewayClient, error::Result, rpc::decode};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SessionInfo {
    pub key: String,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<u64>,
    pub message_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DeleteResult {
    pub deleted: bool,
    pub key: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CompactResult {
    pub compacted: bool,
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub removed_messages: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PreviewResult {
    pub key: String,
    pub summary: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PatchResult {
    pub key: String,
    pub patched: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ResetResult {
    pub key: String,
    pub reset: bool,
}

/// List sessions, each enriched with its message count from `chat.history`.
/// History lookups run concurrently; a failed lookup counts as zero.
pub async fn list_sessions(client: &GatewayClient, limit: Option<u32>) -> Result<Vec<SessionInfo>> {
    let params = match limit {
        Some(limit) => json!({ "limit": limit }),
        None => json!({}),
    };
    let payload = client.request(methods::SESSIONS_LIST, params).await?;
    let raw = payload
        .get("sessions")
        .and_then(|s| s.as_array())
        .cloned()
        .unwrap_or_default();

    let sessions = join_all(raw.into_iter().map(|raw| async move {
        let mut extra = match raw {
            serde_json::Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };
        let key = take_string(&mut extra, "key").unwrap_or_default();
        let display_name = take_string(&mut extra, "displayName");
        let label = take_string(&mut extra, "label");
        let status = extra
            .get("chatType")
            .and_then(|v| v.as_str())
            .map(str::to_string);
        let created_at = extra.remove("createdAt").and_then(|v| v.as_u64());
        let message_count = message_count(client, &key).await;

        SessionInfo {
            label: display_name.or(label).unwrap_or_else(|| key.clone()),
            key,
            created_at,
            message_count,
            status,
            extra,
        }
    }))
    .await;

    Ok(sessions)
}

async fn message_count(client: &GatewayClient, key: &str) -> u64 {
    match client
        .request(methods::CHAT_HISTORY, json!({ "sessionKey": key }))
        .await
    {
        Ok(history) => transcript::messages(&history).len() as u64,
        Err(e) => {
            debug!(%key, error = %e, "chat.history failed, counting zero messages");
            0
        },
    }
}

fn take_string(map: &mut serde_json::Map<String, serde_json::Value>, key: &str) -> Option<String> {
    match map.remove(key) {
        Some(serde_json::Value::String(s)) => Some(s),
        _ => None,
    }
}

pub async fn delete_session(client: &GatewayClient, key: &str) -> Result<DeleteResult> {
    decode(client.request(methods::SESSIONS_DELETE, json!({ "key": key })).await?)
}

pub async fn compact_session(client: &GatewayClient, key: &str) -> Result<CompactResult> {
    decode(client.request(methods::SESSIONS_COMPACT, json!({ "key": key })).await?)
}

pub async fn preview_session(client: &GatewayClient, key: &str) -> Result<PreviewResult> {
    decode(client.request(methods::SESSIONS_PREVIEW, json!({ "key": key })).await?)
}

/// Apply `patch` fields to a session. `patch` must be a JSON object; its
/// fields are merged next to `key`.
pub async fn patch_session(
    client: &GatewayClient,
    key: &str,
    patch: serde_json::Value,
) -> Result<PatchResult> {
    let mut params = match patch {
        serde_json::Value::Object(map) => map,
        _ => serde_json::Map::new(),
    };
    params.insert("key".into(), json!(key));
    decode(
        client
            .request(methods::SESSIONS_PATCH, serde_json::Value::Object(params))
            .await?,
    )
}

pub async fn reset_session(client: &GatewayClient, key: &str) -> Result<ResetResult> {
    decode(client.request(methods::SESSIONS_RESET, json!({ "key": key })).await?)
}
