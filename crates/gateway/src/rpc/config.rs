use {
    naia_protocol::methods,
    serde::{Deserialize, Serialize},
    serde_json::json,
};

use crate::{client::GatewayClient, error::Result, rpc::decode};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelInfo {
    pub id: String,
    pub name: String,
    pub provider: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct ModelList {
    models: Vec<ModelInfo>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigUpdate {
    pub updated: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigPatchResult {
    pub patched: bool,
}

pub async fn get_config(client: &GatewayClient) -> Result<serde_json::Value> {
    client.request(methods::CONFIG_GET, json!({})).await
}

pub async fn set_config(client: &GatewayClient, patch: serde_json::Value) -> Result<ConfigUpdate> {
    decode(client.request(methods::CONFIG_SET, patch).await?)
}

pub async fn get_config_schema(client: &GatewayClient) -> Result<serde_json::Value> {
    client.request(methods::CONFIG_SCHEMA, json!({})).await
}

pub async fn list_models(client: &GatewayClient) -> Result<Vec<ModelInfo>> {
    let list: ModelList = decode(client.request(methods::MODELS_LIST, json!({})).await?)?;
    Ok(list.models)
}

/// Send a config patch guarded by the current snapshot hash.
///
/// `baseHash` is only attached when the snapshot exists and carries a
/// non-empty hash, so a first write on a fresh gateway is not rejected.
pub async fn patch_config(
    client: &GatewayClient,
    patch: &serde_json::Value,
) -> Result<ConfigPatchResult> {
    let snapshot = client.request(methods::CONFIG_GET, json!({})).await?;
    let mut params = json!({ "raw": serde_json::to_string(patch)? });

    let exists = snapshot
        .get("exists")
        .and_then(serde_json::Value::as_bool)
        .unwrap_or(false);
    if exists
        && let Some(hash) = snapshot.get("hash").and_then(|h| h.as_str())
        && !hash.is_empty()
    {
        params["baseHash"] = json!(hash);
    }

    decode(client.request(methods::CONFIG_PATCH, params).await?)
}
