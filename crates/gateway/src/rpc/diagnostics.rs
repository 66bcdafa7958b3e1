use {
    naia_protocol::methods,
    serde::{Deserialize, Serialize},
    serde_json::json,
};

use crate::{client::GatewayClient, error::Result, rpc::decode};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthStatus {
    pub status: String,
    pub uptime: f64,
    pub version: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UsageStatus {
    pub total_requests: u64,
    pub total_tokens: u64,
    pub active_providers: Vec<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderCost {
    pub provider: String,
    pub cost: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UsageCost {
    pub total_cost: f64,
    pub breakdown: Vec<ProviderCost>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GatewayStatus {
    pub status: String,
    pub gateway: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connected_clients: Option<u64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// One page of the gateway log file. Pass `cursor` back to continue.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LogsTail {
    pub file: String,
    pub cursor: u64,
    pub size: u64,
    pub lines: Vec<String>,
}

pub async fn health(client: &GatewayClient) -> Result<HealthStatus> {
    decode(client.request(methods::HEALTH, json!({})).await?)
}

pub async fn usage_status(client: &GatewayClient) -> Result<UsageStatus> {
    decode(client.request(methods::USAGE_STATUS, json!({})).await?)
}

pub async fn usage_cost(client: &GatewayClient) -> Result<UsageCost> {
    decode(client.request(methods::USAGE_COST, json!({})).await?)
}

pub async fn gateway_status(client: &GatewayClient) -> Result<GatewayStatus> {
    decode(client.request(methods::STATUS, json!({})).await?)
}

pub async fn poll_logs_tail(client: &GatewayClient, cursor: Option<u64>) -> Result<LogsTail> {
    let params = match cursor {
        Some(cursor) => json!({ "cursor": cursor }),
        None => json!({}),
    };
    decode(client.request(methods::LOGS_TAIL, params).await?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use {
        super::*,
        crate::testing::{MockGateway, MockReply},
    };

    #[tokio::test]
    async fn logs_tail_sends_cursor_only_when_given() {
        let mock = MockGateway::builder()
            .methods(&["logs.tail"])
            .handler(|_, params| {
                let cursor = params.get("cursor").and_then(|c| c.as_u64()).unwrap_or(0);
                MockReply::ok(json!({
                    "file": "/var/log/gw.log",
                    "cursor": cursor + 2,
                    "size": 100,
                    "lines": ["a", "b"],
                }))
            })
            .start()
            .await;
        let client = mock.connected_client().await;

        let first = poll_logs_tail(&client, None).await.unwrap();
        assert_eq!(first.cursor, 2);
        let next = poll_logs_tail(&client, Some(first.cursor)).await.unwrap();
        assert_eq!(next.cursor, 4);
        assert_eq!(next.lines, vec!["a", "b"]);

        let calls = mock.calls_to("logs.tail");
        assert!(calls[0].get("cursor").is_none());
        assert_eq!(calls[1]["cursor"], 2);
    }

    #[tokio::test]
    async fn status_calls_decode_partial_payloads() {
        let mock = MockGateway::builder()
            .methods(&["health", "usage.status", "usage.cost", "status"])
            .handler(|method, _| match method {
                "health" => MockReply::ok(json!({"status": "ok", "uptime": 12.5, "version": "1.2"})),
                "usage.status" => MockReply::ok(json!({"totalRequests": 3, "totalTokens": 900})),
                "usage.cost" => MockReply::ok(json!({
                    "totalCost": 0.42,
                    "breakdown": [{"provider": "acme", "cost": 0.42}]
                })),
                _ => MockReply::ok(json!({"status": "running", "gateway": "local", "connectedClients": 2})),
            })
            .start()
            .await;
        let client = mock.connected_client().await;

        assert_eq!(health(&client).await.unwrap().version, "1.2");
        let usage = usage_status(&client).await.unwrap();
        assert_eq!(usage.total_tokens, 900);
        assert!(usage.active_providers.is_empty());
        assert_eq!(usage_cost(&client).await.unwrap().breakdown[0].provider, "acme");
        assert_eq!(gateway_status(&client).await.unwrap().connected_clients, Some(2));
    }
}
