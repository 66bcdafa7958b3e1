//! Capability-aware method selection.
//!
//! The advertised method list decides which RPC serves a logical operation.
//! A call that fails because the gateway no longer recognizes the method
//! falls through to the next candidate; any other failure is final.

use {
    naia_protocol::methods,
    serde::Serialize,
    serde_json::json,
    tracing::{debug, warn},
};

use crate::{
    client::GatewayClient,
    error::{Error, Result},
};

/// Try `(method, params)` candidates in order and return the first answer
/// together with the method that produced it.
pub async fn request_first(
    client: &GatewayClient,
    candidates: Vec<(&str, serde_json::Value)>,
) -> Result<(String, serde_json::Value)> {
    if !client.is_connected() {
        return Err(Error::NotConnected);
    }
    let names: Vec<String> = candidates.iter().map(|(m, _)| (*m).to_string()).collect();

    for (method, params) in candidates {
        if !client.has_method(method) {
            continue;
        }
        match client.request(method, params).await {
            Ok(payload) => return Ok((method.to_string(), payload)),
            Err(e) if e.is_unknown_method() => {
                warn!(%method, error = %e, "advertised method rejected as unknown, trying next");
            },
            Err(e) => return Err(e),
        }
    }

    Err(Error::unsupported(format!(
        "No supported RPC available ({})",
        names.join("/")
    )))
}

/// Outcome of a remote shell command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i64,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Parse an `exec.bash` / `system.run` result, unwrapping the
    /// `result` or `payload` envelope `node.invoke` adds.
    pub fn from_payload(payload: &serde_json::Value) -> Self {
        let inner = payload
            .get("result")
            .or_else(|| payload.get("payload"))
            .filter(|v| v.is_object())
            .unwrap_or(payload);

        let stdout = inner
            .get("stdout")
            .or_else(|| inner.get("output"))
            .map(|v| match v.as_str() {
                Some(s) => s.to_string(),
                None => v.to_string(),
            })
            .unwrap_or_else(|| match inner {
                serde_json::Value::String(s) => s.clone(),
                serde_json::Value::Null | serde_json::Value::Object(_) => String::new(),
                other => other.to_string(),
            });
        let stderr = inner
            .get("stderr")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let exit_code = inner
            .get("exitCode")
            .or_else(|| inner.get("exit_code"))
            .and_then(serde_json::Value::as_i64)
            .unwrap_or(0);

        Self {
            stdout,
            stderr,
            exit_code,
        }
    }
}

/// Run a shell command on whatever execution surface the gateway offers:
/// `exec.bash` first, then `node.invoke` on the first paired node.
pub async fn run_command(
    client: &GatewayClient,
    command: &str,
    workdir: Option<&str>,
) -> Result<CommandOutput> {
    if !client.is_connected() {
        return Err(Error::NotConnected);
    }

    if client.has_method(methods::EXEC_BASH) {
        let mut params = json!({ "command": command });
        if let Some(dir) = workdir {
            params["workdir"] = json!(dir);
        }
        match client.request(methods::EXEC_BASH, params).await {
            Ok(payload) => return Ok(CommandOutput::from_payload(&payload)),
            Err(e) if e.is_unknown_method() => {
                warn!(error = %e, "exec.bash advertised but unknown, falling back to node.invoke");
            },
            Err(e) => return Err(e),
        }
    }

    if client.has_method(methods::NODE_INVOKE) {
        let node_id = resolve_node_id(client).await.ok_or(Error::NoTarget)?;
        debug!(%node_id, "running command via node.invoke");
        let mut run_params = json!({ "command": ["bash", "-lc", command] });
        if let Some(dir) = workdir {
            run_params["cwd"] = json!(dir);
        }
        let payload = client
            .request(
                methods::NODE_INVOKE,
                json!({
                    "nodeId": node_id,
                    "idempotencyKey": uuid::Uuid::new_v4().to_string(),
                    "command": "system.run",
                    "params": run_params,
                }),
            )
            .await?;
        return Ok(CommandOutput::from_payload(&payload));
    }

    Err(Error::unsupported(
        "No command execution RPC available (exec.bash/node.invoke)",
    ))
}

/// First paired node from `node.list`, if the gateway lists nodes at all.
pub async fn resolve_node_id(client: &GatewayClient) -> Option<String> {
    if !client.has_method(methods::NODE_LIST) {
        return None;
    }
    let payload = match client.request(methods::NODE_LIST, json!({})).await {
        Ok(payload) => payload,
        Err(e) => {
            warn!(error = %e, "node.list failed");
            return None;
        },
    };
    let first = payload.get("nodes")?.as_array()?.first()?;
    first
        .get("id")
        .or_else(|| first.get("nodeId"))
        .and_then(|v| v.as_str())
        .map(str::to_string)
}
