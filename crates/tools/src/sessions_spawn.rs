//! Sub-agent delegation: spawn a session, wait for its run, read its answer.

use std::time::Duration;

use {
    naia_gateway::Error as GatewayError,
    naia_protocol::{CHAT_TIMEOUT_MS, methods, transcript},
    serde_json::{Value, json},
    tracing::info,
};

use crate::{
    Error, Result,
    bridge::{ToolBridge, ToolResult},
    params::{require_str, str_param},
};

const REQUIRED: &[&str] = &[
    methods::SESSIONS_SPAWN,
    methods::AGENT_WAIT,
    methods::SESSIONS_TRANSCRIPT,
];

const WAIT_GRACE: Duration = Duration::from_secs(5);

pub async fn execute(bridge: &ToolBridge, args: &Value) -> Result<ToolResult> {
    let client = bridge.client();
    if !REQUIRED.iter().all(|m| client.has_method(m)) {
        return Ok(ToolResult::failed(
            "sessions_spawn is not available on this gateway",
        ));
    }

    let task = require_str(args, "task")?;
    let mut params = json!({ "task": task });
    if let Some(label) = str_param(args, "label") {
        params["label"] = json!(label);
    }

    let spawned = client.request(methods::SESSIONS_SPAWN, params).await?;
    let field = |key: &str| spawned.get(key).and_then(|v| v.as_str()).filter(|v| !v.is_empty());
    let run_id = field("runId").ok_or_else(|| Error::message("sessions.spawn did not return a runId"))?;
    let session_key = field("sessionKey")
        .ok_or_else(|| Error::message("sessions.spawn did not return a sessionKey"))?;
    info!(%run_id, %session_key, "sub-agent spawned");

    let timeout = Duration::from_millis(CHAT_TIMEOUT_MS);
    match client
        .request_with_timeout(
            methods::AGENT_WAIT,
            json!({ "runId": run_id, "timeoutMs": CHAT_TIMEOUT_MS }),
            timeout + WAIT_GRACE,
        )
        .await
    {
        Ok(_) => {},
        Err(GatewayError::Timeout { .. }) => {
            return Ok(ToolResult::failed("Sub-agent run timed out"));
        },
        Err(e) => return Err(e.into()),
    }

    let history = client
        .request(methods::SESSIONS_TRANSCRIPT, json!({ "key": session_key }))
        .await?;
    let output = transcript::last_assistant_text(&history)
        .unwrap_or_else(|| "Sub-agent finished without a reply".to_string());
    Ok(ToolResult::ok(output))
}
