//! Web tools, served by a gateway skill or its browser proxy.

use {
    naia_gateway::request_first,
    naia_protocol::methods,
    serde_json::{Value, json},
};

use crate::{
    Result,
    bridge::{ToolBridge, ToolResult},
    params::{require_str, str_param},
};

const SEARCH_ENDPOINT: &str = "https://html.duckduckgo.com/html/?q=";

fn render(payload: &Value) -> String {
    match payload {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub async fn web_search(bridge: &ToolBridge, args: &Value) -> Result<ToolResult> {
    let query = require_str(args, "query")?;
    let url = format!("{SEARCH_ENDPOINT}{}", urlencoding::encode(query));

    let candidates = vec![
        (
            methods::SKILLS_INVOKE,
            json!({ "skill": "web-search", "args": { "query": query } }),
        ),
        (
            methods::BROWSER_REQUEST,
            json!({ "method": "GET", "path": "/fetch", "body": { "url": url } }),
        ),
    ];
    Ok(match request_first(bridge.client(), candidates).await {
        Ok((_, payload)) => ToolResult::ok(render(&payload)),
        Err(e) => ToolResult::failed(format!("Web search failed: {e}")),
    })
}

pub async fn browser(bridge: &ToolBridge, args: &Value) -> Result<ToolResult> {
    let Some(url) = str_param(args, "url") else {
        return Ok(ToolResult::failed("url is required"));
    };

    let candidates = vec![
        (
            methods::SKILLS_INVOKE,
            json!({ "skill": "browser", "args": { "url": url } }),
        ),
        (
            methods::BROWSER_REQUEST,
            json!({ "method": "POST", "path": "/navigate", "body": { "url": url } }),
        ),
    ];
    let (_, payload) = request_first(bridge.client(), candidates).await?;
    Ok(ToolResult::ok(render(&payload)))
}
