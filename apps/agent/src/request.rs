use serde::Deserialize;

/// One line read from stdin.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum HostRequest {
    ChatRequest {
        request_id: String,
        message: String,
        #[serde(default)]
        session_key: Option<String>,
    },
    ToolRequest {
        request_id: String,
        tool_name: String,
        #[serde(default)]
        args: serde_json::Value,
    },
    CancelStream {
        request_id: String,
    },
}
