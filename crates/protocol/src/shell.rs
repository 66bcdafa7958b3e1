//! Output units written to the host shell, one JSON object per line.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ShellChunk {
    Text {
        request_id: String,
        text: String,
    },
    Finish {
        request_id: String,
    },
    Error {
        request_id: String,
        message: String,
    },
    ToolResult {
        request_id: String,
        tool_name: String,
        success: bool,
        output: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    GatewayApprovalRequest {
        #[serde(skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        tool_call_id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        tool_name: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        args: Option<serde_json::Value>,
    },
    LogEntry {
        #[serde(skip_serializing_if = "Option::is_none")]
        level: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        timestamp: Option<String>,
    },
    DiscordMessage {
        request_id: String,
        from: String,
        content: String,
        timestamp: String,
    },
}

impl ShellChunk {
    pub fn text(request_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::Text {
            request_id: request_id.into(),
            text: text.into(),
        }
    }

    pub fn finish(request_id: impl Into<String>) -> Self {
        Self::Finish {
            request_id: request_id.into(),
        }
    }

    pub fn error(request_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Error {
            request_id: request_id.into(),
            message: message.into(),
        }
    }

    /// `finish` and `error` close a request's output stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finish { .. } | Self::Error { .. })
    }
}
