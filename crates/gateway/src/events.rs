//! Forwards selected gateway push events to the shell.

use std::sync::Arc;

use naia_protocol::{EventFrame, events, shell::ShellChunk};

use crate::{
    client::{GatewayClient, ListenerId},
    sink::OutputSink,
};

/// Map a push event to a shell unit. Operational events (`tick`, `health`,
/// `agent`, `chat`, ...) map to nothing.
pub fn shell_chunk_for(event: &EventFrame) -> Option<ShellChunk> {
    let owned = |key: &str| event.str_field(key).map(str::to_string);

    match event.event.as_str() {
        events::EXEC_APPROVAL_REQUESTED => Some(ShellChunk::GatewayApprovalRequest {
            request_id: owned("requestId"),
            tool_call_id: owned("toolCallId"),
            tool_name: owned("toolName"),
            args: event.field("args").cloned(),
        }),
        events::LOGS_ENTRY => Some(ShellChunk::LogEntry {
            level: owned("level"),
            message: owned("message"),
            timestamp: owned("timestamp"),
        }),
        events::CHANNEL_MESSAGE | events::CHANNELS_MESSAGE => Some(ShellChunk::DiscordMessage {
            request_id: owned("requestId").unwrap_or_else(|| "gateway".into()),
            from: owned("from")
                .or_else(|| owned("author"))
                .or_else(|| owned("channel"))
                .unwrap_or_else(|| "Gateway".into()),
            content: owned("content")
                .or_else(|| owned("message"))
                .unwrap_or_default(),
            timestamp: owned("timestamp").unwrap_or_else(|| chrono::Utc::now().to_rfc3339()),
        }),
        _ => None,
    }
}

/// Register a listener that writes mapped events to `sink`.
pub fn forward_gateway_events(client: &GatewayClient, sink: Arc<dyn OutputSink>) -> ListenerId {
    client.on_event(move |event| {
        if let Some(chunk) = shell_chunk_for(event) {
            sink.write_line(chunk);
        }
    })
}
