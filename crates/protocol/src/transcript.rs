//! Helpers for reading `sessions.transcript` / `chat.history` payloads.

/// Flatten message content into plain text.
///
/// Content is either a string or an array of blocks; only `text` blocks
/// contribute.
pub fn content_text(content: &serde_json::Value) -> Option<String> {
    match content {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Array(blocks) => {
            let text: String = blocks
                .iter()
                .filter(|b| b.get("type").and_then(|t| t.as_str()).unwrap_or("text") == "text")
                .filter_map(|b| b.get("text").and_then(|t| t.as_str()))
                .collect();
            Some(text)
        },
        serde_json::Value::Object(map) => map
            .get("text")
            .and_then(|t| t.as_str())
            .map(str::to_string),
        _ => None,
    }
}

/// Messages of a transcript payload: `{messages: [...]}` or a bare array.
pub fn messages(payload: &serde_json::Value) -> &[serde_json::Value] {
    payload
        .get("messages")
        .and_then(|m| m.as_array())
        .or_else(|| payload.as_array())
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Text of the last assistant message, if any and non-empty.
pub fn last_assistant_text(payload: &serde_json::Value) -> Option<String> {
    messages(payload)
        .iter()
        .rev()
        .find(|m| m.get("role").and_then(|r| r.as_str()) == Some("assistant"))
        .and_then(|m| m.get("content"))
        .and_then(content_text)
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use {super::*, serde_json::json};

    #[test]
    fn picks_last_assistant_message() {
        let payload = json!({"messages": [
            {"role": "user", "content": "hi"},
            {"role": "assistant", "content": "first"},
            {"role": "user", "content": "again"},
            {"role": "assistant", "content": [{"type": "text", "text": "sec"}, {"type": "text", "text": "ond"}]},
        ]});
        assert_eq!(last_assistant_text(&payload).as_deref(), Some("second"));
    }

    #[test]
    fn accepts_bare_array() {
        let payload = json!([{"role": "assistant", "content": "bare"}]);
        assert_eq!(last_assistant_text(&payload).as_deref(), Some("bare"));
    }

    #[test]
    fn empty_or_missing_assistant_is_none() {
        assert!(last_assistant_text(&json!({"messages": []})).is_none());
        assert!(last_assistant_text(&json!({"messages": [{"role": "assistant", "content": ""}]})).is_none());
        assert!(last_assistant_text(&json!(null)).is_none());
    }

    #[test]
    fn non_text_blocks_are_skipped() {
        let content = json!([{"type": "tool_use", "text": "ignored"}, {"type": "text", "text": "kept"}]);
        assert_eq!(content_text(&content).as_deref(), Some("kept"));
    }
}
