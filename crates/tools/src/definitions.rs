use serde::Serialize;

/// A tool as advertised to the model for function calling.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDefinition {
    pub name: &'static str,
    pub description: &'static str,
    /// JSON schema of the arguments object.
    pub parameters: serde_json::Value,
}

pub const EXECUTE_COMMAND: &str = "execute_command";
pub const READ_FILE: &str = "read_file";
pub const WRITE_FILE: &str = "write_file";
pub const SEARCH_FILES: &str = "search_files";
pub const WEB_SEARCH: &str = "web_search";
pub const APPLY_DIFF: &str = "apply_diff";
pub const BROWSER: &str = "browser";
pub const SESSIONS_SPAWN: &str = "sessions_spawn";

/// Every tool the bridge can execute.
pub fn gateway_tools() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: EXECUTE_COMMAND,
            description: "Execute a shell command on the system. Use for installing packages, \
                          running scripts, git operations, etc.",
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "command": { "type": "string", "description": "The shell command to execute" },
                    "workdir": { "type": "string", "description": "Working directory (optional, defaults to home)" }
                },
                "required": ["command"]
            }),
        },
        ToolDefinition {
            name: READ_FILE,
            description: "Read the contents of a file at the given path.",
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "path": { "type": "string", "description": "Absolute or relative file path" }
                },
                "required": ["path"]
            }),
        },
        ToolDefinition {
            name: WRITE_FILE,
            description: "Write content to a file, creating it and its parent directories if needed.",
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "path": { "type": "string", "description": "File path to write to" },
                    "content": { "type": "string", "description": "Content to write" }
                },
                "required": ["path", "content"]
            }),
        },
        ToolDefinition {
            name: SEARCH_FILES,
            description: "Search for files by name pattern, or search file contents with a regex pattern.",
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "pattern": { "type": "string", "description": "Glob pattern for filenames or regex for content search" },
                    "path": { "type": "string", "description": "Directory to search in (defaults to home)" },
                    "content": { "type": "boolean", "description": "If true, search file contents instead of names" }
                },
                "required": ["pattern"]
            }),
        },
        ToolDefinition {
            name: WEB_SEARCH,
            description: "Search the web for information.",
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "query": { "type": "string", "description": "Search query" }
                },
                "required": ["query"]
            }),
        },
        ToolDefinition {
            name: APPLY_DIFF,
            description: "Edit a file by replacing the first occurrence of a search string.",
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "path": { "type": "string", "description": "File to edit" },
                    "search": { "type": "string", "description": "Exact text to find" },
                    "replace": { "type": "string", "description": "Replacement text" }
                },
                "required": ["path", "search", "replace"]
            }),
        },
        ToolDefinition {
            name: BROWSER,
            description: "Open a web page and return its content.",
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "url": { "type": "string", "description": "URL to open" }
                },
                "required": ["url"]
            }),
        },
        ToolDefinition {
            name: SESSIONS_SPAWN,
            description: "Delegate a task to a sub-agent in its own session and return its final answer.",
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "task": { "type": "string", "description": "What the sub-agent should do" },
                    "label": { "type": "string", "description": "Optional session label" }
                },
                "required": ["task"]
            }),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defines_eight_tools_with_schemas() {
        let tools = gateway_tools();
        let names: Vec<&str> = tools.iter().map(|t| t.name).collect();
        assert_eq!(names, vec![
            "execute_command",
            "read_file",
            "write_file",
            "search_files",
            "web_search",
            "apply_diff",
            "browser",
            "sessions_spawn",
        ]);
        for tool in &tools {
            assert!(!tool.description.is_empty());
            assert_eq!(tool.parameters["type"], "object");
            assert!(tool.parameters["required"].as_array().is_some_and(|r| !r.is_empty()));
        }
    }
}
