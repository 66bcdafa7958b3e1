//! File tools built on remote shell commands.

use serde_json::Value;

use crate::{
    Error, Result,
    bridge::{ToolBridge, ToolResult},
    params::{bool_param, raw_str_param, require_str, str_param},
    shell::{quote, validate_path},
};

const SEARCH_LIMIT: usize = 20;

/// The `path` argument exactly as sent; surrounding spaces are part of the name.
fn checked_path<'a>(bridge: &ToolBridge, args: &'a Value) -> Result<&'a str> {
    let path = raw_str_param(args, "path")
        .filter(|path| !path.is_empty())
        .ok_or_else(|| Error::message("missing required parameter: path"))?;
    validate_path(path, bridge.workspace_root())?;
    Ok(path)
}

fn write_command(path: &str, content: &str) -> String {
    let path = quote(path);
    format!(
        "mkdir -p \"$(dirname {path})\" && printf '%s' {} > {path}",
        quote(content)
    )
}

pub async fn read_file(bridge: &ToolBridge, args: &Value) -> Result<ToolResult> {
    let path = checked_path(bridge, args)?;
    let out = bridge.run(&format!("cat {}", quote(path)), None).await?;
    Ok(ToolResult::from_command(out))
}

pub async fn write_file(bridge: &ToolBridge, args: &Value) -> Result<ToolResult> {
    let path = checked_path(bridge, args)?;
    let content = raw_str_param(args, "content")
        .ok_or_else(|| Error::message("missing required parameter: content"))?;

    let out = bridge.run(&write_command(path, content), None).await?;
    if !out.success() {
        return Ok(ToolResult::from_command(out));
    }
    Ok(ToolResult::ok(format!("File written: {path}")))
}

pub async fn search_files(bridge: &ToolBridge, args: &Value) -> Result<ToolResult> {
    let pattern = require_str(args, "pattern")?;
    let root = match str_param(args, "path") {
        Some(path) => {
            validate_path(path, bridge.workspace_root())?;
            quote(path)
        },
        // Left unquoted so the remote shell expands it.
        None => "\"$HOME\"".to_string(),
    };
    let pattern = quote(pattern);

    let command = if bool_param(args, "content", false) {
        format!("grep -rl -- {pattern} {root} 2>/dev/null | head -{SEARCH_LIMIT}")
    } else {
        format!("find {root} -name {pattern} 2>/dev/null | head -{SEARCH_LIMIT}")
    };
    let out = bridge.run(&command, None).await?;

    let output = if out.stdout.trim().is_empty() {
        "No matches found".to_string()
    } else {
        out.stdout
    };
    Ok(ToolResult::ok(output))
}

/// Replace the first occurrence of `search` in a remote file.
pub async fn apply_diff(bridge: &ToolBridge, args: &Value) -> Result<ToolResult> {
    let path = checked_path(bridge, args)?;
    let search = raw_str_param(args, "search").unwrap_or_default();
    if search.is_empty() {
        return Err(Error::message("search text must not be empty"));
    }
    let replace = raw_str_param(args, "replace").unwrap_or_default();

    let read = bridge.run(&format!("cat {}", quote(path)), None).await?;
    if !read.success() {
        return Ok(ToolResult::from_command(read));
    }
    if !read.stdout.contains(search) {
        return Ok(ToolResult::failed(format!("Search text not found in {path}")));
    }

    let updated = read.stdout.replacen(search, replace, 1);
    let write = bridge.run(&write_command(path, &updated), None).await?;
    if !write.success() {
        return Ok(ToolResult::from_command(write));
    }
    Ok(ToolResult::ok(format!("Applied diff to {path}")))
}
