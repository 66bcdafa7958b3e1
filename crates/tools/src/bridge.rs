use std::path::{Path, PathBuf};

use {
    naia_config::ToolsConfig,
    naia_gateway::{CommandOutput, GatewayClient, run_command},
    serde::Serialize,
    serde_json::Value,
    tracing::{debug, info},
};

use crate::{
    Result, definitions, files, guard,
    params::{require_str, str_param},
    sessions_spawn, web,
};

/// Outcome of one tool call. Failures are reported here, never as a Rust
/// error, so the model always gets an answer it can read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolResult {
    pub success: bool,
    pub output: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResult {
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: String::new(),
            error: Some(error.into()),
        }
    }

    /// Map a command's exit status: stdout (or stderr when stdout is empty)
    /// becomes the output, stderr the error on a non-zero exit.
    pub fn from_command(out: CommandOutput) -> Self {
        let success = out.success();
        let error = (!success).then(|| {
            if out.stderr.is_empty() {
                format!("Command exited with code {}", out.exit_code)
            } else {
                out.stderr.clone()
            }
        });
        let output = if out.stdout.is_empty() {
            out.stderr
        } else {
            out.stdout
        };
        Self {
            success,
            output,
            error,
        }
    }
}

/// Executes tool calls against a connected gateway.
#[derive(Debug, Clone)]
pub struct ToolBridge {
    client: GatewayClient,
    workspace_root: Option<PathBuf>,
}

impl ToolBridge {
    pub fn new(client: GatewayClient) -> Self {
        Self {
            client,
            workspace_root: None,
        }
    }

    pub fn from_config(client: GatewayClient, config: &ToolsConfig) -> Self {
        Self {
            client,
            workspace_root: config.workspace_root.clone(),
        }
    }

    /// Confine file tools to `root`.
    #[must_use]
    pub fn with_workspace_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.workspace_root = Some(root.into());
        self
    }

    pub fn client(&self) -> &GatewayClient {
        &self.client
    }

    pub fn workspace_root(&self) -> Option<&Path> {
        self.workspace_root.as_deref()
    }

    /// Run the tool `name` with JSON `args`.
    ///
    /// Connection state is checked before the name, and the name before any
    /// argument, so callers can tell "couldn't try" from "tried and failed".
    pub async fn execute(&self, name: &str, args: &Value) -> ToolResult {
        if !self.client.is_connected() {
            return ToolResult::failed("Gateway not connected");
        }

        let result = match name {
            definitions::EXECUTE_COMMAND => self.execute_command(args).await,
            definitions::READ_FILE => files::read_file(self, args).await,
            definitions::WRITE_FILE => files::write_file(self, args).await,
            definitions::SEARCH_FILES => files::search_files(self, args).await,
            definitions::APPLY_DIFF => files::apply_diff(self, args).await,
            definitions::WEB_SEARCH => web::web_search(self, args).await,
            definitions::BROWSER => web::browser(self, args).await,
            definitions::SESSIONS_SPAWN => sessions_spawn::execute(self, args).await,
            _ => return ToolResult::failed(format!("Unknown tool: {name}")),
        };

        result.unwrap_or_else(|e| {
            debug!(tool = %name, error = %e, "tool call failed");
            ToolResult::failed(e.to_string())
        })
    }

    async fn execute_command(&self, args: &Value) -> Result<ToolResult> {
        let command = require_str(args, "command")?;
        if guard::is_blocked(command) {
            info!(%command, "blocked command");
            return Ok(ToolResult::failed(guard::blocked_message(command)));
        }
        let out = self.run(command, str_param(args, "workdir")).await?;
        Ok(ToolResult::from_command(out))
    }

    pub(crate) async fn run(&self, command: &str, workdir: Option<&str>) -> Result<CommandOutput> {
        debug!(%command, "running remote command");
        Ok(run_command(&self.client, command, workdir).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_output_mapping() {
        let ok = ToolResult::from_command(CommandOutput {
            stdout: "hi\n".into(),
            stderr: String::new(),
            exit_code: 0,
        });
        assert_eq!(ok, ToolResult::ok("hi\n"));

        let failed = ToolResult::from_command(CommandOutput {
            stdout: String::new(),
            stderr: "no such file".into(),
            exit_code: 1,
        });
        assert!(!failed.success);
        assert_eq!(failed.output, "no such file");
        assert_eq!(failed.error.as_deref(), Some("no such file"));

        let silent = ToolResult::from_command(CommandOutput {
            exit_code: 2,
            ..Default::default()
        });
        assert_eq!(silent.error.as_deref(), Some("Command exited with code 2"));
    }

    #[tokio::test]
    async fn disconnected_bridge_short_circuits() {
        let bridge = ToolBridge::new(GatewayClient::new());
        let result = bridge.execute("unknown_tool", &serde_json::json!({})).await;
        assert_eq!(result, ToolResult::failed("Gateway not connected"));
    }
}
