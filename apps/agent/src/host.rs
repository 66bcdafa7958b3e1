//! Reads requests line by line and runs each one on its own task.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use {
    naia_chat::{ChatDelegate, ChatRequest},
    naia_gateway::OutputSink,
    naia_protocol::shell::ShellChunk,
    naia_tools::ToolBridge,
    tokio::{
        io::{AsyncBufRead, AsyncBufReadExt},
        task::JoinSet,
    },
    tokio_util::sync::CancellationToken,
    tracing::{debug, warn},
};

use crate::request::HostRequest;

pub struct Host {
    chat: ChatDelegate,
    tools: ToolBridge,
    sink: Arc<dyn OutputSink>,
    /// Cancellation handles of chat runs still in flight, by request id.
    active: Arc<Mutex<HashMap<String, CancellationToken>>>,
}

impl Host {
    pub fn new(chat: ChatDelegate, tools: ToolBridge, sink: Arc<dyn OutputSink>) -> Self {
        Self {
            chat,
            tools,
            sink,
            active: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Serve requests until `reader` hits EOF, then wait for in-flight work.
    pub async fn run<R: AsyncBufRead + Unpin>(&self, reader: R) -> std::io::Result<()> {
        let mut tasks = JoinSet::new();
        let mut lines = reader.lines();
        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            self.dispatch(line, &mut tasks);
            reap_finished(&mut tasks);
        }
        debug!(pending = tasks.len(), "input closed, draining requests");
        while tasks.join_next().await.is_some() {}
        Ok(())
    }

    pub fn dispatch(&self, line: &str, tasks: &mut JoinSet<()>) {
        let request: HostRequest = match serde_json::from_str(line) {
            Ok(request) => request,
            Err(e) => {
                warn!(error = %e, "ignoring malformed request line");
                return;
            },
        };

        match request {
            HostRequest::ChatRequest {
                request_id,
                message,
                session_key,
            } => {
                let token = CancellationToken::new();
                self.active_lock().insert(request_id.clone(), token.clone());

                let mut request = ChatRequest::new(request_id.clone(), message);
                request.session_key = session_key;
                let chat = self.chat.clone();
                let sink = Arc::clone(&self.sink);
                let active = Arc::clone(&self.active);
                tasks.spawn(async move {
                    // The delegate already reported any failure on the sink.
                    let _ = chat.send(&request, &*sink, &token).await;
                    active
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .remove(&request_id);
                });
            },
            HostRequest::ToolRequest {
                request_id,
                tool_name,
                args,
            } => {
                let tools = self.tools.clone();
                let sink = Arc::clone(&self.sink);
                tasks.spawn(async move {
                    let result = tools.execute(&tool_name, &args).await;
                    sink.write_line(ShellChunk::ToolResult {
                        request_id,
                        tool_name,
                        success: result.success,
                        output: result.output,
                        error: result.error,
                    });
                });
            },
            HostRequest::CancelStream { request_id } => {
                match self.active_lock().remove(&request_id) {
                    Some(token) => token.cancel(),
                    None => debug!(%request_id, "cancel for unknown or finished request"),
                }
            },
        }
    }

    fn active_lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, CancellationToken>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Drop finished tasks so a long-lived host does not accumulate them.
fn reap_finished(tasks: &mut JoinSet<()>) {
    while tasks.try_join_next().is_some() {}
}
