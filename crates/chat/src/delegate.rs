use std::time::Duration;

use {
    naia_config::ChatConfig,
    naia_gateway::{CollectingSink, Error as GatewayError, GatewayClient, OutputSink},
    naia_protocol::{CHAT_TIMEOUT_MS, DEFAULT_SESSION_KEY, methods, shell::ShellChunk, transcript},
    serde_json::json,
    tokio_util::sync::CancellationToken,
    tracing::{debug, info, warn},
};

use crate::{
    error::{ChatError, Result},
    tracker::{RunTracker, Step},
};

/// Extra time granted to `agent.wait` over the run timeout it is asked to
/// honour server-side.
const WAIT_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct ChatRequest {
    /// Echoed on every output unit.
    pub request_id: String,
    pub message: String,
    pub session_key: Option<String>,
}

impl ChatRequest {
    pub fn new(request_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            message: message.into(),
            session_key: None,
        }
    }

    #[must_use]
    pub fn with_session_key(mut self, session_key: impl Into<String>) -> Self {
        self.session_key = Some(session_key.into());
        self
    }
}

/// Runs chat messages through the gateway, choosing the streaming or batch
/// path from the advertised methods.
#[derive(Debug, Clone)]
pub struct ChatDelegate {
    client: GatewayClient,
    timeout: Duration,
    session_key: String,
}

impl ChatDelegate {
    pub fn new(client: GatewayClient) -> Self {
        Self {
            client,
            timeout: Duration::from_millis(CHAT_TIMEOUT_MS),
            session_key: DEFAULT_SESSION_KEY.into(),
        }
    }

    pub fn from_config(client: GatewayClient, config: &ChatConfig) -> Self {
        Self::new(client)
            .with_timeout(Duration::from_secs(config.timeout_secs))
            .with_session_key(config.session_key.clone())
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Session used when a request doesn't name one.
    #[must_use]
    pub fn with_session_key(mut self, session_key: impl Into<String>) -> Self {
        self.session_key = session_key.into();
        self
    }

    /// Run one chat message, writing its output units to `sink`.
    ///
    /// Every outcome except cancellation ends with exactly one terminal unit
    /// on the sink, and the returned error carries the same message as the
    /// terminal `error` unit.
    pub async fn send(
        &self,
        request: &ChatRequest,
        sink: &dyn OutputSink,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let result = self.run(request, sink, cancel).await;
        match &result {
            Ok(()) => sink.write_line(ShellChunk::finish(&request.request_id)),
            Err(ChatError::Cancelled) => {
                info!(request_id = %request.request_id, "chat cancelled");
            },
            Err(e) => {
                warn!(request_id = %request.request_id, error = %e, "chat failed");
                sink.write_line(ShellChunk::error(&request.request_id, e.to_string()));
            },
        }
        result
    }

    /// Run a chat to completion and return the concatenated text.
    pub async fn collect(&self, request: &ChatRequest, cancel: &CancellationToken) -> Result<String> {
        let sink = CollectingSink::new();
        self.send(request, &sink, cancel).await?;
        Ok(sink.text())
    }

    async fn run(
        &self,
        request: &ChatRequest,
        sink: &dyn OutputSink,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if !self.client.is_connected() {
            return Err(GatewayError::NotConnected.into());
        }
        let session_key = request.session_key.as_deref().unwrap_or(&self.session_key);

        if self.client.has_method(methods::CHAT_SEND) {
            self.stream(request, session_key, sink, cancel).await
        } else if self.client.has_method(methods::AGENT) && self.client.has_method(methods::AGENT_WAIT) {
            self.batch(request, session_key, sink, cancel).await
        } else {
            Err(ChatError::Unsupported {
                message: "Gateway does not support chat.send or agent methods".into(),
            })
        }
    }

    /// `chat.send`, then follow pushed events until the run ends.
    async fn stream(
        &self,
        request: &ChatRequest,
        session_key: &str,
        sink: &dyn OutputSink,
        cancel: &CancellationToken,
    ) -> Result<()> {
        // Subscribed before sending so events racing the response are queued.
        let mut events = self.client.subscribe();
        let closed = self.client.closed_token();

        let params = json!({
            "message": request.message,
            "sessionKey": session_key,
            "idempotencyKey": uuid::Uuid::new_v4().to_string(),
        });
        let payload = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(ChatError::Cancelled),
            result = self.client.request(methods::CHAT_SEND, params) => result?,
        };
        let run_id = run_id(&payload)?;
        debug!(%run_id, %session_key, "chat run started");

        let mut tracker = RunTracker::new(run_id);
        let deadline = tokio::time::sleep(self.timeout);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(ChatError::Cancelled),
                event = events.recv() => {
                    let Some(event) = event else {
                        return Err(GatewayError::ConnectionClosed.into());
                    };
                    for step in tracker.handle(&event) {
                        match step {
                            Step::Text(text) => {
                                sink.write_line(ShellChunk::text(&request.request_id, text));
                            },
                            Step::Finish => return Ok(()),
                            Step::Failed(message) => return Err(ChatError::failed(message)),
                        }
                    }
                },
                () = &mut deadline => return Err(ChatError::Timeout),
                () = closed.cancelled() => return Err(GatewayError::ConnectionClosed.into()),
            }
        }
    }

    /// `agent` → `agent.wait` → `sessions.transcript`.
    async fn batch(
        &self,
        request: &ChatRequest,
        session_key: &str,
        sink: &dyn OutputSink,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let params = json!({
            "message": request.message,
            "sessionKey": session_key,
            "idempotencyKey": uuid::Uuid::new_v4().to_string(),
        });
        let payload = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(ChatError::Cancelled),
            result = self.client.request(methods::AGENT, params) => result?,
        };
        let run_id = run_id(&payload)?;
        debug!(%run_id, %session_key, "agent run submitted");

        let timeout_ms = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX);
        let wait = self.client.request_with_timeout(
            methods::AGENT_WAIT,
            json!({ "runId": run_id, "timeoutMs": timeout_ms }),
            self.timeout.saturating_add(WAIT_GRACE),
        );
        tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(ChatError::Cancelled),
            result = wait => match result {
                Ok(_) => {},
                Err(GatewayError::Timeout { .. }) => return Err(ChatError::Timeout),
                Err(e) => return Err(e.into()),
            },
        }

        match self
            .client
            .request(methods::SESSIONS_TRANSCRIPT, json!({ "key": session_key }))
            .await
        {
            Ok(transcript) => {
                if let Some(text) = transcript::last_assistant_text(&transcript) {
                    sink.write_line(ShellChunk::text(&request.request_id, text));
                }
            },
            Err(e) => warn!(%run_id, error = %e, "transcript fetch failed, finishing without text"),
        }
        Ok(())
    }
}

fn run_id(payload: &serde_json::Value) -> Result<String> {
    payload
        .get("runId")
        .and_then(|r| r.as_str())
        .filter(|r| !r.is_empty())
        .map(str::to_string)
        .ok_or(ChatError::MissingRunId)
}
