//! Event-to-output state machine for one streaming chat run.
//!
//! The gateway reports a run on two channels that overlap: `agent` events
//! carry assistant text deltas and lifecycle phases, `chat` events carry
//! cumulative snapshots and the final state. Whichever channel produces text
//! first owns the run's text; the other one is muted for the rest of the run.
//! At the terminal event the muted channel's text is compared with what was
//! emitted and any unseen tail is flushed before finishing.

use {
    naia_protocol::{EventFrame, events, transcript},
    tracing::debug,
};

/// What the delegate should emit in response to an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Text(String),
    Finish,
    Failed(String),
}

impl Step {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finish | Self::Failed(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Channel {
    Agent,
    Chat,
}

#[derive(Debug)]
pub struct RunTracker {
    run_id: String,
    owner: Option<Channel>,
    /// Everything emitted so far, whichever channel produced it.
    emitted: String,
    /// Every assistant delta seen, including muted ones.
    agent_text: String,
    done: bool,
}

impl RunTracker {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            owner: None,
            emitted: String::new(),
            agent_text: String::new(),
            done: false,
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Feed one pushed event. Events tagged with another run, and anything
    /// after a terminal step, produce nothing.
    pub fn handle(&mut self, event: &EventFrame) -> Vec<Step> {
        if self.done {
            return Vec::new();
        }
        if let Some(run_id) = event.run_id()
            && run_id != self.run_id
        {
            return Vec::new();
        }

        let steps = match event.event.as_str() {
            events::AGENT => self.on_agent(event),
            events::CHAT => self.on_chat(event),
            _ => Vec::new(),
        };
        if steps.iter().any(Step::is_terminal) {
            self.done = true;
        }
        steps
    }

    fn on_agent(&mut self, event: &EventFrame) -> Vec<Step> {
        let data = event.field("data");
        let data_str = |key: &str| data.and_then(|d| d.get(key)).and_then(|v| v.as_str());

        match event.str_field("stream") {
            Some("assistant") => {
                let text = data_str("delta").or_else(|| data_str("text")).unwrap_or("");
                if text.is_empty() {
                    return Vec::new();
                }
                self.agent_text.push_str(text);
                if !self.claim(Channel::Agent) {
                    return Vec::new();
                }
                self.emitted.push_str(text);
                vec![Step::Text(text.to_string())]
            },
            Some("lifecycle") => match data_str("phase") {
                Some("end") => {
                    let mut steps = Vec::new();
                    if self.owner == Some(Channel::Chat) {
                        let agent_text = self.agent_text.clone();
                        steps.extend(self.catch_up(&agent_text).map(Step::Text));
                    }
                    steps.push(Step::Finish);
                    steps
                },
                Some("error") => vec![Step::Failed(
                    data_str("error").unwrap_or("Agent run failed").to_string(),
                )],
                _ => Vec::new(),
            },
            _ => Vec::new(),
        }
    }

    fn on_chat(&mut self, event: &EventFrame) -> Vec<Step> {
        let mut steps = Vec::new();
        match event.str_field("state") {
            Some("delta") => steps.extend(self.snapshot_tail(event).map(Step::Text)),
            Some("final") => {
                if let Some(text) = snapshot_text(event) {
                    steps.extend(self.catch_up(&text).map(Step::Text));
                }
                steps.push(Step::Finish);
            },
            Some(state @ ("error" | "aborted")) => {
                let fallback = if state == "aborted" {
                    "Chat aborted"
                } else {
                    "Chat failed"
                };
                steps.push(Step::Failed(
                    event
                        .str_field("errorMessage")
                        .unwrap_or(fallback)
                        .to_string(),
                ));
            },
            _ => {},
        }
        steps
    }

    /// Unseen suffix of a cumulative chat snapshot, if the chat channel owns
    /// (or can still claim) the run.
    fn snapshot_tail(&mut self, event: &EventFrame) -> Option<String> {
        let text = snapshot_text(event)?;
        if !self.claim(Channel::Chat) {
            return None;
        }
        self.catch_up(&text)
    }

    /// Emit the part of `text` beyond what was already emitted.
    fn catch_up(&mut self, text: &str) -> Option<String> {
        let Some(tail) = text.strip_prefix(self.emitted.as_str()) else {
            debug!(run_id = %self.run_id, "text diverged from emitted output, skipping");
            return None;
        };
        if tail.is_empty() {
            return None;
        }
        let tail = tail.to_string();
        self.emitted = text.to_string();
        Some(tail)
    }

    fn claim(&mut self, channel: Channel) -> bool {
        *self.owner.get_or_insert(channel) == channel
    }
}

fn snapshot_text(event: &EventFrame) -> Option<String> {
    event
        .field("message")
        .and_then(|m| m.get("content"))
        .and_then(transcript::content_text)
        .filter(|text| !text.is_empty())
}
