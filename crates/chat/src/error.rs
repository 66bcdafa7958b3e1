#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error(transparent)]
    Gateway(#[from] naia_gateway::Error),

    #[error("Gateway chat timeout")]
    Timeout,

    #[error("Chat cancelled")]
    Cancelled,

    #[error("{message}")]
    Unsupported { message: String },

    #[error("Gateway did not return a runId")]
    MissingRunId,

    /// The gateway reported the run itself as failed or aborted.
    #[error("{message}")]
    Failed { message: String },
}

impl ChatError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ChatError>;
