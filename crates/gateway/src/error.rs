use naia_protocol::{ErrorShape, error_codes};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Not connected to gateway")]
    NotConnected,

    #[error(transparent)]
    Tungstenite(Box<tokio_tungstenite::tungstenite::Error>),

    /// The gateway refused the `connect` request.
    #[error("{message}")]
    Handshake {
        code: Option<String>,
        message: String,
    },

    #[error("Handshake timed out")]
    HandshakeTimeout,

    #[error("Connection closed during handshake")]
    ClosedDuringHandshake,

    /// The gateway answered a request with `ok: false`.
    #[error("{message}")]
    Rpc { code: String, message: String },

    #[error("Request {method} timed out")]
    Timeout { method: String },

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("No paired node available")]
    NoTarget,

    /// None of the methods able to serve an operation are advertised.
    #[error("{message}")]
    Unsupported { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("{message}")]
    Message { message: String },
}

impl Error {
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported {
            message: message.into(),
        }
    }

    /// Remote error code, when the failure came from the gateway.
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Rpc { code, .. } => Some(code),
            Self::Handshake { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    /// True when the gateway no longer recognizes a method it advertised.
    ///
    /// Only this class of failure allows falling back to an alternative
    /// method; every other error is a genuine failure of the call.
    pub fn is_unknown_method(&self) -> bool {
        match self {
            Self::Rpc { code, message } => {
                code == error_codes::UNKNOWN_METHOD
                    || message.to_ascii_lowercase().starts_with("unknown method")
            },
            _ => false,
        }
    }
}

impl From<ErrorShape> for Error {
    fn from(shape: ErrorShape) -> Self {
        Self::Rpc {
            code: shape.code,
            message: shape.message,
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for Error {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Tungstenite(Box::new(err))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
