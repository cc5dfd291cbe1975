//! Core error types for Seeker

use thiserror::Error;

/// Result type alias for Seeker core operations
pub type SeekerResult<T> = Result<T, SeekerError>;

/// Main error type for the conversation core
///
/// Each variant carries enough context for the interactive caller to report
/// the failure without inspecting internal state. Failures are returned to
/// the immediate caller; the core never retries on its own.
#[derive(Error, Debug, Clone)]
pub enum SeekerError {
    /// Misuse of the conversation log API (fatal to the call, not the session)
    #[error("conversation log invariant violated: {message}")]
    InvariantViolation { message: String },

    /// The produced summary did not compress the replaced span enough
    #[error(
        "summarization ineffective: summary is {summary_tokens} tokens, \
         replaced span was {span_tokens}"
    )]
    SummarizationIneffective {
        summary_tokens: usize,
        span_tokens: usize,
    },

    /// The delegated summarization call failed; the send was aborted and the
    /// log left untouched
    #[error("summarization failed: {message}")]
    SummarizationFailed { message: String },

    /// The conversation cannot fit the input token limit
    #[error("context budget exceeded: {estimated} tokens estimated, {limit} allowed")]
    BudgetExceeded { estimated: usize, limit: usize },

    /// Transport-layer failure during streaming; partial text is available
    /// for inspection but was not committed to the log
    #[error("response stream failed: {message}")]
    StreamFailed { message: String, partial: String },

    /// The in-flight stream was cancelled by the caller
    #[error("response stream cancelled")]
    Cancelled,

    /// `send` was invoked while a previous exchange was still in flight
    #[error("a send is already in progress")]
    SendAlreadyInProgress,

    /// Configuration loading or validation errors
    #[error("configuration error: {message}")]
    Config { message: String },

    /// HTTP transport errors outside an active stream
    #[error("transport error: {message}")]
    Transport {
        message: String,
        status: Option<u16>,
    },

    /// Session persistence errors
    #[error("session error: {message}")]
    Session { message: String },

    /// IO errors
    #[error("io error: {message}")]
    Io {
        message: String,
        path: Option<String>,
    },

    /// JSON serialization/deserialization errors
    #[error("json error: {message}")]
    Json { message: String },
}

impl SeekerError {
    /// Create an invariant violation error
    pub fn invariant(message: impl Into<String>) -> Self {
        Self::InvariantViolation {
            message: message.into(),
        }
    }

    /// Create a summarization failure error
    pub fn summarization_failed(message: impl Into<String>) -> Self {
        Self::SummarizationFailed {
            message: message.into(),
        }
    }

    /// Create a stream failure error with the partial text received so far
    pub fn stream_failed(message: impl Into<String>, partial: impl Into<String>) -> Self {
        Self::StreamFailed {
            message: message.into(),
            partial: partial.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a transport error
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            status: None,
        }
    }

    /// Create a transport error with an HTTP status code
    pub fn transport_status(message: impl Into<String>, status: u16) -> Self {
        Self::Transport {
            message: message.into(),
            status: Some(status),
        }
    }

    /// Create a session persistence error
    pub fn session(message: impl Into<String>) -> Self {
        Self::Session {
            message: message.into(),
        }
    }

    /// Whether this error ended a stream without completing it
    pub fn is_stream_interruption(&self) -> bool {
        matches!(self, Self::StreamFailed { .. } | Self::Cancelled)
    }

    /// Partial streamed text attached to this error, if any
    pub fn partial_text(&self) -> Option<&str> {
        match self {
            Self::StreamFailed { partial, .. } => Some(partial.as_str()),
            _ => None,
        }
    }
}

impl From<std::io::Error> for SeekerError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
            path: None,
        }
    }
}

impl From<serde_json::Error> for SeekerError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json {
            message: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for SeekerError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport {
            message: err.to_string(),
            status: err.status().map(|s| s.as_u16()),
        }
    }
}
