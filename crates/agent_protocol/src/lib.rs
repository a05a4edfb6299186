//! Transport-neutral contract between the chat core and an external coding agent.
//!
//! This crate defines the message kinds an agent emits while answering one
//! prompt, the request used to start that answer, and the [`AgentTransport`]
//! seam that yields the ordered message stream. It contains no process
//! spawning, authentication, or conversation state.

mod message;

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use futures_util::stream::BoxStream;
use thiserror::Error;

pub use message::{
    AgentMessage, AgentMessageKind, ContentBlock, TokenUsage, ToolOutcome, UserContent,
};

/// Ordered, asynchronous sequence of protocol messages for one turn.
///
/// End-of-stream is the success signal; an `Err` item ends the turn.
pub type MessageStream = BoxStream<'static, Result<AgentMessage, TransportError>>;

/// Error returned while constructing/configuring a transport before any turn starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportInitError {
    message: String,
}

impl TransportInitError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for TransportInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for TransportInitError {}

impl From<String> for TransportInitError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for TransportInitError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// Failure raised by a transport before or during message iteration.
///
/// The `Display` output is surfaced to the user verbatim.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to start agent executable {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error while {operation}: {source}")]
    Io {
        operation: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("{}", exited_message(.code, .stderr))]
    Exited { code: Option<i32>, stderr: String },

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("{0}")]
    Other(String),
}

impl TransportError {
    #[must_use]
    pub fn io(operation: &'static str, source: std::io::Error) -> Self {
        Self::Io { operation, source }
    }

    #[must_use]
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }
}

fn exited_message(code: &Option<i32>, stderr: &str) -> String {
    let status = code
        .map(|code| format!("exit code {code}"))
        .unwrap_or_else(|| "no exit code".to_string());
    let stderr = stderr.trim();
    if stderr.is_empty() {
        format!("agent process failed ({status})")
    } else {
        format!("agent process failed ({status}): {stderr}")
    }
}

/// Input required to start one agent turn.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QueryRequest {
    pub prompt: String,
    pub working_directory: PathBuf,
    pub allowed_tools: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub model: Option<String>,
    pub executable_path: Option<PathBuf>,
    /// Remote session to continue; `None` starts a fresh agent conversation.
    pub resume_session_id: Option<String>,
}

impl QueryRequest {
    #[must_use]
    pub fn new(prompt: impl Into<String>, working_directory: impl Into<PathBuf>) -> Self {
        Self {
            prompt: prompt.into(),
            working_directory: working_directory.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_allowed_tools(mut self, tools: impl IntoIterator<Item = String>) -> Self {
        self.allowed_tools = tools.into_iter().collect();
        self
    }

    #[must_use]
    pub fn with_env(mut self, env: impl IntoIterator<Item = (String, String)>) -> Self {
        self.env.extend(env);
        self
    }

    #[must_use]
    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }

    #[must_use]
    pub fn with_executable_path(mut self, path: Option<PathBuf>) -> Self {
        self.executable_path = path;
        self
    }

    #[must_use]
    pub fn with_resume_session_id(mut self, session_id: Option<String>) -> Self {
        self.resume_session_id = session_id;
        self
    }
}

/// Immutable metadata describing a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportProfile {
    pub transport_id: String,
    pub model_id: Option<String>,
}

/// Seam to the external agent.
pub trait AgentTransport: Send + Sync + 'static {
    /// Returns transport identity metadata.
    fn profile(&self) -> TransportProfile;

    /// Starts one turn and returns its message stream.
    ///
    /// Implementations should defer expensive work (process spawn, network) until
    /// the stream is first polled; failures then surface as the first `Err` item.
    fn query(&self, request: QueryRequest) -> Result<MessageStream, TransportError>;
}
