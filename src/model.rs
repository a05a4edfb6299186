//! Conversation entities persisted by the session store.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::reducer::ConversationTurn;
use crate::usage::UsageStats;

/// Title every session starts with until it is derived or customized.
pub const DEFAULT_SESSION_TITLE: &str = "New Conversation";

const TITLE_MAX_CHARS: usize = 50;
const TITLE_ELLIPSIS: &str = "...";

/// Unix epoch milliseconds.
pub type Timestamp = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// One tool call announced by the agent and, once reported, its outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolInvocation {
    pub tool_name: String,
    #[serde(default = "empty_object")]
    pub input_parameters: Value,
    #[serde(default)]
    pub output: String,
    #[serde(default)]
    pub is_error: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

impl ToolInvocation {
    /// Creates a pending invocation with empty output.
    #[must_use]
    pub fn announced(
        tool_name: impl Into<String>,
        input_parameters: Value,
        correlation_id: Option<String>,
    ) -> Self {
        Self {
            tool_name: tool_name.into(),
            input_parameters,
            output: String::new(),
            is_error: false,
            correlation_id,
        }
    }
}

/// Editor context attached to a user message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ContextItem {
    File {
        path: String,
    },
    #[serde(rename_all = "camelCase")]
    Selection {
        path: String,
        start_line: u32,
        end_line: u32,
        text: String,
    },
}

/// Append-only transcript entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub timestamp: Timestamp,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_results: Vec<ToolInvocation>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attached_context: Vec<ContextItem>,
}

impl ChatMessage {
    #[must_use]
    pub fn user(
        content: impl Into<String>,
        attached_context: Vec<ContextItem>,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            id: new_id(),
            role: Role::User,
            content: content.into(),
            timestamp,
            tool_results: Vec::new(),
            attached_context,
        }
    }

    /// Folds a finished turn into an assistant message.
    #[must_use]
    pub fn assistant(turn: &ConversationTurn, timestamp: Timestamp) -> Self {
        Self {
            id: new_id(),
            role: Role::Assistant,
            content: turn.response_text.clone(),
            timestamp,
            tool_results: turn.tool_invocations.clone(),
            attached_context: Vec::new(),
        }
    }

    #[must_use]
    pub fn system(content: impl Into<String>, timestamp: Timestamp) -> Self {
        Self {
            id: new_id(),
            role: Role::System,
            content: content.into(),
            timestamp,
            tool_results: Vec::new(),
            attached_context: Vec::new(),
        }
    }
}

/// A conversation and its accumulated usage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSession {
    pub id: String,
    /// Identifier assigned by the external agent on the first turn.
    #[serde(default)]
    pub remote_session_id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    #[serde(default)]
    pub usage: UsageStats,
}

impl ChatSession {
    /// Creates an empty session with zero usage.
    #[must_use]
    pub fn new(id: impl Into<String>, now: Timestamp) -> Self {
        Self {
            id: id.into(),
            remote_session_id: None,
            title: DEFAULT_SESSION_TITLE.to_string(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
            usage: UsageStats::zero(),
        }
    }

    #[must_use]
    pub fn has_default_title(&self) -> bool {
        self.title == DEFAULT_SESSION_TITLE
    }

    /// Title derived from the first user message, if there is one.
    #[must_use]
    pub fn derive_title(&self) -> Option<String> {
        self.messages
            .iter()
            .find(|message| message.role == Role::User)
            .map(|message| truncate_title(&message.content))
    }
}

/// Generates a fresh unique identifier.
#[must_use]
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

fn truncate_title(content: &str) -> String {
    if content.chars().count() <= TITLE_MAX_CHARS {
        return content.to_string();
    }

    let mut title: String = content.chars().take(TITLE_MAX_CHARS).collect();
    title.push_str(TITLE_ELLIPSIS);
    title
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}
