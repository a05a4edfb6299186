use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One protocol message emitted by the agent, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentMessage {
    /// Remote session identifier carried by the message, if any.
    pub session_id: Option<String>,
    pub kind: AgentMessageKind,
}

/// Recognized message kinds. Each variant carries only the fields it needs.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentMessageKind {
    /// Complete assistant message: text and/or tool-use blocks.
    Assistant { content: Vec<ContentBlock> },
    /// Incremental assistant text.
    TextDelta { text: String },
    /// User-role echo: local command output or tool-result blocks.
    User { content: UserContent },
    ToolResult(ToolOutcome),
    ToolProgress(ToolOutcome),
    SystemInit {
        slash_commands: Option<Vec<String>>,
        model: Option<String>,
        cwd: Option<String>,
    },
    CompactBoundary {
        trigger: Option<String>,
        pre_tokens: u64,
    },
    /// Terminal result of the turn.
    Result {
        subtype: Option<String>,
        result: Option<Value>,
        usage: Option<TokenUsage>,
        is_error: bool,
    },
    /// Unrecognized kind retained for passthrough; reducers ignore it.
    Unknown { kind: String, payload: Value },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: Option<String>,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: Option<String>,
        content: Value,
        is_error: bool,
    },
    Other {
        kind: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum UserContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

/// Tool output payload addressed by correlation id.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutcome {
    pub tool_use_id: Option<String>,
    /// Raw content: a string, an array of content blocks, or `Null` when absent.
    pub content: Value,
    pub is_error: bool,
}

/// Raw token counters reported by a result message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenUsage {
    /// Reads counters from a usage object; absent or malformed counters are zero.
    #[must_use]
    pub fn from_value(value: &Value) -> Self {
        Self {
            input_tokens: u64_field(value, "input_tokens"),
            output_tokens: u64_field(value, "output_tokens"),
        }
    }
}

impl AgentMessage {
    #[must_use]
    pub fn new(kind: AgentMessageKind) -> Self {
        Self {
            session_id: None,
            kind,
        }
    }

    #[must_use]
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Parses one JSON document. Only syntactically invalid JSON fails.
    pub fn from_json_str(line: &str) -> Result<Self, serde_json::Error> {
        let value = serde_json::from_str::<Value>(line)?;
        Ok(Self::from_value(value))
    }

    /// Maps a decoded JSON value onto a message kind.
    ///
    /// Never fails: unknown kinds become [`AgentMessageKind::Unknown`] and missing
    /// fields fall back to empty/zero values.
    #[must_use]
    pub fn from_value(value: Value) -> Self {
        let session_id = string_field(&value, "session_id");
        Self {
            session_id,
            kind: map_kind(value),
        }
    }
}

fn map_kind(value: Value) -> AgentMessageKind {
    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    match kind.as_str() {
        "assistant" => AgentMessageKind::Assistant {
            content: match message_content(&value) {
                Some(Value::String(text)) => vec![ContentBlock::Text { text: text.clone() }],
                Some(Value::Array(blocks)) => blocks.iter().map(parse_block).collect(),
                _ => Vec::new(),
            },
        },
        "user" => AgentMessageKind::User {
            content: match message_content(&value) {
                Some(Value::Array(blocks)) => {
                    UserContent::Blocks(blocks.iter().map(parse_block).collect())
                }
                Some(Value::String(text)) => UserContent::Text(text.clone()),
                _ => UserContent::Text(String::new()),
            },
        },
        "stream_event" => match text_delta(&value) {
            Some(text) => AgentMessageKind::TextDelta { text },
            None => unknown(kind, value),
        },
        "tool_result" => AgentMessageKind::ToolResult(tool_outcome(&value)),
        "tool_progress" => AgentMessageKind::ToolProgress(tool_outcome(&value)),
        "system" => match value.get("subtype").and_then(Value::as_str) {
            Some("init") => AgentMessageKind::SystemInit {
                slash_commands: value
                    .get("slash_commands")
                    .and_then(Value::as_array)
                    .map(|commands| {
                        commands
                            .iter()
                            .filter_map(Value::as_str)
                            .map(ToString::to_string)
                            .collect()
                    }),
                model: string_field(&value, "model"),
                cwd: string_field(&value, "cwd"),
            },
            Some("compact_boundary") => {
                let metadata = value.get("compact_metadata").unwrap_or(&Value::Null);
                AgentMessageKind::CompactBoundary {
                    trigger: string_field(metadata, "trigger"),
                    pre_tokens: u64_field(metadata, "pre_tokens"),
                }
            }
            _ => unknown(kind, value),
        },
        "result" => AgentMessageKind::Result {
            subtype: string_field(&value, "subtype"),
            result: value.get("result").filter(|value| !value.is_null()).cloned(),
            usage: value
                .get("usage")
                .filter(|usage| usage.is_object())
                .map(TokenUsage::from_value),
            is_error: bool_field(&value, "is_error"),
        },
        _ => unknown(kind, value),
    }
}

fn unknown(kind: String, payload: Value) -> AgentMessageKind {
    AgentMessageKind::Unknown { kind, payload }
}

fn message_content(value: &Value) -> Option<&Value> {
    value.get("message").and_then(|message| message.get("content"))
}

fn text_delta(value: &Value) -> Option<String> {
    let event = value.get("event")?;
    if event.get("type").and_then(Value::as_str) != Some("content_block_delta") {
        return None;
    }

    let delta = event.get("delta")?;
    if delta.get("type").and_then(Value::as_str) != Some("text_delta") {
        return None;
    }

    Some(
        delta
            .get("text")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
    )
}

fn tool_outcome(value: &Value) -> ToolOutcome {
    ToolOutcome {
        tool_use_id: string_field(value, "tool_use_id"),
        content: value.get("content").cloned().unwrap_or(Value::Null),
        is_error: bool_field(value, "is_error"),
    }
}

fn parse_block(value: &Value) -> ContentBlock {
    match value.get("type").and_then(Value::as_str).unwrap_or_default() {
        "text" => ContentBlock::Text {
            text: string_field(value, "text").unwrap_or_default(),
        },
        "tool_use" => ContentBlock::ToolUse {
            id: string_field(value, "id"),
            name: string_field(value, "name").unwrap_or_default(),
            input: value
                .get("input")
                .filter(|input| input.is_object())
                .cloned()
                .unwrap_or_else(|| Value::Object(Map::new())),
        },
        "tool_result" => ContentBlock::ToolResult {
            tool_use_id: string_field(value, "tool_use_id"),
            content: value.get("content").cloned().unwrap_or(Value::Null),
            is_error: bool_field(value, "is_error"),
        },
        other => ContentBlock::Other {
            kind: other.to_string(),
        },
    }
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(ToString::to_string)
}

fn u64_field(value: &Value, key: &str) -> u64 {
    value.get(key).and_then(Value::as_u64).unwrap_or(0)
}

fn bool_field(value: &Value, key: &str) -> bool {
    value.get(key).and_then(Value::as_bool).unwrap_or(false)
}
