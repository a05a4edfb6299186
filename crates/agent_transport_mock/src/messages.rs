//! Constructors for protocol messages, shared by scripts and tests.

use agent_protocol::{
    AgentMessage, AgentMessageKind, ContentBlock, TokenUsage, ToolOutcome, UserContent,
};
use serde_json::Value;

#[must_use]
pub fn text_delta(text: impl Into<String>) -> AgentMessage {
    AgentMessage::new(AgentMessageKind::TextDelta { text: text.into() })
}

#[must_use]
pub fn assistant_text(text: impl Into<String>) -> AgentMessage {
    AgentMessage::new(AgentMessageKind::Assistant {
        content: vec![ContentBlock::Text { text: text.into() }],
    })
}

#[must_use]
pub fn tool_use(id: impl Into<String>, name: impl Into<String>, input: Value) -> AgentMessage {
    AgentMessage::new(AgentMessageKind::Assistant {
        content: vec![ContentBlock::ToolUse {
            id: Some(id.into()),
            name: name.into(),
            input,
        }],
    })
}

#[must_use]
pub fn tool_result(id: impl Into<String>, content: Value, is_error: bool) -> AgentMessage {
    AgentMessage::new(AgentMessageKind::ToolResult(ToolOutcome {
        tool_use_id: Some(id.into()),
        content,
        is_error,
    }))
}

#[must_use]
pub fn tool_progress(id: impl Into<String>, content: Value) -> AgentMessage {
    AgentMessage::new(AgentMessageKind::ToolProgress(ToolOutcome {
        tool_use_id: Some(id.into()),
        content,
        is_error: false,
    }))
}

/// User-role message carrying tool-result blocks.
#[must_use]
pub fn user_tool_result(id: impl Into<String>, content: Value, is_error: bool) -> AgentMessage {
    AgentMessage::new(AgentMessageKind::User {
        content: UserContent::Blocks(vec![ContentBlock::ToolResult {
            tool_use_id: Some(id.into()),
            content,
            is_error,
        }]),
    })
}

#[must_use]
pub fn user_text(text: impl Into<String>) -> AgentMessage {
    AgentMessage::new(AgentMessageKind::User {
        content: UserContent::Text(text.into()),
    })
}

#[must_use]
pub fn system_init(commands: &[&str]) -> AgentMessage {
    AgentMessage::new(AgentMessageKind::SystemInit {
        slash_commands: Some(commands.iter().map(|name| name.to_string()).collect()),
        model: None,
        cwd: None,
    })
}

#[must_use]
pub fn compact_boundary(trigger: &str, pre_tokens: u64) -> AgentMessage {
    AgentMessage::new(AgentMessageKind::CompactBoundary {
        trigger: Some(trigger.to_string()),
        pre_tokens,
    })
}

#[must_use]
pub fn result(text: &str, input_tokens: u64, output_tokens: u64) -> AgentMessage {
    AgentMessage::new(AgentMessageKind::Result {
        subtype: Some("success".to_string()),
        result: Some(Value::String(text.to_string())),
        usage: Some(TokenUsage {
            input_tokens,
            output_tokens,
        }),
        is_error: false,
    })
}
