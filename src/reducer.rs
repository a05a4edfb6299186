//! Folds one turn's protocol messages into a [`ConversationTurn`].
//!
//! Messages are applied strictly in arrival order. Replacing branches (assistant
//! text, local command output, compaction summary, result payload) overwrite
//! whatever came before, so the last one to arrive wins.

use std::collections::HashMap;
use std::sync::OnceLock;

use agent_protocol::{
    AgentMessage, AgentMessageKind, ContentBlock, TokenUsage, ToolOutcome, TransportError,
    UserContent,
};
use futures_util::{Stream, StreamExt};
use regex::Regex;
use serde_json::Value;

use crate::commands::CommandCache;
use crate::model::ToolInvocation;
use crate::usage::{Pricing, UsageStats};

/// Response text shown when a fresh remote session starts before any text arrives.
pub const INIT_PLACEHOLDER: &str = "Conversation cleared. Starting fresh session.";

const UNKNOWN_COMPACT_TRIGGER: &str = "unknown";

/// Result of reducing one complete message stream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversationTurn {
    pub response_text: String,
    pub tool_invocations: Vec<ToolInvocation>,
    /// Per-turn usage; absent when the stream carried no usage counters.
    pub usage: Option<UsageStats>,
    pub remote_session_id: Option<String>,
}

/// Incremental reducer state for one turn.
#[derive(Debug)]
pub struct TurnReducer<'a> {
    turn: ConversationTurn,
    index_by_id: HashMap<String, usize>,
    pricing: &'a Pricing,
    commands: &'a CommandCache,
}

impl<'a> TurnReducer<'a> {
    #[must_use]
    pub fn new(pricing: &'a Pricing, commands: &'a CommandCache) -> Self {
        Self {
            turn: ConversationTurn::default(),
            index_by_id: HashMap::new(),
            pricing,
            commands,
        }
    }

    /// Current accumulated turn.
    #[must_use]
    pub fn turn(&self) -> &ConversationTurn {
        &self.turn
    }

    #[must_use]
    pub fn finish(self) -> ConversationTurn {
        self.turn
    }

    /// Applies one message. `on_partial_text` receives the cumulative response
    /// text every time it changes.
    pub fn apply(&mut self, message: AgentMessage, on_partial_text: &mut dyn FnMut(&str)) {
        if let Some(session_id) = message.session_id {
            self.turn.remote_session_id = Some(session_id);
        }

        match message.kind {
            AgentMessageKind::Assistant { content } => {
                self.apply_assistant(content, on_partial_text);
            }
            AgentMessageKind::TextDelta { text } => {
                if !text.is_empty() {
                    self.turn.response_text.push_str(&text);
                    on_partial_text(&self.turn.response_text);
                }
            }
            AgentMessageKind::User { content } => self.apply_user(content, on_partial_text),
            AgentMessageKind::ToolResult(outcome) => self.apply_outcome(outcome, true),
            AgentMessageKind::ToolProgress(outcome) => self.apply_outcome(outcome, false),
            AgentMessageKind::SystemInit { slash_commands, .. } => {
                if let Some(commands) = slash_commands {
                    self.commands.replace(commands);
                }
                if self.turn.response_text.is_empty() {
                    self.replace_text(INIT_PLACEHOLDER.to_string(), on_partial_text);
                }
            }
            AgentMessageKind::CompactBoundary {
                trigger,
                pre_tokens,
            } => {
                let summary = compact_summary(trigger.as_deref(), pre_tokens);
                self.replace_text(summary, on_partial_text);
            }
            AgentMessageKind::Result { result, usage, .. } => {
                if let Some(text) = result.as_ref().and_then(result_text) {
                    self.replace_text(text, on_partial_text);
                }
                if let Some(TokenUsage {
                    input_tokens,
                    output_tokens,
                }) = usage
                {
                    self.turn.usage = Some(UsageStats::from_tokens(
                        input_tokens,
                        output_tokens,
                        self.pricing,
                    ));
                }
            }
            AgentMessageKind::Unknown { kind, .. } => {
                tracing::debug!(kind = %kind, "ignoring unrecognized agent message");
            }
        }
    }

    fn apply_assistant(
        &mut self,
        content: Vec<ContentBlock>,
        on_partial_text: &mut dyn FnMut(&str),
    ) {
        let has_tool_use = content
            .iter()
            .any(|block| matches!(block, ContentBlock::ToolUse { .. }));

        if !has_tool_use {
            let mut text = String::new();
            let mut saw_text = false;
            for block in &content {
                if let ContentBlock::Text { text: chunk } = block {
                    text.push_str(chunk);
                    saw_text = true;
                }
            }
            if saw_text {
                self.replace_text(text, on_partial_text);
            }
            return;
        }

        for block in content {
            if let ContentBlock::ToolUse { id, name, input } = block {
                self.announce(name, input, id);
            }
        }
    }

    fn apply_user(&mut self, content: UserContent, on_partial_text: &mut dyn FnMut(&str)) {
        match content {
            UserContent::Text(text) => {
                if let Some(output) = local_command_stdout(&text) {
                    self.replace_text(output, on_partial_text);
                }
            }
            UserContent::Blocks(blocks) => {
                for block in blocks {
                    match block {
                        ContentBlock::ToolResult {
                            tool_use_id,
                            content,
                            is_error,
                        } => self.apply_outcome(
                            ToolOutcome {
                                tool_use_id,
                                content,
                                is_error,
                            },
                            true,
                        ),
                        ContentBlock::Text { text } => {
                            if let Some(output) = local_command_stdout(&text) {
                                self.replace_text(output, on_partial_text);
                            }
                        }
                        ContentBlock::ToolUse { .. } | ContentBlock::Other { .. } => {}
                    }
                }
            }
        }
    }

    fn announce(&mut self, name: String, input: Value, id: Option<String>) {
        match id {
            Some(id) if self.index_by_id.contains_key(&id) => {
                tracing::debug!(correlation_id = %id, "ignoring repeated tool announcement");
            }
            Some(id) => {
                self.index_by_id
                    .insert(id.clone(), self.turn.tool_invocations.len());
                self.turn
                    .tool_invocations
                    .push(ToolInvocation::announced(name, input, Some(id)));
            }
            None => {
                self.turn
                    .tool_invocations
                    .push(ToolInvocation::announced(name, input, None));
            }
        }
    }

    /// Overwrites the matching invocation. Progress events without content only
    /// update the error flag.
    fn apply_outcome(&mut self, outcome: ToolOutcome, is_final: bool) {
        let Some(id) = outcome.tool_use_id else {
            tracing::debug!("dropping tool output without correlation id");
            return;
        };
        let Some(&index) = self.index_by_id.get(&id) else {
            tracing::debug!(correlation_id = %id, "dropping tool output for unknown invocation");
            return;
        };
        let Some(invocation) = self.turn.tool_invocations.get_mut(index) else {
            return;
        };

        if is_final || !outcome.content.is_null() {
            invocation.output = flatten_tool_content(&outcome.content);
        }
        invocation.is_error = outcome.is_error;
    }

    fn replace_text(&mut self, text: String, on_partial_text: &mut dyn FnMut(&str)) {
        if self.turn.response_text != text {
            self.turn.response_text = text;
            on_partial_text(&self.turn.response_text);
        }
    }
}

/// Reduces a whole stream. The first transport error is returned unchanged and
/// the partial turn is discarded.
pub async fn reduce_stream<S>(
    stream: S,
    pricing: &Pricing,
    commands: &CommandCache,
    mut on_partial_text: impl FnMut(&str),
) -> Result<ConversationTurn, TransportError>
where
    S: Stream<Item = Result<AgentMessage, TransportError>>,
{
    futures_util::pin_mut!(stream);
    let mut reducer = TurnReducer::new(pricing, commands);
    while let Some(message) = stream.next().await {
        reducer.apply(message?, &mut on_partial_text);
    }
    Ok(reducer.finish())
}

/// Plain text of a tool result payload.
///
/// Strings pass through; arrays contribute the `text` of their text-typed
/// blocks; anything else is empty.
#[must_use]
pub fn flatten_tool_content(content: &Value) -> String {
    match content {
        Value::String(text) => text.clone(),
        Value::Array(blocks) => blocks
            .iter()
            .filter(|block| block.get("type").and_then(Value::as_str) == Some("text"))
            .filter_map(|block| block.get("text").and_then(Value::as_str))
            .collect(),
        _ => String::new(),
    }
}

fn result_text(result: &Value) -> Option<String> {
    let text = match result {
        Value::Null => return None,
        Value::String(text) => text.clone(),
        other => other.to_string(),
    };
    (!text.is_empty()).then_some(text)
}

fn compact_summary(trigger: Option<&str>, pre_tokens: u64) -> String {
    let trigger = trigger
        .filter(|trigger| !trigger.trim().is_empty())
        .unwrap_or(UNKNOWN_COMPACT_TRIGGER);
    format!("Conversation compacted ({trigger}). Context before compaction: {pre_tokens} tokens.")
}

fn local_command_stdout(text: &str) -> Option<String> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    let pattern = PATTERN
        .get_or_init(|| Regex::new(r"(?s)<local-command-stdout>(.*?)</local-command-stdout>").ok())
        .as_ref()?;

    pattern
        .captures(text)
        .and_then(|captures| captures.get(1))
        .map(|payload| payload.as_str().trim().to_string())
}
