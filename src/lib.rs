//! Conversation core for a chat host backed by an external coding agent.
//!
//! Invariant: one turn's protocol messages are folded strictly in arrival order;
//! a transport failure discards the partial turn.
//!
//! # Public API Overview
//! - Fold an agent's message stream into a [`ConversationTurn`] with
//!   [`reduce_stream`] or the step-wise [`TurnReducer`].
//! - Account token usage and cost with [`UsageStats`] and [`Pricing`].
//! - Model persisted conversations with [`ChatSession`] and [`ChatMessage`].
//! - Attach host editor state to prompts via [`EditorContextSource`].
//! - Cache the agent's advertised slash commands in [`CommandCache`].

pub mod commands;
pub mod context;
pub mod model;
pub mod reducer;
pub mod usage;

/// Slash command cache.
pub use crate::commands::CommandCache;

/// Editor context snapshot, sources, and prompt formatting.
pub use crate::context::{
    append_editor_context, context_items, format_editor_context, EditorContextSource,
    EditorSelection, EditorSnapshot, NoEditorContext, StaticEditorContext,
};

/// Persisted conversation entities.
pub use crate::model::{
    new_id, ChatMessage, ChatSession, ContextItem, Role, Timestamp, ToolInvocation,
    DEFAULT_SESSION_TITLE,
};

/// Stream reduction.
pub use crate::reducer::{
    flatten_tool_content, reduce_stream, ConversationTurn, TurnReducer, INIT_PLACEHOLDER,
};

/// Usage accounting.
pub use crate::usage::{
    compute_cost, merge_usage, Pricing, UsageStats, DEFAULT_INPUT_PRICE_PER_MILLION,
    DEFAULT_OUTPUT_PRICE_PER_MILLION,
};
