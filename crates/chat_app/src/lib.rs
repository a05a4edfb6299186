//! Conversation orchestration and the `agent-chat` REPL.
//!
//! ## Transport selection
//!
//! The transport is chosen explicitly at startup:
//!
//! - `AGENT_CHAT_TRANSPORT=cli` (default) runs the agent executable per turn
//! - `AGENT_CHAT_TRANSPORT=mock` replays scripts, or echoes prompts back
//!
//! `AGENT_CHAT_MODEL` overrides the configured model.
//!
//! ## Settings file
//!
//! Set `AGENT_CHAT_SETTINGS_PATH` to a UTF-8 JSON file with this shape:
//!
//! ```json
//! {
//!   "transport": "cli",
//!   "model": "sonnet",
//!   "executable_path": "/usr/local/bin/claude",
//!   "allowed_tools": ["Read", "Grep", "Glob"],
//!   "env": { "HTTPS_PROXY": "http://127.0.0.1:8080" },
//!   "max_session_history": 50,
//!   "pricing": { "input_per_million": 3.0, "output_per_million": 15.0 },
//!   "data_dir": "/home/me/.agent-chat",
//!   "working_directory": "/home/me/notes"
//! }
//! ```
//!
//! Contract notes:
//! - Every field is optional.
//! - `max_session_history` must be > 0; prices must be non-negative.
//! - Unknown JSON fields are rejected.
//!
//! Sessions persist to `<working_directory>/.agent-chat/data.json` unless
//! `data_dir` is set. Logs go to stderr, filtered by `AGENT_CHAT_LOG`.

pub mod commands;
pub mod controller;
pub mod logging;
pub mod settings;
pub mod sync;
pub mod transports;

pub use controller::{
    ChatController, ChatError, ChatView, RejectReason, RenderHook, SendOutcome, TurnOptions,
    TurnState,
};
pub use settings::{Settings, SettingsError};
