//! Conversation orchestration.
//!
//! [`ChatController`] drives one turn at a time: it persists the user message
//! optimistically, starts the transport, folds the stream through the reducer
//! into the view's streaming slot, and stores the finished assistant message
//! together with the turn's usage.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use agent_chat::{
    append_editor_context, context_items, reduce_stream, ChatMessage, ChatSession, CommandCache,
    EditorContextSource, NoEditorContext, Pricing,
};
use agent_protocol::{AgentTransport, QueryRequest, TransportError, TransportProfile};
use session_store::{SessionBackend, SessionStore, SessionStoreError};
use thiserror::Error;

use crate::sync::lock_unpoisoned;

/// Per-turn request parameters that do not change between prompts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TurnOptions {
    pub working_directory: PathBuf,
    pub allowed_tools: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub model: Option<String>,
    pub executable_path: Option<PathBuf>,
}

impl TurnOptions {
    #[must_use]
    pub fn new(working_directory: impl Into<PathBuf>) -> Self {
        Self {
            working_directory: working_directory.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn request(&self, prompt: String, resume_session_id: Option<String>) -> QueryRequest {
        QueryRequest::new(prompt, self.working_directory.clone())
            .with_allowed_tools(self.allowed_tools.iter().cloned())
            .with_env(self.env.clone())
            .with_model(self.model.clone())
            .with_executable_path(self.executable_path.clone())
            .with_resume_session_id(resume_session_id)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TurnState {
    #[default]
    Idle,
    Sending,
}

/// What a UI needs to render the conversation chrome.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatView {
    pub state: TurnState,
    pub active_session_id: Option<String>,
    /// Cumulative response text of the in-flight turn.
    pub streaming_content: String,
    /// Message of the last failed turn, shown verbatim.
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    BlankMessage,
    AlreadySending,
    NoActiveSession,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SendOutcome {
    /// The turn finished; carries the appended assistant message.
    Completed(ChatMessage),
    /// Nothing was sent.
    Rejected(RejectReason),
}

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("{0}")]
    Transport(#[from] TransportError),

    #[error("{0}")]
    Store(#[from] SessionStoreError),

    #[error("unknown session: {id}")]
    UnknownSession { id: String },
}

pub type RenderHook = Box<dyn Fn(&ChatView) + Send + Sync>;

pub struct ChatController<B: SessionBackend> {
    store: Mutex<SessionStore<B>>,
    transport: Arc<dyn AgentTransport>,
    editor: Arc<dyn EditorContextSource>,
    options: TurnOptions,
    pricing: Pricing,
    commands: CommandCache,
    view: Mutex<ChatView>,
    render: Option<RenderHook>,
}

impl<B: SessionBackend> ChatController<B> {
    #[must_use]
    pub fn new(
        store: SessionStore<B>,
        transport: Arc<dyn AgentTransport>,
        options: TurnOptions,
    ) -> Self {
        Self {
            store: Mutex::new(store),
            transport,
            editor: Arc::new(NoEditorContext),
            options,
            pricing: Pricing::default(),
            commands: CommandCache::new(),
            view: Mutex::new(ChatView::default()),
            render: None,
        }
    }

    #[must_use]
    pub fn with_editor_context(mut self, editor: Arc<dyn EditorContextSource>) -> Self {
        self.editor = editor;
        self
    }

    #[must_use]
    pub fn with_pricing(mut self, pricing: Pricing) -> Self {
        self.pricing = pricing;
        self
    }

    /// Shares `commands` with the reducer so init messages refresh it.
    #[must_use]
    pub fn with_command_cache(mut self, commands: CommandCache) -> Self {
        self.commands = commands;
        self
    }

    #[must_use]
    pub fn with_render_hook(mut self, render: impl Fn(&ChatView) + Send + Sync + 'static) -> Self {
        self.render = Some(Box::new(render));
        self
    }

    #[must_use]
    pub fn view(&self) -> ChatView {
        lock_unpoisoned(&self.view).clone()
    }

    #[must_use]
    pub fn commands(&self) -> &CommandCache {
        &self.commands
    }

    #[must_use]
    pub fn pricing(&self) -> Pricing {
        self.pricing
    }

    #[must_use]
    pub fn transport_profile(&self) -> TransportProfile {
        self.transport.profile()
    }

    pub fn clear_error(&self) {
        self.update_view(|view| view.error = None);
    }

    /// Sends one prompt to the active session.
    ///
    /// Blank prompts, a turn already in flight, or a missing active session
    /// reject without side effects. A failed turn keeps the user message, stores
    /// the error text in the view and returns the error.
    pub async fn send_message(&self, text: &str) -> Result<SendOutcome, ChatError> {
        let prompt = text.trim();
        if prompt.is_empty() {
            return Ok(SendOutcome::Rejected(RejectReason::BlankMessage));
        }

        let session_id = {
            let mut view = lock_unpoisoned(&self.view);
            if view.state == TurnState::Sending {
                return Ok(SendOutcome::Rejected(RejectReason::AlreadySending));
            }
            let Some(session_id) = view.active_session_id.clone() else {
                return Ok(SendOutcome::Rejected(RejectReason::NoActiveSession));
            };
            view.state = TurnState::Sending;
            view.streaming_content.clear();
            view.error = None;
            session_id
        };
        self.emit_render();
        let _sending = SendingGuard { controller: self };

        match self.run_turn(&session_id, prompt).await {
            Ok(message) => Ok(SendOutcome::Completed(message)),
            Err(error) => {
                tracing::warn!(session_id = %session_id, %error, "turn failed");
                lock_unpoisoned(&self.view).error = Some(error.to_string());
                Err(error)
            }
        }
    }

    async fn run_turn(&self, session_id: &str, prompt: &str) -> Result<ChatMessage, ChatError> {
        let snapshot = self.editor.snapshot();

        let resume_session_id = {
            let mut store = lock_unpoisoned(&self.store);
            let mut session = existing_session(&mut *store, session_id)?;
            let now = store.now();
            session
                .messages
                .push(ChatMessage::user(prompt, context_items(&snapshot), now));
            store.save(session)?.remote_session_id
        };

        let request = self
            .options
            .request(append_editor_context(prompt, &snapshot), resume_session_id);
        tracing::info!(
            session_id,
            resume = request.resume_session_id.is_some(),
            "starting turn"
        );

        let stream = self.transport.query(request)?;
        let turn = reduce_stream(stream, &self.pricing, &self.commands, |text: &str| {
            self.update_view(|view| {
                view.streaming_content.clear();
                view.streaming_content.push_str(text);
            });
        })
        .await?;

        let mut store = lock_unpoisoned(&self.store);
        let mut session = existing_session(&mut *store, session_id)?;
        let message = ChatMessage::assistant(&turn, store.now());
        session.messages.push(message.clone());
        if let Some(remote_session_id) = turn.remote_session_id {
            session.remote_session_id = Some(remote_session_id);
        }
        store.save(session)?;
        if let Some(usage) = turn.usage {
            store.merge_usage_into(session_id, &usage)?;
        }

        tracing::info!(
            session_id,
            tools = message.tool_results.len(),
            "turn finished"
        );
        Ok(message)
    }

    /// Creates an empty session and makes it active.
    pub fn new_session(&self) -> Result<ChatSession, ChatError> {
        let session = lock_unpoisoned(&self.store).create()?;
        self.update_view(|view| view.active_session_id = Some(session.id.clone()));
        Ok(session)
    }

    pub fn select_session(&self, id: &str) -> Result<ChatSession, ChatError> {
        let session = existing_session(&mut *lock_unpoisoned(&self.store), id)?;
        self.update_view(|view| view.active_session_id = Some(session.id.clone()));
        Ok(session)
    }

    /// Makes the most recently updated session active, creating one if none exist.
    pub fn open_latest_session(&self) -> Result<ChatSession, ChatError> {
        let latest = lock_unpoisoned(&self.store).list_all()?.into_iter().next();
        match latest {
            Some(session) => {
                self.update_view(|view| view.active_session_id = Some(session.id.clone()));
                Ok(session)
            }
            None => self.new_session(),
        }
    }

    /// Deletes a session; deleting the active one leaves no session selected.
    pub fn delete_session(&self, id: &str) -> Result<bool, ChatError> {
        let deleted = lock_unpoisoned(&self.store).delete(id)?;
        if deleted && self.view().active_session_id.as_deref() == Some(id) {
            self.update_view(|view| view.active_session_id = None);
        }
        Ok(deleted)
    }

    pub fn rename_session(&self, id: &str, title: &str) -> Result<ChatSession, ChatError> {
        match lock_unpoisoned(&self.store).rename(id, title) {
            Ok(session) => Ok(session),
            Err(SessionStoreError::UnknownSession { id }) => Err(ChatError::UnknownSession { id }),
            Err(error) => Err(error.into()),
        }
    }

    /// Every stored session, most recently updated first.
    pub fn sessions(&self) -> Result<Vec<ChatSession>, ChatError> {
        Ok(lock_unpoisoned(&self.store).list_all()?)
    }

    pub fn active_session(&self) -> Result<Option<ChatSession>, ChatError> {
        let Some(id) = self.view().active_session_id else {
            return Ok(None);
        };
        Ok(lock_unpoisoned(&self.store).get(&id)?)
    }

    fn update_view(&self, update: impl FnOnce(&mut ChatView)) {
        update(&mut lock_unpoisoned(&self.view));
        self.emit_render();
    }

    fn emit_render(&self) {
        if let Some(render) = &self.render {
            let view = self.view();
            render(&view);
        }
    }
}

impl<B: SessionBackend + fmt::Debug> fmt::Debug for ChatController<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatController")
            .field("store", &self.store)
            .field("transport", &self.transport.profile())
            .field("options", &self.options)
            .field("pricing", &self.pricing)
            .field("view", &self.view)
            .finish_non_exhaustive()
    }
}

/// Returns the controller to `Idle` on every exit path of a turn.
struct SendingGuard<'a, B: SessionBackend> {
    controller: &'a ChatController<B>,
}

impl<B: SessionBackend> Drop for SendingGuard<'_, B> {
    fn drop(&mut self) {
        self.controller.update_view(|view| {
            view.state = TurnState::Idle;
            view.streaming_content.clear();
        });
    }
}

fn existing_session<B: SessionBackend>(
    store: &mut SessionStore<B>,
    id: &str,
) -> Result<ChatSession, ChatError> {
    store
        .get(id)?
        .ok_or_else(|| ChatError::UnknownSession { id: id.to_string() })
}
