use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use agent_protocol::{
    AgentMessage, AgentTransport, MessageStream, QueryRequest, TransportError, TransportProfile,
};
use chat_app::sync::lock_unpoisoned;
use chat_app::{ChatController, ChatView, TurnOptions};
use futures_util::{stream, StreamExt};
use session_store::{MemoryBackend, SessionStore};
use tokio::sync::Notify;

/// Controller over an in-memory store whose clock ticks 1, 2, 3, ...
pub fn controller_with(
    transport: Arc<dyn AgentTransport>,
) -> (MemoryBackend, ChatController<MemoryBackend>) {
    let backend = MemoryBackend::new();
    let next = AtomicI64::new(1);
    let store = SessionStore::new(backend.clone())
        .with_clock(move || next.fetch_add(1, Ordering::SeqCst));
    let controller = ChatController::new(store, transport, TurnOptions::new("/vault"));
    (backend, controller)
}

/// Render hook that keeps every view it was shown.
#[derive(Debug, Clone, Default)]
pub struct RecordedViews {
    views: Arc<Mutex<Vec<ChatView>>>,
}

impl RecordedViews {
    pub fn hook(&self) -> impl Fn(&ChatView) + Send + Sync + 'static {
        let views = Arc::clone(&self.views);
        move |view: &ChatView| lock_unpoisoned(&views).push(view.clone())
    }

    pub fn views(&self) -> Vec<ChatView> {
        lock_unpoisoned(&self.views).clone()
    }
}

/// Transport whose single stream waits for `gate` before yielding its items.
pub struct GatedTransport {
    gate: Arc<Notify>,
    items: Mutex<Vec<Result<AgentMessage, TransportError>>>,
}

impl GatedTransport {
    pub fn new(gate: Arc<Notify>, messages: Vec<AgentMessage>) -> Self {
        Self {
            gate,
            items: Mutex::new(messages.into_iter().map(Ok).collect()),
        }
    }
}

impl AgentTransport for GatedTransport {
    fn profile(&self) -> TransportProfile {
        TransportProfile {
            transport_id: "gated".to_string(),
            model_id: None,
        }
    }

    fn query(&self, _request: QueryRequest) -> Result<MessageStream, TransportError> {
        let gate = Arc::clone(&self.gate);
        let items = std::mem::take(&mut *lock_unpoisoned(&self.items));
        Ok(stream::once(async move {
            gate.notified().await;
            stream::iter(items)
        })
        .flatten()
        .boxed())
    }
}
