//! Deterministic scripted implementation of the `agent_protocol` transport contract.
//!
//! This crate contains no process or network logic and is intended for local
//! development and contract-level integration testing.

pub mod messages;

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use agent_protocol::{
    AgentMessage, AgentTransport, MessageStream, QueryRequest, TransportError, TransportProfile,
};
use futures_util::{stream, StreamExt};

/// Stable transport identifier used for explicit startup selection.
pub const MOCK_TRANSPORT_ID: &str = "mock";

/// Remote session id assigned by echo-mode turns.
pub const MOCK_REMOTE_SESSION_ID: &str = "mock-session";

/// One scripted stream item.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptStep {
    Message(AgentMessage),
    /// Ends the stream with `TransportError::Other(message)`.
    Fail(String),
}

impl From<AgentMessage> for ScriptStep {
    fn from(message: AgentMessage) -> Self {
        Self::Message(message)
    }
}

/// Transport that replays one script per query, in order.
///
/// Once the scripts run out, each query echoes its prompt back as streamed text.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    scripts: Mutex<VecDeque<Vec<ScriptStep>>>,
    requests: Mutex<Vec<QueryRequest>>,
}

impl ScriptedTransport {
    /// Creates a transport that serves `turns` to successive queries.
    #[must_use]
    pub fn new(turns: Vec<Vec<ScriptStep>>) -> Self {
        Self {
            scripts: Mutex::new(turns.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Creates a transport serving a single scripted turn.
    #[must_use]
    pub fn single(steps: Vec<ScriptStep>) -> Self {
        Self::new(vec![steps])
    }

    /// Returns every request received so far, in order.
    #[must_use]
    pub fn requests(&self) -> Vec<QueryRequest> {
        lock_unpoisoned(&self.requests).clone()
    }

    fn next_script(&self, request: &QueryRequest) -> Vec<ScriptStep> {
        lock_unpoisoned(&self.scripts)
            .pop_front()
            .unwrap_or_else(|| echo_script(&request.prompt))
    }
}

impl AgentTransport for ScriptedTransport {
    fn profile(&self) -> TransportProfile {
        TransportProfile {
            transport_id: MOCK_TRANSPORT_ID.to_string(),
            model_id: Some("mock".to_string()),
        }
    }

    fn query(&self, request: QueryRequest) -> Result<MessageStream, TransportError> {
        let steps = self.next_script(&request);
        lock_unpoisoned(&self.requests).push(request);

        let mut items = Vec::with_capacity(steps.len());
        for step in steps {
            match step {
                ScriptStep::Message(message) => items.push(Ok(message)),
                ScriptStep::Fail(error) => {
                    items.push(Err(TransportError::other(error)));
                    break;
                }
            }
        }

        Ok(stream::iter(items).boxed())
    }
}

fn echo_script(prompt: &str) -> Vec<ScriptStep> {
    let reply = format!("You said: {}", prompt.trim());
    let mut steps = vec![ScriptStep::Message(
        messages::system_init(&["clear", "compact"]).with_session_id(MOCK_REMOTE_SESSION_ID),
    )];

    let mut pending_token = String::new();
    for ch in reply.chars() {
        pending_token.push(ch);
        if matches!(ch, ' ' | '\n') {
            steps.push(ScriptStep::Message(
                messages::text_delta(std::mem::take(&mut pending_token))
                    .with_session_id(MOCK_REMOTE_SESSION_ID),
            ));
        }
    }
    if !pending_token.is_empty() {
        steps.push(ScriptStep::Message(
            messages::text_delta(pending_token).with_session_id(MOCK_REMOTE_SESSION_ID),
        ));
    }

    let input_tokens = prompt.split_whitespace().count() as u64;
    let output_tokens = reply.split_whitespace().count() as u64;
    steps.push(ScriptStep::Message(
        messages::result(&reply, input_tokens, output_tokens)
            .with_session_id(MOCK_REMOTE_SESSION_ID),
    ));
    steps
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
