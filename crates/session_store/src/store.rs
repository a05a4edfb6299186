use std::fmt;

use agent_chat::{new_id, ChatSession, Timestamp, UsageStats, DEFAULT_SESSION_TITLE};
use time::OffsetDateTime;

use crate::backend::SessionBackend;
use crate::error::SessionStoreError;

/// Storage key the session list is kept under.
pub const DEFAULT_STORAGE_KEY: &str = "chatSessions";

/// Sessions kept after every write; older ones are evicted.
pub const DEFAULT_MAX_SESSION_HISTORY: usize = 50;

pub type Clock = Box<dyn Fn() -> Timestamp + Send + Sync>;

/// Cached, capped list of chat sessions over a [`SessionBackend`].
///
/// The backend is read on first access only. Every mutation re-persists the
/// whole list sorted by `updated_at` descending and truncated to the history
/// cap; sessions beyond the cap are dropped from the cache as well.
pub struct SessionStore<B: SessionBackend> {
    backend: B,
    key: String,
    max_history: usize,
    clock: Clock,
    sessions: Option<Vec<ChatSession>>,
}

impl<B: SessionBackend> SessionStore<B> {
    #[must_use]
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            key: DEFAULT_STORAGE_KEY.to_string(),
            max_history: DEFAULT_MAX_SESSION_HISTORY,
            clock: Box::new(system_clock),
            sessions: None,
        }
    }

    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    /// Sets the history cap. A cap of zero is treated as one.
    #[must_use]
    pub fn with_max_history(mut self, max_history: usize) -> Self {
        self.max_history = max_history.max(1);
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: impl Fn() -> Timestamp + Send + Sync + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Current time according to the store clock, in unix milliseconds.
    #[must_use]
    pub fn now(&self) -> Timestamp {
        (self.clock)()
    }

    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    #[must_use]
    pub fn max_history(&self) -> usize {
        self.max_history
    }

    pub fn create(&mut self) -> Result<ChatSession, SessionStoreError> {
        let session = ChatSession::new(new_id(), self.now());
        self.cache()?.push(session.clone());
        self.persist()?;
        tracing::debug!(session_id = %session.id, "created session");
        Ok(session)
    }

    pub fn get(&mut self, id: &str) -> Result<Option<ChatSession>, SessionStoreError> {
        Ok(self
            .cache()?
            .iter()
            .find(|session| session.id == id)
            .cloned())
    }

    /// Upserts `session`, returning the stored copy.
    ///
    /// A session still carrying the default title gets one derived from its
    /// first user message. `updated_at` is always stamped with the store clock.
    pub fn save(&mut self, mut session: ChatSession) -> Result<ChatSession, SessionStoreError> {
        if session.has_default_title() {
            if let Some(title) = session.derive_title() {
                session.title = title;
            }
        }
        session.updated_at = self.now();

        let cache = self.cache()?;
        match cache.iter_mut().find(|stored| stored.id == session.id) {
            Some(stored) => *stored = session.clone(),
            None => cache.push(session.clone()),
        }
        self.persist()?;
        Ok(session)
    }

    /// Removes a session. Returns `false` when the id is unknown.
    pub fn delete(&mut self, id: &str) -> Result<bool, SessionStoreError> {
        let cache = self.cache()?;
        let before = cache.len();
        cache.retain(|session| session.id != id);
        if cache.len() == before {
            return Ok(false);
        }

        self.persist()?;
        Ok(true)
    }

    /// Every cached session, most recently updated first.
    pub fn list_all(&mut self) -> Result<Vec<ChatSession>, SessionStoreError> {
        Ok(self.cache()?.clone())
    }

    /// Adds one turn's usage to a session's running total and persists.
    ///
    /// Each delta must be merged exactly once; merging it again double-counts.
    pub fn merge_usage_into(
        &mut self,
        id: &str,
        delta: &UsageStats,
    ) -> Result<UsageStats, SessionStoreError> {
        let session = self
            .cache()?
            .iter_mut()
            .find(|session| session.id == id)
            .ok_or_else(|| SessionStoreError::unknown_session(id))?;
        session.usage += *delta;
        let total = session.usage;

        self.persist()?;
        Ok(total)
    }

    /// Sets a custom title. A blank title restores the default, which lets the
    /// next save derive one again.
    pub fn rename(&mut self, id: &str, title: &str) -> Result<ChatSession, SessionStoreError> {
        let now = self.now();
        let title = title.trim();
        let session = self
            .cache()?
            .iter_mut()
            .find(|session| session.id == id)
            .ok_or_else(|| SessionStoreError::unknown_session(id))?;
        session.title = if title.is_empty() {
            DEFAULT_SESSION_TITLE.to_string()
        } else {
            title.to_string()
        };
        session.updated_at = now;
        let renamed = session.clone();

        self.persist()?;
        Ok(renamed)
    }

    fn cache(&mut self) -> Result<&mut Vec<ChatSession>, SessionStoreError> {
        if self.sessions.is_none() {
            let mut loaded = self.backend.load(&self.key)?.unwrap_or_default();
            sort_newest_first(&mut loaded);
            tracing::debug!(key = %self.key, sessions = loaded.len(), "loaded session list");
            self.sessions = Some(loaded);
        }

        Ok(self.sessions.get_or_insert_with(Vec::new))
    }

    fn persist(&mut self) -> Result<(), SessionStoreError> {
        let sessions = self.sessions.get_or_insert_with(Vec::new);
        sort_newest_first(sessions);
        if sessions.len() > self.max_history {
            for evicted in sessions.drain(self.max_history..) {
                tracing::debug!(session_id = %evicted.id, "evicted session beyond history cap");
            }
        }

        self.backend.persist(&self.key, sessions)
    }
}

impl<B: SessionBackend + fmt::Debug> fmt::Debug for SessionStore<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionStore")
            .field("backend", &self.backend)
            .field("key", &self.key)
            .field("max_history", &self.max_history)
            .field("loaded", &self.sessions.is_some())
            .finish_non_exhaustive()
    }
}

fn sort_newest_first(sessions: &mut [ChatSession]) {
    sessions.sort_by(|left, right| right.updated_at.cmp(&left.updated_at));
}

fn system_clock() -> Timestamp {
    let millis = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
    Timestamp::try_from(millis).unwrap_or(Timestamp::MAX)
}
