//! Persisted, capped list of chat sessions.

mod backend;
mod error;
mod paths;
mod store;

pub use backend::{JsonFileBackend, MemoryBackend, SessionBackend};
pub use error::SessionStoreError;
pub use paths::{data_file, data_root, temp_file_for, DATA_DIR, DATA_FILE_NAME};
pub use store::{Clock, SessionStore, DEFAULT_MAX_SESSION_HISTORY, DEFAULT_STORAGE_KEY};
