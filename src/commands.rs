//! Cache of slash commands advertised by the remote agent.
//!
//! The list is replaced wholesale whenever the agent announces its commands;
//! hosts read it for autocomplete.

use std::sync::{Arc, Mutex, MutexGuard};

const MIN_SUBSEQUENCE_QUERY_CHARS: usize = 2;

/// Shared handle to the advertised command list. Clones see the same list.
#[derive(Debug, Clone, Default)]
pub struct CommandCache {
    commands: Arc<Mutex<Vec<String>>>,
}

impl CommandCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the cached list. Names are stored without the leading `/`;
    /// blanks and duplicates are dropped, first occurrence wins.
    pub fn replace(&self, commands: impl IntoIterator<Item = String>) {
        let mut normalized: Vec<String> = Vec::new();
        for command in commands {
            let name = command.trim().trim_start_matches('/').to_string();
            if !name.is_empty() && !normalized.contains(&name) {
                normalized.push(name);
            }
        }

        *lock_unpoisoned(&self.commands) = normalized;
    }

    #[must_use]
    pub fn commands(&self) -> Vec<String> {
        lock_unpoisoned(&self.commands).clone()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        lock_unpoisoned(&self.commands).is_empty()
    }

    /// Autocomplete candidates for a partially typed `/command`.
    ///
    /// Prefix matches come first. Queries of two or more characters also match
    /// names containing them as an in-order subsequence, listed after the
    /// prefix matches. Input that does not start with `/` or already contains
    /// whitespace yields nothing.
    #[must_use]
    pub fn suggest(&self, input: &str) -> Vec<String> {
        let Some(query) = input.strip_prefix('/') else {
            return Vec::new();
        };
        if query.chars().any(char::is_whitespace) {
            return Vec::new();
        }

        let query = query.to_lowercase();
        let commands = lock_unpoisoned(&self.commands);
        let (prefixed, rest): (Vec<&String>, Vec<&String>) = commands
            .iter()
            .partition(|name| name.to_lowercase().starts_with(&query));

        let fuzzy = query.chars().count() >= MIN_SUBSEQUENCE_QUERY_CHARS;
        prefixed
            .into_iter()
            .chain(
                rest.into_iter()
                    .filter(|name| fuzzy && is_subsequence(&query, &name.to_lowercase())),
            )
            .map(|name| format!("/{name}"))
            .collect()
    }
}

fn is_subsequence(query: &str, text: &str) -> bool {
    let mut text_chars = text.chars();
    query
        .chars()
        .all(|wanted| text_chars.any(|candidate| candidate == wanted))
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
