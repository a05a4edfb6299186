use agent_chat::CommandCache;

/// Commands the REPL handles itself. Any other input, including agent slash
/// commands such as `/clear`, is sent to the agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalCommand {
    Help,
    New,
    Sessions,
    Open(String),
    Delete(String),
    Rename(String),
    /// Lists advertised agent commands, narrowed to completions of the filter when given.
    Commands(String),
    Usage,
    Quit,
}

pub const HELP_TEXT: &str = "Local commands: /help, /new, /sessions, /open <id>, /delete <id>, \
/rename <title>, /commands [prefix], /usage, /quit. Anything else is sent to the agent.";

pub fn parse_local_command(input: &str) -> Option<LocalCommand> {
    let trimmed = input.trim();
    if !trimmed.starts_with('/') {
        return None;
    }

    let (command, argument) = match trimmed.split_once(char::is_whitespace) {
        Some((command, argument)) => (command, argument.trim()),
        None => (trimmed, ""),
    };

    let parsed = match (command, argument) {
        ("/help", "") => LocalCommand::Help,
        ("/new", "") => LocalCommand::New,
        ("/sessions", "") => LocalCommand::Sessions,
        ("/open", id) if !id.is_empty() => LocalCommand::Open(id.to_string()),
        ("/delete", id) if !id.is_empty() => LocalCommand::Delete(id.to_string()),
        ("/rename", title) => LocalCommand::Rename(title.to_string()),
        ("/commands", filter) => LocalCommand::Commands(filter.to_string()),
        ("/usage", "") => LocalCommand::Usage,
        ("/quit", "") => LocalCommand::Quit,
        _ => return None,
    };

    Some(parsed)
}

/// Advertised agent commands as typed, each with its leading `/`. A non-empty
/// filter keeps only the autocomplete candidates for `/<filter>`.
#[must_use]
pub fn command_listing(cache: &CommandCache, filter: &str) -> Vec<String> {
    let filter = filter.trim().trim_start_matches('/');
    if filter.is_empty() {
        return cache
            .commands()
            .into_iter()
            .map(|name| format!("/{name}"))
            .collect();
    }

    cache.suggest(&format!("/{filter}"))
}
