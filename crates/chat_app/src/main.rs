use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use agent_chat::{ChatMessage, Role};
use chat_app::commands::{command_listing, parse_local_command, LocalCommand, HELP_TEXT};
use chat_app::sync::lock_unpoisoned;
use chat_app::transports::transport_for_settings;
use chat_app::{logging, ChatController, ChatError, ChatView, RejectReason, SendOutcome, Settings};
use session_store::{JsonFileBackend, SessionStore};
use tokio::io::{AsyncBufReadExt, BufReader};

type Controller = ChatController<JsonFileBackend>;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    logging::init();

    let settings = Settings::load()?;
    let working_directory = settings.resolved_working_directory()?;
    let store = SessionStore::new(JsonFileBackend::new(
        settings.data_file_path(&working_directory),
    ))
    .with_max_history(settings.max_session_history);
    let transport = transport_for_settings(&settings)?;

    let echo = Arc::new(Mutex::new(StreamEcho::default()));
    let hook_echo = Arc::clone(&echo);
    let controller = ChatController::new(store, transport, settings.turn_options(working_directory))
        .with_pricing(settings.pricing())
        .with_render_hook(move |view| lock_unpoisoned(&hook_echo).on_view(view));

    let session = controller.open_latest_session()?;
    let profile = controller.transport_profile();
    println!(
        "agent-chat ({}{}) session '{}'. Type /help for commands.",
        profile.transport_id,
        profile
            .model_id
            .map(|model| format!(", {model}"))
            .unwrap_or_default(),
        session.title
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        match parse_local_command(&line) {
            Some(LocalCommand::Quit) => break,
            Some(command) => {
                if let Err(error) = run_local_command(&controller, command) {
                    eprintln!("Error: {error}");
                }
            }
            None => send(&controller, &echo, &line).await,
        }
    }

    Ok(())
}

async fn send(controller: &Controller, echo: &Mutex<StreamEcho>, line: &str) {
    match controller.send_message(line).await {
        Ok(SendOutcome::Completed(message)) => {
            lock_unpoisoned(echo).finish(&message.content);
            print_tools(&message);
        }
        Ok(SendOutcome::Rejected(RejectReason::BlankMessage)) => {}
        Ok(SendOutcome::Rejected(RejectReason::AlreadySending)) => {
            println!("A turn is already in progress.");
        }
        Ok(SendOutcome::Rejected(RejectReason::NoActiveSession)) => {
            println!("No active session. Use /new or /open <id>.");
        }
        Err(error) => {
            lock_unpoisoned(echo).reset();
            eprintln!("Error: {error}");
        }
    }
}

fn run_local_command(controller: &Controller, command: LocalCommand) -> Result<(), ChatError> {
    match command {
        LocalCommand::Help => println!("{HELP_TEXT}"),
        LocalCommand::New => {
            let session = controller.new_session()?;
            println!("Started session {}", session.id);
        }
        LocalCommand::Sessions => {
            let active = controller.view().active_session_id;
            for session in controller.sessions()? {
                let marker = if active.as_deref() == Some(session.id.as_str()) {
                    '*'
                } else {
                    ' '
                };
                println!(
                    "{marker} {}  {}  ({} messages)",
                    session.id,
                    session.title,
                    session.messages.len()
                );
            }
        }
        LocalCommand::Open(id) => {
            let session = controller.select_session(&id)?;
            println!("Opened '{}'", session.title);
            for message in &session.messages {
                print_transcript_entry(message);
            }
        }
        LocalCommand::Delete(id) => {
            if controller.delete_session(&id)? {
                println!("Deleted {id}");
            } else {
                println!("No session {id}");
            }
        }
        LocalCommand::Rename(title) => {
            let Some(active) = controller.view().active_session_id else {
                println!("No active session.");
                return Ok(());
            };
            let session = controller.rename_session(&active, &title)?;
            println!("Renamed to '{}'", session.title);
        }
        LocalCommand::Commands(filter) => {
            let commands = command_listing(controller.commands(), &filter);
            if commands.is_empty() {
                if controller.commands().is_empty() {
                    println!("No agent commands reported yet.");
                } else {
                    println!("No agent commands match '{filter}'.");
                }
            }
            for command in commands {
                println!("{command}");
            }
        }
        LocalCommand::Usage => match controller.active_session()? {
            Some(session) => {
                let usage = session.usage;
                println!(
                    "{} input + {} output = {} tokens, ~${:.4}",
                    usage.input_tokens,
                    usage.output_tokens,
                    usage.total_tokens,
                    usage.estimated_cost
                );
            }
            None => println!("No active session."),
        },
        LocalCommand::Quit => {}
    }

    Ok(())
}

fn print_transcript_entry(message: &ChatMessage) {
    let label = match message.role {
        Role::User => "you",
        Role::Assistant => "agent",
        Role::System => "system",
    };
    println!("[{label}] {}", message.content);
    print_tools(message);
}

fn print_tools(message: &ChatMessage) {
    for tool in &message.tool_results {
        let status = if tool.is_error { "failed" } else { "ok" };
        println!("  - {} ({status})", tool.tool_name);
    }
}

/// Prints streamed text as it grows.
#[derive(Debug, Default)]
struct StreamEcho {
    printed: String,
}

impl StreamEcho {
    fn on_view(&mut self, view: &ChatView) {
        let Some(rest) = view.streaming_content.strip_prefix(self.printed.as_str()) else {
            return;
        };
        if rest.is_empty() {
            return;
        }

        print!("{rest}");
        let _ = io::stdout().flush();
        self.printed = view.streaming_content.clone();
    }

    /// Ends the streamed line, printing the final text when it replaced the stream.
    fn finish(&mut self, final_text: &str) {
        let replaced = self.printed != final_text;
        self.reset();
        if replaced {
            println!("{final_text}");
        }
    }

    fn reset(&mut self) {
        if !self.printed.is_empty() {
            println!();
        }
        self.printed.clear();
    }
}
