//! Subprocess implementation of the `agent_protocol` transport contract.
//!
//! Each query launches the agent executable in print mode with stream-json
//! output and yields one message per stdout line. Standard error is collected
//! and reported when the process exits unsuccessfully.

mod args;
mod config;
mod lines;

use std::process::Stdio;

use agent_protocol::{
    AgentTransport, MessageStream, QueryRequest, TransportError, TransportInitError,
    TransportProfile,
};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

pub use args::build_args;
pub use config::{CliTransportConfig, DEFAULT_AGENT_EXECUTABLE};
pub use lines::JsonLineParser;

/// Stable transport identifier used for explicit startup selection.
pub const CLI_TRANSPORT_ID: &str = "cli";

const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Transport that runs the external agent as a child process per turn.
#[derive(Debug, Clone)]
pub struct CliTransport {
    config: CliTransportConfig,
}

impl CliTransport {
    pub fn new(config: CliTransportConfig) -> Result<Self, TransportInitError> {
        if config.executable.as_os_str().is_empty() {
            return Err(TransportInitError::new(
                "agent executable path must not be empty",
            ));
        }

        Ok(Self { config })
    }

    #[must_use]
    pub fn config(&self) -> &CliTransportConfig {
        &self.config
    }

    fn command_for(&self, request: &QueryRequest) -> (String, Command) {
        let executable = request
            .executable_path
            .clone()
            .filter(|path| !path.as_os_str().is_empty())
            .unwrap_or_else(|| self.config.executable.clone());
        let program = executable.display().to_string();

        let mut command = Command::new(&executable);
        command
            .args(&self.config.base_args)
            .args(build_args(
                request,
                self.config.default_model.as_deref(),
            ))
            .current_dir(&request.working_directory)
            .envs(&request.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        (program, command)
    }
}

impl AgentTransport for CliTransport {
    fn profile(&self) -> TransportProfile {
        TransportProfile {
            transport_id: CLI_TRANSPORT_ID.to_string(),
            model_id: self.config.default_model.clone(),
        }
    }

    fn query(&self, request: QueryRequest) -> Result<MessageStream, TransportError> {
        let (program, mut command) = self.command_for(&request);
        tracing::debug!(
            program = %program,
            cwd = %request.working_directory.display(),
            resume = request.resume_session_id.is_some(),
            "launching agent process"
        );

        let stream = async_stream::stream! {
            let mut child = match command.spawn() {
                Ok(child) => child,
                Err(source) => {
                    yield Err(TransportError::Spawn { program, source });
                    return;
                }
            };
            let Some(mut stdout) = child.stdout.take() else {
                yield Err(TransportError::Protocol("agent stdout was not captured".to_string()));
                return;
            };
            let stderr_task = child
                .stderr
                .take()
                .map(|stderr| tokio::spawn(read_to_string(stderr)));

            let mut parser = JsonLineParser::default();
            let mut chunk = vec![0_u8; READ_CHUNK_SIZE];
            loop {
                let read = match stdout.read(&mut chunk).await {
                    Ok(read) => read,
                    Err(source) => {
                        yield Err(TransportError::io("reading agent output", source));
                        return;
                    }
                };
                if read == 0 {
                    break;
                }
                for message in parser.feed(&chunk[..read]) {
                    yield Ok(message);
                }
            }
            if let Some(message) = parser.finish() {
                yield Ok(message);
            }

            let status = match child.wait().await {
                Ok(status) => status,
                Err(source) => {
                    yield Err(TransportError::io("waiting for agent process", source));
                    return;
                }
            };
            let stderr = match stderr_task {
                Some(task) => task.await.unwrap_or_default(),
                None => String::new(),
            };

            if !status.success() {
                tracing::warn!(program = %program, code = ?status.code(), "agent process failed");
                yield Err(TransportError::Exited {
                    code: status.code(),
                    stderr: stderr.trim().to_string(),
                });
            }
        };

        Ok(Box::pin(stream))
    }
}

async fn read_to_string(mut reader: impl AsyncRead + Unpin) -> String {
    let mut bytes = Vec::new();
    if let Err(error) = reader.read_to_end(&mut bytes).await {
        tracing::debug!(%error, "failed to read agent stderr");
    }
    String::from_utf8_lossy(&bytes).into_owned()
}
