#![cfg(unix)]

use std::path::Path;

use agent_protocol::{AgentMessage, AgentMessageKind, AgentTransport, QueryRequest, TransportError};
use agent_transport_cli::{CliTransport, CliTransportConfig};
use futures_util::StreamExt;

/// Transport running `script` through `sh -c`; the per-turn arguments become
/// the script's positional parameters.
fn shell_transport(script: &str) -> CliTransport {
    CliTransport::new(CliTransportConfig::new("/bin/sh").with_base_args(["-c", script, "agent"]))
        .expect("shell config is valid")
}

async fn run(
    transport: &CliTransport,
    request: QueryRequest,
) -> Vec<Result<AgentMessage, TransportError>> {
    transport
        .query(request)
        .expect("query should start lazily")
        .collect()
        .await
}

fn result_text(item: &Result<AgentMessage, TransportError>) -> Option<String> {
    match item {
        Ok(AgentMessage {
            kind: AgentMessageKind::Result {
                result: Some(value),
                ..
            },
            ..
        }) => value.as_str().map(ToString::to_string),
        _ => None,
    }
}

#[tokio::test]
async fn stdout_lines_become_messages_in_order() {
    let transport = shell_transport(
        r#"printf '%s\n' \
  '{"type":"system","subtype":"init","session_id":"s-1","slash_commands":["clear"]}' \
  'not json' \
  '{"type":"stream_event","session_id":"s-1","event":{"type":"content_block_delta","delta":{"type":"text_delta","text":"Hi"}}}'
printf '%s' '{"type":"result","session_id":"s-1","result":"Hi"}'"#,
    );

    let items = run(&transport, QueryRequest::new("hello", "/")).await;

    assert_eq!(items.len(), 3);
    let kinds: Vec<&AgentMessageKind> = items
        .iter()
        .map(|item| &item.as_ref().expect("successful run").kind)
        .collect();
    assert!(matches!(kinds[0], AgentMessageKind::SystemInit { .. }));
    assert!(matches!(kinds[1], AgentMessageKind::TextDelta { text } if text == "Hi"));
    assert_eq!(result_text(&items[2]).as_deref(), Some("Hi"));
}

#[tokio::test]
async fn generated_arguments_reach_the_process() {
    let transport = shell_transport(r#"printf '{"type":"result","result":"%s"}\n' "$*""#);
    let request = QueryRequest::new("hello", "/")
        .with_model(Some("sonnet".to_string()))
        .with_resume_session_id(Some("s-9".to_string()));

    let items = run(&transport, request).await;

    assert_eq!(
        result_text(&items[0]).as_deref(),
        Some(
            "-p --output-format stream-json --verbose --include-partial-messages \
             --model sonnet --resume s-9 -- hello"
        )
    );
}

#[tokio::test]
async fn dash_prefixed_prompt_arrives_as_the_last_argument() {
    let transport = shell_transport(
        r#"for arg; do last=$arg; done
printf '{"type":"result","result":"%s|%s"}\n' "$#" "$last""#,
    );

    let items = run(&transport, QueryRequest::new("- fix the list", "/")).await;

    assert_eq!(result_text(&items[0]).as_deref(), Some("7|- fix the list"));
}

#[tokio::test]
async fn configured_default_model_is_passed_when_request_has_none() {
    let transport = CliTransport::new(
        CliTransportConfig::new("/bin/sh")
            .with_base_args([
                "-c",
                r#"printf '{"type":"result","result":"%s"}\n' "$*""#,
                "agent",
            ])
            .with_default_model(Some("haiku".to_string())),
    )
    .expect("shell config is valid");

    let items = run(&transport, QueryRequest::new("hello", "/")).await;

    assert_eq!(
        result_text(&items[0]).as_deref(),
        Some(
            "-p --output-format stream-json --verbose --include-partial-messages \
             --model haiku -- hello"
        )
    );
}

#[tokio::test]
async fn environment_and_working_directory_are_applied() {
    let dir = tempfile::tempdir().expect("tempdir should be created");
    let transport = shell_transport(
        r#"printf '{"type":"result","result":"%s|%s"}\n' "$AGENT_CHAT_TEST_TOKEN" "$(basename "$(pwd)")""#,
    );
    let request = QueryRequest::new("hi", dir.path()).with_env(vec![(
        "AGENT_CHAT_TEST_TOKEN".to_string(),
        "secret".to_string(),
    )]);

    let items = run(&transport, request).await;

    let dir_name = dir
        .path()
        .file_name()
        .and_then(|name| name.to_str())
        .expect("tempdir has a name");
    assert_eq!(
        result_text(&items[0]),
        Some(format!("secret|{dir_name}"))
    );
}

#[tokio::test]
async fn non_zero_exit_reports_code_and_stderr_after_output() {
    let transport = shell_transport(
        r#"printf '%s\n' '{"type":"stream_event","event":{"type":"content_block_delta","delta":{"type":"text_delta","text":"Hel"}}}'
echo 'rate limited' >&2
exit 3"#,
    );

    let items = run(&transport, QueryRequest::new("hi", "/")).await;

    assert_eq!(items.len(), 2);
    assert!(items[0].is_ok());
    let error = items[1].as_ref().expect_err("exit failure is the last item");
    assert!(matches!(
        error,
        TransportError::Exited { code: Some(3), stderr } if stderr == "rate limited"
    ));
    assert_eq!(
        error.to_string(),
        "agent process failed (exit code 3): rate limited"
    );
}

#[tokio::test]
async fn missing_executable_fails_as_first_stream_item() {
    let transport = CliTransport::new(CliTransportConfig::new(Path::new(
        "/nonexistent/agent-chat-test-binary",
    )))
    .expect("config is valid");

    let items = run(&transport, QueryRequest::new("hi", "/")).await;

    assert_eq!(items.len(), 1);
    assert!(matches!(&items[0], Err(TransportError::Spawn { program, .. })
        if program == "/nonexistent/agent-chat-test-binary"));
}

#[tokio::test]
async fn request_executable_overrides_config() {
    let transport = CliTransport::new(
        CliTransportConfig::new("/nonexistent/agent").with_base_args(["-c", "exit 0", "agent"]),
    )
    .expect("config is valid");
    let request = QueryRequest::new("hi", "/").with_executable_path(Some("/bin/sh".into()));

    let items = run(&transport, request).await;

    assert!(items.is_empty());
}
