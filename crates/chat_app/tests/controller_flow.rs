mod support;

use std::sync::Arc;

use agent_chat::{
    EditorSnapshot, Role, StaticEditorContext, DEFAULT_SESSION_TITLE, INIT_PLACEHOLDER,
};
use agent_transport_mock::{messages, ScriptStep, ScriptedTransport};
use chat_app::{ChatError, RejectReason, SendOutcome, TurnState};
use pretty_assertions::assert_eq;
use serde_json::json;
use session_store::DEFAULT_STORAGE_KEY;
use support::{controller_with, GatedTransport, RecordedViews};
use tokio::sync::Notify;

fn completed(outcome: SendOutcome) -> agent_chat::ChatMessage {
    match outcome {
        SendOutcome::Completed(message) => message,
        SendOutcome::Rejected(reason) => panic!("turn was rejected: {reason:?}"),
    }
}

#[tokio::test]
async fn blank_prompt_and_missing_session_are_rejected_without_side_effects() {
    let transport = Arc::new(ScriptedTransport::default());
    let (backend, controller) = controller_with(transport.clone());

    let outcome = controller
        .send_message("hello")
        .await
        .expect("rejection is not an error");
    assert_eq!(
        outcome,
        SendOutcome::Rejected(RejectReason::NoActiveSession)
    );

    controller.new_session().expect("session should be created");
    let outcome = controller
        .send_message("   \n")
        .await
        .expect("rejection is not an error");
    assert_eq!(outcome, SendOutcome::Rejected(RejectReason::BlankMessage));

    assert!(transport.requests().is_empty());
    let stored = backend
        .stored(DEFAULT_STORAGE_KEY)
        .expect("created session is stored");
    assert!(stored[0].messages.is_empty());
}

#[tokio::test]
async fn completed_turn_appends_assistant_message_and_merges_usage() {
    let transport = Arc::new(ScriptedTransport::single(vec![
        ScriptStep::Message(messages::system_init(&["clear"]).with_session_id("remote-1")),
        messages::text_delta("Hel").into(),
        messages::tool_use("toolu_1", "Read", json!({ "file_path": "todo.md" })).into(),
        messages::user_tool_result("toolu_1", json!("- ship it"), false).into(),
        messages::text_delta("lo").into(),
        messages::result("Hello there", 1_000_000, 0).into(),
    ]));
    let (_backend, controller) = controller_with(transport.clone());
    let session = controller.new_session().expect("session should be created");

    let message = completed(
        controller
            .send_message("  Summarize my meeting notes from yesterday and list action items ")
            .await
            .expect("turn should succeed"),
    );

    assert_eq!(message.role, Role::Assistant);
    assert_eq!(message.content, "Hello there");
    assert_eq!(message.tool_results.len(), 1);
    assert_eq!(message.tool_results[0].output, "- ship it");

    let stored = controller
        .active_session()
        .expect("store should load")
        .expect("session is active");
    assert_eq!(stored.id, session.id);
    assert_eq!(
        stored
            .messages
            .iter()
            .map(|message| message.role)
            .collect::<Vec<_>>(),
        vec![Role::User, Role::Assistant]
    );
    assert_eq!(
        stored.messages[0].content,
        "Summarize my meeting notes from yesterday and list action items"
    );
    assert_eq!(
        stored.title,
        "Summarize my meeting notes from yesterday and list..."
    );
    assert_eq!(stored.remote_session_id.as_deref(), Some("remote-1"));
    assert_eq!(stored.usage.input_tokens, 1_000_000);
    assert!((stored.usage.estimated_cost - 3.0).abs() < 1e-9);
    assert_eq!(controller.commands().commands(), vec!["clear"]);

    let view = controller.view();
    assert_eq!(view.state, TurnState::Idle);
    assert!(view.streaming_content.is_empty());
    assert_eq!(view.error, None);
}

#[tokio::test]
async fn failed_turn_keeps_user_message_and_surfaces_error_verbatim() {
    let transport = Arc::new(ScriptedTransport::single(vec![
        messages::text_delta("Hel").into(),
        ScriptStep::Fail("connection reset by agent".to_string()),
    ]));
    let (_backend, controller) = controller_with(transport);
    controller.new_session().expect("session should be created");

    let error = controller
        .send_message("hello")
        .await
        .expect_err("transport failure must fail the turn");

    assert!(matches!(error, ChatError::Transport(_)));
    assert_eq!(error.to_string(), "connection reset by agent");

    let view = controller.view();
    assert_eq!(view.state, TurnState::Idle);
    assert!(view.streaming_content.is_empty());
    assert_eq!(view.error.as_deref(), Some("connection reset by agent"));

    let stored = controller
        .active_session()
        .expect("store should load")
        .expect("session is active");
    assert_eq!(stored.messages.len(), 1);
    assert_eq!(stored.messages[0].role, Role::User);
    assert!(stored.usage.is_zero());

    controller.clear_error();
    assert_eq!(controller.view().error, None);
}

#[tokio::test]
async fn second_send_is_rejected_while_a_turn_is_in_flight() {
    let gate = Arc::new(Notify::new());
    let transport = Arc::new(GatedTransport::new(
        Arc::clone(&gate),
        vec![messages::text_delta("done")],
    ));
    let (_backend, controller) = controller_with(transport);
    controller.new_session().expect("session should be created");

    let second = async {
        while controller.view().state != TurnState::Sending {
            tokio::task::yield_now().await;
        }
        let outcome = controller.send_message("second").await;
        gate.notify_one();
        outcome
    };
    let (first, second) = tokio::join!(controller.send_message("first"), second);

    assert_eq!(
        second.expect("rejection is not an error"),
        SendOutcome::Rejected(RejectReason::AlreadySending)
    );
    assert_eq!(
        completed(first.expect("first turn should succeed")).content,
        "done"
    );

    let stored = controller
        .active_session()
        .expect("store should load")
        .expect("session is active");
    assert_eq!(stored.messages.len(), 2);
    assert_eq!(stored.messages[0].content, "first");
}

#[tokio::test]
async fn editor_context_is_appended_to_the_prompt_and_recorded_on_the_message() {
    let transport = Arc::new(ScriptedTransport::single(vec![
        messages::assistant_text("Looks fine.").into(),
    ]));
    let (_backend, controller) = controller_with(transport.clone());
    let controller = controller.with_editor_context(Arc::new(StaticEditorContext::new(
        EditorSnapshot::file("notes/plan.md").with_selection(3, 7, "ship it"),
    )));
    controller.new_session().expect("session should be created");

    completed(
        controller
            .send_message("review this")
            .await
            .expect("turn should succeed"),
    );

    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(
        requests[0].prompt,
        "review this\n\n<editor-context><current-file>notes/plan.md</current-file>\
<selected-text line=\"3-7\">ship it</selected-text></editor-context>"
    );
    assert_eq!(
        requests[0].working_directory,
        std::path::PathBuf::from("/vault")
    );

    let stored = controller
        .active_session()
        .expect("store should load")
        .expect("session is active");
    assert_eq!(stored.messages[0].content, "review this");
    assert_eq!(stored.messages[0].attached_context.len(), 2);
}

#[tokio::test]
async fn remote_session_id_is_resumed_on_the_next_turn() {
    let transport = Arc::new(ScriptedTransport::new(vec![
        vec![messages::text_delta("one").with_session_id("remote-7").into()],
        vec![messages::text_delta("two").into()],
    ]));
    let (_backend, controller) = controller_with(transport.clone());
    controller.new_session().expect("session should be created");

    controller.send_message("first").await.expect("first turn");
    controller.send_message("second").await.expect("second turn");

    let resumed: Vec<Option<String>> = transport
        .requests()
        .into_iter()
        .map(|request| request.resume_session_id)
        .collect();
    assert_eq!(resumed, vec![None, Some("remote-7".to_string())]);

    let stored = controller
        .active_session()
        .expect("store should load")
        .expect("session is active");
    assert_eq!(stored.remote_session_id.as_deref(), Some("remote-7"));
    assert_eq!(stored.messages.len(), 4);
}

#[tokio::test]
async fn render_hook_sees_streaming_text_then_idle() {
    let transport = Arc::new(ScriptedTransport::single(vec![
        messages::text_delta("Hel").into(),
        messages::text_delta("lo").into(),
    ]));
    let recorded = RecordedViews::default();
    let (_backend, controller) = controller_with(transport);
    let controller = controller.with_render_hook(recorded.hook());
    controller.new_session().expect("session should be created");

    controller.send_message("hi").await.expect("turn should succeed");

    let streaming: Vec<(TurnState, String)> = recorded
        .views()
        .into_iter()
        .map(|view| (view.state, view.streaming_content))
        .collect();
    assert_eq!(
        streaming,
        vec![
            (TurnState::Idle, String::new()),
            (TurnState::Sending, String::new()),
            (TurnState::Sending, "Hel".to_string()),
            (TurnState::Sending, "Hello".to_string()),
            (TurnState::Idle, String::new()),
        ]
    );
}

#[tokio::test]
async fn clear_command_yields_the_fresh_session_placeholder() {
    let transport = Arc::new(ScriptedTransport::single(vec![
        messages::system_init(&["clear", "compact"]).into(),
        messages::result("", 0, 0).into(),
    ]));
    let (_backend, controller) = controller_with(transport.clone());
    controller.new_session().expect("session should be created");

    let message = completed(
        controller
            .send_message("/clear")
            .await
            .expect("turn should succeed"),
    );

    assert_eq!(message.content, INIT_PLACEHOLDER);
    assert!(message.tool_results.is_empty());
    assert_eq!(transport.requests()[0].prompt, "/clear");
}

#[tokio::test]
async fn session_management_tracks_the_active_session() {
    let (_backend, controller) = controller_with(Arc::new(ScriptedTransport::default()));

    let first = controller.open_latest_session().expect("creates a session");
    let second = controller.new_session().expect("session should be created");
    assert_eq!(
        controller.view().active_session_id.as_deref(),
        Some(second.id.as_str())
    );

    controller
        .select_session(&first.id)
        .expect("known session can be selected");
    assert_eq!(
        controller.view().active_session_id.as_deref(),
        Some(first.id.as_str())
    );
    assert!(matches!(
        controller.select_session("missing"),
        Err(ChatError::UnknownSession { .. })
    ));

    let renamed = controller
        .rename_session(&first.id, "Planning")
        .expect("rename should succeed");
    assert_eq!(renamed.title, "Planning");
    assert!(matches!(
        controller.rename_session("missing", "x"),
        Err(ChatError::UnknownSession { .. })
    ));

    let latest = controller.open_latest_session().expect("reopens latest");
    assert_eq!(latest.id, first.id);

    assert!(controller.delete_session(&first.id).expect("delete"));
    assert_eq!(controller.view().active_session_id, None);
    assert!(!controller.delete_session(&first.id).expect("second delete"));

    let remaining = controller.sessions().expect("list should succeed");
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].title, DEFAULT_SESSION_TITLE);
}
