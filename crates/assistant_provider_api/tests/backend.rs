use assistant_provider::{
    AssistantBackend, ConversationHandle, MessageRole, RunStatus, ToolResult,
};
use assistant_provider_api::ApiBackend;
use assistants_api::AssistantsApiConfig;
use httpmock::prelude::*;
use serde_json::json;

fn backend(server: &MockServer) -> ApiBackend {
    ApiBackend::new(AssistantsApiConfig::openai("sk-test").with_base_url(server.base_url()))
        .expect("backend")
}

#[tokio::test]
async fn thread_message_and_run_round_trip_through_handle() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/v1/threads");
        then.status(200).json_body(json!({"id": "thread_9"}));
    });
    let message = server.mock(|when, then| {
        when.method(POST)
            .path("/v1/threads/thread_9/messages")
            .json_body_includes(json!({"content": "plan my week"}).to_string());
        then.status(200)
            .json_body(json!({"id": "msg_1", "role": "user", "content": []}));
    });
    server.mock(|when, then| {
        when.method(POST).path("/v1/threads/thread_9/runs");
        then.status(200)
            .json_body(json!({"id": "run_1", "status": "queued"}));
    });

    let backend = backend(&server);
    let handle = backend.create_thread().await.expect("thread");
    backend
        .post_user_message(&handle, "plan my week")
        .await
        .expect("message");
    let run = backend.start_run(&handle, "asst_1").await.expect("run");

    message.assert();
    assert_eq!(handle, ConversationHandle::from("thread_9"));
    assert_eq!(run.run_id, "run_1");
    assert_eq!(run.status, RunStatus::Queued);
    assert!(run.last_error.is_none());
}

#[tokio::test]
async fn requires_action_run_exposes_tool_calls_and_submission_sends_json_outputs() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/v1/threads/thread_9/runs/run_1");
        then.status(200).json_body(json!({
            "id": "run_1",
            "status": "requires_action",
            "required_action": {
                "type": "submit_tool_outputs",
                "submit_tool_outputs": {"tool_calls": [{
                    "id": "call_7",
                    "type": "function",
                    "function": {"name": "generate_workout_plan", "arguments": "{\"days\":2}"}
                }]}
            }
        }));
    });
    let submit = server.mock(|when, then| {
        when.method(POST)
            .path("/v1/threads/thread_9/runs/run_1/submit_tool_outputs")
            .json_body_includes(
                json!({"tool_outputs": [{"tool_call_id": "call_7", "output": "{\"summary\":\"ok\"}"}]})
                    .to_string(),
            );
        then.status(200)
            .json_body(json!({"id": "run_1", "status": "in_progress"}));
    });

    let backend = backend(&server);
    let handle = ConversationHandle::from("thread_9");
    let run = backend.retrieve_run(&handle, "run_1").await.expect("run");

    assert_eq!(run.status, RunStatus::RequiresAction);
    assert_eq!(run.tool_calls.len(), 1);
    assert_eq!(run.tool_calls[0].call_id, "call_7");
    assert_eq!(run.tool_calls[0].tool_name, "generate_workout_plan");
    assert_eq!(run.tool_calls[0].arguments, r#"{"days":2}"#);

    let next = backend
        .submit_tool_outputs(
            &handle,
            "run_1",
            vec![ToolResult::success(
                "call_7",
                "generate_workout_plan",
                json!({"summary": "ok"}),
            )],
        )
        .await
        .expect("submission");

    submit.assert();
    assert_eq!(next.status, RunStatus::InProgress);
}

#[tokio::test]
async fn failed_run_carries_remote_error_detail() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/v1/threads/thread_9/runs/run_2");
        then.status(200).json_body(json!({
            "id": "run_2",
            "status": "failed",
            "last_error": {"code": "server_error", "message": "Something went wrong."}
        }));
    });

    let run = backend(&server)
        .retrieve_run(&ConversationHandle::from("thread_9"), "run_2")
        .await
        .expect("run");

    assert_eq!(run.status, RunStatus::Failed);
    assert_eq!(
        run.last_error.as_deref(),
        Some("server_error: Something went wrong.")
    );
}

#[tokio::test]
async fn list_messages_keeps_newest_first_order_and_roles() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET)
            .path("/v1/threads/thread_9/messages")
            .query_param("order", "desc");
        then.status(200).json_body(json!({
            "data": [
                {"id": "m2", "role": "assistant", "content": [{"type": "text", "text": {"value": "Here you go"}}]},
                {"id": "m1", "role": "user", "content": [{"type": "text", "text": {"value": "hi"}}]}
            ]
        }));
    });

    let messages = backend(&server)
        .list_messages(&ConversationHandle::from("thread_9"))
        .await
        .expect("messages");

    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, MessageRole::Assistant);
    assert_eq!(messages[0].text.as_deref(), Some("Here you go"));
    assert_eq!(messages[1].role, MessageRole::User);
}

#[tokio::test]
async fn transport_errors_become_backend_errors_with_status() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/v1/threads");
        then.status(401)
            .json_body(json!({"error": {"message": "Incorrect API key provided", "code": "invalid_api_key"}}));
    });

    let error = backend(&server)
        .create_thread()
        .await
        .expect_err("unauthorized must fail");

    assert!(error.message().contains("401"), "{error}");
    assert!(error.message().contains("Incorrect API key"), "{error}");
}

#[tokio::test]
async fn cancel_run_posts_to_the_cancel_endpoint() {
    let server = MockServer::start();
    let cancel = server.mock(|when, then| {
        when.method(POST)
            .path("/v1/threads/thread_9/runs/run_3/cancel")
            .header("openai-beta", "assistants=v2");
        then.status(200)
            .json_body(json!({"id": "run_3", "status": "cancelling"}));
    });

    let run = backend(&server)
        .cancel_run(&ConversationHandle::from("thread_9"), "run_3")
        .await
        .expect("cancel");

    cancel.assert();
    assert_eq!(run.run_id, "run_3");
    assert_eq!(run.status, RunStatus::Cancelling);
}
