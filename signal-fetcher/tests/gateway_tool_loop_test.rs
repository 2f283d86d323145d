/// Gateway integration tests
///
/// These tests drive `LlmGateway` through a scripted backend and verify:
/// - The search tool loop and pass-through echo
/// - The tool round cap
/// - Error-shaped results on every failure path
/// - Template selection
use serde_json::json;
use signal_fetcher::llm::prompts;
use signal_fetcher::llm::{ChatMessage, GatewayError, LlmGateway};
use signal_fetcher::testkit::{ScriptedBackend, ScriptedReply};
use std::sync::Arc;

fn gateway(backend: &Arc<ScriptedBackend>) -> LlmGateway {
    LlmGateway::new(backend.clone())
}

#[tokio::test]
async fn test_plain_completion() {
    let backend = Arc::new(
        ScriptedBackend::new().on("hello", vec![ScriptedReply::json(json!({"greeting": "hi"}))]),
    );

    let value = gateway(&backend).complete("hello", "sys").await;
    assert_eq!(value, json!({"greeting": "hi"}));
    assert_eq!(backend.call_count(), 1);
}

#[tokio::test]
async fn test_tool_call_is_echoed_back() {
    let backend = Arc::new(ScriptedBackend::new().on(
        "AAPL",
        vec![
            ScriptedReply::search(r#"{"query": "AAPL price"}"#),
            ScriptedReply::json(json!({"asset": "AAPL"})),
        ],
    ));

    let value = gateway(&backend).complete("AAPL today", "sys").await;
    assert_eq!(value, json!({"asset": "AAPL"}));

    let calls = backend.calls();
    assert_eq!(calls.len(), 2);

    // second turn carries the assistant tool request and the echoed result
    let second = &calls[1];
    assert_eq!(second.len(), 4);
    assert!(matches!(&second[2], ChatMessage::Assistant { tool_calls, .. } if tool_calls.len() == 1));
    match &second[3] {
        ChatMessage::Tool {
            tool_call_id,
            content,
        } => {
            assert_eq!(tool_call_id, "call_0");
            assert_eq!(content, r#"{"query":"AAPL price"}"#);
        }
        other => panic!("expected tool message, got {:?}", other),
    }
}

#[tokio::test]
async fn test_tool_loop_cap() {
    let backend = Arc::new(
        ScriptedBackend::new().on("loop", vec![ScriptedReply::search(r#"{"query": "again"}"#)]),
    );
    let gateway = gateway(&backend).with_max_tool_rounds(3);

    let result = gateway.try_complete("loop forever", "sys").await;
    assert_eq!(result, Err(GatewayError::ToolLoopExceeded(3)));
    // three tool rounds plus the turn that tripped the cap
    assert_eq!(backend.call_count(), 4);

    let value = gateway.complete("loop forever", "sys").await;
    assert!(value["error"].as_str().unwrap().contains("exceeded 3 rounds"));
}

#[tokio::test]
async fn test_default_cap_is_eight() {
    let backend = Arc::new(
        ScriptedBackend::new().on("loop", vec![ScriptedReply::search(r#"{"q": 1}"#)]),
    );

    let result = gateway(&backend).try_complete("loop", "sys").await;
    assert_eq!(result, Err(GatewayError::ToolLoopExceeded(8)));
    assert_eq!(backend.call_count(), 9);
}

#[tokio::test]
async fn test_failures_become_error_values() {
    let backend = Arc::new(
        ScriptedBackend::new()
            .on("transport", vec![ScriptedReply::fail("connection reset")])
            .on("prose", vec![ScriptedReply::text("Sure! Here is the data")])
            .on("badtool", vec![ScriptedReply::search("{not json")]),
    );
    let gateway = gateway(&backend);

    let transport = gateway.complete("transport", "sys").await;
    assert!(transport["error"].as_str().unwrap().contains("connection reset"));

    let prose = gateway.complete("prose", "sys").await;
    assert!(prose.get("error").is_some());

    let bad_tool = gateway.try_complete("badtool", "sys").await;
    assert!(matches!(
        bad_tool,
        Err(GatewayError::MalformedToolArguments { .. })
    ));
}

#[tokio::test]
async fn test_empty_prompt_rejected_without_backend_call() {
    let backend = Arc::new(ScriptedBackend::new());

    let result = gateway(&backend).try_complete("   ", "sys").await;
    assert_eq!(result, Err(GatewayError::EmptyPrompt));
    assert_eq!(backend.call_count(), 0);
}

#[tokio::test]
async fn test_template_selects_system_prompt() {
    let backend = Arc::new(ScriptedBackend::new().with_fallback(ScriptedReply::json(json!({}))));
    let gateway = gateway(&backend);

    gateway.complete_with_template("q", prompts::STOCK_ANALYZER).await;
    gateway.complete_with_template("q", "no_such_template").await;

    let calls = backend.calls();
    assert_eq!(
        calls[0][0],
        ChatMessage::System(prompts::system_prompt(prompts::STOCK_ANALYZER).to_string())
    );
    assert_eq!(
        calls[1][0],
        ChatMessage::System(prompts::system_prompt(prompts::DEFAULT_TEMPLATE).to_string())
    );
}
