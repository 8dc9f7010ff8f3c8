//! Orchestrator Integration Tests
//!
//! Full turns against an in-memory database and a scripted provider:
//! event framing, persistence of both histories, branching, failures,
//! cancellation and the background title task.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};

use paperdesk::models::{ConversationKind, UserSettings, SENTINEL_TITLE};
use paperdesk::services::prompt::DEBUG_CONTENT_PLACEHOLDER;
use paperdesk::services::TurnOutcome;
use paperdesk::storage::ConversationStore;
use paperdesk_core::{
    Actor, PartKind, PartPayload, ProviderMessage, RequestContext, StreamEvent, ToolCallPhase, ToolContext,
    UserMessage,
};
use paperdesk_llm::LlmError;
use paperdesk_tools::{Tool, ToolError, ToolOutput, ToolRegistry, ToolResult};

use crate::common::*;

// ============================================================================
// Fixtures
// ============================================================================

struct WeatherTool {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl Tool for WeatherTool {
    fn name(&self) -> &str {
        "weather"
    }

    fn description(&self) -> &str {
        "Current weather for a city"
    }

    fn parameters_schema(&self) -> Value {
        json!({"type": "object", "properties": {"city": {"type": "string"}}, "required": ["city"]})
    }

    async fn execute(&self, _ctx: &ToolContext, raw_args: &str) -> ToolResult<ToolOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if raw_args.contains("Atlantis") {
            return Err(ToolError::execution("city not found"));
        }
        Ok(ToolOutput::ok("sunny"))
    }
}

/// Renames every conversation of the project while the turn is running.
struct RenamingTool {
    conversations: ConversationStore,
}

#[async_trait]
impl Tool for RenamingTool {
    fn name(&self) -> &str {
        "rename_conversation"
    }

    fn description(&self) -> &str {
        "Renames the conversation"
    }

    fn parameters_schema(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    async fn execute(&self, ctx: &ToolContext, _raw_args: &str) -> ToolResult<ToolOutput> {
        let listed = self
            .conversations
            .list(OWNER, ctx.project_id())
            .map_err(|e| ToolError::execution(e.to_string()))?;
        for conv in listed {
            self.conversations
                .rename(&conv.id, "User Chosen")
                .map_err(|e| ToolError::execution(e.to_string()))?;
        }
        Ok(ToolOutput::ok("renamed"))
    }
}

fn weather_registry() -> (ToolRegistry, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(WeatherTool { calls: calls.clone() }));
    (registry, calls)
}

fn init_conversation_id(events: &[StreamEvent]) -> String {
    match events.first() {
        Some(StreamEvent::StreamInitialization { conversation_id, .. }) => conversation_id.clone(),
        other => panic!("expected initialization first, got {:?}", other),
    }
}

fn error_kind(events: &[StreamEvent]) -> Option<String> {
    events.iter().find_map(|event| match event {
        StreamEvent::StreamError { kind, .. } => Some(kind.clone()),
        _ => None,
    })
}

/// Every part is `Begin, Chunk*, End`; every tool call is `Started, Finished`;
/// the stream ends with at most one error followed by one finalization.
fn assert_framing(events: &[StreamEvent]) {
    let mut by_id: HashMap<String, Vec<&StreamEvent>> = HashMap::new();
    for event in events {
        if let Some(id) = event.message_id() {
            by_id.entry(id.to_string()).or_default().push(event);
        }
    }

    for (id, part) in by_id {
        match part[0] {
            StreamEvent::ToolCall { .. } => {
                let phases: Vec<ToolCallPhase> = part
                    .iter()
                    .map(|e| match e {
                        StreamEvent::ToolCall { phase, .. } => *phase,
                        other => panic!("mixed events for {}: {:?}", id, other),
                    })
                    .collect();
                assert_eq!(phases, vec![ToolCallPhase::Started, ToolCallPhase::Finished], "{}", id);
            }
            _ => {
                assert!(matches!(part[0], StreamEvent::StreamPartBegin { .. }), "{} starts with {:?}", id, part[0]);
                let last = part.len() - 1;
                for middle in &part[1..last] {
                    assert!(matches!(middle, StreamEvent::MessageChunk { .. }), "{}: {:?}", id, middle);
                }
                if last > 0 {
                    assert!(
                        matches!(part[last], StreamEvent::StreamPartEnd { .. } | StreamEvent::MessageChunk { .. }),
                        "{} ends with {:?}",
                        id,
                        part[last]
                    );
                }
            }
        }
    }

    let finals = events.iter().filter(|e| e.is_terminal()).count();
    let errors = events
        .iter()
        .filter(|e| matches!(e, StreamEvent::StreamError { .. }))
        .count();
    assert!(finals <= 1);
    assert!(errors <= 1);
    if finals == 1 {
        assert!(events.last().is_some_and(StreamEvent::is_terminal));
    }
    if errors == 1 {
        assert!(matches!(events[events.len() - 2], StreamEvent::StreamError { .. }));
    }
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn test_new_conversation_without_tools() {
    let harness = Harness::new(vec![answer(&["Hi ", "there!"])]);

    let (outcome, events) = harness.turn(new_turn("Hello")).await;
    let id = completed_id(&outcome);

    assert_eq!(
        names(&events),
        vec![
            "stream_initialization",
            "stream_part_begin",
            "message_chunk",
            "message_chunk",
            "stream_part_end",
            "stream_finalization",
        ]
    );
    assert_framing(&events);
    match &events[4] {
        StreamEvent::StreamPartEnd {
            kind: PartKind::Assistant,
            payload: PartPayload::Assistant { content, .. },
            ..
        } => assert_eq!(content, "Hi there!"),
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(
        events.last(),
        Some(&StreamEvent::StreamFinalization {
            conversation_id: id.clone()
        })
    );

    let conv = harness.stores.conversations.get(OWNER, &id).unwrap();
    assert_eq!(conv.user_history.len(), 2);
    assert_eq!(conv.provider_history.len(), 3);
    match &conv.user_history[0] {
        UserMessage::User { content, .. } => assert_eq!(content, "Hello"),
        other => panic!("unexpected {:?}", other),
    }
    match &conv.user_history[1] {
        UserMessage::Assistant { content, model_slug, .. } => {
            assert_eq!(content, "Hi there!");
            assert_eq!(model_slug, MODEL);
        }
        other => panic!("unexpected {:?}", other),
    }
    match &conv.provider_history[0] {
        ProviderMessage::System { content, .. } => {
            assert!(content.contains("% File: main.tex"));
            assert!(content.contains("Use British spelling."));
        }
        other => panic!("unexpected {:?}", other),
    }
    match &conv.provider_history[1] {
        ProviderMessage::User { message_id, content } => {
            assert_eq!(message_id, conv.user_history[0].message_id());
            assert!(content.starts_with("Hello"));
        }
        other => panic!("unexpected {:?}", other),
    }
    conv.check_consistency().unwrap();

    let requests = harness.provider().requests();
    let request = &requests[0];
    assert_eq!(request.model, MODEL);
    assert_eq!(request.messages.len(), 2);
}

#[tokio::test]
async fn test_follow_up_with_tool_call() {
    let (registry, calls) = weather_registry();
    let harness = Harness::with_tools(
        vec![
            answer(&["Ask me anything."]),
            tool_round("call_nyc", "weather", r#"{"city":"NYC"}"#),
            answer(&["It is ", "sunny."]),
        ],
        registry,
    );

    let (first, _) = harness.turn(new_turn("Hi")).await;
    let id = completed_id(&first);

    let (outcome, events) = harness.turn(follow_up(&id, "Weather in NYC?")).await;
    assert_eq!(completed_id(&outcome), id);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    assert_eq!(
        names(&events),
        vec![
            "stream_initialization",
            "stream_part_begin",
            "stream_part_end",
            "stream_part_begin",
            "stream_part_end",
            "tool_call",
            "tool_call",
            "stream_part_begin",
            "message_chunk",
            "message_chunk",
            "stream_part_end",
            "stream_finalization",
        ]
    );
    assert_framing(&events);
    match &events[2] {
        StreamEvent::StreamPartEnd {
            payload: PartPayload::Assistant { content, .. },
            ..
        } => assert_eq!(content, ""),
        other => panic!("unexpected {:?}", other),
    }
    match &events[4] {
        StreamEvent::StreamPartEnd {
            kind: PartKind::ToolCallPrepare,
            payload: PartPayload::ToolCallPrepare { call_id, name, arguments },
            ..
        } => {
            assert_eq!(call_id, "call_nyc");
            assert_eq!(name, "weather");
            assert_eq!(arguments, r#"{"city":"NYC"}"#);
        }
        other => panic!("unexpected {:?}", other),
    }
    let tool_message_id = match &events[6] {
        StreamEvent::ToolCall {
            message_id,
            phase: ToolCallPhase::Finished,
            result,
            ..
        } => {
            assert!(message_id.starts_with("toolCall_"));
            assert_eq!(result.as_deref(), Some("sunny"));
            message_id.clone()
        }
        other => panic!("unexpected {:?}", other),
    };

    let conv = harness.stores.conversations.get(OWNER, &id).unwrap();
    // Hi, answer, Weather?, tool, answer
    assert_eq!(conv.user_history.len(), 5);
    assert_eq!(conv.user_history[3].message_id(), tool_message_id);
    // system + 5 user-side records + one extra for the tool pair
    assert_eq!(conv.provider_history.len(), 7);
    match (&conv.provider_history[4], &conv.provider_history[5]) {
        (
            ProviderMessage::ToolRequest { call_id: request_id, .. },
            ProviderMessage::ToolResult { call_id: result_id, content, .. },
        ) => {
            assert_eq!(request_id, "call_nyc");
            assert_eq!(result_id, "call_nyc");
            assert_eq!(content, "sunny");
        }
        other => panic!("unexpected {:?}", other),
    }
    conv.check_consistency().unwrap();

    // The answering round sees the tool pair.
    let requests = harness.provider().requests();
    assert_eq!(requests.len(), 3);
    assert_eq!(requests[2].messages.len(), 6);
    assert_eq!(requests[2].tools.len(), 1);
}

#[tokio::test]
async fn test_provider_call_ids_reused_across_turns() {
    let (registry, calls) = weather_registry();
    let harness = Harness::with_tools(
        vec![
            tool_round("call_0", "weather", r#"{"city":"Paris"}"#),
            answer(&["Sunny in Paris."]),
            tool_round("call_0", "weather", r#"{"city":"Rome"}"#),
            answer(&["Sunny in Rome."]),
        ],
        registry,
    );

    let (first, _) = harness.turn(new_turn("Paris?")).await;
    let id = completed_id(&first);
    let (second, events) = harness.turn(follow_up(&id, "Rome?")).await;
    assert_eq!(completed_id(&second), id);
    assert_eq!(error_kind(&events), None);
    assert_framing(&events);
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    let conv = harness.stores.conversations.get(OWNER, &id).unwrap();
    let tool_ids: Vec<&str> = conv
        .user_history
        .iter()
        .filter(|m| matches!(m, UserMessage::ToolCall { .. }))
        .map(UserMessage::message_id)
        .collect();
    assert_eq!(tool_ids.len(), 2);
    assert_ne!(tool_ids[0], tool_ids[1]);
    let provider_call_ids: Vec<&str> = conv
        .provider_history
        .iter()
        .filter_map(|m| match m {
            ProviderMessage::ToolRequest { call_id, .. } => Some(call_id.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(provider_call_ids, vec!["call_0", "call_0"]);
    conv.check_consistency().unwrap();
}

#[tokio::test]
async fn test_provider_call_id_repeated_within_one_round() {
    let (registry, calls) = weather_registry();
    let harness = Harness::with_tools(
        vec![
            Round::Chunks(vec![
                role_chunk(),
                tool_chunk(0, Some("call_x"), Some("weather"), r#"{"city":"Paris"}"#),
                tool_chunk(1, Some("call_x"), Some("weather"), r#"{"city":"Rome"}"#),
                finish_chunk("tool_calls"),
            ]),
            answer(&["Both sunny."]),
        ],
        registry,
    );

    let (outcome, events) = harness.turn(new_turn("Paris and Rome?")).await;
    let id = completed_id(&outcome);
    assert_framing(&events);
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    let conv = harness.stores.conversations.get(OWNER, &id).unwrap();
    assert_eq!(
        conv.user_history
            .iter()
            .filter(|m| matches!(m, UserMessage::ToolCall { .. }))
            .count(),
        2
    );
    conv.check_consistency().unwrap();
}

#[tokio::test]
async fn test_text_around_tool_calls_is_persisted_per_part() {
    let (registry, _) = weather_registry();
    let harness = Harness::with_tools(
        vec![
            Round::Chunks(vec![
                role_chunk(),
                text_chunk("Checking."),
                tool_chunk(0, Some("call_w"), Some("weather"), r#"{"city":"Oslo"}"#),
                text_chunk("One moment."),
                finish_chunk("tool_calls"),
            ]),
            answer(&["Sunny in Oslo."]),
        ],
        registry,
    );

    let (outcome, events) = harness.turn(new_turn("Oslo?")).await;
    let id = completed_id(&outcome);
    assert_framing(&events);

    let streamed: Vec<(String, String)> = events
        .iter()
        .filter_map(|e| match e {
            StreamEvent::StreamPartEnd {
                message_id,
                payload: PartPayload::Assistant { content, .. },
                ..
            } => Some((message_id.clone(), content.clone())),
            _ => None,
        })
        .collect();
    assert_eq!(streamed.len(), 3);

    let conv = harness.stores.conversations.get(OWNER, &id).unwrap();
    let stored: Vec<(String, String)> = conv
        .user_history
        .iter()
        .filter_map(|m| match m {
            UserMessage::Assistant {
                message_id, content, ..
            } => Some((message_id.clone(), content.clone())),
            _ => None,
        })
        .collect();
    assert_eq!(stored, streamed);
    assert_eq!(stored[0].1, "Checking.");
    assert_eq!(stored[1].1, "One moment.");
    conv.check_consistency().unwrap();
}

#[tokio::test]
async fn test_tool_failure_is_fed_back_to_the_model() {
    let (registry, _) = weather_registry();
    let harness = Harness::with_tools(
        vec![
            tool_round("call_a", "weather", r#"{"city":"Atlantis"}"#),
            answer(&["I could not find that city."]),
        ],
        registry,
    );

    let (outcome, events) = harness.turn(new_turn("Weather in Atlantis?")).await;
    let id = completed_id(&outcome);
    assert!(error_kind(&events).is_none());

    let conv = harness.stores.conversations.get(OWNER, &id).unwrap();
    match &conv.provider_history[3] {
        ProviderMessage::ToolResult { content, .. } => {
            assert!(content.starts_with("Error: "), "{}", content);
            assert!(content.contains("city not found"));
        }
        other => panic!("unexpected {:?}", other),
    }
    match &conv.user_history[1] {
        UserMessage::ToolCall { result, error, .. } => {
            assert!(result.is_none());
            assert!(error.is_some());
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test]
async fn test_branch_edit_rewinds_before_append() {
    let harness = Harness::new(vec![
        answer(&["a1"]),
        answer(&["a2"]),
        answer(&["a3"]),
        Round::Refuse(LlmError::NetworkError {
            message: "gateway down".to_string(),
        }),
    ]);

    let (first, _) = harness.turn(new_turn("m1")).await;
    let id = completed_id(&first);
    harness.turn(follow_up(&id, "m2")).await;
    harness.turn(follow_up(&id, "m3")).await;

    let conv = harness.stores.conversations.get(OWNER, &id).unwrap();
    assert_eq!(conv.user_history.len(), 6);
    let m1 = conv.user_history[0].clone();

    let mut req = follow_up(&id, "alt");
    req.parent_message_id = m1.message_id().to_string();
    let (outcome, events) = harness.turn(req).await;
    assert!(matches!(outcome, TurnOutcome::Failed { kind: "provider_error" }));
    assert_framing(&events);

    let conv = harness.stores.conversations.get(OWNER, &id).unwrap();
    assert_eq!(conv.user_history.len(), 2);
    assert_eq!(conv.user_history[0], m1);
    match &conv.user_history[1] {
        UserMessage::User { content, .. } => assert_eq!(content, "alt"),
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(conv.provider_history.len(), 3);
    assert!(conv.provider_history[0].is_system());
    assert_eq!(conv.provider_history[1].message_id(), m1.message_id());
    conv.check_consistency().unwrap();
}

#[tokio::test]
async fn test_branch_from_root_keeps_only_the_new_message() {
    let harness = Harness::new(vec![answer(&["a1"]), answer(&["a2"])]);
    let (first, _) = harness.turn(new_turn("m1")).await;
    let id = completed_id(&first);

    let mut req = follow_up(&id, "fresh start");
    req.parent_message_id = "root".to_string();
    let (outcome, _) = harness.turn(req).await;
    completed_id(&outcome);

    let conv = harness.stores.conversations.get(OWNER, &id).unwrap();
    assert_eq!(conv.user_history.len(), 2);
    assert_eq!(conv.provider_history.len(), 3);
    match &conv.user_history[0] {
        UserMessage::User { content, .. } => assert_eq!(content, "fresh start"),
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test]
async fn test_unknown_parent_is_rejected_without_changes() {
    let harness = Harness::new(vec![answer(&["a1"])]);
    let (first, _) = harness.turn(new_turn("m1")).await;
    let id = completed_id(&first);

    let mut req = follow_up(&id, "alt");
    req.parent_message_id = "user_doesnotexist".to_string();
    let (outcome, events) = harness.turn(req).await;

    assert!(matches!(outcome, TurnOutcome::Failed { kind: "bad_request" }));
    assert_eq!(names(&events), vec!["stream_error", "stream_finalization"]);
    let conv = harness.stores.conversations.get(OWNER, &id).unwrap();
    assert_eq!(conv.user_history.len(), 2);
}

#[tokio::test]
async fn test_stale_project_is_rejected_before_any_write() {
    let harness = Harness::new(vec![answer(&["never"])]);
    let mut project = project_snapshot(OWNER, PROJECT);
    project.updated_at = Utc::now() - chrono::Duration::hours(2);
    harness.stores.projects.upsert(&project).unwrap();

    let (outcome, events) = harness.turn(new_turn("Hello")).await;

    assert!(matches!(outcome, TurnOutcome::Failed { kind: "project_out_of_date" }));
    assert_eq!(names(&events), vec!["stream_error", "stream_finalization"]);
    assert_eq!(error_kind(&events).as_deref(), Some("project_out_of_date"));
    assert!(harness.stores.conversations.list(OWNER, PROJECT).unwrap().is_empty());
    assert!(harness.provider().requests().is_empty());
}

#[tokio::test]
async fn test_missing_project_is_out_of_date() {
    let harness = Harness::new(vec![]);
    let mut req = new_turn("Hello");
    req.project_id = "project-unknown".to_string();

    let (_, events) = harness.turn(req).await;
    assert_eq!(error_kind(&events).as_deref(), Some("project_out_of_date"));
}

#[tokio::test]
async fn test_provider_failure_mid_stream() {
    let harness = Harness::new(vec![Round::Chunks(vec![
        role_chunk(),
        text_chunk("Hel"),
        Err(LlmError::NetworkError {
            message: "connection reset".to_string(),
        }),
    ])]);

    let (outcome, events) = harness.turn(new_turn("Hello")).await;
    assert!(matches!(outcome, TurnOutcome::Failed { kind: "provider_error" }));
    assert_eq!(
        names(&events),
        vec![
            "stream_initialization",
            "stream_part_begin",
            "message_chunk",
            "stream_error",
            "stream_finalization",
        ]
    );
    assert_framing(&events);

    let id = init_conversation_id(&events);
    let conv = harness.stores.conversations.get(OWNER, &id).unwrap();
    assert_eq!(conv.user_history.len(), 1);
    assert_eq!(conv.provider_history.len(), 2);
    assert!(matches!(conv.user_history[0], UserMessage::User { .. }));
}

#[tokio::test]
async fn test_anonymous_request_is_invalid_actor() {
    let harness = Harness::new(vec![]);
    let (outcome, events) = harness.turn_with(RequestContext::anonymous(), new_turn("Hello")).await;

    assert!(matches!(outcome, TurnOutcome::Failed { kind: "invalid_actor" }));
    assert_eq!(names(&events), vec!["stream_error", "stream_finalization"]);
}

#[tokio::test]
async fn test_missing_user_message_is_bad_request() {
    let harness = Harness::new(vec![]);
    let (_, events) = harness.turn(new_turn("   ")).await;
    assert_eq!(error_kind(&events).as_deref(), Some("bad_request"));
}

#[tokio::test]
async fn test_conversation_of_another_owner_is_not_found() {
    let harness = Harness::new(vec![answer(&["a1"])]);
    let (first, _) = harness.turn(new_turn("m1")).await;
    let id = completed_id(&first);

    harness
        .stores
        .projects
        .upsert(&project_snapshot("user-2", "project-2"))
        .unwrap();
    let mut req = follow_up(&id, "hijack");
    req.project_id = "project-2".to_string();
    let ctx = RequestContext::for_actor(Actor::new("user-2"));
    let (_, events) = harness.turn_with(ctx, req).await;

    assert_eq!(error_kind(&events).as_deref(), Some("record_not_found"));
    let conv = harness.stores.conversations.get(OWNER, &id).unwrap();
    assert_eq!(conv.user_history.len(), 2);
}

#[tokio::test]
async fn test_conversation_of_another_project_is_bad_request() {
    let harness = Harness::new(vec![answer(&["a1"])]);
    let (first, _) = harness.turn(new_turn("m1")).await;
    let id = completed_id(&first);

    harness.stores.projects.upsert(&project_snapshot(OWNER, "project-b")).unwrap();
    let mut req = follow_up(&id, "wrong project");
    req.project_id = "project-b".to_string();
    let (_, events) = harness.turn(req).await;
    assert_eq!(error_kind(&events).as_deref(), Some("bad_request"));
}

// ============================================================================
// Properties
// ============================================================================

#[tokio::test]
async fn test_histories_stay_aligned_across_turns() {
    let (registry, _) = weather_registry();
    let harness = Harness::with_tools(
        vec![
            answer(&["one"]),
            tool_round("call_1", "weather", r#"{"city":"Oslo"}"#),
            answer(&["cold"]),
            answer(&["three"]),
        ],
        registry,
    );

    let (first, _) = harness.turn(new_turn("t1")).await;
    let id = completed_id(&first);
    harness.turn(follow_up(&id, "t2")).await;
    harness.turn(follow_up(&id, "t3")).await;

    let conv = harness.stores.conversations.get(OWNER, &id).unwrap();
    let tool_records = conv
        .user_history
        .iter()
        .filter(|m| matches!(m, UserMessage::ToolCall { .. }))
        .count();
    assert_eq!(tool_records, 1);
    assert_eq!(conv.provider_history.len(), conv.user_history.len() + 1 + tool_records);

    let mut ids: Vec<&str> = conv.user_history.iter().map(UserMessage::message_id).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), conv.user_history.len());
    conv.check_consistency().unwrap();
}

#[tokio::test]
async fn test_malformed_tool_arguments_are_not_dispatched() {
    let (registry, calls) = weather_registry();
    let harness = Harness::with_tools(
        vec![Round::Chunks(vec![
            role_chunk(),
            tool_chunk(0, Some("call_bad"), Some("weather"), r#"{"city": "#),
            finish_chunk("tool_calls"),
        ])],
        registry,
    );

    let (outcome, events) = harness.turn(new_turn("Weather?")).await;
    let id = completed_id(&outcome);

    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(!events.iter().any(|e| matches!(e, StreamEvent::ToolCall { .. })));
    assert_framing(&events);

    let conv = harness.stores.conversations.get(OWNER, &id).unwrap();
    assert_eq!(conv.user_history.len(), 1);
    assert_eq!(conv.provider_history.len(), 2);
}

#[tokio::test]
async fn test_fragmented_tool_arguments_dispatch_once_complete() {
    let (registry, calls) = weather_registry();
    let harness = Harness::with_tools(
        vec![
            Round::Chunks(vec![
                role_chunk(),
                tool_chunk(0, Some("call_frag"), Some("weather"), r#"{"ci"#),
                tool_chunk(0, None, None, r#"ty":"Paris"#),
                tool_chunk(0, None, None, r#""}"#),
                finish_chunk("tool_calls"),
            ]),
            answer(&["Mild."]),
        ],
        registry,
    );

    let (outcome, _) = harness.turn(new_turn("Weather in Paris?")).await;
    let id = completed_id(&outcome);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let conv = harness.stores.conversations.get(OWNER, &id).unwrap();
    match &conv.provider_history[2] {
        ProviderMessage::ToolRequest { arguments, .. } => assert_eq!(arguments, r#"{"city":"Paris"}"#),
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test]
async fn test_cancellation_keeps_history_consistent() {
    let harness = Harness::new(vec![Round::ChunksThenHang(vec![role_chunk(), text_chunk("partial")])]);
    let ctx = RequestContext::for_actor(Actor::new(OWNER));

    let canceller = ctx.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        canceller.cancel();
    });

    let (outcome, events) = harness.turn_with(ctx, new_turn("Hello")).await;
    assert!(matches!(outcome, TurnOutcome::Cancelled));
    assert!(!events.iter().any(StreamEvent::is_terminal));
    assert!(error_kind(&events).is_none());

    let id = init_conversation_id(&events);
    let conv = harness.stores.conversations.get(OWNER, &id).unwrap();
    assert_eq!(conv.user_history.len(), 1);
    assert_eq!(conv.provider_history.len(), 2);
    assert_eq!(conv.title, SENTINEL_TITLE);
    conv.check_consistency().unwrap();
}

#[tokio::test]
async fn test_tool_loop_is_bounded() {
    let (registry, _) = weather_registry();
    let rounds = (0..25)
        .map(|i| tool_round(&format!("call_{}", i), "weather", r#"{"city":"Rome"}"#))
        .collect();
    let harness = Harness::with_tools(rounds, registry);

    let (outcome, events) = harness.turn(new_turn("Loop forever")).await;
    assert!(matches!(outcome, TurnOutcome::Failed { kind: "invalid_llm_response" }));
    assert_eq!(error_kind(&events).as_deref(), Some("invalid_llm_response"));
    assert_eq!(harness.provider().requests().len(), 20);
}

// ============================================================================
// Prompts, settings and bookkeeping
// ============================================================================

#[tokio::test]
async fn test_system_prompt_is_refreshed_on_follow_up() {
    let harness = Harness::new(vec![answer(&["a1"]), answer(&["a2"])]);
    let (first, _) = harness.turn(new_turn("m1")).await;
    let id = completed_id(&first);
    let before = harness.stores.conversations.get(OWNER, &id).unwrap();

    let mut project = project_snapshot(OWNER, PROJECT);
    project.instructions = "Prefer the Oxford comma.".to_string();
    harness.stores.projects.upsert(&project).unwrap();
    harness.turn(follow_up(&id, "m2")).await;

    let after = harness.stores.conversations.get(OWNER, &id).unwrap();
    assert_eq!(
        after.provider_history[0].message_id(),
        before.provider_history[0].message_id()
    );
    match &after.provider_history[0] {
        ProviderMessage::System { content, .. } => {
            assert!(content.contains("Prefer the Oxford comma."));
            assert!(!content.contains("Use British spelling."));
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test]
async fn test_debug_conversation_skips_project_content() {
    let harness = Harness::new(vec![answer(&["debugging"])]);
    let mut req = new_turn("What would you do?");
    req.kind = ConversationKind::Debug;
    req.project_id = "project-without-snapshot".to_string();

    let (outcome, _) = harness.turn(req).await;
    completed_id(&outcome);

    let requests = harness.provider().requests();
    let request = &requests[0];
    match &request.messages[0] {
        ProviderMessage::System { content, .. } => {
            assert!(content.contains(DEBUG_CONTENT_PLACEHOLDER));
            assert!(!content.contains("% File:"));
        }
        other => panic!("unexpected {:?}", other),
    }
    match &request.messages[1] {
        ProviderMessage::User { content, .. } => assert!(content.starts_with("[debug]")),
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test]
async fn test_user_settings_reach_provider_and_prompt() {
    let harness = Harness::new(vec![answer(&["ok"])]);
    harness
        .stores
        .users
        .put_settings(
            OWNER,
            &UserSettings {
                openai_api_key: Some("sk-user-key-1234".to_string()),
                instructions: "Always answer in French.".to_string(),
            },
        )
        .unwrap();

    harness.turn(new_turn("Hello")).await;

    let keys = harness.factory.keys.lock().unwrap().clone();
    assert_eq!(keys, vec![Some("sk-user-key-1234".to_string())]);
    match &harness.provider().requests()[0].messages[0] {
        ProviderMessage::System { content, .. } => assert!(content.contains("Always answer in French.")),
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test]
async fn test_usage_is_recorded_per_round() {
    let harness = Harness::new(vec![Round::Chunks(vec![
        role_chunk(),
        text_chunk("done"),
        finish_chunk("stop"),
        usage_chunk(120, 7),
    ])]);

    let (outcome, _) = harness.turn(new_turn("Hello")).await;
    let id = completed_id(&outcome);

    let records = harness.stores.usage.for_conversation(&id).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].prompt_tokens, 120);
    assert_eq!(records[0].completion_tokens, 7);
    assert_eq!(records[0].model_slug, MODEL);
    assert_eq!(harness.stores.usage.totals(OWNER).unwrap().rounds, 1);
}

#[tokio::test]
async fn test_length_limit_emits_incomplete_indicator() {
    let harness = Harness::new(vec![Round::Chunks(vec![
        role_chunk(),
        text_chunk("Truncated ans"),
        finish_chunk("length"),
    ])]);

    let (outcome, events) = harness.turn(new_turn("Write a lot")).await;
    completed_id(&outcome);
    let names = names(&events);
    assert_eq!(names[names.len() - 2], "incomplete_indicator");
    assert_framing(&events);
}

#[tokio::test]
async fn test_reasoning_is_streamed_and_persisted() {
    let harness = Harness::new(vec![Round::Chunks(vec![
        role_chunk(),
        chunk(json!({"id": "resp-1", "choices": [{"delta": {"reasoning_content": "Think first."}}]})),
        text_chunk("Answer."),
        finish_chunk("stop"),
    ])]);

    let (outcome, events) = harness.turn(new_turn("Why?")).await;
    let id = completed_id(&outcome);
    assert!(events.iter().any(|e| matches!(
        e,
        StreamEvent::StreamPartBegin {
            kind: PartKind::Reasoning,
            ..
        }
    )));
    assert_framing(&events);

    let conv = harness.stores.conversations.get(OWNER, &id).unwrap();
    match &conv.user_history[1] {
        UserMessage::Assistant { reasoning, content, .. } => {
            assert_eq!(reasoning.as_deref(), Some("Think first."));
            assert_eq!(content, "Answer.");
        }
        other => panic!("unexpected {:?}", other),
    }
}

// ============================================================================
// Title task
// ============================================================================

#[tokio::test]
async fn test_title_is_generated_after_first_turn() {
    let provider = ScriptedProvider::new(vec![answer(&["Sure."]), answer(&["Again."])])
        .with_title(Ok("\"Fixing the Abstract\"\n".to_string()));
    let harness = Harness::with_provider(provider, ToolRegistry::new());

    let (outcome, _) = harness.turn(new_turn("Fix my abstract")).await;
    let TurnOutcome::Completed {
        conversation_id,
        title_task: Some(task),
    } = outcome
    else {
        panic!("expected a title task");
    };
    task.await.unwrap();

    let conv = harness.stores.conversations.get(OWNER, &conversation_id).unwrap();
    assert_eq!(conv.title, "Fixing the Abstract");

    // A titled conversation does not start another task.
    let (second, _) = harness.turn(follow_up(&conversation_id, "more")).await;
    assert!(matches!(second, TurnOutcome::Completed { title_task: None, .. }));
}

#[tokio::test]
async fn test_rename_during_turn_is_kept() {
    let db = paperdesk::storage::Database::new_in_memory().unwrap();
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(RenamingTool {
        conversations: ConversationStore::new(db.clone()),
    }));
    let harness = Harness::from_parts(
        db,
        ScriptedProvider::new(vec![tool_round("call_r", "rename_conversation", "{}"), answer(&["Done."])]),
        registry,
    );

    let (outcome, events) = harness.turn(new_turn("Call this one something")).await;
    assert_framing(&events);
    let TurnOutcome::Completed {
        conversation_id,
        title_task,
    } = outcome
    else {
        panic!("turn did not complete");
    };
    assert!(title_task.is_none());

    let conv = harness.stores.conversations.get(OWNER, &conversation_id).unwrap();
    assert_eq!(conv.title, "User Chosen");
    assert_eq!(conv.user_history.len(), 3);
}

#[tokio::test]
async fn test_title_failure_keeps_sentinel() {
    let provider = ScriptedProvider::new(vec![answer(&["Sure."])]).with_title(Err(LlmError::RateLimited {
        message: "slow down".to_string(),
    }));
    let harness = Harness::with_provider(provider, ToolRegistry::new());

    let (outcome, _) = harness.turn(new_turn("Hello")).await;
    let TurnOutcome::Completed {
        conversation_id,
        title_task: Some(task),
    } = outcome
    else {
        panic!("expected a title task");
    };
    task.await.unwrap();

    let conv = harness.stores.conversations.get(OWNER, &conversation_id).unwrap();
    assert_eq!(conv.title, SENTINEL_TITLE);
}
