//! Shared fixtures: a scripted provider, an in-memory database and helpers to
//! run one turn and collect its events.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use futures_util::{stream, StreamExt};
use serde_json::{json, Value};

use paperdesk::models::{Document, Folder, ProjectSnapshot, StreamTurnRequest};
use paperdesk::services::streaming::StreamEmitter;
use paperdesk::services::{OrchestratorConfig, OrchestratorService, PromptAssembler, Stores, TurnOutcome};
use paperdesk::state::AppState;
use paperdesk::storage::Database;
use paperdesk_core::{Actor, ExecutionContext, RequestContext, StreamEvent};
use paperdesk_llm::{
    ChatChunk, ChatRequest, ChunkStream, LlmError, LlmProvider, LlmResult, ProviderFactory,
};
use paperdesk_tools::ToolRegistry;

pub const OWNER: &str = "user-1";
pub const PROJECT: &str = "project-1";
pub const MODEL: &str = "gpt-4.1";

/// One scripted provider round.
pub enum Round {
    /// Yield these items, then end the stream
    Chunks(Vec<LlmResult<ChatChunk>>),
    /// Yield these items, then never end
    ChunksThenHang(Vec<LlmResult<ChatChunk>>),
    /// Fail before the stream opens
    Refuse(LlmError),
}

/// Provider that plays back scripted rounds and records every request.
pub struct ScriptedProvider {
    rounds: Mutex<VecDeque<Round>>,
    requests: Mutex<Vec<ChatRequest>>,
    title: Mutex<Option<LlmResult<String>>>,
    title_delay: Duration,
}

impl ScriptedProvider {
    pub fn new(rounds: Vec<Round>) -> Self {
        Self {
            rounds: Mutex::new(rounds.into()),
            requests: Mutex::new(Vec::new()),
            title: Mutex::new(Some(Ok("Scripted Title".to_string()))),
            title_delay: Duration::ZERO,
        }
    }

    pub fn with_title(self, title: LlmResult<String>) -> Self {
        *self.title.lock().unwrap() = Some(title);
        self
    }

    pub fn with_title_delay(mut self, delay: Duration) -> Self {
        self.title_delay = delay;
        self
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn stream_chat(&self, request: &ChatRequest) -> LlmResult<ChunkStream> {
        self.requests.lock().unwrap().push(request.clone());
        let round = self
            .rounds
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Round::Chunks(vec![text_chunk("(script exhausted)"), finish_chunk("stop")]));
        let chunks: ChunkStream = match round {
            Round::Chunks(items) => Box::pin(stream::iter(items)),
            Round::ChunksThenHang(items) => Box::pin(stream::iter(items).chain(stream::pending())),
            Round::Refuse(err) => return Err(err),
        };
        Ok(chunks)
    }

    async fn complete(&self, _request: &ChatRequest) -> LlmResult<String> {
        if !self.title_delay.is_zero() {
            tokio::time::sleep(self.title_delay).await;
        }
        self.title
            .lock()
            .unwrap()
            .take()
            .unwrap_or_else(|| Ok("Another Title".to_string()))
    }
}

/// Factory that always hands out the same scripted provider.
pub struct ScriptedFactory {
    pub provider: Arc<ScriptedProvider>,
    pub keys: Mutex<Vec<Option<String>>>,
}

impl ScriptedFactory {
    pub fn new(provider: ScriptedProvider) -> Self {
        Self {
            provider: Arc::new(provider),
            keys: Mutex::new(Vec::new()),
        }
    }
}

impl ProviderFactory for ScriptedFactory {
    fn create(&self, user_api_key: Option<&str>) -> LlmResult<Arc<dyn LlmProvider>> {
        self.keys.lock().unwrap().push(user_api_key.map(str::to_string));
        let provider: Arc<dyn LlmProvider> = self.provider.clone();
        Ok(provider)
    }
}

// ============================================================================
// Chunk builders
// ============================================================================

pub fn chunk(value: Value) -> LlmResult<ChatChunk> {
    Ok(serde_json::from_value(value).unwrap())
}

pub fn role_chunk() -> LlmResult<ChatChunk> {
    chunk(json!({"id": "resp-1", "choices": [{"delta": {"role": "assistant"}}]}))
}

pub fn text_chunk(text: &str) -> LlmResult<ChatChunk> {
    chunk(json!({"id": "resp-1", "choices": [{"delta": {"content": text}}]}))
}

pub fn finish_chunk(reason: &str) -> LlmResult<ChatChunk> {
    chunk(json!({"id": "resp-1", "choices": [{"delta": {}, "finish_reason": reason}]}))
}

pub fn usage_chunk(prompt: u32, completion: u32) -> LlmResult<ChatChunk> {
    chunk(json!({"id": "resp-1", "choices": [], "usage": {"prompt_tokens": prompt, "completion_tokens": completion}}))
}

pub fn tool_chunk(index: usize, id: Option<&str>, name: Option<&str>, args: &str) -> LlmResult<ChatChunk> {
    let mut function = json!({"arguments": args});
    if let Some(name) = name {
        function["name"] = json!(name);
    }
    let mut call = json!({"index": index, "function": function});
    if let Some(id) = id {
        call["id"] = json!(id);
    }
    chunk(json!({"id": "resp-1", "choices": [{"delta": {"tool_calls": [call]}}]}))
}

/// A plain answer round.
pub fn answer(parts: &[&str]) -> Round {
    let mut items = vec![role_chunk()];
    items.extend(parts.iter().map(|p| text_chunk(p)));
    items.push(finish_chunk("stop"));
    Round::Chunks(items)
}

/// A round that only calls one tool.
pub fn tool_round(call_id: &str, name: &str, args: &str) -> Round {
    Round::Chunks(vec![
        role_chunk(),
        tool_chunk(0, Some(call_id), Some(name), args),
        finish_chunk("tool_calls"),
    ])
}

// ============================================================================
// Harness
// ============================================================================

pub fn project_snapshot(owner: &str, id: &str) -> ProjectSnapshot {
    ProjectSnapshot {
        id: id.to_string(),
        owner_id: owner.to_string(),
        name: "Thesis".to_string(),
        root_doc_id: "doc-main".to_string(),
        root_folder: Folder {
            name: String::new(),
            documents: vec![
                Document {
                    id: "doc-main".to_string(),
                    filepath: "main.tex".to_string(),
                    version: 1,
                    lines: vec!["\\documentclass{article}".to_string(), "X".to_string()],
                },
                Document {
                    id: "doc-bib".to_string(),
                    filepath: "refs.bib".to_string(),
                    version: 1,
                    lines: vec![
                        "@article{knuth1984,".to_string(),
                        "  title={Literate Programming}".to_string(),
                        "}".to_string(),
                    ],
                },
            ],
            folders: vec![],
        },
        instructions: "Use British spelling.".to_string(),
        updated_at: Utc::now(),
    }
}

pub struct Harness {
    pub db: Database,
    pub stores: Stores,
    pub factory: Arc<ScriptedFactory>,
    pub orchestrator: OrchestratorService,
}

impl Harness {
    pub fn new(rounds: Vec<Round>) -> Self {
        Self::with_provider(ScriptedProvider::new(rounds), ToolRegistry::new())
    }

    pub fn with_tools(rounds: Vec<Round>, tools: ToolRegistry) -> Self {
        Self::with_provider(ScriptedProvider::new(rounds), tools)
    }

    pub fn with_provider(provider: ScriptedProvider, tools: ToolRegistry) -> Self {
        Self::from_parts(Database::new_in_memory().unwrap(), provider, tools)
    }

    /// Use an existing database, e.g. one a tool registry was built against.
    pub fn from_parts(db: Database, provider: ScriptedProvider, tools: ToolRegistry) -> Self {
        let stores = AppState::stores_for(&db);
        stores.projects.upsert(&project_snapshot(OWNER, PROJECT)).unwrap();

        let factory = Arc::new(ScriptedFactory::new(provider));
        let config = OrchestratorConfig {
            title_timeout: Duration::from_secs(5),
            ..OrchestratorConfig::default()
        };
        let orchestrator = OrchestratorService::new(
            stores.clone(),
            PromptAssembler::new().unwrap(),
            Arc::new(tools),
            factory.clone(),
            config,
        );
        Self {
            db,
            stores,
            factory,
            orchestrator,
        }
    }

    pub fn provider(&self) -> &ScriptedProvider {
        &self.factory.provider
    }

    /// Run one turn for `OWNER` and collect every emitted event.
    pub async fn turn(&self, req: StreamTurnRequest) -> (TurnOutcome, Vec<StreamEvent>) {
        self.turn_with(RequestContext::for_actor(Actor::new(OWNER)), req).await
    }

    pub async fn turn_with(&self, ctx: RequestContext, req: StreamTurnRequest) -> (TurnOutcome, Vec<StreamEvent>) {
        let (mut emitter, mut rx) = StreamEmitter::channel(16, ctx.cancellation_token().clone());
        let collector = tokio::spawn(async move {
            let mut events = Vec::new();
            while let Some(event) = rx.recv().await {
                events.push(event);
            }
            events
        });

        let outcome = self.orchestrator.stream_turn(&ctx, req, &mut emitter).await;
        drop(emitter);
        (outcome, collector.await.unwrap())
    }
}

pub fn new_turn(message: &str) -> StreamTurnRequest {
    StreamTurnRequest {
        project_id: PROJECT.to_string(),
        user_message: message.to_string(),
        model_slug: MODEL.to_string(),
        ..StreamTurnRequest::default()
    }
}

pub fn follow_up(conversation_id: &str, message: &str) -> StreamTurnRequest {
    StreamTurnRequest {
        conversation_id: conversation_id.to_string(),
        ..new_turn(message)
    }
}

pub fn completed_id(outcome: &TurnOutcome) -> String {
    match outcome {
        TurnOutcome::Completed { conversation_id, .. } => conversation_id.clone(),
        other => panic!("turn did not complete: {:?}", other),
    }
}

/// Event names in order, for compact assertions.
pub fn names(events: &[StreamEvent]) -> Vec<&'static str> {
    events.iter().map(StreamEvent::event_name).collect()
}
