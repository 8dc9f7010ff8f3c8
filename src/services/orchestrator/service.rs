//! Orchestrator Service
//!
//! Drives one conversation turn: preflight, conversation preparation, the
//! streaming tool-calling loop, persistence and the background title task.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures_util::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use paperdesk_core::{Actor, ExecutionContext, ProviderMessage, RequestContext, UserMessage};
use paperdesk_llm::{ChatCompletionsDemuxer, ChatRequest, LlmProvider, ProviderFactory, TurnOutput};
use paperdesk_tools::ToolRegistry;

use crate::models::{Conversation, ConversationKind, ServerConfig, StreamTurnRequest};
use crate::services::orchestrator::branch::apply_branch;
use crate::services::orchestrator::dispatcher::dispatch_tool_calls;
use crate::services::orchestrator::title::{render_dialog, TitleJob};
use crate::services::orchestrator::TurnError;
use crate::services::prompt::PromptAssembler;
use crate::services::streaming::StreamEmitter;
use crate::storage::{ConversationStore, ProjectStore, UsageRecord, UsageStore, UserStore};
use crate::utils::error::{AppError, AppResult};

/// Upper bound on provider rounds in one turn.
pub const MAX_TOOL_ROUNDS: usize = 20;

/// Tunables of the orchestrator
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub project_stale_after: Duration,
    pub title_timeout: Duration,
    pub title_model_slug: String,
    pub max_tool_rounds: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self::from(&ServerConfig::default())
    }
}

impl From<&ServerConfig> for OrchestratorConfig {
    fn from(config: &ServerConfig) -> Self {
        Self {
            project_stale_after: config.project_stale_after(),
            title_timeout: config.title_timeout(),
            title_model_slug: config.conversation.title_model_slug.clone(),
            max_tool_rounds: MAX_TOOL_ROUNDS,
        }
    }
}

/// Stores the orchestrator reads and writes
#[derive(Debug, Clone)]
pub struct Stores {
    pub conversations: ConversationStore,
    pub projects: ProjectStore,
    pub users: UserStore,
    pub usage: UsageStore,
}

/// How a turn ended
#[derive(Debug)]
pub enum TurnOutcome {
    /// Persisted and finalized. Carries the title task when one was started.
    Completed {
        conversation_id: String,
        title_task: Option<JoinHandle<()>>,
    },
    /// `StreamError` and `StreamFinalization` were emitted
    Failed { kind: &'static str },
    /// The client went away; nothing was finalized
    Cancelled,
}

/// Everything preflight resolves before the conversation is touched
struct Preflight {
    actor: Actor,
    system_prompt: String,
    user_prompt: String,
    provider: Arc<dyn LlmProvider>,
}

/// The conversation turn orchestrator
pub struct OrchestratorService {
    stores: Stores,
    prompts: PromptAssembler,
    tools: Arc<ToolRegistry>,
    providers: Arc<dyn ProviderFactory>,
    config: OrchestratorConfig,
}

impl OrchestratorService {
    pub fn new(
        stores: Stores,
        prompts: PromptAssembler,
        tools: Arc<ToolRegistry>,
        providers: Arc<dyn ProviderFactory>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            stores,
            prompts,
            tools,
            providers,
            config,
        }
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Run one turn, emitting every event through `emitter`.
    pub async fn stream_turn(
        &self,
        ctx: &RequestContext,
        req: StreamTurnRequest,
        emitter: &mut StreamEmitter,
    ) -> TurnOutcome {
        let preflight = match self.preflight(ctx, &req) {
            Ok(preflight) => preflight,
            Err(e) => return self.fail(emitter, &req.conversation_id, e).await,
        };

        if ctx.is_cancelled() {
            return TurnOutcome::Cancelled;
        }
        let mut conv = match self.prepare(&preflight, &req) {
            Ok(conv) => conv,
            Err(e) => return self.fail(emitter, &req.conversation_id, e).await,
        };

        info!(
            "[Orchestrator] turn started: conversation={} user={} model={}",
            conv.id, preflight.actor.user_id, req.model_slug
        );

        if emitter.initialize(&conv.id, &req.model_slug).await.is_err() {
            info!("[Orchestrator] client gone before initialization of {}", conv.id);
            return TurnOutcome::Cancelled;
        }

        match self.run_loop(ctx, &req, &preflight, &mut conv, emitter).await {
            Ok(()) => self.finalize(ctx, &preflight, conv, emitter).await,
            Err(TurnError::Cancelled) => {
                info!("[Orchestrator] turn cancelled: conversation={}", conv.id);
                TurnOutcome::Cancelled
            }
            Err(TurnError::Failed(e)) => {
                warn!("[Orchestrator] turn failed: conversation={} error={}", conv.id, e);
                self.fail(emitter, &conv.id, e).await
            }
        }
    }

    fn preflight(&self, ctx: &RequestContext, req: &StreamTurnRequest) -> AppResult<Preflight> {
        let actor = ctx.require_actor()?.clone();
        req.validate().map_err(AppError::bad_request)?;

        let (full_content, project_instructions) = match req.kind {
            ConversationKind::Debug => (String::new(), String::new()),
            ConversationKind::Default => {
                let project = match self.stores.projects.get(&actor.user_id, &req.project_id) {
                    Ok(project) => project,
                    Err(AppError::NotFound(_)) => {
                        return Err(AppError::project_out_of_date(format!(
                            "no snapshot for project {}",
                            req.project_id
                        )))
                    }
                    Err(e) => return Err(e),
                };
                if project.is_out_of_date(Utc::now(), self.config.project_stale_after) {
                    return Err(AppError::project_out_of_date(format!(
                        "snapshot of project {} is older than {:?}",
                        req.project_id, self.config.project_stale_after
                    )));
                }
                (project.full_content(), project.instructions)
            }
        };

        let settings = self.stores.users.get_settings(&actor.user_id)?;
        let system_prompt =
            self.prompts
                .build_system_prompt(&full_content, &project_instructions, &settings.instructions, req.kind);
        let user_prompt =
            self.prompts
                .build_user_prompt(&req.user_message, &req.selected_text, &req.surrounding, req.kind);
        let provider = self.providers.create(settings.api_key_override())?;

        Ok(Preflight {
            actor,
            system_prompt,
            user_prompt,
            provider,
        })
    }

    /// Create or load the conversation, branch, and persist the new user turn.
    fn prepare(&self, preflight: &Preflight, req: &StreamTurnRequest) -> AppResult<Conversation> {
        let user_message = UserMessage::user(
            req.user_message.clone(),
            Some(req.selected_text.clone()),
            Some(req.surrounding.clone()),
        );
        let provider_message = ProviderMessage::User {
            message_id: user_message.message_id().to_string(),
            content: preflight.user_prompt.clone(),
        };
        let owner = &preflight.actor.user_id;

        if req.is_new_conversation() {
            return self.stores.conversations.create(
                owner,
                &req.project_id,
                &req.model_slug,
                vec![user_message],
                vec![ProviderMessage::system(preflight.system_prompt.clone()), provider_message],
            );
        }

        let mut conv = self.stores.conversations.get(owner, &req.conversation_id)?;
        if conv.project_id != req.project_id {
            return Err(AppError::bad_request(format!(
                "conversation {} belongs to another project",
                conv.id
            )));
        }

        apply_branch(&mut conv, &req.parent_message_id)?;
        match conv.provider_history.first_mut() {
            Some(ProviderMessage::System { content, .. }) => content.clone_from(&preflight.system_prompt),
            _ => conv
                .provider_history
                .insert(0, ProviderMessage::system(preflight.system_prompt.clone())),
        }
        conv.model_slug.clone_from(&req.model_slug);
        conv.user_history.push(user_message);
        conv.provider_history.push(provider_message);

        self.stores.conversations.update(&mut conv)?;
        Ok(conv)
    }

    async fn run_loop(
        &self,
        ctx: &RequestContext,
        req: &StreamTurnRequest,
        preflight: &Preflight,
        conv: &mut Conversation,
        emitter: &mut StreamEmitter,
    ) -> Result<(), TurnError> {
        let tools = self.tools.definitions();

        for round in 0..self.config.max_tool_rounds {
            let request = ChatRequest::new(req.model_slug.clone(), conv.provider_history.clone())
                .with_tools(tools.clone());
            let output = self.stream_round(ctx, preflight.provider.as_ref(), &request, emitter).await?;
            debug!(
                "[Orchestrator] round {} finished: reason={:?} tool_calls={}",
                round,
                output.finish_reason,
                output.tool_calls.len()
            );
            self.record_usage(&preflight.actor, req, conv, &output);

            // One record per assistant part; reasoning rides on the first.
            let mut reasoning = Some(output.reasoning.clone()).filter(|r| !r.is_empty());
            for segment in output.segments.iter().filter(|s| !s.content.is_empty()) {
                conv.user_history.push(UserMessage::Assistant {
                    message_id: segment.message_id.clone(),
                    content: segment.content.clone(),
                    reasoning: reasoning.take(),
                    model_slug: req.model_slug.clone(),
                });
                conv.provider_history.push(ProviderMessage::Assistant {
                    message_id: segment.message_id.clone(),
                    content: segment.content.clone(),
                });
            }

            if output.tool_calls.is_empty() {
                return Ok(());
            }
            dispatch_tool_calls(&self.tools, ctx, &req.project_id, &output.tool_calls, conv, emitter).await?;
        }

        Err(TurnError::Failed(AppError::invalid_llm_response(format!(
            "model kept calling tools after {} rounds",
            self.config.max_tool_rounds
        ))))
    }

    /// One provider stream, demultiplexed into client events.
    async fn stream_round(
        &self,
        ctx: &RequestContext,
        provider: &dyn LlmProvider,
        request: &ChatRequest,
        emitter: &mut StreamEmitter,
    ) -> Result<TurnOutput, TurnError> {
        let token = ctx.cancellation_token().clone();

        let mut stream = tokio::select! {
            biased;
            _ = token.cancelled() => return Err(TurnError::Cancelled),
            opened = provider.stream_chat(request) => opened?,
        };

        let mut demux = ChatCompletionsDemuxer::new();
        loop {
            let next = tokio::select! {
                biased;
                _ = token.cancelled() => return Err(TurnError::Cancelled),
                next = stream.next() => next,
            };
            match next {
                Some(Ok(chunk)) => emitter.send_all(demux.push(&chunk)).await?,
                Some(Err(e)) => return Err(TurnError::Failed(e.into())),
                None => break,
            }
        }

        emitter.send_all(demux.finish()).await?;
        Ok(demux.into_output())
    }

    fn record_usage(&self, actor: &Actor, req: &StreamTurnRequest, conv: &Conversation, output: &TurnOutput) {
        let Some(usage) = output.usage else {
            return;
        };
        let record = UsageRecord {
            user_id: actor.user_id.clone(),
            project_id: req.project_id.clone(),
            conversation_id: conv.id.clone(),
            model_slug: req.model_slug.clone(),
            prompt_tokens: u64::from(usage.prompt_tokens),
            completion_tokens: u64::from(usage.completion_tokens),
        };
        if let Err(e) = self.stores.usage.record(&record) {
            warn!("[Orchestrator] failed to record usage for {}: {}", conv.id, e);
        }
    }

    async fn finalize(
        &self,
        ctx: &RequestContext,
        preflight: &Preflight,
        mut conv: Conversation,
        emitter: &mut StreamEmitter,
    ) -> TurnOutcome {
        if ctx.is_cancelled() {
            info!("[Orchestrator] cancelled before persisting {}", conv.id);
            return TurnOutcome::Cancelled;
        }

        if let Err(e) = self.stores.conversations.update(&mut conv) {
            warn!("[Orchestrator] failed to persist {}: {}", conv.id, e);
            return self.fail(emitter, &conv.id, e).await;
        }

        if emitter.finalize(&conv.id).await.is_err() {
            debug!("[Orchestrator] client gone before finalization of {}", conv.id);
        }
        info!(
            "[Orchestrator] turn completed: conversation={} messages={}",
            conv.id,
            conv.user_history.len()
        );

        // `update` refreshed the title, so a rename during the turn is seen here.
        let title_task = conv.has_sentinel_title().then(|| {
            TitleJob {
                conversations: self.stores.conversations.clone(),
                provider: Arc::clone(&preflight.provider),
                model_slug: self.config.title_model_slug.clone(),
                timeout: self.config.title_timeout,
            }
            .spawn(ctx.detached(), conv.id.clone(), render_dialog(&conv.user_history))
        });

        TurnOutcome::Completed {
            conversation_id: conv.id,
            title_task,
        }
    }

    /// Emit `StreamError` then `StreamFinalization`.
    async fn fail(&self, emitter: &mut StreamEmitter, conversation_id: &str, err: AppError) -> TurnOutcome {
        let kind = err.kind();
        if emitter.error(&err).await.is_err() || emitter.finalize(conversation_id).await.is_err() {
            debug!("[Orchestrator] client gone while reporting {}", kind);
            return TurnOutcome::Cancelled;
        }
        TurnOutcome::Failed { kind }
    }
}
