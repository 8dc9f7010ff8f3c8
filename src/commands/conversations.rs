//! Conversation Commands
//!
//! The streaming turn endpoint and the unary conversation operations.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use futures_util::{Stream, StreamExt};
use tokio_stream::wrappers::ReceiverStream;
use tracing::debug;

use paperdesk_core::{ExecutionContext, RequestContext, StreamEvent};

use crate::commands::actor::CurrentActor;
use crate::models::{
    ConversationSummary, ConversationView, ListConversationsQuery, StreamTurnRequest, UpdateConversationRequest,
};
use crate::services::streaming::{StreamEmitter, DEFAULT_EVENT_BUFFER};
use crate::services::TurnOutcome;
use crate::state::AppState;
use crate::utils::error::{AppError, AppResult};

/// Frame one stream event as SSE: `event:` is the snake_case type.
pub fn sse_event(event: &StreamEvent) -> Result<Event, axum::Error> {
    Event::default().event(event.event_name()).json_data(event)
}

/// `POST /conversations/stream`
///
/// The turn runs on its own task. The response body owns a drop guard for
/// the turn's token, so a disconnecting client cancels the turn.
pub async fn stream_conversation(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Json(req): Json<StreamTurnRequest>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let ctx = RequestContext::for_actor(actor);
    let guard = ctx.cancellation_token().clone().drop_guard();
    let (mut emitter, rx) = StreamEmitter::channel(DEFAULT_EVENT_BUFFER, ctx.cancellation_token().clone());

    let orchestrator = state.orchestrator();
    tokio::spawn(async move {
        match orchestrator.stream_turn(&ctx, req, &mut emitter).await {
            TurnOutcome::Completed { conversation_id, .. } => {
                debug!("[Stream] turn for {} completed", conversation_id)
            }
            TurnOutcome::Failed { kind } => debug!("[Stream] turn failed with {}", kind),
            TurnOutcome::Cancelled => debug!("[Stream] turn cancelled"),
        }
    });

    let stream = ReceiverStream::new(rx).map(move |event| {
        let _cancel_on_drop = &guard;
        sse_event(&event)
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// `GET /conversations?project_id=`
pub async fn list_conversations(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Query(query): Query<ListConversationsQuery>,
) -> AppResult<Json<Vec<ConversationSummary>>> {
    let conversations = state.conversations().list(&actor.user_id, &query.project_id)?;
    Ok(Json(conversations.into_iter().map(ConversationSummary::from).collect()))
}

/// `GET /conversations/{id}`, user-facing history only
pub async fn get_conversation(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(conversation_id): Path<String>,
) -> AppResult<Json<ConversationView>> {
    let conversation = state.conversations().get(&actor.user_id, &conversation_id)?;
    Ok(Json(ConversationView::from(conversation)))
}

/// `PATCH /conversations/{id}`
pub async fn update_conversation(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(conversation_id): Path<String>,
    Json(body): Json<UpdateConversationRequest>,
) -> AppResult<Json<ConversationSummary>> {
    let title = body.title.trim();
    if title.is_empty() {
        return Err(AppError::bad_request("title must not be empty"));
    }

    let store = state.conversations();
    store.get(&actor.user_id, &conversation_id)?;
    store.rename(&conversation_id, title)?;
    let conversation = store.get(&actor.user_id, &conversation_id)?;
    Ok(Json(ConversationSummary::from(conversation)))
}

/// `DELETE /conversations/{id}`. A second delete is `record_not_found`.
pub async fn delete_conversation(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(conversation_id): Path<String>,
) -> AppResult<StatusCode> {
    state.conversations().soft_delete(&actor.user_id, &conversation_id)?;
    Ok(StatusCode::NO_CONTENT)
}
