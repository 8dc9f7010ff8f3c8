//! Request Context
//!
//! Every operation in the conversation core runs under a context that carries
//! the authenticated actor and a cancellation signal:
//!
//! 1. `ExecutionContext` trait - read-only view shared by all scopes
//! 2. `RequestContext` - one per incoming request, owned by the orchestrator
//! 3. `ToolContext` - derived per tool call, scoped to one project and call id
//!
//! Tool contexts share the parent's cancellation token, so cancelling a request
//! also interrupts any tool it is waiting on. Background work that must outlive
//! the request (title generation) takes a `detached` context instead.

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::{CoreError, CoreResult};

/// The authenticated user on whose behalf a request runs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: String,
}

impl Actor {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
        }
    }
}

/// Read-only context shared by request and tool scopes.
pub trait ExecutionContext: Send + Sync {
    /// The actor, if the request was authenticated.
    fn actor(&self) -> Option<&Actor>;

    /// Token observed at every suspension point.
    fn cancellation_token(&self) -> &CancellationToken;

    fn is_cancelled(&self) -> bool {
        self.cancellation_token().is_cancelled()
    }

    /// Returns the actor or an `InvalidActor` error.
    fn require_actor(&self) -> CoreResult<&Actor> {
        self.actor()
            .filter(|actor| !actor.user_id.trim().is_empty())
            .ok_or_else(|| CoreError::invalid_actor("request has no authenticated user"))
    }
}

// ============================================================================
// RequestContext
// ============================================================================

/// Context for a single client request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    actor: Option<Actor>,
    cancellation: CancellationToken,
}

impl RequestContext {
    pub fn new(actor: Option<Actor>, cancellation: CancellationToken) -> Self {
        Self {
            actor,
            cancellation,
        }
    }

    /// Context for an authenticated actor with a fresh token.
    pub fn for_actor(actor: Actor) -> Self {
        Self::new(Some(actor), CancellationToken::new())
    }

    /// Context with no actor. Preflight rejects it with `invalid_actor`.
    pub fn anonymous() -> Self {
        Self::new(None, CancellationToken::new())
    }

    /// Context that keeps the actor but is not cancelled with this request.
    pub fn detached(&self) -> Self {
        Self::new(self.actor.clone(), CancellationToken::new())
    }

    /// Derive the context handed to a tool invocation.
    pub fn tool_context(&self, project_id: impl Into<String>, call_id: impl Into<String>) -> ToolContext {
        ToolContext {
            actor: self.actor.clone(),
            project_id: project_id.into(),
            call_id: call_id.into(),
            cancellation: self.cancellation.clone(),
        }
    }

    pub fn cancel(&self) {
        self.cancellation.cancel();
    }
}

impl ExecutionContext for RequestContext {
    fn actor(&self) -> Option<&Actor> {
        self.actor.as_ref()
    }

    fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation
    }
}

// ============================================================================
// ToolContext
// ============================================================================

/// Context for one tool call.
///
/// Tools see the actor and the project the conversation belongs to, never the
/// conversation itself.
#[derive(Debug, Clone)]
pub struct ToolContext {
    actor: Option<Actor>,
    project_id: String,
    call_id: String,
    cancellation: CancellationToken,
}

impl ToolContext {
    pub fn new(actor: Option<Actor>, project_id: impl Into<String>, call_id: impl Into<String>) -> Self {
        Self {
            actor,
            project_id: project_id.into(),
            call_id: call_id.into(),
            cancellation: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn call_id(&self) -> &str {
        &self.call_id
    }
}

impl ExecutionContext for ToolContext {
    fn actor(&self) -> Option<&Actor> {
        self.actor.as_ref()
    }

    fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation
    }
}
