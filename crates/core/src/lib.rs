//! PaperDesk Core
//!
//! Foundational types for the PaperDesk conversation backend. This crate has
//! no network or storage dependencies.
//!
//! ## Module Organization
//!
//! - `error` - Core error types (`CoreError`, `CoreResult`)
//! - `context` - Request and tool contexts (`Actor`, `RequestContext`, `ToolContext`)
//! - `message` - Dual-view conversation history (`UserMessage`, `ProviderMessage`)
//! - `streaming` - Client stream events (`StreamEvent`, `PartKind`, `PartPayload`)

pub mod context;
pub mod error;
pub mod message;
pub mod streaming;

// ── Error Types ────────────────────────────────────────────────────────
pub use error::{CoreError, CoreResult};

// ── Contexts ───────────────────────────────────────────────────────────
pub use context::{Actor, ExecutionContext, RequestContext, ToolContext};

// ── Message Model ──────────────────────────────────────────────────────
pub use message::{
    check_histories, message_kind_of, new_message_id, new_tool_call_key, tool_call_message_id,
    tool_call_prepare_message_id, MessageKind, ProviderMessage, UserMessage,
};

// ── Stream Events ──────────────────────────────────────────────────────
pub use streaming::{PartKind, PartPayload, StreamEvent, ToolCallPhase};

// Re-exported so downstream crates share one token type.
pub use tokio_util::sync::CancellationToken;
