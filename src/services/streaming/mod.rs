//! Client Streaming
//!
//! Ordered delivery of turn events to the HTTP transport.

pub mod emitter;

pub use emitter::{EmitError, StreamEmitter, DEFAULT_EVENT_BUFFER};
