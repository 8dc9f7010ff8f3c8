//! Stream Event Emitter
//!
//! Delivers a turn's events to the client transport in emission order and
//! enforces the framing rules: one `StreamInitialization` first, nothing after
//! `StreamFinalization`. A failed send means the client is gone; the emitter
//! then cancels the turn's token so every other suspension point unwinds.

use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use paperdesk_core::StreamEvent;

use crate::utils::error::AppError;

/// Default capacity of the event channel between orchestrator and transport.
pub const DEFAULT_EVENT_BUFFER: usize = 64;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EmitError {
    /// The receiving side was dropped
    #[error("client stream closed")]
    Closed,

    /// The turn was cancelled while waiting for channel capacity
    #[error("stream cancelled")]
    Cancelled,
}

/// Ordered event sink for one turn.
#[derive(Debug)]
pub struct StreamEmitter {
    tx: mpsc::Sender<StreamEvent>,
    cancellation: CancellationToken,
    initialized: bool,
    finalized: bool,
}

impl StreamEmitter {
    pub fn new(tx: mpsc::Sender<StreamEvent>, cancellation: CancellationToken) -> Self {
        Self {
            tx,
            cancellation,
            initialized: false,
            finalized: false,
        }
    }

    /// Emitter plus the receiver the transport drains.
    pub fn channel(buffer: usize, cancellation: CancellationToken) -> (Self, mpsc::Receiver<StreamEvent>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Self::new(tx, cancellation), rx)
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub async fn initialize(&mut self, conversation_id: &str, model_slug: &str) -> Result<(), EmitError> {
        if self.initialized {
            warn!("[Stream] duplicate initialization for {} ignored", conversation_id);
            return Ok(());
        }
        self.deliver(StreamEvent::StreamInitialization {
            conversation_id: conversation_id.to_string(),
            model_slug: model_slug.to_string(),
        })
        .await?;
        self.initialized = true;
        Ok(())
    }

    /// Forward a part, chunk, tool or indicator event.
    pub async fn send(&mut self, event: StreamEvent) -> Result<(), EmitError> {
        match event {
            StreamEvent::StreamInitialization {
                conversation_id,
                model_slug,
            } => self.initialize(&conversation_id, &model_slug).await,
            StreamEvent::StreamFinalization { conversation_id } => self.finalize(&conversation_id).await,
            event => self.deliver(event).await,
        }
    }

    pub async fn send_all(&mut self, events: Vec<StreamEvent>) -> Result<(), EmitError> {
        for event in events {
            self.send(event).await?;
        }
        Ok(())
    }

    /// Report a terminal error. Internal details are not sent to the client.
    pub async fn error(&mut self, err: &AppError) -> Result<(), EmitError> {
        self.deliver(StreamEvent::StreamError {
            kind: err.kind().to_string(),
            message: err.client_message(),
        })
        .await
    }

    /// Close the stream. Later events are dropped.
    pub async fn finalize(&mut self, conversation_id: &str) -> Result<(), EmitError> {
        if self.finalized {
            return Ok(());
        }
        self.deliver(StreamEvent::StreamFinalization {
            conversation_id: conversation_id.to_string(),
        })
        .await?;
        self.finalized = true;
        Ok(())
    }

    async fn deliver(&mut self, event: StreamEvent) -> Result<(), EmitError> {
        if self.finalized {
            warn!("[Stream] {} after finalization dropped", event.event_name());
            return Ok(());
        }
        if self.cancellation.is_cancelled() {
            return Err(EmitError::Cancelled);
        }

        let name = event.event_name();
        tokio::select! {
            biased;
            _ = self.cancellation.cancelled() => Err(EmitError::Cancelled),
            sent = self.tx.send(event) => match sent {
                Ok(()) => Ok(()),
                Err(_) => {
                    debug!("[Stream] client gone while sending {}", name);
                    self.cancellation.cancel();
                    Err(EmitError::Closed)
                }
            },
        }
    }
}
