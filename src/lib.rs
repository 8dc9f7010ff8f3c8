//! PaperDesk Server
//!
//! Conversation backend for the LaTeX writing assistant:
//! - HTTP commands under `/api/v1`
//! - the streaming turn orchestrator and its services
//! - storage layer (SQLite, config file)
//! - data models and utilities

pub mod commands;
pub mod logging;
pub mod models;
pub mod services;
pub mod state;
pub mod storage;
pub mod utils;

pub use commands::router;
pub use state::AppState;
pub use utils::error::{AppError, AppResult};
