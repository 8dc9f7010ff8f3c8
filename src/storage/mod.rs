//! Storage Layer
//!
//! SQLite-backed collections and the TOML config file.

pub mod config;
pub mod conversations;
pub mod database;
pub mod projects;
pub mod usage;
pub mod users;

pub use config::ConfigService;
pub use conversations::ConversationStore;
pub use database::Database;
pub use projects::ProjectStore;
pub use usage::{UsageRecord, UsageStore, UsageTotals};
pub use users::UserStore;
