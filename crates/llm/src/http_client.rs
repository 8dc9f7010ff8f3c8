//! HTTP Client Factory
//!
//! Builds the `reqwest::Client` shared by provider instances.

use std::time::Duration;

use crate::types::{LlmError, LlmResult};

/// Build a client with the given request timeout.
///
/// A zero timeout disables the per-request deadline; streaming turns rely on
/// cancellation instead.
pub fn build_http_client(timeout: Duration) -> LlmResult<reqwest::Client> {
    let mut builder = reqwest::Client::builder().user_agent(concat!(
        "paperdesk/",
        env!("CARGO_PKG_VERSION")
    ));
    if !timeout.is_zero() {
        builder = builder.connect_timeout(timeout.min(Duration::from_secs(30)));
    }
    builder.build().map_err(|e| LlmError::Other {
        message: format!("failed to build HTTP client: {}", e),
    })
}
