//! Client configuration for OpenAI-compatible chat endpoints (Groq).

use crate::error::Result;
use crate::http::create_http_client;
use async_openai::{config::OpenAIConfig, Client};
use std::time::Duration;

/// Create a client for an OpenAI-compatible API at `api_base`.
///
/// `timeout` applies to every request made by the client.
pub fn create_client(
    api_base: &str,
    api_key: &str,
    timeout: Duration,
) -> Result<Client<OpenAIConfig>> {
    let http_client = create_http_client(timeout)?;

    let config = OpenAIConfig::new()
        .with_api_base(api_base.trim_end_matches('/'))
        .with_api_key(api_key);

    Ok(Client::with_config(config).with_http_client(http_client))
}
