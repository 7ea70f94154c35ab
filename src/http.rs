//! Shared HTTP client setup and response classification.

use crate::error::{Result, VidquizError};
use reqwest::StatusCode;
use std::time::Duration;

/// Create a reqwest client that applies `timeout` to every request.
pub fn create_http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(30)))
        .build()
        .map_err(|e| VidquizError::Config(format!("Failed to create HTTP client: {}", e)))
}

/// Map a reqwest transport error for `service` into the error taxonomy.
pub fn transport_error(service: &str, err: reqwest::Error) -> VidquizError {
    if err.is_timeout() {
        VidquizError::transient(service, format!("request timed out: {}", err))
    } else if err.is_connect() {
        VidquizError::transient(service, format!("connection failed: {}", err))
    } else {
        VidquizError::upstream(service, err.to_string())
    }
}

/// Classify an HTTP status. `body` is included in the message.
pub fn status_error(service: &str, status: StatusCode, body: &str) -> VidquizError {
    let detail = body_excerpt(body);
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => VidquizError::Auth(format!(
            "{} rejected the API key ({}): {}",
            service, status, detail
        )),
        StatusCode::TOO_MANY_REQUESTS | StatusCode::REQUEST_TIMEOUT => {
            VidquizError::transient(service, format!("{}: {}", status, detail))
        }
        s if s.is_server_error() => {
            VidquizError::transient(service, format!("{}: {}", status, detail))
        }
        _ => VidquizError::upstream(service, format!("{}: {}", status, detail)),
    }
}

/// Return the response if its status is a success, otherwise a classified error.
pub async fn check_status(service: &str, response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(status_error(service, status, &body))
}

fn body_excerpt(body: &str) -> String {
    const MAX: usize = 500;
    let body = body.trim();
    if body.chars().count() <= MAX {
        body.to_string()
    } else {
        let truncated: String = body.chars().take(MAX).collect();
        format!("{}...", truncated)
    }
}
