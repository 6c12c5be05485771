//! Orchestrator callback.
//!
//! Every invocation ends with exactly one PUT of a [`ResponseBody`] to the
//! pre-signed `ResponseURL` of the event. Delivery is attempted once.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::handlers::Outputs;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    Success,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResponseBody {
    pub stack_id: String,
    pub request_id: String,
    pub logical_resource_id: String,
    pub physical_resource_id: String,
    pub status: Status,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Outputs>,
}

/// `<error>; See details in CloudWatch Log: <stream>`, without the error
/// prefix on success.
pub fn reason(error: Option<&str>, log_stream_name: &str) -> String {
    let prefix = error.map(|e| format!("{e}; ")).unwrap_or_default();
    format!("{prefix}See details in CloudWatch Log: {log_stream_name}")
}

#[derive(Debug, Error)]
pub enum ResponseError {
    #[error("failed to encode response body: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("failed to send response: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("response was rejected with HTTP status {0}")]
    Status(u16),
}

/// Callback channel back to the orchestrator.
#[async_trait]
pub trait Responder: Send + Sync {
    async fn respond(&self, url: &str, body: &ResponseBody) -> Result<(), ResponseError>;
}

/// Sends the callback over HTTP(S).
pub struct HttpResponder {
    client: reqwest::Client,
}

impl HttpResponder {
    pub fn new(timeout: Duration) -> Result<Self, ResponseError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Responder for HttpResponder {
    async fn respond(&self, url: &str, body: &ResponseBody) -> Result<(), ResponseError> {
        let json = serde_json::to_vec(body)?;
        info!(status = ?body.status, physical_resource_id = %body.physical_resource_id, "Sending response");

        // Pre-signed URLs are signed without a content type
        let response = self
            .client
            .put(url)
            .header(CONTENT_TYPE, "")
            .body(json)
            .send()
            .await?;

        let status = response.status();
        info!(status = status.as_u16(), "Response delivered");
        if !status.is_success() {
            return Err(ResponseError::Status(status.as_u16()));
        }
        Ok(())
    }
}
