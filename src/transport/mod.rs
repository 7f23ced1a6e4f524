//! Transport seam between the governor and the network.
//!
//! The governor only needs "send this request, give me a status and a JSON
//! body, or tell me the network failed". Production code uses
//! [`HttpTransport`]; tests substitute scripted implementations.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

pub mod http;

pub use http::HttpTransport;

/// Request header carrying the per-call correlation id.
pub const X_REQUEST_ID: &str = "x-request-id";

/// One outbound call as seen by a transport.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    /// Endpoint path, always starting with `/`.
    pub path: String,
    pub body: Option<Value>,
    /// Access token to send as `Authorization: Bearer ...`.
    pub bearer: Option<String>,
    pub request_id: Uuid,
}

/// A response that reached the client, successful or not.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: StatusCode,
    /// Parsed JSON body; `Null` when empty, a JSON string when not JSON.
    pub body: Value,
}

impl ApiResponse {
    pub fn new(status: StatusCode, body: Value) -> Self {
        Self { status, body }
    }
}

/// Failures that happen before an HTTP response exists.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("{0}")]
    Other(String),
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError>;
}
