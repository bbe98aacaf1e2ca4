pub mod http;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::domain::Signature;
use crate::normalizer::Query;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Delete,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Delete => "DELETE",
        }
    }
}

/// A fully validated request, ready to be signed and sent.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    /// Relative to the API base, always ending in `/`.
    pub path: String,
    pub query: Query,
    pub body: Option<Value>,
    pub signature: Signature,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>, signature: &Signature) -> Self {
        Self {
            method,
            path: path.into(),
            query: Query::new(),
            body: None,
            signature: signature.clone(),
        }
    }

    pub fn with_query(mut self, query: Query) -> Self {
        self.query = query;
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Token can't be sent as a header: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),

    #[error("Service returned {status}: {}", detail.as_deref().unwrap_or(body))]
    Api {
        status: u16,
        code: Option<i64>,
        detail: Option<String>,
        body: String,
    },

    #[error("Could not decode response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Performs signed calls against the feed service.
#[async_trait]
pub trait Transport {
    async fn send(&self, request: ApiRequest) -> Result<Value, TransportError>;
}
