//! HTTP transport seam
//!
//! API clients describe requests as plain data and hand them to an
//! [`HttpTransport`]. Timeout enforcement belongs to the transport: a call
//! that exceeds its budget comes back as a response with `timed_out` set,
//! which the clients treat as a transient failure.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Transport failure that produced no HTTP response (connection reset, DNS, TLS)
#[derive(Debug, Error)]
#[error("Transport error: {0}")]
pub struct TransportError(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Form(Vec<(String, String)>),
    Json(serde_json::Value),
}

/// Outgoing request
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<RequestBody>,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            url: url.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn post(url: impl Into<String>, body: RequestBody) -> Self {
        Self {
            method: HttpMethod::Post,
            url: url.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: Some(body),
        }
    }

    pub fn query(mut self, key: &str, value: impl Into<String>) -> Self {
        self.query.push((key.to_string(), value.into()));
        self
    }

    pub fn header(mut self, key: &str, value: impl Into<String>) -> Self {
        self.headers.push((key.to_string(), value.into()));
        self
    }

    pub fn bearer(self, token: &str) -> Self {
        self.header("Authorization", format!("Bearer {}", token))
    }

    /// Value of a request header (case-insensitive)
    pub fn header_value(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Value of a query parameter
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Response as seen by the API clients
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    /// HTTP status, 0 when the call timed out
    pub status: u16,
    pub body: String,
    pub timed_out: bool,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            timed_out: false,
        }
    }

    pub fn timeout() -> Self {
        Self {
            status: 0,
            body: String::new(),
            timed_out: true,
        }
    }

    /// 2xx and not timed out
    pub fn ok(&self) -> bool {
        !self.timed_out && (200..300).contains(&self.status)
    }
}

/// Executes HTTP requests on behalf of the API clients
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Default transport backed by `reqwest`
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Build a client whose calls self-cancel after `timeout`
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .user_agent(crate::config::USER_AGENT)
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(5)))
            .build()
            .map_err(|e| TransportError(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::Post => self.client.post(&request.url),
        };

        builder = builder.header("Accept", "application/json, text/plain, */*");
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (key, value) in &request.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }
        builder = match request.body {
            Some(RequestBody::Form(fields)) => builder.form(&fields),
            Some(RequestBody::Json(value)) => builder.json(&value),
            None => builder,
        };

        tracing::debug!(url = %request.url, method = ?request.method, "Sending request");

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                tracing::warn!(url = %request.url, "Request timed out");
                return Ok(HttpResponse::timeout());
            }
            Err(e) => return Err(TransportError(e.to_string())),
        };

        let status = response.status().as_u16();
        match response.text().await {
            Ok(body) => Ok(HttpResponse::new(status, body)),
            Err(e) if e.is_timeout() => Ok(HttpResponse::timeout()),
            Err(e) => Err(TransportError(e.to_string())),
        }
    }
}
