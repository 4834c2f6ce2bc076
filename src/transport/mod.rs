//! HTTP transport shared by all service clients.
//!
//! Owns the reqwest client, attaches credentials, maps HTTP statuses to
//! [`Error`] kinds and decodes JSON bodies.

pub mod retry;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE, RETRY_AFTER};
use reqwest::{Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::auth::{PersonaAuthenticator, ATTESTATION_HEADER};
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::types::check_non_empty;
pub use retry::{with_retry, RetryPolicy};

pub const API_KEY_HEADER: &str = "X-API-Key";
pub const AGENT_ID_HEADER: &str = "X-Agent-ID";

/// Seconds to wait when a 429 carries no usable `Retry-After`.
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// A single API call, described before it is sent.
#[derive(Debug, Clone)]
pub(crate) struct ApiRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: Option<Value>,
    attestation: Option<Option<String>>,
    accept: Option<&'static str>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            attestation: None,
            accept: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn query_opt(self, key: &str, value: Option<impl ToString>) -> Self {
        match value {
            Some(v) => self.query(key, v),
            None => self,
        }
    }

    pub fn json<B: Serialize>(mut self, body: &B) -> Result<Self> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    /// Sign the request with a PERSONA attestation, if a key is configured.
    pub fn attested(mut self, action: Option<&str>) -> Self {
        self.attestation = Some(action.map(str::to_string));
        self
    }

    pub fn accept(mut self, content_type: &'static str) -> Self {
        self.accept = Some(content_type);
        self
    }

    fn is_idempotent(&self) -> bool {
        matches!(self.method, Method::GET | Method::HEAD | Method::PUT | Method::DELETE)
    }
}

/// Connection state shared by every service client of one `AsyncClient`.
pub(crate) struct Transport {
    http: reqwest::Client,
    base_url: String,
    authenticator: Option<PersonaAuthenticator>,
    agent_id: Option<String>,
    retry: RetryPolicy,
    closed: AtomicBool,
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("base_url", &self.base_url)
            .field("agent_id", &self.agent_id)
            .field("attestation", &self.authenticator.as_ref().map(|a| a.fingerprint()))
            .field("max_retries", &self.retry.max_retries)
            .field("closed", &self.is_closed())
            .finish()
    }
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|_| Error::Auth(format!("{} contains characters not allowed in a header", name)))
}

impl Transport {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        config.validate()?;

        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static("x-api-key"),
            header_value(API_KEY_HEADER, &config.api_key)?,
        );
        if let Some(agent_id) = &config.agent_id {
            headers.insert(
                HeaderName::from_static("x-agent-id"),
                header_value(AGENT_ID_HEADER, agent_id)?,
            );
        }
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(format!("bravozero-rust/{}", crate::VERSION))
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Network(format!("Failed to build HTTP client: {}", e)))?;

        let authenticator = match (config.resolved_private_key_path(), &config.agent_id) {
            (Some(path), Some(agent_id)) => Some(PersonaAuthenticator::from_file(agent_id, path)?),
            _ => None,
        };

        let base_url = config.resolved_base_url();
        info!(
            base_url = %base_url,
            agent_id = config.agent_id.as_deref().unwrap_or("-"),
            attestation_key = authenticator.as_ref().map(|a| a.fingerprint()).as_deref().unwrap_or("-"),
            "Bravo Zero client configured"
        );

        Ok(Self {
            http,
            base_url,
            authenticator,
            agent_id: config.agent_id.clone(),
            retry: RetryPolicy::new(config.max_retries),
            closed: AtomicBool::new(false),
        })
    }

    pub fn agent_id(&self) -> Option<&str> {
        self.agent_id.as_deref()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Stop sending requests. Idempotent.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            info!(base_url = %self.base_url, "Bravo Zero client closed");
        }
    }

    /// Send a request and return the successful response.
    pub async fn execute(&self, request: ApiRequest) -> Result<Response> {
        if self.is_closed() {
            return Err(Error::Closed);
        }

        let no_retry = RetryPolicy::no_retry();
        let policy = if request.is_idempotent() { &self.retry } else { &no_retry };

        let this = self;
        let request = &request;
        with_retry(policy, move || this.execute_once(request)).await
    }

    /// Send a request and decode its JSON body.
    pub async fn json<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T> {
        let response = self.execute(request).await?;
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| Error::Decode(e.to_string()))
    }

    /// Send a request whose response body is irrelevant.
    pub async fn send(&self, request: ApiRequest) -> Result<()> {
        self.execute(request).await.map(|_| ())
    }

    /// Send a request and return the raw body.
    pub async fn bytes(&self, request: ApiRequest) -> Result<Vec<u8>> {
        let response = self.execute(request).await?;
        Ok(response.bytes().await?.to_vec())
    }

    async fn execute_once(&self, request: &ApiRequest) -> Result<Response> {
        let url = format!("{}{}", self.base_url, request.path);
        let mut builder = self.http.request(request.method.clone(), &url);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        if let Some(accept) = request.accept {
            builder = builder.header(ACCEPT, accept);
        }
        if let (Some(action), Some(authenticator)) = (&request.attestation, &self.authenticator) {
            let attestation = authenticator.create_attestation(action.as_deref())?;
            builder = builder.header(ATTESTATION_HEADER, attestation);
        }

        let started = Instant::now();
        let response = builder.send().await?;
        debug!(
            method = %request.method,
            path = %request.path,
            status = response.status().as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Bravo Zero request"
        );

        check_status(response, &request.path).await
    }
}

/// Validate an identifier that is interpolated into a URL path.
pub(crate) fn path_segment(field: &str, value: &str) -> Result<String> {
    check_non_empty(field, value)?;
    if value.contains(|c| matches!(c, '/' | '?' | '#' | '%')) {
        return Err(Error::validation(field, "must not contain '/', '?', '#' or '%'"));
    }
    // Dot segments are resolved away by the URL parser.
    if value == "." || value == ".." {
        return Err(Error::validation(field, "must not be a dot segment"));
    }
    Ok(value.to_string())
}

/// Map a non-success response to an error.
async fn check_status(response: Response, path: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let retry_after = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
    let body = response.text().await.unwrap_or_default();
    let message = error_message(&body, status);

    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Error::Auth(message),
        StatusCode::NOT_FOUND => Error::NotFound(format!("{}: {}", path, message)),
        StatusCode::TOO_MANY_REQUESTS => {
            warn!(path, retry_after, "Rate limit exceeded");
            Error::RateLimited { retry_after }
        }
        _ => Error::remote(status.as_u16(), message),
    })
}

/// Best human-readable message from an error body.
fn error_message(body: &str, status: StatusCode) -> String {
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body) {
        for key in ["message", "error", "detail"] {
            if let Some(Value::String(text)) = map.get(key) {
                return text.clone();
            }
        }
    }

    let trimmed = body.trim();
    if !trimmed.is_empty() {
        return trimmed.to_string();
    }

    status
        .canonical_reason()
        .unwrap_or("unknown error")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_extraction() {
        assert_eq!(
            error_message(r#"{"message":"quota exhausted"}"#, StatusCode::BAD_REQUEST),
            "quota exhausted"
        );
        assert_eq!(
            error_message(r#"{"error":"bad token"}"#, StatusCode::UNAUTHORIZED),
            "bad token"
        );
        assert_eq!(error_message("upstream down", StatusCode::BAD_GATEWAY), "upstream down");
        assert_eq!(error_message("", StatusCode::SERVICE_UNAVAILABLE), "Service Unavailable");
    }

    #[test]
    fn test_request_builder() {
        let request = ApiRequest::get("/v1/bridge/files")
            .query("path", "/src")
            .query_opt("pattern", None::<String>)
            .query("recursive", false);

        assert!(request.is_idempotent());
        assert_eq!(
            request.query,
            vec![
                ("path".to_string(), "/src".to_string()),
                ("recursive".to_string(), "false".to_string()),
            ]
        );
        assert!(!ApiRequest::post("/v1/constitution/proposals").is_idempotent());
        assert!(!ApiRequest::patch("/v1/memory/m-1").is_idempotent());
    }

    #[test]
    fn test_path_segment() {
        assert_eq!(path_segment("memory_id", "m-42").unwrap(), "m-42");
        assert!(path_segment("memory_id", "").is_err());
        assert!(path_segment("memory_id", "../etc").is_err());
        assert!(path_segment("rule_id", "r?x=1").is_err());
        assert!(path_segment("memory_id", ".").is_err());
        assert!(path_segment("memory_id", "..").is_err());
        assert!(path_segment("rule_id", "%2e%2e").is_err());
        assert_eq!(path_segment("memory_id", "v1.2").unwrap(), "v1.2");
    }

    #[test]
    fn test_transport_requires_api_key() {
        assert!(matches!(Transport::new(&ClientConfig::new("")), Err(Error::Auth(_))));
    }

    #[tokio::test]
    async fn test_closed_transport_rejects_requests() {
        let transport = Transport::new(&ClientConfig::new("key")).unwrap();
        transport.close();
        transport.close();

        assert!(transport.is_closed());
        assert!(matches!(
            transport.execute(ApiRequest::get("/v1/constitution/omega")).await,
            Err(Error::Closed)
        ));
    }
}
