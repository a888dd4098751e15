//! Model-serving client
//!
//! One `invoke` per (prompt, model) pair: POST the family-shaped body to
//! `{base}/model/{model_id}/invoke` and hand back the JSON body together
//! with the latency and token-count headers the backend reports.

use async_trait::async_trait;
use benchlog_core::EndpointConfig;
use reqwest::{header, Client, StatusCode};
use secrecy::{ExposeSecret, Secret};
use serde_json::Value;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, instrument};
use url::Url;

use crate::retry::RetryPolicy;
use crate::{AdapterError, AdapterResult};

pub const LATENCY_HEADER: &str = "x-amzn-bedrock-invocation-latency";
pub const INPUT_TOKENS_HEADER: &str = "x-amzn-bedrock-input-token-count";
pub const OUTPUT_TOKENS_HEADER: &str = "x-amzn-bedrock-output-token-count";

/// Latency and token counts captured alongside a response body
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResponseMetadata {
    /// Latency reported by the backend, if any
    pub backend_latency_ms: Option<f64>,
    /// Wall-clock latency measured by the client
    pub measured_latency_ms: f64,
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
    pub headers: HashMap<String, String>,
}

impl ResponseMetadata {
    pub fn measured(latency_ms: f64) -> Self {
        Self {
            measured_latency_ms: latency_ms,
            ..Default::default()
        }
    }

    pub fn with_token_counts(mut self, input: Option<u64>, output: Option<u64>) -> Self {
        self.input_tokens = input;
        self.output_tokens = output;
        self
    }

    pub fn with_backend_latency(mut self, latency_ms: f64) -> Self {
        self.backend_latency_ms = Some(latency_ms);
        self
    }

    pub fn from_headers(headers: &header::HeaderMap, measured: Duration) -> Self {
        let headers: HashMap<String, String> = headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();

        let number = |name: &str| headers.get(name).and_then(|v| v.trim().parse::<u64>().ok());

        Self {
            backend_latency_ms: headers
                .get(LATENCY_HEADER)
                .and_then(|v| v.trim().parse::<f64>().ok()),
            measured_latency_ms: measured.as_secs_f64() * 1000.0,
            input_tokens: number(INPUT_TOKENS_HEADER),
            output_tokens: number(OUTPUT_TOKENS_HEADER),
            headers,
        }
    }

    /// Backend-reported latency, falling back to the measured one
    pub fn latency_ms(&self) -> f64 {
        self.backend_latency_ms.unwrap_or(self.measured_latency_ms)
    }
}

/// Raw response of one model call
#[derive(Debug, Clone)]
pub struct Invocation {
    pub body: Value,
    pub metadata: ResponseMetadata,
}

#[async_trait]
pub trait ModelInvoker: Send + Sync {
    async fn invoke(&self, model_id: &str, body: Vec<u8>) -> AdapterResult<Invocation>;
}

/// HTTP client for a Bedrock-runtime style endpoint
#[derive(Clone)]
pub struct HttpModelInvoker {
    http: Client,
    base_url: Url,
    api_key: Option<Secret<String>>,
    retry: RetryPolicy,
}

impl std::fmt::Debug for HttpModelInvoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpModelInvoker")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("retry", &self.retry)
            .finish()
    }
}

#[derive(Default)]
pub struct HttpModelInvokerBuilder {
    base_url: Option<String>,
    api_key: Option<Secret<String>>,
    timeout: Option<Duration>,
    retry: Option<RetryPolicy>,
    user_agent: Option<String>,
}

impl HttpModelInvokerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn api_key(mut self, key: Option<Secret<String>>) -> Self {
        self.api_key = key;
        self
    }

    /// Per-request timeout applied by the HTTP client
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    pub fn build(self) -> AdapterResult<HttpModelInvoker> {
        let base_url = self.base_url.ok_or_else(|| {
            AdapterError::RequestFailed("model endpoint base URL is not set".to_string())
        })?;
        let base_url = Url::parse(&base_url)
            .map_err(|e| AdapterError::RequestFailed(format!("invalid base URL '{}': {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(AdapterError::RequestFailed(format!(
                "base URL '{}' cannot carry a path",
                base_url
            )));
        }

        let user_agent = self
            .user_agent
            .unwrap_or_else(|| format!("benchlog/{}", env!("CARGO_PKG_VERSION")));

        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );

        let http = Client::builder()
            .timeout(self.timeout.unwrap_or(Duration::from_secs(120)))
            .user_agent(user_agent)
            .default_headers(headers)
            .build()
            .map_err(|e| AdapterError::RequestFailed(e.to_string()))?;

        Ok(HttpModelInvoker {
            http,
            base_url,
            api_key: self.api_key,
            retry: self.retry.unwrap_or_default(),
        })
    }
}

impl HttpModelInvoker {
    pub fn builder() -> HttpModelInvokerBuilder {
        HttpModelInvokerBuilder::new()
    }

    /// Client wired from the endpoint section of the configuration; the
    /// invoke timeout bounds each attempt
    pub fn from_config(endpoint: &EndpointConfig) -> AdapterResult<Self> {
        Self::builder()
            .base_url(endpoint.resolved_base_url())
            .api_key(endpoint.api_key.clone())
            .timeout(endpoint.invoke_timeout())
            .retry_policy(RetryPolicy::from_config(endpoint))
            .build()
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn invoke_url(&self, model_id: &str) -> AdapterResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| AdapterError::RequestFailed("base URL cannot carry a path".to_string()))?
            .pop_if_empty()
            .extend(["model", model_id, "invoke"]);
        Ok(url)
    }

    fn auth_header(&self) -> Option<String> {
        self.api_key
            .as_ref()
            .map(|key| format!("Bearer {}", key.expose_secret()))
    }

    async fn invoke_once(&self, url: Url, body: Vec<u8>) -> AdapterResult<Invocation> {
        let mut req = self.http.post(url).body(body);
        if let Some(auth) = self.auth_header() {
            req = req.header(header::AUTHORIZATION, auth);
        }

        let started = Instant::now();
        let response = req.send().await.map_err(map_transport_error)?;
        let status = response.status();
        let response_headers = response.headers().clone();

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(map_status(status, error_body));
        }

        let bytes = response.bytes().await.map_err(map_transport_error)?;
        let metadata = ResponseMetadata::from_headers(&response_headers, started.elapsed());
        let body = serde_json::from_slice(&bytes)
            .map_err(|e| AdapterError::InvalidResponse(format!("response is not JSON: {}", e)))?;

        Ok(Invocation { body, metadata })
    }
}

#[async_trait]
impl ModelInvoker for HttpModelInvoker {
    #[instrument(skip(self, body), fields(body_bytes = body.len()))]
    async fn invoke(&self, model_id: &str, body: Vec<u8>) -> AdapterResult<Invocation> {
        let url = self.invoke_url(model_id)?;
        debug!(url = %url, "Invoking model");

        self.retry
            .execute(|| self.invoke_once(url.clone(), body.clone()))
            .await
    }
}

fn map_transport_error(error: reqwest::Error) -> AdapterError {
    if error.is_timeout() {
        AdapterError::Timeout(error.to_string())
    } else if error.is_connect() {
        AdapterError::ConnectionError(error.to_string())
    } else {
        AdapterError::RequestFailed(error.to_string())
    }
}

fn map_status(status: StatusCode, message: String) -> AdapterError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => AdapterError::Throttled(message),
        StatusCode::REQUEST_TIMEOUT => AdapterError::Timeout(message),
        _ if status.is_server_error() => {
            AdapterError::ServiceUnavailable(format!("{}: {}", status.as_u16(), message))
        }
        _ => AdapterError::ClientError {
            status: status.as_u16(),
            message,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header as header_eq, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const MODEL: &str = "meta.llama3-8b-instruct-v1:0";
    const INVOKE_PATH: &str = "/model/meta.llama3-8b-instruct-v1:0/invoke";

    fn invoker(server: &MockServer, max_attempts: u32) -> HttpModelInvoker {
        HttpModelInvoker::builder()
            .base_url(server.uri())
            .api_key(Some(Secret::new("test-key".to_string())))
            .retry_policy(
                RetryPolicy::new(max_attempts)
                    .with_backoff(Duration::from_millis(1), Duration::from_millis(5))
                    .with_jitter(false),
            )
            .build()
            .unwrap()
    }

    fn request_body() -> Vec<u8> {
        serde_json::to_vec(&json!({"prompt": "2+2?", "max_gen_len": 50})).unwrap()
    }

    #[tokio::test]
    async fn test_invoke_captures_body_and_headers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(INVOKE_PATH))
            .and(header_eq("authorization", "Bearer test-key"))
            .and(body_json(json!({"prompt": "2+2?", "max_gen_len": 50})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"generation": " 4"}))
                    .insert_header(LATENCY_HEADER, "321")
                    .insert_header(INPUT_TOKENS_HEADER, "9")
                    .insert_header(OUTPUT_TOKENS_HEADER, "2"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let invocation = invoker(&server, 3).invoke(MODEL, request_body()).await.unwrap();

        assert_eq!(invocation.body["generation"], " 4");
        assert_eq!(invocation.metadata.latency_ms(), 321.0);
        assert_eq!(invocation.metadata.input_tokens, Some(9));
        assert_eq!(invocation.metadata.output_tokens, Some(2));
    }

    #[tokio::test]
    async fn test_missing_latency_header_falls_back_to_measured() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(INVOKE_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"generation": "4"})))
            .mount(&server)
            .await;

        let invocation = invoker(&server, 1).invoke(MODEL, request_body()).await.unwrap();

        assert!(invocation.metadata.backend_latency_ms.is_none());
        assert!(invocation.metadata.latency_ms() >= 0.0);
        assert_eq!(
            invocation.metadata.latency_ms(),
            invocation.metadata.measured_latency_ms
        );
    }

    #[tokio::test]
    async fn test_throttling_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(INVOKE_PATH))
            .respond_with(ResponseTemplate::new(429).set_body_string("ThrottlingException"))
            .up_to_n_times(1)
            .with_priority(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(INVOKE_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"generation": "4"})))
            .with_priority(2)
            .expect(1)
            .mount(&server)
            .await;

        let invocation = invoker(&server, 3).invoke(MODEL, request_body()).await.unwrap();
        assert_eq!(invocation.body["generation"], "4");
    }

    #[tokio::test]
    async fn test_client_error_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(INVOKE_PATH))
            .respond_with(ResponseTemplate::new(400).set_body_string("ValidationException"))
            .expect(1)
            .mount(&server)
            .await;

        let err = invoker(&server, 3).invoke(MODEL, request_body()).await.unwrap_err();
        match err {
            AdapterError::ClientError { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "ValidationException");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_server_errors_exhaust_attempts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(INVOKE_PATH))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let err = invoker(&server, 3).invoke(MODEL, request_body()).await.unwrap_err();
        assert!(matches!(err, AdapterError::ServiceUnavailable(_)));
    }

    #[tokio::test]
    async fn test_non_json_body_is_invalid_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(INVOKE_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .expect(1)
            .mount(&server)
            .await;

        let err = invoker(&server, 3).invoke(MODEL, request_body()).await.unwrap_err();
        assert!(err.is_parse());
    }

    #[test]
    fn test_invoke_url_keeps_base_path() {
        let invoker = HttpModelInvoker::builder()
            .base_url("https://bedrock-runtime.us-east-1.amazonaws.com/")
            .build()
            .unwrap();
        assert_eq!(
            invoker.invoke_url("amazon.titan-text-express-v1").unwrap().as_str(),
            "https://bedrock-runtime.us-east-1.amazonaws.com/model/amazon.titan-text-express-v1/invoke"
        );
    }

    #[test]
    fn test_builder_requires_base_url() {
        assert!(HttpModelInvoker::builder().build().is_err());
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let invoker = HttpModelInvoker::builder()
            .base_url("http://localhost:9000")
            .api_key(Some(Secret::new("super-secret".to_string())))
            .build()
            .unwrap();
        let debug = format!("{:?}", invoker);
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("[REDACTED]"));
    }
}
