//! reqwest-backed transport.

use std::time::Duration;

use async_trait::async_trait;
use log::debug;

use super::transport::{HttpRequest, HttpResponse, HttpTransport, Method};
use crate::error::{ErrorContext, TapError, TapResult};

/// Default request timeout.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// User agent sent with every request.
pub const DEFAULT_USER_AGENT: &str = concat!("tap-client-rs/", env!("CARGO_PKG_VERSION"));

/// Production transport built on a shared `reqwest::Client`.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Create a transport with the default timeout and user agent.
    pub fn new() -> TapResult<Self> {
        Self::with_options(Duration::from_secs(DEFAULT_TIMEOUT_SECS), DEFAULT_USER_AGENT)
    }

    /// Create a transport with an explicit timeout and user agent.
    pub fn with_options(timeout: Duration, user_agent: &str) -> TapResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| {
                TapError::configuration_with_context(
                    format!("Failed to build HTTP client: {}", e),
                    ErrorContext::new("ReqwestTransport::with_options"),
                )
            })?;
        Ok(Self { client })
    }

    /// Wrap an already configured client. Redirects must be disabled on it.
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(&self, request: HttpRequest) -> TapResult<HttpResponse> {
        let context = ErrorContext::new("http_request").with_details(format!(
            "{} {}",
            request.method, request.url
        ));
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
        };

        let mut builder = self.client.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(|e| {
            TapError::transport_with_context(format!("Request failed: {}", e), context.clone())
        })?;

        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.bytes().await.map_err(|e| {
            TapError::transport_with_context(
                format!("Failed to read response body: {}", e),
                context.clone(),
            )
        })?;

        debug!(
            "{} {} -> {} ({} bytes)",
            request.method,
            request.url,
            status.as_u16(),
            body.len()
        );

        Ok(HttpResponse {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or("").to_string(),
            headers,
            body: body.to_vec(),
        })
    }
}
