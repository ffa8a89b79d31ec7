//! HTTP client with scope enforcement, rate limiting, and cookie support

use crate::core::rate_limit::RateLimiter;
use crate::core::scope::Scope;
use crate::error::TransportError;
use crate::http::request::HttpRequest;
use crate::http::response::HttpResponse;
use reqwest::{header, redirect::Policy, Client, Proxy};
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

/// Default per-request timeout. Timing oracles need it above their delay.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct HttpClient {
    client: Client,
    scope: Scope,
    limiter: RateLimiter,
    default_headers: HashMap<String, String>,
    cookies: Option<String>,
}

/// Connection-level options for [`HttpClient::with_options`].
#[derive(Debug, Clone, Default)]
pub struct ClientOptions {
    pub cookies: Option<String>,
    pub headers: HashMap<String, String>,
    pub proxy: Option<String>,
    pub timeout: Option<Duration>,
}

impl HttpClient {
    pub fn new(scope: Scope, limiter: RateLimiter) -> Result<Self, TransportError> {
        Self::with_options(scope, limiter, ClientOptions::default())
    }

    /// Create HTTP client with cookies, custom headers and an optional proxy
    pub fn with_options(
        scope: Scope,
        limiter: RateLimiter,
        options: ClientOptions,
    ) -> Result<Self, TransportError> {
        let mut builder = Client::builder()
            .danger_accept_invalid_certs(true)
            .redirect(Policy::none())
            .timeout(options.timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT));

        if let Some(proxy) = &options.proxy {
            builder = builder.proxy(Proxy::all(proxy)?);
        }

        Ok(Self {
            client: builder.build()?,
            scope,
            limiter,
            default_headers: options.headers,
            cookies: options.cookies,
        })
    }

    pub async fn execute(&self, req: HttpRequest) -> Result<HttpResponse, TransportError> {
        // ---- RATE LIMIT ENFORCEMENT ----
        self.limiter.wait().await;

        // ---- SCOPE CHECK ----
        if !self.scope.is_in_scope(&req.url) {
            return Err(TransportError::OutOfScope(req.url.to_string()));
        }

        let start = Instant::now();

        let mut request = self
            .client
            .request(req.method, req.url.clone())
            .headers(req.headers.clone());

        for (key, value) in &self.default_headers {
            if let (Ok(name), Ok(value)) = (
                header::HeaderName::from_bytes(key.as_bytes()),
                header::HeaderValue::from_str(value),
            ) {
                request = request.header(name, value);
            }
        }

        if let Some(ref cookies) = self.cookies {
            request = request.header(header::COOKIE, cookies);
        }

        if let Some(body) = req.body {
            request = request.body(body);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();

        let cookies = response
            .cookies()
            .map(|c| (c.name().to_string(), c.value().to_string()))
            .collect();
        let headers = response
            .headers()
            .iter()
            .map(|(k, v)| (k.as_str().to_string(), v.to_str().unwrap_or("").to_string()))
            .collect();

        let body = response.bytes().await?.to_vec();
        // Measured after the rate-limit wait, so queueing never reads as
        // server latency.
        let elapsed = start.elapsed();

        tracing::trace!(status, elapsed_ms = elapsed.as_millis(), len = body.len(), "response received");

        Ok(HttpResponse {
            status,
            headers,
            cookies,
            body_len: body.len(),
            body,
            elapsed: Some(elapsed),
        })
    }
}
