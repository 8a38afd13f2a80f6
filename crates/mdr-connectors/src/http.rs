//! Thin JSON-over-HTTP client shared by the vendor clients.
//!
//! Requests are sent once: vendor calls are never retried.

use crate::secure_string::SecureString;
use crate::traits::{AdapterError, AdapterResult};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Authentication applied to every request.
#[derive(Debug, Clone, Default)]
pub enum HttpAuth {
    #[default]
    None,
    Bearer(SecureString),
    Basic {
        username: String,
        password: SecureString,
    },
}

/// Connection settings for one vendor endpoint.
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Vendor name used in log lines.
    pub name: String,
    pub base_url: String,
    pub auth: HttpAuth,
    pub timeout_secs: u64,
    pub verify_tls: bool,
    pub proxy: Option<String>,
}

impl HttpClientConfig {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            auth: HttpAuth::None,
            timeout_secs: 30,
            verify_tls: true,
            proxy: None,
        }
    }

    pub fn with_auth(mut self, auth: HttpAuth) -> Self {
        self.auth = auth;
        self
    }
}

/// JSON client bound to one base URL.
pub struct HttpClient {
    client: Client,
    config: HttpClientConfig,
    auth: RwLock<HttpAuth>,
}

impl HttpClient {
    pub fn new(config: HttpClientConfig) -> AdapterResult<Self> {
        if !config.verify_tls {
            warn!(
                base_url = %config.base_url,
                vendor = %config.name,
                "TLS certificate verification disabled"
            );
        }

        let mut builder = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .danger_accept_invalid_certs(!config.verify_tls);
        if let Some(proxy) = &config.proxy {
            let proxy = reqwest::Proxy::all(proxy)
                .map_err(|e| AdapterError::Config(format!("invalid proxy: {}", e)))?;
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| AdapterError::Config(e.to_string()))?;

        Ok(Self {
            client,
            auth: RwLock::new(config.auth.clone()),
            config,
        })
    }

    /// Builds a URL from a path relative to the base URL.
    pub fn build_url(&self, path: &str) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{}/{}", base, path)
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    /// Replaces the credentials used for subsequent requests.
    pub async fn set_auth(&self, auth: HttpAuth) {
        *self.auth.write().await = auth;
    }

    /// Whether a bearer token is currently set.
    pub async fn has_bearer(&self) -> bool {
        matches!(*self.auth.read().await, HttpAuth::Bearer(_))
    }

    /// GET with query parameters and extra headers, returning the JSON body.
    pub async fn get_json(
        &self,
        path: &str,
        query: &[(&str, String)],
        headers: &[(&str, String)],
    ) -> AdapterResult<Value> {
        let request = self.request(Method::GET, path, query, headers);
        self.send(request).await
    }

    /// POST a JSON body, returning the JSON response.
    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        query: &[(&str, String)],
        body: &T,
    ) -> AdapterResult<Value> {
        let request = self.request(Method::POST, path, query, &[]).json(body);
        self.send(request).await
    }

    fn request(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        headers: &[(&str, String)],
    ) -> RequestBuilder {
        let mut request = self
            .client
            .request(method, self.build_url(path))
            .header(reqwest::header::ACCEPT, "application/json");
        if !query.is_empty() {
            request = request.query(query);
        }
        for (name, value) in headers {
            request = request.header(*name, value.as_str());
        }
        request
    }

    async fn send(&self, request: RequestBuilder) -> AdapterResult<Value> {
        let request = match &*self.auth.read().await {
            HttpAuth::None => request,
            HttpAuth::Bearer(token) => request.bearer_auth(token.expose_secret()),
            HttpAuth::Basic { username, password } => {
                request.basic_auth(username, Some(password.expose_secret()))
            }
        };

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                AdapterError::Timeout(e.to_string())
            } else if e.is_connect() {
                AdapterError::ConnectionFailed(e.to_string())
            } else {
                AdapterError::VendorOperation(e.to_string())
            }
        })?;

        let response = check_status(response).await?;
        self.parse_json_response(response).await
    }

    async fn parse_json_response(&self, response: Response) -> AdapterResult<Value> {
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| AdapterError::InvalidResponse(e.to_string()))?;
        debug!(vendor = %self.config.name, %status, bytes = text.len(), "Vendor response");

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| {
            AdapterError::InvalidResponse(format!(
                "Failed to parse response (status {}): {} - Body: {}",
                status,
                e,
                text.chars().take(500).collect::<String>()
            ))
        })
    }
}

async fn check_status(response: Response) -> AdapterResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(
            AdapterError::AuthenticationFailed(format!("vendor returned {}", status)),
        ),
        StatusCode::NOT_FOUND => Err(AdapterError::NotFound("Resource not found".into())),
        _ => {
            let body = response.text().await.unwrap_or_default();
            Err(AdapterError::VendorOperation(format!(
                "HTTP {}: {}",
                status,
                body.chars().take(500).collect::<String>()
            )))
        }
    }
}
