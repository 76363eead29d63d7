use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{Result, TryOnError};
use crate::types::*;

const DEFAULT_API_PREFIX: &str = "/api/v1";

/// The remote job operations a [`SessionController`](crate::SessionController) relies on.
///
/// [`TryOnClient`] is the HTTP implementation. Tests and alternative
/// transports can supply their own.
pub trait TryOnApi: Send + Sync + 'static {
    /// Submit a generation job. Returns the server-assigned session id.
    fn start(
        &self,
        request: &GenerationRequest,
    ) -> impl Future<Output = Result<StartResponse>> + Send;

    /// Fetch the current state of a session. An unknown id yields
    /// [`TryOnError::SessionNotFound`].
    fn get_status(&self, session_id: &str) -> impl Future<Output = Result<SessionSnapshot>> + Send;

    /// List the caller's most recent sessions.
    fn list_sessions(&self, limit: Option<u32>)
        -> impl Future<Output = Result<SessionHistory>> + Send;

    fn delete_session(&self, session_id: &str) -> impl Future<Output = Result<()>> + Send;

    /// Advisory check of whether the generation backend is usable.
    fn check_service_availability(
        &self,
    ) -> impl Future<Output = Result<ServiceAvailability>> + Send;
}

/// Source of bearer credentials attached to every request.
///
/// Returning `Ok(None)` or an error is not fatal: the request goes out
/// unauthenticated and the server decides.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn bearer_token(&self) -> anyhow::Result<Option<String>>;
}

/// A fixed bearer token.
#[derive(Debug, Clone)]
pub struct StaticToken(pub String);

#[async_trait]
impl TokenProvider for StaticToken {
    async fn bearer_token(&self) -> anyhow::Result<Option<String>> {
        Ok(Some(self.0.clone()))
    }
}

fn normalize(base_url: String) -> String {
    base_url.trim_end_matches('/').to_string()
}

fn normalize_prefix(prefix: String) -> String {
    let trimmed = prefix.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{}", trimmed)
    }
}

/// Pull a human-readable message out of an error body (`detail`, then `message`).
fn error_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        detail: Option<serde_json::Value>,
        message: Option<String>,
    }

    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        match parsed.detail {
            Some(serde_json::Value::String(detail)) => return detail,
            Some(other) if !other.is_null() => return other.to_string(),
            _ => {}
        }
        if let Some(message) = parsed.message {
            return message;
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        "no response body".to_string()
    } else {
        trimmed.to_string()
    }
}

#[derive(Deserialize)]
struct HistoryPayload {
    #[serde(default)]
    sessions: Vec<StatusPayload>,
    #[serde(default)]
    total: Option<u32>,
}

/// Async HTTP client for the try-on generation API.
///
/// # Example
/// ```no_run
/// use tryon_session::{StaticToken, TryOnApi, TryOnClient};
///
/// # async fn example() -> tryon_session::Result<()> {
/// let client = TryOnClient::new("https://wardrobe.example.com")
///     .with_token_provider(StaticToken("id-token".into()));
/// let availability = client.check_service_availability().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct TryOnClient {
    http: Client,
    base_url: String,
    api_prefix: String,
    token_provider: Option<Arc<dyn TokenProvider>>,
    timeout: Option<Duration>,
}

impl std::fmt::Debug for TryOnClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TryOnClient")
            .field("base_url", &self.base_url)
            .field("api_prefix", &self.api_prefix)
            .field("has_token_provider", &self.token_provider.is_some())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl TryOnClient {
    /// Create a client for the API served at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: normalize(base_url.into()),
            api_prefix: DEFAULT_API_PREFIX.to_string(),
            token_provider: None,
            timeout: None,
        }
    }

    /// Use a custom `reqwest::Client` (for connection pooling, proxies, TLS).
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    /// Override the path prefix placed before every route (default `/api/v1`).
    pub fn with_api_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.api_prefix = normalize_prefix(prefix.into());
        self
    }

    pub fn with_token_provider(mut self, provider: impl TokenProvider + 'static) -> Self {
        self.token_provider = Some(Arc::new(provider));
        self
    }

    /// Apply one timeout to every request instead of the per-route defaults.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn api_prefix(&self) -> &str {
        &self.api_prefix
    }

    fn url(&self, route: &str) -> String {
        format!("{}{}{}", self.base_url, self.api_prefix, route)
    }

    fn session_url(&self, route: &str, session_id: &str) -> Result<Url> {
        let mut url = Url::parse(&self.url(route))
            .map_err(|e| TryOnError::InvalidResponse(format!("Bad API URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| TryOnError::InvalidResponse("Base URL cannot carry a path".into()))?
            .push(session_id);
        Ok(url)
    }

    async fn prepare(&self, builder: RequestBuilder, default_timeout: Duration) -> RequestBuilder {
        let builder = builder.timeout(self.timeout.unwrap_or(default_timeout));
        let Some(provider) = &self.token_provider else {
            return builder;
        };
        match provider.bearer_token().await {
            Ok(Some(token)) => builder.bearer_auth(token),
            Ok(None) => {
                debug!("no bearer token available, sending request unauthenticated");
                builder
            }
            Err(e) => {
                warn!(error = %e, "token provider failed, sending request unauthenticated");
                builder
            }
        }
    }

    async fn send(&self, builder: RequestBuilder, context: &str) -> Result<Response> {
        builder.send().await.map_err(|e| TryOnError::Network {
            context: format!("{} ({})", context, self.base_url),
            source: e,
        })
    }

    async fn parse_json<T: DeserializeOwned>(resp: Response, context: &str) -> Result<T> {
        let text = resp.text().await.map_err(|e| TryOnError::Network {
            context: format!("Failed to read {} response", context),
            source: e,
        })?;
        serde_json::from_str(&text)
            .map_err(|e| TryOnError::InvalidResponse(format!("Malformed {} response: {}", context, e)))
    }

    async fn http_error(resp: Response) -> TryOnError {
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        TryOnError::Http {
            status,
            message: error_message(&body),
        }
    }
}

impl TryOnApi for TryOnClient {
    async fn start(&self, request: &GenerationRequest) -> Result<StartResponse> {
        let builder = self.http.post(self.url("/generate-try-on-image")).json(request);
        let builder = self.prepare(builder, Duration::from_secs(30)).await;
        let resp = self.send(builder, "Failed to start try-on generation").await?;

        if !resp.status().is_success() {
            return Err(Self::http_error(resp).await);
        }

        let start: StartResponse = Self::parse_json(resp, "start").await?;
        if start.session_id.is_empty() {
            return Err(TryOnError::InvalidResponse(
                "Start response has an empty session_id".into(),
            ));
        }
        debug!(session_id = %start.session_id, status = %start.status, "generation accepted");
        Ok(start)
    }

    async fn get_status(&self, session_id: &str) -> Result<SessionSnapshot> {
        let url = self.session_url("/try-on-status", session_id)?;
        let builder = self.prepare(self.http.get(url), Duration::from_secs(10)).await;
        let resp = self.send(builder, "Failed to fetch try-on status").await?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Err(TryOnError::SessionNotFound(session_id.to_string()));
        }
        if !resp.status().is_success() {
            return Err(Self::http_error(resp).await);
        }

        let payload: StatusPayload = Self::parse_json(resp, "status").await?;
        Ok(payload.into_snapshot())
    }

    async fn list_sessions(&self, limit: Option<u32>) -> Result<SessionHistory> {
        let mut builder = self.http.get(self.url("/my-try-on-sessions"));
        if let Some(limit) = limit {
            builder = builder.query(&[("limit", limit)]);
        }
        let builder = self.prepare(builder, Duration::from_secs(10)).await;
        let resp = self.send(builder, "Failed to fetch try-on history").await?;

        if !resp.status().is_success() {
            return Err(Self::http_error(resp).await);
        }

        let payload: HistoryPayload = Self::parse_json(resp, "history").await?;
        let sessions: Vec<SessionSnapshot> = payload
            .sessions
            .into_iter()
            .map(StatusPayload::into_snapshot)
            .collect();
        let total = payload.total.unwrap_or(sessions.len() as u32);
        Ok(SessionHistory { sessions, total })
    }

    async fn delete_session(&self, session_id: &str) -> Result<()> {
        let url = self.session_url("/try-on-session", session_id)?;
        let builder = self.prepare(self.http.delete(url), Duration::from_secs(10)).await;
        let resp = self.send(builder, "Failed to delete try-on session").await?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Err(TryOnError::SessionNotFound(session_id.to_string()));
        }
        if !resp.status().is_success() {
            return Err(Self::http_error(resp).await);
        }
        Ok(())
    }

    async fn check_service_availability(&self) -> Result<ServiceAvailability> {
        let builder = self.http.get(self.url("/ai-service/status"));
        let builder = self.prepare(builder, Duration::from_secs(5)).await;
        let resp = self
            .send(builder, "Cannot reach the try-on service")
            .await?;

        if !resp.status().is_success() {
            return Err(Self::http_error(resp).await);
        }
        Self::parse_json(resp, "availability").await
    }
}
