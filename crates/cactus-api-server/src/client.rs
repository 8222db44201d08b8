//! HTTP client for the API server
//!
//! Holds one transport for its lifetime. A client configured with a
//! [`TokenProvider`] recovers from a rejected real-time handshake by fetching a
//! fresh token and retrying on the same transport.

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::{header::AUTHORIZATION, StatusCode};
use futures::stream::{self, BoxStream, StreamExt};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::ClientError;
use crate::health::{watch_health_check_path, HealthCheckResponse, HEALTH_CHECK_PATH};

/// Supplies bearer tokens on demand
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn get_token(&self) -> Result<String, ClientError>;
}

/// Error envelope rendered by the server
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

pub struct ApiServerClient {
    base_url: String,
    realtime_channel_path: String,
    http: reqwest::Client,
    token: RwLock<Option<String>>,
    token_provider: Option<Arc<dyn TokenProvider>>,
}

impl std::fmt::Debug for ApiServerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiServerClient")
            .field("base_url", &self.base_url)
            .field("has_token", &self.token.read().is_some())
            .field("has_token_provider", &self.token_provider.is_some())
            .finish()
    }
}

impl ApiServerClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, reqwest::Client::new())
    }

    pub fn with_client(base_url: impl Into<String>, http: reqwest::Client) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            realtime_channel_path: cactus_authz::config::default_realtime_channel_path(),
            http,
            token: RwLock::new(None),
            token_provider: None,
        }
    }

    /// Token sent as `Authorization: Bearer <token>`
    pub fn with_token(self, token: impl Into<String>) -> Self {
        *self.token.write() = Some(token.into());
        self
    }

    pub fn with_token_provider(mut self, provider: Arc<dyn TokenProvider>) -> Self {
        self.token_provider = Some(provider);
        self
    }

    pub fn with_realtime_channel_path(mut self, path: impl Into<String>) -> Self {
        self.realtime_channel_path = path.into();
        self
    }

    pub fn token(&self) -> Option<String> {
        self.token.read().clone()
    }

    pub fn set_token(&self, token: impl Into<String>) {
        *self.token.write() = Some(token.into());
    }

    pub async fn get_health_check(&self) -> Result<HealthCheckResponse, ClientError> {
        self.get_json(HEALTH_CHECK_PATH).await
    }

    /// GET `path` and decode the JSON body
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let response = self.send_get(path).await?;
        let response = check_status(response).await?;
        Ok(response.json().await?)
    }

    /// Open the health check watch channel.
    ///
    /// Authorization happens once, here. On a 401 the token provider, if
    /// any, is asked for a new token and the handshake is retried once.
    pub async fn watch_health_check(
        &self,
    ) -> Result<BoxStream<'static, Result<HealthCheckResponse, ClientError>>, ClientError> {
        let path = watch_health_check_path(&self.realtime_channel_path);
        let mut response = self.send_get(&path).await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            if let Some(provider) = &self.token_provider {
                debug!(path = %path, "Handshake rejected, refreshing token");
                let token = provider.get_token().await?;
                self.set_token(token);
                response = self.send_get(&path).await?;
                if response.status().is_success() {
                    info!(path = %path, "Handshake accepted after token refresh");
                }
            }
        }

        let response = check_status(response).await?;
        Ok(sse_json_stream(response))
    }

    async fn send_get(&self, path: &str) -> Result<reqwest::Response, ClientError> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.http.get(&url);
        if let Some(token) = self.token() {
            request = request.header(AUTHORIZATION, format!("Bearer {}", token));
        }
        Ok(request.send().await?)
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .map(|body| body.error)
        .unwrap_or(text);
    Err(ClientError::Status {
        status: status.as_u16(),
        message,
    })
}

/// Decode the `data:` lines of a server-sent event stream as JSON.
/// Comment frames such as keep-alives are skipped.
fn sse_json_stream<T>(response: reqwest::Response) -> BoxStream<'static, Result<T, ClientError>>
where
    T: DeserializeOwned + Send + 'static,
{
    let bytes = response.bytes_stream().boxed();

    stream::unfold((bytes, Vec::<u8>::new()), |(mut bytes, mut buffer)| async move {
        loop {
            if let Some(end) = buffer.windows(2).position(|w| w == b"\n\n") {
                let frame: Vec<u8> = buffer.drain(..end + 2).collect();
                let frame = String::from_utf8_lossy(&frame);
                let data = frame
                    .lines()
                    .filter_map(|line| line.strip_prefix("data:"))
                    .map(str::trim_start)
                    .collect::<Vec<_>>()
                    .join("\n");
                if data.is_empty() {
                    continue;
                }
                let item = serde_json::from_str::<T>(&data).map_err(ClientError::from);
                return Some((item, (bytes, buffer)));
            }

            match bytes.next().await {
                Some(Ok(chunk)) => buffer.extend_from_slice(&chunk),
                Some(Err(e)) => return Some((Err(ClientError::from(e)), (bytes, buffer))),
                None => return None,
            }
        }
    })
    .boxed()
}
