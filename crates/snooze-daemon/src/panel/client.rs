//! Panel HTTP client

use std::time::Duration;

use async_trait::async_trait;
use chrono::FixedOffset;
use reqwest::{RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;

use snooze_core::config::DaemonConfig;
use snooze_core::error::{ApiError, SnoozeError};
use snooze_core::traits::ServerControl;
use snooze_core::{ManagedServer, ServerId, ServerStats};

use super::session::{Credentials, Session};
use super::wire::{Envelope, LoginData, LoginRequest, RawStats};

/// Client for the management panel's REST API
pub struct PanelClient {
    /// Underlying HTTP client
    http: reqwest::Client,
    /// API root, always ending in `/`
    base_url: Url,
    /// Login credentials
    credentials: Credentials,
    /// Current bearer token
    session: Session,
    /// Offset `started` timestamps are converted to
    offset: FixedOffset,
}

impl PanelClient {
    /// Create a client from the daemon configuration
    pub fn from_config(config: &DaemonConfig) -> Result<Self, SnoozeError> {
        let credentials = Credentials {
            username: config.username.clone(),
            password: config.password.clone(),
        };
        Self::new(
            &config.api_url,
            credentials,
            config.offset()?,
            config.request_timeout,
            config.accept_invalid_certs,
        )
    }

    /// Create a client
    pub fn new(
        api_url: &str,
        credentials: Credentials,
        offset: FixedOffset,
        timeout: Duration,
        accept_invalid_certs: bool,
    ) -> Result<Self, SnoozeError> {
        let mut normalized = api_url.trim().to_string();
        if !normalized.ends_with('/') {
            normalized.push('/');
        }
        let base_url = Url::parse(&normalized).map_err(|e| {
            snooze_core::error::ConfigError::Invalid(format!("invalid api_url '{}': {}", api_url, e))
        })?;

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(accept_invalid_certs)
            .build()
            .map_err(|e| ApiError::Transport(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url,
            credentials,
            session: Session::new(),
            offset,
        })
    }

    /// The session holding the current token
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Exchange the credentials for a bearer token
    pub async fn login(&self) -> Result<(), ApiError> {
        let url = self.endpoint("auth/login")?;
        let body = LoginRequest {
            username: &self.credentials.username,
            password: &self.credentials.password,
        };

        let response = self
            .http
            .post(url.clone())
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        if is_auth_failure(response.status()) {
            return Err(ApiError::Auth(format!(
                "panel rejected credentials for user '{}'",
                self.credentials.username
            )));
        }
        let response = check_status(response)?;

        let envelope: Envelope<LoginData> = decode_json(response).await?;
        let token = envelope
            .into_data("login")?
            .token
            .filter(|token| !token.is_empty())
            .ok_or_else(|| ApiError::Auth("login response carried no token".to_string()))?;

        self.session.replace(token).await;
        tracing::info!("Logged in to panel at {}", self.base_url);
        Ok(())
    }

    /// Send a request built by `build`, re-logging in once on 401/403.
    ///
    /// `build` is called again for the replay, so it must be repeatable.
    async fn execute<F>(&self, build: F) -> Result<Response, ApiError>
    where
        F: Fn(&reqwest::Client) -> RequestBuilder,
    {
        let response = self.send_authorized(&build).await?;
        if !is_auth_failure(response.status()) {
            return check_status(response);
        }

        tracing::info!(
            "Panel answered {} for {}, logging in again",
            response.status(),
            response.url()
        );
        self.login().await?;

        let response = self.send_authorized(&build).await?;
        if is_auth_failure(response.status()) {
            return Err(ApiError::Auth(format!(
                "panel still answered {} for {} after re-login",
                response.status(),
                response.url()
            )));
        }
        check_status(response)
    }

    async fn send_authorized<F>(&self, build: &F) -> Result<Response, ApiError>
    where
        F: Fn(&reqwest::Client) -> RequestBuilder,
    {
        let mut request = build(&self.http);
        if let Some(token) = self.session.token().await {
            request = request.bearer_auth(token);
        }
        request.send().await.map_err(transport_error)
    }

    /// Resolve a path relative to the API root
    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.base_url
            .join(path)
            .map_err(|e| ApiError::Transport(format!("invalid endpoint '{}': {}", path, e)))
    }

    async fn get_data<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = self.endpoint(path)?;
        let response = self.execute(|http| http.get(url.clone())).await?;
        let envelope: Envelope<T> = decode_json(response).await?;
        envelope.into_data(path)
    }

    async fn post_action(&self, server_id: &ServerId, action: &str) -> Result<(), ApiError> {
        let url = self.endpoint(&format!("servers/{}/action/{}", server_id, action))?;
        self.execute(|http| http.post(url.clone())).await?;
        Ok(())
    }
}

#[async_trait]
impl ServerControl for PanelClient {
    async fn list_servers(&self) -> Result<Vec<ManagedServer>, ApiError> {
        self.get_data("servers").await
    }

    async fn fetch_stats(&self, server_id: &ServerId) -> Result<ServerStats, ApiError> {
        let raw: RawStats = self.get_data(&format!("servers/{}/stats", server_id)).await?;
        raw.into_stats(self.offset)
    }

    async fn start_server(&self, server_id: &ServerId) -> Result<(), ApiError> {
        self.post_action(server_id, "start_server").await
    }

    async fn stop_server(&self, server_id: &ServerId) -> Result<(), ApiError> {
        self.post_action(server_id, "stop_server").await
    }
}

fn is_auth_failure(status: StatusCode) -> bool {
    status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN
}

fn check_status(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(ApiError::Status {
            status: status.as_u16(),
            url: response.url().to_string(),
        })
    }
}

fn transport_error(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        ApiError::Transport(format!("request timed out: {}", err))
    } else {
        ApiError::Transport(err.to_string())
    }
}

async fn decode_json<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let url = response.url().to_string();
    let bytes = response.bytes().await.map_err(transport_error)?;
    serde_json::from_slice(&bytes)
        .map_err(|e| ApiError::Decode(format!("invalid JSON from {}: {}", url, e)))
}
