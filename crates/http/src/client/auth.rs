//! Credential endpoints
//!
//! These calls bypass the refresh interceptor: a 401 from `/auth/login` means
//! wrong credentials, not an expired token.

use super::{ClientError, build_http_client};
use crate::types::{AuthResponse, LoginRequest, MeResponse, RefreshResponse, RegisterRequest};
use async_trait::async_trait;
use reqwest::{Client, Method, header};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// The four `/auth/*` calls the session layer depends on.
///
/// Implementations return `Ok` whenever the server answered with a parsable
/// envelope, including rejections (`success: false`) sent with a 4xx status.
/// `Err` means the exchange itself failed.
#[async_trait]
pub trait AuthApi: Send + Sync {
    /// `POST /auth/login`
    async fn login(&self, request: &LoginRequest) -> Result<AuthResponse, ClientError>;

    /// `POST /auth/register`
    async fn register(&self, request: &RegisterRequest) -> Result<AuthResponse, ClientError>;

    /// `POST /auth/refresh` with the refresh token as bearer credential
    async fn refresh(&self, refresh_token: &str) -> Result<RefreshResponse, ClientError>;

    /// `GET /auth/me` with the access token as bearer credential
    async fn me(&self, access_token: &str) -> Result<MeResponse, ClientError>;
}

/// Client for the credential endpoints
#[derive(Clone)]
pub struct AuthClient {
    client: Client,
    base_url: String,
}

impl AuthClient {
    /// Create a new auth client
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        Self::with_timeout(base_url, None)
    }

    /// Create a new auth client with optional timeout
    pub fn with_timeout(
        base_url: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Result<Self, ClientError> {
        let client = build_http_client(timeout, None)?;
        Ok(Self::from_parts(client, base_url.into()))
    }

    pub(crate) fn from_parts(client: Client, base_url: String) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        self.client.request(method, url)
    }

    /// Send and parse the envelope whatever the status code
    async fn execute<T: DeserializeOwned>(
        &self,
        path: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ClientError> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        match serde_json::from_str(&body) {
            Ok(envelope) => {
                debug!(path, status = status.as_u16(), "auth endpoint answered");
                Ok(envelope)
            }
            Err(e) if status.is_success() => Err(e.into()),
            Err(_) => {
                let message = if body.is_empty() {
                    status.to_string()
                } else {
                    body
                };
                Err(ClientError::from_status(status, message))
            }
        }
    }
}

#[async_trait]
impl AuthApi for AuthClient {
    async fn login(&self, request: &LoginRequest) -> Result<AuthResponse, ClientError> {
        let req = self.request(Method::POST, "/auth/login").json(request);
        self.execute("/auth/login", req).await
    }

    async fn register(&self, request: &RegisterRequest) -> Result<AuthResponse, ClientError> {
        let req = self.request(Method::POST, "/auth/register").json(request);
        self.execute("/auth/register", req).await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<RefreshResponse, ClientError> {
        let req = self
            .request(Method::POST, "/auth/refresh")
            .header(header::AUTHORIZATION, format!("Bearer {refresh_token}"));
        self.execute("/auth/refresh", req).await
    }

    async fn me(&self, access_token: &str) -> Result<MeResponse, ClientError> {
        let req = self
            .request(Method::GET, "/auth/me")
            .header(header::AUTHORIZATION, format!("Bearer {access_token}"));
        self.execute("/auth/me", req).await
    }
}
