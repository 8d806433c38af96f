//! MusBlossom API client
//!
//! Request flow for [`ApiClient::execute`]:
//!
//! ```text
//! Sent -> Success | Failure
//! Failure(401, attempt < MAX_AUTH_RETRIES) -> Refresh -> RetrySent -> Success | Failure
//!                                                 \-> RefreshFailed -> logged out, redirected
//! ```
//!
//! The attempt counter travels with the call instead of living on the
//! request, so the retried request is byte-for-byte the original one apart
//! from the bearer token.

pub mod account;
pub mod auth;
pub mod error;

pub use auth::{AuthApi, AuthClient};

use error::ClientError;
use musblossom_core::{
    ApiConfig, AuthEvent, AuthEvents, Generation, LOGIN_PATH, MemoryNavigator, Navigator,
    TokenStore,
};
use reqwest::{Client, ClientBuilder, Method, header};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::Duration;

/// How many times a request is re-sent after a successful token refresh
pub const MAX_AUTH_RETRIES: u32 = 1;

const DEFAULT_USER_AGENT: &str = concat!("musblossom-client/", env!("CARGO_PKG_VERSION"));

pub(crate) fn build_http_client(
    timeout: Option<Duration>,
    user_agent: Option<String>,
) -> Result<Client, ClientError> {
    let user_agent = user_agent.unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());

    #[cfg(not(target_arch = "wasm32"))]
    let client = {
        let mut builder = ClientBuilder::new().user_agent(user_agent);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        builder.build()?
    };

    #[cfg(target_arch = "wasm32")]
    let client = {
        let _ = timeout; // Timeouts not supported on WASM
        ClientBuilder::new().user_agent(user_agent).build()?
    };

    Ok(client)
}

/// Description of a request, independent of any attempt to send it
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: Option<JsonValue>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Append a query parameter
    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Set a JSON body
    pub fn json<T: Serialize>(mut self, body: &T) -> Result<Self, ClientError> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }
}

/// Client for authenticated API calls
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    tokens: TokenStore,
    auth: Arc<dyn AuthApi>,
    navigator: Arc<dyn Navigator>,
    events: AuthEvents,
}

impl ApiClient {
    /// Create a new client builder
    pub fn builder() -> ApiClientBuilder {
        ApiClientBuilder::default()
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The credential-endpoint client used for refreshing
    pub fn auth(&self) -> Arc<dyn AuthApi> {
        Arc::clone(&self.auth)
    }

    /// Send `request` and decode the response body.
    ///
    /// A 401 triggers one token refresh and one re-send. If the refresh
    /// fails the stored session is cleared, the navigator is sent to the
    /// login page and [`ClientError::SessionExpired`] is returned.
    pub async fn execute<T: DeserializeOwned>(&self, request: &ApiRequest) -> Result<T, ClientError> {
        let mut attempt = 0;
        loop {
            let generation = self.tokens.generation();
            match self.send(request, attempt).await {
                Err(err) if err.is_auth_expired() && attempt < MAX_AUTH_RETRIES => {
                    debug!(path = %request.path, attempt, "access token rejected, refreshing");
                    self.recover_session(generation).await?;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: &ApiRequest,
        attempt: u32,
    ) -> Result<T, ClientError> {
        let url = format!("{}{}", self.base_url, request.path);
        let mut builder = self.client.request(request.method.clone(), url);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(token) = self.tokens.access_token() {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        debug!(
            method = %request.method,
            path = %request.path,
            status = status.as_u16(),
            attempt,
            "API call"
        );

        if status.is_success() {
            let text = response.text().await?;
            // Empty bodies (204 and friends) decode as JSON null
            let body = if text.trim().is_empty() { "null" } else { text.as_str() };
            Ok(serde_json::from_str(body)?)
        } else {
            let message = response.text().await.unwrap_or_else(|_| status.to_string());
            warn!(method = %request.method, path = %request.path, status = status.as_u16(), "API error");
            Err(ClientError::from_status(status, message))
        }
    }

    /// Obtain a new access token with the stored refresh token.
    ///
    /// `Ok` means the request should be re-sent with whatever access token is
    /// stored now.
    async fn recover_session(&self, generation: Generation) -> Result<(), ClientError> {
        let outcome = match self.tokens.refresh_token() {
            None => Err("no refresh token".to_string()),
            Some(refresh_token) => match self.auth.refresh(&refresh_token).await {
                Ok(response) => response
                    .into_access_token()
                    .ok_or_else(|| "refresh rejected by server".to_string()),
                Err(e) => Err(e.to_string()),
            },
        };

        match outcome {
            Ok(access_token) => {
                if self.tokens.replace_access_token(generation, &access_token)? {
                    info!("Access token refreshed");
                    Ok(())
                } else {
                    self.superseded()
                }
            }
            Err(reason) => {
                warn!(%reason, "Token refresh failed");
                if self.expire_session(generation) {
                    Err(ClientError::SessionExpired(reason))
                } else {
                    self.superseded()
                }
            }
        }
    }

    /// The stored session changed while a refresh was in flight. A newer
    /// session gets the retry; an ended one is left to whoever ended it.
    fn superseded(&self) -> Result<(), ClientError> {
        if self.tokens.access_token().is_some() {
            debug!("stored session replaced while refreshing, retrying with it");
            Ok(())
        } else {
            Err(ClientError::AuthenticationFailed(
                "session ended while refreshing".to_string(),
            ))
        }
    }

    /// Clear the stored session and send the navigator to the login page,
    /// unless a newer session has been stored since `generation`. Returns
    /// whether the session was expired.
    fn expire_session(&self, generation: Generation) -> bool {
        match self.tokens.clear_if_current(generation) {
            Ok(true) => {}
            Ok(false) => {
                debug!("stored session already replaced, leaving it alone");
                return false;
            }
            Err(e) => warn!(error = %e, "Failed to clear stored session"),
        }

        self.events.emit(AuthEvent::SessionExpired);
        if self.navigator.current_path() != LOGIN_PATH {
            self.navigator.push(LOGIN_PATH);
        }
        true
    }
}

/// Builder for [`ApiClient`]
#[derive(Default)]
pub struct ApiClientBuilder {
    base_url: Option<String>,
    timeout: Option<Duration>,
    user_agent: Option<String>,
    tokens: Option<TokenStore>,
    auth: Option<Arc<dyn AuthApi>>,
    navigator: Option<Arc<dyn Navigator>>,
    events: Option<AuthEvents>,
}

impl ApiClientBuilder {
    /// Take base URL, timeout and user agent from configuration
    #[must_use]
    pub fn config(self, config: &ApiConfig) -> Self {
        self.base_url(&config.base_url)
            .timeout(config.timeout())
            .user_agent(&config.user_agent)
    }

    /// Set the base URL
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the request timeout
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the user agent
    #[must_use]
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Token store to read bearer tokens from; defaults to an empty
    /// in-memory store
    #[must_use]
    pub fn tokens(mut self, tokens: TokenStore) -> Self {
        self.tokens = Some(tokens);
        self
    }

    /// Credential endpoints used for refreshing; defaults to an
    /// [`AuthClient`] on the same base URL
    #[must_use]
    pub fn auth(mut self, auth: Arc<dyn AuthApi>) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Navigator redirected to the login page when the session expires
    #[must_use]
    pub fn navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = Some(navigator);
        self
    }

    /// Bus on which [`AuthEvent::SessionExpired`] is published
    #[must_use]
    pub fn events(mut self, events: AuthEvents) -> Self {
        self.events = Some(events);
        self
    }

    /// Build the client
    pub fn build(self) -> Result<ApiClient, ClientError> {
        let base_url = self
            .base_url
            .ok_or_else(|| ClientError::Configuration("base_url is required".into()))?;

        // Ensure base_url ends without a trailing slash
        let base_url = base_url.trim_end_matches('/').to_string();

        let client = build_http_client(self.timeout, self.user_agent)?;
        let auth = self.auth.unwrap_or_else(|| {
            Arc::new(AuthClient::from_parts(client.clone(), base_url.clone()))
        });

        Ok(ApiClient {
            client,
            base_url,
            tokens: self.tokens.unwrap_or_else(TokenStore::in_memory),
            auth,
            navigator: self
                .navigator
                .unwrap_or_else(|| Arc::new(MemoryNavigator::default())),
            events: self.events.unwrap_or_default(),
        })
    }
}
