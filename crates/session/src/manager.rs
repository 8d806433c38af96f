//! Session lifecycle
//!
//! Every mutating operation writes the token store first, then publishes
//! the auth event, then navigates.

use musblossom_core::{
    AuthEvent, AuthEvents, Generation, HOME_PATH, LOGIN_PATH, Navigator, Session, TokenStore,
    UserProfile,
};
use musblossom_http::AuthApi;
use musblossom_http::types::{AuthResponse, LoginRequest, RegisterRequest};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const LOGIN_FAILED: &str = "Login failed";
const REGISTRATION_FAILED: &str = "Registration failed";

/// Why a login or registration did not produce a session
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthFailure {
    /// The server refused; carries its message or a generic one
    #[error("{0}")]
    Rejected(String),

    #[error("Unable to connect to the server")]
    Connection,

    #[error("Could not store session: {0}")]
    Storage(String),
}

struct Inner {
    state: RwLock<Session>,
    tokens: TokenStore,
    auth: Arc<dyn AuthApi>,
    navigator: Arc<dyn Navigator>,
    events: AuthEvents,
}

/// Owner of the in-memory session
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

impl SessionManager {
    pub fn new(
        tokens: TokenStore,
        auth: Arc<dyn AuthApi>,
        navigator: Arc<dyn Navigator>,
        events: AuthEvents,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: RwLock::new(Session::default()),
                tokens,
                auth,
                navigator,
                events,
            }),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Session> {
        self.inner
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Session> {
        self.inner
            .state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of the current session
    pub fn session(&self) -> Session {
        self.read().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.read().is_authenticated
    }

    pub fn user(&self) -> Option<UserProfile> {
        self.read().user.clone()
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.inner.tokens
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.inner.events.subscribe()
    }

    /// Restore the session persisted by an earlier run. Never touches the
    /// network.
    pub fn init(&self) {
        let tokens = &self.inner.tokens;
        let (Some(_), Some(raw_user)) = (tokens.access_token(), tokens.user_json()) else {
            debug!("No stored session");
            return;
        };

        match serde_json::from_str::<UserProfile>(&raw_user) {
            Ok(user) => {
                info!(username = %user.username, "Session restored from storage");
                *self.write() = Session::signed_in(user);
            }
            Err(e) => {
                warn!(error = %e, "Stored profile is unreadable, discarding session");
                self.clear_auth_data();
            }
        }
    }

    /// Remove all stored credentials and forget the user
    pub fn clear_auth_data(&self) {
        if let Err(e) = self.inner.tokens.clear() {
            warn!(error = %e, "Failed to clear stored credentials");
        }
        self.write().sign_out();
    }

    /// Register a new account and sign in with it
    ///
    /// # Errors
    ///
    /// Returns the failure also recorded in [`Session::error`]
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
        bio: Option<&str>,
    ) -> Result<UserProfile, AuthFailure> {
        let request = RegisterRequest {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            bio: bio.unwrap_or_default().to_string(),
        };

        self.begin_request();
        let result = match self.inner.auth.register(&request).await {
            Ok(response) => self.complete_sign_in(response, REGISTRATION_FAILED, AuthEvent::Registered),
            Err(e) => {
                warn!(error = %e, "Registration request failed");
                Err(AuthFailure::Connection)
            }
        };
        self.finish_request(result.as_ref().err());
        result
    }

    /// Sign in with an email and password
    ///
    /// # Errors
    ///
    /// Returns the failure also recorded in [`Session::error`]
    pub async fn login(&self, identifier: &str, password: &str) -> Result<UserProfile, AuthFailure> {
        let request = LoginRequest {
            email: identifier.to_string(),
            password: password.to_string(),
        };

        self.begin_request();
        let result = match self.inner.auth.login(&request).await {
            Ok(response) => self.complete_sign_in(response, LOGIN_FAILED, AuthEvent::LoggedIn),
            Err(e) => {
                warn!(error = %e, "Login request failed");
                Err(AuthFailure::Connection)
            }
        };
        self.finish_request(result.as_ref().err());
        result
    }

    fn begin_request(&self) {
        let mut state = self.write();
        state.is_loading = true;
        state.error = None;
    }

    fn finish_request(&self, failure: Option<&AuthFailure>) {
        let mut state = self.write();
        state.is_loading = false;
        if let Some(failure) = failure {
            state.error = Some(failure.to_string());
        }
    }

    fn complete_sign_in(
        &self,
        response: AuthResponse,
        fallback: &str,
        event: fn(UserProfile) -> AuthEvent,
    ) -> Result<UserProfile, AuthFailure> {
        let rejection = response.rejection_message();
        let Some((tokens, user)) = response.into_session() else {
            let message = rejection.unwrap_or_else(|| fallback.to_string());
            info!(%message, "Credentials rejected");
            return Err(AuthFailure::Rejected(message));
        };

        self.inner
            .tokens
            .save_session(&tokens, &user)
            .map_err(|e| AuthFailure::Storage(e.to_string()))?;

        {
            let mut state = self.write();
            state.user = Some(user.clone());
            state.is_authenticated = true;
        }

        info!(username = %user.username, "Signed in");
        self.inner.events.emit(event(user.clone()));
        self.inner.navigator.replace(HOME_PATH);
        Ok(user)
    }

    /// Sign out locally. Safe to call repeatedly.
    pub fn logout(&self) {
        self.clear_auth_data();
        self.inner.events.emit(AuthEvent::LoggedOut);
        if self.inner.navigator.current_path() != LOGIN_PATH {
            self.inner.navigator.push(LOGIN_PATH);
        }
        info!("Logged out");
    }

    /// Exchange the refresh token for a new access token.
    ///
    /// Returns `false` without a request when no refresh token is stored.
    /// A rejected or failed refresh discards the stored session.
    pub async fn refresh_token(&self) -> bool {
        let tokens = &self.inner.tokens;
        let generation = tokens.generation();
        let Some(refresh_token) = tokens.refresh_token() else {
            debug!("No refresh token available");
            return false;
        };

        let access_token = match self.inner.auth.refresh(&refresh_token).await {
            Ok(response) => response.into_access_token(),
            Err(e) => {
                warn!(error = %e, "Token refresh request failed");
                None
            }
        };

        let Some(access_token) = access_token else {
            self.discard_session(generation);
            return false;
        };

        match tokens.replace_access_token(generation, &access_token) {
            Ok(true) => {
                debug!("Access token refreshed");
                true
            }
            Ok(false) => {
                debug!("Session ended while refreshing, dropping new access token");
                false
            }
            Err(e) => {
                warn!(error = %e, "Failed to store refreshed access token");
                false
            }
        }
    }

    /// Load the signed-in user's profile from the server.
    ///
    /// An explicit rejection discards the stored session; a transport
    /// failure leaves everything as it was.
    pub async fn fetch_current_user(&self) -> Option<UserProfile> {
        let tokens = &self.inner.tokens;
        let generation = tokens.generation();
        let access_token = tokens.access_token()?;

        let response = match self.inner.auth.me(&access_token).await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Fetching current user failed");
                return None;
            }
        };

        let Some(user) = response.into_user() else {
            info!("Server rejected the access token, discarding session");
            self.discard_session(generation);
            return None;
        };

        match tokens.save_user(generation, &user) {
            Ok(true) => {}
            Ok(false) => {
                debug!("Session ended while fetching profile");
                return None;
            }
            Err(e) => warn!(error = %e, "Failed to store profile"),
        }

        self.write().user = Some(user.clone());
        Some(user)
    }

    /// Re-derive the session from storage alone, picking up changes made
    /// by other clients sharing the store.
    pub fn sync_with_storage(&self) {
        let tokens = &self.inner.tokens;
        if let Err(e) = tokens.reload() {
            warn!(error = %e, "Failed to reload session storage");
        }

        let restored = match (tokens.access_token(), tokens.user_json()) {
            (Some(_), Some(raw_user)) => serde_json::from_str::<UserProfile>(&raw_user).ok(),
            _ => None,
        };

        let mut state = self.write();
        match restored {
            Some(user) => {
                state.user = Some(user);
                state.is_authenticated = true;
            }
            None => state.sign_out(),
        }
        debug!(authenticated = state.is_authenticated, "Session synced with storage");
    }

    /// Keep the session in step with the store when the HTTP client gives
    /// up on a session.
    ///
    /// The task runs until aborted.
    pub fn watch_storage(&self) -> JoinHandle<()> {
        let manager = self.clone();
        let mut events = self.subscribe();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(AuthEvent::SessionExpired) => manager.sync_with_storage(),
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Missed auth events, resyncing");
                        manager.sync_with_storage();
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }

    fn discard_session(&self, generation: Generation) {
        match self.inner.tokens.clear_if_current(generation) {
            Ok(true) => self.write().sign_out(),
            Ok(false) => debug!("Stored session already replaced"),
            Err(e) => {
                warn!(error = %e, "Failed to clear stored credentials");
                self.write().sign_out();
            }
        }
    }
}
