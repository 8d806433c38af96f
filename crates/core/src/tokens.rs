//! Durable storage of the token pair and cached profile
//!
//! [`TokenStore`] is the only owner of credentials. Every write that starts
//! or ends a session bumps a [`Generation`]; writes made on behalf of a
//! request that was started under an older generation are dropped, which is
//! how a refresh finishing after a logout is kept from resurrecting tokens.

use crate::storage::{KeyValueStore, MemoryStore};
use crate::types::{TokenPair, UserProfile};
use crate::CoreResult;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

pub const ACCESS_TOKEN_KEY: &str = "access_token";
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";
pub const USER_KEY: &str = "user";

/// Identifies the stored session a read was made against
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(u64);

struct Inner {
    backend: Arc<dyn KeyValueStore>,
    generation: Mutex<u64>,
}

/// Shared handle to the persisted credentials
#[derive(Clone)]
pub struct TokenStore {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStore")
            .field("generation", &self.generation())
            .field("has_access_token", &self.access_token().is_some())
            .finish_non_exhaustive()
    }
}

impl TokenStore {
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self {
            inner: Arc::new(Inner {
                backend,
                generation: Mutex::new(0),
            }),
        }
    }

    /// Token store over a fresh [`MemoryStore`]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    fn lock_generation(&self) -> MutexGuard<'_, u64> {
        self.inner
            .generation
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Current generation, to be passed back to the conditional writes
    pub fn generation(&self) -> Generation {
        Generation(*self.lock_generation())
    }

    fn read(&self, key: &str) -> Option<String> {
        self.inner.backend.get(key).filter(|value| !value.is_empty())
    }

    pub fn access_token(&self) -> Option<String> {
        self.read(ACCESS_TOKEN_KEY)
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.read(REFRESH_TOKEN_KEY)
    }

    /// Raw serialized profile
    pub fn user_json(&self) -> Option<String> {
        self.read(USER_KEY)
    }

    /// Persist a freshly issued session. Starts a new generation.
    pub fn save_session(&self, tokens: &TokenPair, user: &UserProfile) -> CoreResult<Generation> {
        let user_json = serde_json::to_string(user)?;
        let mut generation = self.lock_generation();
        *generation += 1;

        let backend = &self.inner.backend;
        backend.set(ACCESS_TOKEN_KEY, &tokens.access_token)?;
        backend.set(REFRESH_TOKEN_KEY, &tokens.refresh_token)?;
        backend.set(USER_KEY, &user_json)?;

        debug!(generation = *generation, username = %user.username, "Stored session");
        Ok(Generation(*generation))
    }

    /// Overwrite the access token if the session is still the one `expected`
    /// was taken from and it still holds a refresh token.
    ///
    /// Returns `false` when the write was dropped.
    pub fn replace_access_token(&self, expected: Generation, token: &str) -> CoreResult<bool> {
        let generation = self.lock_generation();
        if Generation(*generation) != expected || self.refresh_token().is_none() {
            debug!(
                expected = expected.0,
                current = *generation,
                "Dropping access token write for a stale session"
            );
            return Ok(false);
        }

        self.inner.backend.set(ACCESS_TOKEN_KEY, token)?;
        Ok(true)
    }

    /// Overwrite the cached profile under the same rule as
    /// [`replace_access_token`](Self::replace_access_token), except that an
    /// access token must still be present.
    pub fn save_user(&self, expected: Generation, user: &UserProfile) -> CoreResult<bool> {
        let user_json = serde_json::to_string(user)?;
        let generation = self.lock_generation();
        if Generation(*generation) != expected || self.access_token().is_none() {
            return Ok(false);
        }

        self.inner.backend.set(USER_KEY, &user_json)?;
        Ok(true)
    }

    /// Remove every stored credential. Starts a new generation.
    ///
    /// All three keys are attempted even when one removal fails; the first
    /// failure is returned.
    pub fn clear(&self) -> CoreResult<()> {
        let mut generation = self.lock_generation();
        *generation += 1;
        self.remove_all()
    }

    /// [`clear`](Self::clear) only if no newer session was stored since
    /// `expected` was taken. Returns whether anything was cleared.
    pub fn clear_if_current(&self, expected: Generation) -> CoreResult<bool> {
        let mut generation = self.lock_generation();
        if Generation(*generation) != expected {
            return Ok(false);
        }
        *generation += 1;
        self.remove_all()?;
        Ok(true)
    }

    fn remove_all(&self) -> CoreResult<()> {
        let backend = &self.inner.backend;
        let mut first_error = None;
        for key in [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY] {
            if let Err(e) = backend.remove(key) {
                warn!(key, error = %e, "Failed to remove stored credential");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Re-read the backend. A changed access token starts a new generation,
    /// since the stored session was replaced behind our back.
    pub fn reload(&self) -> CoreResult<()> {
        let mut generation = self.lock_generation();
        let before = self.access_token();
        self.inner.backend.reload()?;
        if self.access_token() != before {
            *generation += 1;
        }
        Ok(())
    }
}
