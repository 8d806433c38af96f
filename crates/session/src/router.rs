//! Client-side router
//!
//! Resolves a path against the route table, sets the page title, runs the
//! guard and commits the navigation to the [`Navigator`].

use crate::guard::{self, GuardDecision};
use crate::manager::SessionManager;
use crate::routes::{RouteRecord, default_routes};
use musblossom_core::Navigator;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Upper bound on guard redirects followed for one navigation
pub const MAX_REDIRECTS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouterError {
    #[error("No route matches {0}")]
    NoMatch(String),

    #[error("Too many redirects while navigating to {0}")]
    TooManyRedirects(String),
}

/// A committed navigation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Navigation {
    /// Name of the route that was entered
    pub name: String,
    /// Path that is now current
    pub path: String,
    pub params: BTreeMap<String, String>,
    /// Originally requested path, when the guard redirected
    pub redirected_from: Option<String>,
}

pub struct Router {
    routes: Vec<RouteRecord>,
    session: SessionManager,
    navigator: Arc<dyn Navigator>,
}

impl Router {
    pub fn new(
        routes: Vec<RouteRecord>,
        session: SessionManager,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            routes,
            session,
            navigator,
        }
    }

    /// Router over [`default_routes`]
    pub fn with_default_routes(session: SessionManager, navigator: Arc<dyn Navigator>) -> Self {
        Self::new(default_routes(), session, navigator)
    }

    pub fn routes(&self) -> &[RouteRecord] {
        &self.routes
    }

    /// First route matching `path`, with its parameters
    pub fn resolve(&self, path: &str) -> Option<(&RouteRecord, BTreeMap<String, String>)> {
        let path = strip_query(path);
        self.routes
            .iter()
            .find_map(|route| route.matches(path).map(|params| (route, params)))
    }

    /// Navigate to `path`, following guard redirects.
    ///
    /// # Errors
    ///
    /// Fails when no route matches or the guard keeps redirecting.
    pub fn navigate(&self, path: &str) -> Result<Navigation, RouterError> {
        let requested = path.to_string();
        let mut target = strip_query(path).to_string();
        let mut redirected_from = None;

        for _ in 0..=MAX_REDIRECTS {
            let (route, params) = self
                .resolve(&target)
                .ok_or_else(|| RouterError::NoMatch(target.clone()))?;

            if let Some(title) = &route.meta().title {
                self.navigator.set_title(title);
            }

            match guard::evaluate(route.meta(), &self.session.session()) {
                GuardDecision::Redirect(to) => {
                    debug!(from = %target, %to, "navigation redirected");
                    redirected_from.get_or_insert_with(|| requested.clone());
                    target = to.to_string();
                    continue;
                }
                GuardDecision::AllowAndFetchProfile => self.spawn_profile_fetch(),
                GuardDecision::Allow => {}
            }

            let from = self.navigator.current_path();
            if from != target {
                self.navigator.push(&target);
            }
            debug!("navigated from {from} to {target}");

            return Ok(Navigation {
                name: route.name().to_string(),
                path: target,
                params,
                redirected_from,
            });
        }

        Err(RouterError::TooManyRedirects(requested))
    }

    fn spawn_profile_fetch(&self) {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let session = self.session.clone();
                handle.spawn(async move {
                    session.fetch_current_user().await;
                });
            }
            Err(_) => warn!("No async runtime, skipping profile fetch"),
        }
    }
}

fn strip_query(path: &str) -> &str {
    let end = path.find(['?', '#']).unwrap_or(path.len());
    &path[..end]
}
