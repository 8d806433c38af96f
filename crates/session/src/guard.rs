//! Navigation guard

use crate::routes::RouteMeta;
use musblossom_core::{HOME_PATH, LOGIN_PATH, Session};

/// Outcome of checking a navigation against the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    /// Allow, and load the profile in the background
    AllowAndFetchProfile,
    Redirect(&'static str),
}

/// Decide whether a navigation to a route with `meta` may proceed.
///
/// Checks run in a fixed order; the first that applies wins.
pub fn evaluate(meta: &RouteMeta, session: &Session) -> GuardDecision {
    if meta.requires_auth && !session.is_authenticated {
        return GuardDecision::Redirect(LOGIN_PATH);
    }
    if meta.guest_only && session.is_authenticated {
        return GuardDecision::Redirect(HOME_PATH);
    }
    if session.is_authenticated && session.user.is_none() {
        return GuardDecision::AllowAndFetchProfile;
    }
    GuardDecision::Allow
}

#[cfg(test)]
mod tests {
    use super::*;
    use musblossom_core::UserProfile;

    fn anonymous() -> Session {
        Session::default()
    }

    fn signed_in() -> Session {
        Session::signed_in(UserProfile::new("bob"))
    }

    fn authenticated_without_profile() -> Session {
        Session {
            is_authenticated: true,
            ..Session::default()
        }
    }

    #[test]
    fn test_protected_route_redirects_anonymous_to_login() {
        let meta = RouteMeta::default().requires_auth();
        assert_eq!(evaluate(&meta, &anonymous()), GuardDecision::Redirect("/login"));
        assert_eq!(evaluate(&meta, &signed_in()), GuardDecision::Allow);
    }

    #[test]
    fn test_guest_route_redirects_signed_in_home() {
        let meta = RouteMeta::default().guest_only();
        assert_eq!(evaluate(&meta, &signed_in()), GuardDecision::Redirect("/"));
        assert_eq!(evaluate(&meta, &anonymous()), GuardDecision::Allow);
    }

    #[test]
    fn test_missing_profile_triggers_fetch() {
        let meta = RouteMeta::default();
        assert_eq!(
            evaluate(&meta, &authenticated_without_profile()),
            GuardDecision::AllowAndFetchProfile
        );
        assert_eq!(evaluate(&meta, &anonymous()), GuardDecision::Allow);
    }

    #[test]
    fn test_auth_check_runs_before_guest_check() {
        // A route flagged both ways sends anonymous users to login
        let meta = RouteMeta::default().requires_auth().guest_only();
        assert_eq!(evaluate(&meta, &anonymous()), GuardDecision::Redirect("/login"));
        assert_eq!(evaluate(&meta, &signed_in()), GuardDecision::Redirect("/"));
    }
}
