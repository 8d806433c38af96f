//! MusBlossom session layer
//!
//! [`SessionManager`] owns the client's view of who is signed in and keeps
//! it in step with the token store. [`Router`] resolves paths against the
//! static route table and asks [`guard::evaluate`] whether the current
//! session may enter them.

pub mod guard;
pub mod manager;
pub mod router;
pub mod routes;

pub use guard::GuardDecision;
pub use manager::{AuthFailure, SessionManager};
pub use router::{Navigation, Router, RouterError};
pub use routes::{RouteMeta, RouteRecord, default_routes};
