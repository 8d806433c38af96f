//! MusBlossom HTTP client
//!
//! Two clients live here. [`client::AuthClient`] talks to the `/auth/*`
//! credential endpoints and never intercepts anything. [`client::ApiClient`]
//! is used for everything else: it attaches the stored access token and, on a
//! 401, refreshes it once and re-sends the request.

#[macro_use]
extern crate tracing;

pub mod client;
pub mod types;

pub use client::error::ClientError;
pub use client::{ApiClient, ApiClientBuilder, ApiRequest, AuthApi, AuthClient};
