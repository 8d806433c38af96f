//! MusBlossom client core types and utilities
//!
//! Everything the session layer shares: the session data model, the token
//! store and its key-value backends, the navigator abstraction standing in
//! for browser history, the auth event bus and client configuration.

pub mod config;
pub mod error;
pub mod events;
pub mod navigator;
pub mod storage;
pub mod tokens;
pub mod types;

pub use config::{ApiConfig, ClientConfig, StorageConfig};
pub use error::{CoreError, CoreResult};
pub use events::{AuthEvent, AuthEvents};
pub use navigator::{MemoryNavigator, Navigator};
pub use storage::{FileStore, KeyValueStore, MemoryStore};
pub use tokens::{Generation, TokenStore};
pub use types::{Session, TokenPair, UserProfile};

/// Path of the home route
pub const HOME_PATH: &str = "/";

/// Path of the login route
pub const LOGIN_PATH: &str = "/login";
