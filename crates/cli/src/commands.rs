//! CLI commands

use anyhow::{Result, bail};
use clap::Subcommand;
use musblossom_core::{AuthEvents, ClientConfig, FileStore, MemoryNavigator, Navigator, TokenStore};
use musblossom_http::{ApiClient, ApiRequest};
use musblossom_http::types::StatusResponse;
use musblossom_session::{Router, SessionManager};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Subcommand)]
pub enum Commands {
    /// Sign in with email and password
    Login { email: String, password: String },

    /// Create an account and sign in with it
    Register {
        username: String,
        email: String,
        password: String,

        /// Short profile text
        #[arg(long)]
        bio: Option<String>,
    },

    /// Forget the stored session
    Logout,

    /// Show the signed-in user
    Whoami,

    /// Exchange the refresh token for a new access token
    Refresh,

    /// Resolve a path through the router and its guard
    Navigate { path: String },

    /// List the route table
    Routes,

    /// Change the account password
    ChangePassword {
        current_password: String,
        new_password: String,
    },

    /// Permanently delete the account and sign out
    DeleteAccount { password: String },

    /// Authenticated GET against the API, printing the JSON response
    Get {
        path: String,

        /// Query parameter as key=value; repeatable
        #[arg(short, long = "query", value_parser = parse_query_pair)]
        query: Vec<(String, String)>,
    },
}

/// Everything a command needs, wired to the persisted session
struct Client {
    api: ApiClient,
    session: SessionManager,
    navigator: Arc<MemoryNavigator>,
}

impl Client {
    fn open(config: &ClientConfig) -> Result<Self> {
        let store = FileStore::open(config.storage.resolved_path())?;
        debug!(path = %store.path().display(), "Opened session store");
        let tokens = TokenStore::new(Arc::new(store));
        let navigator = Arc::new(MemoryNavigator::default());
        let events = AuthEvents::new();

        let api = ApiClient::builder()
            .config(&config.api)
            .tokens(tokens.clone())
            .navigator(navigator.clone())
            .events(events.clone())
            .build()?;
        let session = SessionManager::new(tokens, api.auth(), navigator.clone(), events);
        session.init();

        Ok(Self {
            api,
            session,
            navigator,
        })
    }
}

impl Commands {
    pub async fn execute(self, config: ClientConfig) -> Result<()> {
        let client = Client::open(&config)?;
        let watcher = client.session.watch_storage();

        let result = self.run(&client).await;

        watcher.abort();
        result
    }

    async fn run(self, client: &Client) -> Result<()> {
        let session = &client.session;

        match self {
            Self::Login { email, password } => {
                let user = session.login(&email, &password).await?;
                println!("Logged in as {}", user.username);
            }
            Self::Register {
                username,
                email,
                password,
                bio,
            } => {
                let user = session
                    .register(&username, &email, &password, bio.as_deref())
                    .await?;
                println!("Registered and logged in as {}", user.username);
            }
            Self::Logout => {
                session.logout();
                println!("Logged out");
            }
            Self::Whoami => {
                if !session.is_authenticated() {
                    bail!("Not logged in");
                }
                // Prefer the server's view; fall back to the stored profile offline
                match session.fetch_current_user().await.or_else(|| session.user()) {
                    Some(user) => println!("{}", serde_json::to_string_pretty(&user)?),
                    None => bail!("Session is no longer valid"),
                }
            }
            Self::Refresh => {
                if !session.refresh_token().await {
                    bail!("Could not refresh the session; log in again");
                }
                println!("Access token refreshed");
            }
            Self::Navigate { path } => {
                let router = Router::with_default_routes(session.clone(), client.navigator.clone());
                let navigation = router.navigate(&path)?;
                if let Some(from) = &navigation.redirected_from {
                    println!("{from} -> {}", navigation.path);
                } else {
                    println!("{}", navigation.path);
                }
                println!("  route: {}", navigation.name);
                for (name, value) in &navigation.params {
                    println!("  {name}: {value}");
                }
                if let Some(title) = client.navigator.title() {
                    println!("  title: {title}");
                }
            }
            Self::Routes => {
                let router = Router::with_default_routes(session.clone(), client.navigator.clone());
                for route in router.routes() {
                    let meta = route.meta();
                    let access = if meta.requires_auth {
                        "auth"
                    } else if meta.guest_only {
                        "guest"
                    } else {
                        "public"
                    };
                    println!("{:<20} {:<16} {access}", route.path(), route.name());
                }
            }
            Self::ChangePassword {
                current_password,
                new_password,
            } => {
                let response = client
                    .api
                    .change_password(current_password, new_password)
                    .await?;
                report_status(&response, "Password changed")?;
            }
            Self::DeleteAccount { password } => {
                let response = client.api.delete_account(password).await?;
                report_status(&response, "Account deleted")?;
                session.logout();
                info!("Account deleted, session cleared");
            }
            Self::Get { path, query } => {
                let request = query
                    .into_iter()
                    .fold(ApiRequest::get(path), |request, (key, value)| {
                        request.query(key, value)
                    });
                let body: Value = client.api.execute(&request).await?;
                println!("{}", serde_json::to_string_pretty(&body)?);
            }
        }

        debug!(path = %client.navigator.current_path(), "Command finished");
        Ok(())
    }
}

fn parse_query_pair(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .ok_or_else(|| format!("expected key=value, got {raw:?}"))
}

fn report_status(response: &StatusResponse, fallback: &str) -> Result<()> {
    if !response.success {
        bail!(
            "{}",
            response
                .error
                .as_deref()
                .unwrap_or("The server rejected the request")
        );
    }
    println!("{}", response.message.as_deref().unwrap_or(fallback));
    Ok(())
}
