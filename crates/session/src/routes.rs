//! Route table and path matching

use std::collections::BTreeMap;

/// Access rules and presentation attached to a route
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteMeta {
    pub requires_auth: bool,
    pub guest_only: bool,
    pub title: Option<String>,
}

impl RouteMeta {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn requires_auth(mut self) -> Self {
        self.requires_auth = true;
        self
    }

    #[must_use]
    pub const fn guest_only(mut self) -> Self {
        self.guest_only = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Static(String),
    Param(String),
    /// Matches the rest of the path, including nothing
    CatchAll(String),
}

impl Segment {
    fn parse(raw: &str) -> Self {
        let Some(name) = raw.strip_prefix(':') else {
            return Self::Static(raw.to_string());
        };
        // `:name(regex)*` swallows the remainder; `:name(regex)` is a plain param
        let bare = name.split('(').next().unwrap_or(name).to_string();
        if raw.ends_with('*') {
            Self::CatchAll(bare)
        } else {
            Self::Param(bare)
        }
    }
}

fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// One entry of the route table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteRecord {
    path: String,
    name: String,
    meta: RouteMeta,
    segments: Vec<Segment>,
}

impl RouteRecord {
    pub fn new(path: impl Into<String>, name: impl Into<String>, meta: RouteMeta) -> Self {
        let path = path.into();
        let segments = split_path(&path).map(Segment::parse).collect();
        Self {
            path,
            name: name.into(),
            meta,
            segments,
        }
    }

    /// The pattern this record was declared with
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub const fn meta(&self) -> &RouteMeta {
        &self.meta
    }

    /// Match a concrete path (no query or fragment), returning the captured
    /// parameters
    pub fn matches(&self, path: &str) -> Option<BTreeMap<String, String>> {
        let parts: Vec<&str> = split_path(path).collect();
        let mut params = BTreeMap::new();

        for (index, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::CatchAll(name) => {
                    params.insert(name.clone(), parts.get(index..).unwrap_or_default().join("/"));
                    return Some(params);
                }
                Segment::Static(expected) => {
                    if parts.get(index) != Some(&expected.as_str()) {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    let value = parts.get(index)?;
                    params.insert(name.clone(), (*value).to_string());
                }
            }
        }

        (parts.len() == self.segments.len()).then_some(params)
    }
}

/// The application's routes, in match order
pub fn default_routes() -> Vec<RouteRecord> {
    vec![
        RouteRecord::new("/", "home", RouteMeta::titled("MusBlossom - Home")),
        RouteRecord::new(
            "/login",
            "login",
            RouteMeta::titled("Sign in to MusBlossom").guest_only(),
        ),
        RouteRecord::new(
            "/register",
            "register",
            RouteMeta::titled("Join MusBlossom").guest_only(),
        ),
        RouteRecord::new("/posts", "posts", RouteMeta::titled("Community")),
        RouteRecord::new("/posts/:id", "post-detail", RouteMeta::titled("Post")),
        RouteRecord::new(
            "/create-post",
            "create-post",
            RouteMeta::titled("Create post").requires_auth(),
        ),
        RouteRecord::new(
            "/edit-post/:id",
            "edit-post",
            RouteMeta::titled("Edit post").requires_auth(),
        ),
        RouteRecord::new("/playlists", "playlists", RouteMeta::titled("Playlists")),
        RouteRecord::new(
            "/playlists/:id",
            "playlist-detail",
            RouteMeta::titled("Playlist"),
        ),
        RouteRecord::new(
            "/create-playlist",
            "create-playlist",
            RouteMeta::titled("Create playlist").requires_auth(),
        ),
        RouteRecord::new("/concerts", "concerts", RouteMeta::titled("Concerts")),
        RouteRecord::new("/search", "search", RouteMeta::titled("Search")),
        RouteRecord::new(
            "/profile",
            "profile",
            RouteMeta::titled("Profile").requires_auth(),
        ),
        RouteRecord::new(
            "/profile/:username",
            "user-profile",
            RouteMeta::titled("User profile"),
        ),
        RouteRecord::new(
            "/settings",
            "settings",
            RouteMeta::titled("Settings").requires_auth(),
        ),
        RouteRecord::new("/events", "events", RouteMeta::titled("Events")),
        RouteRecord::new(
            "/friends",
            "friends",
            RouteMeta::titled("Friends").requires_auth(),
        ),
        RouteRecord::new(
            "/room/:roomId",
            "music-room",
            RouteMeta::titled("Music room").requires_auth(),
        ),
        RouteRecord::new("/about", "about", RouteMeta::titled("About")),
        RouteRecord::new("/feedback", "feedback", RouteMeta::titled("Feedback")),
        RouteRecord::new(
            "/:pathMatch(.*)*",
            "not-found",
            RouteMeta::titled("Page not found"),
        ),
    ]
}
