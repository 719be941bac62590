use std::time::Duration;

pub const DEFAULT_ROOT_URL: &str = "https://api.tria.ge";

#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub root_url: String,
    /// Bearer token sent with every request. Not validated client side.
    pub token: String,
    pub user_agent: String,
    pub connect_timeout: Duration,
    /// Applies to request/response calls only; event streams stay open.
    pub request_timeout: Duration,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            root_url: DEFAULT_ROOT_URL.to_string(),
            token: String::new(),
            user_agent: format!("Triage Rust Client/{}", env!("CARGO_PKG_VERSION")),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(60),
        }
    }
}

impl ClientSettings {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            ..Self::default()
        }
    }

    pub fn with_root_url(mut self, root_url: impl Into<String>) -> Self {
        self.root_url = root_url.into();
        self
    }
}
