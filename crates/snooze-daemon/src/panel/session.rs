//! Panel session state

use std::fmt;

use tokio::sync::RwLock;

/// Login credentials for the panel
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Bearer token shared by every request of one client
///
/// Written only by `PanelClient::login`, read by every request.
#[derive(Default)]
pub struct Session {
    token: RwLock<Option<String>>,
}

impl Session {
    /// Create a session that has not logged in yet
    pub fn new() -> Self {
        Self::default()
    }

    /// Current token, if any
    pub async fn token(&self) -> Option<String> {
        self.token.read().await.clone()
    }

    /// Replace the token after a successful login
    pub async fn replace(&self, token: String) {
        *self.token.write().await = Some(token);
    }
}
