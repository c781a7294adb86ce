use std::fmt;
use std::time::Duration;

/// Username/password pair presented to the store.
#[derive(Clone)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Session parameters for a store connection.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the store, e.g. `http://localhost:8086`
    pub endpoint: String,
    /// Credentials presented on every request
    pub credentials: Credentials,
    /// Target dataset; created on connect if absent
    pub dataset: String,
    /// Per-request timeout
    pub timeout: Duration,
}

impl Config {
    /// Creates a config with the default 30 second request timeout.
    pub fn new(
        endpoint: impl Into<String>,
        credentials: Credentials,
        dataset: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            credentials,
            dataset: dataset.into(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}
