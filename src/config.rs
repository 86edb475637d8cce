//! Client configuration

use crate::error::{ApiError, ApiResult};
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable listing the service key directories
pub const KEY_DIRS_ENV: &str = "OPENGEVER_APICLIENT_KEY_DIRS";

/// Environment variable with text appended to the user agent
pub const USER_AGENT_ENV: &str = "OPENGEVER_APICLIENT_USER_AGENT";

/// Renew a token when it expires within this window
pub const DEFAULT_RENEW_BEFORE: Duration = Duration::from_secs(60);

/// Lifetime requested for each signed assertion
pub const DEFAULT_SESSION_LIFETIME: Duration = Duration::from_secs(60 * 60);

/// Longest lifetime accepted for a signed assertion
pub const MAX_SESSION_LIFETIME: Duration = Duration::from_secs(24 * 60 * 60);

const USER_AGENT_PRODUCT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Configuration shared by every client of one [`ApiContext`](crate::ApiContext)
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Directories scanned for `*.json` service key files, in load order
    pub key_dirs: Vec<PathBuf>,
    /// Caller supplied text appended to the user agent
    pub user_agent_suffix: Option<String>,
    /// Request timeout in seconds
    pub timeout: Option<u64>,
    pub renew_before: Duration,
    pub session_lifetime: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            key_dirs: Vec::new(),
            user_agent_suffix: None,
            timeout: None,
            renew_before: DEFAULT_RENEW_BEFORE,
            session_lifetime: DEFAULT_SESSION_LIFETIME,
        }
    }
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read key directories and user agent suffix from the environment
    pub fn from_env() -> Self {
        let key_dirs = std::env::var(KEY_DIRS_ENV)
            .map(|value| Self::parse_key_dirs(&value))
            .unwrap_or_default();
        let user_agent_suffix = std::env::var(USER_AGENT_ENV)
            .ok()
            .filter(|value| !value.trim().is_empty());

        tracing::debug!(
            target: "config",
            key_dirs = ?key_dirs,
            user_agent_suffix = ?user_agent_suffix,
            "Loaded client configuration from environment"
        );

        Self {
            key_dirs,
            user_agent_suffix,
            ..Self::default()
        }
    }

    /// Split a path-separator-delimited list, ignoring empty entries
    pub fn parse_key_dirs(value: &str) -> Vec<PathBuf> {
        std::env::split_paths(value)
            .filter(|path| !path.as_os_str().is_empty())
            .collect()
    }

    pub fn with_key_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.key_dirs.push(dir.into());
        self
    }

    pub fn with_key_dirs<I, P>(mut self, dirs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.key_dirs = dirs.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_user_agent_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.user_agent_suffix = Some(suffix.into());
        self
    }

    /// Set request timeout in seconds
    pub fn with_timeout(mut self, timeout: u64) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_renew_before(mut self, renew_before: Duration) -> Self {
        self.renew_before = renew_before;
        self
    }

    pub fn with_session_lifetime(mut self, lifetime: Duration) -> Self {
        self.session_lifetime = lifetime;
        self
    }

    /// User agent sent with every request
    pub fn user_agent(&self) -> String {
        match &self.user_agent_suffix {
            Some(suffix) => format!("{} {}", USER_AGENT_PRODUCT, suffix)
                .trim()
                .to_string(),
            None => USER_AGENT_PRODUCT.to_string(),
        }
    }

    /// Reject session policies that could hand out tokens inside the renewal window.
    ///
    /// Assertion timestamps have whole-second resolution, so the threshold is
    /// rounded up and must leave at least one second of the lifetime.
    pub fn validate(&self) -> ApiResult<()> {
        let lifetime = self.session_lifetime.as_secs();
        if lifetime == 0 {
            return Err(ApiError::Config(
                "session lifetime must be at least one second".to_string(),
            ));
        }
        if self.session_lifetime > MAX_SESSION_LIFETIME {
            return Err(ApiError::Config(format!(
                "session lifetime ({}s) must not exceed {}s",
                lifetime,
                MAX_SESSION_LIFETIME.as_secs()
            )));
        }

        let renew_before = self.renew_before.as_secs()
            + u64::from(self.renew_before.subsec_nanos() > 0);
        if renew_before.saturating_add(1) >= lifetime {
            return Err(ApiError::Config(format!(
                "renewal threshold ({}s, rounded up) must be more than one second shorter than the session lifetime ({}s)",
                renew_before, lifetime
            )));
        }
        if self.timeout == Some(0) {
            return Err(ApiError::Config("timeout must not be zero".to_string()));
        }
        Ok(())
    }
}
