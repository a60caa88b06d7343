use std::path::{Path, PathBuf};
use std::time::Duration;

use url::Url;

use crate::error::Error;

/// Interval between tier checks while a customer waits for a tier.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Client configuration.
///
/// The endpoint is the only required field and is a constructor parameter.
///
/// ```rust,ignore
/// use appmoo_client::ClientConfig;
///
/// let config = ClientConfig::new("http://192.168.10.123:8000/graphql".parse()?)
///     .with_request_timeout(std::time::Duration::from_secs(10));
/// ```
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct ClientConfig {
    pub(crate) endpoint: Url,
    pub(crate) poll_interval: Duration,
    pub(crate) request_timeout: Option<Duration>,
    pub(crate) store_path: Option<PathBuf>,
}

impl ClientConfig {
    #[must_use]
    pub fn new(endpoint: Url) -> Self {
        Self {
            endpoint,
            poll_interval: DEFAULT_POLL_INTERVAL,
            request_timeout: None,
            store_path: None,
        }
    }

    /// Create config from environment variables.
    ///
    /// # Required env vars
    /// - `APPMOO_GRAPHQL_URL`: GraphQL endpoint
    ///
    /// # Optional env vars
    /// - `APPMOO_POLL_INTERVAL_SECS`: tier polling interval (default 5)
    /// - `APPMOO_REQUEST_TIMEOUT_SECS`: per-request timeout (default none)
    /// - `APPMOO_STORE_PATH`: session file for [`FileStore`](crate::FileStore)
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the endpoint is missing or any value fails to parse.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let endpoint = lookup("APPMOO_GRAPHQL_URL")
            .ok_or_else(|| Error::Config("APPMOO_GRAPHQL_URL is required".into()))?;
        let endpoint: Url = endpoint
            .parse()
            .map_err(|e| Error::Config(format!("APPMOO_GRAPHQL_URL: {e}")))?;

        let mut config = Self::new(endpoint);

        if let Some(secs) = lookup("APPMOO_POLL_INTERVAL_SECS") {
            let secs = parse_secs("APPMOO_POLL_INTERVAL_SECS", &secs)?;
            if secs == 0 {
                return Err(Error::Config(
                    "APPMOO_POLL_INTERVAL_SECS must be at least 1".into(),
                ));
            }
            config = config.with_poll_interval(Duration::from_secs(secs));
        }
        if let Some(secs) = lookup("APPMOO_REQUEST_TIMEOUT_SECS") {
            let secs = parse_secs("APPMOO_REQUEST_TIMEOUT_SECS", &secs)?;
            config = config.with_request_timeout(Duration::from_secs(secs));
        }
        if let Some(path) = lookup("APPMOO_STORE_PATH").filter(|p| !p.trim().is_empty()) {
            config = config.with_store_path(path);
        }

        Ok(config)
    }

    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn with_store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.store_path = Some(path.into());
        self
    }

    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    #[must_use]
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout
    }

    #[must_use]
    pub fn store_path(&self) -> Option<&Path> {
        self.store_path.as_deref()
    }
}

fn parse_secs(key: &str, value: &str) -> Result<u64, Error> {
    value
        .trim()
        .parse()
        .map_err(|e| Error::Config(format!("{key}: {e}")))
}
