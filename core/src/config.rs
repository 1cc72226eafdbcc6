//! Client configuration.
//!
//! `ClientConfig` is plain serde data so it can be read from JSON; an
//! injected `Session` (an already configured backend client) is code-only.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::ConfigError;
use crate::transport::HyperClient;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Which transport a configured client drives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Ureq,
    Reqwest,
    Hyper,
}

impl Backend {
    /// Whether calls through this backend must be awaited.
    pub fn is_suspending(self) -> bool {
        !matches!(self, Backend::Ureq)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Backend::Ureq => "ureq",
            Backend::Reqwest => "reqwest",
            Backend::Hyper => "hyper",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A caller-owned backend client to reuse instead of creating one.
#[derive(Clone)]
pub enum Session {
    Ureq(ureq::Agent),
    Reqwest(reqwest::Client),
    Hyper(HyperClient),
}

impl Session {
    pub fn backend(&self) -> Backend {
        match self {
            Session::Ureq(_) => Backend::Ureq,
            Session::Reqwest(_) => Backend::Reqwest,
            Session::Hyper(_) => Backend::Hyper,
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Session").field(&self.backend()).finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    pub base_url: String,
    /// Default headers sent on every call.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Per-request timeout, in seconds when read from JSON.
    #[serde(default = "default_timeout", deserialize_with = "timeout_from_secs")]
    pub timeout: Duration,
    #[serde(default)]
    pub client_type: Backend,
    /// Mock table seed, `[{"name": ..., "output": ...}]`.
    #[serde(default)]
    pub mock_config: Option<Value>,
    #[serde(skip)]
    pub session: Option<Session>,
}

impl ClientConfig {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            headers: BTreeMap::new(),
            timeout: DEFAULT_TIMEOUT,
            client_type: Backend::default(),
            mock_config: None,
            session: None,
        }
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_string(), value.to_string());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn client_type(mut self, backend: Backend) -> Self {
        self.client_type = backend;
        self
    }

    pub fn mock_config(mut self, config: Value) -> Self {
        self.mock_config = Some(config);
        self
    }

    /// Inject a session; the backend follows the session's kind.
    pub fn session(mut self, session: Session) -> Self {
        self.client_type = session.backend();
        self.session = Some(session);
        self
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    /// Check the settings a client cannot run without.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::EmptyBaseUrl);
        }
        if let Some(session) = &self.session {
            if session.backend() != self.client_type {
                return Err(ConfigError::SessionMismatch {
                    backend: self.client_type,
                    session: session.backend(),
                });
            }
        }
        Ok(())
    }
}

fn default_timeout() -> Duration {
    DEFAULT_TIMEOUT
}

fn timeout_from_secs<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    let secs = f64::deserialize(deserializer)?;
    Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
}
