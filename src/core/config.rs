use crate::core::errors::ClientError;
use crate::core::kernel::dispatch::MAX_CONCURRENT_API_CALLS;
use crate::core::types::Session;
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::env;
use tracing::warn;

/// Public test application key. Good for exploring the API, not for shipping an app.
pub const TEST_API_KEY: &str = "4fce3d843afa190fb41c60e8d2b41469";
/// Secret paired with [`TEST_API_KEY`].
pub const TEST_APP_SECRET: &str = "70b33830655b8f1e7dadf9e43e67d3b6";

pub const DEFAULT_SCHEME: &str = "http";
pub const DEFAULT_DOMAIN: &str = "api.facebook.com";
pub const DEFAULT_REST_PATH: &str = "restserver.php";

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_key: Option<String>,
    pub app_secret: Option<Secret<String>>,
    pub session_key: Option<String>,
    pub session_secret: Option<Secret<String>>,
    pub scheme: String,
    pub domain: String,
    pub rest_path: String,
    pub max_concurrent_calls: usize,
    /// `None` means a hung request holds its pool slot indefinitely.
    pub timeout_seconds: Option<u64>,
    pub user_agent: String,
}

// Never expose secrets in serialization
impl Serialize for ClientConfig {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        use serde::ser::SerializeStruct;
        let redacted = |s: &Option<Secret<String>>| s.as_ref().map(|_| "[REDACTED]");
        let mut state = serializer.serialize_struct("ClientConfig", 10)?;
        state.serialize_field("api_key", &self.api_key)?;
        state.serialize_field("app_secret", &redacted(&self.app_secret))?;
        state.serialize_field("session_key", &self.session_key)?;
        state.serialize_field("session_secret", &redacted(&self.session_secret))?;
        state.serialize_field("scheme", &self.scheme)?;
        state.serialize_field("domain", &self.domain)?;
        state.serialize_field("rest_path", &self.rest_path)?;
        state.serialize_field("max_concurrent_calls", &self.max_concurrent_calls)?;
        state.serialize_field("timeout_seconds", &self.timeout_seconds)?;
        state.serialize_field("user_agent", &self.user_agent)?;
        state.end()
    }
}

impl<'de> Deserialize<'de> for ClientConfig {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct ClientConfigHelper {
            api_key: Option<String>,
            app_secret: Option<String>,
            session_key: Option<String>,
            session_secret: Option<String>,
            scheme: Option<String>,
            domain: Option<String>,
            rest_path: Option<String>,
            max_concurrent_calls: Option<usize>,
            timeout_seconds: Option<u64>,
            user_agent: Option<String>,
        }

        let helper = ClientConfigHelper::deserialize(deserializer)?;
        let defaults = Self::default();
        Ok(Self {
            api_key: non_empty(helper.api_key),
            app_secret: non_empty(helper.app_secret).map(Secret::new),
            session_key: non_empty(helper.session_key),
            session_secret: non_empty(helper.session_secret).map(Secret::new),
            scheme: helper.scheme.unwrap_or(defaults.scheme),
            domain: helper.domain.unwrap_or(defaults.domain),
            rest_path: helper.rest_path.unwrap_or(defaults.rest_path),
            max_concurrent_calls: helper
                .max_concurrent_calls
                .unwrap_or(defaults.max_concurrent_calls),
            timeout_seconds: helper.timeout_seconds,
            user_agent: helper.user_agent.unwrap_or(defaults.user_agent),
        })
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            app_secret: None,
            session_key: None,
            session_secret: None,
            scheme: DEFAULT_SCHEME.to_string(),
            domain: DEFAULT_DOMAIN.to_string(),
            rest_path: DEFAULT_REST_PATH.to_string(),
            max_concurrent_calls: MAX_CONCURRENT_API_CALLS,
            timeout_seconds: None,
            user_agent: "fbconnect/0.1".to_string(),
        }
    }
}

impl ClientConfig {
    /// Create a configuration signing with an application secret
    #[must_use]
    pub fn new(api_key: String, app_secret: String) -> Self {
        Self::default()
            .with_api_key(api_key)
            .with_app_secret(app_secret)
    }

    /// Create a configuration for a user session signed with its session secret
    #[must_use]
    pub fn with_session_secret_only(
        api_key: String,
        session_key: String,
        session_secret: String,
    ) -> Self {
        Self::default()
            .with_api_key(api_key)
            .with_session(session_key, Some(session_secret))
    }

    /// Create configuration from environment variables
    ///
    /// Recognised variables (all optional):
    /// - `{PREFIX}_API_KEY`
    /// - `{PREFIX}_APP_SECRET`
    /// - `{PREFIX}_SESSION_KEY`
    /// - `{PREFIX}_SESSION_SECRET`
    /// - `{PREFIX}_DOMAIN`
    /// - `{PREFIX}_MAX_CONCURRENT_CALLS`
    ///
    /// Without an API key the client later falls back to the test application.
    pub fn from_env(prefix: &str) -> Result<Self, ConfigError> {
        let var = |name: &str| {
            let key = format!("{}_{}", prefix.to_uppercase(), name);
            (non_empty(env::var(&key).ok()), key)
        };

        let (api_key, _) = var("API_KEY");
        let (app_secret, app_secret_var) = var("APP_SECRET");
        let (session_key, _) = var("SESSION_KEY");
        let (session_secret, session_secret_var) = var("SESSION_SECRET");
        let (domain, _) = var("DOMAIN");
        let (max_calls, max_calls_var) = var("MAX_CONCURRENT_CALLS");

        if api_key.is_some() && app_secret.is_none() && session_secret.is_none() {
            return Err(ConfigError::InvalidConfiguration(format!(
                "either {} or {} must be set",
                app_secret_var, session_secret_var
            )));
        }

        let mut config = Self {
            api_key,
            app_secret: app_secret.map(Secret::new),
            session_key,
            session_secret: session_secret.map(Secret::new),
            ..Self::default()
        };

        if let Some(domain) = domain {
            config.domain = domain;
        }

        if let Some(raw) = max_calls {
            config.max_concurrent_calls = raw
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| {
                    ConfigError::InvalidConfiguration(format!(
                        "{} must be a positive integer, got '{}'",
                        max_calls_var, raw
                    ))
                })?;
        }

        Ok(config)
    }

    /// Create configuration from .env file and environment variables
    ///
    /// **Security Warning**: Never commit .env files to version control!
    #[cfg(feature = "env-file")]
    pub fn from_env_file(prefix: &str) -> Result<Self, ConfigError> {
        Self::from_env_file_with_path(prefix, ".env")
    }

    /// Create configuration from a specific .env file path
    #[cfg(feature = "env-file")]
    pub fn from_env_file_with_path(prefix: &str, env_file_path: &str) -> Result<Self, ConfigError> {
        match dotenv::from_path(env_file_path) {
            Ok(_) => {}
            Err(dotenv::Error::Io(io_err)) if io_err.kind() == std::io::ErrorKind::NotFound => {
                // fall through to the process environment
            }
            Err(e) => {
                return Err(ConfigError::InvalidConfiguration(format!(
                    "Failed to load .env file '{}': {}",
                    env_file_path, e
                )));
            }
        }

        Self::from_env(prefix)
    }

    #[must_use]
    pub fn with_api_key(mut self, api_key: String) -> Self {
        self.api_key = non_empty(Some(api_key));
        self
    }

    #[must_use]
    pub fn with_app_secret(mut self, app_secret: String) -> Self {
        self.app_secret = non_empty(Some(app_secret)).map(Secret::new);
        self
    }

    /// Attach a user session. The session secret, when given, is used for signing.
    #[must_use]
    pub fn with_session(mut self, session_key: String, session_secret: Option<String>) -> Self {
        self.session_key = non_empty(Some(session_key));
        self.session_secret = non_empty(session_secret).map(Secret::new);
        self
    }

    /// Set custom API host (`host` or `host:port`)
    #[must_use]
    pub fn domain(mut self, domain: String) -> Self {
        self.domain = domain;
        self
    }

    #[must_use]
    pub fn scheme(mut self, scheme: String) -> Self {
        self.scheme = scheme;
        self
    }

    #[must_use]
    pub fn rest_path(mut self, rest_path: String) -> Self {
        self.rest_path = rest_path;
        self
    }

    #[must_use]
    pub const fn max_concurrent_calls(mut self, slots: usize) -> Self {
        self.max_concurrent_calls = slots;
        self
    }

    #[must_use]
    pub const fn timeout_seconds(mut self, timeout_seconds: u64) -> Self {
        self.timeout_seconds = Some(timeout_seconds);
        self
    }

    /// Check whether a signing secret is configured
    #[must_use]
    pub fn has_secret(&self) -> bool {
        self.app_secret.is_some() || self.session_secret.is_some()
    }

    /// Get app secret (use carefully - exposes secret)
    pub fn app_secret(&self) -> Option<&str> {
        self.app_secret.as_ref().map(|s| s.expose_secret().as_str())
    }

    /// Get session secret (use carefully - exposes secret)
    pub fn session_secret(&self) -> Option<&str> {
        self.session_secret
            .as_ref()
            .map(|s| s.expose_secret().as_str())
    }

    /// Resolve the credentials a client signs with.
    ///
    /// A missing API key selects the public test application (with its app
    /// secret) and logs a warning. Fails with [`ClientError::NoSecret`] when
    /// no secret is left to sign with.
    pub fn resolve_session(&self) -> Result<Session, ClientError> {
        let (api_key, app_secret) = match &self.api_key {
            Some(api_key) => (api_key.clone(), self.app_secret().map(str::to_string)),
            None => {
                warn!(
                    "No API key supplied. Defaulting to the test app API key and app secret. \
                     Register your own application before shipping anything."
                );
                (TEST_API_KEY.to_string(), Some(TEST_APP_SECRET.to_string()))
            }
        };

        let session = Session {
            api_key,
            app_secret,
            session_key: self.session_key.clone(),
            session_secret: self.session_secret().map(str::to_string),
        };

        if session.signing_secret().is_none() {
            return Err(ClientError::NoSecret);
        }
        Ok(session)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvironmentVariable(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}
