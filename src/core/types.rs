use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Scalar value of a single request parameter.
///
/// The remote API only ever sees the textual form produced by [`fmt::Display`],
/// which is also what goes into the signature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    Str(String),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::Str(v) => f.write_str(v),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<&String> for ParamValue {
    fn from(value: &String) -> Self {
        Self::Str(value.clone())
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for ParamValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<u32> for ParamValue {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

/// Parameters of a single API call, keyed by name.
pub type ParameterSet = BTreeMap<String, ParamValue>;

/// Build a [`ParameterSet`] from `(key, value)` pairs.
pub fn params<K, V, I>(pairs: I) -> ParameterSet
where
    K: Into<String>,
    V: Into<ParamValue>,
    I: IntoIterator<Item = (K, V)>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// Immutable snapshot of the credentials a client signs with.
///
/// Every asynchronous call captures one when it is issued and passes it to
/// whichever callback runs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub api_key: String,
    pub app_secret: Option<String>,
    pub session_key: Option<String>,
    pub session_secret: Option<String>,
}

impl Session {
    /// Secret used for signing: the session secret wins over the app secret.
    pub fn signing_secret(&self) -> Option<&str> {
        self.session_secret
            .as_deref()
            .or(self.app_secret.as_deref())
    }

    pub fn uses_session_secret(&self) -> bool {
        self.session_secret.is_some()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |s: &Option<String>| s.as_ref().map(|_| "[REDACTED]");
        f.debug_struct("Session")
            .field("api_key", &self.api_key)
            .field("app_secret", &redact(&self.app_secret))
            .field("session_key", &self.session_key)
            .field("session_secret", &redact(&self.session_secret))
            .finish()
    }
}
