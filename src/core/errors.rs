use serde_json::Value;
use thiserror::Error;

/// Base error for every failure the client reports.
///
/// Synchronous calls return these directly. Asynchronous calls hand them to
/// the failure callback, or surface them from [`PendingCall::wait`] when no
/// failure callback was registered.
///
/// [`PendingCall::wait`]: crate::core::kernel::PendingCall::wait
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("URL too long: {length} bytes exceeds the {limit}-byte limit for GET requests")]
    UrlTooLong { length: usize, limit: usize },

    #[error("A client needs either an app secret or a session secret to make API calls")]
    NoSecret,

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Facebook API error: {code} - {message}")]
    FacebookApi {
        code: i64,
        message: String,
        body: Value,
    },

    #[error("Configuration error: {0}")]
    Config(#[from] crate::core::config::ConfigError),

    #[error("Call interrupted: {0}")]
    Interrupted(String),
}

impl ClientError {
    /// Build an API error from a decoded response mapping carrying `error_code`.
    pub(crate) fn from_api_body(body: Value) -> Self {
        let code = match body.get("error_code") {
            Some(Value::Number(n)) => n.as_i64().unwrap_or_default(),
            Some(Value::String(s)) => s.trim().parse().unwrap_or_default(),
            _ => 0,
        };
        let message = body
            .get("error_msg")
            .map(|msg| match msg {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .unwrap_or_default();

        Self::FacebookApi {
            code,
            message,
            body,
        }
    }

    /// The remote `error_code`, if this is an API-level error.
    pub fn api_error_code(&self) -> Option<i64> {
        match self {
            Self::FacebookApi { code, .. } => Some(*code),
            _ => None,
        }
    }

    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_api_error_from_body() {
        let body = json!({
            "error_code": 601,
            "error_msg": "Parser error: unexpected 'A BAD QUERY' at position 0.",
            "request_args": [],
        });
        let err = ClientError::from_api_body(body.clone());

        assert_eq!(err.api_error_code(), Some(601));
        match err {
            ClientError::FacebookApi {
                code,
                message,
                body: raw,
            } => {
                assert_eq!(code, 601);
                assert!(message.starts_with("Parser error"));
                assert_eq!(raw, body);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_api_error_with_string_code_and_no_message() {
        let err = ClientError::from_api_body(json!({ "error_code": "100" }));
        assert_eq!(err.api_error_code(), Some(100));
        assert_eq!(err.to_string(), "Facebook API error: 100 - ");
    }

    #[test]
    fn test_url_too_long_display() {
        let err = ClientError::UrlTooLong {
            length: 2048,
            limit: 2000,
        };
        assert!(err.to_string().contains("2048"));
        assert!(err.api_error_code().is_none());
        assert!(!err.is_network());
    }
}
