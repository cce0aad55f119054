use crate::core::config::ClientConfig;
use crate::core::errors::ClientError;
use crate::core::kernel::signer::{Md5Signer, Signer};
use crate::core::types::{ParamValue, ParameterSet, Session};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;
use url::form_urlencoded;

/// GET requests longer than this are rejected before any network I/O.
pub const MAX_URL_BYTES: usize = 2000;
pub const RESPONSE_FORMAT: &str = "json";
pub const API_VERSION: &str = "1.0";

/// Where signed requests are sent: `scheme://domain/rest_path`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub scheme: String,
    pub domain: String,
    pub rest_path: String,
}

impl Endpoint {
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            scheme: config.scheme.clone(),
            domain: config.domain.clone(),
            rest_path: config.rest_path.clone(),
        }
    }

    pub fn base_url(&self) -> String {
        format!(
            "{}://{}/{}",
            self.scheme,
            self.domain,
            self.rest_path.trim_start_matches('/')
        )
    }
}

/// A fully signed call, ready for dispatch.
#[derive(Debug, Clone)]
pub struct SignedRequest {
    params: ParameterSet,
    url: String,
}

impl SignedRequest {
    /// Every parameter sent, including `sig`
    pub fn params(&self) -> &ParameterSet {
        &self.params
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn method(&self) -> Option<String> {
        self.params.get("method").map(ToString::to_string)
    }

    pub fn signature(&self) -> Option<String> {
        self.params.get("sig").map(ToString::to_string)
    }
}

/// Source of `call_id` values: wall-clock microseconds, never repeating.
#[derive(Debug, Default)]
pub struct CallIdClock {
    last: AtomicU64,
}

impl CallIdClock {
    pub fn next_id(&self) -> u64 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros() as u64)
            .unwrap_or_default();

        let mut previous = self.last.load(Ordering::Relaxed);
        loop {
            let candidate = now.max(previous + 1);
            match self.last.compare_exchange_weak(
                previous,
                candidate,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return candidate,
                Err(current) => previous = current,
            }
        }
    }
}

/// Turns call parameters into a signed request URL.
#[derive(Clone)]
pub struct RequestBuilder {
    signer: Arc<dyn Signer>,
    clock: Arc<CallIdClock>,
}

impl std::fmt::Debug for RequestBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestBuilder").finish_non_exhaustive()
    }
}

impl Default for RequestBuilder {
    fn default() -> Self {
        Self::new(Arc::new(Md5Signer))
    }
}

impl RequestBuilder {
    pub fn new(signer: Arc<dyn Signer>) -> Self {
        Self {
            signer,
            clock: Arc::new(CallIdClock::default()),
        }
    }

    /// Sign `call_params` for `session` and render the request URL.
    ///
    /// The caller's parameters are copied, never modified. Fails with
    /// [`ClientError::UrlTooLong`] when the URL exceeds [`MAX_URL_BYTES`].
    pub fn build(
        &self,
        session: &Session,
        endpoint: &Endpoint,
        call_params: &ParameterSet,
    ) -> Result<SignedRequest, ClientError> {
        let mut params = call_params.clone();

        let secret = if let Some(secret) = session.session_secret.as_deref() {
            params.insert("ss".to_string(), ParamValue::Int(1));
            secret
        } else if let Some(secret) = session.app_secret.as_deref() {
            secret
        } else {
            return Err(ClientError::NoSecret);
        };

        if let Some(session_key) = &session.session_key {
            params.insert("session_key".to_string(), session_key.into());
        }

        params.insert("api_key".to_string(), (&session.api_key).into());
        params.insert(
            "call_id".to_string(),
            ParamValue::Str(self.clock.next_id().to_string()),
        );
        params.insert("format".to_string(), RESPONSE_FORMAT.into());
        params.insert("v".to_string(), API_VERSION.into());

        let sig = self.signer.sign(&params, secret);
        params.insert("sig".to_string(), ParamValue::Str(sig));

        let url = format!("{}?{}", endpoint.base_url(), qs_encode(&params));
        if url.len() > MAX_URL_BYTES {
            return Err(ClientError::UrlTooLong {
                length: url.len(),
                limit: MAX_URL_BYTES,
            });
        }

        let method = params
            .get("method")
            .map(ToString::to_string)
            .unwrap_or_default();
        debug!(method = %method, url_len = url.len(), "signed request");

        Ok(SignedRequest { params, url })
    }
}

/// Percent-encode (UTF-8, space as `+`) and join pairs sorted by their encoded form.
pub fn qs_encode(params: &ParameterSet) -> String {
    let mut pairs: Vec<String> = params
        .iter()
        .map(|(k, v)| format!("{}={}", urlencode(k), urlencode(&v.to_string())))
        .collect();
    pairs.sort_unstable();
    pairs.join("&")
}

fn urlencode(raw: &str) -> String {
    form_urlencoded::byte_serialize(raw.as_bytes()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::params;

    fn app_session() -> Session {
        Session {
            api_key: "test-key".to_string(),
            app_secret: Some("app-secret".to_string()),
            session_key: None,
            session_secret: None,
        }
    }

    fn endpoint() -> Endpoint {
        Endpoint::from_config(&ClientConfig::default())
    }

    #[test]
    fn test_build_adds_standard_fields() {
        let builder = RequestBuilder::default();
        let call = params([("method", "fql.query")]);
        let request = builder.build(&app_session(), &endpoint(), &call).unwrap();

        let p = request.params();
        assert_eq!(p["api_key"], ParamValue::from("test-key"));
        assert_eq!(p["format"], ParamValue::from("json"));
        assert_eq!(p["v"], ParamValue::from("1.0"));
        assert!(p.contains_key("call_id"));
        assert!(!p.contains_key("ss"));
        assert!(!p.contains_key("session_key"));
        assert_eq!(request.method().as_deref(), Some("fql.query"));
        assert!(request
            .url()
            .starts_with("http://api.facebook.com/restserver.php?"));
    }

    #[test]
    fn test_signature_covers_everything_but_sig() {
        let builder = RequestBuilder::default();
        let call = params([("method", "users.getInfo"), ("uids", "1160")]);
        let request = builder.build(&app_session(), &endpoint(), &call).unwrap();

        let mut unsigned = request.params().clone();
        let sig = unsigned.remove("sig").unwrap().to_string();
        assert_eq!(sig.len(), 32);
        assert_eq!(sig, Md5Signer.sign(&unsigned, "app-secret"));
    }

    #[test]
    fn test_session_secret_sets_ss_and_signs_with_it() {
        let session = Session {
            api_key: "test-key".to_string(),
            app_secret: Some("app-secret".to_string()),
            session_key: Some("sess-key".to_string()),
            session_secret: Some("sess-secret".to_string()),
        };
        let request = RequestBuilder::default()
            .build(&session, &endpoint(), &ParameterSet::new())
            .unwrap();

        let mut unsigned = request.params().clone();
        let sig = unsigned.remove("sig").unwrap().to_string();
        assert_eq!(unsigned["ss"], ParamValue::Int(1));
        assert_eq!(unsigned["session_key"], ParamValue::from("sess-key"));
        assert_eq!(sig, Md5Signer.sign(&unsigned, "sess-secret"));
    }

    #[test]
    fn test_session_key_with_app_secret() {
        let mut session = app_session();
        session.session_key = Some("sess-key".to_string());
        let request = RequestBuilder::default()
            .build(&session, &endpoint(), &ParameterSet::new())
            .unwrap();

        assert!(!request.params().contains_key("ss"));
        assert_eq!(request.params()["session_key"], ParamValue::from("sess-key"));
    }

    #[test]
    fn test_missing_secret_fails() {
        let mut session = app_session();
        session.app_secret = None;
        let result = RequestBuilder::default().build(&session, &endpoint(), &ParameterSet::new());
        assert!(matches!(result, Err(ClientError::NoSecret)));
    }

    #[test]
    fn test_caller_params_untouched() {
        let call = params([("method", "fql.query"), ("query", "SELECT 1")]);
        let before = call.clone();
        RequestBuilder::default()
            .build(&app_session(), &endpoint(), &call)
            .unwrap();
        assert_eq!(call, before);
    }

    #[test]
    fn test_url_too_long() {
        let call = params([("query", "x".repeat(MAX_URL_BYTES))]);
        let result = RequestBuilder::default().build(&app_session(), &endpoint(), &call);
        match result {
            Err(ClientError::UrlTooLong { length, limit }) => {
                assert!(length > MAX_URL_BYTES);
                assert_eq!(limit, MAX_URL_BYTES);
            }
            other => panic!("expected UrlTooLong, got {:?}", other),
        }
    }

    #[test]
    fn test_url_length_counts_encoded_bytes() {
        // 400 'é' are 800 UTF-8 bytes and 2400 bytes once percent-encoded
        let call = params([("q", "é".repeat(400))]);
        let result = RequestBuilder::default().build(&app_session(), &endpoint(), &call);
        assert!(matches!(result, Err(ClientError::UrlTooLong { .. })));
    }

    #[test]
    fn test_qs_encode_sorts_and_escapes() {
        let p = params([
            ("query", "SELECT name FROM user WHERE uid = 1160"),
            ("b&c", "ü"),
            ("a", "1"),
        ]);
        assert_eq!(
            qs_encode(&p),
            "a=1&b%26c=%C3%BC&query=SELECT+name+FROM+user+WHERE+uid+%3D+1160"
        );
    }

    #[test]
    fn test_endpoint_override() {
        let config = ClientConfig::default()
            .domain("127.0.0.1:8080".to_string())
            .rest_path("/restserver.php".to_string());
        assert_eq!(
            Endpoint::from_config(&config).base_url(),
            "http://127.0.0.1:8080/restserver.php"
        );
    }

    #[test]
    fn test_call_ids_strictly_increase() {
        let clock = CallIdClock::default();
        let mut previous = clock.next_id();
        for _ in 0..1000 {
            let next = clock.next_id();
            assert!(next > previous);
            previous = next;
        }
    }
}
