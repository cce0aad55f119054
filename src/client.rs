use crate::core::config::ClientConfig;
use crate::core::errors::ClientError;
use crate::core::kernel::{
    CallPool, Callbacks, Dispatcher, Endpoint, PendingCall, ReqwestTransport, RequestBuilder,
    SignedRequest, Transport, TransportConfig,
};
use crate::core::types::{ParamValue, ParameterSet, Session};
use serde_json::Value;
use std::sync::Arc;
use tracing::instrument;

/// A single API invocation: method, parameters and, for background calls,
/// the continuations to run on completion.
///
/// A call runs in the background when a callback is attached or
/// [`force_async`](Self::force_async) is set; otherwise it completes inline.
///
/// ```rust
/// use fbconnect::ApiCall;
///
/// let call = ApiCall::method("fql.query")
///     .param("query", "SELECT name FROM user WHERE uid = 1160")
///     .payload(47_u32)
///     .on_success(|result, _session, payload| {
///         assert_eq!(payload, Some(47));
///         println!("{}", result);
///     });
/// assert!(call.is_async());
/// ```
#[derive(Debug)]
pub struct ApiCall<P = ()> {
    method: Option<String>,
    params: ParameterSet,
    extra: ParameterSet,
    callbacks: Callbacks<P>,
    force_async: bool,
}

impl Default for ApiCall<()> {
    fn default() -> Self {
        Self::new()
    }
}

impl ApiCall<()> {
    /// A call with no method name; set one through the params if needed
    pub fn new() -> Self {
        Self {
            method: None,
            params: ParameterSet::new(),
            extra: ParameterSet::new(),
            callbacks: Callbacks::default(),
            force_async: false,
        }
    }

    pub fn method(name: impl Into<String>) -> Self {
        let mut call = Self::new();
        call.method = Some(name.into());
        call
    }

    /// Attach an opaque value handed back to the completion callback.
    ///
    /// Callbacks attached before this call still run but receive `None`.
    #[must_use]
    pub fn payload<Q: Send + 'static>(self, payload: Q) -> ApiCall<Q> {
        ApiCall {
            method: self.method,
            params: self.params,
            extra: self.extra,
            callbacks: self.callbacks.retype(payload),
            force_async: self.force_async,
        }
    }
}

impl<P: Send + 'static> ApiCall<P> {
    /// Use a copy of `params` as the base parameter set
    #[must_use]
    pub fn params(mut self, params: &ParameterSet) -> Self {
        self.params = params.clone();
        self
    }

    /// Add one named parameter; these win over [`params`](Self::params)
    #[must_use]
    pub fn param(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn on_success<F>(mut self, callback: F) -> Self
    where
        F: FnOnce(Value, Session, Option<P>) + Send + 'static,
    {
        self.callbacks = self.callbacks.on_success(callback);
        self
    }

    #[must_use]
    pub fn on_failure<F>(mut self, callback: F) -> Self
    where
        F: FnOnce(ClientError, Session, Option<P>) + Send + 'static,
    {
        self.callbacks = self.callbacks.on_failure(callback);
        self
    }

    /// Run in the background even without callbacks
    #[must_use]
    pub fn force_async(mut self) -> Self {
        self.force_async = true;
        self
    }

    pub fn is_async(&self) -> bool {
        self.force_async || !self.callbacks.is_empty()
    }

    /// Final parameter set: base params, then extra params, then `method`
    fn merged_params(&self) -> ParameterSet {
        let mut merged = self.params.clone();
        merged.extend(self.extra.iter().map(|(k, v)| (k.clone(), v.clone())));
        if let Some(method) = &self.method {
            merged.insert("method".to_string(), method.into());
        }
        merged
    }
}

/// Outcome of [`FacebookClient::api`].
#[derive(Debug)]
pub enum ApiResponse {
    /// Decoded result of an inline call
    Complete(Value),
    /// Handle to a background call
    Pending(PendingCall),
}

impl ApiResponse {
    pub fn into_value(self) -> Option<Value> {
        match self {
            Self::Complete(value) => Some(value),
            Self::Pending(_) => None,
        }
    }

    pub fn into_pending(self) -> Option<PendingCall> {
        match self {
            Self::Pending(pending) => Some(pending),
            Self::Complete(_) => None,
        }
    }
}

/// Client for the Facebook Connect REST API.
///
/// Holds the credentials every request is signed with. Manages no cookies
/// or session lifetimes: supply a session key/secret if you have one.
pub struct FacebookClient<T: Transport = ReqwestTransport> {
    credentials: Session,
    endpoint: Endpoint,
    builder: RequestBuilder,
    dispatcher: Dispatcher<T>,
    pool: CallPool,
}

impl<T: Transport> std::fmt::Debug for FacebookClient<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FacebookClient")
            .field("credentials", &self.credentials)
            .field("endpoint", &self.endpoint)
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}

impl FacebookClient<ReqwestTransport> {
    /// Create a client talking HTTP through reqwest.
    ///
    /// Fails with [`ClientError::NoSecret`] when neither an app secret nor a
    /// session secret is configured.
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let transport = ReqwestTransport::new(TransportConfig::from_client_config(&config))?;
        Self::with_transport(config, transport)
    }

    /// Client for the public test application, for exploring the API
    pub fn test_app() -> Result<Self, ClientError> {
        Self::new(ClientConfig::default())
    }
}

impl<T: Transport + 'static> FacebookClient<T> {
    /// Create a client on top of any [`Transport`]
    pub fn with_transport(config: ClientConfig, transport: T) -> Result<Self, ClientError> {
        let credentials = config.resolve_session()?;

        Ok(Self {
            credentials,
            endpoint: Endpoint::from_config(&config),
            builder: RequestBuilder::default(),
            dispatcher: Dispatcher::new(Arc::new(transport)),
            pool: CallPool::new(config.max_concurrent_calls),
        })
    }

    /// Route background calls through `pool`, shared with other clients
    #[must_use]
    pub fn with_pool(mut self, pool: CallPool) -> Self {
        self.pool = pool;
        self
    }

    /// Sign with a custom [`RequestBuilder`]
    #[must_use]
    pub fn with_request_builder(mut self, builder: RequestBuilder) -> Self {
        self.builder = builder;
        self
    }

    /// Point the client at another host (`host` or `host:port`)
    pub fn set_domain(&mut self, domain: impl Into<String>) {
        self.endpoint.domain = domain.into();
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn pool(&self) -> &CallPool {
        &self.pool
    }

    pub fn transport(&self) -> &T {
        self.dispatcher.transport()
    }

    /// Snapshot of the credentials this client signs with
    pub fn session(&self) -> Session {
        self.credentials.clone()
    }

    /// Call an API method.
    ///
    /// Inline calls return [`ApiResponse::Complete`] or the error. Background
    /// calls return [`ApiResponse::Pending`] at once; their outcome goes to the
    /// callbacks. Request-building failures such as
    /// [`ClientError::UrlTooLong`] are returned here in both modes, before
    /// any network I/O.
    #[instrument(skip(self, call), fields(method = call.method.as_deref().unwrap_or(""), background = call.is_async()))]
    pub async fn api<P: Send + 'static>(
        &self,
        call: ApiCall<P>,
    ) -> Result<ApiResponse, ClientError> {
        let background = call.is_async();
        let request = self.sign(&call.merged_params())?;

        if background {
            let pending = self.dispatcher.dispatch_async(
                request,
                self.session(),
                call.callbacks,
                Some(&self.pool),
            );
            Ok(ApiResponse::Pending(pending))
        } else {
            self.dispatcher
                .dispatch(&request)
                .await
                .map(ApiResponse::Complete)
        }
    }

    /// Call `method` inline with a copy of `params`
    pub async fn call(&self, method: &str, params: &ParameterSet) -> Result<Value, ClientError> {
        let mut merged = params.clone();
        merged.insert("method".to_string(), method.into());
        let request = self.sign(&merged)?;
        self.dispatcher.dispatch(&request).await
    }

    /// Build the signed request for `params` without sending it
    pub fn sign(&self, params: &ParameterSet) -> Result<SignedRequest, ClientError> {
        self.builder.build(&self.credentials, &self.endpoint, params)
    }
}
