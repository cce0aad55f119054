/// Kernel module - request signing, transport and dispatch
///
/// The kernel turns a parameter mapping into a signed GET request against the
/// REST server and executes it, either inline or on a background task gated
/// by a shared [`CallPool`].
///
/// # Architecture
///
/// - [`signer`]: canonical `key=value` encoding and the MD5 signature
/// - [`request`]: merges identity fields, signs, encodes and length-checks
/// - [`rest`]: the [`Transport`] trait and its reqwest implementation
/// - [`dispatch`]: inline and pooled background execution with callbacks
///
/// # Usage Examples
///
/// ## Signing and dispatching by hand
/// ```rust,no_run
/// use fbconnect::core::config::ClientConfig;
/// use fbconnect::core::kernel::*;
/// use fbconnect::core::types::params;
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), fbconnect::ClientError> {
/// let config = ClientConfig::new("my_api_key".to_string(), "my_app_secret".to_string());
/// let session = config.resolve_session()?;
/// let endpoint = Endpoint::from_config(&config);
///
/// let request = RequestBuilder::default().build(
///     &session,
///     &endpoint,
///     &params([("method", "fql.query"), ("query", "SELECT name FROM user WHERE uid = 1160")]),
/// )?;
///
/// let transport = ReqwestTransport::new(TransportConfig::from_client_config(&config))?;
/// let dispatcher = Dispatcher::new(Arc::new(transport));
/// let names = dispatcher.dispatch(&request).await?;
/// # let _ = names;
/// # Ok(())
/// # }
/// ```
///
/// ## Background calls sharing one pool
/// ```rust,no_run
/// use fbconnect::core::kernel::*;
/// use fbconnect::core::types::Session;
///
/// # fn example(dispatcher: Dispatcher<ReqwestTransport>, request: SignedRequest, session: Session) {
/// let pool = CallPool::new(MAX_CONCURRENT_API_CALLS);
/// let callbacks = Callbacks::new()
///     .on_success(|result, _session, payload: Option<u32>| {
///         tracing::info!(?result, ?payload, "call finished");
///     })
///     .on_failure(|error, _session, _payload| {
///         tracing::warn!(%error, "call failed");
///     })
///     .with_payload(47);
///
/// let pending = dispatcher.dispatch_async(request, session, callbacks, Some(&pool));
/// # drop(pending);
/// # }
/// ```
pub mod dispatch;
pub mod request;
pub mod rest;
pub mod signer;

// Re-export key types for convenience
pub use dispatch::{
    CallPool, Callbacks, Dispatcher, FailureCallback, PendingCall, SuccessCallback,
    MAX_CONCURRENT_API_CALLS,
};
pub use request::{qs_encode, CallIdClock, Endpoint, RequestBuilder, SignedRequest, MAX_URL_BYTES};
pub use rest::{decode_body, ReqwestTransport, Transport, TransportConfig};
pub use signer::{sig_encode, sign_pairs, Md5Signer, Signer};
