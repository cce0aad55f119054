//! Synchronous and background execution of signed requests.
//!
//! Background calls run on their own tokio task. Each task first takes a slot
//! from a [`CallPool`], so at most `slots` fetches sharing a pool are in
//! flight at once; issuing calls never blocks the caller. There is no
//! timeout unless the transport sets one: a hung fetch keeps its slot.

use crate::core::errors::ClientError;
use crate::core::kernel::request::SignedRequest;
use crate::core::kernel::rest::Transport;
use crate::core::types::Session;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument};

/// Default number of background calls allowed in flight per pool.
pub const MAX_CONCURRENT_API_CALLS: usize = 4;

/// Invoked with `(result, session, payload)` after a successful call.
pub type SuccessCallback<P> = Box<dyn FnOnce(Value, Session, Option<P>) + Send + 'static>;
/// Invoked with `(error, session, payload)` after a failed call.
pub type FailureCallback<P> = Box<dyn FnOnce(ClientError, Session, Option<P>) + Send + 'static>;

/// Admission gate shared by every background call routed through it.
///
/// Cloning shares the same slots, which is how several clients enforce one
/// global cap.
#[derive(Debug, Clone)]
pub struct CallPool {
    semaphore: Arc<Semaphore>,
    slots: usize,
}

impl Default for CallPool {
    fn default() -> Self {
        Self::new(MAX_CONCURRENT_API_CALLS)
    }
}

impl CallPool {
    /// Create a pool with `slots` concurrent calls (at least one).
    pub fn new(slots: usize) -> Self {
        let slots = slots.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(slots)),
            slots,
        }
    }

    pub fn slots(&self) -> usize {
        self.slots
    }

    /// Slots free right now
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Calls currently holding a slot
    pub fn in_flight(&self) -> usize {
        self.slots.saturating_sub(self.available())
    }

    /// Stop admitting calls. Calls waiting for a slot fail with
    /// [`ClientError::Interrupted`]; calls already in flight finish.
    pub fn close(&self) {
        self.semaphore.close();
    }

    pub fn is_closed(&self) -> bool {
        self.semaphore.is_closed()
    }

    /// Wait for a free slot. The slot is released when the guard drops.
    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit, ClientError> {
        Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| ClientError::Interrupted("call pool closed".to_string()))
    }
}

/// Completion continuations of a background call, plus an opaque payload
/// handed back to whichever one runs.
pub struct Callbacks<P> {
    on_success: Option<SuccessCallback<P>>,
    on_failure: Option<FailureCallback<P>>,
    payload: Option<P>,
}

impl<P> Default for Callbacks<P> {
    fn default() -> Self {
        Self {
            on_success: None,
            on_failure: None,
            payload: None,
        }
    }
}

impl<P> std::fmt::Debug for Callbacks<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Callbacks")
            .field("on_success", &self.on_success.is_some())
            .field("on_failure", &self.on_failure.is_some())
            .field("has_payload", &self.payload.is_some())
            .finish()
    }
}

impl<P: Send + 'static> Callbacks<P> {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn on_success<F>(mut self, callback: F) -> Self
    where
        F: FnOnce(Value, Session, Option<P>) + Send + 'static,
    {
        self.on_success = Some(Box::new(callback));
        self
    }

    #[must_use]
    pub fn on_failure<F>(mut self, callback: F) -> Self
    where
        F: FnOnce(ClientError, Session, Option<P>) + Send + 'static,
    {
        self.on_failure = Some(Box::new(callback));
        self
    }

    #[must_use]
    pub fn with_payload(mut self, payload: P) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Whether any continuation is attached
    pub fn is_empty(&self) -> bool {
        self.on_success.is_none() && self.on_failure.is_none()
    }

    /// Re-type the payload. Existing callbacks keep running but see no payload.
    pub(crate) fn retype<Q: Send + 'static>(self, payload: Q) -> Callbacks<Q> {
        let on_success = self.on_success.map(|cb| -> SuccessCallback<Q> {
            Box::new(move |value: Value, session: Session, _: Option<Q>| {
                cb(value, session, None)
            })
        });
        let on_failure = self.on_failure.map(|cb| -> FailureCallback<Q> {
            Box::new(move |err: ClientError, session: Session, _: Option<Q>| {
                cb(err, session, None)
            })
        });
        Callbacks {
            on_success,
            on_failure,
            payload: Some(payload),
        }
    }

    /// Deliver the outcome to the matching continuation.
    ///
    /// Errors with no failure callback are handed back to the caller.
    fn complete(
        self,
        outcome: Result<Value, ClientError>,
        session: Session,
    ) -> Result<(), ClientError> {
        let Self {
            on_success,
            on_failure,
            payload,
        } = self;

        match outcome {
            Ok(value) => {
                if let Some(callback) = on_success {
                    callback(value, session, payload);
                }
                Ok(())
            }
            Err(err) => match on_failure {
                Some(callback) => {
                    callback(err, session, payload);
                    Ok(())
                }
                None => {
                    error!(error = %err, "async API call failed with no failure callback");
                    Err(err)
                }
            },
        }
    }
}

/// Handle to a background call.
///
/// Dropping it detaches the call, which still runs to completion.
#[derive(Debug)]
pub struct PendingCall {
    handle: JoinHandle<Result<(), ClientError>>,
}

impl PendingCall {
    /// Wait for the call and its callback to finish.
    ///
    /// Returns the error when the call failed and nobody registered a failure
    /// callback. A panic inside a callback is resumed on the waiting task.
    pub async fn wait(self) -> Result<(), ClientError> {
        match self.handle.await {
            Ok(result) => result,
            Err(join_error) => match join_error.try_into_panic() {
                Ok(panic) => std::panic::resume_unwind(panic),
                Err(join_error) => Err(ClientError::Interrupted(join_error.to_string())),
            },
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Executes signed requests through a [`Transport`].
pub struct Dispatcher<T: Transport> {
    transport: Arc<T>,
}

impl<T: Transport> Clone for Dispatcher<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
        }
    }
}

impl<T: Transport> std::fmt::Debug for Dispatcher<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher").finish_non_exhaustive()
    }
}

impl<T: Transport + 'static> Dispatcher<T> {
    pub fn new(transport: Arc<T>) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Fetch on the calling task and return the decoded result.
    #[instrument(skip(self, request), fields(method = ?request.method()))]
    pub async fn dispatch(&self, request: &SignedRequest) -> Result<Value, ClientError> {
        self.transport.fetch(request.url()).await
    }

    /// Run the request on a new task and return immediately.
    ///
    /// The task takes a slot from `pool` before fetching; without a pool it
    /// gets a private single-slot one. The slot is released before any
    /// callback runs.
    ///
    /// Must be called from within a tokio runtime.
    pub fn dispatch_async<P: Send + 'static>(
        &self,
        request: SignedRequest,
        session: Session,
        callbacks: Callbacks<P>,
        pool: Option<&CallPool>,
    ) -> PendingCall {
        let pool = pool.cloned().unwrap_or_else(|| CallPool::new(1));
        let transport = Arc::clone(&self.transport);

        let handle = tokio::spawn(async move {
            let method = request.method().unwrap_or_default();
            let outcome = match pool.acquire().await {
                Ok(permit) => {
                    debug!(method = %method, in_flight = pool.in_flight(), "acquired call slot");
                    let outcome = transport.fetch(request.url()).await;
                    drop(permit);
                    debug!(method = %method, "released call slot");
                    outcome
                }
                Err(err) => Err(err),
            };

            callbacks.complete(outcome, session)
        });

        PendingCall { handle }
    }
}
