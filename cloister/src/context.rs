use std::future::Future;

use crate::endpoint::Endpoint;
use crate::guard::{self, Guarded};
use crate::operation::Function;
use crate::reply::{Reply, ReplySink};
use crate::signature::DispatchError;
use crate::value::Values;

/// Provides capabilities to operations while the worker runs them.
///
/// The context is owned by the worker and only lent to the operation being
/// processed, so deferral can only happen from inside the worker. It gives
/// operations access to:
/// - Their own endpoint for sending to the actor
/// - Deferring the reply of the current request to someone else
pub struct Context<R> {
    endpoint: Endpoint<R>,
    current: Option<ReplySink>,
    deferred: bool,
}

impl<R: Send + 'static> Context<R> {
    pub(crate) fn new(endpoint: Endpoint<R>) -> Self {
        Context {
            endpoint,
            current: None,
            deferred: false,
        }
    }

    /// Access the actor's endpoint for sending requests to itself.
    ///
    /// A `blocking_call` on it from inside an operation waits on the worker
    /// that is running the operation and never returns. A `blocking_cast`
    /// only returns while the mailbox has room.
    pub fn endpoint(&self) -> Endpoint<R> {
        self.endpoint.clone()
    }

    pub(crate) fn begin(&mut self, reply_to: Option<ReplySink>) {
        self.deferred = false;
        self.current = reply_to;
    }

    /// End the current request, handing back the sink when nobody took over the reply.
    pub(crate) fn finish(&mut self) -> Option<ReplySink> {
        let current = self.current.take();
        if self.deferred { None } else { current }
    }

    /// Whether the current request has been deferred.
    pub fn is_deferred(&self) -> bool {
        self.deferred
    }

    /// Take over the reply of the current request.
    ///
    /// The value the operation returns is discarded. The returned [`Reply`]
    /// must eventually be sent, from any thread; deferring twice within one
    /// request yields a second `Reply` that reaches nobody.
    pub fn defer_unguarded(&mut self) -> Reply {
        self.deferred = true;
        Reply::new(self.current.take())
    }

    /// Defer the current request and finish it by running `f` on the blocking pool.
    ///
    /// `f` runs guarded; a panic in it is delivered to the caller as a fault.
    pub fn defer<F>(&mut self, f: F)
    where
        F: FnOnce() -> Values + Send + 'static,
    {
        let mut reply = self.defer_unguarded();
        tokio::task::spawn_blocking(move || {
            reply
                .send(guard::execute(f))
                .expect("deferred reply sent twice, this is a bug.");
        });
    }

    /// Defer the current request and finish it with the output of `future`.
    pub fn defer_async<F>(&mut self, future: F)
    where
        F: Future<Output = Values> + Send + 'static,
    {
        let mut reply = self.defer_unguarded();
        tokio::spawn(async move {
            let response = Guarded::new(future).await;
            reply
                .send(response)
                .expect("deferred reply sent twice, this is a bug.");
        });
    }

    /// Verify `args` against `function`, then defer the current request to it.
    ///
    /// Nothing is deferred when verification fails.
    pub fn defer_function(&mut self, function: &Function, args: Values) -> Result<(), DispatchError> {
        let run = function.bind(args)?;
        tracing::trace!(function = function.name(), "deferring request");
        self.defer(run);
        Ok(())
    }
}
