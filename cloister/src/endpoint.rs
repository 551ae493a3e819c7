//! Caller-facing handle to an actor.
use std::any::Any;
use std::fmt::Debug;
use std::sync::{Arc, OnceLock};

use crate::actor::ActorError;
use crate::context::Context;
use crate::id::Id;
use crate::mailbox::MailboxSender;
use crate::operation::Operation;
use crate::reply::ReplySink;
use crate::request::{Job, Request};
use crate::response::Response;
use crate::value::{Value, Values};

/// A handle to an actor that allows sending requests to it.
///
/// Endpoints are the way to interact with an actor:
/// - They are cloneable and can be shared across threads
/// - `call`/`ask` wait for the response, `cast`/`tell` only for admission
/// - Runtime-selected operations are verified before anything is queued
///
/// An endpoint taken from a supervisor that has not been started reports
/// [`ActorError::NotStarted`] for every request.
///
/// # Example
/// ```
/// # async fn demo() -> Result<(), cloister::prelude::ActorError> {
/// use cloister::prelude::*;
///
/// struct Counter { count: u32 }
///
/// let endpoint = cloister::start(Counter { count: 0 });
/// let count = endpoint.ask(|counter: &mut Counter, _| { counter.count += 1; counter.count }).await?;
/// assert_eq!(count, 1);
/// # Ok(())
/// # }
/// ```
pub struct Endpoint<R> {
    id: Id,
    name: Arc<str>,
    slot: Arc<OnceLock<MailboxSender<Request<R>>>>,
}

impl<R> Endpoint<R> {
    pub(crate) fn detached(id: Id, name: Arc<str>) -> Self {
        Self {
            id,
            name,
            slot: Arc::new(OnceLock::new()),
        }
    }

    pub(crate) fn attach(&self, sender: MailboxSender<Request<R>>) {
        if self.slot.set(sender).is_err() {
            tracing::error!(id = %self.id, "endpoint attached twice, this is a bug.");
        }
    }

    pub fn id(&self) -> Id {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_started(&self) -> bool {
        self.slot.get().is_some()
    }

    /// Number of requests buffered ahead of the worker.
    pub fn buffered(&self) -> usize {
        self.slot.get().map_or(0, MailboxSender::buffered)
    }

    fn sender(&self) -> Result<&MailboxSender<Request<R>>, ActorError> {
        self.slot.get().ok_or(ActorError::NotStarted)
    }
}

impl<R: Send + 'static> Endpoint<R> {
    async fn submit(&self, job: Job<R>, reply_to: Option<ReplySink>) -> Result<(), ActorError> {
        self.sender()?
            .admit(Request::new(job, reply_to))
            .await
            .map_err(|_| ActorError::MailboxClosed)
    }

    async fn request(&self, job: Job<R>) -> Result<Response, ActorError> {
        let (sink, response) = ReplySink::oneshot();
        self.submit(job, Some(sink)).await?;
        response.await.map_err(|_| ActorError::ResponseDropped)
    }

    /// Run `operation` on the actor and wait for its response.
    ///
    /// A panic inside the operation is re-raised on the calling task with the
    /// original payload. Use [`try_call`](Self::try_call) to inspect it instead.
    #[tracing::instrument(level = "trace", skip_all, fields(actor = %self.name, operation = operation.name()))]
    pub async fn call(&self, operation: &Operation<R>, args: Values) -> Result<Values, ActorError> {
        Ok(self.try_call(operation, args).await?.interpret())
    }

    /// Like [`call`](Self::call), but hands back the raw [`Response`].
    pub async fn try_call(
        &self,
        operation: &Operation<R>,
        args: Values,
    ) -> Result<Response, ActorError> {
        let job = operation.bind(args)?;
        self.request(job).await
    }

    /// Queue `operation` and return once it has been admitted.
    ///
    /// The response, if any, goes to `reply_to`.
    #[tracing::instrument(level = "trace", skip_all, fields(actor = %self.name, operation = operation.name()))]
    pub async fn cast(
        &self,
        reply_to: Option<ReplySink>,
        operation: &Operation<R>,
        args: Values,
    ) -> Result<(), ActorError> {
        let job = operation.bind(args)?;
        self.submit(job, reply_to).await
    }

    /// Run a typed closure on the actor and wait for its result.
    ///
    /// Panics inside the closure are re-raised on the calling task.
    pub async fn ask<T, F>(&self, f: F) -> Result<T, ActorError>
    where
        T: Any + Send,
        F: FnOnce(&mut R, &mut Context<R>) -> T + Send + 'static,
    {
        let job = Job::new(std::any::type_name::<F>(), move |receiver, ctx| {
            vec![Value::new(f(receiver, ctx))]
        });
        single(self.request(job).await?.interpret())
    }

    /// Queue a typed closure without waiting for it to run.
    pub async fn tell<F>(&self, f: F) -> Result<(), ActorError>
    where
        F: FnOnce(&mut R, &mut Context<R>) + Send + 'static,
    {
        let job = Job::new(std::any::type_name::<F>(), move |receiver, ctx| {
            f(receiver, ctx);
            Values::new()
        });
        self.submit(job, None).await
    }

    /// Blocking variant of [`call`](Self::call) for threads outside the runtime.
    ///
    /// # Panics
    ///
    /// Panics when called from within an asynchronous execution context, once
    /// the request has passed verification and the actor has been started.
    pub fn blocking_call(&self, operation: &Operation<R>, args: Values) -> Result<Values, ActorError> {
        let job = operation.bind(args)?;
        let (sink, response) = ReplySink::oneshot();
        self.sender()?
            .blocking_admit(Request::new(job, Some(sink)))
            .map_err(|_| ActorError::MailboxClosed)?;
        let response = response
            .blocking_recv()
            .map_err(|_| ActorError::ResponseDropped)?;
        Ok(response.interpret())
    }

    /// Blocking variant of [`cast`](Self::cast) for threads outside the runtime.
    ///
    /// # Panics
    ///
    /// Panics when called from within an asynchronous execution context, once
    /// the request has passed verification and the actor has been started.
    pub fn blocking_cast(
        &self,
        reply_to: Option<ReplySink>,
        operation: &Operation<R>,
        args: Values,
    ) -> Result<(), ActorError> {
        let job = operation.bind(args)?;
        self.sender()?
            .blocking_admit(Request::new(job, reply_to))
            .map_err(|_| ActorError::MailboxClosed)
    }

    /// Close the actor's mailbox.
    ///
    /// Requests still queued are discarded and their callers see
    /// [`ActorError::ResponseDropped`]. The worker stops once it finishes the
    /// request it is running.
    pub async fn shutdown(&self) -> Result<(), ActorError> {
        tracing::debug!(actor = %self.name, id = %self.id, "shutting down actor");
        self.sender()?
            .admit(Request::sentinel())
            .await
            .map_err(|_| ActorError::MailboxClosed)
    }
}

fn single<T: Any>(mut values: Values) -> Result<T, ActorError> {
    let unexpected = ActorError::UnexpectedResponse {
        expected: std::any::type_name::<T>(),
    };
    if values.len() != 1 {
        return Err(unexpected);
    }
    values.pop().map(Value::downcast::<T>).and_then(Result::ok).ok_or(unexpected)
}

impl<R> Clone for Endpoint<R> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            name: self.name.clone(),
            slot: self.slot.clone(),
        }
    }
}

impl<R> PartialEq for Endpoint<R> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<R> Debug for Endpoint<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint")
            .field("name", &self.name)
            .field("id", &self.id)
            .field("started", &self.is_started())
            .finish()
    }
}
