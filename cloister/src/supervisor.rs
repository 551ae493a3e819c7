//! Actor startup and the worker loop.
//!
//! A [`Supervisor`] binds a receiver to a mailbox and a worker task. It is a
//! typestate: a supervisor is constructed `Uninitialized`, can hand out
//! endpoints right away, and becomes `Running` exactly once through
//! [`Supervisor::start`]. The worker takes one request at a time from the
//! mailbox and runs it to completion against the receiver, so receiver state
//! never needs a lock.
//!
//! Each worker gets a thread of its own from the runtime's blocking pool.
//! Operations are plain synchronous code and may block; doing so stalls only
//! their own actor, never the mailbox pumps or other workers:
//!
//! ```text
//! Idle -> Processing -> RepliedImmediately -> Idle
//!                    \-> DeferredToOther   -> Idle
//! ```
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::actor::{ActorConfig, ActorError};
use crate::context::Context;
use crate::endpoint::Endpoint;
use crate::guard;
use crate::id::Id;
use crate::mailbox::{self, MailboxReceiver};
use crate::request::Request;

/// Start `receiver` on its own worker with the default configuration.
///
/// Must be called from within a tokio runtime.
pub fn start<R: Send + 'static>(receiver: R) -> Endpoint<R> {
    start_with(receiver, ActorConfig::default())
}

/// Start `receiver` on its own worker with `config`.
pub fn start_with<R: Send + 'static>(receiver: R, config: ActorConfig) -> Endpoint<R> {
    Supervisor::construct_with(receiver, config).start().endpoint()
}

/// The worker: owns the receiver and drains the mailbox.
struct SupervisorRuntime<R> {
    receiver: R,
    mailbox: MailboxReceiver<Request<R>>,
}

impl<R: Send + 'static> SupervisorRuntime<R> {
    /// Blocks the calling thread until the mailbox closes.
    ///
    /// `handle` only drives the wait for the next request; operations run
    /// outside of it, so they may use blocking APIs.
    #[tracing::instrument(name = "worker", skip_all, fields(actor = %name, id = %id))]
    fn run(mut self, handle: Handle, mut ctx: Context<R>, name: Arc<str>, id: Id) -> R {
        tracing::debug!("starting worker loop");
        while let Some(request) = handle.block_on(self.mailbox.take()) {
            self.process(&mut ctx, request);
        }
        tracing::debug!("mailbox closed, stopping worker loop");
        self.receiver
    }

    #[tracing::instrument(level = "trace", skip_all, fields(operation = tracing::field::Empty))]
    fn process(&mut self, ctx: &mut Context<R>, request: Request<R>) {
        let Request { job, reply_to } = request;
        let Some(job) = job else {
            return;
        };
        tracing::Span::current().record("operation", job.name());

        ctx.begin(reply_to);
        let receiver = &mut self.receiver;
        let response = guard::execute(|| job.invoke(receiver, ctx));
        if let Some(fault) = response.fault() {
            tracing::warn!(%fault, "operation panicked");
        }

        match ctx.finish() {
            Some(sink) => sink.deliver(response),
            None if ctx.is_deferred() => tracing::trace!("reply deferred"),
            None => tracing::trace!("no reply expected"),
        }
    }
}

mod sealed {
    pub trait Sealed {}
}

/// Lifecycle state of a [`Supervisor`]. Implemented only by this crate.
///
/// ```compile_fail
/// struct Paused;
/// impl cloister::State for Paused {}
/// ```
pub trait State: sealed::Sealed {}

/// A supervisor whose worker has not been started.
pub struct Uninitialized<R> {
    receiver: R,
}

impl<R> sealed::Sealed for Uninitialized<R> {}
impl<R> State for Uninitialized<R> {}

/// A supervisor whose worker is running.
pub struct Running<R> {
    worker: JoinHandle<R>,
}

impl<R> sealed::Sealed for Running<R> {}
impl<R> State for Running<R> {}

pub struct Supervisor<R, S>
where
    S: State,
{
    config: ActorConfig,
    endpoint: Endpoint<R>,
    state: S,
}

impl<R, S> Supervisor<R, S>
where
    R: Send + 'static,
    S: State,
{
    pub fn endpoint(&self) -> Endpoint<R> {
        self.endpoint.clone()
    }

    pub fn id(&self) -> Id {
        self.endpoint.id()
    }

    pub fn config(&self) -> &ActorConfig {
        &self.config
    }
}

impl<R> Supervisor<R, Uninitialized<R>>
where
    R: Send + 'static,
{
    pub fn construct(receiver: R) -> Self {
        Self::construct_with(receiver, ActorConfig::default())
    }

    pub fn construct_with(receiver: R, config: ActorConfig) -> Self {
        let endpoint = Endpoint::detached(Id::new(), config.name.clone());
        Supervisor {
            config,
            endpoint,
            state: Uninitialized { receiver },
        }
    }

    /// Create the mailbox and spawn the worker on the blocking pool.
    ///
    /// Must be called from within a tokio runtime. A running worker occupies
    /// one blocking-pool thread until its mailbox closes.
    pub fn start(self) -> Supervisor<R, Running<R>> {
        let (sender, mailbox) = mailbox::mailbox(self.config.mailbox_capacity);
        self.endpoint.attach(sender);

        let runtime = SupervisorRuntime {
            receiver: self.state.receiver,
            mailbox,
        };
        let ctx = Context::new(self.endpoint.clone());
        let handle = Handle::current();
        let name = self.config.name.clone();
        let id = self.endpoint.id();
        let worker = tokio::task::spawn_blocking(move || runtime.run(handle, ctx, name, id));

        Supervisor {
            config: self.config,
            endpoint: self.endpoint,
            state: Running { worker },
        }
    }
}

impl<R> Supervisor<R, Running<R>>
where
    R: Send + 'static,
{
    pub fn is_finished(&self) -> bool {
        self.state.worker.is_finished()
    }

    /// Wait for the worker to stop and take the receiver back.
    ///
    /// The worker stops after [`Endpoint::shutdown`] closes the mailbox.
    pub async fn join(self) -> Result<R, ActorError> {
        Ok(self.state.worker.await?)
    }
}

impl<R, S: State> std::fmt::Debug for Supervisor<R, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supervisor")
            .field("endpoint", &self.endpoint)
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
#[path = "supervisor.test.rs"]
mod tests;
