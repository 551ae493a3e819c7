//! Requests travelling through an actor's mailbox.
use std::borrow::Cow;

use crate::context::Context;
use crate::mailbox::Sentinel;
use crate::reply::ReplySink;
use crate::value::Values;

type Run<R> = Box<dyn FnOnce(&mut R, &mut Context<R>) -> Values + Send>;

/// An operation bound to its arguments, ready to run against the receiver.
pub(crate) struct Job<R> {
    name: Cow<'static, str>,
    run: Run<R>,
}

impl<R> Job<R> {
    pub(crate) fn new<F>(name: impl Into<Cow<'static, str>>, run: F) -> Self
    where
        F: FnOnce(&mut R, &mut Context<R>) -> Values + Send + 'static,
    {
        Self {
            name: name.into(),
            run: Box::new(run),
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn invoke(self, receiver: &mut R, ctx: &mut Context<R>) -> Values {
        (self.run)(receiver, ctx)
    }
}

/// One unit of work for the worker, or the shutdown sentinel when `job` is empty.
pub(crate) struct Request<R> {
    pub(crate) job: Option<Job<R>>,
    pub(crate) reply_to: Option<ReplySink>,
}

impl<R> Request<R> {
    pub(crate) fn new(job: Job<R>, reply_to: Option<ReplySink>) -> Self {
        Self {
            job: Some(job),
            reply_to,
        }
    }

    pub(crate) fn sentinel() -> Self {
        Self {
            job: None,
            reply_to: None,
        }
    }
}

impl<R> Sentinel for Request<R> {
    fn is_sentinel(&self) -> bool {
        self.job.is_none()
    }
}

impl<R> std::fmt::Debug for Request<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.job {
            Some(job) => f
                .debug_struct("Request")
                .field("operation", &job.name())
                .field("reply_to", &self.reply_to)
                .finish(),
            None => write!(f, "Request::Sentinel"),
        }
    }
}
