//! Actor-level errors and configuration.
use std::sync::Arc;

use crate::signature::DispatchError;

/// The mailbox capacity an actor gets unless configured otherwise.
pub const DEFAULT_MAILBOX_CAPACITY: usize = 1;

/// Errors that can occur when talking to an actor.
#[derive(thiserror::Error, Debug)]
pub enum ActorError {
    /// Returned when calling an actor whose worker has not been started yet
    #[error("Actor has not been started")]
    NotStarted,
    /// Returned when trying to send a message to an actor whose mailbox has been closed
    #[error("Actor mailbox has been closed")]
    MailboxClosed,
    /// Returned when the reply sink was dropped before a response was sent
    #[error("Actor response was dropped unexpectedly")]
    ResponseDropped,
    /// The operation cannot be applied to this actor with these arguments
    #[error("Dispatch rejected: {0}")]
    Dispatch(#[from] DispatchError),
    /// The response did not hold a single value of the requested type
    #[error("Unexpected response, expected a single {expected}")]
    UnexpectedResponse { expected: &'static str },
    /// The worker task ended abnormally
    #[error("Actor worker was lost: {0}")]
    WorkerLost(#[from] tokio::task::JoinError),
}

/// Per-actor settings.
#[derive(Debug, Clone)]
pub struct ActorConfig {
    /// Name used in log spans.
    pub name: Arc<str>,
    /// Maximum number of requests buffered ahead of the worker.
    pub mailbox_capacity: usize,
}

impl Default for ActorConfig {
    fn default() -> Self {
        Self {
            name: Arc::from("actor"),
            mailbox_capacity: DEFAULT_MAILBOX_CAPACITY,
        }
    }
}

impl ActorConfig {
    pub fn with_name(mut self, name: impl Into<Arc<str>>) -> Self {
        self.name = name.into();
        self
    }

    /// A capacity of zero is raised to one.
    pub fn with_mailbox_capacity(mut self, capacity: usize) -> Self {
        self.mailbox_capacity = capacity.max(1);
        self
    }
}
