//! Reply sinks and single-use reply handles.
use tokio::sync::{mpsc, oneshot};

use crate::response::Response;

/// Errors raised by misuse of a [`Reply`].
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyError {
    #[error("reply has already been sent")]
    AlreadySent,
}

enum SinkKind {
    Oneshot(oneshot::Sender<Response>),
    Channel(mpsc::UnboundedSender<Response>),
}

/// Where the response to a request is delivered.
pub struct ReplySink {
    kind: SinkKind,
}

impl ReplySink {
    /// A sink for exactly one response, with the receiving end.
    pub fn oneshot() -> (Self, oneshot::Receiver<Response>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                kind: SinkKind::Oneshot(tx),
            },
            rx,
        )
    }

    /// A sink feeding a shared channel, so many casts can report to one receiver.
    pub fn channel(tx: mpsc::UnboundedSender<Response>) -> Self {
        Self {
            kind: SinkKind::Channel(tx),
        }
    }

    /// Whether whoever waits on this sink has gone away.
    pub fn is_closed(&self) -> bool {
        match &self.kind {
            SinkKind::Oneshot(tx) => tx.is_closed(),
            SinkKind::Channel(tx) => tx.is_closed(),
        }
    }

    pub(crate) fn deliver(self, response: Response) {
        let delivered = match self.kind {
            SinkKind::Oneshot(tx) => tx.send(response).is_ok(),
            SinkKind::Channel(tx) => tx.send(response).is_ok(),
        };
        if !delivered {
            tracing::trace!("reply sink closed, response discarded");
        }
    }
}

impl From<mpsc::UnboundedSender<Response>> for ReplySink {
    fn from(tx: mpsc::UnboundedSender<Response>) -> Self {
        Self::channel(tx)
    }
}

impl std::fmt::Debug for ReplySink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self.kind {
            SinkKind::Oneshot(_) => "oneshot",
            SinkKind::Channel(_) => "channel",
        };
        f.debug_struct("ReplySink").field("kind", &kind).finish()
    }
}

/// Single-use handle that completes a deferred request.
///
/// Obtained from [`Context::defer_unguarded`](crate::context::Context::defer_unguarded).
/// Whoever holds it must call [`Reply::send`] exactly once. Dropping it unsent
/// makes a waiting `call` fail with
/// [`ActorError::ResponseDropped`](crate::actor::ActorError::ResponseDropped).
#[derive(Debug)]
pub struct Reply {
    sink: Option<ReplySink>,
    sent: bool,
}

impl Reply {
    pub(crate) fn new(sink: Option<ReplySink>) -> Self {
        Self { sink, sent: false }
    }

    /// Deliver the response. A second call fails with [`ReplyError::AlreadySent`].
    pub fn send(&mut self, response: impl Into<Response>) -> Result<(), ReplyError> {
        if self.sent {
            return Err(ReplyError::AlreadySent);
        }
        self.sent = true;
        if let Some(sink) = self.sink.take() {
            sink.deliver(response.into());
        }
        Ok(())
    }

    pub fn is_sent(&self) -> bool {
        self.sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::values;

    #[test]
    fn test_send_twice_fails() {
        let (sink, mut rx) = ReplySink::oneshot();
        let mut reply = Reply::new(Some(sink));
        assert_eq!(reply.send(values![1_u8]), Ok(()));
        assert_eq!(reply.send(values![2_u8]), Err(ReplyError::AlreadySent));

        let response = rx.try_recv().expect("first response delivered");
        let values = response.into_result().expect("success");
        assert_eq!(values[0].downcast_ref::<u8>(), Some(&1));
    }

    #[test]
    fn test_reply_without_sink_is_still_single_use() {
        let mut reply = Reply::new(None);
        assert_eq!(reply.send(values![]), Ok(()));
        assert!(reply.is_sent());
        assert_eq!(reply.send(values![]), Err(ReplyError::AlreadySent));
    }

    #[test]
    fn test_channel_sink_collects_many_responses() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        ReplySink::from(tx.clone()).deliver(Response::from(values![1_i32]));
        ReplySink::channel(tx).deliver(Response::from(values![2_i32]));

        let first = rx.try_recv().expect("first").into_result().expect("ok");
        let second = rx.try_recv().expect("second").into_result().expect("ok");
        assert_eq!(first[0].downcast_ref::<i32>(), Some(&1));
        assert_eq!(second[0].downcast_ref::<i32>(), Some(&2));
    }

    #[test]
    fn test_dropping_unsent_reply_closes_sink() {
        let (sink, mut rx) = ReplySink::oneshot();
        drop(Reply::new(Some(sink)));
        assert!(rx.try_recv().is_err());
    }
}
