//! Bounded FIFO mailbox run by its own pump task.
//!
//! The pump owns the buffer. Depending on how full it is, the pump listens
//! for admissions, for delivery requests from the consumer, or both:
//!
//! ```text
//! Empty   (len == 0)        accept admissions only
//! Partial (0 < len < cap)   race admission against delivery, fairly
//! Full    (len >= cap)      deliver only; admitters stay suspended
//! ```
//!
//! Both hand-offs are rendezvous: `admit` resolves once the pump has moved the
//! item into the buffer, and `take` resolves once the pump has handed over the
//! front item. An admitted sentinel discards everything still queued and
//! closes both ends.
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::{mpsc, oneshot};

/// Items that can tell the mailbox to shut down.
pub trait Sentinel {
    fn is_sentinel(&self) -> bool;
}

/// Errors that can occur when admitting into a mailbox.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailboxError {
    /// The mailbox shut down before the item was buffered
    #[error("Mailbox has been closed")]
    Closed,
}

struct Admission<T> {
    item: T,
    accepted: oneshot::Sender<()>,
}

/// Spawn a pump for a mailbox holding at most `capacity` buffered items.
///
/// Must be called from within a tokio runtime.
pub fn mailbox<T>(capacity: usize) -> (MailboxSender<T>, MailboxReceiver<T>)
where
    T: Sentinel + Send + 'static,
{
    let (admissions_tx, admissions_rx) = mpsc::channel(1);
    let (takes_tx, takes_rx) = mpsc::channel(1);
    let buffered = Arc::new(AtomicUsize::new(0));
    let pump = Pump {
        buffer: VecDeque::new(),
        capacity: capacity.max(1),
        admissions: admissions_rx,
        takes: takes_rx,
        buffered: buffered.clone(),
    };
    tokio::spawn(pump.run());
    (
        MailboxSender {
            tx: admissions_tx,
            buffered,
        },
        MailboxReceiver { tx: takes_tx },
    )
}

struct Pump<T> {
    buffer: VecDeque<T>,
    capacity: usize,
    admissions: mpsc::Receiver<Admission<T>>,
    takes: mpsc::Receiver<oneshot::Sender<T>>,
    buffered: Arc<AtomicUsize>,
}

impl<T: Sentinel> Pump<T> {
    #[tracing::instrument(name = "mailbox", skip_all, fields(capacity = self.capacity))]
    async fn run(mut self) {
        tracing::trace!("starting mailbox pump");
        loop {
            let len = self.buffer.len();
            let running = if len == 0 {
                let admission = self.admissions.recv().await;
                self.accept(admission)
            } else if len < self.capacity {
                tokio::select! {
                    admission = self.admissions.recv() => self.accept(admission),
                    taker = self.takes.recv() => self.deliver(taker),
                }
            } else {
                let taker = self.takes.recv().await;
                self.deliver(taker)
            };
            if !running {
                break;
            }
        }
        tracing::trace!("mailbox pump stopped");
    }

    fn accept(&mut self, admission: Option<Admission<T>>) -> bool {
        let Some(Admission { item, accepted }) = admission else {
            tracing::trace!("all senders dropped");
            return false;
        };
        if item.is_sentinel() {
            let _ = accepted.send(());
            self.drain();
            return false;
        }
        self.buffer.push_back(item);
        self.publish_len();
        let _ = accepted.send(());
        true
    }

    fn deliver(&mut self, taker: Option<oneshot::Sender<T>>) -> bool {
        let Some(taker) = taker else {
            tracing::trace!("consumer dropped");
            return false;
        };
        if let Some(item) = self.buffer.pop_front() {
            self.publish_len();
            if let Err(item) = taker.send(item) {
                // The consumer gave up on this take; keep the item first in line.
                self.buffer.push_front(item);
                self.publish_len();
            }
        }
        true
    }

    fn publish_len(&self) {
        self.buffered.store(self.buffer.len(), Ordering::Release);
    }

    fn drain(&mut self) {
        self.admissions.close();
        self.takes.close();
        let mut discarded = self.buffer.len();
        self.buffer.clear();
        self.publish_len();
        while let Ok(admission) = self.admissions.try_recv() {
            drop(admission);
            discarded += 1;
        }
        tracing::debug!(discarded, "mailbox shut down");
    }
}

/// Admitting end of a mailbox. Cloneable.
pub struct MailboxSender<T> {
    tx: mpsc::Sender<Admission<T>>,
    buffered: Arc<AtomicUsize>,
}

impl<T> MailboxSender<T> {
    /// Buffer `item`, waiting while the mailbox is full.
    pub async fn admit(&self, item: T) -> Result<(), MailboxError> {
        let (accepted, ack) = oneshot::channel();
        self.tx
            .send(Admission { item, accepted })
            .await
            .map_err(|_| MailboxError::Closed)?;
        ack.await.map_err(|_| MailboxError::Closed)
    }

    /// Blocking variant of [`admit`](Self::admit) for threads outside the runtime.
    ///
    /// Panics when called from within an asynchronous execution context.
    pub fn blocking_admit(&self, item: T) -> Result<(), MailboxError> {
        let (accepted, ack) = oneshot::channel();
        self.tx
            .blocking_send(Admission { item, accepted })
            .map_err(|_| MailboxError::Closed)?;
        ack.blocking_recv().map_err(|_| MailboxError::Closed)
    }

    /// Number of items currently buffered by the pump.
    pub fn buffered(&self) -> usize {
        self.buffered.load(Ordering::Acquire)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl<T> Clone for MailboxSender<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            buffered: self.buffered.clone(),
        }
    }
}

/// Consuming end of a mailbox; there is exactly one.
pub struct MailboxReceiver<T> {
    tx: mpsc::Sender<oneshot::Sender<T>>,
}

impl<T> MailboxReceiver<T> {
    /// Wait for the front item. Returns `None` once the mailbox is closed.
    pub async fn take(&mut self) -> Option<T> {
        let (slot, item) = oneshot::channel();
        self.tx.send(slot).await.ok()?;
        item.await.ok()
    }
}

#[cfg(test)]
#[path = "mailbox.test.rs"]
mod tests;
