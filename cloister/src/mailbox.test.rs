use std::collections::HashMap;
use std::time::Duration;

use tokio_test::{assert_pending, task};

use super::*;

#[derive(Debug, PartialEq, Eq)]
enum Letter {
    Item(u32),
    Stop,
}

impl Sentinel for Letter {
    fn is_sentinel(&self) -> bool {
        matches!(self, Letter::Stop)
    }
}

#[test_log::test(tokio::test(flavor = "multi_thread", worker_threads = 2))]
async fn test_delivers_in_admission_order() {
    let (tx, mut rx) = mailbox::<Letter>(4);
    for i in 1..=4 {
        tx.admit(Letter::Item(i)).await.unwrap();
    }
    for i in 1..=4 {
        assert_eq!(rx.take().await, Some(Letter::Item(i)));
    }
}

#[test_log::test(tokio::test)]
async fn test_take_waits_on_empty_mailbox() {
    let (tx, mut rx) = mailbox::<Letter>(1);
    {
        let mut take = task::spawn(rx.take());
        assert_pending!(take.poll());
    }
    tx.admit(Letter::Item(7)).await.unwrap();
    assert_eq!(rx.take().await, Some(Letter::Item(7)));
}

#[test_log::test(tokio::test(flavor = "multi_thread", worker_threads = 2))]
async fn test_full_mailbox_suspends_admission() {
    let (tx, mut rx) = mailbox::<Letter>(2);
    tx.admit(Letter::Item(1)).await.unwrap();
    tx.admit(Letter::Item(2)).await.unwrap();
    assert_eq!(tx.buffered(), 2);

    let sender = tx.clone();
    let third = tokio::spawn(async move { sender.admit(Letter::Item(3)).await });
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!third.is_finished(), "admission should wait while full");
    assert_eq!(tx.buffered(), 2);

    assert_eq!(rx.take().await, Some(Letter::Item(1)));
    third.await.unwrap().unwrap();
    assert_eq!(rx.take().await, Some(Letter::Item(2)));
    assert_eq!(rx.take().await, Some(Letter::Item(3)));
}

#[test_log::test(tokio::test(flavor = "multi_thread", worker_threads = 4))]
async fn test_capacity_holds_under_concurrent_senders() {
    const SENDERS: u32 = 4;
    const PER_SENDER: u32 = 25;
    let capacity = 2;
    let (tx, mut rx) = mailbox::<(u32, u32)>(capacity);

    let mut producers = Vec::new();
    for sender_id in 0..SENDERS {
        let tx = tx.clone();
        producers.push(tokio::spawn(async move {
            for seq in 0..PER_SENDER {
                tx.admit((sender_id, seq)).await.unwrap();
            }
        }));
    }

    let mut last_seen: HashMap<u32, u32> = HashMap::new();
    for _ in 0..SENDERS * PER_SENDER {
        assert!(tx.buffered() <= capacity);
        let (sender_id, seq) = rx.take().await.expect("mailbox open");
        if let Some(previous) = last_seen.insert(sender_id, seq) {
            assert_eq!(seq, previous + 1, "per-sender order must be preserved");
        }
        tokio::task::yield_now().await;
    }
    for producer in producers {
        producer.await.unwrap();
    }
    assert_eq!(tx.buffered(), 0);
}

#[test_log::test(tokio::test(flavor = "multi_thread", worker_threads = 2))]
async fn test_sentinel_discards_queue_and_closes() {
    let (tx, mut rx) = mailbox::<Letter>(3);
    tx.admit(Letter::Item(1)).await.unwrap();
    tx.admit(Letter::Item(2)).await.unwrap();
    tx.admit(Letter::Stop).await.unwrap();

    assert_eq!(tx.admit(Letter::Item(4)).await, Err(MailboxError::Closed));
    assert_eq!(rx.take().await, None);
    assert_eq!(tx.buffered(), 0);
    assert!(tx.is_closed());
}

#[test_log::test(tokio::test)]
async fn test_pump_stops_when_senders_drop() {
    let (tx, mut rx) = mailbox::<Letter>(1);
    drop(tx);
    assert_eq!(rx.take().await, None);
}

impl Sentinel for (u32, u32) {
    fn is_sentinel(&self) -> bool {
        false
    }
}
