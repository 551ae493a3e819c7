use std::collections::HashSet;
use std::time::{Duration, Instant};

use assert_matches::assert_matches;
use tokio::sync::{mpsc, oneshot};

use super::*;
use crate::operation::Operation;
use crate::registry::Registry;
use crate::reply::{Reply, ReplyError, ReplySink};
use crate::signature::DispatchError;
use crate::value::Values;
use crate::values;

#[derive(Debug, Default)]
struct Counter {
    count: u32,
}

#[derive(Debug, Default)]
struct Log {
    entries: Vec<u32>,
}

#[test_log::test(tokio::test)]
async fn test_endpoint_before_start_is_not_started() {
    let supervisor = Supervisor::construct(Counter::default());
    let endpoint = supervisor.endpoint();
    assert!(!endpoint.is_started());
    assert_matches!(
        endpoint.ask(|counter: &mut Counter, _| counter.count).await,
        Err(ActorError::NotStarted)
    );

    let running = supervisor.start();
    assert!(endpoint.is_started());
    assert_eq!(running.id(), endpoint.id());
    assert_eq!(endpoint.ask(|counter: &mut Counter, _| counter.count).await.unwrap(), 0);
}

#[test_log::test(tokio::test)]
async fn test_requests_before_start_fail_fast() {
    let supervisor = Supervisor::construct(Counter::default());
    let endpoint = supervisor.endpoint();
    let bump = Operation::unary("bump", |counter: &mut Counter, _, by: u32| {
        counter.count += by;
        counter.count
    });

    assert_matches!(
        endpoint.call(&bump, values![1_u32]).await,
        Err(ActorError::NotStarted)
    );
    assert_matches!(
        endpoint.try_call(&bump, values![1_u32]).await,
        Err(ActorError::NotStarted)
    );
    assert_matches!(
        endpoint.cast(None, &bump, values![1_u32]).await,
        Err(ActorError::NotStarted)
    );
    assert_matches!(
        endpoint.tell(|counter: &mut Counter, _| counter.count += 1).await,
        Err(ActorError::NotStarted)
    );
    assert_matches!(endpoint.shutdown().await, Err(ActorError::NotStarted));

    // Arguments are checked before the actor is looked at.
    assert_matches!(
        endpoint.call(&bump, values!["one"]).await,
        Err(ActorError::Dispatch(DispatchError::ArgumentMismatch { index: 0, .. }))
    );
    assert_matches!(
        endpoint.cast(None, &bump, values![]).await,
        Err(ActorError::Dispatch(DispatchError::NotEnoughArguments { .. }))
    );
}

#[test]
fn test_blocking_requests_before_start_fail_fast() {
    let supervisor = Supervisor::construct(Counter::default());
    let endpoint = supervisor.endpoint();
    let bump = Operation::unary("bump", |counter: &mut Counter, _, by: u32| {
        counter.count += by;
        counter.count
    });

    assert_matches!(
        endpoint.blocking_call(&bump, values![1_u32]),
        Err(ActorError::NotStarted)
    );
    assert_matches!(
        endpoint.blocking_cast(None, &bump, values![1_u32]),
        Err(ActorError::NotStarted)
    );
    assert_matches!(
        endpoint.blocking_call(&bump, values![1_u32, 2_u32]),
        Err(ActorError::Dispatch(DispatchError::TooManyArguments { .. }))
    );
}

#[test_log::test(tokio::test)]
async fn test_busy_actor_does_not_stall_others() {
    let slow = crate::start(Counter::default());
    let fast = crate::start(Counter::default());

    let busy = tokio::spawn(async move {
        for _ in 0..3 {
            slow.tell(|counter: &mut Counter, _| {
                std::thread::sleep(Duration::from_millis(200));
                counter.count += 1;
            })
            .await
            .unwrap();
        }
        slow
    });
    tokio::task::yield_now().await;

    let mut worst = Duration::ZERO;
    for _ in 0..10 {
        let asked = Instant::now();
        fast.ask(|counter: &mut Counter, _| counter.count).await.unwrap();
        worst = worst.max(asked.elapsed());
    }
    assert!(worst < Duration::from_millis(150), "unrelated actor stalled for {worst:?}");

    let slow = busy.await.unwrap();
    assert_eq!(slow.ask(|counter: &mut Counter, _| counter.count).await.unwrap(), 3);
}

#[test_log::test(tokio::test)]
async fn test_shutdown_returns_receiver() {
    let config = ActorConfig::default().with_name("counter");
    let running = Supervisor::construct_with(Counter::default(), config).start();
    let endpoint = running.endpoint();
    assert_eq!(endpoint.name(), "counter");

    let count = endpoint
        .ask(|counter: &mut Counter, _| {
            counter.count += 5;
            counter.count
        })
        .await
        .unwrap();
    assert_eq!(count, 5);

    endpoint.shutdown().await.unwrap();
    let counter = running.join().await.unwrap();
    assert_eq!(counter.count, 5);

    assert_matches!(
        endpoint.tell(|counter: &mut Counter, _| counter.count += 1).await,
        Err(ActorError::MailboxClosed)
    );
}

#[test_log::test(tokio::test)]
async fn test_shutdown_discards_queued_requests() {
    let config = ActorConfig::default().with_mailbox_capacity(4);
    let running = Supervisor::construct_with(Counter::default(), config).start();
    let endpoint = running.endpoint();

    let (started_tx, started_rx) = oneshot::channel();
    let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();
    endpoint
        .tell(move |counter: &mut Counter, _| {
            let _ = started_tx.send(());
            let _ = release_rx.recv();
            counter.count += 1;
        })
        .await
        .unwrap();
    started_rx.await.unwrap();

    let queued = {
        let endpoint = endpoint.clone();
        tokio::spawn(async move { endpoint.ask(|counter: &mut Counter, _| counter.count).await })
    };
    while endpoint.buffered() == 0 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    endpoint.shutdown().await.unwrap();
    assert_matches!(queued.await.unwrap(), Err(ActorError::ResponseDropped));

    release_tx.send(()).unwrap();
    let counter = running.join().await.unwrap();
    assert_eq!(counter.count, 1);
}

#[test_log::test(tokio::test(flavor = "multi_thread", worker_threads = 4))]
async fn test_requests_are_serialized() {
    const CALLERS: u32 = 100;
    let endpoint = crate::start(Counter::default());

    let mut callers = Vec::new();
    for _ in 0..CALLERS {
        let endpoint = endpoint.clone();
        callers.push(tokio::spawn(async move {
            endpoint
                .ask(|counter: &mut Counter, _| {
                    let seen = counter.count;
                    std::thread::sleep(Duration::from_micros(100));
                    counter.count = seen + 1;
                    seen
                })
                .await
                .unwrap()
        }));
    }

    let mut seen = HashSet::new();
    for caller in callers {
        assert!(seen.insert(caller.await.unwrap()));
    }
    assert_eq!(seen.len(), CALLERS as usize);
    assert_eq!(endpoint.ask(|counter: &mut Counter, _| counter.count).await.unwrap(), CALLERS);
}

#[test_log::test(tokio::test)]
async fn test_capacity_one_throttles_third_sender() {
    let endpoint = crate::start(Log::default());

    let (started_tx, started_rx) = oneshot::channel();
    let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();
    endpoint
        .tell(move |log: &mut Log, _| {
            let _ = started_tx.send(());
            let _ = release_rx.recv();
            log.entries.push(1);
        })
        .await
        .unwrap();
    started_rx.await.unwrap();

    // The worker is busy with the first request, so the second fills the mailbox.
    endpoint.tell(|log: &mut Log, _| log.entries.push(2)).await.unwrap();
    assert_eq!(endpoint.buffered(), 1);

    let third = {
        let endpoint = endpoint.clone();
        tokio::spawn(async move { endpoint.tell(|log: &mut Log, _| log.entries.push(3)).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!third.is_finished(), "third admission should wait for room");

    release_tx.send(()).unwrap();
    third.await.unwrap().unwrap();
    let entries = endpoint.ask(|log: &mut Log, _| log.entries.clone()).await.unwrap();
    assert_eq!(entries, vec![1, 2, 3]);
}

#[test_log::test(tokio::test(flavor = "multi_thread", worker_threads = 2))]
async fn test_unguarded_reply_is_single_use() {
    let endpoint = crate::start(Counter::default());
    let (reply_tx, mut reply_rx) = mpsc::unbounded_channel::<Reply>();
    let handoff = Operation::nullary("handoff", move |_: &mut Counter, ctx| {
        let _ = reply_tx.send(ctx.defer_unguarded());
        0_u32
    });

    let call = {
        let endpoint = endpoint.clone();
        tokio::spawn(async move { endpoint.call(&handoff, values![]).await })
    };

    let mut reply = reply_rx.recv().await.unwrap();
    assert_eq!(reply.send(values![42_u32]), Ok(()));
    assert_eq!(reply.send(values![43_u32]), Err(ReplyError::AlreadySent));

    let values = call.await.unwrap().unwrap();
    assert_eq!(values.len(), 1);
    assert_eq!(values[0].downcast_ref::<u32>(), Some(&42));
}

#[test_log::test(tokio::test)]
async fn test_dropped_reply_reaches_caller() {
    let endpoint = crate::start(Counter::default());
    let forget = Operation::nullary("forget", |_: &mut Counter, ctx| {
        drop(ctx.defer_unguarded());
        0_u32
    });
    assert_matches!(
        endpoint.call(&forget, values![]).await,
        Err(ActorError::ResponseDropped)
    );
    // The worker is still serving.
    assert_eq!(endpoint.ask(|counter: &mut Counter, _| counter.count).await.unwrap(), 0);
}

#[test_log::test(tokio::test(flavor = "multi_thread", worker_threads = 2))]
async fn test_defer_async_answers_later() {
    let endpoint = crate::start(Counter::default());
    let later = Operation::unary("later", |_: &mut Counter, ctx, n: u32| {
        ctx.defer_async(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            values![n * 2]
        });
        assert!(ctx.is_deferred());
        0_u32
    });

    let values = endpoint.call(&later, values![21_u32]).await.unwrap();
    assert_eq!(values[0].downcast_ref::<u32>(), Some(&42));
}

#[test_log::test(tokio::test(flavor = "multi_thread", worker_threads = 2))]
async fn test_deferred_panic_is_delivered_as_fault() {
    let endpoint = crate::start(Counter::default());
    let doomed = Operation::nullary("doomed", |_: &mut Counter, ctx| {
        ctx.defer(|| -> Values { std::panic::panic_any("late failure") });
        0_u32
    });

    let response = endpoint.try_call(&doomed, values![]).await.unwrap();
    let fault = response.fault().expect("deferred work panicked");
    assert_eq!(fault.cause_as::<&'static str>(), Some(&"late failure"));
}

#[test_log::test(tokio::test)]
async fn test_cast_delivers_to_shared_sink() {
    let endpoint = crate::start(Counter::default());
    let double = Operation::unary("double", |_: &mut Counter, _, n: u32| n * 2);
    let (tx, mut rx) = mpsc::unbounded_channel();

    for n in 1..=3_u32 {
        endpoint
            .cast(Some(ReplySink::from(tx.clone())), &double, values![n])
            .await
            .unwrap();
    }
    for n in 1..=3_u32 {
        let values = rx.recv().await.unwrap().into_result().unwrap();
        assert_eq!(values[0].downcast_ref::<u32>(), Some(&(n * 2)));
    }
}

#[test_log::test(tokio::test)]
async fn test_tell_runs_in_order_with_asks() {
    let endpoint = crate::start(Log::default());
    for n in 0..5 {
        endpoint.tell(move |log: &mut Log, _| log.entries.push(n)).await.unwrap();
    }
    let entries = endpoint.ask(|log: &mut Log, _| log.entries.clone()).await.unwrap();
    assert_eq!(entries, vec![0, 1, 2, 3, 4]);
}

#[test_log::test(tokio::test(flavor = "multi_thread", worker_threads = 2))]
async fn test_blocking_call_from_plain_thread() {
    let endpoint = crate::start(Counter::default());
    let bump = Operation::unary("bump", |counter: &mut Counter, _, by: u32| {
        counter.count += by;
        counter.count
    });

    let values = {
        let endpoint = endpoint.clone();
        let bump = bump.clone();
        tokio::task::spawn_blocking(move || endpoint.blocking_call(&bump, values![3_u32]))
            .await
            .unwrap()
            .unwrap()
    };
    assert_eq!(values[0].downcast_ref::<u32>(), Some(&3));

    let blocking = endpoint.clone();
    tokio::task::spawn_blocking(move || blocking.blocking_cast(None, &bump, values![4_u32]))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(endpoint.ask(|counter: &mut Counter, _| counter.count).await.unwrap(), 7);
}

#[test_log::test(tokio::test)]
#[should_panic]
async fn test_blocking_call_inside_runtime_panics() {
    let endpoint = crate::start(Counter::default());
    let bump = Operation::unary("bump", |counter: &mut Counter, _, by: u32| {
        counter.count += by;
        counter.count
    });
    let _ = endpoint.blocking_call(&bump, values![1_u32]);
}

#[test_log::test(tokio::test)]
async fn test_registry_dispatch_by_name() {
    let endpoint = crate::start(Counter::default());
    let registry: Registry<Counter> = Registry::new();
    registry.register(Operation::variadic("sum", |counter: &mut Counter, _, xs: Vec<u32>| {
        counter.count += xs.iter().sum::<u32>();
        counter.count
    }));

    let sum = registry.resolve("sum").unwrap();
    let values = endpoint.call(&sum, values![1_u32, 2_u32, 3_u32]).await.unwrap();
    assert_eq!(values[0].downcast_ref::<u32>(), Some(&6));

    assert_matches!(
        endpoint.call(&sum, values![]).await,
        Err(ActorError::Dispatch(DispatchError::NotEnoughArguments { .. }))
    );
    assert_matches!(
        endpoint.call(&sum, values![1_u32, "two"]).await,
        Err(ActorError::Dispatch(DispatchError::ArgumentMismatch { index: 1, .. }))
    );
    assert_matches!(
        registry.resolve("product"),
        Err(DispatchError::UnknownOperation(_))
    );
}
