// benches/call.rs

use cloister::prelude::*;
use cloister::values;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use tokio::runtime::Runtime;
use tokio::sync::{mpsc, oneshot};

struct Point {
    x: i32,
}

fn get_x() -> Operation<Point> {
    Operation::unary("get_x", |point: &mut Point, _, n: i32| point.x + n)
}

fn deferred_get_x() -> Operation<Point> {
    let add = Function::binary("add", |x: i32, n: i32| x + n);
    Operation::unary("deferred_get_x", move |point: &mut Point, ctx, n: i32| {
        ctx.defer_function(&add, values![point.x, n])
            .expect("add takes two i32");
        0_i32
    })
}

/// Hand-written request/response loop over a bounded channel, for comparison.
fn spawn_channel_server(rt: &Runtime) -> mpsc::Sender<(i32, oneshot::Sender<i32>)> {
    let (tx, mut rx) = mpsc::channel::<(i32, oneshot::Sender<i32>)>(1);
    rt.spawn(async move {
        let point = Point { x: 5 };
        while let Some((n, reply)) = rx.recv().await {
            let _ = reply.send(point.x + n);
        }
    });
    tx
}

fn call_round_trip(c: &mut Criterion) {
    let rt = Runtime::new().expect("Failed to create Tokio runtime");
    let actor = rt.block_on(async { cloister::start(Point { x: 5 }) });
    let channel = spawn_channel_server(&rt);

    let mut group = c.benchmark_group("round_trip");

    let get_x = get_x();
    group.bench_function("call", |b| {
        b.to_async(&rt).iter(|| {
            let actor = actor.clone();
            let op = get_x.clone();
            async move { black_box(actor.call(&op, values![3_i32]).await.unwrap()) }
        })
    });

    let deferred = deferred_get_x();
    group.bench_function("call_deferred", |b| {
        b.to_async(&rt).iter(|| {
            let actor = actor.clone();
            let op = deferred.clone();
            async move { black_box(actor.call(&op, values![3_i32]).await.unwrap()) }
        })
    });

    group.bench_function("ask", |b| {
        b.to_async(&rt).iter(|| {
            let actor = actor.clone();
            async move { black_box(actor.ask(|point: &mut Point, _| point.x + 3).await.unwrap()) }
        })
    });

    group.bench_function("raw_channel", |b| {
        b.to_async(&rt).iter(|| {
            let channel = channel.clone();
            async move {
                let (reply, response) = oneshot::channel();
                channel.send((3, reply)).await.unwrap();
                black_box(response.await.unwrap())
            }
        })
    });

    group.finish();
}

criterion_group!(benches, call_round_trip);
criterion_main!(benches);
