//! Criterion benchmarks for the relay's fan-out path.
//!
//! Measures one [`Broadcaster::broadcast`] call against a growing number of
//! listeners, with and without the late-joiner history.  Each iteration also
//! drains the listener queues (as the writer tasks would) so they never fill
//! up and turn the run into an eviction benchmark.
//!
//! Run with:
//! ```bash
//! cargo bench --package minicast-relay --bench fanout_bench
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use minicast_core::{AudioFrame, Role};
use minicast_relay::application::{Broadcaster, ConnectionHandle, ConnectionIo, ListenerRegistry};
use tokio::runtime::Runtime;

/// A typical encoded audio chunk as sent by the reference source.
const FRAME_BYTES: usize = 4096;

fn runtime() -> Runtime {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("tokio runtime")
}

fn build_broadcaster(rt: &Runtime, listeners: usize, history: usize) -> (Broadcaster, Vec<ConnectionIo>) {
    let registry = Arc::new(ListenerRegistry::new());
    let broadcaster = Broadcaster::new(registry, history);
    let peer = SocketAddr::from(([127, 0, 0, 1], 0));

    let mut ios = Vec::with_capacity(listeners);
    rt.block_on(async {
        for _ in 0..listeners {
            let (conn, io) = ConnectionHandle::new(Role::Listener, peer, 64);
            broadcaster.attach(conn).await;
            ios.push(io);
        }
    });
    (broadcaster, ios)
}

fn drain(ios: &mut [ConnectionIo]) {
    for io in ios {
        while io.outbound.try_recv().is_ok() {}
    }
}

/// Broadcast scaling with listener count, history disabled.
fn bench_broadcast_scaling(c: &mut Criterion) {
    let rt = runtime();
    let frame = AudioFrame::from(vec![0x5A; FRAME_BYTES]);
    let mut group = c.benchmark_group("broadcast");

    for &count in &[1usize, 10, 100, 1000] {
        let (broadcaster, mut ios) = build_broadcaster(&rt, count, 0);
        group.throughput(Throughput::Bytes((FRAME_BYTES * count) as u64));
        group.bench_with_input(BenchmarkId::new("listeners", count), &count, |b, _| {
            b.iter(|| {
                let report = rt.block_on(broadcaster.broadcast(black_box(frame.clone())));
                drain(&mut ios);
                report
            })
        });
    }

    group.finish();
}

/// Same workload with the default 1 MiB history enabled.
fn bench_broadcast_with_history(c: &mut Criterion) {
    let rt = runtime();
    let frame = AudioFrame::from(vec![0x5A; FRAME_BYTES]);
    let (broadcaster, mut ios) = build_broadcaster(&rt, 100, 1024 * 1024);
    let mut group = c.benchmark_group("broadcast_history");

    group.bench_function("listeners/100", |b| {
        b.iter(|| {
            let report = rt.block_on(broadcaster.broadcast(black_box(frame.clone())));
            drain(&mut ios);
            report
        })
    });

    group.finish();
}

criterion_group!(benches, bench_broadcast_scaling, bench_broadcast_with_history);
criterion_main!(benches);
