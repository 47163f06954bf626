//! Benchmarks for path tracing over the embedded store.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use semantica::graph::client::GraphQueryClient;
use semantica::graph::sparql::OxigraphStore;
use semantica::graph::vocab::TransferTerms;
use semantica::trace::{PathTracer, TraceRequest};
use semantica::transfer::TransferRecord;

/// `chains` independent chains of `hops` transfers each, interleaved in time.
fn chained_store(chains: u32, hops: u32) -> GraphQueryClient {
    let terms = TransferTerms::default();
    let store = OxigraphStore::in_memory().unwrap();
    let mut n = 0;
    for hop in 0..hops {
        for chain in 0..chains {
            n += 1;
            let record = TransferRecord {
                id: format!("http://example.org/resource/transfer/{n}"),
                from: format!("party-{chain}-{hop}"),
                to: format!("party-{chain}-{}", hop + 1),
                amount: "1000000".into(),
                timestamp: format!("2024-10-07T{:02}:{:02}:{:02}", hop, chain / 60, chain % 60),
                contract_address: format!("contract-{}", chain % 4),
                tx: format!("0x{n:064x}"),
            };
            store.insert_transfer(&terms, &record).unwrap();
        }
    }
    GraphQueryClient::new(Arc::new(store), terms)
}

fn bench_targeted(c: &mut Criterion) {
    let client = chained_store(50, 8);
    let tracer = PathTracer::new(&client);
    let request = TraceRequest::targeted("party-7-0", "contract-3", 8, 1);

    c.bench_function("targeted_depth8", |bench| {
        bench.iter(|| black_box(tracer.trace(&request).unwrap()))
    });
}

fn bench_discovery(c: &mut Criterion) {
    let client = chained_store(50, 8);
    let tracer = PathTracer::new(&client);
    let request = TraceRequest::discovery(3, 10);

    c.bench_function("discovery_10x3", |bench| {
        bench.iter(|| black_box(tracer.trace(&request).unwrap()))
    });
}

criterion_group!(benches, bench_targeted, bench_discovery);
criterion_main!(benches);
