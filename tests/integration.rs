//! End-to-end integration tests for the tracer.
//!
//! These tests run the full stack: transfers are written to an in-memory
//! oxigraph store, looked up through `GraphQueryClient` with real SPARQL, and
//! assembled by `PathTracer`.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use semantica::config::{SemanticaConfig, TraceConfig};
use semantica::engine::Engine;
use semantica::error::{QueryFailure, QueryResult, SemanticaError, TraceError, ValidationError};
use semantica::graph::client::GraphQueryClient;
use semantica::graph::endpoint::HttpEndpoint;
use semantica::graph::sparql::OxigraphStore;
use semantica::graph::vocab::TransferTerms;
use semantica::graph::{BoundTerm, Solution, SparqlBackend};
use semantica::trace::{PathTracer, TraceParams, TraceRequest};
use semantica::transfer::{PathCollection, TransferRecord};

fn transfer(n: u32, from: &str, to: &str, contract: &str, ts: u32) -> TransferRecord {
    TransferRecord {
        id: format!("http://example.org/resource/transfer/{n}"),
        from: from.into(),
        to: to.into(),
        amount: format!("{}", 1_000 * n),
        timestamp: format!("2024-10-07T10:{:02}:{:02}", ts / 60, ts % 60),
        contract_address: contract.into(),
        tx: format!("0x{n:064x}"),
    }
}

fn store_with(records: &[TransferRecord]) -> Arc<OxigraphStore> {
    let store = OxigraphStore::in_memory().unwrap();
    store.insert_transfers(&TransferTerms::default(), records).unwrap();
    Arc::new(store)
}

fn client_over(backend: Arc<dyn SparqlBackend>) -> GraphQueryClient {
    GraphQueryClient::new(backend, TransferTerms::default())
}

/// T1(A→B, X, 1), T2(B→C, X, 2), T3(C→D, X, 3), T4(B→E, Y, 2).
fn scenario_store() -> Arc<OxigraphStore> {
    store_with(&[
        transfer(1, "A", "B", "X", 1),
        transfer(2, "B", "C", "X", 2),
        transfer(3, "C", "D", "X", 3),
        transfer(4, "B", "E", "Y", 2),
    ])
}

fn ids(paths: &PathCollection) -> Vec<Vec<u32>> {
    paths
        .iter()
        .map(|p| {
            p.records()
                .iter()
                .map(|r| r.id.rsplit('/').next().unwrap().parse().unwrap())
                .collect()
        })
        .collect()
}

/// Backend wrapper that fails the Nth query with a timeout.
struct TimeoutOnCall {
    inner: Arc<dyn SparqlBackend>,
    fail_on: usize,
    calls: AtomicUsize,
}

impl TimeoutOnCall {
    fn new(inner: Arc<dyn SparqlBackend>, fail_on: usize) -> Self {
        Self {
            inner,
            fail_on,
            calls: AtomicUsize::new(0),
        }
    }
}

impl SparqlBackend for TimeoutOnCall {
    fn select(&self, query: &str) -> QueryResult<Vec<Solution>> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if n == self.fail_on {
            return Err(QueryFailure::Timeout {
                endpoint: "test".into(),
                timeout_ms: 10_000,
            });
        }
        self.inner.select(query)
    }

    fn describe(&self) -> String {
        format!("timeout on call {} over {}", self.fail_on, self.inner.describe())
    }
}

#[test]
fn targeted_trace_follows_one_contract() {
    let client = client_over(scenario_store());
    let tracer = PathTracer::new(&client);

    let paths = tracer.trace(&TraceRequest::targeted("A", "X", 3, 5)).unwrap();
    assert_eq!(ids(&paths), vec![vec![1, 2, 3]]);
}

#[test]
fn depth_cap_stops_before_third_hop() {
    let client = client_over(scenario_store());
    let tracer = PathTracer::new(&client);

    let paths = tracer.trace(&TraceRequest::targeted("A", "X", 1, 5)).unwrap();
    assert_eq!(ids(&paths), vec![vec![1, 2]]);
}

#[test]
fn discovery_consumes_disjoint_chains_once() {
    let client = client_over(store_with(&[
        transfer(1, "A", "B", "X", 1),
        transfer(2, "P", "Q", "Y", 2),
    ]));
    let tracer = PathTracer::new(&client);

    let paths = tracer.trace(&TraceRequest::discovery(3, 2)).unwrap();
    assert_eq!(ids(&paths), vec![vec![1], vec![2]]);
}

#[test]
fn discovery_keeps_the_seed_contract() {
    let client = client_over(scenario_store());
    let tracer = PathTracer::new(&client);

    let paths = tracer.trace(&TraceRequest::discovery(3, 10)).unwrap();
    // T4 is in contract Y and is never a continuation of an X path.
    assert_eq!(ids(&paths), vec![vec![1, 2, 3], vec![4]]);
}

#[test]
fn timeout_on_second_hop_discards_partial_paths() {
    // Call 1 seeds T1, call 2 extends to T2, call 3 (the second hop) times out.
    let backend = Arc::new(TimeoutOnCall::new(scenario_store(), 3));
    let client = client_over(backend);
    let tracer = PathTracer::new(&client);

    let err = tracer.trace(&TraceRequest::targeted("A", "X", 3, 5)).unwrap_err();
    assert!(err.is_timeout(), "expected timeout, got {err:?}");
}

#[test]
fn unresponsive_endpoint_is_a_query_failure() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let hold = std::thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        std::thread::sleep(Duration::from_secs(2));
        drop(stream);
    });

    let endpoint = HttpEndpoint::new(format!("http://{addr}/sparql"), Duration::from_millis(200));
    let client = client_over(Arc::new(endpoint));
    let err = PathTracer::new(&client)
        .trace(&TraceRequest::discovery(3, 10))
        .unwrap_err();
    assert!(err.is_timeout(), "expected timeout, got {err:?}");
    hold.join().unwrap();
}

#[test]
fn unknown_start_party_yields_no_paths() {
    let client = client_over(scenario_store());
    let paths = PathTracer::new(&client)
        .trace(&TraceRequest::targeted("nobody", "X", 3, 5))
        .unwrap();
    assert!(paths.is_empty());
}

/// Backend that answers every query with the same A→B row in contract X.
struct FixedRow;

impl SparqlBackend for FixedRow {
    fn select(&self, _query: &str) -> QueryResult<Vec<Solution>> {
        Ok(vec![Solution::new()
            .with("transfer", BoundTerm::iri("http://e/1"))
            .with("from", BoundTerm::literal("A"))
            .with("to", BoundTerm::literal("B"))
            .with("amount", BoundTerm::literal("5"))
            .with("timestamp", BoundTerm::literal("2024-10-07T10:00:01"))
            .with("contract", BoundTerm::literal("X"))
            .with("tx", BoundTerm::literal("0x1"))])
    }

    fn describe(&self) -> String {
        "fixed row".into()
    }
}

#[test]
fn store_ignoring_constraints_is_malformed() {
    let client = client_over(Arc::new(FixedRow));
    let tracer = PathTracer::new(&client);

    let err = tracer.trace(&TraceRequest::discovery(3, 3)).unwrap_err();
    assert!(matches!(err, QueryFailure::MalformedResponse { .. }), "got {err:?}");

    let err = tracer.trace(&TraceRequest::discovery(0, 3)).unwrap_err();
    assert!(matches!(err, QueryFailure::MalformedResponse { .. }), "got {err:?}");

    let err = tracer.trace(&TraceRequest::targeted("C", "X", 3, 1)).unwrap_err();
    assert!(matches!(err, QueryFailure::MalformedResponse { .. }), "got {err:?}");
}

#[test]
fn validation_happens_before_any_query() {
    let backend = Arc::new(TimeoutOnCall::new(scenario_store(), 1));
    let client = client_over(backend.clone());
    let params = TraceParams {
        start_party: Some("A".into()),
        ..Default::default()
    };
    let err = PathTracer::new(&client)
        .trace_params(&params, &TraceConfig::default())
        .unwrap_err();
    assert!(matches!(
        err,
        TraceError::Validation(ValidationError::PartialTarget { .. })
    ));
    assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
}

/// Deterministic pseudo-random generator for synthetic stores.
struct Lcg(u64);

impl Lcg {
    fn next(&mut self, bound: u32) -> u32 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        ((self.0 >> 33) % bound as u64) as u32
    }
}

/// Many transfers among a small set of parties and contracts, with cycles,
/// crossing chains and duplicate timestamps.
fn synthetic_transfers(count: u32, seed: u64) -> Vec<TransferRecord> {
    let parties = ["A", "B", "C", "D", "E", "F", "G"];
    let contracts = ["X", "Y"];
    let mut rng = Lcg(seed);
    (1..=count)
        .map(|n| {
            let from = rng.next(parties.len() as u32) as usize;
            let to = (from + 1 + rng.next(parties.len() as u32 - 1) as usize) % parties.len();
            let (from, to) = (parties[from], parties[to]);
            let contract = contracts[rng.next(contracts.len() as u32) as usize];
            transfer(n, from, to, contract, rng.next(40))
        })
        .collect()
}

fn assert_well_formed(paths: &PathCollection, request: &TraceRequest) {
    assert!(paths.len() <= request.max_total_paths);

    let mut seen = HashSet::new();
    for path in paths.iter() {
        assert!(!path.is_empty());
        assert!(path.len() <= request.max_depth + 1, "path too long: {}", path.len());
        assert!(path.is_continuous(), "broken chain: {path:?}");
        for pair in path.records().windows(2) {
            assert!(pair[0].timestamp <= pair[1].timestamp, "time went backwards: {pair:?}");
        }
        for record in path.records() {
            assert!(seen.insert(record.id.clone()), "{} reused", record.id);
        }
    }
}

#[test]
fn synthetic_store_properties_hold() {
    for seed in [1, 7, 42] {
        let records = synthetic_transfers(60, seed);
        let client = client_over(store_with(&records));
        let tracer = PathTracer::new(&client);

        for (depth, total) in [(0, 5), (1, 3), (3, 10), (8, 100)] {
            let discovery = TraceRequest::discovery(depth, total);
            let paths = tracer.trace(&discovery).unwrap();
            assert_well_formed(&paths, &discovery);
            assert!(!paths.is_empty());

            let targeted = TraceRequest::targeted("A", "X", depth, total);
            let paths = tracer.trace(&targeted).unwrap();
            assert_well_formed(&paths, &targeted);
            for path in paths.iter() {
                assert_eq!(path.seed().from, "A");
                assert_eq!(path.seed().contract_address, "X");
            }
        }
    }
}

#[test]
fn discovery_without_bound_consumes_every_transfer() {
    let records = synthetic_transfers(40, 3);
    let client = client_over(store_with(&records));
    let request = TraceRequest::discovery(4, 1_000);
    let paths = PathTracer::new(&client).trace(&request).unwrap();
    assert_well_formed(&paths, &request);
    assert_eq!(paths.transfer_count(), records.len());
}

#[test]
fn repeated_calls_start_from_scratch() {
    let client = client_over(scenario_store());
    let tracer = PathTracer::new(&client);
    let request = TraceRequest::targeted("A", "X", 3, 5);
    let first = tracer.trace(&request).unwrap();
    let second = tracer.trace(&request).unwrap();
    assert_eq!(ids(&first), ids(&second));
}

#[test]
fn concurrent_traces_share_one_client() {
    let client = Arc::new(client_over(store_with(&synthetic_transfers(50, 9))));
    let expected = PathTracer::new(client.as_ref())
        .trace(&TraceRequest::discovery(3, 20))
        .unwrap();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let client = Arc::clone(&client);
            std::thread::spawn(move || {
                PathTracer::new(client.as_ref())
                    .trace(&TraceRequest::discovery(3, 20))
                    .unwrap()
            })
        })
        .collect();
    for handle in handles {
        assert_eq!(ids(&handle.join().unwrap()), ids(&expected));
    }
}

#[test]
fn engine_serializes_paths_as_nested_arrays() {
    let engine = Engine::with_local(SemanticaConfig::default(), scenario_store()).unwrap();
    let params = TraceParams {
        start_party: Some("A".into()),
        contract_address: Some("X".into()),
        ..Default::default()
    };
    let paths = engine.trace_params(&params).unwrap();
    let json = serde_json::to_value(&paths).unwrap();

    let first = &json[0][0];
    assert_eq!(first["id"], "http://example.org/resource/transfer/1");
    assert_eq!(first["from"], "A");
    assert_eq!(first["to"], "B");
    assert_eq!(first["amount"], "1000");
    assert_eq!(first["contractAddress"], "X");
    assert_eq!(json[0].as_array().unwrap().len(), 3);
}

#[test]
fn engine_rejects_limits_above_config() {
    let engine = Engine::with_local(SemanticaConfig::default(), scenario_store()).unwrap();
    let params = TraceParams {
        max_depth: Some(10_000),
        ..Default::default()
    };
    let err: SemanticaError = engine.trace_params(&params).unwrap_err().into();
    assert!(matches!(
        err,
        SemanticaError::Validation(ValidationError::ExceedsLimit { field: "max_depth", .. })
    ));
}
