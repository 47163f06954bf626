//! Engine facade: top-level API shared by the CLI and the server.
//!
//! The `Engine` resolves the configured store backend once and hands out
//! tracers over it. It holds no per-trace state, so it can be shared behind an
//! `Arc` by concurrent requests.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::config::SemanticaConfig;
use crate::error::{QueryResult, SemanticaResult, StoreError, TraceError};
use crate::graph::client::GraphQueryClient;
use crate::graph::endpoint::HttpEndpoint;
use crate::graph::sparql::OxigraphStore;
use crate::graph::{Solution, SparqlBackend};
use crate::paths::SemanticaPaths;
use crate::trace::{PathTracer, TraceParams, TraceRequest};
use crate::transfer::PathCollection;

/// Result of a raw SELECT passthrough.
#[derive(Debug, Clone, Serialize)]
pub struct SparqlOutcome {
    pub data: Vec<Solution>,
    #[serde(skip)]
    pub elapsed: Duration,
}

impl SparqlOutcome {
    /// Elapsed time formatted the way the HTTP API reports it.
    pub fn execution_time(&self) -> String {
        format!("{:.4} ms", self.elapsed.as_secs_f64() * 1000.0)
    }
}

/// Summary of the engine's backend.
#[derive(Debug, Clone, Serialize)]
pub struct EngineInfo {
    pub backend: String,
    /// Only known for the embedded store.
    pub transfers: Option<usize>,
}

impl std::fmt::Display for EngineInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "backend: {}", self.backend)?;
        if let Some(n) = self.transfers {
            write!(f, "\ntransfers: {n}")?;
        }
        Ok(())
    }
}

/// The semantica engine.
pub struct Engine {
    config: SemanticaConfig,
    client: GraphQueryClient,
    local: Option<Arc<OxigraphStore>>,
}

impl Engine {
    /// Build from config. A configured endpoint wins; otherwise the embedded store
    /// is opened at `store.data_dir`, falling back to the XDG store directory.
    pub fn new(config: SemanticaConfig, paths: &SemanticaPaths) -> SemanticaResult<Self> {
        if let Some(url) = config.store.endpoint.clone() {
            tracing::info!(endpoint = %url, timeout_secs = config.store.timeout_secs, "using remote SPARQL endpoint");
            let backend = Arc::new(HttpEndpoint::new(url, config.store.timeout()));
            return Self::with_backend(config, backend);
        }

        let dir: PathBuf = config
            .store
            .data_dir
            .clone()
            .unwrap_or_else(|| paths.store_dir());
        tracing::info!(dir = %dir.display(), "opening embedded store");
        let store = Arc::new(OxigraphStore::open(&dir)?);
        Self::with_local(config, store)
    }

    /// Engine over an in-memory store, for tests and one-off runs.
    pub fn in_memory(config: SemanticaConfig) -> SemanticaResult<Self> {
        let store = Arc::new(OxigraphStore::in_memory()?);
        Self::with_local(config, store)
    }

    /// Engine over an already-open embedded store.
    pub fn with_local(config: SemanticaConfig, store: Arc<OxigraphStore>) -> SemanticaResult<Self> {
        let terms = config.vocabulary.compile()?;
        let backend: Arc<dyn SparqlBackend> = store.clone();
        Ok(Self {
            client: GraphQueryClient::new(backend, terms),
            config,
            local: Some(store),
        })
    }

    /// Engine over any backend.
    pub fn with_backend(config: SemanticaConfig, backend: Arc<dyn SparqlBackend>) -> SemanticaResult<Self> {
        let terms = config.vocabulary.compile()?;
        Ok(Self {
            client: GraphQueryClient::new(backend, terms),
            config,
            local: None,
        })
    }

    pub fn config(&self) -> &SemanticaConfig {
        &self.config
    }

    pub fn client(&self) -> &GraphQueryClient {
        &self.client
    }

    pub fn tracer(&self) -> PathTracer<&GraphQueryClient> {
        PathTracer::new(&self.client)
    }

    /// Validate raw parameters and trace.
    pub fn trace_params(&self, params: &TraceParams) -> Result<PathCollection, TraceError> {
        self.tracer().trace_params(params, &self.config.trace)
    }

    /// Trace an already-validated request.
    pub fn trace(&self, request: &TraceRequest) -> QueryResult<PathCollection> {
        self.tracer().trace(request)
    }

    /// Forward a SELECT query to the backend and time it.
    pub fn sparql(&self, query: &str) -> QueryResult<SparqlOutcome> {
        let started = Instant::now();
        let data = self.client.backend().select(query)?;
        let elapsed = started.elapsed();
        tracing::debug!(rows = data.len(), elapsed_ms = elapsed.as_millis() as u64, "sparql passthrough");
        Ok(SparqlOutcome { data, elapsed })
    }

    /// Load a JSON file of transfers into the embedded store.
    pub fn ingest_file(&self, path: &Path) -> SemanticaResult<usize> {
        let store = self.local.as_ref().ok_or(StoreError::RemoteBackend)?;
        let count = store.ingest_json_file(self.client.terms(), path)?;
        tracing::info!(count, file = %path.display(), "ingested transfers");
        Ok(count)
    }

    pub fn info(&self) -> SemanticaResult<EngineInfo> {
        let transfers = match &self.local {
            Some(store) => Some(store.transfer_count(self.client.terms())?),
            None => None,
        };
        Ok(EngineInfo {
            backend: self.client.backend().describe(),
            transfers,
        })
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("backend", &self.client.backend().describe())
            .finish()
    }
}
