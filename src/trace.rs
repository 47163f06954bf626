//! Transfer-path tracing.
//!
//! Reconstructs chains of token transfers by repeatedly asking the store for the
//! earliest transfer out of the last recipient, one query per hop. A call-scoped
//! [`VisitedSet`] guarantees no transfer appears in two returned paths.
//!
//! Two seeding modes:
//! - **Discovery**: each path starts at the globally earliest unvisited transfer.
//! - **Targeted**: each path starts at the earliest unvisited transfer out of a
//!   fixed `(start_party, contract_address)` pair.

use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::config::TraceConfig;
use crate::error::{QueryResult, TraceError, ValidationError};
use crate::graph::client::{Continuation, TransferSource, admit_unvisited};
use crate::transfer::{PathCollection, TransferPath, TransferRecord, VisitedSet};

/// Raw trace parameters as they arrive from a query string or the CLI.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceParams {
    #[serde(default)]
    pub max_depth: Option<i64>,
    #[serde(default)]
    pub max_total_paths: Option<i64>,
    #[serde(default)]
    pub start_party: Option<String>,
    #[serde(default)]
    pub contract_address: Option<String>,
}

/// How new paths are seeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceMode {
    /// Seed from the earliest unvisited transfer anywhere in the store.
    Discovery,
    /// Seed every path from the same origin party within one contract.
    Targeted {
        start_party: String,
        contract_address: String,
    },
}

/// A validated trace request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceRequest {
    /// Hops allowed after the seed; a path holds at most `max_depth + 1` transfers.
    pub max_depth: usize,
    /// Upper bound on the number of returned paths, at least 1.
    pub max_total_paths: usize,
    pub mode: TraceMode,
}

impl TraceRequest {
    pub fn discovery(max_depth: usize, max_total_paths: usize) -> Self {
        Self {
            max_depth,
            max_total_paths,
            mode: TraceMode::Discovery,
        }
    }

    pub fn targeted(
        start_party: impl Into<String>,
        contract_address: impl Into<String>,
        max_depth: usize,
        max_total_paths: usize,
    ) -> Self {
        Self {
            max_depth,
            max_total_paths,
            mode: TraceMode::Targeted {
                start_party: start_party.into(),
                contract_address: contract_address.into(),
            },
        }
    }
}

impl TraceParams {
    /// Validate against the configured defaults and ceilings.
    pub fn validate(&self, config: &TraceConfig) -> Result<TraceRequest, ValidationError> {
        let max_depth = bounded(
            "max_depth",
            self.max_depth,
            config.default_max_depth,
            config.max_depth_limit,
        )?;
        let max_total_paths = bounded(
            "max_total_paths",
            self.max_total_paths,
            config.default_max_total_paths,
            config.max_total_paths_limit,
        )?;
        if max_total_paths == 0 {
            return Err(ValidationError::ZeroPaths);
        }

        let mode = match (&self.start_party, &self.contract_address) {
            (None, None) => TraceMode::Discovery,
            (Some(_), None) => {
                return Err(ValidationError::PartialTarget {
                    present: "start_party",
                    missing: "contract_address",
                });
            }
            (None, Some(_)) => {
                return Err(ValidationError::PartialTarget {
                    present: "contract_address",
                    missing: "start_party",
                });
            }
            (Some(party), Some(contract)) => {
                if party.trim().is_empty() {
                    return Err(ValidationError::Empty { field: "start_party" });
                }
                if contract.trim().is_empty() {
                    return Err(ValidationError::Empty {
                        field: "contract_address",
                    });
                }
                TraceMode::Targeted {
                    start_party: party.clone(),
                    contract_address: contract.clone(),
                }
            }
        };

        Ok(TraceRequest {
            max_depth,
            max_total_paths,
            mode,
        })
    }
}

fn bounded(
    field: &'static str,
    value: Option<i64>,
    default: usize,
    limit: usize,
) -> Result<usize, ValidationError> {
    let Some(value) = value else {
        return Ok(default);
    };
    if value < 0 {
        return Err(ValidationError::Negative { field, value });
    }
    match usize::try_from(value) {
        Ok(v) if v <= limit => Ok(v),
        _ => Err(ValidationError::ExceedsLimit {
            field,
            value,
            limit,
        }),
    }
}

/// State owned by one trace call and dropped when it returns.
struct TraceContext {
    visited: VisitedSet,
    paths: PathCollection,
    queries: usize,
}

impl TraceContext {
    fn new() -> Self {
        Self {
            visited: VisitedSet::new(),
            paths: PathCollection::new(),
            queries: 0,
        }
    }

    /// Callers admit `record` against `visited` first.
    fn consume(&mut self, record: &TransferRecord) {
        self.visited.insert(&record.id);
    }
}

/// Drives hop-by-hop traversal over a [`TransferSource`].
///
/// The tracer itself is stateless; all per-call state lives in a context created
/// by [`PathTracer::trace`], so one tracer may serve concurrent calls.
#[derive(Debug, Clone, Copy)]
pub struct PathTracer<S> {
    source: S,
}

impl<S: TransferSource> PathTracer<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    /// Validate `params` and trace.
    pub fn trace_params(
        &self,
        params: &TraceParams,
        config: &TraceConfig,
    ) -> Result<PathCollection, TraceError> {
        let request = params.validate(config)?;
        Ok(self.trace(&request)?)
    }

    /// Run one trace. Any query failure aborts the call and discards the paths
    /// collected so far.
    pub fn trace(&self, request: &TraceRequest) -> QueryResult<PathCollection> {
        let started = Instant::now();
        let mut cx = TraceContext::new();

        while cx.paths.len() < request.max_total_paths {
            let Some(seed) = self.next_seed(&mut cx, &request.mode)? else {
                tracing::debug!(paths = cx.paths.len(), "no further seed, trace complete");
                break;
            };
            cx.consume(&seed);
            let mut path = TransferPath::seeded(seed);

            for depth in 0..request.max_depth {
                let next = {
                    let hop = Continuation::after(path.last(), &cx.visited);
                    cx.queries += 1;
                    let found = self.source.find_earliest_continuation(&hop)?;
                    if let Some(record) = &found {
                        hop.admit(record)?;
                    }
                    found
                };
                match next {
                    Some(record) => {
                        tracing::debug!(
                            depth,
                            id = %record.id,
                            from = %record.from,
                            to = %record.to,
                            "extended path"
                        );
                        cx.consume(&record);
                        path.push(record);
                    }
                    None => break,
                }
            }

            cx.paths.push(path);
        }

        tracing::info!(
            mode = request.mode.label(),
            paths = cx.paths.len(),
            transfers = cx.visited.len(),
            queries = cx.queries,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "trace finished"
        );
        Ok(cx.paths)
    }

    fn next_seed(&self, cx: &mut TraceContext, mode: &TraceMode) -> QueryResult<Option<TransferRecord>> {
        cx.queries += 1;
        match mode {
            TraceMode::Discovery => {
                let found = self.source.find_earliest_unvisited(None, &cx.visited)?;
                if let Some(record) = &found {
                    admit_unvisited(record, None, &cx.visited)?;
                }
                Ok(found)
            }
            TraceMode::Targeted {
                start_party,
                contract_address,
            } => {
                let hop = Continuation {
                    from_party: start_party,
                    contract_address,
                    not_before: None,
                    exclude: &cx.visited,
                };
                let found = self.source.find_earliest_continuation(&hop)?;
                if let Some(record) = &found {
                    hop.admit(record)?;
                }
                Ok(found)
            }
        }
    }
}

impl TraceMode {
    fn label(&self) -> &'static str {
        match self {
            TraceMode::Discovery => "discovery",
            TraceMode::Targeted { .. } => "targeted",
        }
    }
}
