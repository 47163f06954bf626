//! Rich diagnostic error types for semantica.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes, help text, and source chains so callers can tell
//! "the request was wrong" apart from "the store could not be asked".

use miette::Diagnostic;
use thiserror::Error;

use crate::config::ConfigError;
use crate::paths::PathError;

/// Top-level error type for semantica.
///
/// Each variant wraps a subsystem-specific error, preserving the full diagnostic
/// chain through to the user.
#[derive(Debug, Error, Diagnostic)]
pub enum SemanticaError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Query(#[from] QueryFailure),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Paths(#[from] PathError),
}

impl From<TraceError> for SemanticaError {
    fn from(err: TraceError) -> Self {
        match err {
            TraceError::Validation(e) => SemanticaError::Validation(e),
            TraceError::Query(e) => SemanticaError::Query(e),
        }
    }
}

pub type SemanticaResult<T> = std::result::Result<T, SemanticaError>;

// ---------------------------------------------------------------------------
// Query failures
// ---------------------------------------------------------------------------

/// A store query that could not be completed.
///
/// Distinct from an empty result: "no matching transfer" is `Ok(None)`, never
/// one of these.
#[derive(Debug, Error, Diagnostic)]
pub enum QueryFailure {
    #[error("SPARQL endpoint {endpoint} did not answer within {timeout_ms} ms")]
    #[diagnostic(
        code(semantica::query::timeout),
        help(
            "The store took longer than the configured timeout. \
             Raise `store.timeout_secs`, lower `max_depth`/`max_total_paths`, \
             or check the endpoint's load."
        )
    )]
    Timeout { endpoint: String, timeout_ms: u64 },

    #[error("transport error talking to {endpoint}: {message}")]
    #[diagnostic(
        code(semantica::query::transport),
        help("Is the SPARQL endpoint running and reachable at the configured URL?")
    )]
    Transport { endpoint: String, message: String },

    #[error("SPARQL endpoint returned HTTP {status}: {body}")]
    #[diagnostic(
        code(semantica::query::status),
        help(
            "The endpoint rejected the query. A 4xx usually means the vocabulary \
             in the config does not match the store; a 5xx is a store-side fault."
        )
    )]
    Status { status: u16, body: String },

    #[error("malformed query response: {message}")]
    #[diagnostic(
        code(semantica::query::malformed),
        help(
            "The store answered, but not with the expected SPARQL JSON results or \
             not with the expected variable bindings. Check that transfers carry \
             every property of the configured vocabulary."
        )
    )]
    MalformedResponse { message: String },

    #[error("SPARQL evaluation failed: {message}")]
    #[diagnostic(
        code(semantica::query::evaluation),
        help("The embedded store could not evaluate the query. Check the query syntax.")
    )]
    Evaluation { message: String },

    #[error("value {value:?} cannot be bound as an RDF term: {message}")]
    #[diagnostic(
        code(semantica::query::invalid_term),
        help("Transfer identifiers must be absolute IRIs.")
    )]
    InvalidTerm { value: String, message: String },
}

impl QueryFailure {
    /// Whether the failure was the store not answering in time.
    pub fn is_timeout(&self) -> bool {
        matches!(self, QueryFailure::Timeout { .. })
    }
}

pub type QueryResult<T> = std::result::Result<T, QueryFailure>;

// ---------------------------------------------------------------------------
// Request validation
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic, PartialEq, Eq)]
pub enum ValidationError {
    #[error("`{present}` was given without `{missing}`")]
    #[diagnostic(
        code(semantica::validation::partial_target),
        help(
            "A targeted trace needs both `start_party` and `contract_address`. \
             Omit both to run global discovery instead."
        )
    )]
    PartialTarget {
        present: &'static str,
        missing: &'static str,
    },

    #[error("`{field}` must not be negative (got {value})")]
    #[diagnostic(code(semantica::validation::negative))]
    Negative { field: &'static str, value: i64 },

    #[error("`max_total_paths` must be at least 1")]
    #[diagnostic(
        code(semantica::validation::zero_paths),
        help("Ask for at least one path, or leave the parameter out to use the default.")
    )]
    ZeroPaths,

    #[error("`{field}` = {value} exceeds the configured limit of {limit}")]
    #[diagnostic(
        code(semantica::validation::limit),
        help("Every hop is a store round trip. Raise the limit under `[trace]` in the config if needed.")
    )]
    ExceedsLimit {
        field: &'static str,
        value: i64,
        limit: usize,
    },

    #[error("`{field}` must not be empty")]
    #[diagnostic(code(semantica::validation::empty))]
    Empty { field: &'static str },

    #[error("malformed trace parameters: {message}")]
    #[diagnostic(
        code(semantica::validation::malformed_params),
        help("`max_depth` and `max_total_paths` must be integers.")
    )]
    MalformedParams { message: String },
}

// ---------------------------------------------------------------------------
// Trace errors
// ---------------------------------------------------------------------------

/// Everything that can make a trace call fail.
///
/// Running out of seeds or continuations is not in here: those end the trace or
/// the current path normally.
#[derive(Debug, Error, Diagnostic)]
pub enum TraceError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Query(#[from] QueryFailure),
}

// ---------------------------------------------------------------------------
// Local store errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error("failed to open oxigraph store at {path}: {message}")]
    #[diagnostic(
        code(semantica::store::open),
        help(
            "Check that the data directory exists, is writable, and is not \
             locked by another semantica process."
        )
    )]
    Open { path: String, message: String },

    #[error("failed to insert transfer {id}: {message}")]
    #[diagnostic(
        code(semantica::store::insert),
        help("Transfer ids must be absolute IRIs; other fields are stored as literals.")
    )]
    Insert { id: String, message: String },

    #[error("failed to read transfers from {path}")]
    #[diagnostic(
        code(semantica::store::ingest_read),
        help("The ingest file must exist and be readable.")
    )]
    IngestRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse transfers from {path}: {message}")]
    #[diagnostic(
        code(semantica::store::ingest_parse),
        help(
            "Expected a JSON array of objects with fields \
             id, from, to, amount, timestamp, contractAddress, tx."
        )
    )]
    IngestParse { path: String, message: String },

    #[error("operation requires the embedded store, but a remote endpoint is configured")]
    #[diagnostic(
        code(semantica::store::remote),
        help("Run without `--endpoint` (and without `store.endpoint` in the config).")
    )]
    RemoteBackend,
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
