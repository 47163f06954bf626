// The miette `Diagnostic` derive binds every field of struct variants such as
// `QueryFailure::Timeout`; rustc reports the unread bindings as unused assignments.
#![allow(unused_assignments)]

//! # semantica
//!
//! Transfer-path tracing over a SPARQL triple store.
//!
//! Token transfers are stored as RDF resources. The tracer reconstructs chains
//! of transfers (A→B, B→C, ...) within one token contract by asking the store,
//! hop by hop, for the chronologically earliest transfer out of the last
//! recipient.
//!
//! ## Architecture
//!
//! - **Store access** (`graph`): parameterized SELECT queries against an
//!   embedded oxigraph store or a remote SPARQL 1.1 endpoint
//! - **Tracing** (`trace`): discovery and targeted path reconstruction with a
//!   call-scoped visited set
//! - **Engine** (`engine`): backend selection from config, shared by the CLI and
//!   the HTTP server
//! - **HTTP** (`http`, feature `server`): routes and the mapping from failures
//!   to status codes
//!
//! ## Library usage
//!
//! ```no_run
//! use semantica::config::SemanticaConfig;
//! use semantica::engine::Engine;
//! use semantica::trace::TraceRequest;
//!
//! let engine = Engine::in_memory(SemanticaConfig::default()).unwrap();
//! let paths = engine.trace(&TraceRequest::targeted("A", "X", 3, 10)).unwrap();
//! for path in paths.iter() {
//!     println!("{} hops", path.hops());
//! }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod graph;
#[cfg(feature = "server")]
pub mod http;
pub mod paths;
pub mod trace;
pub mod transfer;
