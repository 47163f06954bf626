//! Store access: binding rows, SPARQL backends, and the transfer query client.
//!
//! - [`SparqlBackend`] is the seam to the triple store. It is implemented by the
//!   embedded oxigraph store ([`sparql::OxigraphStore`]) and by a remote SPARQL
//!   1.1 Protocol endpoint ([`endpoint::HttpEndpoint`]).
//! - [`client::GraphQueryClient`] turns transfer lookups into parameterized
//!   queries and decodes the rows into [`TransferRecord`](crate::transfer::TransferRecord)s.

pub mod client;
pub mod endpoint;
pub mod query;
pub mod sparql;
pub mod vocab;

use std::collections::BTreeMap;
use std::sync::LazyLock;

use oxigraph::model::NamedNode;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{QueryFailure, QueryResult};

/// Decimal lexical form: optional sign, digits, optional fraction.
static DECIMAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[+-]?[0-9]+(\.[0-9]+)?$").expect("static regex"));

/// One bound value, in the shape of the SPARQL 1.1 JSON results format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BoundTerm {
    #[serde(rename = "uri")]
    Iri { value: String },
    Bnode { value: String },
    #[serde(alias = "typed-literal")]
    Literal {
        value: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        datatype: Option<String>,
        #[serde(rename = "xml:lang", default, skip_serializing_if = "Option::is_none")]
        language: Option<String>,
    },
}

impl BoundTerm {
    pub fn iri(value: impl Into<String>) -> Self {
        BoundTerm::Iri {
            value: value.into(),
        }
    }

    pub fn literal(value: impl Into<String>) -> Self {
        BoundTerm::Literal {
            value: value.into(),
            datatype: None,
            language: None,
        }
    }

    /// Lexical form, regardless of term kind.
    pub fn lexical(&self) -> &str {
        match self {
            BoundTerm::Iri { value } | BoundTerm::Bnode { value } => value,
            BoundTerm::Literal { value, .. } => value,
        }
    }
}

/// One result row: variable name to bound term. Unbound variables are absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Solution(BTreeMap<String, BoundTerm>);

impl Solution {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, var: &str, term: BoundTerm) -> Self {
        self.insert(var, term);
        self
    }

    pub fn insert(&mut self, var: &str, term: BoundTerm) {
        self.0.insert(var.to_string(), term);
    }

    pub fn get(&self, var: &str) -> Option<&BoundTerm> {
        self.0.get(var)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BoundTerm)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn required(&self, var: &str) -> QueryResult<&BoundTerm> {
        self.get(var).ok_or_else(|| QueryFailure::MalformedResponse {
            message: format!("variable ?{var} is unbound"),
        })
    }

    /// A variable bound to an absolute IRI.
    pub fn iri(&self, var: &str) -> QueryResult<String> {
        match self.required(var)? {
            BoundTerm::Iri { value } => NamedNode::new(value.as_str())
                .map(|n| n.into_string())
                .map_err(|e| QueryFailure::MalformedResponse {
                    message: format!("?{var} is not a valid IRI ({value:?}): {e}"),
                }),
            other => Err(QueryFailure::MalformedResponse {
                message: format!("?{var} should be an IRI, got {other:?}"),
            }),
        }
    }

    /// A variable read as text: literal lexical form, or the IRI itself.
    pub fn text(&self, var: &str) -> QueryResult<String> {
        match self.required(var)? {
            BoundTerm::Bnode { value } => Err(QueryFailure::MalformedResponse {
                message: format!("?{var} is a blank node (_:{value}), expected a value"),
            }),
            term => Ok(term.lexical().to_string()),
        }
    }

    /// A variable whose lexical form is a decimal number.
    pub fn numeric(&self, var: &str) -> QueryResult<String> {
        let text = self.text(var)?;
        if DECIMAL.is_match(&text) {
            Ok(text)
        } else {
            Err(QueryFailure::MalformedResponse {
                message: format!("?{var} is not a decimal number: {text:?}"),
            })
        }
    }

    /// A variable holding a (lexically sortable) timestamp.
    pub fn timestamp(&self, var: &str) -> QueryResult<String> {
        let text = self.text(var)?;
        if text.trim().is_empty() {
            return Err(QueryFailure::MalformedResponse {
                message: format!("?{var} is an empty timestamp"),
            });
        }
        Ok(text)
    }
}

/// A SPARQL store that can answer SELECT queries.
///
/// Implementations keep no per-call mutable state, so one backend can be shared
/// by concurrent trace calls.
pub trait SparqlBackend: Send + Sync {
    /// Evaluate a SELECT query and return its rows in store order.
    fn select(&self, query: &str) -> QueryResult<Vec<Solution>>;

    /// Short human-readable description, for logs and health output.
    fn describe(&self) -> String;
}
