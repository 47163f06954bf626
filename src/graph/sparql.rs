//! Embedded SPARQL RDF store backed by oxigraph.
//!
//! Used when no remote endpoint is configured, by `semantica ingest`, and as the
//! store behind the integration tests.

use std::path::Path;

use oxigraph::model::vocab::xsd;
use oxigraph::model::{GraphName, Literal, NamedNode, Quad, Term};
use oxigraph::sparql::QueryResults;
use oxigraph::store::Store;

use crate::error::{QueryFailure, QueryResult, StoreError, StoreResult};
use crate::transfer::TransferRecord;

use super::vocab::TransferTerms;
use super::{BoundTerm, Solution, SparqlBackend};

/// Embedded SPARQL-capable RDF store.
pub struct OxigraphStore {
    store: Store,
    location: String,
}

impl OxigraphStore {
    /// Create a new in-memory store (no persistence).
    pub fn in_memory() -> StoreResult<Self> {
        let store = Store::new().map_err(|e| StoreError::Open {
            path: ":memory:".into(),
            message: e.to_string(),
        })?;
        Ok(Self {
            store,
            location: "in-memory".into(),
        })
    }

    /// Open or create a persistent store at the given path.
    pub fn open(path: &Path) -> StoreResult<Self> {
        std::fs::create_dir_all(path).map_err(|e| StoreError::Open {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let store = Store::open(path).map_err(|e| StoreError::Open {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Ok(Self {
            store,
            location: path.display().to_string(),
        })
    }

    /// Insert one transfer as a resource described by the vocabulary.
    ///
    /// Parties, contract, transaction and timestamp are plain literals; the amount
    /// is an `xsd:integer` literal in its original lexical form.
    pub fn insert_transfer(&self, terms: &TransferTerms, record: &TransferRecord) -> StoreResult<()> {
        let subject = NamedNode::new(record.id.as_str()).map_err(|e| StoreError::Insert {
            id: record.id.clone(),
            message: e.to_string(),
        })?;

        let properties: [(&NamedNode, Term); 7] = [
            (&terms.rdf_type, terms.transfer_class.clone().into()),
            (&terms.from, Literal::new_simple_literal(&record.from).into()),
            (&terms.to, Literal::new_simple_literal(&record.to).into()),
            (
                &terms.amount,
                Literal::new_typed_literal(&record.amount, xsd::INTEGER).into(),
            ),
            (&terms.timestamp, Literal::new_simple_literal(&record.timestamp).into()),
            (
                &terms.contract_address,
                Literal::new_simple_literal(&record.contract_address).into(),
            ),
            (&terms.tx, Literal::new_simple_literal(&record.tx).into()),
        ];

        for (predicate, object) in properties {
            let quad = Quad::new(
                subject.clone(),
                predicate.clone(),
                object,
                GraphName::DefaultGraph,
            );
            self.store.insert(&quad).map_err(|e| StoreError::Insert {
                id: record.id.clone(),
                message: e.to_string(),
            })?;
        }
        Ok(())
    }

    /// Insert many transfers. Returns how many were written.
    pub fn insert_transfers<'a>(
        &self,
        terms: &TransferTerms,
        records: impl IntoIterator<Item = &'a TransferRecord>,
    ) -> StoreResult<usize> {
        let mut count = 0;
        for record in records {
            self.insert_transfer(terms, record)?;
            count += 1;
        }
        tracing::debug!(count, store = %self.location, "inserted transfers");
        Ok(count)
    }

    /// Load a JSON array of transfers from a file.
    pub fn ingest_json_file(&self, terms: &TransferTerms, path: &Path) -> StoreResult<usize> {
        let content = std::fs::read_to_string(path).map_err(|e| StoreError::IngestRead {
            path: path.display().to_string(),
            source: e,
        })?;
        let records: Vec<TransferRecord> =
            serde_json::from_str(&content).map_err(|e| StoreError::IngestParse {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
        self.insert_transfers(terms, &records)
    }

    /// Number of resources typed as transfers.
    pub fn transfer_count(&self, terms: &TransferTerms) -> QueryResult<usize> {
        let query = format!(
            "SELECT (COUNT(?t) AS ?count) WHERE {{ ?t {} {} }}",
            terms.rdf_type, terms.transfer_class
        );
        let rows = self.select(&query)?;
        let Some(row) = rows.first() else {
            return Ok(0);
        };
        let count = row.numeric("count")?;
        count.parse().map_err(|e| QueryFailure::MalformedResponse {
            message: format!("count {count:?} is not an integer: {e}"),
        })
    }
}

fn bound_term(term: &Term) -> BoundTerm {
    match term {
        Term::NamedNode(node) => BoundTerm::iri(node.as_str()),
        Term::BlankNode(node) => BoundTerm::Bnode {
            value: node.as_str().to_string(),
        },
        Term::Literal(literal) => BoundTerm::Literal {
            value: literal.value().to_string(),
            datatype: Some(literal.datatype().as_str().to_string()),
            language: literal.language().map(str::to_string),
        },
        #[allow(unreachable_patterns)]
        other => BoundTerm::literal(other.to_string()),
    }
}

impl SparqlBackend for OxigraphStore {
    fn select(&self, query: &str) -> QueryResult<Vec<Solution>> {
        let results = self.store.query(query).map_err(|e| QueryFailure::Evaluation {
            message: e.to_string(),
        })?;

        match results {
            QueryResults::Solutions(solutions) => {
                let mut rows = Vec::new();
                for solution in solutions {
                    let solution = solution.map_err(|e| QueryFailure::Evaluation {
                        message: format!("solution error: {e}"),
                    })?;
                    let mut row = Solution::new();
                    for (var, term) in solution.iter() {
                        row.insert(var.as_str(), bound_term(term));
                    }
                    rows.push(row);
                }
                Ok(rows)
            }
            QueryResults::Boolean(_) | QueryResults::Graph(_) => {
                Err(QueryFailure::MalformedResponse {
                    message: "expected a SELECT query; ASK/CONSTRUCT/DESCRIBE are not supported"
                        .into(),
                })
            }
        }
    }

    fn describe(&self) -> String {
        format!("oxigraph ({})", self.location)
    }
}

impl std::fmt::Debug for OxigraphStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OxigraphStore")
            .field("location", &self.location)
            .finish()
    }
}
