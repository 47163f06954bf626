//! RDF vocabulary describing transfer events in the store.
//!
//! The defaults match the indexer's SQL-to-RDF mapping: every transfer is an
//! instance of `http://example.org/resource/transfer` with properties in the
//! `http://example.org/resource/transfer#` namespace.

use oxigraph::model::NamedNode;
use oxigraph::model::vocab::rdf;
use serde::{Deserialize, Serialize};

use crate::config::{ConfigError, ConfigResult};

pub const DEFAULT_NAMESPACE: &str = "http://example.org/resource/transfer#";
pub const DEFAULT_TRANSFER_CLASS: &str = "http://example.org/resource/transfer";

/// Configured (unvalidated) vocabulary, as it appears under `[vocabulary]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vocabulary {
    /// Namespace prefixed to the property local names.
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// `rdf:type` of transfer resources.
    #[serde(default = "default_transfer_class")]
    pub transfer_class: String,
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.into()
}
fn default_transfer_class() -> String {
    DEFAULT_TRANSFER_CLASS.into()
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            transfer_class: default_transfer_class(),
        }
    }
}

impl Vocabulary {
    /// Validate every IRI and build the term set used in queries and inserts.
    pub fn compile(&self) -> ConfigResult<TransferTerms> {
        let property = |local: &str| named(format!("{}{local}", self.namespace));
        Ok(TransferTerms {
            rdf_type: rdf::TYPE.into_owned(),
            transfer_class: named(self.transfer_class.clone())?,
            from: property("from")?,
            to: property("to")?,
            amount: property("amount")?,
            timestamp: property("timestamp")?,
            contract_address: property("contract_address")?,
            tx: property("tx")?,
        })
    }
}

fn named(iri: String) -> ConfigResult<NamedNode> {
    NamedNode::new(iri.clone()).map_err(|e| ConfigError::InvalidIri {
        iri,
        message: e.to_string(),
    })
}

/// Validated vocabulary terms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferTerms {
    pub rdf_type: NamedNode,
    pub transfer_class: NamedNode,
    pub from: NamedNode,
    pub to: NamedNode,
    pub amount: NamedNode,
    pub timestamp: NamedNode,
    pub contract_address: NamedNode,
    pub tx: NamedNode,
}

impl Default for TransferTerms {
    fn default() -> Self {
        // The built-in defaults are constant, valid IRIs.
        Vocabulary::default()
            .compile()
            .unwrap_or_else(|e| unreachable!("default vocabulary is valid: {e}"))
    }
}
