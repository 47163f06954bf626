//! Parameterized transfer queries.
//!
//! Caller-supplied values never enter the query text as raw strings. They are
//! bound to SPARQL variables through a `VALUES` block whose entries are RDF
//! literals serialized by oxigraph, so quotes, backslashes and newlines arrive
//! escaped. Visited transfer ids are likewise validated and serialized as IRIs.

use oxigraph::model::{Literal, NamedNode};

use crate::error::{QueryFailure, QueryResult};
use crate::transfer::VisitedSet;

use super::vocab::TransferTerms;

pub const VAR_TRANSFER: &str = "transfer";
pub const VAR_FROM: &str = "from";
pub const VAR_TO: &str = "to";
pub const VAR_AMOUNT: &str = "amount";
pub const VAR_TIMESTAMP: &str = "timestamp";
pub const VAR_CONTRACT: &str = "contract";
pub const VAR_TX: &str = "tx";

const PARAM_FROM: &str = "fromParty";
const PARAM_CONTRACT: &str = "contractAddress";
const PARAM_NOT_BEFORE: &str = "notBefore";

/// "Earliest transfer matching these constraints" query, limited to one row.
#[derive(Debug, Clone, Copy)]
pub struct TransferQuery<'a> {
    terms: &'a TransferTerms,
    from_party: Option<&'a str>,
    contract_address: Option<&'a str>,
    not_before: Option<&'a str>,
    exclude: Option<&'a VisitedSet>,
}

impl<'a> TransferQuery<'a> {
    pub fn new(terms: &'a TransferTerms) -> Self {
        Self {
            terms,
            from_party: None,
            contract_address: None,
            not_before: None,
            exclude: None,
        }
    }

    /// Only transfers sent by `party`.
    pub fn from_party(mut self, party: &'a str) -> Self {
        self.from_party = Some(party);
        self
    }

    /// Only transfers of `contract`.
    pub fn contract(mut self, contract: &'a str) -> Self {
        self.contract_address = Some(contract);
        self
    }

    /// Only transfers whose timestamp sorts at or after `timestamp`.
    pub fn not_before(mut self, timestamp: &'a str) -> Self {
        self.not_before = Some(timestamp);
        self
    }

    /// Skip transfers already in `visited`.
    pub fn excluding(mut self, visited: &'a VisitedSet) -> Self {
        self.exclude = Some(visited);
        self
    }

    /// Render the SPARQL SELECT text.
    pub fn render(&self) -> QueryResult<String> {
        let t = self.terms;
        let mut q = String::with_capacity(1024);

        q.push_str(&format!(
            "SELECT ?{VAR_TRANSFER} ?{VAR_FROM} ?{VAR_TO} ?{VAR_AMOUNT} ?{VAR_TIMESTAMP} ?{VAR_CONTRACT} ?{VAR_TX}\nWHERE {{\n"
        ));

        let params: Vec<(&str, &str)> = [
            (PARAM_FROM, self.from_party),
            (PARAM_CONTRACT, self.contract_address),
            (PARAM_NOT_BEFORE, self.not_before),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.map(|v| (name, v)))
        .collect();

        if !params.is_empty() {
            let vars: Vec<String> = params.iter().map(|(name, _)| format!("?{name}")).collect();
            let values: Vec<String> = params
                .iter()
                .map(|(_, value)| Literal::new_simple_literal(*value).to_string())
                .collect();
            q.push_str(&format!(
                "  VALUES ({}) {{ ({}) }}\n",
                vars.join(" "),
                values.join(" ")
            ));
        }

        q.push_str(&format!(
            "  ?{VAR_TRANSFER} {} {} ;\n    {} ?{VAR_FROM} ;\n    {} ?{VAR_TO} ;\n    {} ?{VAR_AMOUNT} ;\n    {} ?{VAR_TIMESTAMP} ;\n    {} ?{VAR_CONTRACT} ;\n    {} ?{VAR_TX} .\n",
            t.rdf_type,
            t.transfer_class,
            t.from,
            t.to,
            t.amount,
            t.timestamp,
            t.contract_address,
            t.tx,
        ));

        if self.from_party.is_some() {
            q.push_str(&format!("  FILTER(STR(?{VAR_FROM}) = ?{PARAM_FROM})\n"));
        }
        if self.contract_address.is_some() {
            q.push_str(&format!("  FILTER(STR(?{VAR_CONTRACT}) = ?{PARAM_CONTRACT})\n"));
        }
        if self.not_before.is_some() {
            q.push_str(&format!("  FILTER(STR(?{VAR_TIMESTAMP}) >= ?{PARAM_NOT_BEFORE})\n"));
        }
        if let Some(visited) = self.exclude.filter(|v| !v.is_empty()) {
            let iris = visited
                .iter()
                .map(|id| {
                    NamedNode::new(id)
                        .map(|n| n.to_string())
                        .map_err(|e| QueryFailure::InvalidTerm {
                            value: id.to_string(),
                            message: e.to_string(),
                        })
                })
                .collect::<QueryResult<Vec<_>>>()?;
            q.push_str(&format!(
                "  FILTER(?{VAR_TRANSFER} NOT IN ({}))\n",
                iris.join(", ")
            ));
        }

        q.push_str(&format!(
            "}}\nORDER BY STR(?{VAR_TIMESTAMP}) STR(?{VAR_TRANSFER})\nLIMIT 1\n"
        ));
        Ok(q)
    }
}
