//! Transfer lookups against a SPARQL backend.

use std::sync::Arc;

use crate::error::{QueryFailure, QueryResult};
use crate::transfer::{TransferRecord, VisitedSet};

use super::query::{
    TransferQuery, VAR_AMOUNT, VAR_CONTRACT, VAR_FROM, VAR_TIMESTAMP, VAR_TO, VAR_TRANSFER, VAR_TX,
};
use super::vocab::TransferTerms;
use super::{Solution, SparqlBackend};

/// Constraints for the next hop out of a party.
#[derive(Debug, Clone, Copy)]
pub struct Continuation<'a> {
    /// Party the next transfer must be sent by.
    pub from_party: &'a str,
    /// Contract the next transfer must belong to.
    pub contract_address: &'a str,
    /// Earliest acceptable timestamp (the previous hop's), if any.
    pub not_before: Option<&'a str>,
    /// Transfers that may not be returned.
    pub exclude: &'a VisitedSet,
}

impl<'a> Continuation<'a> {
    /// The hop following `last`: same contract, sent by `last.to`, not earlier than `last`.
    pub fn after(last: &'a TransferRecord, exclude: &'a VisitedSet) -> Self {
        Self {
            from_party: &last.to,
            contract_address: &last.contract_address,
            not_before: Some(&last.timestamp),
            exclude,
        }
    }

    /// Reject a record the store returned although it violates these constraints.
    pub fn admit(&self, record: &TransferRecord) -> QueryResult<()> {
        if record.from != self.from_party {
            return Err(mismatch(
                record,
                format!("sender is {:?}, asked for {:?}", record.from, self.from_party),
            ));
        }
        if record.contract_address != self.contract_address {
            return Err(mismatch(
                record,
                format!(
                    "contract is {:?}, asked for {:?}",
                    record.contract_address, self.contract_address
                ),
            ));
        }
        if let Some(ts) = self.not_before {
            if record.timestamp.as_str() < ts {
                return Err(mismatch(
                    record,
                    format!("timestamp {:?} is before {ts:?}", record.timestamp),
                ));
            }
        }
        admit_unvisited(record, None, self.exclude)
    }
}

/// Reject a seed the store returned although it is excluded or in another contract.
pub fn admit_unvisited(
    record: &TransferRecord,
    contract_filter: Option<&str>,
    exclude: &VisitedSet,
) -> QueryResult<()> {
    if let Some(contract) = contract_filter {
        if record.contract_address != contract {
            return Err(mismatch(
                record,
                format!("contract is {:?}, asked for {contract:?}", record.contract_address),
            ));
        }
    }
    if exclude.contains(&record.id) {
        return Err(mismatch(record, "transfer was already visited".into()));
    }
    Ok(())
}

fn mismatch(record: &TransferRecord, reason: String) -> QueryFailure {
    QueryFailure::MalformedResponse {
        message: format!(
            "store returned transfer {} outside the query constraints: {reason}",
            record.id
        ),
    }
}

/// Where the tracer gets its transfers from.
///
/// `Ok(None)` means no matching transfer exists; an `Err` means the store could
/// not be asked.
pub trait TransferSource {
    /// Chronologically earliest transfer not in `exclude`, optionally within one contract.
    fn find_earliest_unvisited(
        &self,
        contract_filter: Option<&str>,
        exclude: &VisitedSet,
    ) -> QueryResult<Option<TransferRecord>>;

    /// Chronologically earliest transfer sent by `hop.from_party` within `hop.contract_address`.
    fn find_earliest_continuation(&self, hop: &Continuation<'_>) -> QueryResult<Option<TransferRecord>>;
}

impl<S: TransferSource + ?Sized> TransferSource for &S {
    fn find_earliest_unvisited(
        &self,
        contract_filter: Option<&str>,
        exclude: &VisitedSet,
    ) -> QueryResult<Option<TransferRecord>> {
        (**self).find_earliest_unvisited(contract_filter, exclude)
    }

    fn find_earliest_continuation(&self, hop: &Continuation<'_>) -> QueryResult<Option<TransferRecord>> {
        (**self).find_earliest_continuation(hop)
    }
}

/// Issues one parameterized query per lookup and consumes only the first row.
#[derive(Clone)]
pub struct GraphQueryClient {
    backend: Arc<dyn SparqlBackend>,
    terms: TransferTerms,
}

impl GraphQueryClient {
    pub fn new(backend: Arc<dyn SparqlBackend>, terms: TransferTerms) -> Self {
        Self { backend, terms }
    }

    pub fn backend(&self) -> &Arc<dyn SparqlBackend> {
        &self.backend
    }

    pub fn terms(&self) -> &TransferTerms {
        &self.terms
    }

    fn first(&self, query: TransferQuery<'_>) -> QueryResult<Option<TransferRecord>> {
        let text = query.render()?;
        let rows = self.backend.select(&text).inspect_err(|e| {
            tracing::warn!(error = %e, backend = %self.backend.describe(), "transfer query failed");
        })?;
        rows.first().map(decode_transfer).transpose()
    }
}

impl std::fmt::Debug for GraphQueryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphQueryClient")
            .field("backend", &self.backend.describe())
            .finish()
    }
}

impl TransferSource for GraphQueryClient {
    fn find_earliest_unvisited(
        &self,
        contract_filter: Option<&str>,
        exclude: &VisitedSet,
    ) -> QueryResult<Option<TransferRecord>> {
        let mut query = TransferQuery::new(&self.terms).excluding(exclude);
        if let Some(contract) = contract_filter {
            query = query.contract(contract);
        }
        self.first(query)
    }

    fn find_earliest_continuation(&self, hop: &Continuation<'_>) -> QueryResult<Option<TransferRecord>> {
        let mut query = TransferQuery::new(&self.terms)
            .from_party(hop.from_party)
            .contract(hop.contract_address)
            .excluding(hop.exclude);
        if let Some(ts) = hop.not_before {
            query = query.not_before(ts);
        }
        self.first(query)
    }
}

/// Decode one binding row into a transfer.
pub fn decode_transfer(row: &Solution) -> QueryResult<TransferRecord> {
    Ok(TransferRecord {
        id: row.iri(VAR_TRANSFER)?,
        from: row.text(VAR_FROM)?,
        to: row.text(VAR_TO)?,
        amount: row.numeric(VAR_AMOUNT)?,
        timestamp: row.timestamp(VAR_TIMESTAMP)?,
        contract_address: row.text(VAR_CONTRACT)?,
        tx: row.text(VAR_TX)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::BoundTerm;
    use crate::graph::sparql::OxigraphStore;

    fn t(n: u32, from: &str, to: &str, contract: &str, ts: &str) -> TransferRecord {
        TransferRecord {
            id: format!("http://example.org/resource/transfer/{n}"),
            from: from.into(),
            to: to.into(),
            amount: format!("{}", n * 100),
            timestamp: ts.into(),
            contract_address: contract.into(),
            tx: format!("0x{n:04x}"),
        }
    }

    fn client_with(records: &[TransferRecord]) -> GraphQueryClient {
        let terms = TransferTerms::default();
        let store = OxigraphStore::in_memory().unwrap();
        store.insert_transfers(&terms, records).unwrap();
        GraphQueryClient::new(Arc::new(store), terms)
    }

    #[test]
    fn earliest_unvisited_orders_by_timestamp() {
        let client = client_with(&[
            t(1, "A", "B", "X", "2024-01-03"),
            t(2, "C", "D", "X", "2024-01-01"),
            t(3, "E", "F", "Y", "2024-01-02"),
        ]);
        let mut visited = VisitedSet::new();
        let first = client.find_earliest_unvisited(None, &visited).unwrap().unwrap();
        assert_eq!(first, t(2, "C", "D", "X", "2024-01-01"));

        visited.insert(&first.id);
        let second = client.find_earliest_unvisited(None, &visited).unwrap().unwrap();
        assert_eq!(second.from, "E");

        let in_x = client.find_earliest_unvisited(Some("X"), &visited).unwrap().unwrap();
        assert_eq!(in_x.from, "A");
    }

    #[test]
    fn equal_timestamps_break_ties_by_id() {
        let client = client_with(&[
            t(9, "A", "B", "X", "2024-01-01"),
            t(3, "A", "C", "X", "2024-01-01"),
            t(5, "A", "D", "X", "2024-01-01"),
        ]);
        let visited = VisitedSet::new();
        let first = client.find_earliest_unvisited(None, &visited).unwrap().unwrap();
        assert_eq!(first.id, "http://example.org/resource/transfer/3");
    }

    #[test]
    fn continuation_filters_party_contract_and_time() {
        let client = client_with(&[
            t(1, "B", "C", "X", "2024-01-01"),
            t(2, "B", "D", "Y", "2024-01-02"),
            t(3, "B", "E", "X", "2024-01-03"),
            t(4, "Q", "R", "X", "2024-01-04"),
        ]);
        let visited = VisitedSet::new();

        let hop = Continuation {
            from_party: "B",
            contract_address: "X",
            not_before: None,
            exclude: &visited,
        };
        assert_eq!(client.find_earliest_continuation(&hop).unwrap().unwrap().to, "C");

        let later = Continuation {
            not_before: Some("2024-01-02"),
            ..hop
        };
        assert_eq!(client.find_earliest_continuation(&later).unwrap().unwrap().to, "E");

        let other_contract = Continuation {
            contract_address: "Y",
            ..hop
        };
        assert_eq!(
            client.find_earliest_continuation(&other_contract).unwrap().unwrap().to,
            "D"
        );
    }

    #[test]
    fn continuation_respects_visited() {
        let client = client_with(&[t(1, "B", "C", "X", "2024-01-01"), t(2, "B", "D", "X", "2024-01-02")]);
        let mut visited = VisitedSet::new();
        visited.insert("http://example.org/resource/transfer/1");
        let hop = Continuation {
            from_party: "B",
            contract_address: "X",
            not_before: None,
            exclude: &visited,
        };
        assert_eq!(client.find_earliest_continuation(&hop).unwrap().unwrap().to, "D");

        visited.insert("http://example.org/resource/transfer/2");
        let hop = Continuation {
            from_party: "B",
            contract_address: "X",
            not_before: None,
            exclude: &visited,
        };
        assert!(client.find_earliest_continuation(&hop).unwrap().is_none());
    }

    #[test]
    fn unknown_party_is_none_not_error() {
        let client = client_with(&[t(1, "A", "B", "X", "2024-01-01")]);
        let visited = VisitedSet::new();
        let hop = Continuation {
            from_party: "nobody",
            contract_address: "X",
            not_before: None,
            exclude: &visited,
        };
        assert!(client.find_earliest_continuation(&hop).unwrap().is_none());
    }

    #[test]
    fn quoted_party_cannot_break_the_query() {
        let client = client_with(&[t(1, "A\"B", "C", "X", "2024-01-01")]);
        let visited = VisitedSet::new();
        let hop = Continuation {
            from_party: "A\"B",
            contract_address: "X",
            not_before: None,
            exclude: &visited,
        };
        let found = client.find_earliest_continuation(&hop).unwrap().unwrap();
        assert_eq!(found.from, "A\"B");

        let hostile = Continuation {
            from_party: "A\" || true || \"",
            ..hop
        };
        assert!(client.find_earliest_continuation(&hostile).unwrap().is_none());
    }

    struct Canned(Vec<Solution>);

    impl SparqlBackend for Canned {
        fn select(&self, _query: &str) -> QueryResult<Vec<Solution>> {
            Ok(self.0.clone())
        }
        fn describe(&self) -> String {
            "canned".into()
        }
    }

    #[test]
    fn row_missing_a_variable_is_malformed() {
        let row = Solution::new()
            .with("transfer", BoundTerm::iri("http://e/1"))
            .with("from", BoundTerm::literal("A"));
        let client = GraphQueryClient::new(Arc::new(Canned(vec![row])), TransferTerms::default());
        let err = client
            .find_earliest_unvisited(None, &VisitedSet::new())
            .unwrap_err();
        assert!(matches!(err, QueryFailure::MalformedResponse { .. }));
    }

    #[test]
    fn only_the_first_row_is_consumed() {
        let row = |id: &str, to: &str| {
            Solution::new()
                .with("transfer", BoundTerm::iri(id))
                .with("from", BoundTerm::literal("A"))
                .with("to", BoundTerm::literal(to))
                .with("amount", BoundTerm::literal("5"))
                .with("timestamp", BoundTerm::literal("1"))
                .with("contract", BoundTerm::literal("X"))
                .with("tx", BoundTerm::literal("0x1"))
        };
        let client = GraphQueryClient::new(
            Arc::new(Canned(vec![row("http://e/1", "B"), row("http://e/2", "C")])),
            TransferTerms::default(),
        );
        let found = client
            .find_earliest_unvisited(None, &VisitedSet::new())
            .unwrap()
            .unwrap();
        assert_eq!(found.to, "B");
    }
}
