//! Transfer data model: records, reconstructed paths, and the per-call visited set.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// One observed token movement, as read from the store.
///
/// Never mutated after retrieval; the tracer only reads and records it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRecord {
    /// IRI of the transfer resource.
    pub id: String,
    pub from: String,
    pub to: String,
    /// Integer quantity kept in its decimal lexical form.
    pub amount: String,
    /// Lexically sortable timestamp.
    pub timestamp: String,
    pub contract_address: String,
    pub tx: String,
}

/// A causal chain of transfers: each record's `to` is the next record's `from`,
/// all within one contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct TransferPath(Vec<TransferRecord>);

impl TransferPath {
    /// Start a path at its seed transfer.
    pub fn seeded(seed: TransferRecord) -> Self {
        Self(vec![seed])
    }

    pub fn seed(&self) -> &TransferRecord {
        &self.0[0]
    }

    /// Last record; a path is never empty.
    pub fn last(&self) -> &TransferRecord {
        &self.0[self.0.len() - 1]
    }

    pub fn push(&mut self, record: TransferRecord) {
        debug_assert_eq!(self.last().to, record.from);
        debug_assert_eq!(self.last().contract_address, record.contract_address);
        self.0.push(record);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Never true for a path built with `seeded`.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of hops appended after the seed.
    pub fn hops(&self) -> usize {
        self.0.len() - 1
    }

    pub fn records(&self) -> &[TransferRecord] {
        &self.0
    }

    /// Whether every adjacent pair is linked by party and contract.
    pub fn is_continuous(&self) -> bool {
        self.0
            .windows(2)
            .all(|w| w[0].to == w[1].from && w[0].contract_address == w[1].contract_address)
    }
}

/// Ordered result of one trace call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PathCollection(Vec<TransferPath>);

impl PathCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, path: TransferPath) {
        self.0.push(path);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn paths(&self) -> &[TransferPath] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &TransferPath> {
        self.0.iter()
    }

    /// Total number of transfers across all paths.
    pub fn transfer_count(&self) -> usize {
        self.0.iter().map(TransferPath::len).sum()
    }
}

impl IntoIterator for PathCollection {
    type Item = TransferPath;
    type IntoIter = std::vec::IntoIter<TransferPath>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Ids of transfers already placed in some path during the current call.
///
/// Ordered so that queries built from it are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisitedSet {
    ids: BTreeSet<String>,
}

impl VisitedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a transfer as consumed. Returns `false` if it already was.
    pub fn insert(&mut self, id: &str) -> bool {
        self.ids.insert(id.to_string())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }
}
