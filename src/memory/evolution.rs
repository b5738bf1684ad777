//! Append-only log of symbolic state transitions.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// One `before → after` transition and the operation that caused it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvolutionRecord {
    /// Position in the log; strictly increasing.
    pub seq: u64,
    pub before: String,
    pub after: String,
    pub operation: String,
    /// Milliseconds since the UNIX epoch.
    pub timestamp_ms: u64,
}

/// Ordered, append-only evolution records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvolutionLog {
    records: Vec<EvolutionRecord>,
    next_seq: u64,
}

impl EvolutionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a log from previously saved records, e.g. a snapshot.
    ///
    /// Records are ordered by `seq`; new appends continue after the highest one.
    pub fn from_records(mut records: Vec<EvolutionRecord>) -> Self {
        records.sort_by_key(|r| r.seq);
        let next_seq = records.last().map_or(0, |r| r.seq + 1);
        Self { records, next_seq }
    }

    pub fn append(
        &mut self,
        before: impl Into<String>,
        after: impl Into<String>,
        operation: impl Into<String>,
    ) -> &EvolutionRecord {
        let timestamp_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();
        let record = EvolutionRecord {
            seq: self.next_seq,
            before: before.into(),
            after: after.into(),
            operation: operation.into(),
            timestamp_ms,
        };
        self.next_seq += 1;
        self.records.push(record);
        &self.records[self.records.len() - 1]
    }

    pub fn records(&self) -> &[EvolutionRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Trace how `state` came to be, newest transition first.
    ///
    /// Starting from the most recent record whose `after` is `state`, each
    /// step moves to the most recent *earlier* record whose `after` equals
    /// the current record's `before`. Because every step goes strictly back
    /// in the log, the walk terminates even when states repeat.
    pub fn lineage(&self, state: &str) -> Vec<&EvolutionRecord> {
        let mut chain = Vec::new();
        let mut bound = self.records.len();
        let mut target = state;
        while let Some(idx) = self.records[..bound].iter().rposition(|r| r.after == target) {
            let record = &self.records[idx];
            chain.push(record);
            target = &record.before;
            bound = idx;
        }
        chain
    }
}
