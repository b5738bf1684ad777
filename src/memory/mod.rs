//! Symbolic memory: the caller-facing layer over the connector.
//!
//! Spaces are not stored entities. A space is a synthetic marker concept
//! (`Space_<name>`) plus one `InheritanceLink` from each stored payload to
//! that marker. Alongside the remote writes, the memory keeps a local log
//! of payloads per space; pattern search, compression and neighbor queries
//! run purely against that local log.
//!
//! Consistency is deliberately weak: `store` needs a live connection to
//! start, but succeeds once local state is recorded even if the remote
//! notifications ended up in the fallback queue.

pub mod evolution;
pub mod patterns;
pub mod snapshot;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use crate::atom::{Atom, Link, escape_name};
use crate::connector::Connector;
use crate::error::{BridgeResult, MemoryError};
use crate::notation;
use crate::reason;
use crate::sexpr::SExpr;

pub use evolution::{EvolutionLog, EvolutionRecord};
pub use patterns::PatternMatches;
pub use snapshot::MemorySnapshot;

/// Outcome of [`SymbolicMemory::compress`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompressionReport {
    pub original_count: usize,
    pub compressed_count: usize,
    /// `compressed / original`; 1.0 for an empty space.
    pub ratio: f64,
}

/// Namespaced store/retrieve, evolution tracking and local search.
#[derive(Debug)]
pub struct SymbolicMemory {
    connector: Arc<Connector>,
    spaces: RwLock<BTreeMap<String, Vec<String>>>,
    evolution: Mutex<EvolutionLog>,
}

impl SymbolicMemory {
    pub fn new(connector: Arc<Connector>) -> Self {
        Self {
            connector,
            spaces: RwLock::new(BTreeMap::new()),
            evolution: Mutex::new(EvolutionLog::new()),
        }
    }

    pub fn connector(&self) -> &Arc<Connector> {
        &self.connector
    }

    fn evolution_log_guard(&self) -> MutexGuard<'_, EvolutionLog> {
        self.evolution.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn marker_name(&self, space: &str) -> String {
        format!("{}{space}", self.connector.config().space_prefix)
    }

    /// Create the marker and payload concepts plus the membership link.
    fn link_into_space(&self, space: &str, data: &str) -> BridgeResult<Arc<Link>> {
        let marker = self.connector.create_concept_node(&self.marker_name(space))?;
        let node = self.connector.create_concept_node(data)?;
        self.connector.create_inheritance_link(node, marker)
    }

    /// Store `data` into `space`.
    ///
    /// Fails with [`MemoryError::NotConnected`] when there is no live
    /// connection; otherwise records the payload locally once the
    /// membership link exists.
    pub fn store(&self, space: &str, data: &str) -> BridgeResult<()> {
        if !self.connector.is_connected() {
            return Err(MemoryError::NotConnected {
                operation: "store".into(),
            }
            .into());
        }
        let link = self.link_into_space(space, data)?;
        self.spaces
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(space.to_string())
            .or_default()
            .push(data.to_string());
        tracing::info!(space, link = %link.id, "stored");
        Ok(())
    }

    /// Ask the server for every atom inheriting from the space marker.
    ///
    /// Returns the raw reply, or empty text when disconnected or when
    /// nothing came back within the response window. There is no fallback
    /// to the local space log. `query` is only logged.
    pub fn retrieve(&self, space: &str, query: &str) -> String {
        if !self.connector.is_connected() {
            tracing::debug!(space, "retrieve skipped: not connected");
            return String::new();
        }
        tracing::debug!(space, query, "retrieve");
        self.connector.evaluate(&retrieve_command(&self.marker_name(space)))
    }

    /// Names of all spaces stored into so far, sorted.
    pub fn spaces(&self) -> Vec<String> {
        self.spaces
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    /// Local payload log of `space` in store order.
    pub fn contents(&self, space: &str) -> Result<Vec<String>, MemoryError> {
        self.spaces
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(space)
            .cloned()
            .ok_or_else(|| MemoryError::NotFound {
                space: space.to_string(),
            })
    }

    /// Record a `before → after` transition caused by `operation`.
    ///
    /// The local log is always appended. When connected, the transition is
    /// also sent as `(EvaluationLink (PredicateNode "Operation_<op>")
    /// (ConceptNode "State_<before>") (ConceptNode "State_<after>"))`;
    /// failures there are logged and otherwise ignored.
    pub fn record_evolution(&self, before: &str, after: &str, operation: &str) -> EvolutionRecord {
        let record = self
            .evolution_log_guard()
            .append(before, after, operation)
            .clone();

        if self.connector.is_connected() {
            if let Err(e) = self.notify_evolution(before, after, operation) {
                tracing::warn!(operation, error = %e, "evolution notification failed");
            }
        } else {
            tracing::debug!(operation, "evolution recorded locally only");
        }
        record
    }

    fn notify_evolution(&self, before: &str, after: &str, operation: &str) -> BridgeResult<()> {
        let config = self.connector.config();
        let before = self
            .connector
            .create_concept_node(&format!("{}{before}", config.state_prefix))?;
        let after = self
            .connector
            .create_concept_node(&format!("{}{after}", config.state_prefix))?;
        let op = self
            .connector
            .create_predicate_node(&format!("{}{operation}", config.operation_prefix))?;
        self.connector
            .create_evaluation_link(op, vec![Atom::Node(before), Atom::Node(after)])?;
        Ok(())
    }

    /// All evolution records in call order.
    pub fn evolution_log(&self) -> Vec<EvolutionRecord> {
        self.evolution_log_guard().records().to_vec()
    }

    /// Transitions leading to `state`, newest first.
    pub fn lineage(&self, state: &str) -> Vec<EvolutionRecord> {
        self.evolution_log_guard()
            .lineage(state)
            .into_iter()
            .cloned()
            .collect()
    }

    fn all_payloads(&self) -> Vec<String> {
        self.spaces
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .flatten()
            .cloned()
            .collect()
    }

    /// Stored payloads matching `pattern`, as a lazy restartable sequence.
    ///
    /// A payload matches when it contains `pattern`, or when `pattern` is a
    /// command expression with `?variables` that matches part of the
    /// payload's command form.
    pub fn find_patterns(&self, pattern: &str) -> PatternMatches {
        PatternMatches::new(self.all_payloads(), pattern)
    }

    /// Drop exact duplicate payloads from `space`, keeping first occurrences.
    ///
    /// When something was removed and a connection is live, the survivors
    /// are re-stored. Compressing an unknown or empty space reports
    /// `{0, 0, 1.0}`.
    pub fn compress(&self, space: &str) -> CompressionReport {
        let (original_count, survivors) = {
            let mut spaces = self.spaces.write().unwrap_or_else(PoisonError::into_inner);
            let Some(items) = spaces.get_mut(space) else {
                return CompressionReport {
                    original_count: 0,
                    compressed_count: 0,
                    ratio: 1.0,
                };
            };
            let original = items.len();
            let mut seen = HashSet::new();
            items.retain(|item| seen.insert(item.clone()));
            (original, items.clone())
        };

        let compressed_count = survivors.len();
        if compressed_count < original_count && self.connector.is_connected() {
            for item in &survivors {
                if let Err(e) = self.link_into_space(space, item) {
                    tracing::warn!(space, error = %e, "re-store after compression failed");
                }
            }
        }

        let ratio = if original_count == 0 {
            1.0
        } else {
            compressed_count as f64 / original_count as f64
        };
        tracing::info!(space, original_count, compressed_count, ratio, "compressed");
        CompressionReport {
            original_count,
            compressed_count,
            ratio,
        }
    }

    /// Structural dissimilarity of two expressions; see [`distance`].
    pub fn distance(&self, a: &str, b: &str) -> f64 {
        distance(a, b)
    }

    /// Stored payloads in any space with `0 < distance(concept, x) <= threshold`.
    pub fn neighbors(&self, concept: &str, threshold: f64) -> Vec<String> {
        nearby(self.all_payloads(), concept, threshold)
    }

    /// Like [`neighbors`](Self::neighbors), restricted to one space.
    pub fn neighbors_in(&self, space: &str, concept: &str, threshold: f64) -> Vec<String> {
        let items = self
            .spaces
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(space)
            .cloned()
            .unwrap_or_default();
        nearby(items, concept, threshold)
    }

    /// Capture the space logs and the evolution log.
    pub fn snapshot(&self) -> MemorySnapshot {
        let spaces = self
            .spaces
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        MemorySnapshot::new(spaces, self.evolution_log())
    }

    pub fn save_snapshot(&self, path: &Path) -> BridgeResult<()> {
        self.snapshot().save(path)?;
        tracing::info!(path = %path.display(), "memory snapshot saved");
        Ok(())
    }

    /// Replace local state with `snapshot`. Nothing is sent to the server.
    pub fn restore(&self, snapshot: MemorySnapshot) {
        let payloads = snapshot.payload_count();
        *self.spaces.write().unwrap_or_else(PoisonError::into_inner) = snapshot.spaces;
        *self.evolution_log_guard() = EvolutionLog::from_records(snapshot.evolution);
        tracing::info!(payloads, "memory restored from snapshot");
    }

    pub fn load_snapshot(&self, path: &Path) -> BridgeResult<()> {
        self.restore(MemorySnapshot::load(path)?);
        Ok(())
    }
}

/// The existential membership query sent by `retrieve`.
fn retrieve_command(marker: &str) -> String {
    format!(
        "(cog-execute! (GetLink (InheritanceLink (VariableNode \"$x\") (ConceptNode \"{}\"))))",
        escape_name(marker)
    )
}

fn nearby(items: Vec<String>, concept: &str, threshold: f64) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .filter(|item| {
            let d = distance(concept, item);
            d > 0.0 && d <= threshold
        })
        .collect()
}

/// Structural dissimilarity of two expressions, in `[0, 2]`.
///
/// Both sides are moved to command notation, parsed and canonicalized
/// (double negation removed, idempotent conjunctions collapsed, arguments
/// of commutative links sorted). The result is the size of the multiset
/// symmetric difference of their sub-expressions divided by the larger
/// expression size. Text that does not parse is compared by tokens.
///
/// `distance(x, x) == 0`, and the measure is symmetric because both sides
/// go through the same canonicalization.
pub fn distance(a: &str, b: &str) -> f64 {
    let ta = canonical_terms(a);
    let tb = canonical_terms(b);

    let mut counts: HashMap<&str, i64> = HashMap::new();
    for t in &ta {
        *counts.entry(t.as_str()).or_default() += 1;
    }
    for t in &tb {
        *counts.entry(t.as_str()).or_default() -= 1;
    }
    let difference: i64 = counts.values().map(|c| c.abs()).sum();
    let denominator = ta.len().max(tb.len()).max(1);
    difference as f64 / denominator as f64
}

fn canonical_terms(text: &str) -> Vec<String> {
    let server = notation::to_server_notation(text);
    match SExpr::parse(&server).and_then(|expr| reason::canonicalize(&expr)) {
        Ok(canonical) => canonical.subterms().iter().map(ToString::to_string).collect(),
        Err(_) => tokens(&server),
    }
}

/// Identifier runs plus every other non-space character on its own.
fn tokens(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut word = String::new();
    for c in text.chars() {
        if c.is_alphanumeric() || c == '_' {
            word.push(c);
            continue;
        }
        if !word.is_empty() {
            out.push(std::mem::take(&mut word));
        }
        if !c.is_whitespace() {
            out.push(c.to_string());
        }
    }
    if !word.is_empty() {
        out.push(word);
    }
    out
}
