//! Core atom types: typed nodes and ordered links.
//!
//! Atoms are the units exchanged with the reasoning server. Every node and
//! link is identified by an [`AtomId`] and carries a [`TruthValue`]. Links own
//! an ordered list of other atoms; since atoms are immutable once shared
//! behind an `Arc`, a link can only reference atoms that already existed when
//! it was built, which keeps every link graph acyclic.

use std::num::NonZeroU64;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::error::AtomError;

/// Unique, niche-optimized identifier for an atom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct AtomId(NonZeroU64);

impl AtomId {
    /// Create an `AtomId` from a raw `u64`.
    ///
    /// Returns `None` if `raw` is zero.
    pub fn new(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(AtomId)
    }

    pub fn get(self) -> u64 {
        self.0.get()
    }
}

impl std::fmt::Display for AtomId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "atom:{}", self.0)
    }
}

/// Thread-safe atom ID allocator producing monotonically increasing IDs from 1.
#[derive(Debug)]
pub struct AtomIdAllocator {
    next: AtomicU64,
}

impl AtomIdAllocator {
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    /// Allocate the next atom ID.
    pub fn next_id(&self) -> Result<AtomId, AtomError> {
        let raw = self.next.fetch_add(1, Ordering::Relaxed);
        AtomId::new(raw).ok_or(AtomError::AllocatorExhausted)
    }
}

impl Default for AtomIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// The node types the bridge creates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NodeKind {
    Concept,
    Predicate,
    Number,
}

impl NodeKind {
    /// Wire type name in command notation.
    pub fn type_name(self) -> &'static str {
        match self {
            NodeKind::Concept => "ConceptNode",
            NodeKind::Predicate => "PredicateNode",
            NodeKind::Number => "NumberNode",
        }
    }

    /// Inverse of [`type_name`](Self::type_name).
    pub fn from_type_name(name: &str) -> Option<Self> {
        match name {
            "ConceptNode" => Some(NodeKind::Concept),
            "PredicateNode" => Some(NodeKind::Predicate),
            "NumberNode" => Some(NodeKind::Number),
            _ => None,
        }
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.type_name())
    }
}

/// Degree and certainty of belief, both in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TruthValue {
    pub strength: f64,
    pub confidence: f64,
}

impl TruthValue {
    /// "Certainly true": the value every atom starts with.
    pub const DEFAULT: TruthValue = TruthValue {
        strength: 1.0,
        confidence: 1.0,
    };

    /// Create a truth value, rejecting components outside [0, 1] (and NaN).
    pub fn new(strength: f64, confidence: f64) -> Result<Self, AtomError> {
        let valid = |v: f64| (0.0..=1.0).contains(&v);
        if !valid(strength) || !valid(confidence) {
            return Err(AtomError::InvalidTruthValue {
                strength,
                confidence,
            });
        }
        Ok(Self {
            strength,
            confidence,
        })
    }

    pub fn is_default(&self) -> bool {
        *self == Self::DEFAULT
    }

    /// Trailing `(stv s c)` annotation; empty for the default value.
    fn annotation(&self) -> String {
        if self.is_default() {
            String::new()
        } else {
            format!(" (stv {} {})", self.strength, self.confidence)
        }
    }
}

impl Default for TruthValue {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// A typed, named leaf atom.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: AtomId,
    pub kind: NodeKind,
    /// For numbers, the canonical decimal text of the value.
    pub name: String,
    pub truth: TruthValue,
}

impl Node {
    pub fn new(id: AtomId, kind: NodeKind, name: impl Into<String>) -> Self {
        Self {
            id,
            kind,
            name: name.into(),
            truth: TruthValue::DEFAULT,
        }
    }

    /// Render as `(Kind "name")`; numbers render their text unquoted.
    pub fn to_command(&self) -> String {
        let tv = self.truth.annotation();
        match self.kind {
            NodeKind::Number => format!("({} {}{tv})", self.kind, self.name),
            _ => format!("({} \"{}\"{tv})", self.kind, escape_name(&self.name)),
        }
    }

    /// Render in client notation: bare name, predicates as `name()`.
    pub fn to_client(&self) -> String {
        match self.kind {
            NodeKind::Predicate => format!("{}()", self.name),
            NodeKind::Concept | NodeKind::Number => self.name.clone(),
        }
    }
}

/// Canonical decimal text for a number node.
pub fn number_name(value: f64) -> Result<String, AtomError> {
    if !value.is_finite() {
        return Err(AtomError::InvalidNumber { value });
    }
    // Normalize -0.0 so both zeros share one cache key.
    let value = if value == 0.0 { 0.0 } else { value };
    Ok(format!("{value}"))
}

/// Escape a node name for a double-quoted command-notation string.
pub fn escape_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Inverse of [`escape_name`].
pub fn unescape_name(escaped: &str) -> String {
    let mut out = String::with_capacity(escaped.len());
    let mut chars = escaped.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
                continue;
            }
        }
        out.push(c);
    }
    out
}

/// An atom composed of an ordered, non-empty sequence of other atoms.
#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    pub id: AtomId,
    pub kind: String,
    outgoing: Vec<Atom>,
    pub truth: TruthValue,
}

impl Link {
    pub const INHERITANCE: &'static str = "InheritanceLink";
    pub const EVALUATION: &'static str = "EvaluationLink";

    /// Build a link; order of `outgoing` is argument order.
    pub fn new(id: AtomId, kind: impl Into<String>, outgoing: Vec<Atom>) -> Result<Self, AtomError> {
        let kind = kind.into();
        if outgoing.is_empty() {
            return Err(AtomError::EmptyOutgoing { kind });
        }
        Ok(Self {
            id,
            kind,
            outgoing,
            truth: TruthValue::DEFAULT,
        })
    }

    pub fn with_truth(mut self, truth: TruthValue) -> Self {
        self.truth = truth;
        self
    }

    pub fn outgoing(&self) -> &[Atom] {
        &self.outgoing
    }

    pub fn arity(&self) -> usize {
        self.outgoing.len()
    }

    /// Render as `(Kind <outgoing[0]> <outgoing[1]> ...)`.
    pub fn to_command(&self) -> String {
        let mut out = format!("({}", self.kind);
        for atom in &self.outgoing {
            out.push(' ');
            out.push_str(&atom.to_command());
        }
        out.push_str(&self.truth.annotation());
        out.push(')');
        out
    }

    /// Render in client notation.
    ///
    /// Binary inheritance becomes `a ⊆ b`, evaluation becomes `p(a, b, ...)`,
    /// anything else `Kind(a, b, ...)`.
    pub fn to_client(&self) -> String {
        let render = |atoms: &[Atom]| {
            atoms
                .iter()
                .map(|a| match a {
                    // Predicates appear bare in argument position.
                    Atom::Node(n) if n.kind == NodeKind::Predicate => n.name.clone(),
                    other => other.to_client(),
                })
                .collect::<Vec<_>>()
                .join(", ")
        };
        match (self.kind.as_str(), self.outgoing.as_slice()) {
            (Self::INHERITANCE, [child, parent]) => {
                format!("{} \u{2286} {}", child.to_client(), parent.to_client())
            }
            (Self::EVALUATION, [Atom::Node(pred), args @ ..]) if !args.is_empty() => {
                format!("{}({})", pred.name, render(args))
            }
            _ => format!("{}({})", self.kind, render(&self.outgoing)),
        }
    }
}

/// A node or a link.
#[derive(Debug, Clone, PartialEq)]
pub enum Atom {
    Node(Arc<Node>),
    Link(Arc<Link>),
}

impl Atom {
    pub fn id(&self) -> AtomId {
        match self {
            Atom::Node(n) => n.id,
            Atom::Link(l) => l.id,
        }
    }

    /// Wire type name (`ConceptNode`, `InheritanceLink`, ...).
    pub fn type_name(&self) -> &str {
        match self {
            Atom::Node(n) => n.kind.type_name(),
            Atom::Link(l) => &l.kind,
        }
    }

    pub fn truth(&self) -> TruthValue {
        match self {
            Atom::Node(n) => n.truth,
            Atom::Link(l) => l.truth,
        }
    }

    pub fn to_command(&self) -> String {
        match self {
            Atom::Node(n) => n.to_command(),
            Atom::Link(l) => l.to_command(),
        }
    }

    pub fn to_client(&self) -> String {
        match self {
            Atom::Node(n) => n.to_client(),
            Atom::Link(l) => l.to_client(),
        }
    }
}

impl From<Arc<Node>> for Atom {
    fn from(node: Arc<Node>) -> Self {
        Atom::Node(node)
    }
}

impl From<Arc<Link>> for Atom {
    fn from(link: Arc<Link>) -> Self {
        Atom::Link(link)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: u64) -> AtomId {
        AtomId::new(raw).unwrap()
    }

    fn concept(raw: u64, name: &str) -> Arc<Node> {
        Arc::new(Node::new(id(raw), NodeKind::Concept, name))
    }

    #[test]
    fn atom_id_niche_optimization() {
        assert_eq!(
            std::mem::size_of::<Option<AtomId>>(),
            std::mem::size_of::<AtomId>()
        );
        assert!(AtomId::new(0).is_none());
    }

    #[test]
    fn allocator_produces_sequential_ids() {
        let alloc = AtomIdAllocator::new();
        assert_eq!(alloc.next_id().unwrap().get(), 1);
        assert_eq!(alloc.next_id().unwrap().get(), 2);
    }

    #[test]
    fn node_renders_quoted_name() {
        assert_eq!(concept(1, "Foo").to_command(), "(ConceptNode \"Foo\")");
        let pred = Node::new(id(2), NodeKind::Predicate, "likes");
        assert_eq!(pred.to_command(), "(PredicateNode \"likes\")");
    }

    #[test]
    fn number_node_renders_unquoted() {
        let name = number_name(3.0).unwrap();
        assert_eq!(name, "3");
        let n = Node::new(id(1), NodeKind::Number, name);
        assert_eq!(n.to_command(), "(NumberNode 3)");
        assert_eq!(number_name(0.25).unwrap(), "0.25");
        assert_eq!(number_name(-0.0).unwrap(), "0");
        assert!(number_name(f64::NAN).is_err());
    }

    #[test]
    fn quotes_in_names_are_escaped() {
        let n = concept(1, "say \"hi\"");
        assert_eq!(n.to_command(), r#"(ConceptNode "say \"hi\"")"#);
        assert_eq!(unescape_name(&escape_name("a\\b\"c")), "a\\b\"c");
    }

    #[test]
    fn link_renders_recursively_in_order() {
        let a = concept(1, "A");
        let b = concept(2, "B");
        let inner = Link::new(id(3), Link::INHERITANCE, vec![a.clone().into(), b.clone().into()])
            .unwrap();
        assert_eq!(
            inner.to_command(),
            "(InheritanceLink (ConceptNode \"A\") (ConceptNode \"B\"))"
        );
        let outer = Link::new(id(4), "ListLink", vec![Arc::new(inner).into(), a.into()]).unwrap();
        assert_eq!(
            outer.to_command(),
            "(ListLink (InheritanceLink (ConceptNode \"A\") (ConceptNode \"B\")) (ConceptNode \"A\"))"
        );
    }

    #[test]
    fn empty_link_is_rejected() {
        let err = Link::new(id(1), Link::EVALUATION, Vec::new()).unwrap_err();
        assert!(matches!(err, AtomError::EmptyOutgoing { .. }));
    }

    #[test]
    fn truth_value_validation_and_annotation() {
        assert!(TruthValue::new(1.2, 0.5).is_err());
        assert!(TruthValue::new(f64::NAN, 0.5).is_err());
        let tv = TruthValue::new(0.8, 0.9).unwrap();
        let link = Link::new(id(2), Link::INHERITANCE, vec![concept(1, "A").into()])
            .unwrap()
            .with_truth(tv);
        assert_eq!(
            link.to_command(),
            "(InheritanceLink (ConceptNode \"A\") (stv 0.8 0.9))"
        );
        assert!(TruthValue::default().is_default());
    }

    #[test]
    fn client_rendering() {
        let cat = concept(1, "cat");
        let animal = concept(2, "animal");
        let inh = Link::new(id(3), Link::INHERITANCE, vec![cat.clone().into(), animal.into()])
            .unwrap();
        assert_eq!(inh.to_client(), "cat \u{2286} animal");

        let chases = Arc::new(Node::new(id(4), NodeKind::Predicate, "chases"));
        assert_eq!(chases.to_client(), "chases()");
        let mouse = concept(5, "mouse");
        let eval = Link::new(
            id(6),
            Link::EVALUATION,
            vec![chases.into(), cat.clone().into(), mouse.into()],
        )
        .unwrap();
        assert_eq!(eval.to_client(), "chases(cat, mouse)");

        let list = Link::new(id(7), "ListLink", vec![cat.into()]).unwrap();
        assert_eq!(list.to_client(), "ListLink(cat)");
    }
}
