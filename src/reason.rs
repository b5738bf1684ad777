//! Canonicalization of command expressions via e-graphs (egg).
//!
//! Expressions are loaded into an e-graph over `SymbolLang`, saturated with a
//! small set of logical identities, and the smallest equivalent term is
//! extracted. Children of commutative link types are then sorted so that
//! argument order no longer distinguishes equal expressions.

use egg::{AstSize, Extractor, Id, RecExpr, Rewrite, Runner, SymbolLang};

use crate::atom::unescape_name;
use crate::error::NotationError;
use crate::sexpr::{MAX_DEPTH, SExpr};

/// Link types whose argument order carries no meaning.
pub const COMMUTATIVE: &[&str] = &["AndLink", "OrLink", "SimilarityLink", "SetLink"];

/// Operator used for lists without a symbol head.
const ANON_LIST: &str = "#list";

/// Built-in rewrite rules for command expressions.
pub fn builtin_rules() -> Vec<Rewrite<SymbolLang, ()>> {
    vec![
        egg::rewrite!("not-not"; "(NotLink (NotLink ?a))" => "?a"),
        egg::rewrite!("and-idem"; "(AndLink ?a ?a)" => "?a"),
        egg::rewrite!("or-idem"; "(OrLink ?a ?a)" => "?a"),
        egg::rewrite!("and-commute"; "(AndLink ?a ?b)" => "(AndLink ?b ?a)"),
        egg::rewrite!("or-commute"; "(OrLink ?a ?b)" => "(OrLink ?b ?a)"),
        egg::rewrite!("similar-commute"; "(SimilarityLink ?a ?b)" => "(SimilarityLink ?b ?a)"),
    ]
}

/// Simplify `expr` and put it in canonical argument order.
///
/// Expressions nested deeper than [`MAX_DEPTH`] are rejected rather than
/// walked.
pub fn canonicalize(expr: &SExpr) -> Result<SExpr, NotationError> {
    let depth = expr.depth();
    if depth > MAX_DEPTH {
        return Err(NotationError::Parse {
            message: format!("expression nested {depth} deep exceeds {MAX_DEPTH}"),
        });
    }
    let rec = to_rec_expr(expr);
    let runner = Runner::default()
        .with_expr(&rec)
        .with_iter_limit(10)
        .with_node_limit(5_000)
        .run(&builtin_rules());
    let extractor = Extractor::new(&runner.egraph, AstSize);
    let (_cost, best) = extractor.find_best(runner.roots[0]);
    let mut out = from_rec_expr(&best);
    sort_commutative(&mut out);
    Ok(out)
}

fn to_rec_expr(expr: &SExpr) -> RecExpr<SymbolLang> {
    let mut rec = RecExpr::default();
    add_expr(&mut rec, expr);
    rec
}

fn add_expr(rec: &mut RecExpr<SymbolLang>, expr: &SExpr) -> Id {
    match expr {
        SExpr::Symbol(s) => rec.add(SymbolLang::leaf(s.as_str())),
        // Keep the quotes so strings never unify with bare symbols.
        SExpr::Str(_) => rec.add(SymbolLang::leaf(expr.to_string().as_str())),
        SExpr::List(items) => {
            // `(ping)` stays a list: a bare operator node would read back as `ping`.
            let (op, args) = match items.split_first() {
                Some((SExpr::Symbol(head), rest)) if !rest.is_empty() => (head.as_str(), rest),
                _ => (ANON_LIST, items.as_slice()),
            };
            let children = args.iter().map(|a| add_expr(rec, a)).collect();
            rec.add(SymbolLang::new(op, children))
        }
    }
}

fn from_rec_expr(rec: &RecExpr<SymbolLang>) -> SExpr {
    let nodes = rec.as_ref();
    build(nodes, nodes.len() - 1)
}

fn build(nodes: &[SymbolLang], index: usize) -> SExpr {
    let node = &nodes[index];
    let op = node.op.as_str();
    let children: Vec<SExpr> = node
        .children
        .iter()
        .map(|&id| build(nodes, usize::from(id)))
        .collect();

    if op == ANON_LIST {
        return SExpr::List(children);
    }
    if children.is_empty() {
        return leaf(op);
    }
    let mut items = Vec::with_capacity(children.len() + 1);
    items.push(SExpr::Symbol(op.to_string()));
    items.extend(children);
    SExpr::List(items)
}

fn leaf(op: &str) -> SExpr {
    match op.strip_prefix('"').and_then(|s| s.strip_suffix('"')) {
        Some(inner) if op.len() >= 2 => SExpr::Str(unescape_name(inner)),
        _ => SExpr::Symbol(op.to_string()),
    }
}

fn sort_commutative(expr: &mut SExpr) {
    if let SExpr::List(items) = expr {
        for item in items.iter_mut() {
            sort_commutative(item);
        }
        let commutative = matches!(
            items.first(),
            Some(SExpr::Symbol(h)) if COMMUTATIVE.contains(&h.as_str())
        );
        if commutative {
            items[1..].sort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canon(text: &str) -> String {
        canonicalize(&SExpr::parse(text).unwrap()).unwrap().to_string()
    }

    #[test]
    fn double_negation_simplifies() {
        assert_eq!(
            canon("(NotLink (NotLink (ConceptNode \"x\")))"),
            "(ConceptNode \"x\")"
        );
    }

    #[test]
    fn commutative_arguments_are_ordered() {
        let a = canon("(AndLink (ConceptNode \"b\") (ConceptNode \"a\"))");
        let b = canon("(AndLink (ConceptNode \"a\") (ConceptNode \"b\"))");
        assert_eq!(a, b);
    }

    #[test]
    fn ordered_links_keep_argument_order() {
        assert_eq!(
            canon("(InheritanceLink (ConceptNode \"b\") (ConceptNode \"a\"))"),
            "(InheritanceLink (ConceptNode \"b\") (ConceptNode \"a\"))"
        );
    }

    #[test]
    fn idempotent_conjunction_collapses() {
        assert_eq!(
            canon("(AndLink (ConceptNode \"a\") (ConceptNode \"a\"))"),
            "(ConceptNode \"a\")"
        );
    }

    #[test]
    fn strings_and_symbols_stay_distinct() {
        assert_eq!(canon("(f \"x\" x)"), "(f \"x\" x)");
        assert_eq!(canon("(() a)"), "(() a)");
        assert_eq!(canon("(ping)"), "(ping)");
    }

    #[test]
    fn overly_deep_expressions_are_rejected() {
        let mut expr = SExpr::Symbol("x".into());
        for _ in 0..=MAX_DEPTH {
            expr = SExpr::List(vec![SExpr::Symbol("f".into()), expr]);
        }
        assert!(matches!(canonicalize(&expr), Err(NotationError::Parse { .. })));
    }

    #[test]
    fn builtin_rules_load() {
        assert!(!builtin_rules().is_empty());
    }
}
