//! Bidirectional translation between client and server notation.
//!
//! The client writes compact operator glyphs (`∇`, `⊗`, ...); the reasoning
//! server expects long-form identifiers wrapped in command notation. Both
//! directions are plain substring substitution over a fixed table plus one
//! structural rule: text without any parenthesised structure travels as a
//! single `ConceptNode`.
//!
//! Round trips are exact for text made of plain identifiers. Text that
//! already contains a long-form identifier (say, a variable named
//! `TensorProductCache`) comes back with a glyph in its place; use
//! [`check_collisions`] to detect that case up front.

use std::sync::OnceLock;

use crate::atom::{escape_name, unescape_name};
use crate::error::NotationError;

/// A single operator table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Operator {
    /// Glyph used in client notation.
    pub glyph: &'static str,
    /// Identifier used in server notation.
    pub identifier: &'static str,
    pub description: &'static str,
}

const fn op(glyph: &'static str, identifier: &'static str, description: &'static str) -> Operator {
    Operator {
        glyph,
        identifier,
        description,
    }
}

static OPERATORS: [Operator; 12] = [
    op("\u{2207}", "GradientOperator", "Gradient"),
    op("\u{2202}", "PartialDerivative", "Partial derivative"),
    op("\u{2297}", "TensorProduct", "Tensor product"),
    op("\u{03A6}", "PhiFunction", "Phi function"),
    op("\u{03A9}", "OmegaSpace", "Omega space"),
    op("\u{2211}", "SummationOperator", "Summation"),
    op("\u{03A8}", "PsiFunction", "Psi function"),
    op("\u{0398}", "ThetaFunction", "Theta function"),
    op("\u{03B4}", "DeltaOperator", "Variation"),
    op("\u{25E6}", "Composition", "Composition"),
    op("\u{2192}", "Implication", "Implication"),
    op("\u{2286}", "Subset", "Subset / inheritance"),
];

/// All operator table entries in forward-substitution order.
pub fn operators() -> &'static [Operator] {
    &OPERATORS
}

/// Entries ordered longest identifier first, for the inverse direction.
fn inverse_order() -> &'static [Operator] {
    static INVERSE: OnceLock<Vec<Operator>> = OnceLock::new();
    INVERSE.get_or_init(|| {
        let mut ops = OPERATORS.to_vec();
        ops.sort_by(|a, b| {
            b.identifier
                .len()
                .cmp(&a.identifier.len())
                .then_with(|| a.identifier.cmp(b.identifier))
        });
        ops
    })
}

/// Look up an operator by glyph or identifier.
pub fn lookup(token: &str) -> Option<&'static Operator> {
    OPERATORS
        .iter()
        .find(|o| o.glyph == token || o.identifier == token)
}

const CONCEPT_PREFIX: &str = "(ConceptNode \"";
const CONCEPT_SUFFIX: &str = "\")";

/// Translate client notation into server command notation.
pub fn to_server_notation(text: &str) -> String {
    let mut result = text.to_string();
    for o in operators() {
        if result.contains(o.glyph) {
            result = result.replace(o.glyph, o.identifier);
        }
    }
    if !has_structure(&result) {
        result = format!("{CONCEPT_PREFIX}{}{CONCEPT_SUFFIX}", escape_name(&result));
    }
    result
}

/// Translate server command notation back into client notation.
pub fn to_client_notation(text: &str) -> String {
    if let Some(payload) = concept_payload(text) {
        return substitute_inverse(&unescape_name(payload));
    }
    substitute_inverse(text)
}

fn substitute_inverse(text: &str) -> String {
    let mut result = text.to_string();
    for o in inverse_order() {
        if result.contains(o.identifier) {
            result = result.replace(o.identifier, o.glyph);
        }
    }
    result
}

fn has_structure(text: &str) -> bool {
    text.contains('(')
}

/// Payload of an expression that is exactly one `(ConceptNode "...")`.
///
/// Returns `None` when anything follows the closing quote, or when an
/// unescaped quote inside the payload shows that more than one string is
/// present.
fn concept_payload(text: &str) -> Option<&str> {
    let inner = text
        .strip_prefix(CONCEPT_PREFIX)?
        .strip_suffix(CONCEPT_SUFFIX)?;
    let mut escaped = false;
    for c in inner.chars() {
        match c {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            '"' => return None,
            _ => {}
        }
    }
    // A trailing lone backslash would have escaped the closing quote.
    if escaped {
        return None;
    }
    Some(inner)
}

/// Report every long-form identifier already present in client text.
///
/// These are the inputs for which `to_client_notation(to_server_notation(x))`
/// differs from `x`. The translator itself never fails on them.
pub fn check_collisions(text: &str) -> Vec<NotationError> {
    inverse_order()
        .iter()
        .filter(|o| text.contains(o.identifier))
        .map(|o| NotationError::Ambiguous {
            token: o.identifier.to_string(),
            context: text.to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_is_unambiguous() {
        for (i, a) in OPERATORS.iter().enumerate() {
            for b in &OPERATORS[i + 1..] {
                assert!(!a.glyph.contains(b.glyph) && !b.glyph.contains(a.glyph));
                assert_ne!(a.identifier, b.identifier);
            }
        }
        assert_eq!(inverse_order().len(), OPERATORS.len());
        assert_eq!(inverse_order()[0].identifier, "PartialDerivative");
    }

    #[test]
    fn plain_identifier_wraps_as_concept() {
        assert_eq!(to_server_notation("foo"), "(ConceptNode \"foo\")");
        assert_eq!(to_client_notation("(ConceptNode \"foo\")"), "foo");
    }

    #[test]
    fn glyphs_become_identifiers() {
        assert_eq!(
            to_server_notation("\u{2207}(user_goals)"),
            "GradientOperator(user_goals)"
        );
        assert_eq!(
            to_server_notation("\u{2202}\u{03A9}"),
            "(ConceptNode \"PartialDerivativeOmegaSpace\")"
        );
        assert_eq!(
            to_client_notation("(ConceptNode \"PartialDerivativeOmegaSpace\")"),
            "\u{2202}\u{03A9}"
        );
    }

    #[test]
    fn structured_text_is_not_unwrapped() {
        let cmd = "(InheritanceLink (ConceptNode \"a\") (ConceptNode \"b\"))";
        assert_eq!(to_client_notation(cmd), cmd);
        let two = "(ConceptNode \"a\") (ConceptNode \"b\")";
        assert_eq!(to_client_notation(two), two);
    }

    #[test]
    fn round_trip_plain_text() {
        for x in ["foo", "user goals", "x_1", "", "say \"hi\"", "back\\slash", "\u{2207}\u{2297}\u{03A6}"] {
            assert_eq!(to_client_notation(&to_server_notation(x)), x, "input {x:?}");
        }
    }

    #[test]
    fn structured_round_trip() {
        let x = "\u{2207}(user_interaction) \u{2192} \u{03A8}(response_generation)";
        let server = to_server_notation(x);
        assert_eq!(
            server,
            "GradientOperator(user_interaction) Implication PsiFunction(response_generation)"
        );
        assert_eq!(to_client_notation(&server), x);
    }

    #[test]
    fn collisions_are_reported_not_masked() {
        let x = "TensorProductCache";
        assert_ne!(to_client_notation(&to_server_notation(x)), x);
        let collisions = check_collisions(x);
        assert_eq!(collisions.len(), 1);
        assert!(matches!(
            &collisions[0],
            NotationError::Ambiguous { token, .. } if token == "TensorProduct"
        ));
        assert!(check_collisions("plain").is_empty());
    }

    #[test]
    fn lookup_by_either_side() {
        assert_eq!(lookup("\u{2211}").unwrap().identifier, "SummationOperator");
        assert_eq!(lookup("OmegaSpace").unwrap().glyph, "\u{03A9}");
        assert!(lookup("nope").is_none());
    }
}
