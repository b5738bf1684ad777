//! Minimal S-expression reader for command-notation text.
//!
//! This is only enough structure to compare and search command expressions:
//! symbols, double-quoted strings with `\` escapes, and parenthesised lists.
//! It is not a parser for client notation.

use std::collections::HashMap;
use std::fmt;

use crate::atom::escape_name;
use crate::error::NotationError;

/// Deepest list nesting the reader accepts.
///
/// Everything that walks an `SExpr` recursively (display, matching,
/// canonicalization) relies on this bound to stay within the stack.
pub const MAX_DEPTH: usize = 256;

/// A parsed command-notation expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SExpr {
    /// A bare token: type names, numbers, `?variables`.
    Symbol(String),
    /// A double-quoted string, unescaped.
    Str(String),
    List(Vec<SExpr>),
}

impl SExpr {
    /// Parse exactly one expression; trailing input is an error.
    pub fn parse(text: &str) -> Result<SExpr, NotationError> {
        let mut reader = Reader::new(text);
        let expr = reader.expr()?;
        reader.skip_ws();
        if let Some(c) = reader.peek() {
            return Err(parse_error(format!(
                "unexpected '{c}' after expression at byte {}",
                reader.pos
            )));
        }
        Ok(expr)
    }

    /// Parse a sequence of whitespace-separated expressions.
    pub fn parse_many(text: &str) -> Result<Vec<SExpr>, NotationError> {
        let mut reader = Reader::new(text);
        let mut out = Vec::new();
        loop {
            reader.skip_ws();
            if reader.peek().is_none() {
                return Ok(out);
            }
            out.push(reader.expr()?);
        }
    }

    /// Operator (first element) of a list whose head is a symbol.
    pub fn head(&self) -> Option<&str> {
        match self {
            SExpr::List(items) => match items.first() {
                Some(SExpr::Symbol(s)) => Some(s),
                _ => None,
            },
            _ => None,
        }
    }

    /// Number of nodes in the tree (leaves and lists).
    pub fn size(&self) -> usize {
        match self {
            SExpr::List(items) => 1 + items.iter().map(SExpr::size).sum::<usize>(),
            _ => 1,
        }
    }

    /// Nesting depth: 0 for a leaf, 1 for a flat list.
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut stack = vec![(self, 0usize)];
        while let Some((e, d)) = stack.pop() {
            if let SExpr::List(items) = e {
                deepest = deepest.max(d + 1);
                stack.extend(items.iter().map(|i| (i, d + 1)));
            }
        }
        deepest
    }

    /// Every sub-expression in pre-order, including `self`.
    pub fn subterms(&self) -> Vec<&SExpr> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(e) = stack.pop() {
            out.push(e);
            if let SExpr::List(items) = e {
                stack.extend(items.iter().rev());
            }
        }
        out
    }

    pub fn is_variable(&self) -> bool {
        matches!(self, SExpr::Symbol(s) if s.starts_with('?') && s.len() > 1)
    }

    pub fn has_variables(&self) -> bool {
        self.subterms().into_iter().any(SExpr::is_variable)
    }

    /// Match `self` as a pattern against `target`.
    ///
    /// `?name` symbols match any sub-expression; repeated names must bind to
    /// equal sub-expressions.
    pub fn matches(&self, target: &SExpr) -> bool {
        let mut bindings = HashMap::new();
        match_into(self, target, &mut bindings)
    }

    /// Whether the pattern matches `target` or any of its sub-expressions.
    pub fn matches_anywhere(&self, target: &SExpr) -> bool {
        target.subterms().into_iter().any(|t| self.matches(t))
    }
}

fn match_into<'a>(
    pattern: &'a SExpr,
    target: &'a SExpr,
    bindings: &mut HashMap<&'a str, &'a SExpr>,
) -> bool {
    match pattern {
        SExpr::Symbol(name) if pattern.is_variable() => match bindings.get(name.as_str()) {
            Some(bound) => *bound == target,
            None => {
                bindings.insert(name.as_str(), target);
                true
            }
        },
        SExpr::List(ps) => match target {
            SExpr::List(ts) if ps.len() == ts.len() => {
                ps.iter().zip(ts).all(|(p, t)| match_into(p, t, bindings))
            }
            _ => false,
        },
        _ => pattern == target,
    }
}

impl fmt::Display for SExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SExpr::Symbol(s) => f.write_str(s),
            SExpr::Str(s) => write!(f, "\"{}\"", escape_name(s)),
            SExpr::List(items) => {
                f.write_str("(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str(")")
            }
        }
    }
}

fn parse_error(message: String) -> NotationError {
    NotationError::Parse { message }
}

struct Reader<'a> {
    src: &'a str,
    pos: usize,
    depth: usize,
}

impl<'a> Reader<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0, depth: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn expr(&mut self) -> Result<SExpr, NotationError> {
        self.skip_ws();
        match self.peek() {
            None => Err(parse_error("unexpected end of input".into())),
            Some('(') => {
                if self.depth >= MAX_DEPTH {
                    return Err(parse_error(format!(
                        "nesting deeper than {MAX_DEPTH} at byte {}",
                        self.pos
                    )));
                }
                self.bump();
                self.depth += 1;
                let mut items = Vec::new();
                loop {
                    self.skip_ws();
                    match self.peek() {
                        Some(')') => {
                            self.bump();
                            self.depth -= 1;
                            return Ok(SExpr::List(items));
                        }
                        None => return Err(parse_error("unclosed '('".into())),
                        Some(_) => items.push(self.expr()?),
                    }
                }
            }
            Some(')') => Err(parse_error(format!("unexpected ')' at byte {}", self.pos))),
            Some('"') => {
                self.bump();
                let mut s = String::new();
                loop {
                    match self.bump() {
                        Some('"') => return Ok(SExpr::Str(s)),
                        Some('\\') => match self.bump() {
                            Some(c) => s.push(c),
                            None => return Err(parse_error("dangling escape".into())),
                        },
                        Some(c) => s.push(c),
                        None => return Err(parse_error("unterminated string".into())),
                    }
                }
            }
            Some(_) => {
                let start = self.pos;
                while self
                    .peek()
                    .is_some_and(|c| !c.is_whitespace() && c != '(' && c != ')' && c != '"')
                {
                    self.bump();
                }
                Ok(SExpr::Symbol(self.src[start..self.pos].to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_display_round_trip() {
        let text = "(InheritanceLink (ConceptNode \"A b\") (NumberNode 3))";
        let expr = SExpr::parse(text).unwrap();
        assert_eq!(expr.to_string(), text);
        assert_eq!(expr.head(), Some("InheritanceLink"));
        assert_eq!(expr.size(), 8);
    }

    #[test]
    fn escaped_quotes_inside_strings() {
        let expr = SExpr::parse(r#"(ConceptNode "say \"hi\"")"#).unwrap();
        match &expr {
            SExpr::List(items) => assert_eq!(items[1], SExpr::Str("say \"hi\"".into())),
            other => panic!("expected list, got {other:?}"),
        }
    }

    #[test]
    fn malformed_input_is_rejected() {
        assert!(SExpr::parse("(a (b)").is_err());
        assert!(SExpr::parse("a)").is_err());
        assert!(SExpr::parse("\"open").is_err());
        assert!(SExpr::parse("").is_err());
        assert!(SExpr::parse("(a) (b)").is_err());
        assert_eq!(SExpr::parse_many("(a) (b)").unwrap().len(), 2);
    }

    fn nested(depth: usize) -> String {
        format!("{}x{}", "(f ".repeat(depth), ")".repeat(depth))
    }

    #[test]
    fn nesting_is_bounded() {
        let at_limit = SExpr::parse(&nested(MAX_DEPTH)).unwrap();
        assert_eq!(at_limit.depth(), MAX_DEPTH);
        assert!(matches!(
            SExpr::parse(&nested(MAX_DEPTH + 1)),
            Err(NotationError::Parse { .. })
        ));
        assert!(SExpr::parse(&nested(100_000)).is_err());
    }

    #[test]
    fn subterms_in_preorder() {
        let expr = SExpr::parse("(f (g x) y)").unwrap();
        let subs: Vec<String> = expr.subterms().iter().map(|e| e.to_string()).collect();
        assert_eq!(subs, vec!["(f (g x) y)", "f", "(g x)", "g", "x", "y"]);
    }

    #[test]
    fn variable_pattern_matching() {
        let target = SExpr::parse(
            "(InheritanceLink (ConceptNode \"cat\") (ConceptNode \"Space_user\"))",
        )
        .unwrap();
        let pattern = SExpr::parse("(InheritanceLink ?x (ConceptNode \"Space_user\"))").unwrap();
        assert!(pattern.has_variables());
        assert!(pattern.matches(&target));

        let same = SExpr::parse("(InheritanceLink ?x ?x)").unwrap();
        assert!(!same.matches(&target));

        let inner = SExpr::parse("(ConceptNode ?name)").unwrap();
        assert!(!inner.matches(&target));
        assert!(inner.matches_anywhere(&target));
    }
}
