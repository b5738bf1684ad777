//! Local pattern search over stored payloads.

use std::sync::Arc;

use crate::notation;
use crate::sexpr::SExpr;

/// Lazy iterator over stored payloads that match a pattern.
///
/// It walks a snapshot taken when the search started, so stores made while
/// iterating are not observed. Cloning yields an independent cursor, which
/// is how a search is restarted.
#[derive(Debug, Clone)]
pub struct PatternMatches {
    items: Arc<[String]>,
    pattern: String,
    structural: Option<SExpr>,
    pos: usize,
}

impl PatternMatches {
    pub(crate) fn new(items: Vec<String>, pattern: &str) -> Self {
        // Only patterns with `?variables` take the structural path; a
        // variable-free pattern is already covered by the substring test.
        let structural = SExpr::parse(pattern).ok().filter(SExpr::has_variables);
        Self {
            items: items.into(),
            pattern: pattern.to_string(),
            structural,
            pos: 0,
        }
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Move the cursor back to the first payload.
    pub fn rewind(&mut self) {
        self.pos = 0;
    }

    fn is_match(&self, item: &str) -> bool {
        if item.contains(self.pattern.as_str()) {
            return true;
        }
        let Some(pattern) = &self.structural else {
            return false;
        };
        SExpr::parse(&notation::to_server_notation(item))
            .map(|expr| pattern.matches_anywhere(&expr))
            .unwrap_or(false)
    }
}

impl Iterator for PatternMatches {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        while self.pos < self.items.len() {
            let idx = self.pos;
            self.pos += 1;
            if self.is_match(&self.items[idx]) {
                return Some(self.items[idx].clone());
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.items.len() - self.pos))
    }
}
