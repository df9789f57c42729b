use super::Filter;
use crate::error::Error;
use crate::token::{Token, TokenKind, TokenRef};

/// Removes `SequenceResetItem` nodes from the graph, replacing each with an
/// empty literal. For drivers that want a sequence counter to free-run
/// across an entire session instead of being rewound at the marker's point
/// in the grammar (spec.md §4.1's "before this point, rewind the counter").
pub struct DropResets;

impl Filter for DropResets {
    fn name(&self) -> &str {
        "drop-resets"
    }

    fn apply(&self, tok: &TokenRef) -> Result<Vec<TokenRef>, Error> {
        if matches!(tok.lock().unwrap().kind, TokenKind::SequenceResetItem { .. }) {
            Ok(vec![Token::const_str("")])
        } else {
            Ok(vec![])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_reset_marker_with_empty_literal() {
        let seq = Token::new_sequence_handle(0, 1);
        let reset = Token::sequence_reset_item(seq);
        let out = DropResets.apply(&reset).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].lock().unwrap().string(), "");
    }

    #[test]
    fn leaves_other_kinds_untouched() {
        let out = DropResets.apply(&Token::const_str("a")).unwrap();
        assert!(out.is_empty());
    }
}
