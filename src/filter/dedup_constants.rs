use super::Filter;
use crate::error::Error;
use crate::token::{logical_children, Token, TokenKind, TokenRef};

/// Folds runs of adjacent `ConstStr`/`ConstInt` siblings inside an `All`
/// (concatenation) into a single `ConstStr`. A classic grammar-fuzzer
/// cleanup pass: literals written as separate atoms in the format source
/// (`"a" "b" "c"`) don't need to stay separate tokens once the graph is
/// built.
pub struct DedupConstants;

impl Filter for DedupConstants {
    fn name(&self) -> &str {
        "dedup-constants"
    }

    fn apply(&self, tok: &TokenRef) -> Result<Vec<TokenRef>, Error> {
        let is_all = matches!(tok.lock().unwrap().kind, TokenKind::All { .. });
        if !is_all {
            return Ok(vec![]);
        }

        let children = logical_children(tok);
        let mut folded: Vec<TokenRef> = Vec::new();
        let mut acc: Option<String> = None;

        for c in &children {
            if let Some(s) = literal_string(c) {
                acc = Some(acc.unwrap_or_default() + &s);
            } else {
                if let Some(s) = acc.take() {
                    folded.push(Token::const_str(s));
                }
                folded.push(c.clone());
            }
        }
        if let Some(s) = acc.take() {
            folded.push(Token::const_str(s));
        }

        if folded.len() == children.len() {
            return Ok(vec![]);
        }
        Ok(vec![Token::all(folded)])
    }
}

fn literal_string(tok: &TokenRef) -> Option<String> {
    match &tok.lock().unwrap().kind {
        TokenKind::ConstStr(s) => Some(s.clone()),
        TokenKind::ConstInt(v) => Some(v.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merges_adjacent_literals() {
        let root = Token::all(vec![
            Token::const_str("a"),
            Token::const_str("b"),
            Token::const_int(1),
        ]);
        let out = DedupConstants.apply(&root).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].lock().unwrap().string(), "ab1");
    }

    #[test]
    fn leaves_non_adjacent_literals_split_by_structure() {
        let root = Token::all(vec![
            Token::const_str("a"),
            Token::optional(Token::const_str("x")),
            Token::const_str("b"),
        ]);
        let out = DedupConstants.apply(&root).unwrap();
        assert!(out.is_empty()); // no adjacent run to fold, so no rewrite
    }
}
