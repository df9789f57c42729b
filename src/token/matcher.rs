//! Matches raw input text against an already-parsed token graph, mutating
//! each matched node's state (and, for `Repeat`, its clone list) to reflect
//! what was found — this is how `reduce`/`validate` recover a starting
//! permutation from a captured file instead of generating one (spec.md §4.6
//! / §6).
//!
//! Only a subset of kinds support this: anything whose state can't be
//! recovered from rendered text alone (`RandomInt`, the three sequence
//! proxies, `Count`, `Unique`) is unmatchable by construction. A mismatch
//! between a supported kind and the actual text is reported the same way —
//! both collapse to `TokenError::NotMatchable`, since neither case gives the
//! caller anything actionable beyond "this token didn't match here".
//!
//! `One` tries each branch against the same input in order and keeps the
//! first that matches; a failed branch may leave incidental state mutated
//! on its own (unchosen) descendants, which is harmless since rendering
//! only ever reads the `chosen` branch.

use super::{deep_clone, TokenKind, TokenRef};
use crate::error::TokenError;

/// Matches the prefix of `input` against `tok`. On success, returns the
/// number of bytes consumed; the caller compares this against `input.len()`
/// to decide whether the match was exact (spec.md §6's `validate`).
pub fn match_input(tok: &TokenRef, input: &str) -> Result<usize, TokenError> {
    match_node(tok, input)
}

enum Action {
    ConstStr(String),
    ConstInt(i64),
    RangeInt { from: i64, to: i64 },
    All(Vec<TokenRef>),
    One(Vec<TokenRef>),
    Repeat(TokenRef, usize, usize),
    Optional(TokenRef),
    Unsupported,
}

fn match_node(tok: &TokenRef, input: &str) -> Result<usize, TokenError> {
    let action = {
        let t = tok.lock().unwrap();
        match &t.kind {
            TokenKind::ConstStr(s) => Action::ConstStr(s.clone()),
            TokenKind::ConstInt(v) => Action::ConstInt(*v),
            TokenKind::RangeInt { from, to, .. } => Action::RangeInt {
                from: *from,
                to: *to,
            },
            TokenKind::All { children } => Action::All(children.clone()),
            TokenKind::One { children, .. } => Action::One(children.clone()),
            TokenKind::Repeat {
                template, from, to, ..
            } => Action::Repeat(template.clone(), *from, *to),
            TokenKind::Optional { child, .. } => Action::Optional(child.clone()),
            _ => Action::Unsupported,
        }
    };

    match action {
        Action::ConstStr(s) => {
            if input.starts_with(s.as_str()) {
                Ok(s.len())
            } else {
                Err(TokenError::NotMatchable)
            }
        }
        Action::ConstInt(v) => {
            let s = v.to_string();
            if input.starts_with(s.as_str()) {
                Ok(s.len())
            } else {
                Err(TokenError::NotMatchable)
            }
        }
        Action::RangeInt { from, to } => {
            let consumed = leading_int(input).ok_or(TokenError::NotMatchable)?;
            let value: i64 = input[..consumed]
                .parse()
                .map_err(|_| TokenError::NotMatchable)?;
            if value < from || value > to {
                return Err(TokenError::NotMatchable);
            }
            tok.lock().unwrap().set_permutation((value - from) as u64)?;
            Ok(consumed)
        }
        Action::All(children) => {
            let mut offset = 0;
            for c in &children {
                offset += match_node(c, &input[offset..])?;
            }
            Ok(offset)
        }
        Action::One(children) => {
            for (k, c) in children.iter().enumerate() {
                if let Ok(n) = match_node(c, input) {
                    if let TokenKind::One { chosen, .. } = &mut tok.lock().unwrap().kind {
                        *chosen = k;
                    }
                    return Ok(n);
                }
            }
            Err(TokenError::NotMatchable)
        }
        Action::Optional(child) => match match_node(&child, input) {
            Ok(n) => {
                if let TokenKind::Optional { active, .. } = &mut tok.lock().unwrap().kind {
                    *active = true;
                }
                Ok(n)
            }
            Err(_) => {
                if let TokenKind::Optional { active, .. } = &mut tok.lock().unwrap().kind {
                    *active = false;
                }
                Ok(0)
            }
        },
        Action::Repeat(template, from, to) => {
            let mut offset = 0;
            let mut children = Vec::new();
            while children.len() < to {
                let clone = deep_clone(&template);
                match match_node(&clone, &input[offset..]) {
                    Ok(n) => {
                        offset += n;
                        children.push(clone);
                        if n == 0 && children.len() >= from {
                            break;
                        }
                    }
                    Err(_) => break,
                }
            }
            if children.len() < from {
                return Err(TokenError::NotMatchable);
            }
            if let TokenKind::Repeat { children: dst, .. } = &mut tok.lock().unwrap().kind {
                *dst = children;
            }
            Ok(offset)
        }
        Action::Unsupported => Err(TokenError::NotMatchable),
    }
}

fn leading_int(input: &str) -> Option<usize> {
    let bytes = input.as_bytes();
    let mut i = 0;
    if i < bytes.len() && (bytes[i] == b'-' || bytes[i] == b'+') {
        i += 1;
    }
    let start_digits = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    if i == start_digits {
        None
    } else {
        Some(i)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::Token;

    #[test]
    fn matches_a_literal_concatenation() {
        let root = Token::all(vec![Token::const_str("GET "), Token::range_int(200, 299)]);
        let n = match_input(&root, "GET 204 OK").unwrap();
        assert_eq!(n, 7);
        assert_eq!(root.lock().unwrap().string(), "GET 204");
    }

    #[test]
    fn picks_the_matching_branch_of_an_alternation() {
        let root = Token::one(vec![Token::const_str("yes"), Token::const_str("no")]);
        match_input(&root, "no").unwrap();
        assert_eq!(root.lock().unwrap().string(), "no");
    }

    #[test]
    fn matches_repeat_instance_count_from_input() {
        let root = Token::repeat(Token::const_str("a"), 0, 10);
        let n = match_input(&root, "aaaab").unwrap();
        assert_eq!(n, 4);
        assert_eq!(root.lock().unwrap().string(), "aaaa");
    }

    #[test]
    fn random_int_is_not_matchable() {
        let root = Token::random_int(0, 100, 1);
        assert!(matches!(
            match_input(&root, "42"),
            Err(TokenError::NotMatchable)
        ));
    }
}
