//! `PermuteOptionals`: activates/deactivates every `Optional` reachable from
//! the root in every one of the `2^n` combinations, grounded in
//! `permuteoptionals.go`'s `findOptionals`/`fuzz`. Bit `i` of the pattern
//! controls `optionals[i]`, discovered via a pre-order left-to-right walk
//! starting all-inactive (pattern `0`), so optional nesting is irrelevant to
//! the bit assignment — only encounter order matters.
//!
//! Unlike the Go original this does not additionally randomize non-optional
//! siblings encountered while searching for optionals; every other token is
//! left at whatever state it already carries, which keeps the walk
//! deterministic. See DESIGN.md.

use super::{spawn, RunHandle};
use crate::graph::reset_reset_tokens;
use crate::token::{internal_children, ptr_eq, TokenKind, TokenRef};

pub struct PermuteOptionals;

pub(crate) fn run(root: TokenRef) -> RunHandle {
    spawn(root, move |root, tx, rx| {
        let mut optionals = Vec::new();
        let mut seen = Vec::new();
        discover_optionals(&root, &mut optionals, &mut seen);
        // spec.md §4.5: joint-state enumeration is capped at 64 optionals;
        // any discovered beyond that are left at whatever state they start in.
        optionals.truncate(64);

        let total = 1u64.checked_shl(optionals.len() as u32).unwrap_or(u64::MAX);
        for pattern in 0..total {
            for (i, opt) in optionals.iter().enumerate() {
                let active = (pattern >> i) & 1 == 1;
                let _ = opt
                    .lock()
                    .unwrap()
                    .set_permutation(if active { 1 } else { 0 });
            }
            let rendered = root.lock().unwrap().string();
            if tx.send(rendered).is_err() {
                return;
            }
            if rx.recv().is_err() {
                return;
            }
            reset_reset_tokens(&root);
        }
    })
}

/// Unconditional structural descent (an `Optional`'s child is visited
/// regardless of its current `active` flag, unlike `logical_children`) so
/// nested optionals hidden behind a currently-inactive one are still found.
fn discover_optionals(tok: &TokenRef, out: &mut Vec<TokenRef>, seen: &mut Vec<TokenRef>) {
    if seen.iter().any(|s| ptr_eq(s, tok)) {
        return;
    }
    seen.push(tok.clone());
    if matches!(tok.lock().unwrap().kind, TokenKind::Optional { .. }) {
        out.push(tok.clone());
    }
    for c in internal_children(tok) {
        discover_optionals(&c, out, seen);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::Token;

    fn drain(mut handle: RunHandle) -> Vec<String> {
        let mut out = Vec::new();
        while let Some(s) = handle.next() {
            out.push(s);
            handle.resume();
        }
        out
    }

    #[test]
    fn visits_every_combination_all_inactive_first() {
        let root = Token::all(vec![
            Token::optional(Token::const_str("a")),
            Token::optional(Token::const_str("b")),
        ]);
        let out = drain(run(root));
        assert_eq!(out, vec!["", "a", "b", "ab"]);
    }

    #[test]
    fn a_graph_with_no_optionals_emits_exactly_once() {
        let root = Token::const_str("fixed");
        let out = drain(run(root));
        assert_eq!(out, vec!["fixed"]);
    }

    #[test]
    fn finds_an_optional_nested_inside_another_inactive_optional() {
        let inner = Token::optional(Token::const_str("b"));
        let outer = Token::optional(inner);
        let root = Token::all(vec![Token::const_str("a"), outer]);
        let out = drain(run(root));
        assert_eq!(out.len(), 4);
        assert!(out.contains(&"a".to_string()));
        assert!(out.contains(&"ab".to_string()));
    }
}
