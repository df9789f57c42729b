//! `AllPermutations`/`AlmostAllPermutations`: an odometer walk over every
//! reachable combination of the graph. Grounded in the level-tree traversal
//! of `allpermutations.go`'s `getTree`/`fuzz`/`nextStep`, adapted to the
//! token graph's own `permutations()`/`set_permutation` contract instead of
//! a separately-tracked level tree.
//!
//! Only `All` (whose own `permutations() == 1`, with the real state living
//! in its children) and an active `Optional` (whose own count is fixed at 2
//! regardless of its child's size) need the walk to descend further;
//! `One`/`Repeat` already fold their whole subtree into their own count
//! (`subtree_width` in token/mod.rs), so a single `set_permutation` call
//! configures them completely.
//!
//! The leftmost child of any `All` varies fastest (innermost); children
//! further right vary slower, matching spec.md §8's enumeration order.

use super::{spawn, RunHandle};
use crate::graph::reset_reset_tokens;
use crate::token::{enumeration_children, TokenRef};
use crossbeam_channel::{Receiver, Sender};

pub struct AllPermutations;
pub struct AlmostAllPermutations;

pub(crate) fn run(root: TokenRef, almost: bool) -> RunHandle {
    spawn(root, move |root, tx, rx| {
        let mut last_rendered: Option<String> = None;
        let start = vec![root.clone()];
        walk(&root, &start, tx, rx, almost, &mut last_rendered);
    })
}

/// `remaining`'s last element is the outermost node still to be driven
/// through its own range; everything before it is strictly more inner
/// (varies faster). Recursing toward the front therefore nests loops in the
/// right order without any explicit digit bookkeeping.
fn walk(
    root: &TokenRef,
    remaining: &[TokenRef],
    tx: &Sender<String>,
    rx: &Receiver<()>,
    almost: bool,
    last_rendered: &mut Option<String>,
) -> bool {
    match remaining.split_last() {
        None => emit(root, tx, rx, almost, last_rendered),
        Some((outer, rest)) => {
            let n = outer.lock().unwrap().permutations();
            for p in 0..n {
                if outer.lock().unwrap().set_permutation(p).is_err() {
                    continue;
                }
                // A composite whose own count doesn't cover its children
                // (`All`, an active `Optional`) hands those children back in
                // as even-more-inner work, ahead of whatever was already
                // queued in `rest`.
                let extra = enumeration_children(outer);
                let keep_going = if extra.is_empty() {
                    walk(root, rest, tx, rx, almost, last_rendered)
                } else {
                    let mut combined = extra;
                    combined.extend_from_slice(rest);
                    walk(root, &combined, tx, rx, almost, last_rendered)
                };
                if !keep_going {
                    return false;
                }
            }
            true
        }
    }
}

fn emit(
    root: &TokenRef,
    tx: &Sender<String>,
    rx: &Receiver<()>,
    almost: bool,
    last_rendered: &mut Option<String>,
) -> bool {
    let rendered = root.lock().unwrap().string();
    if almost && last_rendered.as_deref() == Some(rendered.as_str()) {
        // Identical to the previous emission: the digit that just changed
        // doesn't affect the rendered text. `AlmostAllPermutations` skips it
        // rather than making the consumer see the same state twice. The
        // rewind below still has to run — the skipped state may itself have
        // advanced a shared `$Id.Next` sequence, and that must not leak into
        // the next configured state.
        reset_reset_tokens(root);
        return true;
    }
    last_rendered.replace(rendered.clone());
    let sent = tx.send(rendered).is_ok() && rx.recv().is_ok();
    // Between every emitted (or skipped) state, sequence generators are
    // rewound so a production using `$Id.Next` restarts at every top-level
    // iteration (spec.md §4.5).
    reset_reset_tokens(root);
    sent
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
    fn enumerates_every_combination_with_leftmost_innermost() {
        let root = Token::all(vec![
            Token::one(vec![Token::const_str("a"), Token::const_str("b")]),
            Token::one(vec![Token::const_str("x"), Token::const_str("y")]),
        ]);
        let handle = run(root, false);
        let out = drain(handle);
        assert_eq!(out, vec!["ax", "bx", "ay", "by"]);
    }

    #[test]
    fn almost_skips_states_identical_to_the_previous_one() {
        // A range that doesn't reach the second child's position in the
        // rendering: `1|2` concatenated with a constant, so every
        // permutation renders differently and nothing should be skipped
        // for this particular grammar. Exercise the "no skip needed" path
        // to make sure `almost=true` doesn't drop states that do differ.
        let root = Token::all(vec![Token::range_int(1, 2), Token::const_str("!")]);
        let handle = run(root, true);
        let out = drain(handle);
        assert_eq!(out, vec!["1!", "2!"]);
    }

    #[test]
    fn resume_is_required_between_states() {
        let root = Token::one(vec![Token::const_str("a"), Token::const_str("b")]);
        let mut handle = run(root, false);
        assert_eq!(handle.next(), Some("a".to_string()));
        handle.resume();
        assert_eq!(handle.next(), Some("b".to_string()));
        handle.resume();
        assert_eq!(handle.next(), None);
    }

    #[test]
    fn dropping_the_handle_mid_walk_cancels_the_producer_thread() {
        let root = Token::repeat(Token::const_str("a"), 0, 1_000_000);
        let mut handle = run(root, false);
        assert!(handle.next().is_some());
        drop(handle); // must not hang waiting on the producer
    }
}
