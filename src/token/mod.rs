//! T. Token kinds: a closed tagged-variant enumeration (`TokenKind`) plus
//! small extension traits for the forward/list families, per the dispatch
//! shape recommended for a systems language instead of an open interface
//! zoo.

pub mod matcher;
pub mod sequence;

pub use matcher::match_input;

use crate::error::TokenError;
use crate::rng::permute_index;
use sequence::{new_sequence, SequenceHandle};
use std::sync::Mutex;
use std::collections::BTreeSet;
use std::sync::Arc;

pub type TokenRef = Arc<Mutex<Token>>;

#[derive(Debug)]
pub struct Token {
    /// Grammar-level name, if this token was bound to one by the parser.
    /// Used only for pretty printing and diagnostics.
    pub name: Option<String>,
    pub kind: TokenKind,
}

#[derive(Debug)]
pub enum TokenKind {
    ConstInt(i64),
    ConstStr(String),
    RangeInt {
        from: i64,
        to: i64,
        cur: i64,
    },
    RandomInt {
        from: i64,
        to: i64,
        cur: i64,
        seed: u64,
    },
    /// Concatenation. `permutations() == 1`; the interesting state lives in
    /// `children`.
    All {
        children: Vec<TokenRef>,
    },
    /// Alternation. `chosen` is the last branch selected by `set_permutation`.
    One {
        children: Vec<TokenRef>,
        chosen: usize,
    },
    /// Repetition. `template` is never itself rendered; `children` holds the
    /// current `count` independently-configured clones.
    Repeat {
        template: TokenRef,
        from: usize,
        to: usize,
        children: Vec<TokenRef>,
    },
    Optional {
        child: TokenRef,
        active: bool,
    },
    SequenceItem {
        seq: SequenceHandle,
        captured: i64,
    },
    SequenceExistingItem {
        seq: SequenceHandle,
        except: Vec<TokenRef>,
        chosen: Option<i64>,
    },
    SequenceResetItem {
        seq: SequenceHandle,
    },
    /// `$List.Count`: renders the current logical child count of `target`.
    Count {
        target: TokenRef,
    },
    /// `$List.Unique`: a derived alternation over clones of `target`'s
    /// current logical children, leaving `target` itself untouched. See
    /// SPEC_FULL.md §3 for why this attribute exists.
    Unique {
        children: Vec<TokenRef>,
        chosen: usize,
    },
}

fn wrap(kind: TokenKind) -> TokenRef {
    Arc::new(Mutex::new(Token { name: None, kind }))
}

impl Token {
    pub fn const_int(v: i64) -> TokenRef {
        wrap(TokenKind::ConstInt(v))
    }

    pub fn const_str(s: impl Into<String>) -> TokenRef {
        wrap(TokenKind::ConstStr(s.into()))
    }

    pub fn range_int(from: i64, to: i64) -> TokenRef {
        wrap(TokenKind::RangeInt { from, to, cur: from })
    }

    pub fn random_int(from: i64, to: i64, seed: u64) -> TokenRef {
        wrap(TokenKind::RandomInt {
            from,
            to,
            cur: from,
            seed,
        })
    }

    pub fn all(children: Vec<TokenRef>) -> TokenRef {
        wrap(TokenKind::All { children })
    }

    pub fn one(children: Vec<TokenRef>) -> TokenRef {
        wrap(TokenKind::One {
            children,
            chosen: 0,
        })
    }

    pub fn repeat(template: TokenRef, from: usize, to: usize) -> TokenRef {
        wrap(TokenKind::Repeat {
            template,
            from,
            to,
            children: Vec::new(),
        })
    }

    pub fn optional(child: TokenRef) -> TokenRef {
        wrap(TokenKind::Optional {
            child,
            active: false,
        })
    }

    pub fn sequence_item(seq: SequenceHandle) -> TokenRef {
        wrap(TokenKind::SequenceItem { seq, captured: 0 })
    }

    pub fn sequence_existing_item(seq: SequenceHandle) -> TokenRef {
        wrap(TokenKind::SequenceExistingItem {
            seq,
            except: Vec::new(),
            chosen: None,
        })
    }

    pub fn sequence_reset_item(seq: SequenceHandle) -> TokenRef {
        wrap(TokenKind::SequenceResetItem { seq })
    }

    pub fn new_sequence_handle(start: i64, step: i64) -> SequenceHandle {
        new_sequence(start, step)
    }

    pub fn count_of(target: TokenRef) -> TokenRef {
        wrap(TokenKind::Count { target })
    }

    pub fn unique_of(target: &TokenRef) -> TokenRef {
        let children = logical_children(target)
            .into_iter()
            .map(deep_clone)
            .collect();
        wrap(TokenKind::Unique {
            children,
            chosen: 0,
        })
    }

    pub fn is_optional(&self) -> bool {
        matches!(self.kind, TokenKind::Optional { .. })
    }

    /// Local permutation count — see spec.md §4.1 for the per-kind formula.
    /// For `One`/`Repeat`/`Unique` this already folds in the children's
    /// `permutations_all()`, matching the spec's explicit formulas for those
    /// two kinds.
    pub fn permutations(&self) -> u64 {
        match &self.kind {
            TokenKind::ConstInt(_) | TokenKind::ConstStr(_) => 1,
            TokenKind::RangeInt { from, to, .. } => (to - from + 1).max(0) as u64,
            TokenKind::RandomInt { from, to, .. } => (to - from + 1).max(0) as u64,
            TokenKind::All { .. } => 1,
            TokenKind::One { children, .. } => children
                .iter()
                .map(subtree_width)
                .sum::<u64>()
                .max(1),
            TokenKind::Repeat {
                template, from, to, ..
            } => {
                let child_width = subtree_width(template).max(1);
                (*from..=*to)
                    .map(|k| child_width.saturating_pow(k as u32))
                    .sum::<u64>()
                    .max(1)
            }
            TokenKind::Optional { .. } => 2,
            TokenKind::SequenceItem { .. } => 1,
            TokenKind::SequenceExistingItem { seq, .. } => {
                seq.lock().unwrap().produced_count().max(0) as u64
            }
            TokenKind::SequenceResetItem { .. } => 1,
            TokenKind::Count { .. } => 1,
            TokenKind::Unique { children, .. } => (children.len() as u64).max(1),
        }
    }

    pub fn reset(&mut self) {
        match &mut self.kind {
            TokenKind::RangeInt { from, cur, .. } => *cur = *from,
            TokenKind::RandomInt { from, cur, .. } => *cur = *from,
            TokenKind::One { chosen, .. } => *chosen = 0,
            TokenKind::Unique { chosen, .. } => *chosen = 0,
            TokenKind::Repeat { children, .. } => children.clear(),
            TokenKind::Optional { active, .. } => *active = false,
            // Resetting a sequence proxy also rewinds the *shared* generator
            // it points at (not just the proxy's own cached state): this is
            // what lets the strategies' between-state `reset_reset_tokens`
            // sweep (graph.rs) restart `$Id.Next` counters every iteration,
            // per spec.md §4.5, even when no explicit `$Id.Reset` marker is
            // present in the grammar.
            TokenKind::SequenceItem { seq, captured } => {
                *captured = 0;
                seq.lock().unwrap().reset();
            }
            TokenKind::SequenceExistingItem { seq, chosen, except } => {
                *chosen = None;
                except.clear();
                seq.lock().unwrap().reset();
            }
            TokenKind::SequenceResetItem { seq } => seq.lock().unwrap().reset(),
            _ => {}
        }
    }

    pub fn string(&self) -> String {
        match &self.kind {
            TokenKind::ConstInt(v) => v.to_string(),
            TokenKind::ConstStr(s) => s.clone(),
            TokenKind::RangeInt { cur, .. } => cur.to_string(),
            TokenKind::RandomInt { cur, .. } => cur.to_string(),
            TokenKind::All { children } => children.iter().map(|c| c.lock().unwrap().string()).collect(),
            TokenKind::One { children, chosen } => children
                .get(*chosen)
                .map(|c| c.lock().unwrap().string())
                .unwrap_or_default(),
            TokenKind::Repeat { children, .. } => {
                children.iter().map(|c| c.lock().unwrap().string()).collect()
            }
            TokenKind::Optional { child, active } => {
                if *active {
                    child.lock().unwrap().string()
                } else {
                    String::new()
                }
            }
            TokenKind::SequenceItem { captured, .. } => captured.to_string(),
            TokenKind::SequenceExistingItem { chosen, .. } => chosen
                .map(|v| v.to_string())
                .unwrap_or_default(),
            TokenKind::SequenceResetItem { .. } => String::new(),
            TokenKind::Count { target } => logical_children(target).len().to_string(),
            TokenKind::Unique { children, chosen } => children
                .get(*chosen)
                .map(|c| c.lock().unwrap().string())
                .unwrap_or_default(),
        }
    }

    pub fn set_permutation(&mut self, i: u64) -> Result<(), TokenError> {
        let n = self.permutations();
        if i >= n {
            return Err(TokenError::IndexOutOfBound {
                index: i,
                permutations: n,
            });
        }
        match &mut self.kind {
            TokenKind::ConstInt(_) | TokenKind::ConstStr(_) => {}
            TokenKind::RangeInt { from, cur, .. } => *cur = from.wrapping_add(i as i64),
            TokenKind::RandomInt {
                from, to, cur, seed,
            } => {
                let range = (*to - *from + 1).max(1) as u64;
                *cur = *from + permute_index(i, range, *seed) as i64;
            }
            TokenKind::All { .. } => {}
            TokenKind::One { children, chosen } => {
                let (k, local_i) = pick_branch(children, i)?;
                *chosen = k;
                let branch = children[k].clone();
                set_subtree_permutation(&branch, local_i)?;
            }
            TokenKind::Repeat {
                template,
                from,
                to,
                children,
            } => {
                let child_width = subtree_width(template).max(1);
                let (count, local_i) = pick_repeat_band(*from, *to, child_width, i).ok_or(
                    TokenError::IndexOutOfBound {
                        index: i,
                        permutations: n,
                    },
                )?;
                children.clear();
                children.reserve(count);
                let mut remaining = local_i;
                for _ in 0..count {
                    let digit = remaining % child_width;
                    remaining /= child_width;
                    let clone = deep_clone(template);
                    set_subtree_permutation(&clone, digit)?;
                    children.push(clone);
                }
            }
            TokenKind::Optional { active, .. } => *active = i == 1,
            TokenKind::SequenceItem { seq, captured } => {
                *captured = seq.lock().unwrap().next_value();
            }
            TokenKind::SequenceExistingItem { seq, except, chosen } => {
                let picked = pick_existing_value(seq, except, i)?;
                *chosen = Some(picked);
            }
            TokenKind::SequenceResetItem { seq } => seq.lock().unwrap().reset(),
            TokenKind::Count { .. } => {}
            TokenKind::Unique { chosen, .. } => *chosen = i as usize,
        }
        Ok(())
    }
}

fn pick_branch(children: &[TokenRef], i: u64) -> Result<(usize, u64), TokenError> {
    let mut cumulative = 0u64;
    for (k, c) in children.iter().enumerate() {
        let a = subtree_width(c);
        if i < cumulative + a {
            return Ok((k, i - cumulative));
        }
        cumulative += a;
    }
    Err(TokenError::IndexOutOfBound {
        index: i,
        permutations: cumulative,
    })
}

/// Fixed combinatorial width of `tok`'s full subtree, used to bound a local
/// index forwarded by a composite parent (`One`'s branch choice, `Repeat`'s
/// per-instance digit). Unlike `permutations_all()` — which reports
/// `Optional`'s width relative to its *current* `active` flag, per spec.md
/// §4.1 — this is state-independent: an `Optional` always contributes
/// `1 + subtree_width(child)` (one slot for inactive, the rest for every
/// active substate), since a parent decomposing an index ahead of setting
/// any state needs a fixed radix.
fn subtree_width(tok: &TokenRef) -> u64 {
    let t = tok.lock().unwrap();
    match &t.kind {
        TokenKind::Optional { child, .. } => 1 + subtree_width(child),
        TokenKind::All { children } => children.iter().map(subtree_width).product::<u64>().max(1),
        TokenKind::One { children, .. } => children.iter().map(subtree_width).sum::<u64>().max(1),
        TokenKind::Repeat {
            template, from, to, ..
        } => {
            let w = subtree_width(template).max(1);
            (*from..=*to)
                .map(|k| w.saturating_pow(k as u32))
                .sum::<u64>()
                .max(1)
        }
        _ => t.permutations(),
    }
}

/// Sets `tok` and every reachable structural descendant to the state
/// addressed by the `i`-th fully-expanded combination of the subtree (`0 <=
/// i < subtree_width(tok)`). Plain `set_permutation` only bounds a node's
/// own *local* configuration count, which for `All`/`One`/`Repeat` is
/// smaller than the full subtree (spec.md §4.1); forwarding a raw subtree
/// index there — as `One`/`Repeat` must, to honor their own `permutations()`
/// formulas — needs this recursive counterpart instead.
fn set_subtree_permutation(tok: &TokenRef, i: u64) -> Result<(), TokenError> {
    enum Action {
        Leaf,
        Optional(TokenRef),
        All(Vec<TokenRef>),
        One(Vec<TokenRef>),
        Repeat(TokenRef, usize, usize),
    }

    let action = match &tok.lock().unwrap().kind {
        TokenKind::Optional { child, .. } => Action::Optional(child.clone()),
        TokenKind::All { children } => Action::All(children.clone()),
        TokenKind::One { children, .. } => Action::One(children.clone()),
        TokenKind::Repeat {
            template, from, to, ..
        } => Action::Repeat(template.clone(), *from, *to),
        _ => Action::Leaf,
    };

    match action {
        Action::Leaf => tok.lock().unwrap().set_permutation(i),
        Action::Optional(child) => {
            if i == 0 {
                tok.lock().unwrap().set_permutation(0)
            } else {
                tok.lock().unwrap().set_permutation(1)?;
                set_subtree_permutation(&child, i - 1)
            }
        }
        Action::All(children) => {
            tok.lock().unwrap().set_permutation(0)?;
            let mut remaining = i;
            for c in &children {
                let w = subtree_width(c).max(1);
                set_subtree_permutation(c, remaining % w)?;
                remaining /= w;
            }
            Ok(())
        }
        Action::One(children) => {
            let (k, local_i) = pick_branch(&children, i)?;
            if let TokenKind::One { chosen, .. } = &mut tok.lock().unwrap().kind {
                *chosen = k;
            }
            set_subtree_permutation(&children[k], local_i)
        }
        Action::Repeat(template, from, to) => {
            let w = subtree_width(&template).max(1);
            let (count, mut local_i) =
                pick_repeat_band(from, to, w, i).ok_or(TokenError::IndexOutOfBound {
                    index: i,
                    permutations: (from..=to).map(|k| w.saturating_pow(k as u32)).sum(),
                })?;
            let mut new_children = Vec::with_capacity(count);
            for _ in 0..count {
                let clone = deep_clone(&template);
                set_subtree_permutation(&clone, local_i % w)?;
                local_i /= w;
                new_children.push(clone);
            }
            if let TokenKind::Repeat { children, .. } = &mut tok.lock().unwrap().kind {
                *children = new_children;
            }
            Ok(())
        }
    }
}

fn pick_repeat_band(from: usize, to: usize, child_all: u64, i: u64) -> Option<(usize, u64)> {
    let mut cumulative = 0u64;
    for k in from..=to {
        let band = child_all.saturating_pow(k as u32);
        if i < cumulative + band {
            return Some((k, i - cumulative));
        }
        cumulative += band;
    }
    None
}

/// Probe `i, i+1, ...` modulo the produced population for the first value
/// whose rendering is not in `except`'s collected strings (spec.md §4.1).
fn pick_existing_value(
    seq: &SequenceHandle,
    except: &[TokenRef],
    i: u64,
) -> Result<i64, TokenError> {
    let produced = seq.lock().unwrap().produced_count();
    if produced <= 0 {
        return Err(TokenError::NoSequenceValue);
    }
    let n = produced as u64;
    let excluded = collect_excluded_strings(except);
    for probe in 0..n {
        let idx = (i + probe) % n;
        let value = seq.lock().unwrap().produced_value(idx as i64);
        if !excluded.contains(&value.to_string()) {
            return Ok(value);
        }
    }
    Err(TokenError::NoSequenceValue)
}

fn collect_excluded_strings(except: &[TokenRef]) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    for tok in except {
        let children = logical_children(tok);
        if children.is_empty() {
            out.insert(tok.lock().unwrap().string());
        } else {
            for c in children {
                out.insert(c.lock().unwrap().string());
            }
        }
    }
    out
}

/// Aggregate permutation count across a token and its transitively reachable
/// children.
pub fn permutations_all(tok: &TokenRef) -> u64 {
    let t = tok.lock().unwrap();
    match &t.kind {
        TokenKind::All { children } => children.iter().map(permutations_all).product(),
        TokenKind::One { .. } | TokenKind::Repeat { .. } | TokenKind::Unique { .. } => {
            t.permutations()
        }
        TokenKind::Optional { child, active } => {
            if *active {
                permutations_all(child)
            } else {
                1
            }
        }
        _ => t.permutations(),
    }
}

/// Deep clone: fresh `Arc` for every structural node, but `Sequence` handles
/// (and `Count`/`Unique`'s non-owned `target` edge) are shared, per §3.
pub fn deep_clone(tok: &TokenRef) -> TokenRef {
    let t = tok.lock().unwrap();
    let kind = match &t.kind {
        TokenKind::ConstInt(v) => TokenKind::ConstInt(*v),
        TokenKind::ConstStr(s) => TokenKind::ConstStr(s.clone()),
        TokenKind::RangeInt { from, to, cur } => TokenKind::RangeInt {
            from: *from,
            to: *to,
            cur: *cur,
        },
        TokenKind::RandomInt { from, to, cur, seed } => TokenKind::RandomInt {
            from: *from,
            to: *to,
            cur: *cur,
            seed: *seed,
        },
        TokenKind::All { children } => TokenKind::All {
            children: children.iter().map(deep_clone).collect(),
        },
        TokenKind::One { children, chosen } => TokenKind::One {
            children: children.iter().map(deep_clone).collect(),
            chosen: *chosen,
        },
        TokenKind::Repeat {
            template,
            from,
            to,
            children,
        } => TokenKind::Repeat {
            template: deep_clone(template),
            from: *from,
            to: *to,
            children: children.iter().map(deep_clone).collect(),
        },
        TokenKind::Optional { child, active } => TokenKind::Optional {
            child: deep_clone(child),
            active: *active,
        },
        TokenKind::SequenceItem { seq, captured } => TokenKind::SequenceItem {
            seq: seq.clone(),
            captured: *captured,
        },
        TokenKind::SequenceExistingItem {
            seq,
            except,
            chosen,
        } => TokenKind::SequenceExistingItem {
            seq: seq.clone(),
            except: except.iter().map(deep_clone).collect(),
            chosen: *chosen,
        },
        TokenKind::SequenceResetItem { seq } => TokenKind::SequenceResetItem { seq: seq.clone() },
        TokenKind::Count { target } => TokenKind::Count {
            target: target.clone(),
        },
        TokenKind::Unique { children, chosen } => TokenKind::Unique {
            children: children.iter().map(deep_clone).collect(),
            chosen: *chosen,
        },
    };
    Arc::new(Mutex::new(Token {
        name: t.name.clone(),
        kind,
    }))
}

/// Logical children: the ones visible to strategies and to `Get`/`Len`. For
/// `SequenceExistingItem` this deliberately excludes `except` (internal-only,
/// spec.md §4.1/§9).
pub fn logical_children(tok: &TokenRef) -> Vec<TokenRef> {
    let t = tok.lock().unwrap();
    match &t.kind {
        TokenKind::All { children } => children.clone(),
        TokenKind::One { children, .. } => children.clone(),
        TokenKind::Repeat { children, .. } => children.clone(),
        TokenKind::Optional { child, active } if *active => vec![child.clone()],
        TokenKind::Unique { children, .. } => children.clone(),
        _ => Vec::new(),
    }
}

/// Children a strategy must separately drive to reach full coverage of a
/// subtree, beyond what the node's own `permutations()`/`set_permutation`
/// pair already accounts for. `One`/`Repeat` fold their entire subtree into
/// their own local permutation count (see `subtree_width`), so they need no
/// further descent; `All`'s own count is always 1 with the real state living
/// in its children, and `Optional`'s own count is fixed at 2 regardless of
/// how large its child is, so both need the strategy to keep walking.
pub fn enumeration_children(tok: &TokenRef) -> Vec<TokenRef> {
    let t = tok.lock().unwrap();
    match &t.kind {
        TokenKind::All { children } => children.clone(),
        TokenKind::Optional { child, active } if *active => vec![child.clone()],
        _ => Vec::new(),
    }
}

/// Internal children: what the filter pipeline walks (`InternalGet`/
/// `InternalLen` in the original). Includes `except` for
/// `SequenceExistingItem`, and an `Optional`'s child regardless of activity
/// (the filter must be able to rewrite it before any state is chosen).
pub fn internal_children(tok: &TokenRef) -> Vec<TokenRef> {
    let t = tok.lock().unwrap();
    match &t.kind {
        TokenKind::All { children } => children.clone(),
        TokenKind::One { children, .. } => children.clone(),
        TokenKind::Repeat { template, .. } => vec![template.clone()],
        TokenKind::Optional { child, .. } => vec![child.clone()],
        TokenKind::SequenceExistingItem { except, .. } => except.clone(),
        TokenKind::Unique { children, .. } => children.clone(),
        TokenKind::Count { target } => vec![target.clone()],
        _ => Vec::new(),
    }
}

/// Structural children, used by `LoopExists` (spec.md §4.2): a forward
/// token's *current* logical child, or a list token's children. Identical to
/// `logical_children` today — both skip an inactive `Optional`'s child —
/// kept as its own name because the two traversals answer different
/// questions (reachable-for-cycle-detection vs. visible-to-filters-and-Get).
pub fn structural_children(tok: &TokenRef) -> Vec<TokenRef> {
    logical_children(tok)
}

pub fn ptr_eq(a: &TokenRef, b: &TokenRef) -> bool {
    Arc::ptr_eq(a, b)
}

/// Parent-rewiring hook used by the filter pipeline: replace `old` with `new`
/// among `parent`'s internal children. Returns `true` if a replacement
/// happened.
pub fn internal_replace(parent: &TokenRef, old: &TokenRef, new: TokenRef) -> bool {
    let mut t = parent.lock().unwrap();
    match &mut t.kind {
        TokenKind::All { children } | TokenKind::One { children, .. } => {
            replace_in_vec(children, old, new)
        }
        TokenKind::Unique { children, .. } => replace_in_vec(children, old, new),
        TokenKind::Repeat { template, .. } => {
            if ptr_eq(template, old) {
                *template = new;
                true
            } else {
                false
            }
        }
        TokenKind::Optional { child, .. } => {
            if ptr_eq(child, old) {
                *child = new;
                true
            } else {
                false
            }
        }
        TokenKind::SequenceExistingItem { except, .. } => replace_in_vec(except, old, new),
        TokenKind::Count { target } => {
            if ptr_eq(target, old) {
                *target = new;
                true
            } else {
                false
            }
        }
        _ => false,
    }
}

fn replace_in_vec(children: &mut [TokenRef], old: &TokenRef, new: TokenRef) -> bool {
    for c in children.iter_mut() {
        if ptr_eq(c, old) {
            *c = new;
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn const_token_has_one_permutation() {
        let t = Token::const_str("a");
        assert_eq!(t.lock().unwrap().permutations(), 1);
        assert!(t.lock().unwrap().set_permutation(0).is_ok());
        assert!(t.lock().unwrap().set_permutation(1).is_err());
    }

    #[test]
    fn range_int_renders_offset_value() {
        let t = Token::range_int(5, 9);
        assert_eq!(t.lock().unwrap().permutations(), 5);
        t.lock().unwrap().set_permutation(3).unwrap();
        assert_eq!(t.lock().unwrap().string(), "8");
    }

    #[test]
    fn one_picks_branch_and_forwards_local_index() {
        let t = Token::one(vec![Token::const_str("x"), Token::const_str("y")]);
        assert_eq!(t.lock().unwrap().permutations(), 2);
        t.lock().unwrap().set_permutation(1).unwrap();
        assert_eq!(t.lock().unwrap().string(), "y");
    }

    #[test]
    fn optional_toggles_without_touching_child() {
        let t = Token::optional(Token::const_str("x"));
        assert_eq!(t.lock().unwrap().permutations(), 2);
        t.lock().unwrap().set_permutation(0).unwrap();
        assert_eq!(t.lock().unwrap().string(), "");
        t.lock().unwrap().set_permutation(1).unwrap();
        assert_eq!(t.lock().unwrap().string(), "x");
    }

    #[test]
    fn sequence_item_advances_shared_generator() {
        let seq = Token::new_sequence_handle(0, 2);
        let a = Token::sequence_item(seq.clone());
        let b = Token::sequence_item(seq);
        a.lock().unwrap().set_permutation(0).unwrap();
        b.lock().unwrap().set_permutation(0).unwrap();
        assert_eq!(a.lock().unwrap().string(), "0");
        assert_eq!(b.lock().unwrap().string(), "2");
    }

    #[test]
    fn one_branch_that_is_itself_a_concatenation_is_fully_addressable() {
        // START = ("a" "1"|"2") "x" | "b" "y" — the first branch is a
        // two-child `All`, so picking it must recurse into both its
        // children, not just validate the branch's own (always-zero) local
        // permutation.
        let branch_a = Token::all(vec![Token::const_str("a"), Token::range_int(1, 2)]);
        let root = Token::one(vec![branch_a, Token::const_str("b")]);
        assert_eq!(root.lock().unwrap().permutations(), 3); // 2 (range) + 1 (const)

        root.lock().unwrap().set_permutation(0).unwrap();
        assert_eq!(root.lock().unwrap().string(), "a1");
        root.lock().unwrap().set_permutation(1).unwrap();
        assert_eq!(root.lock().unwrap().string(), "a2");
        root.lock().unwrap().set_permutation(2).unwrap();
        assert_eq!(root.lock().unwrap().string(), "b");
        assert!(root.lock().unwrap().set_permutation(3).is_err());
    }

    #[test]
    fn existing_item_skips_excluded_values() {
        let seq = Token::new_sequence_handle(0, 1);
        let next = Token::sequence_item(seq.clone());
        next.lock().unwrap().set_permutation(0).unwrap(); // produces 0
        next.lock().unwrap().set_permutation(0).unwrap(); // produces 1

        let excluded = Token::const_str("0");
        let existing = Token::sequence_existing_item(seq);
        if let TokenKind::SequenceExistingItem { except, .. } = &mut existing.lock().unwrap().kind {
            except.push(excluded);
        }
        assert_eq!(existing.lock().unwrap().permutations(), 2);
        existing.lock().unwrap().set_permutation(0).unwrap();
        assert_eq!(existing.lock().unwrap().string(), "1");
    }
}
