//! G. Graph utilities: traversal, loop detection, reset propagation, pretty
//! print.

use crate::token::{internal_children, logical_children, ptr_eq, structural_children, TokenRef};
use std::fmt::Write as _;

/// Walks structural child edges using a visited set; returns `true` on
/// back-edge detection (spec.md §4.2). A list token's full child set is
/// descended into, but an inactive `Optional` contributes no edge — it
/// cannot participate in a cycle that can ever be reached while inactive.
pub fn loop_exists(root: &TokenRef) -> bool {
    let mut visited: Vec<TokenRef> = Vec::new();
    walk_for_loop(root, &mut visited)
}

fn walk_for_loop(tok: &TokenRef, visited: &mut Vec<TokenRef>) -> bool {
    if visited.iter().any(|v| ptr_eq(v, tok)) {
        return true;
    }
    visited.push(tok.clone());
    for child in structural_children(tok) {
        if walk_for_loop(&child, visited) {
            return true;
        }
    }
    visited.pop();
    false
}

/// Resets every node reachable via internal children (so `except` lists and
/// repeat templates are covered too) that carries state — sequences,
/// ranges, alternation/unique choices, optional activity, repeat counts.
/// Called between fuzzing steps so state does not leak across iterations.
pub fn reset_reset_tokens(root: &TokenRef) {
    let mut seen: Vec<TokenRef> = Vec::new();
    reset_walk(root, &mut seen);
}

fn reset_walk(tok: &TokenRef, seen: &mut Vec<TokenRef>) {
    if seen.iter().any(|v| ptr_eq(v, tok)) {
        return;
    }
    seen.push(tok.clone());
    tok.lock().unwrap().reset();
    for child in internal_children(tok) {
        reset_walk(&child, seen);
    }
}

pub fn pretty_print_tree(root: &TokenRef) -> String {
    let mut out = String::new();
    print_walk(root, 0, &mut out, false);
    out
}

pub fn pretty_print_internal_tree(root: &TokenRef) -> String {
    let mut out = String::new();
    print_walk(root, 0, &mut out, true);
    out
}

/// Renders the token graph as a Graphviz DOT document (the driver's `graph
/// --dot` output, spec.md §1's "DOT graph export" collaborator). Node ids are
/// assigned by discovery order rather than pointer address so the output is
/// stable across runs of the same build.
pub fn to_dot(root: &TokenRef, internal: bool) -> String {
    let mut out = String::new();
    out.push_str("digraph tavor {\n");
    let mut ids: Vec<TokenRef> = Vec::new();
    dot_walk(root, internal, &mut ids, &mut out);
    out.push_str("}\n");
    out
}

fn dot_id(tok: &TokenRef, ids: &mut Vec<TokenRef>) -> usize {
    if let Some(pos) = ids.iter().position(|v| ptr_eq(v, tok)) {
        return pos;
    }
    ids.push(tok.clone());
    ids.len() - 1
}

fn dot_walk(tok: &TokenRef, internal: bool, ids: &mut Vec<TokenRef>, out: &mut String) {
    let already_visited = ids.iter().any(|v| ptr_eq(v, tok));
    let id = dot_id(tok, ids);
    if already_visited {
        return;
    }
    let t = tok.lock().unwrap();
    let label = t.name.clone().unwrap_or_else(|| format!("{:?}", t.kind));
    drop(t);
    let _ = writeln!(out, "  n{id} [label={label:?}];");

    let children = if internal {
        internal_children(tok)
    } else {
        logical_children(tok)
    };
    for child in &children {
        let child_id = dot_id(child, ids);
        let _ = writeln!(out, "  n{id} -> n{child_id};");
    }
    for child in &children {
        dot_walk(child, internal, ids, out);
    }
}

fn print_walk(tok: &TokenRef, depth: usize, out: &mut String, internal: bool) {
    let t = tok.lock().unwrap();
    let _ = writeln!(
        out,
        "{}{} {:?}",
        "  ".repeat(depth),
        t.name.clone().unwrap_or_else(|| "<anon>".to_string()),
        t.kind
    );
    drop(t);
    let children = if internal {
        internal_children(tok)
    } else {
        logical_children(tok)
    };
    for c in children {
        print_walk(&c, depth + 1, out, internal);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::Token;

    #[test]
    fn acyclic_graph_has_no_loop() {
        let leaf = Token::const_str("a");
        let root = Token::all(vec![leaf.clone(), Token::const_str("b")]);
        assert!(!loop_exists(&root));
    }

    #[test]
    fn self_reference_is_a_loop() {
        let placeholder = Token::const_str("placeholder");
        let root = Token::all(vec![placeholder.clone()]);
        // Simulate a self-referencing definition by making the placeholder's
        // slot point back at root through a One wrapper.
        let cyclic = Token::one(vec![root.clone()]);
        crate::token::internal_replace(&root, &placeholder, cyclic.clone());
        assert!(loop_exists(&root));
    }
}
