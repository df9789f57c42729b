//! F. Filter pipeline: BFS rewrite of the graph with parent rewiring.

mod dedup_constants;
mod drop_resets;

pub use dedup_constants::DedupConstants;
pub use drop_resets::DropResets;

use crate::error::Error;
use crate::token::{internal_children, internal_replace, ptr_eq, TokenRef};
use std::collections::VecDeque;

/// A filter inspects one token and optionally proposes replacements.
/// Returning an empty vec means "leave this token alone".
pub trait Filter {
    fn name(&self) -> &str;
    fn apply(&self, tok: &TokenRef) -> Result<Vec<TokenRef>, Error>;
}

pub fn registry() -> Vec<Box<dyn Filter>> {
    vec![Box::new(DedupConstants), Box::new(DropResets)]
}

pub fn list_filters() -> Vec<String> {
    let mut names: Vec<String> = registry().iter().map(|f| f.name().to_string()).collect();
    names.sort();
    names
}

pub fn lookup(name: &str) -> Result<Box<dyn Filter>, Error> {
    registry()
        .into_iter()
        .find(|f| f.name() == name)
        .ok_or_else(|| Error::UnknownFilter {
            name: name.to_string(),
        })
}

/// Apply every filter in `filters`, in order, to every token reachable from
/// `root`, via a breadth-first `(token, parent)` walk. Tokens produced by a
/// filter are tracked in `known` and never re-fed to the pipeline, so the
/// process always terminates (spec.md §4.4/§9).
pub fn apply_filters(filters: &[Box<dyn Filter>], root: TokenRef) -> Result<TokenRef, Error> {
    let mut root = root;
    let mut known: Vec<TokenRef> = vec![root.clone()];
    let mut queue: VecDeque<(TokenRef, Option<TokenRef>)> = VecDeque::new();
    queue.push_back((root.clone(), None));

    while let Some((tok, parent)) = queue.pop_front() {
        let mut replacement: Vec<TokenRef> = Vec::new();
        for filter in filters {
            let produced = filter.apply(&tok)?;
            replacement.extend(produced);
        }

        let next = if replacement.is_empty() {
            tok.clone()
        } else if replacement.len() == 1 {
            replacement.into_iter().next().unwrap()
        } else {
            crate::token::Token::one(replacement)
        };

        if !ptr_eq(&next, &tok) {
            known.push(next.clone());
            match &parent {
                Some(p) => {
                    internal_replace(p, &tok, next.clone());
                }
                None => {
                    root = next.clone();
                }
            }
        }

        for child in internal_children(&next) {
            if known.iter().any(|k| ptr_eq(k, &child)) {
                continue;
            }
            known.push(child.clone());
            queue.push_back((child, Some(next.clone())));
        }
    }

    Ok(root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::Token;

    #[test]
    fn identity_pipeline_leaves_graph_unchanged() {
        let root = Token::all(vec![Token::const_str("a"), Token::const_str("b")]);
        let before = root.lock().unwrap().string();
        let result = apply_filters(&[], root).unwrap();
        assert_eq!(result.lock().unwrap().string(), before);
    }

    #[test]
    fn filter_application_is_idempotent() {
        let root = Token::all(vec![
            Token::const_str("a"),
            Token::const_str("b"),
            Token::const_int(1),
        ]);
        let filters = registry();
        let once = apply_filters(&filters, root.clone()).unwrap();
        let once_str = once.lock().unwrap().string();
        let twice = apply_filters(&filters, once).unwrap();
        assert_eq!(twice.lock().unwrap().string(), once_str);
    }
}
