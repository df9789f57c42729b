//! S. Strategies: background producers that drive a token graph through its
//! reachable states, one at a time, across a rendezvous channel (spec.md
//! §5). A strategy owns the graph from the point it is constructed; the
//! driver only ever sees rendered strings.

pub mod all_permutations;
pub mod permute_optionals;
pub mod reduce;

pub use all_permutations::{AllPermutations, AlmostAllPermutations};
pub use permute_optionals::PermuteOptionals;
pub use reduce::{BinarySearchReduce, ReduceHandle, Verdict};

use crate::error::StrategyError;
use crate::graph::loop_exists;
use crate::token::TokenRef;
use crossbeam_channel::{bounded, Receiver, Sender};
use std::thread::{self, JoinHandle};

/// Consumer side of the fuzzing rendezvous. `next()` blocks until the
/// producer thread has configured and rendered one state; `resume()`
/// releases it to compute the next one. Dropping the handle tears down both
/// channels, which the producer observes on its next send or receive and
/// exits — there is no separate cancellation flag.
pub struct RunHandle {
    states: Option<Receiver<String>>,
    resume: Option<Sender<()>>,
    join: Option<JoinHandle<()>>,
}

impl RunHandle {
    pub fn next(&mut self) -> Option<String> {
        self.states.as_ref().and_then(|r| r.recv().ok())
    }

    pub fn resume(&self) {
        if let Some(tx) = &self.resume {
            let _ = tx.send(());
        }
    }
}

impl Drop for RunHandle {
    fn drop(&mut self) {
        // Drop both channel halves *before* joining: if the producer is
        // currently parked on `states.send` or `resume.recv`, disconnecting
        // here makes that call return immediately instead of hanging.
        self.states.take();
        self.resume.take();
        if let Some(j) = self.join.take() {
            let _ = j.join();
        }
    }
}

pub(crate) fn spawn<F>(root: TokenRef, body: F) -> RunHandle
where
    F: FnOnce(TokenRef, &Sender<String>, &Receiver<()>) + Send + 'static,
{
    let (states_tx, states_rx) = bounded::<String>(0);
    let (resume_tx, resume_rx) = bounded::<()>(0);
    let join = thread::spawn(move || body(root, &states_tx, &resume_rx));
    RunHandle {
        states: Some(states_rx),
        resume: Some(resume_tx),
        join: Some(join),
    }
}

pub fn list_strategies() -> Vec<String> {
    let mut names = vec![
        "AllPermutations".to_string(),
        "AlmostAllPermutations".to_string(),
        "PermuteOptionals".to_string(),
    ];
    names.sort();
    names
}

/// Construct a fuzzing strategy by name. Every strategy refuses a cyclic
/// graph up front (spec.md §4.5 point 1) rather than discovering it mid-walk.
pub fn new(name: &str, root: TokenRef) -> Result<RunHandle, StrategyError> {
    if loop_exists(&root) {
        return Err(StrategyError::EndlessLoopDetected);
    }
    match name {
        "AllPermutations" => Ok(all_permutations::run(root, false)),
        "AlmostAllPermutations" => Ok(all_permutations::run(root, true)),
        "PermuteOptionals" => Ok(permute_optionals::run(root)),
        other => Err(StrategyError::UnknownStrategy {
            name: other.to_string(),
        }),
    }
}

/// Construct a `BinarySearchReduce` session over `root`, which the caller
/// must already have configured to reproduce a known failure (spec.md
/// §4.6). Reduction has its own cyclic-graph guard for the same reason
/// fuzzing strategies do.
pub fn new_reduce(root: TokenRef) -> Result<ReduceHandle, StrategyError> {
    if loop_exists(&root) {
        return Err(StrategyError::EndlessLoopDetected);
    }
    Ok(reduce::run(root))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::Token;

    #[test]
    fn unknown_strategy_name_is_rejected() {
        let root = Token::const_str("a");
        assert!(matches!(
            new("NoSuchStrategy", root),
            Err(StrategyError::UnknownStrategy { .. })
        ));
    }

    #[test]
    fn cyclic_graph_is_rejected_before_any_thread_is_spawned() {
        let placeholder = Token::const_str("placeholder");
        let root = Token::all(vec![placeholder.clone()]);
        let cyclic = Token::one(vec![root.clone()]);
        crate::token::internal_replace(&root, &placeholder, cyclic);
        assert!(matches!(
            new("AllPermutations", root),
            Err(StrategyError::EndlessLoopDetected)
        ));
    }
}
