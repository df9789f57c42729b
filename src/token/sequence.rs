//! The shared sequence generator and its three proxy token kinds' common
//! state. `Sequence` itself is never inserted into the graph (§3) — only a
//! handle to it is held by `SequenceItem`/`SequenceExistingItem`/
//! `SequenceResetItem`.

use std::sync::Mutex;
use std::sync::Arc;

#[derive(Debug)]
pub struct SequenceState {
    pub start: i64,
    pub step: i64,
    pub value: i64,
}

/// Shared, reference-counted handle. Mutated only by the single producer
/// (the active strategy's worker thread), so the `Mutex` is never
/// contended — it exists only so the handle can cross the thread boundary
/// between the strategy and the driver, per §5.
pub type SequenceHandle = Arc<Mutex<SequenceState>>;

pub fn new_sequence(start: i64, step: i64) -> SequenceHandle {
    Arc::new(Mutex::new(SequenceState {
        start,
        step,
        value: start,
    }))
}

impl SequenceState {
    /// Number of values already produced: `(value - start) / step`.
    pub fn produced_count(&self) -> i64 {
        if self.step == 0 {
            return 0;
        }
        (self.value - self.start) / self.step
    }

    /// Return the current value and advance. Used by `SequenceItem`.
    pub fn next_value(&mut self) -> i64 {
        let v = self.value;
        self.value += self.step;
        v
    }

    /// The i-th already-produced value (0-indexed), without bounds checking.
    pub fn produced_value(&self, i: i64) -> i64 {
        self.start + i * self.step
    }

    pub fn reset(&mut self) {
        self.value = self.start;
    }
}
