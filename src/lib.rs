//! `tavor`: a grammar-driven fuzzing and delta-debugging platform.
//!
//! The crate is organized leaves-first, mirroring SPEC_FULL.md's layer
//! table:
//!
//! - [`token`] — T. the polymorphic node zoo.
//! - [`graph`] — G. traversal, loop detection, reset propagation, pretty
//!   print.
//! - [`parser`] — P. the grammar DSL → token graph.
//! - [`filter`] — F. the BFS rewrite pipeline.
//! - [`strategy`] — S. the algorithms that drive a graph through its
//!   permutation space.
//!
//! [`error`] holds the closed error-kind set shared by every layer.

pub mod error;
pub mod filter;
pub mod graph;
pub mod parser;
pub mod rng;
pub mod strategy;
pub mod token;

pub use error::Error;
