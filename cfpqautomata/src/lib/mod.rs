#![allow(clippy::new_without_default)]
#![allow(clippy::upper_case_acronyms)]

//! Finite automata in the form needed for context-free path querying (CFPQ).
//!
//! Two representations are provided:
//!
//!   * [`Automaton`](automaton/struct.Automaton.html): a set-based automaton which is convenient to
//!     build incrementally (states, start/final states, labelled and epsilon transitions).
//!   * [`AdjacencyMatrixFA`](adjacency/struct.AdjacencyMatrixFA.html): the same automaton mapped
//!     onto dense state indices, with one boolean matrix per alphabet symbol. This is the
//!     representation that intersection, transitive closure and the matrix-based solvers work on.
//!
//! The library makes the following guarantees:
//!
//!   * States in an `AdjacencyMatrixFA` are numbered from `0` to `states_len() - 1` (inclusive),
//!     in the order they were added to the source `Automaton`.
//!   * The product of two automata `A` and `B` numbers the state pair `(a, b)` as
//!     `a * B.states_len() + b`, which is the Kronecker product convention.
//!   * All matrices are boolean: "addition" is logical OR and "multiplication" is AND-OR
//!     composition.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub mod adjacency;
pub mod automaton;
pub mod matrix;
mod symbol;

pub use crate::{
    adjacency::{AdjacencyMatrixFA, intersect},
    automaton::{Automaton, AutomatonError, AutomatonErrorKind},
    matrix::BoolMatrix,
    symbol::Symbol,
};

type StIdxStorageT = u32;

/// `StIdx` is a dense state index inside an [`AdjacencyMatrixFA`].
///
/// We tell the world we deal in `usize` (automata are indexed by `usize` everywhere in the
/// matrix code) but store a `u32`: product automata are the biggest thing we build, and a
/// product with more than `u32::MAX` states could not have its matrices allocated anyway.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StIdx(StIdxStorageT);

impl From<usize> for StIdx {
    fn from(v: usize) -> Self {
        match num_traits::cast::<usize, StIdxStorageT>(v) {
            Some(x) => StIdx(x),
            None => panic!("Overflow"),
        }
    }
}

impl From<StIdx> for usize {
    fn from(st: StIdx) -> Self {
        // usize is at least 32 bits on every platform we support.
        num_traits::cast(st.0).unwrap()
    }
}

impl StIdx {
    pub fn as_storaget(&self) -> StIdxStorageT {
        self.0
    }
}
