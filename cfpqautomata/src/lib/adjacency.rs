use std::{fmt::Debug, hash::Hash};

use indexmap::{IndexMap, IndexSet};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use vob::Vob;

use crate::{Automaton, AutomatonError, BoolMatrix, StIdx, Symbol};

/// An automaton represented as one square boolean matrix per alphabet symbol over dense state
/// indices. Entry `[i][j]` of the matrix for `sym` is set iff the automaton has a transition
/// `i --sym--> j`.
///
/// Only symbols which appear on at least one transition have a matrix, unless one is explicitly
/// requested with [`AdjacencyMatrixFA::ensure_symbol`].
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(bound(
        serialize = "S: Serialize + Eq + Hash",
        deserialize = "S: Deserialize<'de> + Eq + Hash"
    ))
)]
pub struct AdjacencyMatrixFA<S: Eq + Hash> {
    /// The bijection between states and indices: state `states[i]` has index `i`.
    states: IndexSet<S>,
    starts: Vob,
    finals: Vob,
    matrices: IndexMap<Symbol, BoolMatrix>,
}

impl<S: Clone + Debug + Eq + Hash> AdjacencyMatrixFA<S> {
    /// Build the adjacency-matrix form of `aut`. Epsilon transitions are eliminated first. Returns
    /// an error if `aut` references a state it does not declare.
    pub fn new(aut: &Automaton<S>) -> Result<Self, AutomatonError> {
        aut.validate()?;
        let aut = aut.remove_epsilons();
        let states = aut.states().cloned().collect::<IndexSet<_>>();
        let n = states.len();
        // validate() guarantees that every state we look up here exists.
        let idx = |s: &S| states.get_index_of(s).unwrap();

        let mut starts = Vob::from_elem(false, n);
        for s in aut.starts() {
            starts.set(idx(s), true);
        }
        let mut finals = Vob::from_elem(false, n);
        for s in aut.finals() {
            finals.set(idx(s), true);
        }
        let mut matrices = IndexMap::new();
        for (from, sym, to) in aut.transitions() {
            matrices
                .entry(sym.clone())
                .or_insert_with(|| BoolMatrix::square(n))
                .set(idx(from), idx(to));
        }
        Ok(AdjacencyMatrixFA {
            states,
            starts,
            finals,
            matrices,
        })
    }

    /// How many states does this automaton have?
    pub fn states_len(&self) -> usize {
        self.states.len()
    }

    /// Return an iterator which produces (in order from `0..self.states_len()`) all valid
    /// `StIdx`s.
    pub fn iter_stidxs(&self) -> impl Iterator<Item = StIdx> {
        (0..self.states.len()).map(StIdx::from)
    }

    /// Return the index of state `s`, or `None` if `s` is not a state of this automaton.
    pub fn state_idx(&self, s: &S) -> Option<StIdx> {
        self.states.get_index_of(s).map(StIdx::from)
    }

    /// Return the state with index `stidx`. Panics if `stidx` doesn't exist.
    pub fn idx_state(&self, stidx: StIdx) -> &S {
        &self.states[usize::from(stidx)]
    }

    pub fn is_start(&self, stidx: StIdx) -> bool {
        self.starts[usize::from(stidx)]
    }

    pub fn is_final(&self, stidx: StIdx) -> bool {
        self.finals[usize::from(stidx)]
    }

    pub fn iter_starts(&self) -> impl Iterator<Item = StIdx> + '_ {
        self.starts.iter_set_bits(..).map(StIdx::from)
    }

    pub fn iter_finals(&self) -> impl Iterator<Item = StIdx> + '_ {
        self.finals.iter_set_bits(..).map(StIdx::from)
    }

    /// The symbols which have a matrix, in order of first use.
    pub fn symbols(&self) -> impl Iterator<Item = &Symbol> {
        self.matrices.keys()
    }

    /// Return the matrix for `sym`, or `None` if there isn't one.
    pub fn matrix(&self, sym: &Symbol) -> Option<&BoolMatrix> {
        self.matrices.get(sym)
    }

    /// Return the matrix for `sym`, creating an empty one if this automaton doesn't yet have it.
    pub fn ensure_symbol(&mut self, sym: Symbol) -> &mut BoolMatrix {
        let n = self.states.len();
        self.matrices
            .entry(sym)
            .or_insert_with(|| BoolMatrix::square(n))
    }

    /// Add the transition `from --sym--> to`. Returns true if the transition is new.
    pub fn add_transition(&mut self, from: StIdx, sym: &Symbol, to: StIdx) -> bool {
        match self.matrices.get_mut(sym) {
            Some(m) => m.set(usize::from(from), usize::from(to)),
            None => self
                .ensure_symbol(sym.clone())
                .set(usize::from(from), usize::from(to)),
        }
    }

    /// The total number of transitions, summed over all symbols.
    pub fn nnz(&self) -> usize {
        self.matrices.values().map(|m| m.nnz()).sum()
    }

    /// Does this automaton accept `word`? This simulates all runs at once, advancing the set of
    /// live states one symbol at a time.
    pub fn accepts(&self, word: &[Symbol]) -> bool {
        let mut live = self.starts.clone();
        for sym in word {
            let m = match self.matrices.get(sym) {
                Some(m) => m,
                None => return false,
            };
            let mut next = Vob::from_elem(false, self.states.len());
            for i in live.iter_set_bits(..) {
                next.or(m.row(i));
            }
            if next.iter_set_bits(..).next().is_none() {
                return false;
            }
            live = next;
        }
        live.iter_set_bits(..).any(|i| self.finals[i])
    }

    /// Return the reflexive transitive closure of the union of all this automaton's matrices:
    /// entry `[i][j]` is set iff state `j` is reachable from state `i` by any word.
    pub fn transitive_closure(&self) -> BoolMatrix {
        let mut reach = BoolMatrix::square(self.states.len());
        for m in self.matrices.values() {
            reach.or_assign(m);
        }
        reach.transitive_closure()
    }

    /// Does this automaton accept the empty language?
    pub fn is_empty(&self) -> bool {
        let tc = self.transitive_closure();
        !self.starts.iter_set_bits(..).any(|s| {
            self.finals
                .iter_set_bits(..)
                .any(|f| tc.get(s, f))
        })
    }

    /// Return the product (intersection) of `self` and `other`. The state `(a, b)` has index
    /// `a * other.states_len() + b`; only symbols that both operands have a matrix for survive,
    /// each with the matrix `self[sym] ⊗ other[sym]`.
    pub fn intersect<T>(&self, other: &AdjacencyMatrixFA<T>) -> AdjacencyMatrixFA<(S, T)>
    where
        T: Clone + Debug + Eq + Hash,
    {
        let nb = other.states.len();
        let mut states = IndexSet::with_capacity(self.states.len() * nb);
        for a in &self.states {
            for b in &other.states {
                states.insert((a.clone(), b.clone()));
            }
        }
        let pairs = |x: &Vob, y: &Vob| {
            let mut v = Vob::from_elem(false, x.len() * nb);
            for i in x.iter_set_bits(..) {
                for j in y.iter_set_bits(..) {
                    v.set(i * nb + j, true);
                }
            }
            v
        };
        let mut matrices = IndexMap::new();
        for (sym, ma) in &self.matrices {
            if let Some(mb) = other.matrices.get(sym) {
                matrices.insert(sym.clone(), ma.kron(mb));
            }
        }
        AdjacencyMatrixFA {
            states,
            starts: pairs(&self.starts, &other.starts),
            finals: pairs(&self.finals, &other.finals),
            matrices,
        }
    }

    /// Convert this automaton back into set form.
    pub fn to_automaton(&self) -> Automaton<S> {
        let mut aut = Automaton::new();
        for s in &self.states {
            aut.add_state(s.clone());
        }
        for i in self.iter_starts() {
            aut.add_start(self.idx_state(i).clone());
        }
        for i in self.iter_finals() {
            aut.add_final(self.idx_state(i).clone());
        }
        for (sym, m) in &self.matrices {
            for (r, c) in m.iter_nonzero() {
                aut.add_transition(self.states[r].clone(), sym.clone(), self.states[c].clone());
            }
        }
        aut
    }
}

/// Return the intersection of `a` and `b`. See [`AdjacencyMatrixFA::intersect`].
pub fn intersect<S, T>(
    a: &AdjacencyMatrixFA<S>,
    b: &AdjacencyMatrixFA<T>,
) -> AdjacencyMatrixFA<(S, T)>
where
    S: Clone + Debug + Eq + Hash,
    T: Clone + Debug + Eq + Hash,
{
    a.intersect(b)
}
