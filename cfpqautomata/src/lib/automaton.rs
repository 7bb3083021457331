use std::{error::Error, fmt, fmt::Debug, hash::Hash};

use indexmap::IndexSet;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{AdjacencyMatrixFA, Symbol};

/// The various ways in which an automaton can be malformed.
#[derive(Debug, PartialEq, Eq)]
pub enum AutomatonErrorKind {
    /// A transition (labelled or epsilon) has an endpoint which is not a declared state.
    MalformedTransition,
    UnknownStartState,
    UnknownFinalState,
}

/// Any error from validating an automaton returns an instance of this struct. `state` is the
/// `Debug` rendering of the offending state.
#[derive(Debug, PartialEq, Eq)]
pub struct AutomatonError {
    pub kind: AutomatonErrorKind,
    pub state: String,
}

impl Error for AutomatonError {}

impl fmt::Display for AutomatonError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self.kind {
            AutomatonErrorKind::MalformedTransition => "transition references unknown state",
            AutomatonErrorKind::UnknownStartState => "unknown start state",
            AutomatonErrorKind::UnknownFinalState => "unknown final state",
        };
        write!(f, "Malformed automaton: {} {}", s, self.state)
    }
}

/// A (possibly nondeterministic) finite automaton over [`Symbol`]s with states of type `S`.
///
/// States are kept in insertion order, which is the order in which
/// [`AdjacencyMatrixFA`](../adjacency/struct.AdjacencyMatrixFA.html) numbers them. Adding a
/// transition, start or final state does *not* implicitly add the state: an automaton which
/// references undeclared states is malformed, and is rejected by [`Automaton::validate`].
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(bound(
        serialize = "S: Serialize + Eq + Hash",
        deserialize = "S: Deserialize<'de> + Eq + Hash"
    ))
)]
pub struct Automaton<S: Eq + Hash> {
    states: IndexSet<S>,
    starts: IndexSet<S>,
    finals: IndexSet<S>,
    transitions: IndexSet<(S, Symbol, S)>,
    epsilons: IndexSet<(S, S)>,
}

impl<S: Clone + Debug + Eq + Hash> Automaton<S> {
    /// Create an automaton with no states (which accepts the empty language).
    pub fn new() -> Self {
        Automaton {
            states: IndexSet::new(),
            starts: IndexSet::new(),
            finals: IndexSet::new(),
            transitions: IndexSet::new(),
            epsilons: IndexSet::new(),
        }
    }

    /// Add state `s`. Returns true if `s` was not already a state.
    pub fn add_state(&mut self, s: S) -> bool {
        self.states.insert(s)
    }

    pub fn add_start(&mut self, s: S) {
        self.starts.insert(s);
    }

    pub fn add_final(&mut self, s: S) {
        self.finals.insert(s);
    }

    /// Add a transition `from --sym--> to`. Duplicate transitions are ignored.
    pub fn add_transition(&mut self, from: S, sym: Symbol, to: S) {
        self.transitions.insert((from, sym, to));
    }

    /// Add an epsilon transition `from --> to`.
    pub fn add_epsilon(&mut self, from: S, to: S) {
        self.epsilons.insert((from, to));
    }

    pub fn states_len(&self) -> usize {
        self.states.len()
    }

    /// Iterate over the states in insertion order.
    pub fn states(&self) -> impl Iterator<Item = &S> {
        self.states.iter()
    }

    pub fn starts(&self) -> impl Iterator<Item = &S> {
        self.starts.iter()
    }

    pub fn finals(&self) -> impl Iterator<Item = &S> {
        self.finals.iter()
    }

    pub fn transitions(&self) -> impl Iterator<Item = &(S, Symbol, S)> {
        self.transitions.iter()
    }

    pub fn epsilons(&self) -> impl Iterator<Item = &(S, S)> {
        self.epsilons.iter()
    }

    pub fn contains_state(&self, s: &S) -> bool {
        self.states.contains(s)
    }

    pub fn is_start(&self, s: &S) -> bool {
        self.starts.contains(s)
    }

    pub fn is_final(&self, s: &S) -> bool {
        self.finals.contains(s)
    }

    /// The symbols used by this automaton's transitions, in order of first use.
    pub fn symbols(&self) -> IndexSet<Symbol> {
        self.transitions.iter().map(|(_, sym, _)| sym.clone()).collect()
    }

    /// Check that every transition endpoint, start state and final state is a declared state.
    pub fn validate(&self) -> Result<(), AutomatonError> {
        let unknown = |kind, s: &S| AutomatonError {
            kind,
            state: format!("{:?}", s),
        };
        for (from, _, to) in &self.transitions {
            for s in [from, to] {
                if !self.states.contains(s) {
                    return Err(unknown(AutomatonErrorKind::MalformedTransition, s));
                }
            }
        }
        for (from, to) in &self.epsilons {
            for s in [from, to] {
                if !self.states.contains(s) {
                    return Err(unknown(AutomatonErrorKind::MalformedTransition, s));
                }
            }
        }
        if let Some(s) = self.starts.iter().find(|s| !self.states.contains(*s)) {
            return Err(unknown(AutomatonErrorKind::UnknownStartState, s));
        }
        if let Some(s) = self.finals.iter().find(|s| !self.states.contains(*s)) {
            return Err(unknown(AutomatonErrorKind::UnknownFinalState, s));
        }
        Ok(())
    }

    /// Is this automaton deterministic? That is: at most one start state, no epsilon
    /// transitions, and no state with two transitions on the same symbol.
    pub fn is_deterministic(&self) -> bool {
        if self.starts.len() > 1 || !self.epsilons.is_empty() {
            return false;
        }
        let mut seen = IndexSet::with_capacity(self.transitions.len());
        self.transitions
            .iter()
            .all(|(from, sym, _)| seen.insert((from, sym)))
    }

    /// Does this automaton accept `word`? A malformed automaton accepts nothing.
    pub fn accepts(&self, word: &[Symbol]) -> bool {
        match AdjacencyMatrixFA::new(self) {
            Ok(fa) => fa.accepts(word),
            Err(_) => false,
        }
    }

    /// Return an equivalent automaton with no epsilon transitions. The states and start states
    /// are unchanged; a state `p` gains a transition `p --a--> r` for every `q` in the epsilon
    /// closure of `p` with `q --a--> r`, and becomes final if its epsilon closure contains a final
    /// state.
    ///
    /// # Panics
    ///
    /// If an epsilon transition references an undeclared state (see [`Automaton::validate`]).
    pub fn remove_epsilons(&self) -> Automaton<S> {
        if self.epsilons.is_empty() {
            return self.clone();
        }
        let idx = |s: &S| match self.states.get_index_of(s) {
            Some(i) => i,
            None => panic!("Epsilon transition references unknown state {:?}", s),
        };
        let mut eps_succs = vec![Vec::new(); self.states.len()];
        for (from, to) in &self.epsilons {
            eps_succs[idx(from)].push(idx(to));
        }
        let mut out_trans = vec![Vec::new(); self.states.len()];
        for (i, (from, _, _)) in self.transitions.iter().enumerate() {
            if let Some(j) = self.states.get_index_of(from) {
                out_trans[j].push(i);
            }
        }

        let mut aut = Automaton {
            states: self.states.clone(),
            starts: self.starts.clone(),
            finals: self.finals.clone(),
            transitions: IndexSet::new(),
            epsilons: IndexSet::new(),
        };
        let mut seen = vec![false; self.states.len()];
        let mut todo = Vec::new();
        for (p, ps) in self.states.iter().enumerate() {
            seen.iter_mut().for_each(|x| *x = false);
            seen[p] = true;
            todo.push(p);
            while let Some(q) = todo.pop() {
                let qs = &self.states[q];
                if self.finals.contains(qs) {
                    aut.finals.insert(ps.clone());
                }
                for &t in &out_trans[q] {
                    let (_, sym, to) = &self.transitions[t];
                    aut.transitions
                        .insert((ps.clone(), sym.clone(), to.clone()));
                }
                for &r in &eps_succs[q] {
                    if !seen[r] {
                        seen[r] = true;
                        todo.push(r);
                    }
                }
            }
        }
        aut
    }

    /// Return an equivalent automaton containing only the start states and those states which
    /// are both reachable from a start state and can reach a final state. Epsilon transitions
    /// count as edges for both purposes.
    pub fn trim(&self) -> Automaton<S> {
        let n = self.states.len();
        let idx = |s: &S| self.states.get_index_of(s);
        let mut succs = vec![Vec::new(); n];
        let mut preds = vec![Vec::new(); n];
        let edges = self
            .transitions
            .iter()
            .map(|(f, _, t)| (f, t))
            .chain(self.epsilons.iter().map(|(f, t)| (f, t)));
        for (f, t) in edges {
            if let (Some(i), Some(j)) = (idx(f), idx(t)) {
                succs[i].push(j);
                preds[j].push(i);
            }
        }
        let flood = |seeds: &IndexSet<S>, adj: &[Vec<usize>]| {
            let mut seen = vec![false; n];
            let mut todo = seeds.iter().filter_map(idx).collect::<Vec<_>>();
            for &i in &todo {
                seen[i] = true;
            }
            while let Some(i) = todo.pop() {
                for &j in &adj[i] {
                    if !seen[j] {
                        seen[j] = true;
                        todo.push(j);
                    }
                }
            }
            seen
        };
        let reachable = flood(&self.starts, &succs);
        let coreachable = flood(&self.finals, &preds);
        let keep = |s: &S| match idx(s) {
            Some(i) => (reachable[i] && coreachable[i]) || self.starts.contains(s),
            None => false,
        };

        let mut aut = Automaton::new();
        for s in self.states.iter().filter(|&s| keep(s)) {
            aut.add_state(s.clone());
        }
        for s in self.starts.iter().filter(|&s| keep(s)) {
            aut.add_start(s.clone());
        }
        for s in self.finals.iter().filter(|&s| keep(s)) {
            aut.add_final(s.clone());
        }
        for (f, sym, t) in &self.transitions {
            if keep(f) && keep(t) {
                aut.add_transition(f.clone(), sym.clone(), t.clone());
            }
        }
        for (f, t) in &self.epsilons {
            if keep(f) && keep(t) {
                aut.add_epsilon(f.clone(), t.clone());
            }
        }
        aut
    }

    /// Return a copy of this automaton with every state renamed by `f`. `f` must be injective
    /// over this automaton's states, otherwise distinct states are merged.
    pub fn map_states<T, F>(&self, mut f: F) -> Automaton<T>
    where
        T: Clone + Debug + Eq + Hash,
        F: FnMut(&S) -> T,
    {
        let mut aut = Automaton::new();
        for s in &self.states {
            aut.add_state(f(s));
        }
        for s in &self.starts {
            aut.add_start(f(s));
        }
        for s in &self.finals {
            aut.add_final(f(s));
        }
        for (from, sym, to) in &self.transitions {
            aut.add_transition(f(from), sym.clone(), f(to));
        }
        for (from, to) in &self.epsilons {
            aut.add_epsilon(f(from), f(to));
        }
        aut
    }
}
