//! The tensor-based solver. The RSM and the graph are both viewed as automata; the transitive
//! closure of their product (a Kronecker product of adjacency matrices) shows which graph paths
//! a box accepts. Each such path is recorded as a `Nonterm(box)` edge in the graph automaton,
//! which in turn lets paths through boxes that call that box be found, until no edge is added.
//!
//! Regular path queries need no boxes, so a single product and closure answers them.

use std::collections::BTreeSet;

use cfpqautomata::{AdjacencyMatrixFA, StIdx, Symbol};
use cfpqgrammar::{Regex, Rsm};
use tracing::{debug, trace};
use vob::Vob;

use crate::{
    CfpqError, EmptySetPolicy,
    error::unknown_box,
    graph::{Graph, NodeId},
    query::resolve_node_sets,
};

/// Find all pairs `(s, f)` with `s` in `starts` and `f` in `finals` such that the labels of some
/// path from `s` to `f` in `graph` are accepted by `rsm`'s initial box. An empty `starts` (or
/// `finals`) means every node of the graph.
pub fn tensor_based_cfpq(
    rsm: &Rsm,
    graph: &Graph,
    starts: &BTreeSet<NodeId>,
    finals: &BTreeSet<NodeId>,
) -> Result<BTreeSet<(NodeId, NodeId)>, CfpqError> {
    let (starts, finals) = resolve_node_sets(graph, starts, finals, EmptySetPolicy::AllNodes)?;
    solve(rsm, graph, &starts, &finals)
}

/// Find all pairs `(s, f)` with `s` in `starts` and `f` in `finals` such that the labels of some
/// path from `s` to `f` in `graph` spell a word of `re`. An empty `starts` (or `finals`) means
/// every node of the graph. `re` may not contain variables.
pub fn tensor_based_rpq(
    re: &Regex,
    graph: &Graph,
    starts: &BTreeSet<NodeId>,
    finals: &BTreeSet<NodeId>,
) -> Result<BTreeSet<(NodeId, NodeId)>, CfpqError> {
    let (starts, finals) = resolve_node_sets(graph, starts, finals, EmptySetPolicy::AllNodes)?;
    rpq(re, graph, &starts, &finals)
}

/// As [`tensor_based_rpq`] but with `starts` and `finals` already resolved.
pub(crate) fn rpq(
    re: &Regex,
    graph: &Graph,
    starts: &BTreeSet<NodeId>,
    finals: &BTreeSet<NodeId>,
) -> Result<BTreeSet<(NodeId, NodeId)>, CfpqError> {
    if let Some(v) = re.vars().first() {
        return Err(unknown_box(v));
    }
    let re_fa = AdjacencyMatrixFA::new(&re.to_automaton()?)?;
    let graph_fa = AdjacencyMatrixFA::new(&graph.to_automaton(starts, finals))?;
    let product = graph_fa.intersect(&re_fa);
    let closure = product.transitive_closure();
    debug!(
        regex_states = re_fa.states_len(),
        product_states = product.states_len(),
        reachable = closure.nnz(),
        "Tensor RPQ closure"
    );

    // The product state (graph node `g`, regex state `r`) has index `g * re_len + r`.
    let re_len = re_fa.states_len();
    let mut res = BTreeSet::new();
    for (i, j) in closure.iter_nonzero() {
        let (gi, ri) = (i / re_len, i % re_len);
        let (gj, rj) = (j / re_len, j % re_len);
        if !re_fa.is_start(StIdx::from(ri)) || !re_fa.is_final(StIdx::from(rj)) {
            continue;
        }
        let (s, f) = (graph.idx_node(gi), graph.idx_node(gj));
        if starts.contains(&s) && finals.contains(&f) {
            res.insert((s, f));
        }
    }
    Ok(res)
}

pub(crate) fn solve(
    rsm: &Rsm,
    graph: &Graph,
    starts: &BTreeSet<NodeId>,
    finals: &BTreeSet<NodeId>,
) -> Result<BTreeSet<(NodeId, NodeId)>, CfpqError> {
    let rsm_fa = AdjacencyMatrixFA::new(&rsm.to_automaton())?;
    let mut graph_fa = AdjacencyMatrixFA::new(&graph.to_automaton(starts, finals))?;
    let box_syms = rsm
        .iter_boxes()
        .map(|b| Symbol::nonterm(b.label()))
        .collect::<Vec<_>>();
    for sym in &box_syms {
        graph_fa.ensure_symbol(sym.clone());
    }

    // For each RSM state index, the position of its box in `box_syms`.
    let mut box_of = Vec::with_capacity(rsm_fa.states_len());
    for stidx in rsm_fa.iter_stidxs() {
        let label = &rsm_fa.idx_state(stidx).box_label;
        match box_syms.iter().position(|s| s.name() == label.as_str()) {
            Some(i) => box_of.push(i),
            None => return Err(unknown_box(label)),
        }
    }
    let mut box_starts = Vob::from_elem(false, rsm_fa.states_len());
    for stidx in rsm_fa.iter_starts() {
        box_starts.set(usize::from(stidx), true);
    }
    let mut box_finals = Vob::from_elem(false, rsm_fa.states_len());
    for stidx in rsm_fa.iter_finals() {
        box_finals.set(usize::from(stidx), true);
    }

    let graph_len = graph_fa.states_len();
    let mut nnz = graph_fa.nnz();
    let mut passes = 0;
    loop {
        passes += 1;
        let closure = rsm_fa.intersect(&graph_fa).transitive_closure();
        for (i, j) in closure.iter_nonzero() {
            let (ri, gi) = (i / graph_len, i % graph_len);
            let (rj, gj) = (j / graph_len, j % graph_len);
            if !box_starts[ri] || !box_finals[rj] || box_of[ri] != box_of[rj] {
                continue;
            }
            let sym = &box_syms[box_of[ri]];
            if graph_fa.add_transition(StIdx::from(gi), sym, StIdx::from(gj)) {
                trace!(
                    from = graph.idx_node(gi),
                    to = graph.idx_node(gj),
                    sym = %sym,
                    "Inlined box edge"
                );
            }
        }
        let new_nnz = graph_fa.nnz();
        debug!(pass = passes, nnz = new_nnz, "Tensor CFPQ pass");
        if new_nnz == nnz {
            break;
        }
        nnz = new_nnz;
    }
    debug!(
        passes,
        rsm_states = rsm_fa.states_len(),
        nodes = graph_len,
        "Tensor CFPQ reached a fixpoint"
    );

    let initial = Symbol::nonterm(rsm.initial_label());
    let Some(m) = graph_fa.matrix(&initial) else {
        return Ok(BTreeSet::new());
    };
    let mut res = BTreeSet::new();
    for s in starts {
        let Some(i) = graph.node_idx(*s) else {
            continue;
        };
        for f in finals {
            if let Some(j) = graph.node_idx(*f) {
                if m.get(i, j) {
                    res.insert((*s, *f));
                }
            }
        }
    }
    Ok(res)
}

#[cfg(test)]
mod test {
    use std::collections::BTreeSet;

    use cfpqautomata::{Automaton, Symbol};
    use cfpqgrammar::{Regex, Rsm, RsmBox, RsmErrorKind};
    use indexmap::IndexMap;

    use super::{tensor_based_cfpq, tensor_based_rpq};
    use crate::{CfpqError, Graph};

    fn set(v: &[u32]) -> BTreeSet<u32> {
        v.iter().cloned().collect()
    }

    fn pairs(v: &[(u32, u32)]) -> BTreeSet<(u32, u32)> {
        v.iter().cloned().collect()
    }

    #[test]
    fn test_regular() {
        let rsm = Rsm::from_text("S -> a b*").unwrap();
        let g = Graph::from_edge_list("0 a 1\n1 b 2\n2 b 1\n3 b 0\n").unwrap();
        let res = tensor_based_cfpq(&rsm, &g, &set(&[]), &set(&[])).unwrap();
        assert_eq!(res, pairs(&[(0, 1), (0, 2)]));
    }

    #[test]
    fn test_recursive() {
        let rsm = Rsm::from_text("S -> a S b | a b").unwrap();
        let g = Graph::from_edge_list("0 a 1\n1 a 2\n2 b 3\n3 b 4\n").unwrap();
        let res = tensor_based_cfpq(&rsm, &g, &set(&[]), &set(&[])).unwrap();
        assert_eq!(res, pairs(&[(0, 4), (1, 3)]));
    }

    #[test]
    fn test_mutual_recursion() {
        // S and B call each other; S accepts a^n c b^n.
        let rsm = Rsm::from_text("S -> a B | c\nB -> S b").unwrap();
        let g = Graph::from_edge_list("0 a 1\n1 a 2\n2 c 3\n3 b 4\n4 b 5\n").unwrap();
        let res = tensor_based_cfpq(&rsm, &g, &set(&[0, 1, 2]), &set(&[])).unwrap();
        assert_eq!(res, pairs(&[(0, 5), (1, 4), (2, 3)]));
    }

    #[test]
    fn test_several_start_states() {
        // A box with two start states: one reads `a`, the other `b`.
        let mut aut = Automaton::new();
        for s in 0..3 {
            aut.add_state(s);
        }
        aut.add_start(0);
        aut.add_start(1);
        aut.add_final(2);
        aut.add_transition(0, Symbol::term("a"), 2);
        aut.add_transition(1, Symbol::term("b"), 2);
        let rsm = Rsm::new("S", [RsmBox::new("S", aut)]).unwrap();
        let g = Graph::from_edge_list("0 a 1\n1 b 2\n").unwrap();
        let res = tensor_based_cfpq(&rsm, &g, &set(&[]), &set(&[])).unwrap();
        assert_eq!(res, pairs(&[(0, 1), (1, 2)]));
    }

    #[test]
    fn test_nullable_box() {
        let rsm = Rsm::from_text("S -> a S b | $").unwrap();
        let g = Graph::from_edge_list("0 a 1\n1 b 2\n").unwrap();
        let res = tensor_based_cfpq(&rsm, &g, &set(&[0]), &set(&[])).unwrap();
        assert_eq!(res, pairs(&[(0, 0), (0, 2)]));
    }

    #[test]
    fn test_rpq() {
        let g = Graph::from_edge_list("0 a 1\n1 b 2\n2 b 1\n3 b 0\n2 c 3\n").unwrap();
        let re = Regex::new("a b*").unwrap();
        let res = tensor_based_rpq(&re, &g, &set(&[]), &set(&[])).unwrap();
        assert_eq!(res, pairs(&[(0, 1), (0, 2)]));
        let res = tensor_based_rpq(&re, &g, &set(&[0]), &set(&[2, 42])).unwrap();
        assert_eq!(res, pairs(&[(0, 2)]));
        // The empty word connects every node to itself.
        let re = Regex::new("(b b)*").unwrap();
        let res = tensor_based_rpq(&re, &g, &set(&[1, 3]), &set(&[])).unwrap();
        assert_eq!(res, pairs(&[(1, 1), (3, 3)]));
    }

    #[test]
    fn test_rpq_agrees_with_box_fixpoint() {
        let g = Graph::from_edge_list("0 a 1\n1 b 2\n2 a 0\n2 c 2\n1 a 1\n").unwrap();
        for src in ["a b", "(a | b)* c", "a+ & a a", "a^[1..2] b?", "(a b a)*", "c^[2..]"] {
            let re = Regex::new(src).unwrap();
            let rsm = Rsm::from_regex(&re, &IndexMap::new()).unwrap();
            assert_eq!(
                tensor_based_rpq(&re, &g, &set(&[]), &set(&[])).unwrap(),
                tensor_based_cfpq(&rsm, &g, &set(&[]), &set(&[])).unwrap(),
                "{}",
                src
            );
        }
    }

    #[test]
    fn test_rpq_rejects_variables() {
        let g = Graph::from_edge_list("0 a 1\n").unwrap();
        match tensor_based_rpq(&Regex::new("a S").unwrap(), &g, &set(&[]), &set(&[])) {
            Err(CfpqError::Rsm(e)) => {
                assert_eq!(e.kind, RsmErrorKind::UnknownBoxReference("S".to_owned()))
            }
            r => panic!("{:?}", r),
        }
    }
}
