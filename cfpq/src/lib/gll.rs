//! The GLL-based solver. RSM states are walked along graph paths by a worklist of
//! *descriptors*; calls into boxes are recorded in a graph-structured stack (GSS) so that each
//! box is entered at most once per graph node, however many callers it has.
//!
//! A GSS node `(B, v)` stands for "box `B` was called at graph node `v`". Its edges lead to the
//! callers, each labelled with the RSM state to resume the caller at. When `B` reaches a final
//! state at graph node `w`, `w` is added to the node's *pop set* and every caller is resumed at
//! `w`; callers that arrive later are resumed at everything already in the pop set.

use std::collections::BTreeSet;

use cfpqautomata::Symbol;
use cfpqgrammar::Rsm;
use fnv::{FnvHashMap, FnvHashSet};
use indexmap::IndexSet;
use tracing::debug;

use crate::{
    CfpqError, EmptySetPolicy,
    error::unknown_box,
    graph::{Graph, NodeId},
    query::resolve_node_sets,
};

/// Find all pairs `(s, f)` with `s` in `starts` and `f` in `finals` such that the labels of some
/// path from `s` to `f` in `graph` are accepted by `rsm`'s initial box. An empty `starts` (or
/// `finals`) means every node of the graph.
pub fn gll_based_cfpq(
    rsm: &Rsm,
    graph: &Graph,
    starts: &BTreeSet<NodeId>,
    finals: &BTreeSet<NodeId>,
) -> Result<BTreeSet<(NodeId, NodeId)>, CfpqError> {
    let (starts, finals) = resolve_node_sets(graph, starts, finals, EmptySetPolicy::AllNodes)?;
    solve(rsm, graph, &starts, &finals)
}

/// Index of an RSM state in [`RsmTable::states`].
type SIdx = usize;
/// Index of a box in [`RsmTable::box_starts`].
type BIdx = usize;
/// Index of a graph node (see [`Graph::node_idx`]).
type NIdx = usize;
/// Index of a node in [`Gss::nodes`].
type GIdx = usize;

/// The sentinel GSS node: the "caller" of the initial box.
const SENTINEL: GIdx = 0;
/// The return state on edges to the sentinel; never used as an RSM state.
const NO_RETURN: SIdx = usize::MAX;

/// The outgoing transitions of one RSM state.
#[derive(Default)]
struct RsmStateInfo {
    terms: FnvHashMap<String, Vec<SIdx>>,
    /// `(callee, return state)` pairs.
    calls: Vec<(BIdx, SIdx)>,
    is_final: bool,
}

/// The RSM flattened into dense indices: every state of every box, epsilon transitions removed.
struct RsmTable {
    states: Vec<RsmStateInfo>,
    box_starts: Vec<Vec<SIdx>>,
    initial: BIdx,
}

impl RsmTable {
    fn new(rsm: &Rsm) -> Result<Self, CfpqError> {
        let labels = rsm.iter_boxes().map(|b| b.label()).collect::<IndexSet<_>>();
        let auts = rsm
            .iter_boxes()
            .map(|b| b.automaton().remove_epsilons())
            .collect::<Vec<_>>();
        // The global index of each box's first state.
        let mut offs = Vec::with_capacity(auts.len());
        let mut len = 0;
        for aut in &auts {
            offs.push(len);
            len += aut.states_len();
        }

        let mut states = (0..len)
            .map(|_| RsmStateInfo::default())
            .collect::<Vec<_>>();
        let mut box_starts = Vec::with_capacity(auts.len());
        for (bidx, aut) in auts.iter().enumerate() {
            let sidxs = aut
                .states()
                .enumerate()
                .map(|(i, s)| (*s, offs[bidx] + i))
                .collect::<FnvHashMap<_, _>>();
            box_starts.push(aut.starts().map(|s| sidxs[s]).collect::<Vec<_>>());
            for s in aut.finals() {
                states[sidxs[s]].is_final = true;
            }
            for (from, sym, to) in aut.transitions() {
                let info = &mut states[sidxs[from]];
                match sym {
                    Symbol::Term(t) => info.terms.entry(t.clone()).or_default().push(sidxs[to]),
                    Symbol::Nonterm(n) => match labels.get_index_of(n.as_str()) {
                        Some(callee) => info.calls.push((callee, sidxs[to])),
                        None => return Err(unknown_box(n)),
                    },
                }
            }
        }
        let initial = match labels.get_index_of(rsm.initial_label()) {
            Some(i) => i,
            None => return Err(unknown_box(rsm.initial_label())),
        };
        Ok(RsmTable {
            states,
            box_starts,
            initial,
        })
    }
}

struct GssNode {
    node: NIdx,
    /// `(return state, caller)` pairs.
    edges: FnvHashSet<(SIdx, GIdx)>,
    pops: FnvHashSet<NIdx>,
}

/// The graph-structured stack: an arena of nodes, each canonical for its `(box, graph node)`.
struct Gss {
    nodes: Vec<GssNode>,
    index: FnvHashMap<(BIdx, NIdx), GIdx>,
}

impl Gss {
    fn new() -> Self {
        Gss {
            nodes: vec![GssNode {
                node: usize::MAX,
                edges: FnvHashSet::default(),
                pops: FnvHashSet::default(),
            }],
            index: FnvHashMap::default(),
        }
    }

    /// Return the node for a call of box `bidx` at graph node `nidx`, creating it if needed.
    fn get_or_add(&mut self, bidx: BIdx, nidx: NIdx) -> GIdx {
        let nodes = &mut self.nodes;
        *self.index.entry((bidx, nidx)).or_insert_with(|| {
            nodes.push(GssNode {
                node: nidx,
                edges: FnvHashSet::default(),
                pops: FnvHashSet::default(),
            });
            nodes.len() - 1
        })
    }
}

/// A unit of work: at GSS node `gss`, RSM state `state` has been reached at graph node `node`.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
struct Descriptor {
    gss: GIdx,
    state: SIdx,
    node: NIdx,
}

/// For each graph node, its outgoing edges grouped by label.
type LabelledEdges<'a> = Vec<FnvHashMap<&'a str, Vec<NIdx>>>;

fn labelled_edges(graph: &Graph) -> LabelledEdges<'_> {
    let mut edges = vec![FnvHashMap::<&str, Vec<NIdx>>::default(); graph.nodes_len()];
    for (from, label, to) in graph.edges() {
        // Both endpoints of every edge are nodes of the graph.
        let i = graph.node_idx(from).unwrap();
        let j = graph.node_idx(to).unwrap();
        edges[i].entry(label).or_default().push(j);
    }
    edges
}

struct Gll<'a> {
    rsm: &'a RsmTable,
    edges: &'a LabelledEdges<'a>,
    gss: Gss,
    todo: Vec<Descriptor>,
    seen: FnvHashSet<Descriptor>,
    /// `(start, final)` graph node index pairs of completed runs of the initial box.
    results: FnvHashSet<(NIdx, NIdx)>,
}

impl<'a> Gll<'a> {
    fn new(rsm: &'a RsmTable, edges: &'a LabelledEdges<'a>) -> Self {
        Gll {
            rsm,
            edges,
            gss: Gss::new(),
            todo: Vec::new(),
            seen: FnvHashSet::default(),
            results: FnvHashSet::default(),
        }
    }

    fn add(&mut self, gss: GIdx, state: SIdx, node: NIdx) {
        let d = Descriptor { gss, state, node };
        if self.seen.insert(d) {
            self.todo.push(d);
        }
    }

    /// Call the initial box at each of `starts`, with the sentinel as its caller.
    fn setup(&mut self, starts: impl Iterator<Item = NIdx>) {
        let rsm = self.rsm;
        for nidx in starts {
            let g = self.gss.get_or_add(rsm.initial, nidx);
            self.gss.nodes[g].edges.insert((NO_RETURN, SENTINEL));
            for &s in &rsm.box_starts[rsm.initial] {
                self.add(g, s, nidx);
            }
        }
    }

    fn run(&mut self) {
        while let Some(d) = self.todo.pop() {
            self.step_terms(d);
            self.step_calls(d);
            if self.rsm.states[d.state].is_final {
                self.pop(d.gss, d.node);
            }
        }
    }

    fn step_terms(&mut self, d: Descriptor) {
        let (rsm, edges) = (self.rsm, self.edges);
        for (label, targets) in &rsm.states[d.state].terms {
            let Some(nexts) = edges[d.node].get(label.as_str()) else {
                continue;
            };
            for &next in nexts {
                for &t in targets {
                    self.add(d.gss, t, next);
                }
            }
        }
    }

    fn step_calls(&mut self, d: Descriptor) {
        let rsm = self.rsm;
        for &(callee, ret) in &rsm.states[d.state].calls {
            let g = self.gss.get_or_add(callee, d.node);
            if self.gss.nodes[g].edges.insert((ret, d.gss)) {
                // The callee may already have returned: resume this caller at each such node.
                let pops = self.gss.nodes[g].pops.iter().cloned().collect::<Vec<_>>();
                for w in pops {
                    self.add(d.gss, ret, w);
                }
            }
            for &s in &rsm.box_starts[callee] {
                self.add(g, s, d.node);
            }
        }
    }

    fn pop(&mut self, g: GIdx, w: NIdx) {
        if !self.gss.nodes[g].pops.insert(w) {
            return;
        }
        let edges = self.gss.nodes[g].edges.iter().cloned().collect::<Vec<_>>();
        for (ret, caller) in edges {
            if caller == SENTINEL {
                self.results.insert((self.gss.nodes[g].node, w));
            } else {
                self.add(caller, ret, w);
            }
        }
    }
}

pub(crate) fn solve(
    rsm: &Rsm,
    graph: &Graph,
    starts: &BTreeSet<NodeId>,
    finals: &BTreeSet<NodeId>,
) -> Result<BTreeSet<(NodeId, NodeId)>, CfpqError> {
    let table = RsmTable::new(rsm)?;
    let edges = labelled_edges(graph);
    let mut gll = Gll::new(&table, &edges);
    gll.setup(starts.iter().filter_map(|s| graph.node_idx(*s)));
    gll.run();
    debug!(
        descriptors = gll.seen.len(),
        gss_nodes = gll.gss.nodes.len() - 1,
        results = gll.results.len(),
        "GLL CFPQ finished"
    );
    Ok(gll
        .results
        .iter()
        .map(|(i, j)| (graph.idx_node(*i), graph.idx_node(*j)))
        .filter(|(_, f)| finals.contains(f))
        .collect())
}

#[cfg(test)]
mod test {
    use std::collections::BTreeSet;

    use cfpqautomata::{Automaton, Symbol};
    use cfpqgrammar::{Rsm, RsmBox};

    use super::{Gll, RsmTable, gll_based_cfpq, labelled_edges};
    use crate::Graph;

    fn set(v: &[u32]) -> BTreeSet<u32> {
        v.iter().cloned().collect()
    }

    fn pairs(v: &[(u32, u32)]) -> BTreeSet<(u32, u32)> {
        v.iter().cloned().collect()
    }

    #[test]
    fn test_recursive() {
        let rsm = Rsm::from_text("S -> a S b | a b").unwrap();
        let g = Graph::from_edge_list("0 a 1\n1 a 2\n2 b 3\n3 b 4\n").unwrap();
        let res = gll_based_cfpq(&rsm, &g, &set(&[]), &set(&[])).unwrap();
        assert_eq!(res, pairs(&[(0, 4), (1, 3)]));
    }

    #[test]
    fn test_cycles() {
        // a^n b^n over a graph with an `a` cycle of length 2 and a `b` cycle of length 3:
        // exactly the n which are multiples of 6 return to node 0.
        let rsm = Rsm::from_text("S -> a S b | a b").unwrap();
        let g = Graph::from_edge_list("0 a 1\n1 a 0\n0 b 2\n2 b 3\n3 b 0\n").unwrap();
        let res = gll_based_cfpq(&rsm, &g, &set(&[0]), &set(&[0])).unwrap();
        assert_eq!(res, pairs(&[(0, 0)]));
    }

    #[test]
    fn test_left_recursion() {
        let rsm = Rsm::from_text("S -> S a | a").unwrap();
        let g = Graph::from_edge_list("0 a 1\n1 a 2\n2 a 0\n").unwrap();
        let res = gll_based_cfpq(&rsm, &g, &set(&[0]), &set(&[])).unwrap();
        assert_eq!(res, pairs(&[(0, 0), (0, 1), (0, 2)]));
    }

    #[test]
    fn test_late_caller_replays_pops() {
        // B is called at node 1 by both S paths; whichever arrives second must be resumed from
        // B's pop set.
        let rsm = Rsm::from_text("S -> a B c | d B e\nB -> b").unwrap();
        let g = Graph::from_edge_list("0 a 1\n0 d 1\n1 b 2\n2 c 3\n2 e 4\n").unwrap();
        let res = gll_based_cfpq(&rsm, &g, &set(&[0]), &set(&[])).unwrap();
        assert_eq!(res, pairs(&[(0, 3), (0, 4)]));
    }

    #[test]
    fn test_several_start_states() {
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
        let res = gll_based_cfpq(&rsm, &g, &set(&[]), &set(&[])).unwrap();
        assert_eq!(res, pairs(&[(0, 1), (1, 2)]));
    }

    #[test]
    fn test_epsilon_box() {
        let mut aut = Automaton::new();
        aut.add_state(0);
        aut.add_state(1);
        aut.add_start(0);
        aut.add_final(1);
        aut.add_epsilon(0, 1);
        let rsm = Rsm::new("S", [RsmBox::new("S", aut)]).unwrap();
        let g = Graph::from_edge_list("0 a 1\n").unwrap();
        let res = gll_based_cfpq(&rsm, &g, &set(&[]), &set(&[])).unwrap();
        assert_eq!(res, pairs(&[(0, 0), (1, 1)]));
    }

    #[test]
    fn test_gss_shares_calls() {
        // Two callers of B at node 0 share one GSS node.
        let rsm = Rsm::from_text("S -> B a | B b\nB -> c").unwrap();
        let g = Graph::from_edge_list("0 c 1\n1 a 2\n1 b 3\n").unwrap();
        let table = RsmTable::new(&rsm).unwrap();
        let edges = labelled_edges(&g);
        let mut gll = Gll::new(&table, &edges);
        gll.setup([0].into_iter());
        gll.run();
        // The sentinel, S at 0, B at 0.
        assert_eq!(gll.gss.nodes.len(), 3);
        assert_eq!(gll.results.len(), 2);
    }
}
