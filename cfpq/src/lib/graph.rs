use std::{collections::BTreeSet, error::Error, fmt, str::FromStr};

use cfpqautomata::{Automaton, Symbol};
use cfpqgrammar::Span;
use indexmap::IndexSet;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Graph nodes are identified by integers.
pub type NodeId = u32;

/// The various different possible edge-list errors.
#[derive(Debug, PartialEq, Eq)]
pub enum GraphErrorKind {
    /// A node id which isn't a non-negative integer that fits in a [`NodeId`].
    IllegalNodeId,
    /// A line with other than one (a lone node) or three (`from label to`) fields.
    MalformedEdge,
}

/// Any error from parsing an edge list returns an instance of this struct.
#[derive(Debug, PartialEq, Eq)]
pub struct GraphError {
    pub kind: GraphErrorKind,
    pub span: Span,
}

impl Error for GraphError {}

impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self.kind {
            GraphErrorKind::IllegalNodeId => "Illegal node id",
            GraphErrorKind::MalformedEdge => "Expected 'from label to' or a lone node id",
        };
        write!(f, "{}", s)
    }
}

/// A directed multigraph whose edges are labelled with terminals. Nodes and edges are kept in
/// insertion order; the position of a node in that order is its *index*, which is how the
/// solvers number it.
///
/// Edge lists are written one edge per line, `from label to`, with `#` starting a comment. A
/// line holding a single node id adds that node without any edges:
///
/// ```text
///   0 a 1
///   1 b 2   # second edge
///   7
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Graph {
    nodes: IndexSet<NodeId>,
    edges: IndexSet<(NodeId, String, NodeId)>,
}

impl Graph {
    pub fn new() -> Self {
        Graph::default()
    }

    /// Parse an edge list.
    pub fn from_edge_list(src: &str) -> Result<Self, GraphError> {
        let mut g = Graph::new();
        let mut off = 0;
        for line in src.split_inclusive('\n') {
            let body = match line.find('#') {
                Some(i) => &line[..i],
                None => line,
            };
            let fields = fields(body, off);
            match fields.as_slice() {
                [] => (),
                [n] => {
                    g.add_node(node_id(*n)?);
                }
                [from, (_, label), to] => {
                    let from = node_id(*from)?;
                    let to = node_id(*to)?;
                    g.add_edge(from, label, to);
                }
                _ => {
                    let start = fields[0].0;
                    let (last_off, last) = fields[fields.len() - 1];
                    return Err(GraphError {
                        kind: GraphErrorKind::MalformedEdge,
                        span: Span::new(start, last_off + last.len()),
                    });
                }
            }
            off += line.len();
        }
        Ok(g)
    }

    /// Add node `n`, returning `true` if it wasn't already present.
    pub fn add_node(&mut self, n: NodeId) -> bool {
        self.nodes.insert(n)
    }

    /// Add the edge `from --label--> to`, adding its endpoints if necessary. Returns `true` if
    /// the edge wasn't already present.
    ///
    /// Any label is accepted, but only labels that are non-empty and free of whitespace and `#`
    /// survive being written out with `Display` and read back with
    /// [`from_edge_list`](Graph::from_edge_list).
    pub fn add_edge(&mut self, from: NodeId, label: &str, to: NodeId) -> bool {
        self.nodes.insert(from);
        self.nodes.insert(to);
        self.edges.insert((from, label.to_owned(), to))
    }

    /// Remove the edge `from --label--> to`, returning `true` if it was present. The endpoints
    /// are left in the graph.
    pub fn remove_edge(&mut self, from: NodeId, label: &str, to: NodeId) -> bool {
        self.edges.shift_remove(&(from, label.to_owned(), to))
    }

    /// Remove node `n` and every edge incident to it, returning `true` if it was present.
    pub fn remove_node(&mut self, n: NodeId) -> bool {
        if !self.nodes.shift_remove(&n) {
            return false;
        }
        self.edges.retain(|(from, _, to)| *from != n && *to != n);
        true
    }

    pub fn nodes_len(&self) -> usize {
        self.nodes.len()
    }

    pub fn edges_len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterate over the nodes in index order.
    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.iter().cloned()
    }

    /// Iterate over the edges as `(from, label, to)` triples.
    pub fn edges(&self) -> impl Iterator<Item = (NodeId, &str, NodeId)> {
        self.edges.iter().map(|(f, l, t)| (*f, l.as_str(), *t))
    }

    pub fn contains_node(&self, n: NodeId) -> bool {
        self.nodes.contains(&n)
    }

    /// The index of node `n`, if it is in the graph.
    pub fn node_idx(&self, n: NodeId) -> Option<usize> {
        self.nodes.get_index_of(&n)
    }

    /// The node at index `idx`. Panics if `idx` is out of bounds.
    pub fn idx_node(&self, idx: usize) -> NodeId {
        self.nodes[idx]
    }

    /// The distinct edge labels, in order of first use.
    pub fn labels(&self) -> IndexSet<&str> {
        self.edges.iter().map(|(_, l, _)| l.as_str()).collect()
    }

    /// View the graph as an automaton: one state per node (in index order), a `Term(label)`
    /// transition per edge, and the given start and final states. Nodes in `starts` or `finals`
    /// that aren't in the graph are ignored.
    pub fn to_automaton(
        &self,
        starts: &BTreeSet<NodeId>,
        finals: &BTreeSet<NodeId>,
    ) -> Automaton<NodeId> {
        let mut aut = Automaton::new();
        for n in &self.nodes {
            aut.add_state(*n);
        }
        for n in starts.iter().filter(|n| self.nodes.contains(*n)) {
            aut.add_start(*n);
        }
        for n in finals.iter().filter(|n| self.nodes.contains(*n)) {
            aut.add_final(*n);
        }
        for (from, label, to) in &self.edges {
            aut.add_transition(*from, Symbol::term(label), *to);
        }
        aut
    }
}

impl FromStr for Graph {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Graph::from_edge_list(s)
    }
}

/// Writes the graph as an edge list: one `from label to` line per edge, in insertion order,
/// followed by a line for each node without edges. See [`Graph::add_edge`] for which labels can be
/// read back.
impl fmt::Display for Graph {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut connected = BTreeSet::new();
        for (from, label, to) in &self.edges {
            writeln!(f, "{} {} {}", from, label, to)?;
            connected.insert(*from);
            connected.insert(*to);
        }
        for n in self.nodes.iter().filter(|n| !connected.contains(*n)) {
            writeln!(f, "{}", n)?;
        }
        Ok(())
    }
}

/// Split `s` on whitespace, returning each field with its byte offset (plus `off`).
fn fields(s: &str, off: usize) -> Vec<(usize, &str)> {
    let mut v = Vec::new();
    let mut start = None;
    for (i, c) in s.char_indices() {
        match (c.is_whitespace(), start) {
            (true, Some(j)) => {
                v.push((off + j, &s[j..i]));
                start = None;
            }
            (false, None) => start = Some(i),
            _ => (),
        }
    }
    if let Some(j) = start {
        v.push((off + j, &s[j..]));
    }
    v
}

fn node_id((off, s): (usize, &str)) -> Result<NodeId, GraphError> {
    s.parse::<NodeId>().map_err(|_| GraphError {
        kind: GraphErrorKind::IllegalNodeId,
        span: Span::new(off, off + s.len()),
    })
}
