//! The matrix-based solver. Each rule `A` of a grammar in weak normal form gets a boolean
//! matrix over the graph's nodes, in which `[i][j]` is set iff `A` derives the labels of some
//! path from node `i` to node `j`. The matrices are seeded from terminal and empty productions,
//! then `A |= B @ C` is applied for every production `A -> B C` until nothing changes.

use std::collections::BTreeSet;

use cfpqautomata::BoolMatrix;
use cfpqgrammar::{Cfg, RIdx, cfg::Symbol};
use tracing::debug;

use crate::{
    CfpqError, EmptySetPolicy,
    graph::{Graph, NodeId},
    query::resolve_node_sets,
};

/// Find all pairs `(s, f)` with `s` in `starts` and `f` in `finals` such that the start rule of
/// `grm` derives the labels of some path from `s` to `f` in `graph`. An empty `starts` (or
/// `finals`) means every node of the graph.
///
/// `grm` must be in weak normal form (see [`Cfg::to_weak_normal_form`]); any other production
/// is rejected with [`CfpqError::InvalidGrammarForm`].
pub fn matrix_based_cfpq(
    grm: &Cfg,
    graph: &Graph,
    starts: &BTreeSet<NodeId>,
    finals: &BTreeSet<NodeId>,
) -> Result<BTreeSet<(NodeId, NodeId)>, CfpqError> {
    let (starts, finals) = resolve_node_sets(graph, starts, finals, EmptySetPolicy::AllNodes)?;
    solve(grm, graph, &starts, &finals)
}

/// As [`matrix_based_cfpq`] but with `starts` and `finals` already resolved.
pub(crate) fn solve(
    grm: &Cfg,
    graph: &Graph,
    starts: &BTreeSet<NodeId>,
    finals: &BTreeSet<NodeId>,
) -> Result<BTreeSet<(NodeId, NodeId)>, CfpqError> {
    let fp = fixpoint(grm, graph)?;
    debug!(
        passes = fp.nnz_history.len() - 1,
        nnz = fp.nnz_history[fp.nnz_history.len() - 1],
        rules = grm.rules_len(),
        nodes = graph.nodes_len(),
        "Matrix CFPQ reached a fixpoint"
    );
    let start = &fp.matrices[usize::from(grm.start_rule_idx())];
    Ok(start
        .iter_nonzero()
        .map(|(i, j)| (graph.idx_node(i), graph.idx_node(j)))
        .filter(|(s, f)| starts.contains(s) && finals.contains(f))
        .collect())
}

/// The result of running the solver to its fixpoint.
pub(crate) struct Fixpoint {
    /// One matrix per rule, indexed by `RIdx`.
    pub(crate) matrices: Vec<BoolMatrix>,
    /// The total number of set bits across all matrices after seeding and after each pass.
    pub(crate) nnz_history: Vec<usize>,
}

pub(crate) fn fixpoint(grm: &Cfg, graph: &Graph) -> Result<Fixpoint, CfpqError> {
    if let Err(pidx) = grm.check_weak_normal_form() {
        return Err(CfpqError::InvalidGrammarForm(grm.pp_prod(pidx)));
    }

    let n = graph.nodes_len();
    let mut matrices = vec![BoolMatrix::square(n); grm.rules_len()];
    // For each token, the rules with a production `A -> token`.
    let mut term_rules: Vec<Vec<RIdx>> = vec![Vec::new(); grm.tokens_len()];
    let mut binary = Vec::new();
    for pidx in grm.iter_pidxs() {
        let ridx = grm.prod_to_rule(pidx);
        match grm.prod(pidx) {
            [] => {
                matrices[usize::from(ridx)].set_diagonal();
            }
            [Symbol::Token(tidx)] => term_rules[usize::from(*tidx)].push(ridx),
            [Symbol::Rule(b), Symbol::Rule(c)] => binary.push((ridx, *b, *c)),
            _ => unreachable!(),
        }
    }
    for (from, label, to) in graph.edges() {
        let Some(tidx) = grm.token_idx(label) else {
            continue;
        };
        // Both endpoints of every edge are nodes of the graph.
        let i = graph.node_idx(from).unwrap();
        let j = graph.node_idx(to).unwrap();
        for ridx in &term_rules[usize::from(tidx)] {
            matrices[usize::from(*ridx)].set(i, j);
        }
    }

    let nnz = |ms: &[BoolMatrix]| ms.iter().map(|m| m.nnz()).sum::<usize>();
    let mut nnz_history = vec![nnz(&matrices)];
    loop {
        let mut changed = false;
        for &(a, b, c) in &binary {
            let prod = matrices[usize::from(b)].mul(&matrices[usize::from(c)]);
            if matrices[usize::from(a)].or_assign(&prod) {
                changed = true;
            }
        }
        nnz_history.push(nnz(&matrices));
        debug!(
            pass = nnz_history.len() - 1,
            nnz = nnz_history[nnz_history.len() - 1],
            "Matrix CFPQ pass"
        );
        if !changed {
            break;
        }
    }
    Ok(Fixpoint {
        matrices,
        nnz_history,
    })
}

#[cfg(test)]
mod test {
    use std::collections::BTreeSet;

    use cfpqgrammar::Cfg;

    use super::{fixpoint, matrix_based_cfpq};
    use crate::{CfpqError, Graph};

    fn set(v: &[u32]) -> BTreeSet<u32> {
        v.iter().cloned().collect()
    }

    fn pairs(v: &[(u32, u32)]) -> BTreeSet<(u32, u32)> {
        v.iter().cloned().collect()
    }

    #[test]
    fn test_anbn() {
        let grm = Cfg::new("S -> a S b | a b").unwrap().to_weak_normal_form();
        // A cycle of `a`s through 0 and a cycle of `b`s through 0.
        let g = Graph::from_edge_list("0 a 1\n1 a 0\n0 b 2\n2 b 0\n").unwrap();
        let res = matrix_based_cfpq(&grm, &g, &set(&[]), &set(&[])).unwrap();
        // a a b b loops around 0; a b goes from 1 to 2.
        assert_eq!(res, pairs(&[(0, 0), (1, 2)]));
        let res = matrix_based_cfpq(&grm, &g, &set(&[1]), &set(&[2])).unwrap();
        assert_eq!(res, pairs(&[(1, 2)]));
        let res = matrix_based_cfpq(&grm, &g, &set(&[1]), &set(&[0])).unwrap();
        assert!(res.is_empty());
    }

    #[test]
    fn test_nullable_diagonal() {
        let grm = Cfg::new("S -> a S b | $").unwrap().to_weak_normal_form();
        let g = Graph::from_edge_list("0 a 1\n1 b 2\n").unwrap();
        let res = matrix_based_cfpq(&grm, &g, &set(&[]), &set(&[])).unwrap();
        assert_eq!(res, pairs(&[(0, 0), (0, 2), (1, 1), (2, 2)]));
    }

    #[test]
    fn test_rejects_non_wnf() {
        let grm = Cfg::new("S -> a S b | $").unwrap();
        match matrix_based_cfpq(&grm, &Graph::new(), &set(&[]), &set(&[])) {
            Err(CfpqError::InvalidGrammarForm(p)) => assert_eq!(p, "S -> a S b"),
            r => panic!("{:?}", r),
        }
    }

    #[test]
    fn test_monotone() {
        let grm = Cfg::new("S -> a S b | S S | a b").unwrap().to_weak_normal_form();
        let g = Graph::from_edge_list("0 a 1\n1 a 2\n2 b 3\n3 b 4\n4 a 0\n3 a 1\n").unwrap();
        let fp = fixpoint(&grm, &g).unwrap();
        assert!(fp.nnz_history.len() >= 2);
        assert!(fp.nnz_history.windows(2).all(|w| w[0] <= w[1]));
        // The final pass changes nothing.
        let l = fp.nnz_history.len();
        assert_eq!(fp.nnz_history[l - 1], fp.nnz_history[l - 2]);
    }

    #[test]
    fn test_unknown_labels() {
        let grm = Cfg::new("S -> a").unwrap().to_weak_normal_form();
        let g = Graph::from_edge_list("0 b 1\n").unwrap();
        assert!(matrix_based_cfpq(&grm, &g, &set(&[]), &set(&[]))
            .unwrap()
            .is_empty());
    }
}
