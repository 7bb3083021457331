use std::{borrow::Cow, collections::BTreeSet};

use cfpqgrammar::{Cfg, Regex, Rsm};
use indexmap::IndexMap;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    CfpqError, gll,
    graph::{Graph, NodeId},
    matrix, tensor,
};

/// Which algorithm answers a query.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SolverKind {
    /// [`matrix_based_cfpq`](crate::matrix_based_cfpq) over the language's grammar in weak
    /// normal form.
    Matrix,
    /// [`tensor_based_cfpq`](crate::tensor_based_cfpq) over the language's RSM.
    Tensor,
    /// [`gll_based_cfpq`](crate::gll_based_cfpq) over the language's RSM.
    #[default]
    Gll,
}

/// What an empty start or final node set means.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum EmptySetPolicy {
    /// Every node of the graph.
    #[default]
    AllNodes,
    /// The query is rejected with [`CfpqError::EmptyQuery`].
    Reject,
}

/// Which part of the result pairs a query returns.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Projection {
    #[default]
    Pairs,
    /// The start node of each pair.
    Starts,
    /// The final node of each pair.
    Finals,
}

/// The language a query's paths must spell.
#[derive(Clone, Debug)]
pub enum Language {
    /// A regular expression whose variables name the expressions in `subs`.
    Regex {
        re: Regex,
        subs: IndexMap<String, Regex>,
    },
    Cfg(Cfg),
    Rsm(Rsm),
}

impl Language {
    /// A regular expression without variables.
    pub fn regex(re: Regex) -> Self {
        Language::Regex {
            re,
            subs: IndexMap::new(),
        }
    }

    /// This language as an RSM, the form the tensor and GLL solvers need.
    pub fn to_rsm(&self) -> Result<Cow<'_, Rsm>, CfpqError> {
        Ok(match self {
            Language::Regex { re, subs } => Cow::Owned(Rsm::from_regex(re, subs)?),
            Language::Cfg(grm) => Cow::Owned(Rsm::from_cfg(grm)),
            Language::Rsm(rsm) => Cow::Borrowed(rsm),
        })
    }

    /// This language as a grammar in weak normal form, the form the matrix solver needs.
    pub fn to_wnf_cfg(&self) -> Result<Cfg, CfpqError> {
        let grm = match self {
            Language::Regex { re, subs } => Rsm::from_regex(re, subs)?.to_cfg(),
            Language::Cfg(grm) if grm.is_weak_normal_form() => return Ok(grm.clone()),
            Language::Cfg(grm) => grm.clone(),
            Language::Rsm(rsm) => rsm.to_cfg(),
        };
        Ok(grm.to_weak_normal_form())
    }
}

impl From<Regex> for Language {
    fn from(re: Regex) -> Self {
        Language::regex(re)
    }
}

impl From<Cfg> for Language {
    fn from(grm: Cfg) -> Self {
        Language::Cfg(grm)
    }
}

impl From<Rsm> for Language {
    fn from(rsm: Rsm) -> Self {
        Language::Rsm(rsm)
    }
}

/// The answer to a [`Query`].
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum QueryResult {
    Pairs(BTreeSet<(NodeId, NodeId)>),
    Nodes(BTreeSet<NodeId>),
}

impl QueryResult {
    pub fn len(&self) -> usize {
        match self {
            QueryResult::Pairs(ps) => ps.len(),
            QueryResult::Nodes(ns) => ns.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A context-free path query: which pairs of nodes of `graph` are connected by a path whose
/// labels spell a word of `language`?
///
/// ```text
///   let res = Query::new(&lang, &graph)
///       .starts([0])
///       .solver(SolverKind::Tensor)
///       .projection(Projection::Finals)
///       .run()?;
/// ```
///
/// Neither the language nor the graph is changed by running a query, and running the same query
/// twice gives the same result.
pub struct Query<'a> {
    language: &'a Language,
    graph: &'a Graph,
    starts: BTreeSet<NodeId>,
    finals: BTreeSet<NodeId>,
    solver: SolverKind,
    policy: EmptySetPolicy,
    projection: Projection,
}

impl<'a> Query<'a> {
    pub fn new(language: &'a Language, graph: &'a Graph) -> Self {
        Query {
            language,
            graph,
            starts: BTreeSet::new(),
            finals: BTreeSet::new(),
            solver: SolverKind::default(),
            policy: EmptySetPolicy::default(),
            projection: Projection::default(),
        }
    }

    /// Restrict paths to those starting at `nodes`.
    pub fn starts<I: IntoIterator<Item = NodeId>>(mut self, nodes: I) -> Self {
        self.starts = nodes.into_iter().collect();
        self
    }

    /// Restrict paths to those ending at `nodes`.
    pub fn finals<I: IntoIterator<Item = NodeId>>(mut self, nodes: I) -> Self {
        self.finals = nodes.into_iter().collect();
        self
    }

    pub fn solver(mut self, solver: SolverKind) -> Self {
        self.solver = solver;
        self
    }

    pub fn empty_set_policy(mut self, policy: EmptySetPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn projection(mut self, projection: Projection) -> Self {
        self.projection = projection;
        self
    }

    pub fn run(&self) -> Result<QueryResult, CfpqError> {
        let (starts, finals) =
            resolve_node_sets(self.graph, &self.starts, &self.finals, self.policy)?;
        debug!(
            solver = ?self.solver,
            starts = starts.len(),
            finals = finals.len(),
            "Running query"
        );
        let pairs = match self.solver {
            SolverKind::Matrix => {
                matrix::solve(&self.language.to_wnf_cfg()?, self.graph, &starts, &finals)?
            }
            SolverKind::Tensor => match self.language {
                Language::Regex { re, subs } if subs.is_empty() => {
                    tensor::rpq(re, self.graph, &starts, &finals)?
                }
                _ => {
                    let rsm = self.language.to_rsm()?;
                    tensor::solve(&*rsm, self.graph, &starts, &finals)?
                }
            },
            SolverKind::Gll => {
                let rsm = self.language.to_rsm()?;
                gll::solve(&*rsm, self.graph, &starts, &finals)?
            }
        };
        Ok(match self.projection {
            Projection::Pairs => QueryResult::Pairs(pairs),
            Projection::Starts => QueryResult::Nodes(pairs.into_iter().map(|(s, _)| s).collect()),
            Projection::Finals => QueryResult::Nodes(pairs.into_iter().map(|(_, f)| f).collect()),
        })
    }
}

/// Resolve the start and final node sets of a query against `graph`. Nodes not in the graph are
/// dropped; an empty set is dealt with according to `policy`.
pub(crate) fn resolve_node_sets(
    graph: &Graph,
    starts: &BTreeSet<NodeId>,
    finals: &BTreeSet<NodeId>,
    policy: EmptySetPolicy,
) -> Result<(BTreeSet<NodeId>, BTreeSet<NodeId>), CfpqError> {
    if starts.is_empty() && finals.is_empty() && policy == EmptySetPolicy::AllNodes {
        warn!("No start or final nodes given: querying all pairs of nodes");
    }
    let resolve = |nodes: &BTreeSet<NodeId>| -> Result<BTreeSet<NodeId>, CfpqError> {
        if nodes.is_empty() {
            return match policy {
                EmptySetPolicy::AllNodes => Ok(graph.nodes().collect()),
                EmptySetPolicy::Reject => Err(CfpqError::EmptyQuery),
            };
        }
        let present = nodes
            .iter()
            .cloned()
            .filter(|n| graph.contains_node(*n))
            .collect::<BTreeSet<_>>();
        if present.len() < nodes.len() {
            debug!(
                ignored = nodes.len() - present.len(),
                "Ignoring query nodes not in the graph"
            );
        }
        Ok(present)
    };
    Ok((resolve(starts)?, resolve(finals)?))
}

#[cfg(test)]
mod test {
    use std::collections::BTreeSet;

    use cfpqgrammar::{Cfg, Regex, Rsm};
    use indexmap::IndexMap;

    use super::{EmptySetPolicy, Language, Projection, Query, QueryResult, SolverKind};
    use crate::{CfpqError, Graph};

    const SOLVERS: [SolverKind; 3] = [SolverKind::Matrix, SolverKind::Tensor, SolverKind::Gll];

    fn graph() -> Graph {
        Graph::from_edge_list("0 a 1\n1 a 2\n2 b 3\n3 b 4\n4 c 0\n").unwrap()
    }

    #[test]
    fn test_all_languages_all_solvers() {
        let g = graph();
        let langs = [
            Language::Cfg(Cfg::new("S -> a S b | a b").unwrap()),
            Language::Rsm(Rsm::from_text("S -> a S b | a b").unwrap()),
            Language::Regex {
                re: Regex::new("S").unwrap(),
                subs: [("S".to_owned(), Regex::new("a S b | a b").unwrap())]
                    .into_iter()
                    .collect::<IndexMap<_, _>>(),
            },
        ];
        for lang in &langs {
            for solver in SOLVERS {
                let res = Query::new(lang, &g).solver(solver).run().unwrap();
                assert_eq!(
                    res,
                    QueryResult::Pairs([(0, 4), (1, 3)].into_iter().collect()),
                    "{:?} {:?}",
                    lang,
                    solver
                );
            }
        }
    }

    #[test]
    fn test_run_matches_solvers() {
        let g = graph();
        let all = BTreeSet::new();
        let re = Regex::new("a* b+").unwrap();
        let grm = Cfg::new("S -> a S b | a b").unwrap();
        let re_rsm = Rsm::from_regex(&re, &IndexMap::new()).unwrap();
        let grm_rsm = Rsm::from_cfg(&grm);
        let cases = [
            (Language::regex(re), re_rsm),
            (Language::Cfg(grm), grm_rsm),
        ];
        for (lang, rsm) in &cases {
            let expect = crate::gll_based_cfpq(rsm, &g, &all, &all).unwrap();
            assert!(!expect.is_empty());
            for solver in [SolverKind::Tensor, SolverKind::Gll] {
                let res = Query::new(lang, &g).solver(solver).run().unwrap();
                assert_eq!(res, QueryResult::Pairs(expect.clone()));
            }
            assert_eq!(
                crate::tensor_based_cfpq(rsm, &g, &all, &all).unwrap(),
                expect
            );
        }
    }

    #[test]
    fn test_projection() {
        let g = graph();
        let lang = Language::regex(Regex::new("a+").unwrap());
        let q = Query::new(&lang, &g).starts([0, 1]);
        assert_eq!(
            q.run().unwrap(),
            QueryResult::Pairs([(0, 1), (0, 2), (1, 2)].into_iter().collect())
        );
        let starts = Query::new(&lang, &g).projection(Projection::Starts).run().unwrap();
        assert_eq!(starts, QueryResult::Nodes([0, 1].into_iter().collect()));
        let finals = Query::new(&lang, &g)
            .projection(Projection::Finals)
            .solver(SolverKind::Matrix)
            .run()
            .unwrap();
        assert_eq!(finals, QueryResult::Nodes([1, 2].into_iter().collect()));
    }

    #[test]
    fn test_empty_set_policy() {
        let g = graph();
        let lang = Language::regex(Regex::new("c").unwrap());
        for solver in SOLVERS {
            let res = Query::new(&lang, &g).solver(solver).run().unwrap();
            assert_eq!(res, QueryResult::Pairs([(4, 0)].into_iter().collect()));
            let q = Query::new(&lang, &g)
                .solver(solver)
                .starts([4])
                .empty_set_policy(EmptySetPolicy::Reject);
            assert_eq!(q.run(), Err(CfpqError::EmptyQuery));
        }
    }

    #[test]
    fn test_absent_nodes_ignored() {
        let g = graph();
        let lang = Language::regex(Regex::new("a").unwrap());
        for solver in SOLVERS {
            let res = Query::new(&lang, &g)
                .solver(solver)
                .starts([0, 99])
                .finals([1, 100])
                .run()
                .unwrap();
            assert_eq!(res, QueryResult::Pairs([(0, 1)].into_iter().collect()));
            let res = Query::new(&lang, &g).solver(solver).starts([99]).run().unwrap();
            assert!(res.is_empty());
        }
    }

    #[test]
    fn test_idempotent() {
        let g = graph();
        let before = g.clone();
        let lang = Language::Cfg(Cfg::new("S -> S S | a | b | c").unwrap());
        for solver in SOLVERS {
            let q = Query::new(&lang, &g).solver(solver);
            let r1 = q.run().unwrap();
            assert_eq!(r1, q.run().unwrap());
            assert_eq!(r1.len(), 25);
        }
        assert_eq!(g, before);
    }

    #[test]
    fn test_unknown_sub_expression() {
        let g = graph();
        let lang = Language::regex(Regex::new("a X").unwrap());
        for solver in SOLVERS {
            match Query::new(&lang, &g).solver(solver).run() {
                Err(CfpqError::Rsm(_)) => (),
                r => panic!("{:?}", r),
            }
        }
    }
}
