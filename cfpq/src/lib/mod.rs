#![allow(clippy::new_without_default)]
#![allow(clippy::type_complexity)]
#![allow(clippy::upper_case_acronyms)]
#![forbid(unsafe_code)]

//! `cfpq` answers *context-free path queries* (CFPQ): given a directed graph whose edges are
//! labelled with terminals and a context-free language, it finds every pair of nodes `(s, f)`
//! connected by a path whose sequence of labels is a word of the language.
//!
//! Three solvers are provided, all with the same contract and the same answers:
//!
//!   * [`matrix_based_cfpq`]: a fixpoint over one boolean matrix per grammar rule. Needs a
//!     grammar in weak normal form.
//!   * [`tensor_based_cfpq`]: repeated intersection of an RSM with the graph, each round adding
//!     the paths found through boxes back into the graph as edges.
//!   * [`gll_based_cfpq`]: a worklist walk of an RSM over the graph, sharing box calls in a
//!     graph-structured stack.
//!
//! Regular path queries can also be answered directly, without boxes, by [`tensor_based_rpq`].
//!
//! Most users will want [`Query`], which accepts a language in any of its forms (regular
//! expression, grammar or RSM), converts it to what the chosen solver needs, and can project the
//! result onto its start or final nodes:
//!
//! ```text
//!   let graph = Graph::from_edge_list("0 a 1\n1 b 2\n")?;
//!   let lang = Language::Cfg(Cfg::new("S -> a S b | $")?);
//!   let res = Query::new(&lang, &graph).starts([0]).finals([2]).run()?;
//!   assert_eq!(res, QueryResult::Pairs([(0, 2)].into_iter().collect()));
//! ```
//!
//! An empty start (or final) node set means "every node of the graph", unless the query's
//! [`EmptySetPolicy`] says otherwise. Nodes which aren't in the graph are ignored.

mod error;
mod gll;
mod graph;
mod matrix;
mod query;
mod tensor;

pub use crate::{
    error::CfpqError,
    gll::gll_based_cfpq,
    graph::{Graph, GraphError, GraphErrorKind, NodeId},
    matrix::matrix_based_cfpq,
    query::{EmptySetPolicy, Language, Projection, Query, QueryResult, SolverKind},
    tensor::{tensor_based_cfpq, tensor_based_rpq},
};
