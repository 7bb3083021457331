use std::collections::BTreeSet;

use cfpq::{Graph, Language, NodeId, Query, QueryResult, SolverKind};
use cfpqgrammar::{Cfg, Regex};

const SOLVERS: [SolverKind; 3] = [SolverKind::Matrix, SolverKind::Tensor, SolverKind::Gll];

fn run(lang: &Language, g: &Graph, starts: &[NodeId], finals: &[NodeId]) -> Vec<QueryResult> {
    SOLVERS
        .iter()
        .map(|s| {
            Query::new(lang, g)
                .starts(starts.iter().cloned())
                .finals(finals.iter().cloned())
                .solver(*s)
                .run()
                .unwrap()
        })
        .collect()
}

fn pairs(v: &[(NodeId, NodeId)]) -> QueryResult {
    QueryResult::Pairs(v.iter().cloned().collect::<BTreeSet<_>>())
}

#[test]
fn test_single_edge() {
    let g = Graph::from_edge_list("0 a 1\n").unwrap();
    let lang = Language::regex(Regex::new("a").unwrap());
    for r in run(&lang, &g, &[0], &[1]) {
        assert_eq!(r, pairs(&[(0, 1)]));
    }
}

#[test]
fn test_nested_brackets() {
    let g = Graph::from_edge_list("0 a 1\n1 b 2\n").unwrap();
    let lang = Language::Cfg(Cfg::new("S -> a S b | $").unwrap());
    for r in run(&lang, &g, &[0], &[2]) {
        assert_eq!(r, pairs(&[(0, 2)]));
    }
    // Unbalanced.
    for r in run(&lang, &g, &[0], &[1]) {
        assert_eq!(r, pairs(&[]));
    }
}

#[test]
fn test_self_loop() {
    let g = Graph::from_edge_list("0 a 0\n").unwrap();
    let lang = Language::regex(Regex::new("a*").unwrap());
    for r in run(&lang, &g, &[0], &[0]) {
        assert_eq!(r, pairs(&[(0, 0)]));
    }
}

#[test]
fn test_no_matching_path() {
    let g = Graph::from_edge_list("0 a 1\n2 b 3\n").unwrap();
    let lang = Language::Cfg(Cfg::new("S -> a S b | a b").unwrap());
    for r in run(&lang, &g, &[0, 1], &[2, 3]) {
        assert!(r.is_empty());
    }
    let lang = Language::regex(Regex::new("b").unwrap());
    for r in run(&lang, &g, &[0], &[1]) {
        assert!(r.is_empty());
    }
}
