use std::{
    collections::BTreeSet,
    env, fs,
    io::{stderr, stdout, BufWriter, Write},
    path::Path,
    process,
};

use cfpq::{
    EmptySetPolicy, Graph, Language, NodeId, Projection, Query, QueryResult, SolverKind,
};
use cfpqgrammar::{Cfg, Regex, Rsm, Span};
use getopts::Options;
use tracing::debug;
use tracing_subscriber::EnvFilter;

fn usage(prog: &str, msg: &str) -> ! {
    let path = Path::new(prog);
    let leaf = match path.file_name().and_then(|m| m.to_str()) {
        Some(m) => m,
        None => "nimblecfpq",
    };
    if !msg.is_empty() {
        writeln!(&mut stderr(), "{}", msg).ok();
    }
    writeln!(
        &mut stderr(),
        "Usage: {} [-s <matrix|tensor|gll>] [-l <regex|cfg|rsm>] [-f <nodes>] [-t <nodes>] [-p <pairs|starts|finals>] [-e] [-v] <graph file> <language file>",
        leaf
    )
    .ok();
    process::exit(1);
}

fn read_file(path: &str) -> String {
    match fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            writeln!(&mut stderr(), "Can't read file {}: {}", path, e).ok();
            process::exit(1);
        }
    }
}

/// Report an error found in the file `path` (whose contents are `src`) and exit.
fn file_error(path: &str, src: &str, span: Option<Span>, msg: &dyn std::fmt::Display) -> ! {
    match span.and_then(|s| s.line_col(src)) {
        Some((line, col)) => writeln!(&mut stderr(), "{}:{}:{}: {}", path, line, col, msg).ok(),
        None => writeln!(&mut stderr(), "{}: {}", path, msg).ok(),
    };
    process::exit(1);
}

/// What's wrong with being given `n` positional arguments, if anything.
fn arity_error(n: usize) -> Option<&'static str> {
    match n {
        0 | 1 => Some("Too few arguments given."),
        2 => None,
        _ => Some("Too many arguments given."),
    }
}

/// Parse a comma separated list of node ids.
fn parse_nodes(prog: &str, s: &str) -> BTreeSet<NodeId> {
    s.split(',')
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(|n| match n.parse::<NodeId>() {
            Ok(n) => n,
            Err(_) => usage(prog, &format!("Illegal node id '{}'.", n)),
        })
        .collect()
}

fn main() {
    let args: Vec<String> = env::args().collect();
    let prog = &args[0];
    let matches = match Options::new()
        .optflag("h", "help", "")
        .optopt(
            "s",
            "solver",
            "Solver to be used (default: gll)",
            "matrix|tensor|gll",
        )
        .optopt(
            "l",
            "language",
            "Form of the language file (default: cfg)",
            "regex|cfg|rsm",
        )
        .optopt("f", "from", "Comma separated start nodes (default: all)", "NODES")
        .optopt("t", "to", "Comma separated final nodes (default: all)", "NODES")
        .optopt(
            "p",
            "projection",
            "Which part of the result to print (default: pairs)",
            "pairs|starts|finals",
        )
        .optflag("e", "reject-empty", "Fail rather than query all nodes if -f or -t is missing")
        .optflag("v", "verbose", "Log solver progress")
        .parse(&args[1..])
    {
        Ok(m) => m,
        Err(f) => usage(prog, f.to_string().as_str()),
    };

    if matches.opt_present("h") {
        usage(prog, "");
    }

    let filter = match EnvFilter::try_from_default_env() {
        Ok(f) => f,
        Err(_) if matches.opt_present("v") => EnvFilter::new("debug"),
        Err(_) => EnvFilter::new("warn"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(stderr)
        .init();

    let solver = match matches.opt_str("s") {
        None => SolverKind::Gll,
        Some(s) => match &*s.to_lowercase() {
            "matrix" => SolverKind::Matrix,
            "tensor" => SolverKind::Tensor,
            "gll" => SolverKind::Gll,
            _ => usage(prog, &format!("Unknown solver '{}'.", s)),
        },
    };

    let projection = match matches.opt_str("p") {
        None => Projection::Pairs,
        Some(s) => match &*s.to_lowercase() {
            "pairs" => Projection::Pairs,
            "starts" => Projection::Starts,
            "finals" => Projection::Finals,
            _ => usage(prog, &format!("Unknown projection '{}'.", s)),
        },
    };

    let policy = if matches.opt_present("e") {
        EmptySetPolicy::Reject
    } else {
        EmptySetPolicy::AllNodes
    };

    if let Some(msg) = arity_error(matches.free.len()) {
        usage(prog, msg);
    }

    let graph_path = &matches.free[0];
    let graph_src = read_file(graph_path);
    let graph = match Graph::from_edge_list(&graph_src) {
        Ok(g) => g,
        Err(e) => file_error(graph_path, &graph_src, Some(e.span), &e),
    };
    debug!(
        nodes = graph.nodes_len(),
        edges = graph.edges_len(),
        labels = graph.labels().len(),
        "Loaded graph"
    );

    let lang_path = &matches.free[1];
    let lang_src = read_file(lang_path);
    let language = match matches.opt_str("l").as_deref().map(str::to_lowercase).as_deref() {
        None | Some("cfg") => match Cfg::new(&lang_src) {
            Ok(grm) => Language::Cfg(grm),
            Err(e) => file_error(lang_path, &lang_src, Some(e.span), &e),
        },
        Some("regex") => match Regex::new(&lang_src) {
            Ok(re) => Language::regex(re),
            Err(e) => file_error(lang_path, &lang_src, Some(e.span), &e),
        },
        Some("rsm") => match Rsm::from_text(&lang_src) {
            Ok(rsm) => Language::Rsm(rsm),
            Err(e) => file_error(lang_path, &lang_src, e.span, &e),
        },
        Some(s) => usage(prog, &format!("Unknown language form '{}'.", s)),
    };

    let starts = matches
        .opt_str("f")
        .map(|s| parse_nodes(prog, &s))
        .unwrap_or_default();
    let finals = matches
        .opt_str("t")
        .map(|s| parse_nodes(prog, &s))
        .unwrap_or_default();

    let res = Query::new(&language, &graph)
        .starts(starts)
        .finals(finals)
        .solver(solver)
        .empty_set_policy(policy)
        .projection(projection)
        .run();
    let res = match res {
        Ok(r) => r,
        Err(e) => file_error(lang_path, &lang_src, None, &e),
    };

    let mut out = BufWriter::new(stdout().lock());
    match res {
        QueryResult::Pairs(ps) => {
            for (s, f) in ps {
                writeln!(out, "{} {}", s, f).ok();
            }
        }
        QueryResult::Nodes(ns) => {
            for n in ns {
                writeln!(out, "{}", n).ok();
            }
        }
    }
    out.flush().ok();
}
