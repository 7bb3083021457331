//! Regular expressions over edge labels.
//!
//! The text syntax, from lowest to highest precedence:
//!
//! ```text
//!   R | R          union
//!   R & R          intersection
//!   R . R, R R     concatenation
//!   R* R+ R?       repetition
//!   R^n R^[n..m] R^[n..]
//! ```
//!
//! Atoms are `$` or `ε` (the empty string), parenthesised expressions, names, and quoted labels.
//! A name starting with an uppercase letter is a *variable*: a reference to a named
//! sub-expression (see [`Rsm::from_regex`](../rsm/struct.Rsm.html#method.from_regex)).
//! Every other name, and anything in `'...'` or `"..."`, is an edge label.

use std::{error::Error, fmt, str::FromStr};

use cfpqautomata::Automaton;
use indexmap::IndexSet;
use lazy_static::lazy_static;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::Span;

mod compile;
mod parser;

use self::parser::RegexParser;

/// The various different possible regular expression errors.
#[derive(Debug, PartialEq, Eq)]
pub enum RegexErrorKind {
    UnexpectedChar,
    UnmatchedParen,
    PrematureEnd,
    /// A `^` not followed by `n`, `[n..m]` or `[n..]`.
    IllegalRange,
    /// A repetition whose upper bound is smaller than its lower bound.
    InvalidRange,
}

/// Any error from parsing or compiling a regular expression returns an instance of this struct.
/// Errors found when compiling an expression that was built in code have a zero-width span at
/// offset 0.
#[derive(Debug, PartialEq, Eq)]
pub struct RegexError {
    pub kind: RegexErrorKind,
    pub span: Span,
}

impl Error for RegexError {}

impl fmt::Display for RegexError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self.kind {
            RegexErrorKind::UnexpectedChar => "Unexpected character",
            RegexErrorKind::UnmatchedParen => "Unmatched parenthesis",
            RegexErrorKind::PrematureEnd => "Regular expression ends prematurely",
            RegexErrorKind::IllegalRange => "Illegal repetition range",
            RegexErrorKind::InvalidRange => "Repetition upper bound is less than its lower bound",
        };
        write!(f, "{}", s)
    }
}

/// A regular expression. Each variant compiles to an automaton fragment of its own; see
/// [`Regex::to_automaton`].
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Regex {
    Epsilon,
    /// An edge label.
    Term(String),
    /// A reference to a named sub-expression.
    Var(String),
    Concat(Box<Regex>, Box<Regex>),
    Union(Box<Regex>, Box<Regex>),
    Intersect(Box<Regex>, Box<Regex>),
    Star(Box<Regex>),
    /// `base` repeated at least `min` times and, if `max` is `Some`, at most `max` times.
    Repeat {
        base: Box<Regex>,
        min: u32,
        max: Option<u32>,
    },
}

impl Regex {
    /// Parse `s` (see the [module documentation](index.html) for the syntax).
    pub fn new(s: &str) -> Result<Regex, RegexError> {
        RegexParser::new(s).parse()
    }

    pub fn term(n: &str) -> Regex {
        Regex::Term(n.to_owned())
    }

    pub fn var(n: &str) -> Regex {
        Regex::Var(n.to_owned())
    }

    pub fn concat(self, other: Regex) -> Regex {
        Regex::Concat(Box::new(self), Box::new(other))
    }

    pub fn union(self, other: Regex) -> Regex {
        Regex::Union(Box::new(self), Box::new(other))
    }

    pub fn intersect(self, other: Regex) -> Regex {
        Regex::Intersect(Box::new(self), Box::new(other))
    }

    pub fn star(self) -> Regex {
        Regex::Star(Box::new(self))
    }

    pub fn repeat(self, min: u32, max: Option<u32>) -> Regex {
        Regex::Repeat {
            base: Box::new(self),
            min,
            max,
        }
    }

    /// The names of the variables this expression references, in order of first use.
    pub fn vars(&self) -> IndexSet<String> {
        let mut vars = IndexSet::new();
        let mut todo = vec![self];
        while let Some(re) = todo.pop() {
            match re {
                Regex::Epsilon | Regex::Term(_) => (),
                Regex::Var(n) => {
                    vars.insert(n.clone());
                }
                Regex::Concat(a, b) | Regex::Union(a, b) | Regex::Intersect(a, b) => {
                    // Pushed in reverse so that `a` is visited first.
                    todo.push(b.as_ref());
                    todo.push(a.as_ref());
                }
                Regex::Star(a) | Regex::Repeat { base: a, .. } => todo.push(a.as_ref()),
            }
        }
        vars
    }

    /// Compile this expression into an epsilon-free automaton whose states are numbered
    /// `0..states_len()`. Variables become `Nonterm` transitions, labels become `Term`
    /// transitions. The automaton is trimmed: every state other than the start state is
    /// reachable from it and can reach a final state.
    pub fn to_automaton(&self) -> Result<Automaton<usize>, RegexError> {
        compile::compile(self)
    }

    // Binding strength of the outermost operator, used to decide where `Display` needs
    // parentheses.
    fn prec(&self) -> u8 {
        match self {
            Regex::Union(..) => 0,
            Regex::Intersect(..) => 1,
            Regex::Concat(..) => 2,
            Regex::Star(_) | Regex::Repeat { .. } => 3,
            Regex::Epsilon | Regex::Term(_) | Regex::Var(_) => 4,
        }
    }

    fn fmt_prec(&self, f: &mut fmt::Formatter, min: u8) -> fmt::Result {
        if self.prec() < min {
            write!(f, "(")?;
            self.fmt_prec(f, 0)?;
            return write!(f, ")");
        }
        match self {
            Regex::Epsilon => write!(f, "$"),
            Regex::Term(n) => write!(f, "{}", quote_label(n)),
            Regex::Var(n) => write!(f, "{}", n),
            // Binary operators associate to the left, so the right operand needs to bind more
            // tightly to be printed without parentheses.
            Regex::Union(a, b) => {
                a.fmt_prec(f, 0)?;
                write!(f, " | ")?;
                b.fmt_prec(f, 1)
            }
            Regex::Intersect(a, b) => {
                a.fmt_prec(f, 1)?;
                write!(f, " & ")?;
                b.fmt_prec(f, 2)
            }
            Regex::Concat(a, b) => {
                a.fmt_prec(f, 2)?;
                write!(f, " ")?;
                b.fmt_prec(f, 3)
            }
            Regex::Star(a) => {
                a.fmt_prec(f, 3)?;
                write!(f, "*")
            }
            Regex::Repeat { base, min, max } => {
                base.fmt_prec(f, 3)?;
                match max {
                    Some(max) => write!(f, "^[{}..{}]", min, max),
                    None => write!(f, "^[{}..]", min),
                }
            }
        }
    }
}

lazy_static! {
    static ref RE_PLAIN_LABEL: ::regex::Regex =
        ::regex::Regex::new(r"^[a-z0-9_][a-zA-Z0-9_]*$").unwrap();
}

fn quote_label(n: &str) -> String {
    if RE_PLAIN_LABEL.is_match(n) {
        n.to_owned()
    } else if n.contains('\'') {
        format!("\"{}\"", n)
    } else {
        format!("'{}'", n)
    }
}

/// Print the expression in a form that [`Regex::new`] parses back into an equal expression.
impl fmt::Display for Regex {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.fmt_prec(f, 0)
    }
}

impl FromStr for Regex {
    type Err = RegexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Regex::new(s)
    }
}
