use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// An alphabet symbol. Terminals are edge labels; nonterminals name a box of a recursive state
/// machine (or, equivalently, a grammar variable). The two live in separate namespaces: a graph
/// edge labelled `S` never matches a call to box `S`.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Symbol {
    Term(String),
    Nonterm(String),
}

impl Symbol {
    pub fn term(n: &str) -> Self {
        Symbol::Term(n.to_owned())
    }

    pub fn nonterm(n: &str) -> Self {
        Symbol::Nonterm(n.to_owned())
    }

    /// The name of this symbol, regardless of its kind.
    pub fn name(&self) -> &str {
        match self {
            Symbol::Term(n) | Symbol::Nonterm(n) => n,
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Symbol::Term(n) => write!(f, "'{}'", n),
            Symbol::Nonterm(n) => write!(f, "{}", n),
        }
    }
}
