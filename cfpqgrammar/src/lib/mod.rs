#![allow(clippy::new_without_default)]
#![allow(clippy::upper_case_acronyms)]

//! Language descriptions for context-free path querying.
//!
//! A path query's language can be given in three interchangeable forms:
//!
//!   * a [`Regex`](regex/enum.Regex.html), which may reference named sub-expressions (making it
//!     context-free rather than regular);
//!   * a context-free grammar, [`Cfg`](cfg/struct.Cfg.html);
//!   * a recursive state machine, [`Rsm`](rsm/struct.Rsm.html): a set of named automata ("boxes")
//!     whose transitions are labelled with terminals or with calls to other boxes.
//!
//! We use the following terminology throughout:
//!
//!   * A *grammar* is an ordered sequence of *productions*, each of which maps a *rule* (also
//!     known as a variable or nonterminal) to an ordered sequence of *symbols*.
//!   * A *token* (also known as a terminal) is the label of a graph edge.
//!   * A *box* is the automaton an RSM associates with one nonterminal.
//!
//! For example, in the following grammar:
//!
//! ```text
//!   S -> a S b | $
//! ```
//!
//! there is one rule `S` with two productions (`a S b` and the empty production) and two tokens
//! (`a` and `b`). The equivalent RSM has a single box `S` accepting `a S b | $`.
//!
//! `cfpqgrammar` makes the following guarantees about grammars:
//!
//!   * Productions are numbered from `0` to `prods_len() - 1` (inclusive).
//!   * Rules are numbered from `0` to `rules_len() - 1` (inclusive).
//!   * Tokens are numbered from `0` to `tokens_len() - 1` (inclusive).

pub mod cfg;
mod idxnewtype;
pub mod regex;
pub mod rsm;
pub mod span;

pub use crate::{
    cfg::{Cfg, CfgGrammarError, CfgGrammarErrorKind},
    idxnewtype::{PIdx, RIdx, TIdx},
    regex::{Regex, RegexError, RegexErrorKind},
    rsm::{Rsm, RsmBox, RsmError, RsmErrorKind, RsmState},
    span::Span,
};
