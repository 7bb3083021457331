//! Context-free grammars.
//!
//! Grammars are written one rule per line:
//!
//! ```text
//!   # Same-generation query over subClassOf edges
//!   S -> subClassOf_r S subClassOf | subClassOf_r subClassOf
//!   S -> type_r S type | $
//! ```
//!
//! The left-hand side of `->` names a rule; alternatives are separated by `|`. Symbols starting
//! with an uppercase letter are rules; everything else (including anything quoted with `'` or
//! `"`) is a token. `$`, `ε` and `epsilon` denote the empty string. `#` starts a comment. The
//! first rule is the start rule; a rule may be given on several lines, in which case its
//! productions accumulate.

mod ast;
mod grammar;
mod nullable;
mod parser;
mod wnf;

pub(crate) use self::ast::GrammarAST;
pub(crate) use self::ast::Symbol as AstSymbol;
pub use self::{
    grammar::{Cfg, Symbol},
    parser::{CfgGrammarError, CfgGrammarErrorKind},
};
