use std::{fmt, str::FromStr};

use lazy_static::lazy_static;
use regex::Regex;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use vob::Vob;

use super::{
    CfgGrammarError,
    ast::{self, GrammarAST},
    nullable::nullable,
    parser::CfgParser,
    wnf,
};
use crate::{PIdx, RIdx, Span, TIdx};

/// A grammar symbol: either a reference to a rule or a token.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Symbol {
    Rule(RIdx),
    Token(TIdx),
}

/// A context-free grammar. See the [top-level documentation](../index.html) for the guarantees
/// this struct makes about rules, tokens, and productions.
///
/// Unlike a parser's grammar, a `Cfg` has no augmented start rule: the start rule is the first
/// rule of the grammar text. Rules which are referenced but never defined have no productions
/// and derive nothing.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Cfg {
    /// A mapping from `RIdx` -> `(String, Span)`.
    rule_names: Vec<(String, Span)>,
    /// A mapping from `TIdx` -> `String`.
    token_names: Vec<String>,
    start_rule: RIdx,
    /// A list of all productions.
    prods: Vec<Vec<Symbol>>,
    /// A mapping from rules to their productions. Rules may have no productions.
    rules_prods: Vec<Vec<PIdx>>,
    /// A mapping from productions to their corresponding rule indexes.
    prods_rules: Vec<RIdx>,
}

impl Cfg {
    /// Takes as input a grammar in the textual form described in the [module
    /// documentation](index.html) and returns a `Cfg` (or a `CfgGrammarError` on error).
    pub fn new(s: &str) -> Result<Self, CfgGrammarError> {
        let mut cp = CfgParser::new(s.to_string());
        cp.parse()?;
        Ok(Cfg::from_ast(cp.ast()))
    }

    /// Build a grammar from a completed AST.
    pub(crate) fn from_ast(ast: GrammarAST) -> Self {
        let start_name = match ast.start {
            Some((ref n, _)) => n.clone(),
            None => panic!("Grammar AST has no start rule"),
        };
        let rule_names = ast
            .rules
            .values()
            .map(|r| r.name.clone())
            .collect::<Vec<_>>();
        let token_names = ast.tokens.iter().cloned().collect::<Vec<_>>();

        let mut prods = vec![None; ast.prods.len()];
        let mut rules_prods = Vec::with_capacity(ast.rules.len());
        let mut prods_rules = vec![None; ast.prods.len()];
        for (ridx, rule) in ast.rules.values().enumerate() {
            let mut pidxs = Vec::with_capacity(rule.pidxs.len());
            for &pidx in &rule.pidxs {
                let prod = ast.prods[pidx]
                    .symbols
                    .iter()
                    .map(|sym| match sym {
                        ast::Symbol::Rule(n, _) => match ast.rules.get_index_of(n) {
                            Some(i) => Symbol::Rule(RIdx::from(i)),
                            None => panic!("Incomplete grammar AST: unknown rule {}", n),
                        },
                        ast::Symbol::Token(n, _) => match ast.tokens.get_index_of(n) {
                            Some(i) => Symbol::Token(TIdx::from(i)),
                            None => panic!("Incomplete grammar AST: unknown token {}", n),
                        },
                    })
                    .collect::<Vec<_>>();
                prods[pidx] = Some(prod);
                prods_rules[pidx] = Some(RIdx::from(ridx));
                pidxs.push(PIdx::from(pidx));
            }
            rules_prods.push(pidxs);
        }

        Cfg {
            start_rule: RIdx::from(ast.rules.get_index_of(&start_name).unwrap()),
            rule_names,
            token_names,
            prods: prods.into_iter().map(Option::unwrap).collect(),
            rules_prods,
            prods_rules: prods_rules.into_iter().map(Option::unwrap).collect(),
        }
    }

    /// How many productions does this grammar have?
    pub fn prods_len(&self) -> usize {
        self.prods.len()
    }

    /// Return an iterator which produces (in order from `0..self.prods_len()`) all this
    /// grammar's valid `PIdx`s.
    pub fn iter_pidxs(&self) -> impl Iterator<Item = PIdx> {
        (0..self.prods_len()).map(PIdx::from)
    }

    /// Get the sequence of symbols for production `pidx`. Panics if `pidx` doesn't exist.
    pub fn prod(&self, pidx: PIdx) -> &[Symbol] {
        &self.prods[usize::from(pidx)]
    }

    /// Return the rule index of the production `pidx`. Panics if `pidx` doesn't exist.
    pub fn prod_to_rule(&self, pidx: PIdx) -> RIdx {
        self.prods_rules[usize::from(pidx)]
    }

    /// How many rules does this grammar have?
    pub fn rules_len(&self) -> usize {
        self.rule_names.len()
    }

    /// Return an iterator which produces (in order from `0..self.rules_len()`) all this
    /// grammar's valid `RIdx`s.
    pub fn iter_rules(&self) -> impl Iterator<Item = RIdx> {
        (0..self.rules_len()).map(RIdx::from)
    }

    /// Return the productions for rule `ridx`. Panics if `ridx` doesn't exist.
    pub fn rule_to_prods(&self, ridx: RIdx) -> &[PIdx] {
        &self.rules_prods[usize::from(ridx)]
    }

    /// Return the name of rule `ridx`. Panics if `ridx` doesn't exist.
    pub fn rule_name_str(&self, ridx: RIdx) -> &str {
        self.rule_names[usize::from(ridx)].0.as_str()
    }

    /// Return the span of rule `ridx`. Panics if `ridx` doesn't exist.
    pub fn rule_name_span(&self, ridx: RIdx) -> Span {
        self.rule_names[usize::from(ridx)].1
    }

    /// Return the index of the rule named `n` or `None` if it doesn't exist.
    pub fn rule_idx(&self, n: &str) -> Option<RIdx> {
        self.rule_names
            .iter()
            .position(|(x, _)| x == n)
            .map(RIdx::from)
    }

    /// What is the index of the start rule?
    pub fn start_rule_idx(&self) -> RIdx {
        self.start_rule
    }

    /// How many tokens does this grammar have?
    pub fn tokens_len(&self) -> usize {
        self.token_names.len()
    }

    /// Return the name of token `tidx`. Panics if `tidx` doesn't exist.
    pub fn token_name(&self, tidx: TIdx) -> &str {
        self.token_names[usize::from(tidx)].as_str()
    }

    /// Return the index of the token named `n` or `None` if it doesn't exist.
    pub fn token_idx(&self, n: &str) -> Option<TIdx> {
        self.token_names.iter().position(|x| x == n).map(TIdx::from)
    }

    /// Returns the string representation of a given production `pidx`, in the same format as
    /// the grammar text.
    pub fn pp_prod(&self, pidx: PIdx) -> String {
        let mut sprod = String::new();
        sprod.push_str(self.rule_name_str(self.prod_to_rule(pidx)));
        sprod.push_str(" ->");
        self.pp_body(pidx, &mut sprod);
        sprod
    }

    fn pp_body(&self, pidx: PIdx, out: &mut String) {
        if self.prod(pidx).is_empty() {
            out.push_str(" $");
        }
        for sym in self.prod(pidx) {
            out.push(' ');
            match sym {
                Symbol::Rule(ridx) => out.push_str(self.rule_name_str(*ridx)),
                Symbol::Token(tidx) => out.push_str(&quote_token(self.token_name(*tidx))),
            }
        }
    }

    /// Return a bit set (indexed by `RIdx`) of the rules which can derive the empty string.
    pub fn nullable(&self) -> Vob {
        nullable(self)
    }

    /// Is every production of the form `A -> a`, `A -> B C`, or `A -> ε`?
    pub fn is_weak_normal_form(&self) -> bool {
        self.check_weak_normal_form().is_ok()
    }

    /// Return the first production which is not of the form `A -> a`, `A -> B C`, or
    /// `A -> ε`, if there is one.
    pub fn check_weak_normal_form(&self) -> Result<(), PIdx> {
        for pidx in self.iter_pidxs() {
            match self.prod(pidx) {
                [] | [Symbol::Token(_)] | [Symbol::Rule(_), Symbol::Rule(_)] => (),
                _ => return Err(pidx),
            }
        }
        Ok(())
    }

    /// Return an equivalent grammar in weak normal form (i.e. for which
    /// [`is_weak_normal_form`](#method.is_weak_normal_form) is true). The language, including
    /// whether it contains the empty string, is unchanged; the start rule keeps its name.
    pub fn to_weak_normal_form(&self) -> Cfg {
        wnf::to_weak_normal_form(self)
    }
}

impl FromStr for Cfg {
    type Err = CfgGrammarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Cfg::new(s)
    }
}

lazy_static! {
    static ref RE_PLAIN_TOKEN: Regex = Regex::new(r"^[a-z0-9_][a-zA-Z0-9_'.\-]*$").unwrap();
}

/// Quote a token name if it wouldn't otherwise be read back as a token.
fn quote_token(n: &str) -> String {
    if RE_PLAIN_TOKEN.is_match(n) && !matches!(n, "epsilon") {
        n.to_string()
    } else if n.contains('"') {
        format!("'{}'", n)
    } else {
        format!("\"{}\"", n)
    }
}

/// Pretty print the grammar in the text format that [`Cfg::new`] accepts. The start rule is
/// always printed first. Rules without productions are only printed where they are referenced.
impl fmt::Display for Cfg {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let order = std::iter::once(self.start_rule)
            .chain(self.iter_rules().filter(|r| *r != self.start_rule));
        for ridx in order {
            let pidxs = self.rule_to_prods(ridx);
            if pidxs.is_empty() {
                // The start rule must still appear first, so that it remains the start rule.
                if ridx == self.start_rule {
                    writeln!(f, "{} -> {}", self.rule_name_str(ridx), self.rule_name_str(ridx))?;
                }
                continue;
            }
            let mut line = String::new();
            line.push_str(self.rule_name_str(ridx));
            line.push_str(" ->");
            for (i, pidx) in pidxs.iter().enumerate() {
                if i > 0 {
                    line.push_str(" |");
                }
                self.pp_body(*pidx, &mut line);
            }
            writeln!(f, "{}", line)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::{Cfg, Symbol};
    use crate::{PIdx, Span};

    #[test]
    fn test_accessors() {
        let grm = Cfg::new("S -> a S b | A\nA -> $ | c").unwrap();
        assert_eq!(grm.rules_len(), 2);
        assert_eq!(grm.tokens_len(), 3);
        assert_eq!(grm.prods_len(), 4);
        let s = grm.rule_idx("S").unwrap();
        let a = grm.rule_idx("A").unwrap();
        assert_eq!(grm.start_rule_idx(), s);
        assert_eq!(grm.rule_name_span(s), Span::new(0, 1));
        assert_eq!(grm.rule_to_prods(s), &[PIdx(0), PIdx(1)]);
        assert_eq!(grm.prod_to_rule(PIdx(2)), a);
        assert_eq!(
            grm.prod(PIdx(0)),
            &[
                Symbol::Token(grm.token_idx("a").unwrap()),
                Symbol::Rule(s),
                Symbol::Token(grm.token_idx("b").unwrap())
            ]
        );
        assert!(grm.prod(PIdx(2)).is_empty());
        assert_eq!(grm.token_name(grm.token_idx("c").unwrap()), "c");
        assert_eq!(grm.token_idx("d"), None);
        assert_eq!(grm.pp_prod(PIdx(0)), "S -> a S b");
        assert_eq!(grm.pp_prod(PIdx(2)), "A -> $");
    }

    #[test]
    fn test_undefined_rule() {
        let grm: Cfg = "S -> a B".parse().unwrap();
        let b = grm.rule_idx("B").unwrap();
        assert!(grm.rule_to_prods(b).is_empty());
    }

    #[test]
    fn test_weak_normal_form_check() {
        let grm = Cfg::new("S -> A B | a | $\nA -> a\nB -> b").unwrap();
        assert!(grm.is_weak_normal_form());
        let grm = Cfg::new("S -> A B\nA -> a b\nB -> b").unwrap();
        assert_eq!(grm.check_weak_normal_form(), Err(PIdx(1)));
        let grm = Cfg::new("S -> A\nA -> a").unwrap();
        assert!(!grm.is_weak_normal_form());
    }

    #[test]
    fn test_display_roundtrip() {
        let src = "S -> a S b | $ | \"X\" | 'say \"hi\"'\nA -> epsilon_x";
        let grm = Cfg::new(src).unwrap();
        let printed = grm.to_string();
        assert_eq!(
            printed,
            "S -> a S b | $ | \"X\" | 'say \"hi\"'\nA -> epsilon_x\n"
        );
        let grm2 = Cfg::new(&printed).unwrap();
        assert_eq!(grm2.to_string(), printed);
    }
}
