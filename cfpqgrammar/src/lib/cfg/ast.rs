use indexmap::{IndexMap, IndexSet};

use crate::Span;

/// An AST representing a grammar. This is built up gradually (by the text parser, or by code
/// which synthesises grammars such as the weak normal form conversion): when it is finished,
/// `complete` must be called exactly once before it is turned into a [`Cfg`](../struct.Cfg.html).
#[derive(Debug, Default)]
pub(crate) struct GrammarAST {
    pub start: Option<(String, Span)>,
    pub rules: IndexMap<String, Rule>,
    pub prods: Vec<Production>,
    pub tokens: IndexSet<String>,
}

#[derive(Debug)]
pub(crate) struct Rule {
    pub name: (String, Span),
    /// Indices into `GrammarAST.prods`.
    pub pidxs: Vec<usize>,
}

#[derive(Debug, Eq, PartialEq)]
pub(crate) struct Production {
    pub symbols: Vec<Symbol>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) enum Symbol {
    Rule(String, Span),
    Token(String, Span),
}

impl GrammarAST {
    pub fn new() -> GrammarAST {
        GrammarAST::default()
    }

    /// Add a rule with no productions, if no rule of that name exists. The first rule added
    /// becomes the start rule unless `start` has already been set.
    pub fn add_rule(&mut self, (name, span): (String, Span)) {
        if self.start.is_none() {
            self.start = Some((name.clone(), span));
        }
        if !self.rules.contains_key(&name) {
            self.rules.insert(
                name.clone(),
                Rule {
                    name: (name, span),
                    pidxs: Vec::new(),
                },
            );
        }
    }

    #[cfg(test)]
    pub fn get_rule(&self, key: &str) -> Option<&Rule> {
        self.rules.get(key)
    }

    /// Add a production `rule_name -> symbols`. `rule_name` must already have been added with
    /// `add_rule`.
    pub fn add_prod(&mut self, rule_name: &str, symbols: Vec<Symbol>) {
        for sym in &symbols {
            if let Symbol::Token(n, _) = sym {
                self.tokens.insert(n.clone());
            }
        }
        let pidx = self.prods.len();
        self.rules[rule_name].pidxs.push(pidx);
        self.prods.push(Production { symbols });
    }

    /// Finish building the AST: any rule which is referenced but never defined becomes a rule
    /// with no productions (and thus derives nothing).
    pub fn complete(&mut self) {
        let mut undefined = Vec::new();
        for prod in &self.prods {
            for sym in &prod.symbols {
                if let Symbol::Rule(n, span) = sym {
                    if !self.rules.contains_key(n) {
                        undefined.push((n.clone(), *span));
                    }
                }
            }
        }
        for (n, span) in undefined {
            if !self.rules.contains_key(&n) {
                self.rules.insert(
                    n.clone(),
                    Rule {
                        name: (n, span),
                        pidxs: Vec::new(),
                    },
                );
            }
        }
    }
}
