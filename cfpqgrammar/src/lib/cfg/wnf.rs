//! Conversion of grammars into weak normal form, where every production is of the form `A -> a`,
//! `A -> B C`, or `A -> ε`. Unlike Chomsky normal form, empty productions are allowed anywhere,
//! so the conversion never has to remove them.

use std::collections::HashSet;

use indexmap::{IndexMap, IndexSet};
use vob::Vob;

use super::{
    Cfg, Symbol,
    ast::{self, GrammarAST},
};
use crate::{RIdx, Span};

/// A production whose head and body rules index into `Work::rule_names`.
type Prod = (usize, Vec<Symbol>);

/// A grammar being rewritten. Rules are referred to by position in `rule_names`, which only ever
/// grows; tokens keep the `TIdx`s of the source grammar.
struct Work<'a> {
    grm: &'a Cfg,
    rule_names: Vec<String>,
    used_names: HashSet<String>,
    start: usize,
    prods: IndexSet<Prod>,
}

pub(crate) fn to_weak_normal_form(grm: &Cfg) -> Cfg {
    let rule_names = grm
        .iter_rules()
        .map(|r| grm.rule_name_str(r).to_string())
        .collect::<Vec<_>>();
    let mut work = Work {
        grm,
        used_names: rule_names.iter().cloned().collect(),
        rule_names,
        start: usize::from(grm.start_rule_idx()),
        prods: grm
            .iter_pidxs()
            .map(|pidx| (usize::from(grm.prod_to_rule(pidx)), grm.prod(pidx).to_vec()))
            .collect(),
    };
    work.eliminate_unit_prods();
    work.remove_useless();
    work.lift_tokens();
    work.binarise();
    work.into_cfg()
}

impl Work<'_> {
    /// Find a name, based on `base`, which no other rule has.
    fn fresh_rule(&mut self, mut base: String) -> usize {
        while self.used_names.contains(&base) {
            base.push('\'');
        }
        self.used_names.insert(base.clone());
        self.rule_names.push(base);
        self.rule_names.len() - 1
    }

    fn rule_sym(ridx: usize) -> Symbol {
        Symbol::Rule(RIdx::from(ridx))
    }

    /// Replace every unit production `A -> B` by `A -> α` for each non-unit production `B -> α`
    /// of any rule `B` reachable from `A` by unit productions.
    fn eliminate_unit_prods(&mut self) {
        let n = self.rule_names.len();
        let mut unit_succs = vec![Vec::new(); n];
        for (head, body) in &self.prods {
            if let [Symbol::Rule(r)] = body[..] {
                unit_succs[*head].push(usize::from(r));
            }
        }
        let mut prods = IndexSet::new();
        for a in 0..n {
            // All rules reachable from `a` via unit productions (including `a` itself).
            let mut seen = Vob::from_elem(false, n);
            seen.set(a, true);
            let mut todo = vec![a];
            while let Some(b) = todo.pop() {
                for &c in &unit_succs[b] {
                    if !seen[c] {
                        seen.set(c, true);
                        todo.push(c);
                    }
                }
            }
            for (head, body) in &self.prods {
                if seen[*head] && !matches!(body[..], [Symbol::Rule(_)]) {
                    prods.insert((a, body.clone()));
                }
            }
        }
        self.prods = prods;
    }

    /// Remove productions which mention rules that derive no string, then productions whose
    /// head can't be reached from the start rule.
    fn remove_useless(&mut self) {
        let n = self.rule_names.len();
        let mut generating = Vob::from_elem(false, n);
        loop {
            let mut changed = false;
            for (head, body) in &self.prods {
                if generating[*head] {
                    continue;
                }
                if body.iter().all(|sym| match sym {
                    Symbol::Rule(r) => generating[usize::from(*r)],
                    Symbol::Token(_) => true,
                }) {
                    generating.set(*head, true);
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }
        self.prods.retain(|(_, body)| {
            body.iter().all(|sym| match sym {
                Symbol::Rule(r) => generating[usize::from(*r)],
                Symbol::Token(_) => true,
            })
        });

        let mut reachable = Vob::from_elem(false, n);
        reachable.set(self.start, true);
        let mut todo = vec![self.start];
        while let Some(a) = todo.pop() {
            for (head, body) in &self.prods {
                if *head != a {
                    continue;
                }
                for sym in body {
                    if let Symbol::Rule(r) = sym {
                        let r = usize::from(*r);
                        if !reachable[r] {
                            reachable.set(r, true);
                            todo.push(r);
                        }
                    }
                }
            }
        }
        self.prods.retain(|(head, _)| reachable[*head]);
    }

    /// In every production with more than one symbol, replace each token `a` with a rule
    /// `T_a -> a`.
    fn lift_tokens(&mut self) {
        let mut lifted = IndexMap::new();
        let mut prods = IndexSet::with_capacity(self.prods.len());
        for (head, mut body) in std::mem::take(&mut self.prods) {
            if body.len() > 1 {
                for sym in body.iter_mut() {
                    if let Symbol::Token(tidx) = *sym {
                        let ridx = match lifted.get(&tidx) {
                            Some(r) => *r,
                            None => {
                                let tn = self.grm.token_name(tidx);
                                let plain =
                                    tn.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
                                let base = if plain {
                                    format!("T_{}", tn)
                                } else {
                                    format!("T_{}", usize::from(tidx))
                                };
                                let r = self.fresh_rule(base);
                                lifted.insert(tidx, r);
                                r
                            }
                        };
                        *sym = Self::rule_sym(ridx);
                    }
                }
            }
            prods.insert((head, body));
        }
        for (tidx, ridx) in lifted {
            prods.insert((ridx, vec![Symbol::Token(tidx)]));
        }
        self.prods = prods;
    }

    /// Split every production `A -> X1 X2 ... Xn` (n > 2) into `A -> X1 A_1`, `A_1 -> X2 A_2`,
    /// ..., `A_n-2 -> Xn-1 Xn`.
    fn binarise(&mut self) {
        let mut prods = IndexSet::with_capacity(self.prods.len());
        for (head, body) in std::mem::take(&mut self.prods) {
            if body.len() <= 2 {
                prods.insert((head, body));
                continue;
            }
            let mut cur = head;
            for (i, sym) in body[..body.len() - 2].iter().enumerate() {
                let next = self.fresh_rule(format!("{}_{}", self.rule_names[head], i + 1));
                prods.insert((cur, vec![*sym, Self::rule_sym(next)]));
                cur = next;
            }
            prods.insert((cur, body[body.len() - 2..].to_vec()));
        }
        self.prods = prods;
    }

    fn into_cfg(self) -> Cfg {
        let name = |r: usize| (self.rule_names[r].clone(), Span::new(0, 0));
        let mut ast = GrammarAST::new();
        ast.add_rule(name(self.start));
        for (head, _) in &self.prods {
            ast.add_rule(name(*head));
        }
        for (head, body) in &self.prods {
            let syms = body
                .iter()
                .map(|sym| match *sym {
                    Symbol::Rule(r) => ast::Symbol::Rule(name(usize::from(r)).0, Span::new(0, 0)),
                    Symbol::Token(t) => {
                        ast::Symbol::Token(self.grm.token_name(t).to_string(), Span::new(0, 0))
                    }
                })
                .collect();
            ast.add_prod(&self.rule_names[*head], syms);
        }
        ast.complete();
        Cfg::from_ast(ast)
    }
}
