//! Recursive state machines (RSMs).
//!
//! An RSM is a set of *boxes*, each an automaton named by a nonterminal, one of which is the
//! initial box. A transition labelled `Nonterm(B)` in any box stands for a run through box `B`
//! from one of its start states to one of its final states. RSMs recognise exactly the
//! context-free languages.
//!
//! RSMs can be written as text, one box per line, with a regular expression on the right of
//! each `->`:
//!
//! ```text
//!   S -> a S b | a b
//!   # Several lines for the same box are unioned.
//!   S -> (c | d)* S?
//! ```

use std::{error::Error, fmt, str::FromStr};

use cfpqautomata::{Automaton, AutomatonError, Symbol};
use indexmap::{IndexMap, IndexSet};
use lazy_static::lazy_static;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
    Span,
    cfg::{self, AstSymbol, Cfg, GrammarAST},
    regex::{Regex, RegexError},
};

/// The various different possible RSM errors.
#[derive(Debug, PartialEq, Eq)]
pub enum RsmErrorKind {
    /// A `Nonterm` transition names a box that does not exist.
    UnknownBoxReference(String),
    UnknownInitialBox(String),
    DuplicateBox(String),
    /// The named box's automaton references states it doesn't declare.
    MalformedBox(String, AutomatonError),
    /// The RSM text contains no boxes.
    EmptyRsm,
    IllegalName,
    MissingRightArrow,
    Regex(RegexError),
}

/// Any error from building an RSM returns an instance of this struct. Errors arising from RSM
/// text have a span; structural errors don't.
#[derive(Debug, PartialEq, Eq)]
pub struct RsmError {
    pub kind: RsmErrorKind,
    pub span: Option<Span>,
}

impl RsmError {
    fn new(kind: RsmErrorKind) -> Self {
        RsmError { kind, span: None }
    }
}

impl Error for RsmError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self.kind {
            RsmErrorKind::MalformedBox(_, ref e) => Some(e),
            RsmErrorKind::Regex(ref e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for RsmError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.kind {
            RsmErrorKind::UnknownBoxReference(ref n) => {
                write!(f, "Unknown reference to box '{}'", n)
            }
            RsmErrorKind::UnknownInitialBox(ref n) => {
                write!(f, "Initial box '{}' does not exist", n)
            }
            RsmErrorKind::DuplicateBox(ref n) => write!(f, "Duplicate box '{}'", n),
            RsmErrorKind::MalformedBox(ref n, ref e) => write!(f, "In box '{}': {}", n, e),
            RsmErrorKind::EmptyRsm => write!(f, "RSM contains no boxes"),
            RsmErrorKind::IllegalName => write!(f, "Illegal name"),
            RsmErrorKind::MissingRightArrow => write!(f, "Missing '->'"),
            RsmErrorKind::Regex(ref e) => write!(f, "{}", e),
        }
    }
}

/// A state of an RSM: a state of one of its boxes.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RsmState {
    pub box_label: String,
    pub sub_state: usize,
}

impl RsmState {
    pub fn new(box_label: &str, sub_state: usize) -> Self {
        RsmState {
            box_label: box_label.to_owned(),
            sub_state,
        }
    }
}

impl fmt::Display for RsmState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.box_label, self.sub_state)
    }
}

/// A named automaton over [`Symbol`]s.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RsmBox {
    label: String,
    automaton: Automaton<usize>,
}

impl RsmBox {
    pub fn new(label: &str, automaton: Automaton<usize>) -> Self {
        RsmBox {
            label: label.to_owned(),
            automaton,
        }
    }

    /// Create a box whose language is that of `re`.
    pub fn from_regex(label: &str, re: &Regex) -> Result<Self, RegexError> {
        Ok(RsmBox::new(label, re.to_automaton()?))
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn automaton(&self) -> &Automaton<usize> {
        &self.automaton
    }
}

/// A recursive state machine. Every `Nonterm` referenced by a box transition is guaranteed to
/// name a box of this RSM.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Rsm {
    initial: String,
    boxes: IndexMap<String, RsmBox>,
}

lazy_static! {
    static ref RE_BOX_NAME: ::regex::Regex = ::regex::Regex::new(r"^[A-Z][a-zA-Z0-9_]*").unwrap();
}

impl Rsm {
    /// Create an RSM from `boxes` whose initial box is labelled `initial`.
    pub fn new<I>(initial: &str, boxes: I) -> Result<Rsm, RsmError>
    where
        I: IntoIterator<Item = RsmBox>,
    {
        let mut map = IndexMap::new();
        for b in boxes {
            if let Err(e) = b.automaton.validate() {
                return Err(RsmError::new(RsmErrorKind::MalformedBox(b.label, e)));
            }
            if map.contains_key(&b.label) {
                return Err(RsmError::new(RsmErrorKind::DuplicateBox(b.label)));
            }
            map.insert(b.label.clone(), b);
        }
        if !map.contains_key(initial) {
            return Err(RsmError::new(RsmErrorKind::UnknownInitialBox(
                initial.to_owned(),
            )));
        }
        for b in map.values() {
            for (_, sym, _) in b.automaton.transitions() {
                if let Symbol::Nonterm(n) = sym {
                    if !map.contains_key(n) {
                        return Err(RsmError::new(RsmErrorKind::UnknownBoxReference(n.clone())));
                    }
                }
            }
        }
        Ok(Rsm {
            initial: initial.to_owned(),
            boxes: map,
        })
    }

    /// Build an RSM with one box per rule of `grm`, whose language is the union of the rule's
    /// productions. The start rule's box is the initial box.
    pub fn from_cfg(grm: &Cfg) -> Rsm {
        let mut boxes = IndexMap::with_capacity(grm.rules_len());
        for ridx in grm.iter_rules() {
            // State 0 is the start state; state 1 (created on demand) the sole final state.
            let mut aut = Automaton::new();
            aut.add_state(0);
            aut.add_start(0);
            let mut next = 1;
            let mut fin = None;
            for &pidx in grm.rule_to_prods(ridx) {
                let prod = grm.prod(pidx);
                if prod.is_empty() {
                    aut.add_final(0);
                    continue;
                }
                let f = *fin.get_or_insert_with(|| {
                    let f = next;
                    next += 1;
                    aut.add_state(f);
                    aut.add_final(f);
                    f
                });
                let mut cur = 0;
                for (i, sym) in prod.iter().enumerate() {
                    let to = if i + 1 == prod.len() {
                        f
                    } else {
                        next += 1;
                        aut.add_state(next - 1);
                        next - 1
                    };
                    let sym = match *sym {
                        cfg::Symbol::Rule(r) => Symbol::nonterm(grm.rule_name_str(r)),
                        cfg::Symbol::Token(t) => Symbol::term(grm.token_name(t)),
                    };
                    aut.add_transition(cur, sym, to);
                    cur = to;
                }
            }
            let label = grm.rule_name_str(ridx);
            boxes.insert(label.to_owned(), RsmBox::new(label, aut));
        }
        Rsm {
            initial: grm.rule_name_str(grm.start_rule_idx()).to_owned(),
            boxes,
        }
    }

    /// Parse RSM text (see the [module documentation](index.html)). The first box is the
    /// initial box. Lines whose first non-whitespace character is `#` are comments.
    pub fn from_text(src: &str) -> Result<Rsm, RsmError> {
        let mut defs: IndexMap<String, Regex> = IndexMap::new();
        let mut off = 0;
        for line in src.split_inclusive('\n') {
            let line_off = off;
            off += line.len();
            let trimmed = line.trim_start();
            if trimmed.trim_end().is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let i = line_off + (line.len() - trimmed.len());
            let head = match RE_BOX_NAME.find(trimmed) {
                Some(m) => m.as_str(),
                None => {
                    return Err(RsmError {
                        kind: RsmErrorKind::IllegalName,
                        span: Some(Span::new(i, i)),
                    });
                }
            };
            let rest = &trimmed[head.len()..];
            let after_ws = rest.trim_start();
            let j = i + head.len() + (rest.len() - after_ws.len());
            let Some(body) = after_ws.strip_prefix("->") else {
                return Err(RsmError {
                    kind: RsmErrorKind::MissingRightArrow,
                    span: Some(Span::new(j, j)),
                });
            };
            let re = match Regex::new(body) {
                Ok(re) => re,
                Err(e) => {
                    let span = e.span.offset(j + 2);
                    return Err(RsmError {
                        kind: RsmErrorKind::Regex(RegexError { span, ..e }),
                        span: Some(span),
                    });
                }
            };
            match defs.get_mut(head) {
                Some(prev) => *prev = prev.clone().union(re),
                None => {
                    defs.insert(head.to_owned(), re);
                }
            }
        }
        let initial = match defs.keys().next() {
            Some(n) => n.clone(),
            None => {
                return Err(RsmError {
                    kind: RsmErrorKind::EmptyRsm,
                    span: Some(Span::new(src.len(), src.len())),
                });
            }
        };
        let mut boxes = Vec::with_capacity(defs.len());
        for (label, re) in &defs {
            boxes.push(RsmBox::from_regex(label, re).map_err(|e| RsmError {
                span: Some(e.span),
                kind: RsmErrorKind::Regex(e),
            })?);
        }
        Rsm::new(&initial, boxes)
    }

    /// Build an RSM from `re`, where the variables of `re` (and of the sub-expressions) refer to
    /// the sub-expressions in `subs`. Each sub-expression becomes a box of the same name; `re`
    /// itself becomes the initial box, labelled `START` (with enough `'`s appended to make it
    /// distinct from every sub-expression name).
    pub fn from_regex(re: &Regex, subs: &IndexMap<String, Regex>) -> Result<Rsm, RsmError> {
        let mut initial = String::from("START");
        while subs.contains_key(&initial) {
            initial.push('\'');
        }
        for v in subs.values().chain([re]).flat_map(|re| re.vars()) {
            if !subs.contains_key(&v) {
                return Err(RsmError::new(RsmErrorKind::UnknownBoxReference(v)));
            }
        }
        let mut boxes = Vec::with_capacity(subs.len() + 1);
        let mk = |label: &str, re: &Regex| {
            RsmBox::from_regex(label, re).map_err(|e| RsmError::new(RsmErrorKind::Regex(e)))
        };
        boxes.push(mk(&initial, re)?);
        for (label, re) in subs {
            boxes.push(mk(label, re)?);
        }
        Rsm::new(&initial, boxes)
    }

    /// The label of the initial box.
    pub fn initial_label(&self) -> &str {
        &self.initial
    }

    pub fn get_box(&self, label: &str) -> Option<&RsmBox> {
        self.boxes.get(label)
    }

    pub fn boxes_len(&self) -> usize {
        self.boxes.len()
    }

    /// Iterate over the boxes in the order they were given.
    pub fn iter_boxes(&self) -> impl Iterator<Item = &RsmBox> {
        self.boxes.values()
    }

    /// Flatten the RSM into one automaton over [`RsmState`]s: the disjoint union of all boxes.
    /// Its start and final states are those of every box.
    pub fn to_automaton(&self) -> Automaton<RsmState> {
        let mut aut = Automaton::new();
        for b in self.boxes.values() {
            let st = |s: &usize| RsmState::new(&b.label, *s);
            for s in b.automaton.states() {
                aut.add_state(st(s));
            }
            for s in b.automaton.starts() {
                aut.add_start(st(s));
            }
            for s in b.automaton.finals() {
                aut.add_final(st(s));
            }
            for (from, sym, to) in b.automaton.transitions() {
                aut.add_transition(st(from), sym.clone(), st(to));
            }
            for (from, to) in b.automaton.epsilons() {
                aut.add_epsilon(st(from), st(to));
            }
        }
        aut
    }

    /// Convert the RSM into an equivalent grammar. Each box `B` becomes a rule `B`, and each
    /// state `q` of `B` a rule `B_q` (renamed if that clashes) deriving the words that lead from
    /// `q` to a final state of `B`:
    ///
    /// ```text
    ///   B   -> B_q                 for each start state q
    ///   B_q -> a B_r               for each transition q --a--> r
    ///   B_q -> $                   if q is final
    /// ```
    pub fn to_cfg(&self) -> Cfg {
        let mut used = self.boxes.keys().cloned().collect::<IndexSet<_>>();
        let mut names = IndexMap::new();
        for b in self.boxes.values() {
            let aut = b.automaton.remove_epsilons();
            for s in aut.states() {
                let mut n = format!("{}_{}", b.label, s);
                while used.contains(&n) {
                    n.push('\'');
                }
                used.insert(n.clone());
                names.insert(RsmState::new(&b.label, *s), n);
            }
        }
        let nospan = Span::new(0, 0);
        let rule = |n: &str| AstSymbol::Rule(n.to_owned(), nospan);

        let mut ast = GrammarAST::new();
        ast.add_rule((self.initial.clone(), nospan));
        for b in self.boxes.values() {
            ast.add_rule((b.label.clone(), nospan));
            let aut = b.automaton.remove_epsilons();
            for s in aut.starts() {
                ast.add_prod(&b.label, vec![rule(&names[&RsmState::new(&b.label, *s)])]);
            }
            for s in aut.states() {
                let n = &names[&RsmState::new(&b.label, *s)];
                ast.add_rule((n.clone(), nospan));
                if aut.is_final(s) {
                    ast.add_prod(n, vec![]);
                }
                for (_, sym, to) in aut.transitions().filter(|(from, _, _)| from == s) {
                    let first = match sym {
                        Symbol::Term(t) => AstSymbol::Token(t.clone(), nospan),
                        Symbol::Nonterm(nt) => rule(nt),
                    };
                    let next = rule(&names[&RsmState::new(&b.label, *to)]);
                    ast.add_prod(n, vec![first, next]);
                }
            }
        }
        ast.complete();
        Cfg::from_ast(ast)
    }
}

impl FromStr for Rsm {
    type Err = RsmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Rsm::from_text(s)
    }
}

#[cfg(test)]
mod test {
    use cfpqautomata::{AdjacencyMatrixFA, Automaton, AutomatonErrorKind, Symbol};
    use indexmap::IndexMap;

    use super::{Rsm, RsmBox, RsmErrorKind, RsmState};
    use crate::{RegexErrorKind, Span, cfg::Cfg, regex::Regex};

    fn box_accepts(rsm: &Rsm, label: &str, word: &[Symbol]) -> bool {
        AdjacencyMatrixFA::new(rsm.get_box(label).unwrap().automaton())
            .unwrap()
            .accepts(word)
    }

    fn t(n: &str) -> Symbol {
        Symbol::term(n)
    }

    fn nt(n: &str) -> Symbol {
        Symbol::nonterm(n)
    }

    #[test]
    fn test_new_validates() {
        let s = RsmBox::from_regex("S", &Regex::new("a S b | A").unwrap()).unwrap();
        let e = Rsm::new("S", vec![s.clone()]).unwrap_err();
        assert_eq!(e.kind, RsmErrorKind::UnknownBoxReference("A".to_string()));
        assert_eq!(e.to_string(), "Unknown reference to box 'A'");

        let a = RsmBox::from_regex("A", &Regex::new("c").unwrap()).unwrap();
        let e = Rsm::new("B", vec![s.clone(), a.clone()]).unwrap_err();
        assert_eq!(e.kind, RsmErrorKind::UnknownInitialBox("B".to_string()));
        let e = Rsm::new("S", vec![s.clone(), a.clone(), a.clone()]).unwrap_err();
        assert_eq!(e.kind, RsmErrorKind::DuplicateBox("A".to_string()));

        let mut bad = Automaton::new();
        bad.add_state(0);
        bad.add_start(1);
        match Rsm::new("S", vec![RsmBox::new("S", bad)]).unwrap_err().kind {
            RsmErrorKind::MalformedBox(n, e) => {
                assert_eq!(n, "S");
                assert_eq!(e.kind, AutomatonErrorKind::UnknownStartState);
            }
            k => panic!("Incorrect error {:?}", k),
        }

        let rsm = Rsm::new("S", vec![s, a]).unwrap();
        assert_eq!(rsm.initial_label(), "S");
        assert_eq!(rsm.boxes_len(), 2);
    }

    #[test]
    fn test_from_cfg() {
        let grm = Cfg::new("S -> a S b | $ | A\nA -> c\nB -> B").unwrap();
        let rsm = Rsm::from_cfg(&grm);
        assert_eq!(rsm.initial_label(), "S");
        assert_eq!(
            rsm.iter_boxes().map(|b| b.label()).collect::<Vec<_>>(),
            vec!["S", "A", "B"]
        );
        assert!(box_accepts(&rsm, "S", &[]));
        assert!(box_accepts(&rsm, "S", &[t("a"), nt("S"), t("b")]));
        assert!(box_accepts(&rsm, "S", &[nt("A")]));
        assert!(!box_accepts(&rsm, "S", &[t("a"), t("b")]));
        assert!(box_accepts(&rsm, "A", &[t("c")]));
        assert!(box_accepts(&rsm, "B", &[nt("B")]));
        assert!(!box_accepts(&rsm, "B", &[]));
    }

    #[test]
    fn test_from_text() {
        let src = "
          # Dyck language over two bracket kinds
          S -> a S b S | $
          S -> c S d S
        ";
        let rsm: Rsm = src.parse().unwrap();
        assert_eq!(rsm.boxes_len(), 1);
        assert!(box_accepts(&rsm, "S", &[]));
        assert!(box_accepts(&rsm, "S", &[t("a"), nt("S"), t("b"), nt("S")]));
        assert!(box_accepts(&rsm, "S", &[t("c"), nt("S"), t("d"), nt("S")]));
        assert!(!box_accepts(&rsm, "S", &[t("a"), nt("S"), t("d"), nt("S")]));
    }

    #[test]
    fn test_from_text_errors() {
        let e = Rsm::from_text("S -> a\ns -> b").unwrap_err();
        assert_eq!(e.kind, RsmErrorKind::IllegalName);
        assert_eq!(e.span, Some(Span::new(7, 7)));

        let e = Rsm::from_text("S a").unwrap_err();
        assert_eq!(e.kind, RsmErrorKind::MissingRightArrow);
        assert_eq!(e.span, Some(Span::new(2, 2)));

        let src = "S -> a\nA -> (b";
        let e = Rsm::from_text(src).unwrap_err();
        match e.kind {
            RsmErrorKind::Regex(ref re) => assert_eq!(re.kind, RegexErrorKind::UnmatchedParen),
            ref k => panic!("Incorrect error {:?}", k),
        }
        assert_eq!(e.span.unwrap().line_col(src), Some((2, 6)));

        let e = Rsm::from_text("S -> A").unwrap_err();
        assert_eq!(e.kind, RsmErrorKind::UnknownBoxReference("A".to_string()));

        let e = Rsm::from_text("  # nothing\n").unwrap_err();
        assert_eq!(e.kind, RsmErrorKind::EmptyRsm);
    }

    #[test]
    fn test_from_regex() {
        let mut subs = IndexMap::new();
        subs.insert("START".to_string(), Regex::new("a START? b").unwrap());
        let rsm = Rsm::from_regex(&Regex::new("START c").unwrap(), &subs).unwrap();
        assert_eq!(rsm.initial_label(), "START'");
        assert!(box_accepts(&rsm, "START'", &[nt("START"), t("c")]));
        assert!(box_accepts(&rsm, "START", &[t("a"), nt("START"), t("b")]));

        let e = Rsm::from_regex(&Regex::new("A").unwrap(), &IndexMap::new()).unwrap_err();
        assert_eq!(e.kind, RsmErrorKind::UnknownBoxReference("A".to_string()));
        // Variables of the sub-expressions are checked too, before anything is compiled.
        let mut subs = IndexMap::new();
        subs.insert("A".to_string(), Regex::new("a (B | C)").unwrap());
        subs.insert("C".to_string(), Regex::new("c").unwrap());
        let e = Rsm::from_regex(&Regex::new("A").unwrap(), &subs).unwrap_err();
        assert_eq!(e.kind, RsmErrorKind::UnknownBoxReference("B".to_string()));
        assert_eq!(e.span, None);
    }

    #[test]
    fn test_to_automaton() {
        let rsm = Rsm::from_text("S -> a S b | $\nA -> S c").unwrap();
        let aut = rsm.to_automaton();
        let s_states = rsm.get_box("S").unwrap().automaton().states_len();
        let a_states = rsm.get_box("A").unwrap().automaton().states_len();
        assert_eq!(aut.states_len(), s_states + a_states);
        assert!(aut.is_start(&RsmState::new("S", 0)));
        assert!(aut.is_final(&RsmState::new("S", 0)));
        assert!(aut.is_start(&RsmState::new("A", 0)));
        assert!(aut
            .transitions()
            .any(|(f, s, _)| f.box_label == "A" && *s == nt("S")));
        assert!(aut.validate().is_ok());
    }

    #[test]
    fn test_to_cfg() {
        let rsm = Rsm::from_text("S -> a S b | $\nS_0 -> S").unwrap();
        let grm = rsm.to_cfg();
        assert_eq!(grm.rule_name_str(grm.start_rule_idx()), "S");
        // S's start state would be called S_0, but that's a box's name.
        assert!(grm.rule_idx("S_0'").is_some());
        assert_eq!(grm.tokens_len(), 2);
        // The grammar can be normalised and then reused.
        assert!(grm.to_weak_normal_form().is_weak_normal_form());
        let rsm2 = Rsm::from_cfg(&grm);
        assert_eq!(rsm2.initial_label(), "S");
    }
}
