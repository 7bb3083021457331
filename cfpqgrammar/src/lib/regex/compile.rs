use std::collections::HashMap;

use cfpqautomata::{AdjacencyMatrixFA, Automaton, Symbol};

use super::{Regex, RegexError, RegexErrorKind};
use crate::Span;

/// Compile `re` into a trimmed, epsilon-free automaton with states `0..n`.
pub(super) fn compile(re: &Regex) -> Result<Automaton<usize>, RegexError> {
    let mut b = Builder::new();
    let (start, end) = b.build(re)?;
    b.aut.add_start(start);
    b.aut.add_final(end);
    Ok(renumber(&b.aut.remove_epsilons().trim()))
}

/// Rename the states of `aut` to `0..n`, preserving their order.
fn renumber(aut: &Automaton<usize>) -> Automaton<usize> {
    let idxs = aut
        .states()
        .enumerate()
        .map(|(i, s)| (*s, i))
        .collect::<HashMap<_, _>>();
    aut.map_states(|s| idxs[s])
}

/// A Thompson-style construction: every sub-expression becomes a fragment with a single entry
/// state and a single exit state, glued to its neighbours with epsilon transitions.
struct Builder {
    aut: Automaton<usize>,
    next_state: usize,
}

type Fragment = (usize, usize);

impl Builder {
    fn new() -> Self {
        Builder {
            aut: Automaton::new(),
            next_state: 0,
        }
    }

    fn state(&mut self) -> usize {
        let s = self.next_state;
        self.next_state += 1;
        self.aut.add_state(s);
        s
    }

    fn build(&mut self, re: &Regex) -> Result<Fragment, RegexError> {
        match re {
            Regex::Epsilon => Ok(self.epsilon()),
            Regex::Term(n) => Ok(self.symbol(Symbol::term(n))),
            Regex::Var(n) => Ok(self.symbol(Symbol::nonterm(n))),
            Regex::Concat(a, b) => self.concat(a, b),
            Regex::Union(a, b) => self.union(a, b),
            Regex::Intersect(a, b) => self.intersect(a, b),
            Regex::Star(a) => self.star(a),
            Regex::Repeat { base, min, max } => self.repeat(base, *min, *max),
        }
    }

    fn epsilon(&mut self) -> Fragment {
        let s = self.state();
        let e = self.state();
        self.aut.add_epsilon(s, e);
        (s, e)
    }

    fn symbol(&mut self, sym: Symbol) -> Fragment {
        let s = self.state();
        let e = self.state();
        self.aut.add_transition(s, sym, e);
        (s, e)
    }

    fn concat(&mut self, a: &Regex, b: &Regex) -> Result<Fragment, RegexError> {
        let (sa, ea) = self.build(a)?;
        let (sb, eb) = self.build(b)?;
        self.aut.add_epsilon(ea, sb);
        Ok((sa, eb))
    }

    fn union(&mut self, a: &Regex, b: &Regex) -> Result<Fragment, RegexError> {
        let s = self.state();
        let e = self.state();
        for re in [a, b] {
            let (sr, er) = self.build(re)?;
            self.aut.add_epsilon(s, sr);
            self.aut.add_epsilon(er, e);
        }
        Ok((s, e))
    }

    /// Intersection has no Thompson fragment: both operands are compiled on their own, their
    /// product is taken, and the product's states are copied into this automaton.
    fn intersect(&mut self, a: &Regex, b: &Regex) -> Result<Fragment, RegexError> {
        let fa = adjacency(&compile(a)?);
        let fb = adjacency(&compile(b)?);
        let product = fa.intersect(&fb).to_automaton().trim();

        let s = self.state();
        let e = self.state();
        let mut map = HashMap::with_capacity(product.states_len());
        for p in product.states() {
            map.insert(*p, self.state());
        }
        for (from, sym, to) in product.transitions() {
            self.aut.add_transition(map[from], sym.clone(), map[to]);
        }
        for p in product.starts() {
            self.aut.add_epsilon(s, map[p]);
        }
        for p in product.finals() {
            self.aut.add_epsilon(map[p], e);
        }
        Ok((s, e))
    }

    fn star(&mut self, a: &Regex) -> Result<Fragment, RegexError> {
        let s = self.state();
        let e = self.state();
        let (sa, ea) = self.build(a)?;
        self.aut.add_epsilon(s, sa);
        self.aut.add_epsilon(ea, e);
        self.aut.add_epsilon(s, e);
        self.aut.add_epsilon(ea, sa);
        Ok((s, e))
    }

    /// `base` repeated `min` times followed by either `base*` (if `max` is `None`) or
    /// `max - min` optional copies of `base`.
    fn repeat(&mut self, base: &Regex, min: u32, max: Option<u32>) -> Result<Fragment, RegexError> {
        if let Some(max) = max {
            if max < min {
                return Err(RegexError {
                    kind: RegexErrorKind::InvalidRange,
                    span: Span::new(0, 0),
                });
            }
        }
        let s = self.state();
        let mut cur = s;
        for _ in 0..min {
            let (sb, eb) = self.build(base)?;
            self.aut.add_epsilon(cur, sb);
            cur = eb;
        }
        match max {
            None => {
                let (sb, eb) = self.star(base)?;
                self.aut.add_epsilon(cur, sb);
                Ok((s, eb))
            }
            Some(max) => {
                let e = self.state();
                for _ in min..max {
                    self.aut.add_epsilon(cur, e);
                    let (sb, eb) = self.build(base)?;
                    self.aut.add_epsilon(cur, sb);
                    cur = eb;
                }
                self.aut.add_epsilon(cur, e);
                Ok((s, e))
            }
        }
    }
}

fn adjacency(aut: &Automaton<usize>) -> AdjacencyMatrixFA<usize> {
    match AdjacencyMatrixFA::new(aut) {
        Ok(fa) => fa,
        Err(e) => panic!("Compiled regular expression is malformed: {}", e),
    }
}

#[cfg(test)]
mod test {
    use cfpqautomata::{AdjacencyMatrixFA, Symbol};

    use super::super::{Regex, RegexErrorKind};

    /// Split `s` on whitespace; uppercase-initial words are nonterminals.
    fn word(s: &str) -> Vec<Symbol> {
        s.split_whitespace()
            .map(|w| {
                if w.starts_with(|c: char| c.is_ascii_uppercase()) {
                    Symbol::nonterm(w)
                } else {
                    Symbol::term(w)
                }
            })
            .collect()
    }

    fn fa(re: &str) -> AdjacencyMatrixFA<usize> {
        AdjacencyMatrixFA::new(&Regex::new(re).unwrap().to_automaton().unwrap()).unwrap()
    }

    fn check(re: &str, accepted: &[&str], rejected: &[&str]) {
        let fa = fa(re);
        for w in accepted {
            assert!(fa.accepts(&word(w)), "{} should accept '{}'", re, w);
        }
        for w in rejected {
            assert!(!fa.accepts(&word(w)), "{} should reject '{}'", re, w);
        }
    }

    #[test]
    fn test_basic() {
        check("a", &["a"], &["", "a a", "b"]);
        check("$", &[""], &["a"]);
        check("a b | c", &["a b", "c"], &["a", "a c", ""]);
        check("(a | b)* c", &["c", "a c", "b a b c"], &["", "a b", "c c"]);
        check("a S b", &["a S b"], &["a b", "a s b"]);
    }

    #[test]
    fn test_no_epsilons_and_dense_states() {
        let aut = Regex::new("(a | $)* b?").unwrap().to_automaton().unwrap();
        assert_eq!(aut.epsilons().count(), 0);
        let mut states = aut.states().cloned().collect::<Vec<_>>();
        states.sort();
        assert_eq!(states, (0..aut.states_len()).collect::<Vec<_>>());
        assert!(aut.validate().is_ok());
    }

    #[test]
    fn test_repeat() {
        check("a^3", &["a a a"], &["a a", "a a a a"]);
        check("a^[1..2]", &["a", "a a"], &["", "a a a"]);
        check("a^[0..0]", &[""], &["a"]);
        check("(a b)+", &["a b", "a b a b"], &["", "a", "a b a"]);
        check("a?", &["", "a"], &["a a"]);
    }

    #[test]
    fn test_unbounded_repeat() {
        // a^[2..] is a a a*.
        let lhs = fa("a^[2..]");
        let rhs = fa("a a a*");
        for n in 0..8 {
            let w = vec![Symbol::term("a"); n];
            assert_eq!(lhs.accepts(&w), rhs.accepts(&w), "n = {}", n);
            assert_eq!(lhs.accepts(&w), n >= 2);
        }
    }

    #[test]
    fn test_intersect() {
        check("(a | b)* & a* b", &["b", "a b", "a a b"], &["", "a", "b a b"]);
        check("a* & b*", &[""], &["a", "b"]);
        check("(a & b) | c", &["c"], &["a", "b"]);
        check("(S a)* & S* a*", &["", "S a"], &["S a S a", "S"]);
    }

    #[test]
    fn test_empty_language() {
        // Only the start state survives trimming.
        let aut = Regex::new("a & b").unwrap().to_automaton().unwrap();
        assert_eq!(aut.states_len(), 1);
        assert_eq!(aut.finals().count(), 0);
        assert_eq!(aut.transitions().count(), 0);
    }

    #[test]
    fn test_invalid_range() {
        let re = Regex::term("a").repeat(3, Some(1));
        assert_eq!(
            re.to_automaton().unwrap_err().kind,
            RegexErrorKind::InvalidRange
        );
    }
}
