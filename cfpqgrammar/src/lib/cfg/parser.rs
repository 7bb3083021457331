use std::{error::Error, fmt};

use lazy_static::lazy_static;
use regex::Regex;

use super::ast::{GrammarAST, Symbol};
use crate::Span;

type CfgResult<T> = Result<T, CfgGrammarError>;

/// The various different possible grammar text errors.
#[derive(Debug, PartialEq, Eq)]
pub enum CfgGrammarErrorKind {
    IllegalName,
    MissingRightArrow,
    /// The input contains no rules at all.
    EmptyGrammar,
}

/// Any error from the grammar parser returns an instance of this struct.
#[derive(Debug, PartialEq, Eq)]
pub struct CfgGrammarError {
    pub kind: CfgGrammarErrorKind,
    pub span: Span,
}

impl Error for CfgGrammarError {}

impl fmt::Display for CfgGrammarError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.kind)
    }
}

impl fmt::Display for CfgGrammarErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            CfgGrammarErrorKind::IllegalName => "Illegal name",
            CfgGrammarErrorKind::MissingRightArrow => "Missing '->'",
            CfgGrammarErrorKind::EmptyGrammar => "Grammar contains no rules",
        };
        write!(f, "{}", s)
    }
}

pub(crate) struct CfgParser {
    src: String,
    ast: GrammarAST,
}

lazy_static! {
    static ref RE_RULE: Regex = Regex::new(r"^[A-Z][a-zA-Z0-9_']*").unwrap();
    static ref RE_TOKEN: Regex =
        Regex::new(r#"^(?:"([^"\n]+)"|'([^'\n]+)'|([a-z0-9_][a-zA-Z0-9_'.\-]*))"#).unwrap();
    static ref RE_EPSILON: Regex = Regex::new(r"^(\$|ε|epsilon)(?:[\s|#]|$)").unwrap();
}

/// The actual parser is intended to be entirely opaque from outside users.
impl CfgParser {
    pub(crate) fn new(src: String) -> CfgParser {
        CfgParser {
            src,
            ast: GrammarAST::new(),
        }
    }

    pub(crate) fn parse(&mut self) -> CfgResult<usize> {
        // We pass around an index into the *bytes* of self.src. We guarantee that at all times
        // this points to the beginning of a UTF-8 character.
        let mut i = self.parse_ws(0, true);
        while i < self.src.len() {
            i = self.parse_rule(i)?;
            i = self.parse_ws(i, true);
        }
        if self.ast.start.is_none() {
            return Err(self.mk_error(CfgGrammarErrorKind::EmptyGrammar, i));
        }
        self.ast.complete();
        Ok(i)
    }

    pub(crate) fn ast(self) -> GrammarAST {
        self.ast
    }

    fn parse_rule(&mut self, i: usize) -> CfgResult<usize> {
        let (j, rn) = self.parse_rule_name(i)?;
        self.ast.add_rule((rn.clone(), Span::new(i, j)));
        let mut i = self.parse_ws(j, false);
        match self.lookahead_is("->", i) {
            Some(j) => i = j,
            None => return Err(self.mk_error(CfgGrammarErrorKind::MissingRightArrow, i)),
        }
        let mut syms = Vec::new();
        loop {
            i = self.parse_ws(i, false);
            if i == self.src.len()
                || self.lookahead_is("\n", i).is_some()
                || self.lookahead_is("\r", i).is_some()
            {
                self.ast.add_prod(&rn, syms);
                return Ok(i);
            }
            if let Some(j) = self.lookahead_is("|", i) {
                self.ast.add_prod(&rn, std::mem::take(&mut syms));
                i = j;
                continue;
            }
            let (j, sym) = self.parse_symbol(i)?;
            if let Some(sym) = sym {
                syms.push(sym);
            }
            i = j;
        }
    }

    fn parse_rule_name(&self, i: usize) -> CfgResult<(usize, String)> {
        match RE_RULE.find(&self.src[i..]) {
            Some(m)
                if self.at_boundary(i + m.end())
                    || self.lookahead_is("->", i + m.end()).is_some() =>
            {
                Ok((i + m.end(), m.as_str().to_string()))
            }
            _ => Err(self.mk_error(CfgGrammarErrorKind::IllegalName, i)),
        }
    }

    /// Parse a single body symbol starting at `i`. Returns `None` as the symbol if it denotes
    /// the empty string.
    fn parse_symbol(&self, i: usize) -> CfgResult<(usize, Option<Symbol>)> {
        if let Some(c) = RE_EPSILON.captures(&self.src[i..]) {
            return Ok((i + c.get(1).unwrap().end(), None));
        }
        if let Some(m) = RE_RULE.find(&self.src[i..]) {
            let j = i + m.end();
            if self.at_boundary(j) {
                let sym = Symbol::Rule(m.as_str().to_string(), Span::new(i, j));
                return Ok((j, Some(sym)));
            }
        } else if let Some(c) = RE_TOKEN.captures(&self.src[i..]) {
            let j = i + c.get(0).unwrap().end();
            if self.at_boundary(j) {
                let n = c.get(1).or_else(|| c.get(2)).or_else(|| c.get(3)).unwrap();
                let sym = Symbol::Token(n.as_str().to_string(), Span::new(i, j));
                return Ok((j, Some(sym)));
            }
        }
        Err(self.mk_error(CfgGrammarErrorKind::IllegalName, i))
    }

    /// Does a symbol end at `i`?
    fn at_boundary(&self, i: usize) -> bool {
        match self.src[i..].chars().next() {
            None => true,
            Some(c) => c.is_whitespace() || c == '|' || c == '#',
        }
    }

    /// Skip whitespace and comments from `i` onwards. If `inc_newlines` is `false`, stops at the
    /// first newline; otherwise newlines are consumed and skipped.
    fn parse_ws(&self, mut i: usize, inc_newlines: bool) -> usize {
        while i < self.src.len() {
            let c = self.src[i..].chars().next().unwrap();
            match c {
                '\n' | '\r' => {
                    if !inc_newlines {
                        break;
                    }
                    i += c.len_utf8();
                }
                '#' => {
                    // A comment runs to the end of the line; the newline itself is left alone.
                    i += self.src[i..].find(['\n', '\r']).unwrap_or(self.src.len() - i);
                }
                _ if c.is_whitespace() => i += c.len_utf8(),
                _ => break,
            }
        }
        i
    }

    fn lookahead_is(&self, s: &'static str, i: usize) -> Option<usize> {
        if self.src[i..].starts_with(s) {
            Some(i + s.len())
        } else {
            None
        }
    }

    fn mk_error(&self, k: CfgGrammarErrorKind, off: usize) -> CfgGrammarError {
        let span = Span::new(off, off);
        CfgGrammarError { kind: k, span }
    }
}

#[cfg(test)]
mod test {
    use super::{
        CfgGrammarError, CfgGrammarErrorKind, CfgParser, Span,
        super::ast::{GrammarAST, Symbol},
    };

    fn parse(s: &str) -> Result<GrammarAST, CfgGrammarError> {
        let mut cp = CfgParser::new(s.to_string());
        cp.parse()?;
        Ok(cp.ast())
    }

    fn syms(ast: &GrammarAST, pidx: usize) -> Vec<String> {
        ast.prods[pidx]
            .symbols
            .iter()
            .map(|s| match s {
                Symbol::Rule(n, _) => n.clone(),
                Symbol::Token(n, _) => format!("'{}'", n),
            })
            .collect()
    }

    #[test]
    fn test_rule() {
        let ast = parse("S -> a S b | $").unwrap();
        assert_eq!(ast.start, Some(("S".to_string(), Span::new(0, 1))));
        assert_eq!(ast.get_rule("S").unwrap().pidxs, vec![0, 1]);
        assert_eq!(syms(&ast, 0), vec!["'a'", "S", "'b'"]);
        assert!(ast.prods[1].symbols.is_empty());
        assert_eq!(ast.tokens.iter().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn test_multiple_rules() {
        let src = "
          # balanced brackets
          S -> A S | epsilon   # trailing comment
          A -> '(' S ')'
          A -> \"x y\" | ε
        ";
        let ast = parse(src).unwrap();
        assert_eq!(ast.start.as_ref().unwrap().0, "S");
        assert_eq!(ast.rules.len(), 2);
        assert_eq!(ast.get_rule("A").unwrap().pidxs, vec![2, 3, 4]);
        assert_eq!(syms(&ast, 2), vec!["'('", "S", "')'"]);
        assert_eq!(syms(&ast, 3), vec!["'x y'"]);
        assert!(ast.prods[4].symbols.is_empty());
    }

    #[test]
    fn test_token_and_rule_spans() {
        let src = "S -> sub_1 Tail";
        let ast = parse(src).unwrap();
        assert_eq!(
            ast.prods[0].symbols,
            vec![
                Symbol::Token("sub_1".to_string(), Span::new(5, 10)),
                Symbol::Rule("Tail".to_string(), Span::new(11, 15))
            ]
        );
        // Tail has no productions, but is still a rule.
        assert!(ast.get_rule("Tail").unwrap().pidxs.is_empty());
    }

    #[test]
    fn test_empty_alternatives() {
        let ast = parse("S -> | a |").unwrap();
        assert_eq!(ast.prods.len(), 3);
        assert!(ast.prods[0].symbols.is_empty());
        assert!(ast.prods[2].symbols.is_empty());
    }

    #[test]
    fn test_no_spaces() {
        let ast = parse("S->a S|b").unwrap();
        assert_eq!(syms(&ast, 0), vec!["'a'", "S"]);
        assert_eq!(syms(&ast, 1), vec!["'b'"]);
    }

    #[test]
    fn test_missing_right_arrow() {
        let src = "S -> a\nA b";
        match parse(src) {
            Err(CfgGrammarError {
                kind: CfgGrammarErrorKind::MissingRightArrow,
                span,
            }) => assert_eq!(span.line_col(src), Some((2, 3))),
            Err(e) => panic!("Incorrect error returned {}", e),
            Ok(_) => panic!("Parsed incorrectly"),
        }
    }

    #[test]
    fn test_illegal_name() {
        match parse("s -> a") {
            Err(CfgGrammarError {
                kind: CfgGrammarErrorKind::IllegalName,
                span,
            }) => assert_eq!(span, Span::new(0, 0)),
            _ => panic!("Parsed incorrectly"),
        }
        match parse("S -> a +b") {
            Err(CfgGrammarError {
                kind: CfgGrammarErrorKind::IllegalName,
                span,
            }) => assert_eq!(span, Span::new(7, 7)),
            _ => panic!("Parsed incorrectly"),
        }
        match parse("S -> a 'b") {
            Err(CfgGrammarError {
                kind: CfgGrammarErrorKind::IllegalName,
                ..
            }) => (),
            _ => panic!("Parsed incorrectly"),
        }
    }

    #[test]
    fn test_empty_grammar() {
        for src in ["", "   \n # just a comment\n"] {
            match parse(src) {
                Err(CfgGrammarError {
                    kind: CfgGrammarErrorKind::EmptyGrammar,
                    ..
                }) => (),
                _ => panic!("Parsed incorrectly"),
            }
        }
    }

    #[test]
    fn test_error_display() {
        let e = parse("S a").unwrap_err();
        assert_eq!(e.to_string(), "Missing '->'");
    }
}
