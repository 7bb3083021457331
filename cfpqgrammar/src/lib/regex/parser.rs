use lazy_static::lazy_static;

use super::{Regex, RegexError, RegexErrorKind};
use crate::Span;

type RegexResult<T> = Result<T, RegexError>;

lazy_static! {
    static ref RE_NAME: ::regex::Regex = ::regex::Regex::new(r"^[a-zA-Z0-9_]+").unwrap();
    static ref RE_INT: ::regex::Regex = ::regex::Regex::new(r"^[0-9]+").unwrap();
}

/// A recursive descent parser for regular expressions. Each `parse_*` method takes a byte
/// offset into `src` and returns the offset just after what it parsed.
pub(super) struct RegexParser<'a> {
    src: &'a str,
}

impl<'a> RegexParser<'a> {
    pub(super) fn new(src: &'a str) -> Self {
        RegexParser { src }
    }

    pub(super) fn parse(&self) -> RegexResult<Regex> {
        let (i, re) = self.parse_union(0)?;
        let i = self.parse_ws(i);
        match self.src[i..].chars().next() {
            None => Ok(re),
            Some(')') => Err(self.mk_error(RegexErrorKind::UnmatchedParen, i, i + 1)),
            Some(c) => Err(self.mk_error(RegexErrorKind::UnexpectedChar, i, i + c.len_utf8())),
        }
    }

    fn parse_union(&self, i: usize) -> RegexResult<(usize, Regex)> {
        let (mut i, mut re) = self.parse_intersect(i)?;
        loop {
            let j = self.parse_ws(i);
            match self.lookahead_is("|", j) {
                Some(k) => {
                    let (k, rhs) = self.parse_intersect(k)?;
                    re = re.union(rhs);
                    i = k;
                }
                None => return Ok((i, re)),
            }
        }
    }

    fn parse_intersect(&self, i: usize) -> RegexResult<(usize, Regex)> {
        let (mut i, mut re) = self.parse_concat(i)?;
        loop {
            let j = self.parse_ws(i);
            match self.lookahead_is("&", j) {
                Some(k) => {
                    let (k, rhs) = self.parse_concat(k)?;
                    re = re.intersect(rhs);
                    i = k;
                }
                None => return Ok((i, re)),
            }
        }
    }

    fn parse_concat(&self, i: usize) -> RegexResult<(usize, Regex)> {
        let (mut i, mut re) = self.parse_postfix(i)?;
        loop {
            let j = self.parse_ws(i);
            let k = match self.lookahead_is(".", j) {
                Some(k) => k,
                None if self.starts_atom(j) => j,
                None => return Ok((i, re)),
            };
            let (k, rhs) = self.parse_postfix(k)?;
            re = re.concat(rhs);
            i = k;
        }
    }

    fn parse_postfix(&self, i: usize) -> RegexResult<(usize, Regex)> {
        let (mut i, mut re) = self.parse_atom(i)?;
        loop {
            let j = self.parse_ws(i);
            if let Some(k) = self.lookahead_is("*", j) {
                re = re.star();
                i = k;
            } else if let Some(k) = self.lookahead_is("+", j) {
                re = re.repeat(1, None);
                i = k;
            } else if let Some(k) = self.lookahead_is("?", j) {
                re = re.repeat(0, Some(1));
                i = k;
            } else if let Some(k) = self.lookahead_is("^", j) {
                let (k, min, max) = self.parse_range(j, k)?;
                re = re.repeat(min, max);
                i = k;
            } else {
                return Ok((i, re));
            }
        }
    }

    /// Parse the range following a `^` (which is at offset `caret`): one of `n`, `[n..m]`, or
    /// `[n..]`.
    fn parse_range(&self, caret: usize, i: usize) -> RegexResult<(usize, u32, Option<u32>)> {
        let i = self.parse_ws(i);
        let Some(i) = self.lookahead_is("[", i) else {
            let (i, n) = self.parse_int(i)?;
            return Ok((i, n, Some(n)));
        };
        let (i, min) = self.parse_int(self.parse_ws(i))?;
        let i = self.parse_ws(i);
        let Some(i) = self.lookahead_is("..", i) else {
            return Err(self.mk_error(RegexErrorKind::IllegalRange, i, i));
        };
        let i = self.parse_ws(i);
        let (i, max) = if RE_INT.is_match(&self.src[i..]) {
            let (i, max) = self.parse_int(i)?;
            (self.parse_ws(i), Some(max))
        } else {
            (i, None)
        };
        let Some(i) = self.lookahead_is("]", i) else {
            return Err(self.mk_error(RegexErrorKind::IllegalRange, i, i));
        };
        if let Some(max) = max {
            if max < min {
                return Err(self.mk_error(RegexErrorKind::InvalidRange, caret, i));
            }
        }
        Ok((i, min, max))
    }

    fn parse_int(&self, i: usize) -> RegexResult<(usize, u32)> {
        match RE_INT.find(&self.src[i..]) {
            Some(m) => match m.as_str().parse::<u32>() {
                Ok(n) => Ok((i + m.end(), n)),
                Err(_) => Err(self.mk_error(RegexErrorKind::IllegalRange, i, i + m.end())),
            },
            None => Err(self.mk_error(RegexErrorKind::IllegalRange, i, i)),
        }
    }

    fn parse_atom(&self, i: usize) -> RegexResult<(usize, Regex)> {
        let i = self.parse_ws(i);
        let c = match self.src[i..].chars().next() {
            Some(c) => c,
            None => return Err(self.mk_error(RegexErrorKind::PrematureEnd, i, i)),
        };
        match c {
            '(' => {
                let (j, re) = self.parse_union(i + 1)?;
                let j = self.parse_ws(j);
                match self.lookahead_is(")", j) {
                    Some(j) => Ok((j, re)),
                    None => Err(self.mk_error(RegexErrorKind::UnmatchedParen, i, i + 1)),
                }
            }
            '$' | 'ε' => Ok((i + c.len_utf8(), Regex::Epsilon)),
            '\'' | '"' => {
                let start = i + 1;
                match self.src[start..].find(c) {
                    Some(0) => Err(self.mk_error(RegexErrorKind::UnexpectedChar, i, start + 1)),
                    Some(len) => Ok((
                        start + len + 1,
                        Regex::Term(self.src[start..start + len].to_owned()),
                    )),
                    None => Err(self.mk_error(RegexErrorKind::PrematureEnd, i, self.src.len())),
                }
            }
            _ => match RE_NAME.find(&self.src[i..]) {
                Some(m) => {
                    let n = m.as_str();
                    let re = if c.is_ascii_uppercase() {
                        Regex::var(n)
                    } else {
                        Regex::term(n)
                    };
                    Ok((i + m.end(), re))
                }
                None => Err(self.mk_error(RegexErrorKind::UnexpectedChar, i, i + c.len_utf8())),
            },
        }
    }

    /// Could an atom start at `i`? Used to detect concatenation by juxtaposition.
    fn starts_atom(&self, i: usize) -> bool {
        match self.src[i..].chars().next() {
            Some(c) => {
                matches!(c, '(' | '$' | 'ε' | '\'' | '"' | '_') || c.is_ascii_alphanumeric()
            }
            None => false,
        }
    }

    fn parse_ws(&self, mut i: usize) -> usize {
        while let Some(c) = self.src[i..].chars().next() {
            if !c.is_whitespace() {
                break;
            }
            i += c.len_utf8();
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

    fn mk_error(&self, kind: RegexErrorKind, start: usize, end: usize) -> RegexError {
        RegexError {
            kind,
            span: Span::new(start, end),
        }
    }
}

#[cfg(test)]
mod test {
    use super::super::{Regex, RegexError, RegexErrorKind};
    use crate::Span;

    fn t(n: &str) -> Regex {
        Regex::term(n)
    }

    fn v(n: &str) -> Regex {
        Regex::var(n)
    }

    fn err(s: &str) -> RegexError {
        match Regex::new(s) {
            Ok(re) => panic!("{} parsed as {:?}", s, re),
            Err(e) => e,
        }
    }

    #[test]
    fn test_atoms() {
        assert_eq!(Regex::new("a").unwrap(), t("a"));
        assert_eq!(Regex::new("Sub").unwrap(), v("Sub"));
        assert_eq!(Regex::new(" $ ").unwrap(), Regex::Epsilon);
        assert_eq!(Regex::new("ε").unwrap(), Regex::Epsilon);
        assert_eq!(Regex::new("'Type'").unwrap(), t("Type"));
        assert_eq!(Regex::new("\"a b\"").unwrap(), t("a b"));
        assert_eq!(Regex::new("label_1").unwrap(), t("label_1"));
    }

    #[test]
    fn test_precedence() {
        assert_eq!(
            Regex::new("a | b & c d*").unwrap(),
            t("a").union(t("b").intersect(t("c").concat(t("d").star())))
        );
        assert_eq!(
            Regex::new("a.b.c").unwrap(),
            t("a").concat(t("b")).concat(t("c"))
        );
        assert_eq!(Regex::new("(a|b)c").unwrap(), t("a").union(t("b")).concat(t("c")));
        assert_eq!(
            Regex::new("a|b|c").unwrap(),
            t("a").union(t("b")).union(t("c"))
        );
    }

    #[test]
    fn test_postfix() {
        assert_eq!(Regex::new("a+").unwrap(), t("a").repeat(1, None));
        assert_eq!(Regex::new("a?").unwrap(), t("a").repeat(0, Some(1)));
        assert_eq!(Regex::new("a^3").unwrap(), t("a").repeat(3, Some(3)));
        assert_eq!(Regex::new("a^[2..5]").unwrap(), t("a").repeat(2, Some(5)));
        assert_eq!(Regex::new("a ^ [ 2 .. ]").unwrap(), t("a").repeat(2, None));
        assert_eq!(Regex::new("a**").unwrap(), t("a").star().star());
        assert_eq!(
            Regex::new("S a^2 b").unwrap(),
            v("S").concat(t("a").repeat(2, Some(2))).concat(t("b"))
        );
    }

    #[test]
    fn test_errors() {
        let e = err("a | ");
        assert_eq!(e.kind, RegexErrorKind::PrematureEnd);
        assert_eq!(e.span, Span::new(4, 4));
        assert_eq!(err("").kind, RegexErrorKind::PrematureEnd);

        let e = err("(a | b");
        assert_eq!(e.kind, RegexErrorKind::UnmatchedParen);
        assert_eq!(e.span, Span::new(0, 1));
        let e = err("a b)");
        assert_eq!(e.kind, RegexErrorKind::UnmatchedParen);
        assert_eq!(e.span, Span::new(3, 4));

        let e = err("a + * -");
        assert_eq!(e.kind, RegexErrorKind::UnexpectedChar);
        assert_eq!(e.span, Span::new(6, 7));
        assert_eq!(err("a | ''").kind, RegexErrorKind::UnexpectedChar);
        assert_eq!(err("a 'b").kind, RegexErrorKind::PrematureEnd);

        assert_eq!(err("a^").kind, RegexErrorKind::IllegalRange);
        assert_eq!(err("a^[1,2]").kind, RegexErrorKind::IllegalRange);
        assert_eq!(err("a^[1..2").kind, RegexErrorKind::IllegalRange);
        assert_eq!(err("a^99999999999").kind, RegexErrorKind::IllegalRange);
        let e = err("a^[3..2]");
        assert_eq!(e.kind, RegexErrorKind::InvalidRange);
        assert_eq!(e.span, Span::new(1, 8));
    }
}
