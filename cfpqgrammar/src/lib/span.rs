#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A `Span` records what portion of the user's input something (e.g. a rule or a regex atom)
/// references (i.e. the `Span` doesn't hold a reference / copy of the actual input).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Span {
    start: usize,
    end: usize,
}

impl Span {
    /// Create a new span starting at byte `start` and ending at byte `end`.
    ///
    /// # Panics
    ///
    /// If `end` is less than `start`.
    pub fn new(start: usize, end: usize) -> Self {
        if end < start {
            panic!("Span starts ({}) after it ends ({})!", start, end);
        }
        Span { start, end }
    }

    /// Byte offset of the start of the span.
    pub fn start(&self) -> usize {
        self.start
    }

    /// Byte offset of the end of the span.
    pub fn end(&self) -> usize {
        self.end
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return a copy of this span moved `off` bytes to the right. Used when a piece of a larger
    /// input (e.g. the regex on the right of an RSM box definition) is parsed on its own.
    pub fn offset(&self, off: usize) -> Self {
        Span::new(self.start + off, self.end + off)
    }

    /// Return the 1-based `(line, column)` at which this span starts in `src`. Columns count
    /// characters, not bytes. Returns `None` if the span lies outside `src`.
    pub fn line_col(&self, src: &str) -> Option<(usize, usize)> {
        if self.start > src.len() || !src.is_char_boundary(self.start) {
            return None;
        }
        let before = &src[..self.start];
        let line = before.matches('\n').count() + 1;
        let line_start = before.rfind('\n').map(|i| i + 1).unwrap_or(0);
        Some((line, src[line_start..self.start].chars().count() + 1))
    }
}
