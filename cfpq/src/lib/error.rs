use std::{error::Error, fmt};

use cfpqautomata::AutomatonError;
use cfpqgrammar::{RegexError, RsmError, RsmErrorKind};

/// The errors a query can fail with.
#[derive(Debug, PartialEq, Eq)]
pub enum CfpqError {
    /// An automaton built from the query's inputs references states it doesn't declare.
    Automaton(AutomatonError),
    /// The query's language could not be turned into a recursive state machine.
    Rsm(RsmError),
    /// The matrix solver was given a grammar which isn't in weak normal form. Holds the first
    /// offending production, pretty printed.
    InvalidGrammarForm(String),
    /// An empty start or final node set was given under [`EmptySetPolicy::Reject`].
    ///
    /// [`EmptySetPolicy::Reject`]: crate::EmptySetPolicy::Reject
    EmptyQuery,
}

impl Error for CfpqError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            CfpqError::Automaton(e) => Some(e),
            CfpqError::Rsm(e) => Some(e),
            CfpqError::InvalidGrammarForm(_) | CfpqError::EmptyQuery => None,
        }
    }
}

impl fmt::Display for CfpqError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CfpqError::Automaton(e) => write!(f, "{}", e),
            CfpqError::Rsm(e) => write!(f, "{}", e),
            CfpqError::InvalidGrammarForm(p) => {
                write!(f, "Production '{}' is not in weak normal form", p)
            }
            CfpqError::EmptyQuery => write!(f, "Empty start or final node set"),
        }
    }
}

impl From<AutomatonError> for CfpqError {
    fn from(e: AutomatonError) -> Self {
        CfpqError::Automaton(e)
    }
}

impl From<RsmError> for CfpqError {
    fn from(e: RsmError) -> Self {
        CfpqError::Rsm(e)
    }
}

/// A regular expression that can't be compiled is reported as an RSM error, as it would be if the
/// expression were first turned into an RSM.
impl From<RegexError> for CfpqError {
    fn from(e: RegexError) -> Self {
        CfpqError::Rsm(RsmError {
            span: Some(e.span),
            kind: RsmErrorKind::Regex(e),
        })
    }
}

/// Build the error for an RSM whose box `label` is referenced but not defined.
pub(crate) fn unknown_box(label: &str) -> CfpqError {
    CfpqError::Rsm(RsmError {
        kind: RsmErrorKind::UnknownBoxReference(label.to_owned()),
        span: None,
    })
}

#[cfg(test)]
mod test {
    use std::error::Error;

    use cfpqgrammar::Rsm;

    use super::CfpqError;

    #[test]
    fn test_source_chain() {
        let e = CfpqError::from(Rsm::from_text("S -> a (").unwrap_err());
        assert!(e.source().is_some());
        assert!(CfpqError::EmptyQuery.source().is_none());
        assert_eq!(
            CfpqError::InvalidGrammarForm("S -> a b".to_owned()).to_string(),
            "Production 'S -> a b' is not in weak normal form"
        );
    }
}
