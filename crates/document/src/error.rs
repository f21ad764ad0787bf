/// A malformed document. Line and column are 1-based and point at the
/// offending character where one can be identified.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("line {line}, column {column}: {reason}")]
pub struct ParseError {
    pub line: usize,
    pub column: usize,
    pub reason: ParseErrorReason,
}

/// Why a document failed to parse.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseErrorReason {
    #[error("tab characters are not allowed outside quoted scalars")]
    TabCharacter,
    #[error("duplicate key `{0}`")]
    DuplicateKey(String),
    #[error("unterminated quoted scalar")]
    UnterminatedQuote,
    #[error("invalid escape sequence `{0}`")]
    InvalidEscape(String),
    #[error("inconsistent indentation")]
    BadIndentation,
    #[error("unexpected content: {0}")]
    UnexpectedContent(String),
    #[error("unclosed flow collection, expected `{0}`")]
    UnclosedFlow(char),
    #[error("collections nest deeper than {0} levels")]
    NestingTooDeep(usize),
}

impl ParseError {
    pub fn new(line: usize, column: usize, reason: ParseErrorReason) -> Self {
        Self {
            line,
            column,
            reason,
        }
    }

    pub(crate) fn unexpected(line: usize, column: usize, what: impl Into<String>) -> Self {
        Self::new(line, column, ParseErrorReason::UnexpectedContent(what.into()))
    }
}
