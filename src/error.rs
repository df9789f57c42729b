//! The closed error-kind set. Each layer gets its own variant family so a
//! caller can match on what failed without downcasting.

use thiserror::Error;

/// Errors raised while lexing/parsing a grammar file into a token graph.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("line {line}: expected {expected:?}, found {found:?}")]
    ExpectRune {
        line: usize,
        expected: char,
        found: Option<char>,
    },

    #[error("line {line}: invalid token name {name:?}")]
    InvalidTokenName { line: usize, name: String },

    #[error("line {line}: token {name:?} is not defined")]
    TokenNotDefined { line: usize, name: String },

    #[error("line {line}: token {name:?} is already defined")]
    TokenAlreadyDefined { line: usize, name: String },

    #[error("line {line}: unterminated string literal")]
    NonTerminatedString { line: usize },

    #[error("line {line}: unexpected token definition termination")]
    UnexpectedTokenDefinitionTermination { line: usize },

    #[error("line {line}: newline needed")]
    NewLineNeeded { line: usize },

    #[error("line {line}: unexpected newline")]
    EarlyNewLine { line: usize },

    #[error("line {line}: empty token definition for {name:?}")]
    EmptyTokenDefinition { line: usize, name: String },

    #[error("line {line}: invalid argument value for {arg:?}: {value:?}")]
    InvalidArgumentValue {
        line: usize,
        arg: String,
        value: String,
    },

    #[error("line {line}: special token {kind:?} is missing argument {arg:?}")]
    MissingSpecialTokenArgument {
        line: usize,
        kind: String,
        arg: String,
    },

    #[error("line {line}: unknown special token type {kind:?}")]
    UnknownSpecialTokenType { line: usize, kind: String },

    #[error("line {line}: unknown argument {arg:?} for special token {kind:?}")]
    UnknownSpecialTokenArgument {
        line: usize,
        kind: String,
        arg: String,
    },

    #[error("line {line}: unknown token attribute {attr:?} on {name:?}")]
    UnknownTokenAttribute {
        line: usize,
        name: String,
        attr: String,
    },

    #[error("no START token defined")]
    NoStart,

    #[error("token {name:?} is defined but never used")]
    UnusedToken { name: String },
}

/// Errors raised by token operations (`set_permutation`, sequence probing).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("index {index} out of bound, permutations = {permutations}")]
    IndexOutOfBound { index: u64, permutations: u64 },

    #[error("list index {index} out of bound, len = {len}")]
    ListOutOfBound { index: usize, len: usize },

    #[error("no sequence value available (all candidates excluded)")]
    NoSequenceValue,

    #[error("token does not support matching against raw input")]
    NotMatchable,
}

/// Errors raised while constructing or driving a strategy.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StrategyError {
    #[error("endless loop detected in token graph")]
    EndlessLoopDetected,

    #[error("unknown strategy {name:?}")]
    UnknownStrategy { name: String },
}

/// Errors surfaced by filter application.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("filter {filter:?} failed: {context}")]
pub struct FilterError {
    pub filter: String,
    pub context: String,
}

/// Top-level union, used at the driver boundary where any layer's error may
/// surface.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Strategy(#[from] StrategyError),

    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error("unknown filter {name:?}")]
    UnknownFilter { name: String },

    #[error("io error: {0}")]
    Io(String),
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}
