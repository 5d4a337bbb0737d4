//! Error types for line views and the state machine
//!
//!     Failures fall into three groups, and callers treat them very differently:
//!
//!         - [SetupError]: the grammar itself is broken (duplicate state, missing handler,
//!           bad pattern). Always raised before a run starts.
//!         - [ViewError]: an index or range fell outside a [LineView](super::lines::LineView),
//!           or a text block was indented where it should not be. Recoverable; grammars use
//!           these as ordinary "no more data" or "not this construct" signals.
//!         - [EngineError]: what a run returns. Wraps the other two and adds the run-level
//!           conditions (end of input, unknown next state, runaway corrections).
//!
//!     Malformed input text never produces an error by itself: at worst no transition
//!     matches and the state's no-match handler runs.

use std::fmt;

use super::lines::LineView;

/// Failure of an operation on a [LineView].
#[derive(Debug, Clone, PartialEq)]
pub enum ViewError {
    /// Index outside `0..len`
    Index { index: usize, len: usize },
    /// `trim_start`/`trim_end` asked for more items than the view holds
    TrimOutOfRange { n: usize, len: usize },
    /// A `start..stop` range that is reversed or runs past the end
    InvalidRange { start: usize, stop: usize, len: usize },
    /// Text and provenance sequences of different lengths
    LengthMismatch { data: usize, items: usize },
    /// Inserted lines must carry a source id
    EmptySource,
    /// An indented line showed up inside a flush-left text block.
    ///
    /// `block` holds the lines scanned before the offending one, `source` and `line`
    /// (1-based) locate the offending line in its origin.
    UnexpectedIndentation {
        block: LineView,
        source: String,
        line: isize,
    },
}

impl fmt::Display for ViewError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViewError::Index { index, len } => {
                write!(f, "index {} out of range for view of length {}", index, len)
            }
            ViewError::TrimOutOfRange { n, len } => {
                write!(f, "cannot trim {} items from view of length {}", n, len)
            }
            ViewError::InvalidRange { start, stop, len } => write!(
                f,
                "invalid range {}..{} for view of length {}",
                start, stop, len
            ),
            ViewError::LengthMismatch { data, items } => write!(
                f,
                "{} lines but {} (source, offset) items",
                data, items
            ),
            ViewError::EmptySource => write!(f, "inserted lines need a non-empty source id"),
            ViewError::UnexpectedIndentation { source, line, .. } => {
                write!(f, "unexpected indentation at {}:{}", source, line)
            }
        }
    }
}

impl std::error::Error for ViewError {}

/// A defect in a grammar definition, detected while building states or the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum SetupError {
    /// Two states registered under the same name
    DuplicateState(String),
    /// Two transitions with the same name in one state
    DuplicateTransition(String),
    /// A transition name that the state does not know
    UnknownTransition(String),
    /// No pattern registered for the transition name
    MissingPattern(String),
    /// No handler registered for the transition name
    MissingHandler(String),
    /// The pattern failed to compile
    InvalidPattern { name: String, message: String },
}

impl fmt::Display for SetupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SetupError::DuplicateState(name) => write!(f, "state '{}' already exists", name),
            SetupError::DuplicateTransition(name) => {
                write!(f, "transition '{}' already exists", name)
            }
            SetupError::UnknownTransition(name) => write!(f, "unknown transition '{}'", name),
            SetupError::MissingPattern(name) => {
                write!(f, "no pattern registered for transition '{}'", name)
            }
            SetupError::MissingHandler(name) => {
                write!(f, "no handler registered for transition '{}'", name)
            }
            SetupError::InvalidPattern { name, message } => {
                write!(f, "invalid pattern for transition '{}': {}", name, message)
            }
        }
    }
}

impl std::error::Error for SetupError {}

/// Error returned from a state machine run (or raised by a handler inside one).
#[derive(Debug, Clone, PartialEq)]
pub enum EngineError {
    /// Grammar defect; also raised mid-run when a correction names an unknown transition
    Setup(SetupError),
    /// A view operation failed inside a handler
    View(ViewError),
    /// The cursor moved past the last line.
    ///
    /// Inside a run this is the normal way out: returned from a handler it ends the run
    /// through the current state's end-of-input handler.
    EndOfInput,
    /// A handler named a next state that was never registered
    UnknownState(String),
    /// Handlers kept asking to re-examine the same line
    CorrectionLimit { line: usize, limit: usize },
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::Setup(err) => write!(f, "setup error: {}", err),
            EngineError::View(err) => write!(f, "view error: {}", err),
            EngineError::EndOfInput => write!(f, "end of input"),
            EngineError::UnknownState(name) => write!(f, "unknown state '{}'", name),
            EngineError::CorrectionLimit { line, limit } => write!(
                f,
                "more than {} corrections on input line {}",
                limit, line
            ),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::Setup(err) => Some(err),
            EngineError::View(err) => Some(err),
            _ => None,
        }
    }
}

impl From<SetupError> for EngineError {
    fn from(err: SetupError) -> Self {
        EngineError::Setup(err)
    }
}

impl From<ViewError> for EngineError {
    fn from(err: ViewError) -> Self {
        EngineError::View(err)
    }
}
