//! # linemachine
//!
//! Reusable machinery for line-oriented text parsers.
//!
//! Two pieces live here, and they only make sense together:
//!
//!     1. [LineView](linemachine::lines::LineView): a sequence of input lines that remembers
//!        where every line came from, and that can be sliced into child views whose edits
//!        flow back up to the parent.
//!     2. [Engine](linemachine::engine::Engine): a state machine that walks a view one line
//!        at a time, trying each state's regex transitions in order and calling the first
//!        handler that matches.
//!
//! A concrete grammar (patterns, handlers, state names) is supplied by the caller. See the
//! [testing module](linemachine::testing) for small grammars used throughout the tests.

pub mod linemachine;

pub use linemachine::engine::{Cursor, Engine, ObserverId};
pub use linemachine::error::{EngineError, SetupError, ViewError};
pub use linemachine::lines::{Line, LineInfo, LineView};
pub use linemachine::state::{NextState, State, StateBuilder, Step, Transition};
