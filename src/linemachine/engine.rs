//! The state machine engine
//!
//!     An [Engine] is a registry of [State]s plus the loop that drives them over a
//!     [LineView]. Build it once per grammar; `run` can be called any number of times.
//!
//! The run loop
//!
//!     1. A fresh [Cursor] is bound to the input, positioned before the first line.
//!     2. The starting state's begin handler runs.
//!     3. Each line is read and offered to the current state (see [State] for the search
//!        order). The winning handler answers with a [Step]:
//!            - `Next`: its output is kept and, unless it says stay, the machine switches to
//!              the named state before reading the following line.
//!            - `RetryTransition` / `RetryState`: the same line is examined again, optionally
//!              in another state and restricted to one transition. Too many retries in a row
//!              abort the run.
//!     4. Reading past the last line runs the current state's end handler and finishes the
//!        run. A handler can finish the run the same way by returning
//!        [EngineError::EndOfInput].
//!
//!     Output fragments from every handler are collected in order and returned.
//!
//!     The context is threaded through every handler by mutable reference; it is dropped at
//!     the end of the run. Grammars that want it back keep it in the output or share state
//!     through an `Rc`.

pub mod cursor;

use std::collections::HashMap;

pub use cursor::{Cursor, Observer, ObserverId};

use super::config::EngineConfig;
use super::error::{EngineError, SetupError};
use super::lines::LineView;
use super::state::{NextState, State, Step};

/// States registered under their names, plus the run loop.
pub struct Engine<C, O> {
    states: HashMap<String, State<C, O>>,
    initial_state: String,
    current_state: Option<String>,
    config: EngineConfig,
    observers: Vec<(ObserverId, Observer)>,
    next_observer_id: usize,
}

impl<C, O> Engine<C, O> {
    /// Engine with the default configuration.
    ///
    /// The initial state does not need to be registered yet; `run` reports it if it never
    /// shows up.
    pub fn new(
        initial_state: impl Into<String>,
        states: impl IntoIterator<Item = State<C, O>>,
    ) -> Result<Self, SetupError> {
        Self::with_config(initial_state, states, EngineConfig::default())
    }

    pub fn with_config(
        initial_state: impl Into<String>,
        states: impl IntoIterator<Item = State<C, O>>,
        config: EngineConfig,
    ) -> Result<Self, SetupError> {
        let mut engine = Engine {
            states: HashMap::new(),
            initial_state: initial_state.into(),
            current_state: None,
            config,
            observers: Vec::new(),
            next_observer_id: 0,
        };
        engine.add_states(states)?;
        Ok(engine)
    }

    /// Register a state; its name must be new
    pub fn add_state(&mut self, state: State<C, O>) -> Result<(), SetupError> {
        if self.states.contains_key(state.name()) {
            return Err(SetupError::DuplicateState(state.name().to_string()));
        }
        self.states.insert(state.name().to_string(), state);
        Ok(())
    }

    pub fn add_states(
        &mut self,
        states: impl IntoIterator<Item = State<C, O>>,
    ) -> Result<(), SetupError> {
        for state in states {
            self.add_state(state)?;
        }
        Ok(())
    }

    pub fn state(&self, name: &str) -> Option<&State<C, O>> {
        self.states.get(name)
    }

    /// Mutable access, e.g. to add transitions to a registered state
    pub fn state_mut(&mut self, name: &str) -> Option<&mut State<C, O>> {
        self.states.get_mut(name)
    }

    /// Registered state names, sorted
    pub fn state_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.states.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn initial_state(&self) -> &str {
        &self.initial_state
    }

    /// State the most recent run finished in; `None` before the first run
    pub fn current_state(&self) -> Option<&str> {
        self.current_state.as_deref()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Register an observer for the next run.
    ///
    /// Observers are called on every line position change and are dropped when the run
    /// returns.
    pub fn attach_observer<F>(&mut self, observer: F) -> ObserverId
    where
        F: FnMut(&str, isize) + 'static,
    {
        let id = ObserverId(self.next_observer_id);
        self.next_observer_id += 1;
        self.observers.push((id, Box::new(observer)));
        id
    }

    pub fn detach_observer(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(observer_id, _)| *observer_id != id);
        self.observers.len() != before
    }

    fn lookup(&self, name: &str) -> Result<&State<C, O>, EngineError> {
        self.states
            .get(name)
            .ok_or_else(|| EngineError::UnknownState(name.to_string()))
    }

    /// Run the machine over `input`.
    ///
    /// `input_offset` is the offset of `input` from the start of the whole file; it only
    /// affects absolute line numbers. `initial_state` overrides the engine's initial state
    /// for this run.
    pub fn run(
        &mut self,
        input: &LineView,
        input_offset: usize,
        mut context: C,
        initial_state: Option<&str>,
    ) -> Result<Vec<O>, EngineError> {
        let start = initial_state.unwrap_or(&self.initial_state).to_string();
        let observers = std::mem::take(&mut self.observers);
        let mut cursor = Cursor::new(
            input.clone(),
            input_offset,
            observers,
            self.next_observer_id,
            self.config.debug,
        );

        let result = self.drive(&mut cursor, &mut context, start);
        self.current_state = Some(cursor.current_state().to_string()).filter(|s| !s.is_empty());
        result
    }

    fn drive(
        &self,
        cursor: &mut Cursor,
        context: &mut C,
        start: String,
    ) -> Result<Vec<O>, EngineError> {
        let debug = self.config.debug;
        if debug {
            tracing::debug!(
                message = "Run started.",
                state = %start,
                lines = cursor.input().len(),
                input_offset = cursor.input_offset(),
            );
        }

        let mut state = self.lookup(&start)?;
        cursor.set_state(state.name());
        let mut results = state.begin(cursor, context)?;

        loop {
            let line = match cursor.next_line() {
                Ok(line) => line.to_string(),
                Err(EngineError::EndOfInput) => {
                    if debug {
                        tracing::debug!(message = "End of input.", state = %state.name());
                    }
                    results.extend(state.end(cursor, context)?);
                    break;
                }
                Err(err) => return Err(err),
            };
            if debug {
                tracing::debug!(
                    message = "Line read.",
                    state = %state.name(),
                    line = cursor.abs_line_number(),
                    text = %line,
                );
            }

            let mut only: Option<String> = None;
            let mut corrections = 0;
            let step = loop {
                match state.check_line(cursor, &line, context, only.as_deref()) {
                    Ok(Step::Next {
                        next_state,
                        output,
                    }) => break Ok((next_state, output)),
                    Ok(Step::RetryTransition { transition }) => {
                        only = Some(transition);
                    }
                    Ok(Step::RetryState {
                        state: name,
                        transition,
                    }) => {
                        state = self.lookup(&name)?;
                        cursor.set_state(state.name());
                        only = transition;
                    }
                    Err(err) => break Err(err),
                }

                corrections += 1;
                if corrections > self.config.correction_limit {
                    let line = cursor.abs_line_number().max(0) as usize;
                    tracing::warn!(
                        message = "Correction limit reached.",
                        state = %state.name(),
                        line,
                        limit = self.config.correction_limit,
                    );
                    return Err(EngineError::CorrectionLimit {
                        line,
                        limit: self.config.correction_limit,
                    });
                }
                if debug {
                    tracing::debug!(
                        message = "Retrying line.",
                        state = %state.name(),
                        transition = ?only,
                    );
                }
            };

            match step {
                Ok((next_state, output)) => {
                    results.extend(output);
                    if let NextState::Goto(name) = next_state {
                        let next = self.lookup(&name)?;
                        if debug && next.name() != state.name() {
                            tracing::debug!(
                                message = "State changed.",
                                from = %state.name(),
                                to = %next.name(),
                            );
                        }
                        state = next;
                        cursor.set_state(state.name());
                    }
                }
                Err(EngineError::EndOfInput) => {
                    if debug {
                        tracing::debug!(message = "Input ended by handler.", state = %state.name());
                    }
                    results.extend(state.end(cursor, context)?);
                    break;
                }
                Err(err) => return Err(err),
            }
        }

        Ok(results)
    }
}

impl<C, O> std::fmt::Debug for Engine<C, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("states", &self.state_names())
            .field("initial_state", &self.initial_state)
            .field("current_state", &self.current_state)
            .field("config", &self.config)
            .field("observers", &self.observers.len())
            .finish()
    }
}
