//! States and transitions
//!
//!     A [State] is a named set of transitions. A [Transition] pairs a regex pattern with a
//!     handler and a proposed next state. When the engine reads a line it asks the current
//!     state to try its transitions in order; the first pattern that matches at the start of
//!     the line wins and its handler runs. Nothing ranks matches beyond that order.
//!
//! Building a state
//!
//!     Grammars describe a state as data: a table of named patterns, a table of named
//!     handlers, and an ordered list of `(transition name, next state)` pairs. The builder
//!     resolves every pair against both tables when [StateBuilder::build] runs, so a missing
//!     pattern or handler is a [SetupError] before any input is read, never a surprise in the
//!     middle of a run.
//!
//!     ```rust,ignore
//!     let body = State::builder("Body")
//!         .pattern("blank", r"\s*$")
//!         .pattern("text", r".+")
//!         .handler("blank", |_, _, _, next| Ok(Step::to(next, vec![])))
//!         .handler("text", |_, caps, _, next| Ok(Step::to(next, vec![caps[0].to_string()])))
//!         .transitions([("blank", NextState::Stay), ("text", "Body".into())])
//!         .build()?;
//!     ```
//!
//! Search order
//!
//!     Transitions listed at build time are tried in list order. Transitions added later with
//!     [State::add_transition] or [State::add_transitions] go to the front: the most recent
//!     additions are tried first.
//!
//! Handlers
//!
//!     Every handler gets the run's [Cursor] (for navigation), and the run context by mutable
//!     reference. Transition handlers also get the regex captures and the proposed next
//!     state, and answer with a [Step]. Besides transition handlers, a state has three
//!     implicit events: begin of input, end of input, and "no transition matched". Their
//!     defaults produce no output and keep the current state.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use regex::{Captures, Regex};

use super::engine::Cursor;
use super::error::{EngineError, SetupError};

/// Where the machine goes after a transition.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NextState {
    /// Remain in the current state
    Stay,
    /// Switch to the named state
    Goto(String),
}

impl NextState {
    pub fn goto(name: impl Into<String>) -> Self {
        NextState::Goto(name.into())
    }

    pub fn is_stay(&self) -> bool {
        matches!(self, NextState::Stay)
    }

    /// Target state name, `None` for [NextState::Stay]
    pub fn name(&self) -> Option<&str> {
        match self {
            NextState::Stay => None,
            NextState::Goto(name) => Some(name),
        }
    }
}

impl From<&str> for NextState {
    fn from(name: &str) -> Self {
        NextState::Goto(name.to_string())
    }
}

impl From<String> for NextState {
    fn from(name: String) -> Self {
        NextState::Goto(name)
    }
}

impl fmt::Display for NextState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NextState::Stay => write!(f, "<stay>"),
            NextState::Goto(name) => write!(f, "{}", name),
        }
    }
}

/// What a handler asks the engine to do next.
#[derive(Debug, Clone, PartialEq)]
pub enum Step<O> {
    /// Append `output` and move on to the next line in `next_state`
    Next { next_state: NextState, output: Vec<O> },
    /// Re-read the current line, trying only `transition` of the current state
    RetryTransition { transition: String },
    /// Switch to `state` and re-read the current line, optionally trying only `transition`
    RetryState {
        state: String,
        transition: Option<String>,
    },
}

impl<O> Step<O> {
    /// Keep the current state
    pub fn stay(output: Vec<O>) -> Self {
        Step::Next {
            next_state: NextState::Stay,
            output,
        }
    }

    /// Switch to `state`
    pub fn goto(state: impl Into<String>, output: Vec<O>) -> Self {
        Step::Next {
            next_state: NextState::Goto(state.into()),
            output,
        }
    }

    /// Follow the next state proposed by the transition table
    pub fn to(next_state: &NextState, output: Vec<O>) -> Self {
        Step::Next {
            next_state: next_state.clone(),
            output,
        }
    }
}

/// Handler for a matched transition
pub type TransitionHandler<C, O> =
    Rc<dyn Fn(&mut Cursor, &Captures<'_>, &mut C, &NextState) -> Result<Step<O>, EngineError>>;
/// Handler for begin and end of input
pub type EventHandler<C, O> = Rc<dyn Fn(&mut Cursor, &mut C) -> Result<Vec<O>, EngineError>>;
/// Handler for lines no transition matched
pub type NoMatchHandler<C, O> = Rc<dyn Fn(&mut Cursor, &mut C) -> Result<Step<O>, EngineError>>;

fn no_output<C, O>(_: &mut Cursor, _: &mut C) -> Result<Vec<O>, EngineError> {
    Ok(Vec::new())
}

fn stay_silent<C, O>(_: &mut Cursor, _: &mut C) -> Result<Step<O>, EngineError> {
    Ok(Step::stay(Vec::new()))
}

/// Patterns are matched from the start of the line.
fn compile_pattern(name: &str, pattern: &str) -> Result<Regex, SetupError> {
    Regex::new(&format!("^(?:{})", pattern)).map_err(|e| SetupError::InvalidPattern {
        name: name.to_string(),
        message: e.to_string(),
    })
}

/// A named (pattern, handler, next state) triple.
pub struct Transition<C, O> {
    name: String,
    pattern: Regex,
    handler: TransitionHandler<C, O>,
    next_state: NextState,
}

impl<C, O> Transition<C, O> {
    /// Compile `pattern` and bundle it with `handler`
    pub fn new<F>(
        name: impl Into<String>,
        pattern: &str,
        handler: F,
        next_state: NextState,
    ) -> Result<Self, SetupError>
    where
        F: Fn(&mut Cursor, &Captures<'_>, &mut C, &NextState) -> Result<Step<O>, EngineError>
            + 'static,
    {
        let name = name.into();
        let pattern = compile_pattern(&name, pattern)?;
        Ok(Transition {
            name,
            pattern,
            handler: Rc::new(handler),
            next_state,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The compiled, start-anchored pattern
    pub fn pattern(&self) -> &Regex {
        &self.pattern
    }

    pub fn next_state(&self) -> &NextState {
        &self.next_state
    }

    /// Captures if the pattern matches at the start of `line`
    pub fn matches<'l>(&self, line: &'l str) -> Option<Captures<'l>> {
        self.pattern.captures(line)
    }
}

impl<C, O> Clone for Transition<C, O> {
    fn clone(&self) -> Self {
        Transition {
            name: self.name.clone(),
            pattern: self.pattern.clone(),
            handler: Rc::clone(&self.handler),
            next_state: self.next_state.clone(),
        }
    }
}

impl<C, O> fmt::Debug for Transition<C, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transition")
            .field("name", &self.name)
            .field("pattern", &self.pattern.as_str())
            .field("next_state", &self.next_state)
            .field("handler", &"<handler>")
            .finish()
    }
}

/// A named collection of transitions plus begin/end/no-match handlers.
pub struct State<C, O> {
    name: String,
    patterns: HashMap<String, Regex>,
    handlers: HashMap<String, TransitionHandler<C, O>>,
    transition_order: Vec<String>,
    transitions: HashMap<String, Transition<C, O>>,
    on_begin: EventHandler<C, O>,
    on_end: EventHandler<C, O>,
    on_no_match: NoMatchHandler<C, O>,
}

impl<C: 'static, O: 'static> State<C, O> {
    pub fn builder(name: impl Into<String>) -> StateBuilder<C, O> {
        StateBuilder::new(name)
    }
}

impl<C, O> State<C, O> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Transition names in search order
    pub fn transition_names(&self) -> &[String] {
        &self.transition_order
    }

    pub fn transition(&self, name: &str) -> Option<&Transition<C, O>> {
        self.transitions.get(name)
    }

    /// Build a transition from this state's own pattern and handler tables
    pub fn make_transition(
        &self,
        name: &str,
        next_state: NextState,
    ) -> Result<Transition<C, O>, SetupError> {
        let pattern = self
            .patterns
            .get(name)
            .ok_or_else(|| SetupError::MissingPattern(name.to_string()))?;
        let handler = self
            .handlers
            .get(name)
            .ok_or_else(|| SetupError::MissingHandler(name.to_string()))?;
        Ok(Transition {
            name: name.to_string(),
            pattern: pattern.clone(),
            handler: Rc::clone(handler),
            next_state,
        })
    }

    /// Add transitions ahead of the existing ones, keeping their relative order.
    ///
    /// Nothing is added if any name is already present (or repeated in `transitions`).
    pub fn add_transitions(&mut self, transitions: Vec<Transition<C, O>>) -> Result<(), SetupError> {
        let mut seen: Vec<&str> = Vec::with_capacity(transitions.len());
        for transition in &transitions {
            let name = transition.name();
            if self.transitions.contains_key(name) || seen.contains(&name) {
                return Err(SetupError::DuplicateTransition(name.to_string()));
            }
            seen.push(name);
        }

        let names: Vec<String> = transitions.iter().map(|t| t.name.clone()).collect();
        self.transition_order.splice(0..0, names);
        for transition in transitions {
            self.transitions.insert(transition.name.clone(), transition);
        }
        Ok(())
    }

    /// Add one transition ahead of the existing ones
    pub fn add_transition(&mut self, transition: Transition<C, O>) -> Result<(), SetupError> {
        self.add_transitions(vec![transition])
    }

    pub fn remove_transition(&mut self, name: &str) -> Result<Transition<C, O>, SetupError> {
        let transition = self
            .transitions
            .remove(name)
            .ok_or_else(|| SetupError::UnknownTransition(name.to_string()))?;
        self.transition_order.retain(|n| n != name);
        Ok(transition)
    }

    pub(crate) fn begin(&self, cursor: &mut Cursor, context: &mut C) -> Result<Vec<O>, EngineError> {
        (self.on_begin)(cursor, context)
    }

    pub(crate) fn end(&self, cursor: &mut Cursor, context: &mut C) -> Result<Vec<O>, EngineError> {
        (self.on_end)(cursor, context)
    }

    /// Try the transitions in order against `line` and run the winner's handler.
    ///
    /// `only` restricts the search to one transition (used when a handler asked to retry
    /// the line with a specific transition).
    pub(crate) fn check_line(
        &self,
        cursor: &mut Cursor,
        line: &str,
        context: &mut C,
        only: Option<&str>,
    ) -> Result<Step<O>, EngineError> {
        let candidates: Vec<&Transition<C, O>> = match only {
            Some(name) => vec![self
                .transitions
                .get(name)
                .ok_or_else(|| SetupError::UnknownTransition(name.to_string()))?],
            None => self
                .transition_order
                .iter()
                .filter_map(|name| self.transitions.get(name))
                .collect(),
        };

        for transition in candidates {
            if let Some(captures) = transition.matches(line) {
                if cursor.debug {
                    tracing::debug!(
                        message = "Transition matched.",
                        state = %self.name,
                        transition = %transition.name,
                        line = cursor.abs_line_number(),
                    );
                }
                return (transition.handler)(cursor, &captures, context, &transition.next_state);
            }
        }

        if cursor.debug {
            tracing::debug!(
                message = "No transition matched.",
                state = %self.name,
                line = cursor.abs_line_number(),
            );
        }
        (self.on_no_match)(cursor, context)
    }
}

impl<C, O> fmt::Debug for State<C, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut patterns: Vec<(&str, &str)> = self
            .patterns
            .iter()
            .map(|(name, regex)| (name.as_str(), regex.as_str()))
            .collect();
        patterns.sort();
        f.debug_struct("State")
            .field("name", &self.name)
            .field("patterns", &patterns)
            .field("transition_order", &self.transition_order)
            .finish()
    }
}

/// Builder for [State]; see the [module docs](self).
pub struct StateBuilder<C, O> {
    name: String,
    patterns: Vec<(String, String)>,
    handlers: HashMap<String, TransitionHandler<C, O>>,
    initial_transitions: Vec<(String, NextState)>,
    on_begin: Option<EventHandler<C, O>>,
    on_end: Option<EventHandler<C, O>>,
    on_no_match: Option<NoMatchHandler<C, O>>,
}

impl<C: 'static, O: 'static> StateBuilder<C, O> {
    pub fn new(name: impl Into<String>) -> Self {
        StateBuilder {
            name: name.into(),
            patterns: Vec::new(),
            handlers: HashMap::new(),
            initial_transitions: Vec::new(),
            on_begin: None,
            on_end: None,
            on_no_match: None,
        }
    }

    /// Register a named pattern. A later pattern under the same name replaces the earlier one.
    pub fn pattern(mut self, name: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.patterns.push((name.into(), pattern.into()));
        self
    }

    /// Register a table of `(name, pattern)` pairs
    pub fn patterns(mut self, table: &[(&str, &str)]) -> Self {
        self.patterns.extend(
            table
                .iter()
                .map(|(name, pattern)| (name.to_string(), pattern.to_string())),
        );
        self
    }

    /// Register the handler for transition `name`
    pub fn handler<F>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&mut Cursor, &Captures<'_>, &mut C, &NextState) -> Result<Step<O>, EngineError>
            + 'static,
    {
        self.handlers.insert(name.into(), Rc::new(handler));
        self
    }

    /// Append one `(transition name, next state)` pair to the initial search order
    pub fn transition(mut self, name: impl Into<String>, next_state: NextState) -> Self {
        self.initial_transitions.push((name.into(), next_state));
        self
    }

    /// Append `(transition name, next state)` pairs to the initial search order
    pub fn transitions<N, I>(mut self, pairs: I) -> Self
    where
        N: Into<String>,
        I: IntoIterator<Item = (N, NextState)>,
    {
        self.initial_transitions
            .extend(pairs.into_iter().map(|(name, next)| (name.into(), next)));
        self
    }

    pub fn on_begin<F>(mut self, handler: F) -> Self
    where
        F: Fn(&mut Cursor, &mut C) -> Result<Vec<O>, EngineError> + 'static,
    {
        self.on_begin = Some(Rc::new(handler));
        self
    }

    pub fn on_end<F>(mut self, handler: F) -> Self
    where
        F: Fn(&mut Cursor, &mut C) -> Result<Vec<O>, EngineError> + 'static,
    {
        self.on_end = Some(Rc::new(handler));
        self
    }

    pub fn on_no_match<F>(mut self, handler: F) -> Self
    where
        F: Fn(&mut Cursor, &mut C) -> Result<Step<O>, EngineError> + 'static,
    {
        self.on_no_match = Some(Rc::new(handler));
        self
    }

    /// Compile the patterns and resolve the initial transitions.
    pub fn build(self) -> Result<State<C, O>, SetupError> {
        let mut patterns = HashMap::with_capacity(self.patterns.len());
        for (name, pattern) in &self.patterns {
            let regex = compile_pattern(name, pattern)?;
            patterns.insert(name.clone(), regex);
        }

        let mut state = State {
            name: self.name,
            patterns,
            handlers: self.handlers,
            transition_order: Vec::new(),
            transitions: HashMap::new(),
            on_begin: self.on_begin.unwrap_or_else(|| Rc::new(no_output::<C, O>)),
            on_end: self.on_end.unwrap_or_else(|| Rc::new(no_output::<C, O>)),
            on_no_match: self
                .on_no_match
                .unwrap_or_else(|| Rc::new(stay_silent::<C, O>)),
        };

        let transitions = self
            .initial_transitions
            .into_iter()
            .map(|(name, next)| state.make_transition(&name, next))
            .collect::<Result<Vec<_>, _>>()?;
        state.add_transitions(transitions)?;
        Ok(state)
    }
}
