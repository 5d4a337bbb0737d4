//! Per-run line position and navigation
//!
//!     A [Cursor] is created by [Engine::run](super::Engine::run) for every run and handed to
//!     each handler. It owns everything that changes while input is consumed: the bound
//!     view, the current line and its offset, the current state name and the observers.
//!     Nothing of it outlives the run, so repeated runs (or several engines) never see each
//!     other's position.
//!
//!     Offsets come in two flavors:
//!
//!         - local: index into the bound view (`-1` before the first line)
//!         - absolute: local offset plus the view's offset from the start of the whole file,
//!           as passed to `run`. Absolute line numbers are 1-based.

use std::fmt;

use crate::linemachine::error::{EngineError, ViewError};
use crate::linemachine::lines::text::IndentedBlock;
use crate::linemachine::lines::{LineInfo, LineView};

/// Handle returned by `attach_observer`, used to detach it again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(pub(crate) usize);

/// Called with `(source, offset)` of the current line after every position change, or
/// `("", -1)` when the position is not on a line.
pub type Observer = Box<dyn FnMut(&str, isize)>;

/// Navigation over the input of one run.
pub struct Cursor {
    input: LineView,
    input_offset: usize,
    line_offset: isize,
    line: Option<String>,
    state: String,
    observers: Vec<(ObserverId, Observer)>,
    next_observer_id: usize,
    pub(crate) debug: bool,
}

impl Cursor {
    pub(crate) fn new(
        input: LineView,
        input_offset: usize,
        observers: Vec<(ObserverId, Observer)>,
        next_observer_id: usize,
        debug: bool,
    ) -> Self {
        Cursor {
            input,
            input_offset,
            line_offset: -1,
            line: None,
            state: String::new(),
            observers,
            next_observer_id,
            debug,
        }
    }

    /// The view being consumed. It aliases the view passed to `run`.
    pub fn input(&self) -> &LineView {
        &self.input
    }

    /// Text of the current line, `None` before the first or after the last line
    pub fn line(&self) -> Option<&str> {
        self.line.as_deref()
    }

    /// Name of the state the machine is in
    pub fn current_state(&self) -> &str {
        &self.state
    }

    pub(crate) fn set_state(&mut self, name: &str) {
        if self.state != name {
            self.state = name.to_string();
        }
    }

    /// Offset of the bound view from the start of the file
    pub fn input_offset(&self) -> usize {
        self.input_offset
    }

    /// Current offset inside the bound view; `-1` before the first line
    pub fn line_offset(&self) -> isize {
        self.line_offset
    }

    /// Current offset from the start of the file
    pub fn abs_line_offset(&self) -> isize {
        self.line_offset + self.input_offset as isize
    }

    /// Current 1-based line number from the start of the file
    pub fn abs_line_number(&self) -> isize {
        self.abs_line_offset() + 1
    }

    pub fn at_bof(&self) -> bool {
        self.line_offset <= 0
    }

    pub fn at_eof(&self) -> bool {
        self.line_offset >= self.input.len() as isize - 1
    }

    fn fetch(&self, offset: isize) -> Option<String> {
        usize::try_from(offset)
            .ok()
            .and_then(|index| self.input.get(index).ok())
    }

    fn load(&mut self, offset: isize) -> Result<&str, EngineError> {
        self.line_offset = offset;
        self.line = self.fetch(offset);
        self.notify_observers();
        self.line.as_deref().ok_or(EngineError::EndOfInput)
    }

    /// Advance one line. Past the last line this fails with [EngineError::EndOfInput].
    pub fn next_line(&mut self) -> Result<&str, EngineError> {
        self.next_line_by(1)
    }

    /// Move `n` lines forward (backward for negative `n`)
    pub fn next_line_by(&mut self, n: isize) -> Result<&str, EngineError> {
        self.load(self.line_offset + n)
    }

    /// Step back one line; `None` once the cursor is before the first line
    pub fn previous_line(&mut self) -> Option<&str> {
        self.previous_line_by(1)
    }

    pub fn previous_line_by(&mut self, n: isize) -> Option<&str> {
        self.load(self.line_offset - n).ok()
    }

    /// Jump to an absolute line offset (relative to the start of the file)
    pub fn goto_line(&mut self, abs_line_offset: isize) -> Result<&str, EngineError> {
        self.load(abs_line_offset - self.input_offset as isize)
    }

    /// Next line's text without moving the cursor
    pub fn peek_next_line(&self) -> Option<String> {
        self.fetch(self.line_offset + 1)
    }

    /// Whether the next line is blank; also true at the end of input
    pub fn is_next_line_blank(&self) -> bool {
        self.peek_next_line()
            .map_or(true, |line| line.trim().is_empty())
    }

    /// Source id of the line at an absolute offset
    pub fn source_at(&self, abs_line_offset: isize) -> Result<String, EngineError> {
        let local = usize::try_from(abs_line_offset - self.input_offset as isize)
            .map_err(|_| EngineError::EndOfInput)?;
        Ok(self.input.source(local)?)
    }

    /// Source id and 1-based line number in that source.
    ///
    /// `lineno` is an absolute 1-based line number; `None` means the current line. Positions
    /// just past the end report the line after the last one.
    pub fn source_and_line(&self, lineno: Option<isize>) -> Option<(String, isize)> {
        let offset = match lineno {
            Some(lineno) => lineno - self.input_offset as isize - 1,
            None => self.line_offset,
        };
        let index = usize::try_from(offset).ok()?;
        let LineInfo { source, offset } = self.input.info(index).ok()?;
        if index == self.input.len() {
            let previous = self.input.info(index.checked_sub(1)?).ok()?;
            return Some((source, previous.offset + 2));
        }
        Some((source, offset + 1))
    }

    /// Splice `lines` in after the current line, between two blank padding lines.
    ///
    /// The padding lines carry synthetic source ids so positions inside the inserted
    /// text still resolve to `source`.
    pub fn insert_input<S: Into<String>>(
        &mut self,
        lines: impl IntoIterator<Item = S>,
        source: &str,
    ) -> Result<(), EngineError> {
        let block = LineView::new(lines, source);
        let at = usize::try_from(self.line_offset + 1).map_err(|_| EngineError::EndOfInput)?;
        self.input.insert_at(
            at,
            "",
            &format!("internal padding after {}", source),
            block.len() as isize,
        )?;
        self.input
            .insert_at(at, "", &format!("internal padding before {}", source), -1)?;
        self.input.insert_range(at + 1, &block)?;
        Ok(())
    }

    fn current_index(&self) -> Result<usize, EngineError> {
        usize::try_from(self.line_offset).map_err(|_| EngineError::EndOfInput)
    }

    /// Text block starting at the current line; the cursor ends on the block's last line.
    ///
    /// On an indentation error the cursor still moves to the last line scanned before the
    /// offending one.
    pub fn get_text_block(&mut self, flush_left: bool) -> Result<LineView, EngineError> {
        let start = self.current_index()?;
        match self.input.get_text_block(start, flush_left) {
            Ok(block) => {
                self.skip_block(&block)?;
                Ok(block)
            }
            Err(ViewError::UnexpectedIndentation {
                block,
                source,
                line,
            }) => {
                self.skip_block(&block)?;
                Err(ViewError::UnexpectedIndentation {
                    block,
                    source,
                    line,
                }
                .into())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Indented block starting at the current line; the cursor ends on its last line.
    ///
    /// Leading blank lines are dropped from the returned block. The second value is the
    /// absolute offset of the block's first remaining line.
    pub fn get_indented(
        &mut self,
        until_blank: bool,
        strip_indent: bool,
        block_indent: Option<usize>,
        first_indent: Option<usize>,
    ) -> Result<(IndentedBlock, isize), EngineError> {
        let mut offset = self.abs_line_offset();
        let start = self.current_index()?;
        let found =
            self.input
                .get_indented(start, until_blank, strip_indent, block_indent, first_indent)?;
        self.skip_block(&found.block)?;
        while !found.block.is_empty() && found.block.get(0)?.trim().is_empty() {
            found.block.trim_start(1)?;
            offset += 1;
        }
        Ok((found, offset))
    }

    fn skip_block(&mut self, block: &LineView) -> Result<(), EngineError> {
        if !block.is_empty() {
            self.next_line_by(block.len() as isize - 1)?;
        }
        Ok(())
    }

    /// Register an observer for the rest of this run
    pub fn attach_observer<F>(&mut self, observer: F) -> ObserverId
    where
        F: FnMut(&str, isize) + 'static,
    {
        let id = ObserverId(self.next_observer_id);
        self.next_observer_id += 1;
        self.observers.push((id, Box::new(observer)));
        id
    }

    /// Remove an observer; false if it was not attached
    pub fn detach_observer(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(observer_id, _)| *observer_id != id);
        self.observers.len() != before
    }

    fn notify_observers(&mut self) {
        if self.observers.is_empty() {
            return;
        }
        let info = usize::try_from(self.line_offset)
            .ok()
            .and_then(|index| self.input.info(index).ok())
            .unwrap_or_else(|| LineInfo::new("", -1));
        for (_, observer) in self.observers.iter_mut() {
            observer(&info.source, info.offset);
        }
    }
}

impl fmt::Debug for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursor")
            .field("state", &self.state)
            .field("input_offset", &self.input_offset)
            .field("line_offset", &self.line_offset)
            .field("line", &self.line)
            .field("observers", &self.observers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn cursor_over(lines: &[&str], input_offset: usize) -> Cursor {
        Cursor::new(
            LineView::new(lines.iter().copied(), "doc"),
            input_offset,
            Vec::new(),
            0,
            false,
        )
    }

    #[test]
    fn test_starts_before_first_line() {
        let cursor = cursor_over(&["a"], 0);
        assert_eq!(cursor.line_offset(), -1);
        assert_eq!(cursor.line(), None);
        assert!(cursor.at_bof());
    }

    #[test]
    fn test_next_and_previous() {
        let mut cursor = cursor_over(&["a", "b"], 0);
        assert_eq!(cursor.next_line().unwrap(), "a");
        assert_eq!(cursor.next_line().unwrap(), "b");
        assert!(cursor.at_eof());
        assert_eq!(cursor.next_line().unwrap_err(), EngineError::EndOfInput);
        assert_eq!(cursor.line(), None);

        assert_eq!(cursor.previous_line(), Some("b"));
        assert_eq!(cursor.previous_line_by(2), None);
        assert_eq!(cursor.line_offset(), -1);
    }

    #[test]
    fn test_absolute_offsets() {
        let mut cursor = cursor_over(&["a", "b", "c"], 10);
        cursor.next_line().unwrap();
        assert_eq!(cursor.abs_line_offset(), 10);
        assert_eq!(cursor.abs_line_number(), 11);

        assert_eq!(cursor.goto_line(12).unwrap(), "c");
        assert_eq!(cursor.line_offset(), 2);
        assert_eq!(cursor.goto_line(13).unwrap_err(), EngineError::EndOfInput);
        assert_eq!(cursor.goto_line(3).unwrap_err(), EngineError::EndOfInput);
        assert_eq!(cursor.source_at(11).unwrap(), "doc");
        assert_eq!(cursor.source_at(9).unwrap_err(), EngineError::EndOfInput);
    }

    #[test]
    fn test_peek_and_blank_probe() {
        let mut cursor = cursor_over(&["a", "  ", "c"], 0);
        cursor.next_line().unwrap();
        assert_eq!(cursor.peek_next_line().as_deref(), Some("  "));
        assert!(cursor.is_next_line_blank());
        assert_eq!(cursor.line(), Some("a"));

        cursor.goto_line(2).unwrap();
        assert!(cursor.is_next_line_blank());
    }

    #[test]
    fn test_source_and_line() {
        let mut cursor = cursor_over(&["a", "b"], 0);
        cursor.next_line().unwrap();
        assert_eq!(cursor.source_and_line(None), Some(("doc".to_string(), 1)));
        assert_eq!(cursor.source_and_line(Some(3)), Some(("doc".to_string(), 3)));
        assert_eq!(cursor.source_and_line(Some(9)), None);
    }

    #[test]
    fn test_observers_see_every_move() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut cursor = cursor_over(&["a"], 0);
        let sink = Rc::clone(&seen);
        let id = cursor.attach_observer(move |source, offset| {
            sink.borrow_mut().push((source.to_string(), offset))
        });

        cursor.next_line().unwrap();
        let _ = cursor.next_line();
        cursor.previous_line_by(2);
        assert!(cursor.detach_observer(id));
        assert!(!cursor.detach_observer(id));
        cursor.next_line().unwrap();

        assert_eq!(
            *seen.borrow(),
            [
                ("doc".to_string(), 0),
                ("doc".to_string(), -1),
                (String::new(), -1),
            ]
        );
    }

    #[test]
    fn test_insert_input_after_current_line() {
        let mut cursor = cursor_over(&["a", "b"], 0);
        cursor.next_line().unwrap();
        cursor.insert_input(["x", "y"], "include.txt").unwrap();

        assert_eq!(cursor.input().texts(), ["a", "", "x", "y", "", "b"]);
        assert_eq!(
            cursor.input().info(1).unwrap(),
            LineInfo::new("internal padding before include.txt", -1)
        );
        assert_eq!(cursor.input().info(3).unwrap(), LineInfo::new("include.txt", 1));
        assert_eq!(
            cursor.input().info(4).unwrap(),
            LineInfo::new("internal padding after include.txt", 2)
        );
    }

    #[test]
    fn test_get_text_block_moves_to_last_line() {
        let mut cursor = cursor_over(&["one", "two", "", "three"], 0);
        cursor.next_line().unwrap();
        let block = cursor.get_text_block(false).unwrap();
        assert_eq!(block.texts(), ["one", "two"]);
        assert_eq!(cursor.line(), Some("two"));
        assert!(cursor.is_next_line_blank());
    }

    #[test]
    fn test_get_text_block_indentation_error_still_moves() {
        let mut cursor = cursor_over(&["one", "two", "  three", ""], 0);
        cursor.next_line().unwrap();
        let err = cursor.get_text_block(true).unwrap_err();
        assert!(matches!(
            err,
            EngineError::View(ViewError::UnexpectedIndentation { line: 3, .. })
        ));
        assert_eq!(cursor.line(), Some("two"));
    }

    #[test]
    fn test_get_indented_skips_leading_blanks() {
        let mut cursor = cursor_over(&["intro", "", "    body", "    more", "done"], 0);
        cursor.goto_line(1).unwrap();
        let (found, offset) = cursor.get_indented(false, true, None, None).unwrap();
        assert_eq!(found.block.texts(), ["body", "more"]);
        assert_eq!(found.indent, 4);
        assert_eq!(offset, 2);
        assert_eq!(cursor.line(), Some("    more"));
    }
}
