//! Line views: offset-tracked line sequences with parent/child linkage
//!
//!     A [LineView] is the input a state machine walks. Each line carries its text plus
//!     where it came from (a source id and the line's offset inside that source), so that
//!     after lines have been sliced, trimmed and spliced the parser can still report
//!     positions in terms of the original input.
//!
//! Root and child views
//!
//!     A root view is built from a flat list of lines. Slicing a view with
//!     [LineView::slice] produces a child view: it copies the selected lines and remembers
//!     its parent and where in the parent it starts. Edits made through a child (set,
//!     insert, delete, append, remove) are replayed on the parent at the translated index,
//!     and from there on up the chain of ancestors.
//!
//!     The link only points upward. Editing a parent never touches its live children, so a
//!     child created before an independent parent edit is stale; callers discard and
//!     re-slice it. [LineView::disconnect] cuts the link for good.
//!
//!     Trimming ([LineView::trim_start], [LineView::trim_end]) and the string helpers in
//!     [text] only change the local view.
//!
//! Handles
//!
//!     `LineView` is a handle. Cloning it yields another handle onto the same view, which is
//!     how a child keeps hold of its parent and how the engine shares the input with
//!     handlers. Use [LineView::to_detached] for an independent copy.
//!
//!     Edits are applied to the top-most ancestor first and to the local view last, so an
//!     edit that fails anywhere up the chain leaves the local view untouched.

pub mod text;

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use super::error::ViewError;

/// Provenance of one line: the source it came from and its offset inside that source.
///
/// An offset of `-1` marks positions that do not correspond to a real source line, such as
/// the "just past the end" position returned by [LineView::info].
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct LineInfo {
    pub source: String,
    pub offset: isize,
}

impl LineInfo {
    pub fn new(source: impl Into<String>, offset: isize) -> Self {
        Self {
            source: source.into(),
            offset,
        }
    }
}

/// One input line together with its provenance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Line {
    pub text: String,
    pub source: String,
    pub offset: isize,
}

impl Line {
    pub fn new(text: impl Into<String>, source: impl Into<String>, offset: isize) -> Self {
        Self {
            text: text.into(),
            source: source.into(),
            offset,
        }
    }

    pub fn info(&self) -> LineInfo {
        LineInfo::new(self.source.clone(), self.offset)
    }
}

struct ViewData {
    /// Line text, flattened from whatever sources fed the view
    data: Vec<String>,
    /// Provenance for each entry of `data`; always the same length
    items: Vec<LineInfo>,
    parent: Option<LineView>,
    /// Index in the parent that local index 0 maps to
    parent_offset: usize,
}

/// An ordered, possibly aliased sequence of lines. See the [module docs](self).
#[derive(Clone)]
pub struct LineView {
    inner: Rc<RefCell<ViewData>>,
}

impl LineView {
    fn from_data(
        data: Vec<String>,
        items: Vec<LineInfo>,
        parent: Option<LineView>,
        parent_offset: usize,
    ) -> Self {
        debug_assert_eq!(data.len(), items.len());
        LineView {
            inner: Rc::new(RefCell::new(ViewData {
                data,
                items,
                parent,
                parent_offset,
            })),
        }
    }

    /// Create a root view from newline-stripped lines of a single source.
    ///
    /// Offsets are numbered `0..n` in order.
    pub fn new<S: Into<String>>(lines: impl IntoIterator<Item = S>, source: &str) -> Self {
        let data: Vec<String> = lines.into_iter().map(Into::into).collect();
        let items = (0..data.len())
            .map(|offset| LineInfo::new(source, offset as isize))
            .collect();
        Self::from_data(data, items, None, 0)
    }

    /// Create an empty root view
    pub fn empty() -> Self {
        Self::from_data(Vec::new(), Vec::new(), None, 0)
    }

    /// Create a root view from lines that each carry their own provenance
    pub fn from_lines(lines: impl IntoIterator<Item = Line>) -> Self {
        let (data, items) = lines
            .into_iter()
            .map(|line| {
                let info = LineInfo::new(line.source, line.offset);
                (line.text, info)
            })
            .unzip();
        Self::from_data(data, items, None, 0)
    }

    /// Create a root view from parallel text and provenance sequences
    pub fn with_items(data: Vec<String>, items: Vec<LineInfo>) -> Result<Self, ViewError> {
        if data.len() != items.len() {
            return Err(ViewError::LengthMismatch {
                data: data.len(),
                items: items.len(),
            });
        }
        Ok(Self::from_data(data, items, None, 0))
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Text of line `index`
    pub fn get(&self, index: usize) -> Result<String, ViewError> {
        let inner = self.inner.borrow();
        inner
            .data
            .get(index)
            .cloned()
            .ok_or(ViewError::Index {
                index,
                len: inner.data.len(),
            })
    }

    /// Text and provenance of line `index`
    pub fn line(&self, index: usize) -> Result<Line, ViewError> {
        let inner = self.inner.borrow();
        match (inner.data.get(index), inner.items.get(index)) {
            (Some(text), Some(info)) => Ok(Line::new(text.clone(), info.source.clone(), info.offset)),
            _ => Err(ViewError::Index {
                index,
                len: inner.data.len(),
            }),
        }
    }

    /// All line texts, in order
    pub fn texts(&self) -> Vec<String> {
        self.inner.borrow().data.clone()
    }

    /// All provenance entries, in order
    pub fn items(&self) -> Vec<LineInfo> {
        self.inner.borrow().items.clone()
    }

    /// All lines with their provenance, in order
    pub fn lines(&self) -> Vec<Line> {
        let inner = self.inner.borrow();
        inner
            .data
            .iter()
            .zip(inner.items.iter())
            .map(|(text, info)| Line::new(text.clone(), info.source.clone(), info.offset))
            .collect()
    }

    /// Iterate over a snapshot of the lines; later edits do not show up
    pub fn iter(&self) -> std::vec::IntoIter<Line> {
        self.lines().into_iter()
    }

    pub fn contains(&self, text: &str) -> bool {
        self.inner.borrow().data.iter().any(|line| line == text)
    }

    /// The parent view, if this view is still linked to one
    pub fn parent(&self) -> Option<LineView> {
        self.inner.borrow().parent.clone()
    }

    pub fn has_parent(&self) -> bool {
        self.inner.borrow().parent.is_some()
    }

    pub fn parent_offset(&self) -> usize {
        self.inner.borrow().parent_offset
    }

    /// Whether two handles refer to the same view
    pub fn ptr_eq(&self, other: &LineView) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Independent root copy of the current content
    pub fn to_detached(&self) -> LineView {
        let inner = self.inner.borrow();
        Self::from_data(inner.data.clone(), inner.items.clone(), None, 0)
    }

    /// Child view over `start..stop`, linked to this view.
    pub fn slice(&self, start: usize, stop: usize) -> Result<LineView, ViewError> {
        let inner = self.inner.borrow();
        check_range(start, stop, inner.data.len())?;
        Ok(Self::from_data(
            inner.data[start..stop].to_vec(),
            inner.items[start..stop].to_vec(),
            Some(self.clone()),
            start,
        ))
    }

    fn link(&self) -> Option<(LineView, usize)> {
        let inner = self.inner.borrow();
        inner
            .parent
            .as_ref()
            .map(|parent| (parent.clone(), inner.parent_offset))
    }

    fn check_index(&self, index: usize) -> Result<(), ViewError> {
        let len = self.len();
        if index < len {
            Ok(())
        } else {
            Err(ViewError::Index { index, len })
        }
    }

    fn check_insert_point(&self, index: usize) -> Result<(), ViewError> {
        let len = self.len();
        if index <= len {
            Ok(())
        } else {
            Err(ViewError::Index { index, len })
        }
    }

    /// Replace the text of line `index`; the parent sees the same change.
    pub fn set(&self, index: usize, text: impl Into<String>) -> Result<(), ViewError> {
        let text = text.into();
        self.check_index(index)?;
        if let Some((parent, offset)) = self.link() {
            parent.set(index + offset, text.clone())?;
        }
        self.inner.borrow_mut().data[index] = text;
        Ok(())
    }

    pub fn delete_at(&self, index: usize) -> Result<(), ViewError> {
        self.check_index(index)?;
        if let Some((parent, offset)) = self.link() {
            parent.delete_at(index + offset)?;
        }
        let mut inner = self.inner.borrow_mut();
        inner.data.remove(index);
        inner.items.remove(index);
        Ok(())
    }

    /// Delete lines `start..stop`
    pub fn delete_range(&self, start: usize, stop: usize) -> Result<(), ViewError> {
        check_range(start, stop, self.len())?;
        if let Some((parent, offset)) = self.link() {
            parent.delete_range(start + offset, stop + offset)?;
        }
        let mut inner = self.inner.borrow_mut();
        inner.data.drain(start..stop);
        inner.items.drain(start..stop);
        Ok(())
    }

    /// Insert one line before `index` (`index == len` appends).
    ///
    /// The parent receives the same insert at `index + parent_offset`.
    pub fn insert_at(
        &self,
        index: usize,
        text: impl Into<String>,
        source: &str,
        offset: isize,
    ) -> Result<(), ViewError> {
        if source.is_empty() {
            return Err(ViewError::EmptySource);
        }
        self.insert_lines(index, vec![Line::new(text, source, offset)])
    }

    /// Insert every line of `other` before `index`
    pub fn insert_range(&self, index: usize, other: &LineView) -> Result<(), ViewError> {
        self.insert_lines(index, other.lines())
    }

    fn insert_lines(&self, index: usize, lines: Vec<Line>) -> Result<(), ViewError> {
        self.check_insert_point(index)?;
        if let Some((parent, offset)) = self.link() {
            parent.insert_lines(index + offset, lines.clone())?;
        }
        let mut inner = self.inner.borrow_mut();
        let (data, items): (Vec<String>, Vec<LineInfo>) = lines
            .into_iter()
            .map(|line| {
                let info = LineInfo::new(line.source, line.offset);
                (line.text, info)
            })
            .unzip();
        inner.data.splice(index..index, data);
        inner.items.splice(index..index, items);
        Ok(())
    }

    pub fn append(
        &self,
        text: impl Into<String>,
        source: &str,
        offset: isize,
    ) -> Result<(), ViewError> {
        self.insert_at(self.len(), text, source, offset)
    }

    /// Append every line of `other`
    pub fn append_range(&self, other: &LineView) -> Result<(), ViewError> {
        self.insert_range(self.len(), other)
    }

    /// Same as [LineView::append_range]
    pub fn extend(&self, other: &LineView) -> Result<(), ViewError> {
        self.append_range(other)
    }

    /// Remove line `index` and return its text
    pub fn remove_at(&self, index: usize) -> Result<String, ViewError> {
        self.check_index(index)?;
        if let Some((parent, offset)) = self.link() {
            parent.remove_at(index + offset)?;
        }
        let mut inner = self.inner.borrow_mut();
        inner.items.remove(index);
        Ok(inner.data.remove(index))
    }

    /// Drop `n` lines from the front of this view only.
    ///
    /// The parent keeps them; `parent_offset` moves forward so later edits still land on
    /// the right parent lines.
    pub fn trim_start(&self, n: usize) -> Result<(), ViewError> {
        let mut inner = self.inner.borrow_mut();
        let len = inner.data.len();
        if n > len {
            return Err(ViewError::TrimOutOfRange { n, len });
        }
        inner.data.drain(..n);
        inner.items.drain(..n);
        if inner.parent.is_some() {
            inner.parent_offset += n;
        }
        Ok(())
    }

    /// Drop `n` lines from the back of this view only
    pub fn trim_end(&self, n: usize) -> Result<(), ViewError> {
        let mut inner = self.inner.borrow_mut();
        let len = inner.data.len();
        if n > len {
            return Err(ViewError::TrimOutOfRange { n, len });
        }
        inner.data.truncate(len - n);
        inner.items.truncate(len - n);
        Ok(())
    }

    /// Source and offset of line `index`.
    ///
    /// `index == len` is accepted for non-empty views and yields the last line's source with
    /// offset `-1`, so callers can probe one past the last consumed line.
    pub fn info(&self, index: usize) -> Result<LineInfo, ViewError> {
        let inner = self.inner.borrow();
        let len = inner.items.len();
        if let Some(info) = inner.items.get(index) {
            return Ok(info.clone());
        }
        match inner.items.last() {
            Some(last) if index == len => Ok(LineInfo::new(last.source.clone(), -1)),
            _ => Err(ViewError::Index { index, len }),
        }
    }

    pub fn source(&self, index: usize) -> Result<String, ViewError> {
        self.info(index).map(|info| info.source)
    }

    pub fn offset(&self, index: usize) -> Result<isize, ViewError> {
        self.info(index).map(|info| info.offset)
    }

    /// Break the link to the parent. Later edits stay local.
    pub fn disconnect(&self) {
        let mut inner = self.inner.borrow_mut();
        inner.parent = None;
        inner.parent_offset = 0;
    }

    /// New root view holding this view's lines followed by `other`'s
    pub fn concat(&self, other: &LineView) -> LineView {
        let mut lines = self.lines();
        lines.extend(other.lines());
        LineView::from_lines(lines)
    }

    /// New root view holding `other`'s lines followed by this view's
    pub fn concat_front(&self, other: &LineView) -> LineView {
        other.concat(self)
    }

    pub(crate) fn with_data_mut<R>(&self, f: impl FnOnce(&mut Vec<String>) -> R) -> R {
        f(&mut self.inner.borrow_mut().data)
    }
}

fn check_range(start: usize, stop: usize, len: usize) -> Result<(), ViewError> {
    if start <= stop && stop <= len {
        Ok(())
    } else {
        Err(ViewError::InvalidRange { start, stop, len })
    }
}

impl Default for LineView {
    fn default() -> Self {
        Self::empty()
    }
}

impl PartialEq for LineView {
    fn eq(&self, other: &Self) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        let (a, b) = (self.inner.borrow(), other.inner.borrow());
        a.data == b.data && a.items == b.items
    }
}

impl fmt::Debug for LineView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.try_borrow() {
            Ok(inner) => f
                .debug_struct("LineView")
                .field("data", &inner.data)
                .field("items", &inner.items)
                .field("linked", &inner.parent.is_some())
                .field("parent_offset", &inner.parent_offset)
                .finish(),
            Err(_) => f.write_str("LineView(<borrowed>)"),
        }
    }
}

impl fmt::Display for LineView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner.borrow().data.join("\n"))
    }
}

impl From<Vec<Line>> for LineView {
    fn from(lines: Vec<Line>) -> Self {
        LineView::from_lines(lines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn letters() -> LineView {
        LineView::new(["a", "b", "c", "d", "e", "f", "g", "h"], "s")
    }

    #[test]
    fn test_new_numbers_offsets() {
        let view = letters();
        assert_eq!(view.len(), 8);
        assert_eq!(view.info(3).unwrap(), LineInfo::new("s", 3));
        assert_eq!(view.source(2).unwrap(), "s");
        assert_eq!(view.offset(5).unwrap(), 5);
        assert_eq!(view.get(3).unwrap(), "d");
    }

    #[test]
    fn test_with_items_rejects_mismatch() {
        let result = LineView::with_items(vec!["a".into()], vec![]);
        assert_eq!(
            result.unwrap_err(),
            ViewError::LengthMismatch { data: 1, items: 0 }
        );
    }

    #[test]
    fn test_get_out_of_range() {
        let view = letters();
        assert_eq!(
            view.get(8).unwrap_err(),
            ViewError::Index { index: 8, len: 8 }
        );
    }

    #[test]
    fn test_delete_then_trim_sequence() {
        let view = letters();
        view.delete_at(3).unwrap();
        assert_eq!(view.texts(), ["a", "b", "c", "e", "f", "g", "h"]);
        assert_eq!(view.offset(3).unwrap(), 4);

        view.trim_start(2).unwrap();
        assert_eq!(view.texts(), ["c", "e", "f", "g", "h"]);

        view.trim_end(3).unwrap();
        assert_eq!(view.texts(), ["c", "e"]);
        assert_eq!(view.items(), [LineInfo::new("s", 2), LineInfo::new("s", 4)]);

        assert_eq!(view.remove_at(1).unwrap(), "e");
        assert_eq!(view.texts(), ["c"]);
    }

    #[test]
    fn test_insert_append_extend() {
        let view = LineView::new(["c"], "s");
        view.insert_at(1, "a", "d", 1).unwrap();
        assert_eq!(view.items()[1], LineInfo::new("d", 1));

        let other = LineView::new(["i", "j"], "t");
        view.insert_range(0, &other).unwrap();
        assert_eq!(view.texts(), ["i", "j", "c", "a"]);

        view.extend(&other).unwrap();
        view.append("e", "f", 2).unwrap();
        assert_eq!(view.texts(), ["i", "j", "c", "a", "i", "j", "e"]);
        assert_eq!(view.info(6).unwrap(), LineInfo::new("f", 2));
    }

    #[test]
    fn test_insert_requires_source() {
        let view = letters();
        assert_eq!(
            view.insert_at(0, "x", "", 0).unwrap_err(),
            ViewError::EmptySource
        );
        assert_eq!(view.len(), 8);
    }

    #[test]
    fn test_insert_past_end_fails() {
        let view = letters();
        assert!(matches!(
            view.insert_at(9, "x", "src", 0),
            Err(ViewError::Index { index: 9, len: 8 })
        ));
    }

    #[test]
    fn test_trim_bounds() {
        let view = letters();
        assert_eq!(
            view.trim_start(9).unwrap_err(),
            ViewError::TrimOutOfRange { n: 9, len: 8 }
        );
        assert!(view.trim_end(8).is_ok());
        assert!(view.is_empty());
    }

    #[test]
    fn test_info_past_end_sentinel() {
        let view = letters();
        assert_eq!(view.info(8).unwrap(), LineInfo::new("s", -1));
        assert!(view.info(9).is_err());
        assert!(LineView::empty().info(0).is_err());
    }

    #[test]
    fn test_child_set_propagates_through_chain() {
        let root = letters();
        let child = root.slice(2, 7).unwrap();
        let grandchild = child.slice(1, 3).unwrap();

        grandchild.set(0, "D").unwrap();
        assert_eq!(child.get(1).unwrap(), "D");
        assert_eq!(root.get(3).unwrap(), "D");
    }

    #[test]
    fn test_child_insert_uses_translated_index() {
        let root = letters();
        let child = root.slice(2, 5).unwrap();

        child.insert_at(1, "X", "new", 0).unwrap();
        assert_eq!(child.texts(), ["c", "X", "d", "e"]);
        assert_eq!(root.texts(), ["a", "b", "c", "X", "d", "e", "f", "g", "h"]);
    }

    #[test]
    fn test_child_append_lands_after_child_end() {
        let root = letters();
        let child = root.slice(0, 2).unwrap();
        child.append("Z", "new", 0).unwrap();
        assert_eq!(root.get(2).unwrap(), "Z");
        assert_eq!(root.get(3).unwrap(), "c");
    }

    #[test]
    fn test_child_remove_and_delete_range() {
        let root = letters();
        let child = root.slice(1, 6).unwrap();

        assert_eq!(child.remove_at(0).unwrap(), "b");
        assert_eq!(root.texts(), ["a", "c", "d", "e", "f", "g", "h"]);

        child.delete_range(1, 3).unwrap();
        assert_eq!(child.texts(), ["c", "f"]);
        assert_eq!(root.texts(), ["a", "c", "f", "g", "h"]);
    }

    #[test]
    fn test_trim_start_keeps_parent_mapping() {
        let root = letters();
        let child = root.slice(2, 6).unwrap();
        child.trim_start(2).unwrap();
        assert_eq!(child.parent_offset(), 4);
        assert_eq!(root.len(), 8);

        child.set(0, "E").unwrap();
        assert_eq!(root.get(4).unwrap(), "E");
    }

    #[test]
    fn test_trim_end_is_local() {
        let root = letters();
        let child = root.slice(0, 4).unwrap();
        child.trim_end(2).unwrap();
        assert_eq!(child.parent_offset(), 0);
        assert_eq!(root.len(), 8);
    }

    #[test]
    fn test_disconnect_stops_propagation() {
        let root = letters();
        let child = root.slice(0, 3).unwrap();
        child.disconnect();
        assert!(!child.has_parent());

        child.set(0, "A").unwrap();
        child.append("x", "new", 0).unwrap();
        assert_eq!(root.get(0).unwrap(), "a");
        assert_eq!(root.len(), 8);
    }

    #[test]
    fn test_parent_edits_do_not_reach_children() {
        let root = letters();
        let child = root.slice(0, 3).unwrap();
        root.set(0, "changed").unwrap();
        assert_eq!(child.get(0).unwrap(), "a");
    }

    #[test]
    fn test_failed_propagation_leaves_child_untouched() {
        let root = letters();
        let child = root.slice(4, 8).unwrap();
        root.trim_end(6).unwrap();

        assert!(child.set(0, "stale").is_err());
        assert_eq!(child.get(0).unwrap(), "e");
    }

    #[test]
    fn test_concat_builds_root() {
        let left = LineView::new(["a"], "x");
        let right = LineView::new(["b"], "y");
        let joined = left.concat(&right);
        assert!(!joined.has_parent());
        assert_eq!(joined.items(), [LineInfo::new("x", 0), LineInfo::new("y", 0)]);

        let front = left.concat_front(&right);
        assert_eq!(front.texts(), ["b", "a"]);
    }

    #[test]
    fn test_contains_and_display() {
        let view = LineView::new(["one", "two"], "s");
        assert!(view.contains("two"));
        assert!(!view.contains("tw"));
        assert_eq!(view.to_string(), "one\ntwo");
    }

    #[test]
    fn test_clone_is_alias_detached_is_copy() {
        let view = letters();
        let alias = view.clone();
        let copy = view.to_detached();
        alias.set(0, "A").unwrap();
        assert_eq!(view.get(0).unwrap(), "A");
        assert_eq!(copy.get(0).unwrap(), "a");
    }
}
