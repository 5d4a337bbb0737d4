//! String-specific operations on line views
//!
//!     These helpers understand line text (blank lines, leading whitespace) rather than just
//!     line positions. All of them are local: they never replay edits on a parent view,
//!     although the blocks they return are ordinary child views.

use super::LineView;
use crate::linemachine::error::ViewError;

/// Result of [LineView::get_indented]
#[derive(Debug, Clone, PartialEq)]
pub struct IndentedBlock {
    /// The block, as a child view of the scanned view
    pub block: LineView,
    /// Smallest indentation found (or the requested block indent), in characters
    pub indent: usize,
    /// Whether the block ended on a blank line (or at the end of the view)
    pub blank_finish: bool,
}

fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

fn leading_spaces(line: &str) -> usize {
    line.chars().take_while(|c| *c == ' ').count()
}

fn drop_chars(line: &str, n: usize) -> String {
    line.chars().skip(n).collect()
}

impl LineView {
    /// Replace every occurrence of `from` with `to` in every line
    pub fn replace_all(&self, from: &str, to: &str) {
        self.with_data_mut(|data| {
            for line in data.iter_mut() {
                if line.contains(from) {
                    *line = line.replace(from, to);
                }
            }
        });
    }

    /// Strip the first `n` characters of every line in `start..stop`.
    ///
    /// Nothing checks that the stripped characters are whitespace; lines shorter than `n`
    /// become empty.
    pub fn trim_left_chars(&self, n: usize, start: usize, stop: usize) -> Result<(), ViewError> {
        let len = self.len();
        if start > stop || stop > len {
            return Err(ViewError::InvalidRange { start, stop, len });
        }
        self.with_data_mut(|data| {
            for line in &mut data[start..stop] {
                *line = drop_chars(line, n);
            }
        });
        Ok(())
    }

    /// Contiguous run of non-blank lines starting at `start`.
    ///
    /// The scan stops at the first blank line (excluded) or at the end of the view. With
    /// `flush_left`, a line that begins with whitespace is an error; the error carries the
    /// lines scanned so far and the location of the offending line.
    pub fn get_text_block(&self, start: usize, flush_left: bool) -> Result<LineView, ViewError> {
        let data = self.texts();
        if start > data.len() {
            return Err(ViewError::Index {
                index: start,
                len: data.len(),
            });
        }

        let mut end = start;
        for line in &data[start..] {
            if is_blank(line) {
                break;
            }
            if flush_left && line.starts_with(char::is_whitespace) {
                let info = self.info(end)?;
                return Err(ViewError::UnexpectedIndentation {
                    block: self.slice(start, end)?,
                    source: info.source,
                    line: info.offset + 1,
                });
            }
            end += 1;
        }
        self.slice(start, end)
    }

    /// Indented block starting at `start`.
    ///
    /// The block runs until a non-blank line with no leading space (or, when
    /// `block_indent` is given, one indented less than that), or until the first blank line
    /// when `until_blank` is set. `first_indent` says how much of the first line to drop
    /// when that line is the tail of a construct ("item text" after a marker); it defaults
    /// to `block_indent`. With `strip_indent`, the common indentation is removed from the
    /// returned block.
    pub fn get_indented(
        &self,
        start: usize,
        until_blank: bool,
        strip_indent: bool,
        block_indent: Option<usize>,
        first_indent: Option<usize>,
    ) -> Result<IndentedBlock, ViewError> {
        let data = self.texts();
        if start > data.len() {
            return Err(ViewError::Index {
                index: start,
                len: data.len(),
            });
        }

        let first_indent = first_indent.or(block_indent);
        let mut indent = block_indent;
        let mut end = start;
        if first_indent.is_some() {
            end += 1;
        }

        let mut blank_finish = true;
        while end < data.len() {
            let line = &data[end];
            let short_indent = block_indent
                .map(|width| line.chars().take(width).any(|c| !c.is_whitespace()))
                .unwrap_or(false);
            if !line.is_empty() && (!line.starts_with(' ') || short_indent) {
                blank_finish = end > start && is_blank(&data[end - 1]);
                break;
            }
            if is_blank(line) {
                if until_blank {
                    break;
                }
            } else if block_indent.is_none() {
                let line_indent = leading_spaces(line);
                indent = Some(indent.map_or(line_indent, |current| current.min(line_indent)));
            }
            end += 1;
        }

        let end = end.min(data.len());
        let block = self.slice(start, end)?;
        if let (Some(width), false) = (first_indent, block.is_empty()) {
            block.with_data_mut(|lines| lines[0] = drop_chars(&lines[0], width));
        }
        let indent = indent.unwrap_or(0);
        if indent > 0 && strip_indent {
            let from = usize::from(first_indent.is_some()).min(block.len());
            block.trim_left_chars(indent, from, block.len())?;
        }

        Ok(IndentedBlock {
            block,
            indent,
            blank_finish,
        })
    }
}
