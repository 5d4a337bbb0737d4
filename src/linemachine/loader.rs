//! Line acquisition utilities
//!
//! `LineLoader` turns a file or a string into the root [LineView] a run starts from. Text
//! is split on line breaks, tabs are expanded to spaces, and trailing whitespace is
//! dropped, so grammars can reason about indentation in plain columns.
//!
//! ```rust,ignore
//! let view = LineLoader::from_path("notes.txt")?.into_view();
//! let view = LineLoader::from_string("- one\n- two\n", "<inline>").tab_width(4).into_view();
//! ```

use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::path::Path;

use super::lines::LineView;

static FORM_FEEDS: Lazy<Regex> = Lazy::new(|| Regex::new("[\x0b\x0c]").unwrap());

const DEFAULT_TAB_WIDTH: usize = 8;

/// Error that can occur when loading input
#[derive(Debug, Clone, PartialEq)]
pub enum LoaderError {
    /// IO error when reading file
    IoError(String),
}

impl std::fmt::Display for LoaderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoaderError::IoError(msg) => write!(f, "IO error: {}", msg),
        }
    }
}

impl std::error::Error for LoaderError {}

impl From<std::io::Error> for LoaderError {
    fn from(err: std::io::Error) -> Self {
        LoaderError::IoError(err.to_string())
    }
}

/// Source text plus the id its lines will carry
#[derive(Debug, Clone)]
pub struct LineLoader {
    text: String,
    source: String,
    tab_width: usize,
    convert_whitespace: bool,
}

impl LineLoader {
    /// Load from a file path; the path becomes the source id
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, LoaderError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        Ok(Self::from_string(text, path.display().to_string()))
    }

    pub fn from_string(text: impl Into<String>, source: impl Into<String>) -> Self {
        LineLoader {
            text: text.into(),
            source: source.into(),
            tab_width: DEFAULT_TAB_WIDTH,
            convert_whitespace: false,
        }
    }

    /// Columns per tab stop (default 8)
    pub fn tab_width(mut self, width: usize) -> Self {
        self.tab_width = width;
        self
    }

    /// Turn vertical tabs and form feeds into spaces
    pub fn convert_whitespace(mut self, convert: bool) -> Self {
        self.convert_whitespace = convert;
        self
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// The prepared lines
    pub fn lines(&self) -> Vec<String> {
        string_to_lines(&self.text, self.tab_width, self.convert_whitespace)
    }

    /// Root view over the prepared lines, numbered from 0 in this source
    pub fn into_view(self) -> LineView {
        LineView::new(self.lines(), &self.source)
    }
}

/// Split `text` into lines with tabs expanded and trailing whitespace removed
pub fn string_to_lines(text: &str, tab_width: usize, convert_whitespace: bool) -> Vec<String> {
    let text = if convert_whitespace {
        FORM_FEEDS.replace_all(text, " ")
    } else {
        text.into()
    };
    text.lines()
        .map(|line| expand_tabs(line, tab_width).trim_end().to_string())
        .collect()
}

fn expand_tabs(line: &str, tab_width: usize) -> String {
    if !line.contains('\t') {
        return line.to_string();
    }
    let mut expanded = String::with_capacity(line.len() + tab_width);
    let mut column = 0;
    for c in line.chars() {
        if c == '\t' {
            if tab_width > 0 {
                let pad = tab_width - column % tab_width;
                expanded.extend(std::iter::repeat(' ').take(pad));
                column += pad;
            }
        } else {
            expanded.push(c);
            column += 1;
        }
    }
    expanded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linemachine::lines::LineInfo;
    use rstest::rstest;
    use std::io::Write;

    #[rstest(
        input,
        expected,
        case("a\tb", "a       b"),
        case("\tx", "        x"),
        case("abcdefgh\ty", "abcdefgh        y"),
        case("no tabs", "no tabs")
    )]
    fn test_expand_tabs(input: &str, expected: &str) {
        assert_eq!(expand_tabs(input, 8), expected);
    }

    #[test]
    fn test_string_to_lines() {
        let lines = string_to_lines("one  \n\ttwo\r\n\nthree\x0cfour", 4, true);
        assert_eq!(lines, ["one", "    two", "", "three four"]);

        let lines = string_to_lines("a\x0bb", 8, false);
        assert_eq!(lines, ["a\x0bb"]);
    }

    #[test]
    fn test_from_string_into_view() {
        let view = LineLoader::from_string("x\ny\n", "<inline>").into_view();
        assert_eq!(view.texts(), ["x", "y"]);
        assert_eq!(view.info(1).unwrap(), LineInfo::new("<inline>", 1));
        assert!(!view.has_parent());
    }

    #[test]
    fn test_from_path_uses_path_as_source() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "first\n  second\t\n").unwrap();

        let loader = LineLoader::from_path(file.path()).unwrap();
        assert_eq!(loader.source(), file.path().display().to_string());
        assert_eq!(loader.lines(), ["first", "  second"]);
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = LineLoader::from_path(dir.path().join("nope.txt")).unwrap_err();
        assert!(matches!(err, LoaderError::IoError(_)));
    }
}
