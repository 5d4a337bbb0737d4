//! Shared fixtures for unit and integration tests
//!
//!     [lines] builds a root view with a fixed source id. [outline_engine] is a small but
//!     complete grammar (paragraphs and bullet lists) that exercises state switches, line
//!     retries, text blocks and the context:
//!
//!         Body  --bullet-->  List
//!         List  --blank-->   Body
//!         List  --text-->    retried in Body
//!
//!     Output is one string per construct, e.g. `para: Some text`, `item: first`,
//!     `end list (2)`.

use super::config::EngineConfig;
use super::engine::Engine;
use super::error::EngineError;
use super::lines::LineView;
use super::state::{NextState, State, Step};

/// Source id of views built by [lines]
pub const TEST_SOURCE: &str = "test";

/// Root view over `texts`, numbered from 0 in [TEST_SOURCE]
pub fn lines(texts: &[&str]) -> LineView {
    LineView::new(texts.iter().copied(), TEST_SOURCE)
}

const BODY_PATTERNS: &[(&str, &str)] = &[
    ("blank", r"\s*$"),
    ("bullet", r"[-*] +(?P<text>\S.*)$"),
    ("text", r"\S"),
];

const LIST_PATTERNS: &[(&str, &str)] = &[
    ("blank", r"\s*$"),
    ("bullet", r"[-*] +(?P<text>\S.*)$"),
    ("continuation", r"\s+(?P<text>\S.*)$"),
    ("text", r"\S"),
];

/// Running totals kept by the outline grammar
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutlineCounts {
    pub paragraphs: usize,
    pub items: usize,
    /// Items in the list being read
    pub open_items: usize,
}

fn close_list(counts: &mut OutlineCounts) -> String {
    let open = std::mem::take(&mut counts.open_items);
    format!("end list ({})", open)
}

fn body_state() -> Result<State<OutlineCounts, String>, EngineError> {
    Ok(State::builder("Body")
        .patterns(BODY_PATTERNS)
        .handler("blank", |_, _, _, next| Ok(Step::to(next, vec![])))
        .handler("bullet", |_, caps, counts: &mut OutlineCounts, next| {
            counts.items += 1;
            counts.open_items = 1;
            Ok(Step::to(next, vec![format!("item: {}", &caps["text"])]))
        })
        .handler("text", |cursor, _, counts: &mut OutlineCounts, next| {
            let mut output = Vec::new();
            if counts.open_items > 0 {
                output.push(close_list(counts));
            }
            let block = cursor.get_text_block(false)?;
            counts.paragraphs += 1;
            output.push(format!("para: {}", block.texts().join(" ")));
            Ok(Step::to(next, output))
        })
        .transitions([
            ("blank", NextState::Stay),
            ("bullet", NextState::goto("List")),
            ("text", NextState::Stay),
        ])
        .on_begin(|_, _| Ok(vec!["<doc>".to_string()]))
        .on_end(|_, counts| {
            Ok(vec![format!(
                "</doc> paragraphs={} items={}",
                counts.paragraphs, counts.items
            )])
        })
        .build()?)
}

fn list_state() -> Result<State<OutlineCounts, String>, EngineError> {
    Ok(State::builder("List")
        .patterns(LIST_PATTERNS)
        .handler("blank", |_, _, counts: &mut OutlineCounts, next| {
            Ok(Step::to(next, vec![close_list(counts)]))
        })
        .handler("bullet", |_, caps, counts: &mut OutlineCounts, next| {
            counts.items += 1;
            counts.open_items += 1;
            Ok(Step::to(next, vec![format!("item: {}", &caps["text"])]))
        })
        .handler("continuation", |_, caps, _, next| {
            Ok(Step::to(next, vec![format!("  more: {}", &caps["text"])]))
        })
        // A flush-left line ends the list; Body reads it again and closes it.
        .handler("text", |_, _, _, _| {
            Ok(Step::RetryState {
                state: "Body".to_string(),
                transition: None,
            })
        })
        .transitions([
            ("blank", NextState::goto("Body")),
            ("bullet", NextState::Stay),
            ("continuation", NextState::Stay),
            ("text", NextState::Stay),
        ])
        .on_end(|_, counts| {
            Ok(vec![
                close_list(counts),
                format!(
                    "</doc> paragraphs={} items={}",
                    counts.paragraphs, counts.items
                ),
            ])
        })
        .build()?)
}

/// Engine for the outline grammar, starting in `Body`
pub fn outline_engine() -> Result<Engine<OutlineCounts, String>, EngineError> {
    outline_engine_with_config(EngineConfig::default())
}

pub fn outline_engine_with_config(
    config: EngineConfig,
) -> Result<Engine<OutlineCounts, String>, EngineError> {
    Ok(Engine::with_config(
        "Body",
        vec![body_state()?, list_state()?],
        config,
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lines_fixture() {
        let view = lines(&["a", "b"]);
        assert_eq!(view.len(), 2);
        assert_eq!(view.source(1).unwrap(), TEST_SOURCE);
    }

    #[test]
    fn test_outline_states_registered() {
        let engine = outline_engine().unwrap();
        assert_eq!(engine.state_names(), ["Body", "List"]);
        assert_eq!(
            engine.state("List").unwrap().transition_names(),
            ["blank", "bullet", "continuation", "text"]
        );
    }
}
