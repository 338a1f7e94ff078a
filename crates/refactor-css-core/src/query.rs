//! Highlight selection and caret resolution
//!
//! Highlighting picks every occurrence in the active document whose
//! signature is both large enough and used often enough. "Often enough" is
//! measured across the whole workspace: a combination that appears once per
//! file in ten files is as much a refactor candidate as one repeated ten
//! times in a single file.

use crate::document::{DocumentEntry, DocumentId};
use crate::scanner::open_attribute_at_end;
use crate::signature::ClassSignature;
use crate::span::{Span, floor_char_boundary};
use crate::workspace::WorkspaceIndex;

/// Inclusive minimums a signature must reach to be highlighted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    /// Minimum number of distinct classes in the attribute
    pub minimum_classes: usize,
    /// Minimum number of occurrences of the signature
    pub minimum_occurrences: usize,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            minimum_classes: 3,
            minimum_occurrences: 3,
        }
    }
}

impl Thresholds {
    pub fn new(minimum_classes: usize, minimum_occurrences: usize) -> Self {
        Self {
            minimum_classes,
            minimum_occurrences,
        }
    }

    /// Whether a signature of `size` classes seen `occurrences` times qualifies.
    ///
    /// Both comparisons are inclusive. The empty signature never qualifies,
    /// whatever the minimums are.
    pub fn qualifies(&self, size: usize, occurrences: usize) -> bool {
        size > 0 && size >= self.minimum_classes && occurrences >= self.minimum_occurrences
    }
}

/// Spans in `active` to highlight, counting occurrences workspace-wide.
///
/// Returns nothing if `active` is not in the index. Spans come back in
/// text order.
pub fn highlights(index: &WorkspaceIndex, active: &DocumentId, thresholds: Thresholds) -> Vec<Span> {
    let Some(entry) = index.get(active) else {
        return Vec::new();
    };

    let mut spans: Vec<Span> = entry
        .signatures()
        .filter(|(signature, _)| {
            thresholds.qualifies(signature.len(), index.total_count(signature))
        })
        .flat_map(|(_, spans)| spans.iter().copied())
        .collect();
    spans.sort();
    spans
}

/// Single-document variant of [`highlights`]: only occurrences inside
/// `entry` count toward the minimum.
pub fn local_highlights(entry: &DocumentEntry, thresholds: Thresholds) -> Vec<Span> {
    let mut spans: Vec<Span> = entry
        .signatures()
        .filter(|(signature, spans)| thresholds.qualifies(signature.len(), spans.len()))
        .flat_map(|(_, spans)| spans.iter().copied())
        .collect();
    spans.sort();
    spans
}

/// How far around the caret to look for the attribute being hovered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaretWindow {
    /// Lines above the caret's line that may hold the `class="` opener
    pub lines_before: u32,
}

impl Default for CaretWindow {
    fn default() -> Self {
        Self { lines_before: 5 }
    }
}

/// The attribute value under the caret
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaretMatch {
    /// Signature of the whole value, including the part after the caret.
    /// Empty when the value has no classes yet.
    pub signature: ClassSignature,
    /// The whole value, in document offsets
    pub value_span: Span,
}

/// Resolve the class attribute value surrounding `offset` in `text`.
///
/// The text from `window.lines_before` lines above the caret up to the
/// caret must end inside an open `class="` / `className='` value. The value
/// then extends forward over non-quote characters, at most to the end of
/// the line after the caret's line.
pub fn resolve_at_caret(text: &str, offset: usize, window: CaretWindow) -> Option<CaretMatch> {
    let caret = floor_char_boundary(text, offset);
    let start = window_start(text, caret, window.lines_before);
    let end = window_end(text, caret);

    let before = open_attribute_at_end(&text[start..caret])?;
    let value_start = start + before.span.start();

    let after = &text[caret..end];
    let forward = after.find(['"', '\'']).unwrap_or(after.len());
    let value_end = caret + forward;

    Some(CaretMatch {
        signature: ClassSignature::from_value(&text[value_start..value_end]),
        value_span: Span::new(value_start, value_end),
    })
}

/// Start of the line `lines_before` lines above the line holding `caret`
fn window_start(text: &str, caret: usize, lines_before: u32) -> usize {
    let mut start = line_start_at(text, caret);
    for _ in 0..lines_before {
        if start == 0 {
            break;
        }
        start = line_start_at(text, start - 1);
    }
    start
}

/// End of the line after the line holding `caret` (or end of text)
fn window_end(text: &str, caret: usize) -> usize {
    let Some(first_newline) = text[caret..].find('\n') else {
        return text.len();
    };
    let next_line = caret + first_newline + 1;
    text[next_line..]
        .find('\n')
        .map(|i| next_line + i)
        .unwrap_or(text.len())
}

fn line_start_at(text: &str, offset: usize) -> usize {
    text[..offset].rfind('\n').map(|i| i + 1).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sig(value: &str) -> ClassSignature {
        ClassSignature::from_value(value)
    }

    #[test]
    fn test_threshold_boundary_is_inclusive() {
        let t = Thresholds::new(3, 3);
        assert!(t.qualifies(3, 3));
        assert!(!t.qualifies(2, 3));
        assert!(!t.qualifies(3, 2));
        assert!(t.qualifies(4, 10));
    }

    #[test]
    fn test_empty_signature_never_qualifies() {
        assert!(!Thresholds::new(0, 0).qualifies(0, 100));
    }

    #[test]
    fn test_workspace_count_drives_highlighting() {
        let mut index = WorkspaceIndex::new();
        let active = DocumentId::in_memory("active.html");
        index.upsert(active.clone(), r#"<p class="a b c"><p class="x y z">"#);
        index.upsert(
            DocumentId::in_memory("other.html"),
            r#"<p class="c b a"><p class="a c b">"#,
        );

        let spans = highlights(&index, &active, Thresholds::default());
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].start(), 10);

        let entry = index.get(&active).unwrap();
        assert!(local_highlights(entry, Thresholds::default()).is_empty());
    }

    #[test]
    fn test_highlights_for_unknown_document() {
        let index = WorkspaceIndex::new();
        let spans = highlights(&index, &DocumentId::in_memory("x.html"), Thresholds::default());
        assert!(spans.is_empty());
    }

    #[test]
    fn test_caret_forward_scan_completes_value() {
        let text = "<div class=\"a b c\">";
        let caret = text.find('b').unwrap() + 1;
        let m = resolve_at_caret(text, caret, CaretWindow::default()).unwrap();
        assert_eq!(m.signature, sig("a b c"));
        assert_eq!(&text[m.value_span.start()..m.value_span.end()], "a b c");
    }

    #[test]
    fn test_caret_value_continues_on_next_line() {
        let text = "<div class=\"a b\n   c\">\n<p>";
        let caret = text.find('b').unwrap();
        let m = resolve_at_caret(text, caret, CaretWindow::default()).unwrap();
        assert_eq!(m.signature, sig("a b c"));
    }

    #[test]
    fn test_caret_forward_scan_stops_after_next_line() {
        let text = "<div class=\"a\nb\nc\">";
        let caret = text.find("\"a").unwrap() + 1;
        let m = resolve_at_caret(text, caret, CaretWindow::default()).unwrap();
        assert_eq!(m.signature, sig("a b"));
    }

    #[test]
    fn test_caret_right_after_opening_quote() {
        let text = "<div class=\"\">";
        let caret = text.find('"').unwrap() + 1;
        let m = resolve_at_caret(text, caret, CaretWindow::default()).unwrap();
        assert!(m.signature.is_empty());
        assert!(m.value_span.is_empty());
    }

    #[test]
    fn test_caret_outside_attribute() {
        let text = "<div class=\"a b\"> hello </div>";
        let caret = text.find("hello").unwrap();
        assert!(resolve_at_caret(text, caret, CaretWindow::default()).is_none());
    }

    #[test]
    fn test_caret_opener_outside_window() {
        let text = "<div class=\"a\n\n\nb\">";
        let caret = text.find('b').unwrap();
        let narrow = CaretWindow { lines_before: 2 };
        assert!(resolve_at_caret(text, caret, narrow).is_none());
        let wide = CaretWindow { lines_before: 3 };
        assert_eq!(resolve_at_caret(text, caret, wide).unwrap().signature, sig("a b"));
    }

    #[test]
    fn test_caret_with_class_name() {
        let text = "<span className='x y'/>";
        let caret = text.find('x').unwrap();
        let m = resolve_at_caret(text, caret, CaretWindow::default()).unwrap();
        assert_eq!(m.signature, sig("y x"));
    }

    #[test]
    fn test_caret_offset_past_end_clamps() {
        let text = "<div class=\"a b";
        let m = resolve_at_caret(text, 999, CaretWindow::default()).unwrap();
        assert_eq!(m.signature, sig("a b"));
    }
}
