//! Byte spans and line/column conversion

use std::sync::Arc;

/// Half-open byte range `[start, end)` into a document's text.
///
/// Spans only come out of attribute matches; there is no public constructor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Span {
    start: usize,
    end: usize,
}

impl Span {
    pub(crate) fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end, "span start {start} is past its end {end}");
        Self { start, end }
    }

    /// Byte offset of the first byte in the span
    pub fn start(&self) -> usize {
        self.start
    }

    /// Byte offset one past the last byte in the span
    pub fn end(&self) -> usize {
        self.end
    }

    /// Byte length
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Whether `offset` falls inside the span. The end offset counts as inside,
    /// so a caret sitting right after the last character still hits.
    pub fn touches(&self, offset: usize) -> bool {
        self.start <= offset && offset <= self.end
    }
}

/// Zero-based line and UTF-16 column, the way editors address text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct LineCol {
    pub line: u32,
    pub col: u32,
}

impl LineCol {
    pub fn new(line: u32, col: u32) -> Self {
        Self { line, col }
    }
}

/// Text plus precomputed line starts, for converting between byte offsets
/// and [`LineCol`] positions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineIndex {
    text: Arc<str>,
    line_starts: Vec<usize>,
}

impl LineIndex {
    pub fn new(text: impl Into<Arc<str>>) -> Self {
        let text = text.into();
        let line_starts = std::iter::once(0)
            .chain(text.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self { text, line_starts }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Shared handle to the indexed text
    pub fn shared_text(&self) -> Arc<str> {
        Arc::clone(&self.text)
    }

    /// Number of lines (a trailing newline opens one more, empty, line)
    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// Zero-based line containing `offset`
    pub fn line_of(&self, offset: usize) -> u32 {
        let offset = offset.min(self.text.len());
        let line = match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(next) => next - 1,
        };
        line as u32
    }

    /// Byte offset where `line` starts; lines past the end clamp to the end of text
    pub fn line_start(&self, line: u32) -> usize {
        self.line_starts
            .get(line as usize)
            .copied()
            .unwrap_or(self.text.len())
    }

    /// Byte offset where `line` ends, excluding its `\n` (and a `\r` before it)
    pub fn line_end(&self, line: u32) -> usize {
        let start = self.line_start(line);
        let end = match self.line_starts.get(line as usize + 1) {
            Some(next) => next - 1,
            None => self.text.len(),
        };
        let end = end.max(start);
        if end > start && self.text.as_bytes()[end - 1] == b'\r' {
            end - 1
        } else {
            end
        }
    }

    /// Convert a byte offset to a line and UTF-16 column.
    ///
    /// Offsets past the end clamp to the end of text; offsets inside a
    /// multi-byte character clamp to that character's start.
    pub fn position(&self, offset: usize) -> LineCol {
        let offset = floor_char_boundary(&self.text, offset);
        let line = self.line_of(offset);
        let start = self.line_start(line);
        let col = self.text[start..offset]
            .chars()
            .map(char::len_utf16)
            .sum::<usize>();
        LineCol::new(line, col as u32)
    }

    /// Convert a line and UTF-16 column back to a byte offset.
    ///
    /// Columns past the end of the line clamp to the line end.
    pub fn offset(&self, pos: LineCol) -> usize {
        if pos.line as usize >= self.line_starts.len() {
            return self.text.len();
        }
        let start = self.line_start(pos.line);
        let end = self.line_end(pos.line);

        let mut units = 0usize;
        for (i, ch) in self.text[start..end].char_indices() {
            if units >= pos.col as usize {
                return start + i;
            }
            units += ch.len_utf16();
        }
        end
    }

    /// Start and end positions of a span
    pub fn range(&self, span: Span) -> (LineCol, LineCol) {
        (self.position(span.start()), self.position(span.end()))
    }
}

/// Largest char boundary in `text` that is `<= offset`
pub(crate) fn floor_char_boundary(text: &str, offset: usize) -> usize {
    let mut offset = offset.min(text.len());
    while !text.is_char_boundary(offset) {
        offset -= 1;
    }
    offset
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_ascii() {
        let index = LineIndex::new("<div>\n  <p class=\"a\">\n</div>");
        assert_eq!(index.position(0), LineCol::new(0, 0));
        assert_eq!(index.position(6), LineCol::new(1, 0));
        assert_eq!(index.position(9), LineCol::new(1, 3));
        assert_eq!(index.line_count(), 3);
    }

    #[test]
    fn test_position_utf16_columns() {
        // 'é' is 2 bytes / 1 UTF-16 unit, '𝒜' is 4 bytes / 2 UTF-16 units
        let index = LineIndex::new("é𝒜x");
        assert_eq!(index.position(2), LineCol::new(0, 1));
        assert_eq!(index.position(6), LineCol::new(0, 3));
        assert_eq!(index.offset(LineCol::new(0, 3)), 6);
    }

    #[test]
    fn test_position_inside_multibyte_clamps() {
        let index = LineIndex::new("é");
        assert_eq!(index.position(1), LineCol::new(0, 0));
    }

    #[test]
    fn test_offset_clamps() {
        let index = LineIndex::new("ab\r\ncd");
        assert_eq!(index.offset(LineCol::new(0, 99)), 2);
        assert_eq!(index.offset(LineCol::new(1, 1)), 5);
        assert_eq!(index.offset(LineCol::new(7, 0)), 6);
    }

    #[test]
    fn test_line_bounds() {
        let index = LineIndex::new("one\r\ntwo\n");
        assert_eq!(index.line_start(1), 5);
        assert_eq!(index.line_end(0), 3);
        assert_eq!(index.line_end(1), 8);
        assert_eq!(index.line_start(2), 9);
        assert_eq!(index.line_end(2), 9);
        assert_eq!(index.line_of(4), 0);
        assert_eq!(index.line_of(5), 1);
    }

    #[test]
    fn test_span_touches() {
        let span = Span::new(3, 6);
        assert!(span.touches(3));
        assert!(span.touches(6));
        assert!(!span.touches(7));
        assert_eq!(span.len(), 3);
    }
}
