//! Class attribute scanner
//!
//! Finds `class="..."` and `className='...'` attribute values in any
//! markup-like text. This is pattern matching, not parsing: a value is the
//! longest run of non-quote characters after the opening quote. A value that
//! is never closed therefore runs on until the next quote in the text, which
//! is also what lets the caret resolver read a half-typed value.

use std::sync::LazyLock;

use regex::Regex;

use crate::span::Span;

/// `class=` or `className=`, an opening quote, then the value
static CLASS_ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\bclass(?:Name)?=['"]([^'"]*)"#).expect("class attribute pattern is valid")
});

/// Same as [`CLASS_ATTRIBUTE`], but the value must run to the end of the text
static OPEN_CLASS_ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\bclass(?:Name)?=['"]([^'"]*)$"#).expect("open class attribute pattern is valid")
});

/// One class attribute value found in text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeMatch<'a> {
    /// Raw value text, without the quotes
    pub value: &'a str,
    /// Where the value sits in the scanned text
    pub span: Span,
}

/// Lazily scan `text` for every class attribute value, in text order.
pub fn scan_attributes(text: &str) -> impl Iterator<Item = AttributeMatch<'_>> {
    CLASS_ATTRIBUTE
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|value| AttributeMatch {
            value: value.as_str(),
            span: Span::new(value.start(), value.end()),
        })
}

/// If `text` ends inside an unterminated class attribute value, return that
/// value. Offsets in the returned span are relative to `text`.
pub fn open_attribute_at_end(text: &str) -> Option<AttributeMatch<'_>> {
    let value = OPEN_CLASS_ATTRIBUTE.captures(text)?.get(1)?;
    Some(AttributeMatch {
        value: value.as_str(),
        span: Span::new(value.start(), value.end()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(text: &str) -> Vec<&str> {
        scan_attributes(text).map(|m| m.value).collect()
    }

    #[test]
    fn test_class_and_class_name() {
        let text = r#"<div class="a b"><span className='c d'></span></div>"#;
        assert_eq!(values(text), ["a b", "c d"]);
    }

    #[test]
    fn test_span_covers_value_only() {
        let text = r#"<p class="x y">"#;
        let m = scan_attributes(text).next().unwrap();
        assert_eq!(&text[m.span.start()..m.span.end()], "x y");
        assert_eq!(m.span.start(), 10);
    }

    #[test]
    fn test_empty_value_still_matches() {
        let text = r#"<p class=""><i class='   '>"#;
        assert_eq!(values(text), ["", "   "]);
    }

    #[test]
    fn test_requires_word_boundary() {
        assert!(values(r#"<p subclass="a">"#).is_empty());
        assert!(values(r#"<p data-class="a">"#).len() == 1);
    }

    #[test]
    fn test_requires_quote() {
        assert!(values("<p class=a>").is_empty());
        assert!(values("<p class = \"a\">").is_empty());
    }

    #[test]
    fn test_unterminated_value_over_matches() {
        let text = "<p class=\"a b\n<div id=\"x\">";
        assert_eq!(values(text), ["a b\n<div id="]);
    }

    #[test]
    fn test_multiline_value() {
        let text = "<p class=\"a\n   b\">";
        assert_eq!(values(text), ["a\n   b"]);
    }

    #[test]
    fn test_open_attribute_at_end() {
        let m = open_attribute_at_end("<div class=\"a b").unwrap();
        assert_eq!(m.value, "a b");
        assert_eq!(m.span.start(), 12);

        assert!(open_attribute_at_end("<div class=\"a b\">").is_none());
        assert_eq!(open_attribute_at_end("<div class='").unwrap().value, "");
    }
}
