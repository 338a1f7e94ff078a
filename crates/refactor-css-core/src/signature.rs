//! Canonical identity for a set of class names
//!
//! Two attributes carry "the same class combination" when their class sets
//! are equal, regardless of order or repetition. Sorting and deduplicating
//! the tokens turns that set comparison into plain string equality, so a
//! signature can be used directly as a map key.

use std::fmt;
use std::sync::Arc;

/// Order- and duplicate-insensitive set of class tokens.
///
/// Internally this is the sorted, deduplicated tokens joined by single
/// spaces. Tokens never contain whitespace, so the joined form is canonical.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassSignature {
    key: Arc<str>,
    len: usize,
}

impl ClassSignature {
    /// Normalize a raw attribute value.
    ///
    /// Stray quote characters are dropped, the rest is split on whitespace.
    /// Never fails: degenerate input yields the empty signature.
    pub fn from_value(raw: &str) -> Self {
        let stripped = raw.replace(['"', '\''], "");
        Self::from_tokens(stripped.split_whitespace())
    }

    /// Build a signature from already-split tokens
    pub fn from_tokens<'a>(tokens: impl IntoIterator<Item = &'a str>) -> Self {
        let mut tokens: Vec<&str> = tokens
            .into_iter()
            .flat_map(|token| token.split_whitespace())
            .collect();
        tokens.sort_unstable();
        tokens.dedup();

        Self {
            len: tokens.len(),
            key: Arc::from(tokens.join(" ")),
        }
    }

    /// The empty signature (an attribute with no classes)
    pub fn empty() -> Self {
        Self {
            key: Arc::from(""),
            len: 0,
        }
    }

    /// Canonical key: sorted tokens joined by a single space
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Number of distinct classes
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Distinct classes in canonical (sorted) order
    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.key.split(' ').filter(|t| !t.is_empty())
    }

    pub fn contains(&self, class: &str) -> bool {
        self.tokens().any(|t| t == class)
    }

    /// Reconstructed attribute, e.g. `class="a b c"`
    pub fn to_attribute(&self) -> String {
        format!("class=\"{}\"", self.key)
    }
}

impl Default for ClassSignature {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for ClassSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.tokens()).finish()
    }
}

impl fmt::Display for ClassSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_and_duplicates_ignored() {
        let a = ClassSignature::from_value("b a a c");
        let b = ClassSignature::from_value("c b a");
        assert_eq!(a, b);
        assert_eq!(a.len(), 3);
        assert_eq!(a.key(), "a b c");
    }

    #[test]
    fn test_whitespace_variants() {
        let sig = ClassSignature::from_value("  btn\tbtn-primary\n\n  large ");
        assert_eq!(sig.key(), "btn btn-primary large");
        assert_eq!(
            sig.tokens().collect::<Vec<_>>(),
            ["btn", "btn-primary", "large"]
        );
    }

    #[test]
    fn test_stray_quotes_are_stripped() {
        let sig = ClassSignature::from_value("a 'b' \"c");
        assert_eq!(sig.key(), "a b c");
    }

    #[test]
    fn test_empty_and_blank_values() {
        assert!(ClassSignature::from_value("").is_empty());
        assert!(ClassSignature::from_value("   \n\t").is_empty());
        assert_eq!(ClassSignature::from_value(" "), ClassSignature::empty());
        assert_eq!(ClassSignature::empty().tokens().count(), 0);
    }

    #[test]
    fn test_subset_is_not_equal() {
        let abc = ClassSignature::from_value("a b c");
        let ab = ClassSignature::from_value("a b");
        assert_ne!(abc, ab);
        assert!(abc.contains("c"));
        assert!(!ab.contains("c"));
    }

    #[test]
    fn test_to_attribute() {
        let sig = ClassSignature::from_value("d c b a");
        assert_eq!(sig.to_attribute(), "class=\"a b c d\"");
        assert_eq!(sig.to_string(), "a b c d");
    }
}
