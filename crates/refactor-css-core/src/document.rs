//! Per-document signature tables

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use eyre::{Result, eyre};
use indexmap::IndexMap;
use url::Url;

use crate::scanner::scan_attributes;
use crate::signature::ClassSignature;
use crate::span::{LineIndex, Span};

static MEMORY_BASE: LazyLock<Url> =
    LazyLock::new(|| Url::parse("memory:///").expect("memory base URL is valid"));

/// Identity of a document: its URI.
///
/// Workspace files use `file:` URIs; buffers the editor never saved use
/// whatever scheme the editor gives them (`untitled:` and friends).
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentId(Url);

impl DocumentId {
    pub fn new(uri: Url) -> Self {
        Self(uri)
    }

    /// Parse a URI string
    pub fn parse(uri: &str) -> Result<Self> {
        Url::parse(uri)
            .map(Self)
            .map_err(|e| eyre!("invalid document URI {uri:?}: {e}"))
    }

    /// `file:` identity for a path. Relative paths resolve against the
    /// current directory.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let absolute = std::path::absolute(path)
            .map_err(|e| eyre!("cannot resolve {}: {e}", path.display()))?;
        Url::from_file_path(&absolute)
            .map(Self)
            .map_err(|()| eyre!("cannot express {} as a file URI", absolute.display()))
    }

    /// Identity for content that only exists in memory (tests, embedding)
    pub fn in_memory(name: &str) -> Self {
        let mut url = MEMORY_BASE.clone();
        url.set_path(name);
        Self(url)
    }

    pub fn uri(&self) -> &Url {
        &self.0
    }

    pub fn scheme(&self) -> &str {
        self.0.scheme()
    }

    /// Local path, for `file:` identities only
    pub fn to_file_path(&self) -> Option<PathBuf> {
        if self.scheme() != "file" {
            return None;
        }
        self.0.to_file_path().ok()
    }
}

impl From<Url> for DocumentId {
    fn from(uri: Url) -> Self {
        Self(uri)
    }
}

impl fmt::Debug for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DocumentId({})", self.0)
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

/// One document's class signatures and where each one occurs.
///
/// Built in one pass over the full text and never patched afterwards: an
/// edit produces a brand new entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentEntry {
    id: DocumentId,
    lines: LineIndex,
    /// Signatures in order of first appearance, each with its spans in text order
    signatures: IndexMap<ClassSignature, Vec<Span>>,
}

impl DocumentEntry {
    /// Scan `text` and group every class attribute by signature.
    ///
    /// Deterministic: the same text always produces an equal entry.
    pub fn build(id: DocumentId, text: impl Into<Arc<str>>) -> Self {
        let lines = LineIndex::new(text);
        let mut signatures: IndexMap<ClassSignature, Vec<Span>> = IndexMap::new();

        for attribute in scan_attributes(lines.text()) {
            signatures
                .entry(ClassSignature::from_value(attribute.value))
                .or_default()
                .push(attribute.span);
        }

        Self {
            id,
            lines,
            signatures,
        }
    }

    pub fn id(&self) -> &DocumentId {
        &self.id
    }

    /// The text this entry was built from
    pub fn text(&self) -> &str {
        self.lines.text()
    }

    pub fn lines(&self) -> &LineIndex {
        &self.lines
    }

    /// Spans of every occurrence of `signature`, in text order
    pub fn occurrences(&self, signature: &ClassSignature) -> &[Span] {
        self.signatures
            .get(signature)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// How many attributes in this document carry `signature`
    pub fn count(&self, signature: &ClassSignature) -> usize {
        self.occurrences(signature).len()
    }

    /// Every signature with its occurrences, in order of first appearance
    pub fn signatures(&self) -> impl Iterator<Item = (&ClassSignature, &[Span])> {
        self.signatures
            .iter()
            .map(|(signature, spans)| (signature, spans.as_slice()))
    }

    /// Number of distinct signatures
    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }

    /// Number of class attributes in the document
    pub fn attribute_count(&self) -> usize {
        self.signatures.values().map(Vec::len).sum()
    }

    /// The signature whose occurrence contains `offset`, if any
    pub fn signature_at(&self, offset: usize) -> Option<&ClassSignature> {
        self.signatures
            .iter()
            .find(|(_, spans)| spans.iter().any(|span| span.touches(offset)))
            .map(|(signature, _)| signature)
    }
}

/// Build the index for one document (see [`DocumentEntry::build`])
pub fn build_index(id: DocumentId, text: impl Into<Arc<str>>) -> DocumentEntry {
    DocumentEntry::build(id, text)
}
