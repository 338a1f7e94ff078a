//! Workspace-wide index: one [`DocumentEntry`] per known document
//!
//! Cross-document totals are never stored. Every aggregate query walks the
//! documents and does one keyed lookup in each, so removing or replacing a
//! document can never leave a stale total behind.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use crate::document::{DocumentEntry, DocumentId};
use crate::signature::ClassSignature;
use crate::span::Span;

/// Mapping from document identity to that document's signature table
#[derive(Debug, Clone, Default)]
pub struct WorkspaceIndex {
    documents: HashMap<DocumentId, DocumentEntry>,
}

/// One attribute occurrence somewhere in the workspace
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Occurrence<'a> {
    pub document: &'a DocumentId,
    pub span: Span,
}

/// How often one document uses a signature
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentCount {
    pub document: DocumentId,
    pub count: usize,
    /// First occurrence in the document, the jump target
    pub first: Span,
    /// Zero-based line of `first`
    pub first_line: u32,
}

/// Workspace-wide usage of one signature
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aggregate {
    pub signature: ClassSignature,
    /// Occurrences across all documents
    pub total: usize,
    /// Contributing documents, ordered by identity
    pub documents: Vec<DocumentCount>,
}

impl Aggregate {
    /// Number of documents that use the signature at least once
    pub fn file_count(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Occurrences within one document
    pub fn count_in(&self, document: &DocumentId) -> usize {
        self.documents
            .iter()
            .find(|d| &d.document == document)
            .map(|d| d.count)
            .unwrap_or(0)
    }
}

impl WorkspaceIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a document's entry from `text`, replacing any previous entry.
    pub fn upsert(&mut self, id: DocumentId, text: impl Into<Arc<str>>) -> &DocumentEntry {
        let entry = DocumentEntry::build(id, text);
        self.insert(entry)
    }

    /// Store a prebuilt entry, replacing any previous entry for its identity.
    pub fn insert(&mut self, entry: DocumentEntry) -> &DocumentEntry {
        let id = entry.id().clone();
        match self.documents.entry(id) {
            Entry::Occupied(mut slot) => {
                slot.insert(entry);
                slot.into_mut()
            }
            Entry::Vacant(slot) => slot.insert(entry),
        }
    }

    /// Forget a document. Unknown identities are ignored.
    pub fn remove(&mut self, id: &DocumentId) -> Option<DocumentEntry> {
        self.documents.remove(id)
    }

    /// Drop every document for which `keep` returns false
    pub fn retain(&mut self, mut keep: impl FnMut(&DocumentId) -> bool) {
        self.documents.retain(|id, _| keep(id));
    }

    pub fn clear(&mut self) {
        self.documents.clear();
    }

    pub fn get(&self, id: &DocumentId) -> Option<&DocumentEntry> {
        self.documents.get(id)
    }

    pub fn contains(&self, id: &DocumentId) -> bool {
        self.documents.contains_key(id)
    }

    /// Number of known documents
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn documents(&self) -> impl Iterator<Item = &DocumentEntry> {
        self.documents.values()
    }

    /// Occurrences of `signature` across all documents
    pub fn total_count(&self, signature: &ClassSignature) -> usize {
        self.documents
            .values()
            .map(|entry| entry.count(signature))
            .sum()
    }

    /// Total occurrences of `signature` plus a per-document breakdown.
    pub fn aggregate_count(&self, signature: &ClassSignature) -> Aggregate {
        let mut documents: Vec<DocumentCount> = self
            .documents
            .values()
            .filter_map(|entry| {
                let spans = entry.occurrences(signature);
                let first = *spans.first()?;
                Some(DocumentCount {
                    document: entry.id().clone(),
                    count: spans.len(),
                    first,
                    first_line: entry.lines().line_of(first.start()),
                })
            })
            .collect();
        documents.sort_by(|a, b| a.document.cmp(&b.document));

        Aggregate {
            signature: signature.clone(),
            total: documents.iter().map(|d| d.count).sum(),
            documents,
        }
    }

    /// Every occurrence of `signature`, grouped by document in identity order
    pub fn occurrences(&self, signature: &ClassSignature) -> Vec<Occurrence<'_>> {
        let mut entries: Vec<&DocumentEntry> = self
            .documents
            .values()
            .filter(|entry| entry.count(signature) > 0)
            .collect();
        entries.sort_by(|a, b| a.id().cmp(b.id()));

        entries
            .into_iter()
            .flat_map(|entry| {
                entry.occurrences(signature).iter().map(move |&span| Occurrence {
                    document: entry.id(),
                    span,
                })
            })
            .collect()
    }
}
