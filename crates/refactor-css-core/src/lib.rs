//! refactor-css-core - Cross-document index of class attribute combinations
//!
//! This crate provides the building blocks for:
//! - Extracting `class="..."` / `className="..."` values from markup-like text
//! - Normalizing each value into an order-independent [`ClassSignature`]
//! - Indexing every signature per document and across a workspace
//! - Picking which occurrences to highlight and answering hover queries
//!
//! # Features
//!
//! - `walk` - Enable [`WalkSources`] and [`GlobFilter`] for gitignore-aware
//!   discovery (brings in `ignore` and `globset`)
//! - `parallel` - Enable parallel extraction in [`PathSources`] (brings in `rayon`)
//!
//! # Indexing documents
//!
//! ```
//! use refactor_css_core::{ClassSignature, DocumentId, WorkspaceIndex};
//!
//! let mut index = WorkspaceIndex::new();
//! index.upsert(
//!     DocumentId::in_memory("home.html"),
//!     r#"<div class="card shadow p-4"></div><div class="p-4 card shadow"></div>"#,
//! );
//! index.upsert(
//!     DocumentId::in_memory("Profile.jsx"),
//!     r#"<div className='shadow card p-4'></div>"#,
//! );
//!
//! let aggregate = index.aggregate_count(&ClassSignature::from_value("card p-4 shadow"));
//! assert_eq!(aggregate.total, 3);
//! assert_eq!(aggregate.file_count(), 2);
//! ```
//!
//! # Highlighting and hover
//!
//! ```
//! use refactor_css_core::{CaretWindow, DocumentId, Thresholds, WorkspaceIndex, highlights, hover};
//!
//! let text = r#"<p class="a b c"></p><p class="c a b"></p><p class="b c a"></p>"#;
//! let active = DocumentId::in_memory("page.html");
//!
//! let mut index = WorkspaceIndex::new();
//! index.upsert(active.clone(), text);
//!
//! // Three classes, three occurrences: all three attributes qualify
//! assert_eq!(highlights(&index, &active, Thresholds::default()).len(), 3);
//!
//! let caret = text.find('b').unwrap();
//! let result = hover(&index, text, caret, CaretWindow::default()).unwrap();
//! assert_eq!(result.aggregate.total, 3);
//! ```
//!
//! # In-Memory Sources (for testing/embedding)
//!
//! ```
//! use refactor_css_core::{MemorySources, Sources};
//!
//! let result = MemorySources::new()
//!     .add("a.html", r#"<p class="x">"#)
//!     .add("b.html", r#"<p class="y">"#)
//!     .extract()
//!     .unwrap();
//!
//! assert_eq!(result.documents.len(), 2);
//! ```

mod document;
mod hover;
mod query;
mod scanner;
mod signature;
mod sources;
mod span;
mod workspace;

pub use document::{DocumentEntry, DocumentId, build_index};
pub use hover::{HoverResult, hover, render_hover};
pub use query::{CaretMatch, CaretWindow, Thresholds, highlights, local_highlights, resolve_at_caret};
pub use scanner::{AttributeMatch, open_attribute_at_end, scan_attributes};
pub use signature::ClassSignature;
pub use sources::{
    DEFAULT_EXCLUDE, DEFAULT_INCLUDE, ExtractionResult, MemorySources, PathSources, Sources,
};
pub use span::{LineCol, LineIndex, Span};
pub use workspace::{Aggregate, DocumentCount, Occurrence, WorkspaceIndex};

#[cfg(feature = "walk")]
pub use sources::{GlobFilter, IgnoreRules, WalkSources};
