//! Hover answers: what does the class combination under the caret look
//! like across the workspace

use std::fmt::Write as _;

use crate::document::DocumentId;
use crate::query::{CaretWindow, resolve_at_caret};
use crate::signature::ClassSignature;
use crate::span::Span;
use crate::workspace::{Aggregate, WorkspaceIndex};

/// Result of one hover query. Lives only as long as the request that
/// produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HoverResult {
    pub signature: ClassSignature,
    pub aggregate: Aggregate,
    /// The hovered attribute value, in the hovered document's offsets
    pub value_span: Span,
    /// Whether workspace discovery was still running when this was computed
    pub indexing: bool,
}

/// Resolve the attribute under `offset` in `text` and look its signature up
/// in `index`.
///
/// Returns `None` when the caret is not inside a class attribute value, when
/// the value has no classes, or when the signature is not indexed anywhere.
pub fn hover(
    index: &WorkspaceIndex,
    text: &str,
    offset: usize,
    window: CaretWindow,
) -> Option<HoverResult> {
    let caret = resolve_at_caret(text, offset, window)?;
    if caret.signature.is_empty() {
        return None;
    }

    let aggregate = index.aggregate_count(&caret.signature);
    if aggregate.is_empty() {
        return None;
    }

    Some(HoverResult {
        signature: caret.signature,
        aggregate,
        value_span: caret.value_span,
        indexing: false,
    })
}

/// Render a hover as Markdown.
///
/// `display` turns a document identity into the label shown for it, usually
/// a workspace-relative path.
pub fn render_hover(
    result: &HoverResult,
    active: &DocumentId,
    display: impl Fn(&DocumentId) -> String,
) -> String {
    let aggregate = &result.aggregate;
    let mut out = String::new();

    out.push_str("```html\n");
    let _ = writeln!(out, "<element {}/>", result.signature.to_attribute());
    out.push_str("```\n");

    match aggregate.documents.as_slice() {
        [] => {}
        [only] if &only.document == active => {
            let _ = write!(out, "\n**{} occurrences** in this document\n", only.count);
        }
        [only] => {
            let _ = write!(
                out,
                "\n**{} occurrences** in [{}]({})\n",
                only.count,
                display(&only.document),
                jump_target(&only.document, only.first_line)
            );
        }
        many => {
            let _ = writeln!(
                out,
                "\nFound {} times in {} files\n",
                aggregate.total,
                many.len()
            );
            for doc in many {
                let link = format!(
                    "[{}]({})",
                    display(&doc.document),
                    jump_target(&doc.document, doc.first_line)
                );
                if &doc.document == active {
                    let _ = writeln!(out, "- **`{}x in` {}**", doc.count, link);
                } else {
                    let _ = writeln!(out, "- `{}x in` {}", doc.count, link);
                }
            }
        }
    }

    if result.indexing {
        out.push_str("\n_Workspace indexing in progress; counts may be incomplete._\n");
    }

    out
}

/// Link that opens `document` at a zero-based `line`
fn jump_target(document: &DocumentId, line: u32) -> String {
    let mut uri = document.uri().clone();
    uri.set_fragment(Some(&format!("L{}", line + 1)));
    uri.to_string()
}
