//! Core engine for the language server.
//!
//! The engine owns the one [`WorkspaceIndex`] and is its only writer. Every
//! update replaces whole document entries under the write lock, so readers
//! see either the old entry or the new one and never a partial rebuild.
//!
//! Rebuilds triggered by edits are tagged with a generation.
//! A rebuild whose generation is no longer current when it finishes is
//! dropped instead of committed.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use eyre::{Result, WrapErr};
use refactor_css_core::{
    ClassSignature, DocumentEntry, DocumentId, GlobFilter, HoverResult, IgnoreRules, LineCol,
    Sources, Span, WalkSources, WorkspaceIndex, highlights, render_hover,
};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::Config;

/// A zero-based line/UTF-16 column range in a document
pub type LineRange = (LineCol, LineCol);

/// Outcome of one workspace discovery
#[derive(Debug, Default)]
pub struct IndexReport {
    /// Documents read from disk
    pub documents: usize,
    /// Files that could not be read, in human-readable form
    pub warnings: Vec<String>,
    pub elapsed: Duration,
}

/// What to draw in one document
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Decorations {
    /// Attributes whose signature passes the highlight thresholds
    pub qualifying: Vec<LineRange>,
    /// Attributes sharing the signature most recently hovered
    pub hovered: Vec<LineRange>,
}

struct Settings {
    config: Config,
    filter: GlobFilter,
}

/// The refactor-css engine.
pub struct Engine {
    root: Option<PathBuf>,
    /// Ignore files under the root, applied to files the watcher reports
    ignore: Option<IgnoreRules>,
    index: RwLock<WorkspaceIndex>,
    settings: RwLock<Settings>,
    /// Set while workspace discovery is running
    indexing: AtomicBool,
    /// Source of update generations, shared by all documents
    next_generation: AtomicU64,
    /// Latest generation of each document with an update in flight
    generations: Mutex<HashMap<DocumentId, u64>>,
    /// Documents whose content is owned by the editor, not the disk
    open: Mutex<HashSet<DocumentId>>,
}

impl Engine {
    /// Create an engine for an optional workspace root.
    ///
    /// Fails if the configured include/exclude patterns do not compile.
    pub fn new(root: Option<PathBuf>, config: Config) -> Result<Self> {
        let filter = config.filter()?;
        // Discovered documents are identified by canonical paths
        let root = root.map(|root| root.canonicalize().unwrap_or(root));
        let ignore = root.as_deref().map(IgnoreRules::new);
        Ok(Self {
            root,
            ignore,
            index: RwLock::new(WorkspaceIndex::new()),
            settings: RwLock::new(Settings { config, filter }),
            indexing: AtomicBool::new(false),
            next_generation: AtomicU64::new(1),
            generations: Mutex::new(HashMap::new()),
            open: Mutex::new(HashSet::new()),
        })
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    /// Identity of the document at `uri`.
    ///
    /// `file:` URIs resolve symlinks the way discovery does, so a file
    /// reached through a linked directory is still one document. Other
    /// schemes are taken as they are.
    pub fn identity(&self, uri: &Url) -> DocumentId {
        match uri.to_file_path() {
            Ok(path) if uri.scheme() == "file" => self
                .path_identity(&path)
                .unwrap_or_else(|_| DocumentId::new(uri.clone())),
            _ => DocumentId::new(uri.clone()),
        }
    }

    /// Identity of the file at `path`. A file that does not exist (any
    /// more) is resolved through its parent directory.
    pub fn path_identity(&self, path: &Path) -> Result<DocumentId> {
        let resolved = match path.canonicalize() {
            Ok(canonical) => canonical,
            Err(_) => match (path.parent(), path.file_name()) {
                (Some(parent), Some(name)) => parent
                    .canonicalize()
                    .map(|parent| parent.join(name))
                    .unwrap_or_else(|_| path.to_path_buf()),
                _ => path.to_path_buf(),
            },
        };
        DocumentId::from_path(resolved)
    }

    /// Whether workspace discovery is still running
    pub fn is_indexing(&self) -> bool {
        self.indexing.load(Ordering::SeqCst)
    }

    pub async fn config(&self) -> Config {
        self.settings.read().await.config.clone()
    }

    /// Replace the configuration.
    ///
    /// Returns whether the set of workspace files may have changed, in which
    /// case the caller should run [`Engine::index_workspace`] again. Invalid
    /// patterns leave the current configuration in place.
    pub async fn set_config(&self, config: Config) -> Result<bool> {
        let filter = config.filter()?;
        let mut settings = self.settings.write().await;
        let changed = settings.config.discovery_changed(&config);
        *settings = Settings { config, filter };
        Ok(changed)
    }

    /// Discover and index every matching file under the workspace root.
    ///
    /// Documents open in the editor keep their in-memory content. Documents
    /// that no longer match the filter are dropped.
    pub async fn index_workspace(&self) -> Result<IndexReport> {
        let Some(root) = self.root.clone() else {
            debug!("No workspace root, skipping discovery");
            return Ok(IndexReport::default());
        };

        self.indexing.store(true, Ordering::SeqCst);
        let config = self.config().await;
        let start = Instant::now();

        let extracted = tokio::task::spawn_blocking(move || {
            WalkSources::new(root)
                .include(config.include.iter())
                .exclude(config.exclude.iter())
                .extract()
        })
        .await;
        let extracted = match extracted {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                self.indexing.store(false, Ordering::SeqCst);
                return Err(e).wrap_err("Workspace discovery failed");
            }
            Err(e) => {
                self.indexing.store(false, Ordering::SeqCst);
                return Err(e).wrap_err("Workspace discovery task panicked");
            }
        };

        let documents = extracted.documents.len();
        {
            let open = self.open_documents();
            let discovered: HashSet<DocumentId> = extracted
                .documents
                .iter()
                .map(|entry| entry.id().clone())
                .collect();

            let mut index = self.index.write().await;
            index.retain(|id| open.contains(id) || discovered.contains(id));
            for entry in extracted.documents {
                if !open.contains(entry.id()) {
                    index.insert(entry);
                }
            }
        }
        self.indexing.store(false, Ordering::SeqCst);

        let elapsed = start.elapsed();
        info!(
            "Indexed {} documents in {:?} ({} warnings)",
            documents,
            elapsed,
            extracted.warnings.len()
        );

        Ok(IndexReport {
            documents,
            warnings: extracted.warnings,
            elapsed,
        })
    }

    /// Mark a document as owned by the editor
    pub fn open(&self, id: &DocumentId) {
        self.open
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.clone());
    }

    /// Hand a document back to the disk
    pub fn close(&self, id: &DocumentId) {
        self.open
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
    }

    pub fn is_open(&self, id: &DocumentId) -> bool {
        self.open
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(id)
    }

    fn open_documents(&self) -> HashSet<DocumentId> {
        self.open
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Start a new update for `id`, invalidating any update in flight.
    pub fn begin_update(&self, id: &DocumentId) -> u64 {
        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst);
        self.generations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.clone(), generation);
        generation
    }

    /// Invalidate any update in flight for `id`
    fn end_updates(&self, id: &DocumentId) {
        self.generations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
    }

    /// Drop `generation` of `id` if it is still the latest
    fn finish_update(&self, id: &DocumentId, generation: u64) {
        let mut generations = self
            .generations
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if generations.get(id) == Some(&generation) {
            generations.remove(id);
        }
    }

    /// Number of documents with an update in flight
    pub fn pending_updates(&self) -> usize {
        self.generations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn is_current(&self, id: &DocumentId, generation: u64) -> bool {
        self.generations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .is_some_and(|current| *current == generation)
    }

    /// Rebuild `id` from `text` and commit it if `generation` is still the
    /// latest. Returns whether the entry was committed.
    pub async fn commit_update(&self, id: &DocumentId, generation: u64, text: &str) -> bool {
        let entry = DocumentEntry::build(id.clone(), text);

        let mut index = self.index.write().await;
        if !self.is_current(id, generation) {
            debug!("Discarding stale rebuild of {} (generation {})", id, generation);
            return false;
        }
        index.insert(entry);
        // Older generations can no longer match once the key is gone
        self.end_updates(id);
        true
    }

    /// Rebuild `id` from `text` unconditionally
    pub async fn upsert(&self, id: &DocumentId, text: &str) {
        let generation = self.begin_update(id);
        self.commit_update(id, generation, text).await;
    }

    /// Forget `id`
    pub async fn remove(&self, id: &DocumentId) {
        self.end_updates(id);
        if self.index.write().await.remove(id).is_some() {
            debug!("Removed {}", id);
        }
    }

    /// Bring `id` in line with the disk: re-read it if it exists and belongs
    /// to the workspace, forget it otherwise.
    ///
    /// Returns whether the document is indexed afterwards.
    pub async fn refresh_from_disk(&self, id: &DocumentId) -> bool {
        let Some(path) = id.to_file_path() else {
            self.remove(id).await;
            return false;
        };

        if !self.belongs_to_workspace(&path).await {
            self.remove(id).await;
            return false;
        }

        let generation = self.begin_update(id);
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => self.commit_update(id, generation, &text).await,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                self.remove(id).await;
                false
            }
            Err(e) => {
                // Keep whatever was indexed before
                warn!("Failed to read {}: {}", path.display(), e);
                self.finish_update(id, generation);
                self.contains(id).await
            }
        }
    }

    /// Whether `path` is under the root, passes the include/exclude filter
    /// and is not skipped by the workspace's ignore files, which is what
    /// discovery would decide for it
    pub async fn belongs_to_workspace(&self, path: &Path) -> bool {
        let Some(root) = &self.root else {
            return false;
        };
        let path = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        if !self.settings.read().await.filter.matches_in(root, &path) {
            return false;
        }
        !self
            .ignore
            .as_ref()
            .is_some_and(|rules| rules.is_ignored(&path))
    }

    /// A file changed on disk. Documents open in the editor are left alone.
    pub async fn file_changed(&self, path: &Path) {
        let id = match self.path_identity(path) {
            Ok(id) => id,
            Err(e) => {
                debug!("Ignoring change to {}: {}", path.display(), e);
                return;
            }
        };
        if self.is_open(&id) {
            return;
        }
        self.refresh_from_disk(&id).await;
    }

    pub async fn contains(&self, id: &DocumentId) -> bool {
        self.index.read().await.contains(id)
    }

    /// Number of indexed documents
    pub async fn document_count(&self) -> usize {
        self.index.read().await.len()
    }

    /// Occurrences of `signature` in `id`
    pub async fn occurrences(&self, id: &DocumentId, signature: &ClassSignature) -> Vec<Span> {
        self.index
            .read()
            .await
            .get(id)
            .map(|entry| entry.occurrences(signature).to_vec())
            .unwrap_or_default()
    }

    /// Workspace-wide occurrence count of `signature`
    pub async fn total_count(&self, signature: &ClassSignature) -> usize {
        self.index.read().await.total_count(signature)
    }

    /// Ranges to decorate in `id`, given the signature currently hovered
    /// (if any)
    pub async fn decorations(
        &self,
        id: &DocumentId,
        hovered: Option<&ClassSignature>,
    ) -> Decorations {
        let thresholds = self.settings.read().await.config.thresholds();
        let index = self.index.read().await;
        let Some(entry) = index.get(id) else {
            return Decorations::default();
        };

        let lines = entry.lines();
        let qualifying = highlights(&index, id, thresholds)
            .into_iter()
            .map(|span| lines.range(span))
            .collect();
        let hovered = hovered
            .map(|signature| {
                entry
                    .occurrences(signature)
                    .iter()
                    .map(|span| lines.range(*span))
                    .collect()
            })
            .unwrap_or_default();

        Decorations {
            qualifying,
            hovered,
        }
    }

    /// Resolve a hover at `offset` in `text`, the current editor content
    pub async fn hover(&self, text: &str, offset: usize) -> Option<HoverResult> {
        let window = self.settings.read().await.config.caret_window();
        let index = self.index.read().await;
        let mut result = refactor_css_core::hover(&index, text, offset, window)?;
        result.indexing = self.is_indexing();
        Some(result)
    }

    /// Render a hover as Markdown, naming documents relative to the root
    pub fn render(&self, result: &HoverResult, active: &DocumentId) -> String {
        render_hover(result, active, |id| self.display_name(id))
    }

    /// Label for a document: workspace-relative path when possible
    pub fn display_name(&self, id: &DocumentId) -> String {
        let Some(path) = id.to_file_path() else {
            return id.to_string();
        };
        self.root
            .as_ref()
            .and_then(|root| path.strip_prefix(root).ok())
            .map(|relative| relative.to_string_lossy().replace('\\', "/"))
            .unwrap_or_else(|| path.display().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> Engine {
        Engine::new(None, Config::default()).unwrap()
    }

    #[tokio::test]
    async fn test_stale_commit_is_discarded() {
        let engine = engine();
        let id = DocumentId::in_memory("page.html");

        let first = engine.begin_update(&id);
        let second = engine.begin_update(&id);

        assert!(engine.commit_update(&id, second, r#"<p class="new">"#).await);
        assert!(!engine.commit_update(&id, first, r#"<p class="old">"#).await);

        assert_eq!(engine.total_count(&ClassSignature::from_value("new")).await, 1);
        assert_eq!(engine.total_count(&ClassSignature::from_value("old")).await, 0);
    }

    #[tokio::test]
    async fn test_remove_invalidates_pending_update() {
        let engine = engine();
        let id = DocumentId::in_memory("closing.html");

        let pending = engine.begin_update(&id);
        engine.remove(&id).await;
        assert!(!engine.commit_update(&id, pending, r#"<p class="x">"#).await);
        assert!(!engine.contains(&id).await);
    }

    #[tokio::test]
    async fn test_generations_are_dropped_once_settled() {
        let engine = engine();
        for n in 0..50 {
            let id = DocumentId::in_memory(&format!("churn-{n}.html"));
            engine.upsert(&id, r#"<p class="x">"#).await;
            engine.remove(&id).await;
        }
        let kept = DocumentId::in_memory("kept.html");
        engine.upsert(&kept, r#"<p class="x">"#).await;
        assert_eq!(engine.pending_updates(), 0);

        let pending = engine.begin_update(&kept);
        assert_eq!(engine.pending_updates(), 1);
        assert!(engine.commit_update(&kept, pending, r#"<p class="y">"#).await);
        assert_eq!(engine.pending_updates(), 0);
    }

    #[tokio::test]
    async fn test_removed_then_reopened_rejects_old_generation() {
        let engine = engine();
        let id = DocumentId::in_memory("again.html");

        let old = engine.begin_update(&id);
        engine.remove(&id).await;
        let fresh = engine.begin_update(&id);
        assert_ne!(old, fresh);
        assert!(!engine.commit_update(&id, old, r#"<p class="old">"#).await);
        assert!(engine.commit_update(&id, fresh, r#"<p class="new">"#).await);
    }

    #[test]
    fn test_identity_keeps_non_file_uris() {
        let engine = engine();
        let uri = Url::parse("untitled:Untitled-1").unwrap();
        assert_eq!(engine.identity(&uri).uri(), &uri);
    }

    #[test]
    fn test_path_identity_of_missing_file_resolves_parent() {
        let engine = engine();
        let dir = tempfile::tempdir().unwrap();
        let canonical = dir.path().canonicalize().unwrap();

        let id = engine.path_identity(&dir.path().join("gone.html")).unwrap();
        assert_eq!(id.to_file_path(), Some(canonical.join("gone.html")));
    }

    #[tokio::test]
    async fn test_no_root_means_empty_discovery() {
        let engine = engine();
        let report = engine.index_workspace().await.unwrap();
        assert_eq!(report.documents, 0);
        assert!(report.warnings.is_empty());
        assert!(!engine.is_indexing());
    }

    #[tokio::test]
    async fn test_decorations_with_hovered_signature() {
        let engine = engine();
        let id = DocumentId::in_memory("d.html");
        engine
            .upsert(
                &id,
                "<p class=\"a b c\">\n<p class=\"c b a\">\n<p class=\"b a c\">\n<i class=\"x\">",
            )
            .await;

        let plain = engine.decorations(&id, None).await;
        assert_eq!(plain.qualifying.len(), 3);
        assert!(plain.hovered.is_empty());
        assert_eq!(plain.qualifying[1], (LineCol::new(1, 10), LineCol::new(1, 15)));

        let hovered = ClassSignature::from_value("x");
        let decorated = engine.decorations(&id, Some(&hovered)).await;
        assert_eq!(decorated.hovered, vec![(LineCol::new(3, 10), LineCol::new(3, 11))]);
    }

    #[tokio::test]
    async fn test_hover_marks_indexing() {
        let engine = engine();
        let id = DocumentId::in_memory("h.html");
        let text = r#"<p class="m n">"#;
        engine.upsert(&id, text).await;

        engine.indexing.store(true, Ordering::SeqCst);
        let result = engine.hover(text, 11).await.unwrap();
        assert!(result.indexing);
        assert!(engine.render(&result, &id).contains("indexing in progress"));
    }

    #[tokio::test]
    async fn test_invalid_config_keeps_previous() {
        let engine = engine();
        let mut bad = Config::default();
        bad.exclude = crate::config::Patterns(vec!["{".into()]);
        assert!(engine.set_config(bad).await.is_err());
        assert_eq!(engine.config().await, Config::default());
    }
}
