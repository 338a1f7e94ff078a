//! File watcher for workspace documents.
//!
//! Instead of watching the entire workspace and filtering events, this
//! module extracts directory prefixes from the include patterns and only
//! watches those directories. Changed paths are sent, batched, to a channel;
//! the receiver decides what each change means for the index.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use eyre::{Result, WrapErr};
use notify_debouncer_mini::notify::{RecommendedWatcher, RecursiveMode};
use notify_debouncer_mini::{DebounceEventResult, Debouncer, new_debouncer};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use crate::config::Config;

/// How long the watcher waits for a burst of file events to settle
pub const WATCH_DEBOUNCE: Duration = Duration::from_millis(200);

/// Extract the directory prefix from a glob pattern.
///
/// This finds the longest path prefix before any glob metacharacter.
///
/// # Examples
///
/// ```ignore
/// glob_to_watch_dir("views/**/*.html") => "views"
/// glob_to_watch_dir("src/*.vue") => "src"
/// glob_to_watch_dir("**/*.{html,vue}") => "."
/// ```
pub fn glob_to_watch_dir(pattern: &str) -> PathBuf {
    let mut result = PathBuf::new();

    for component in Path::new(pattern).components() {
        let s = component.as_os_str().to_string_lossy();
        // Stop at the first component containing glob metacharacters
        if s.contains(['*', '?', '[', '{']) {
            break;
        }
        result.push(component);
    }

    if result.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        result
    }
}

/// Directories to watch for the include patterns of `config`.
///
/// Directories that do not exist (yet) are skipped.
pub fn watch_dirs(config: &Config, root: &Path) -> HashSet<PathBuf> {
    let mut dirs = HashSet::new();

    for include in config.include.iter() {
        let full_path = root.join(glob_to_watch_dir(include));
        // Canonicalize to resolve .. components and get clean absolute paths
        match full_path.canonicalize() {
            Ok(canonical) if canonical.is_dir() => {
                dirs.insert(canonical);
            }
            Ok(_) => {
                if let Some(parent) = full_path.parent().and_then(|p| p.canonicalize().ok()) {
                    dirs.insert(parent);
                }
            }
            Err(_) => {
                debug!("Watch directory does not exist (yet): {}", full_path.display());
            }
        }
    }

    // A nested directory is already covered by a recursive watch on its parent
    let covered: Vec<PathBuf> = dirs
        .iter()
        .filter(|dir| dirs.iter().any(|other| other != *dir && dir.starts_with(other)))
        .cloned()
        .collect();
    for dir in covered {
        dirs.remove(&dir);
    }

    dirs
}

/// Manages file watching with dynamic reconfiguration.
pub struct WatcherManager {
    debouncer: Debouncer<RecommendedWatcher>,
    watched_dirs: HashSet<PathBuf>,
    root: PathBuf,
}

impl WatcherManager {
    /// Create a watcher that sends changed paths to `changes`.
    ///
    /// The watcher starts with no directories watched. Call `reconfigure()`
    /// after creation to set up watches based on config.
    pub fn new(root: PathBuf, changes: UnboundedSender<Vec<PathBuf>>) -> Result<Self> {
        let handler = move |result: DebounceEventResult| match result {
            Ok(events) => {
                let paths: Vec<PathBuf> = events.into_iter().map(|event| event.path).collect();
                if !paths.is_empty() && changes.send(paths).is_err() {
                    debug!("Change receiver dropped, ignoring file events");
                }
            }
            Err(e) => warn!("File watcher error: {}", e),
        };

        let debouncer =
            new_debouncer(WATCH_DEBOUNCE, handler).wrap_err("Failed to create file watcher")?;

        Ok(Self {
            debouncer,
            watched_dirs: HashSet::new(),
            root,
        })
    }

    /// Reconfigure watches based on the include patterns.
    ///
    /// Computes the new set of watch directories, removes watches for
    /// directories no longer needed, and adds watches for new ones.
    pub fn reconfigure(&mut self, config: &Config) -> Result<()> {
        let new_dirs = watch_dirs(config, &self.root);

        let to_remove: Vec<_> = self.watched_dirs.difference(&new_dirs).cloned().collect();
        let to_add: Vec<_> = new_dirs.difference(&self.watched_dirs).cloned().collect();

        for dir in &to_remove {
            if let Err(e) = self.debouncer.watcher().unwatch(dir) {
                // Not fatal - directory might have been deleted
                debug!("Failed to unwatch {} (may be deleted): {}", dir.display(), e);
            }
        }

        let mut failed = Vec::new();
        for dir in &to_add {
            match self.debouncer.watcher().watch(dir, RecursiveMode::Recursive) {
                Ok(()) => info!("Watching directory: {}", dir.display()),
                Err(e) => {
                    warn!("Failed to watch {}: {}", dir.display(), e);
                    failed.push(dir.clone());
                }
            }
        }

        self.watched_dirs = new_dirs;
        for dir in &failed {
            self.watched_dirs.remove(dir);
        }

        if !failed.is_empty() && self.watched_dirs.is_empty() {
            return Err(eyre::eyre!(
                "Could not watch any workspace directory under {}",
                self.root.display()
            ));
        }

        if !to_remove.is_empty() || !to_add.is_empty() {
            info!(
                "Reconfigured watcher: {} directories ({} added, {} removed)",
                self.watched_dirs.len(),
                to_add.len() - failed.len(),
                to_remove.len()
            );
        }

        Ok(())
    }

    /// Currently watched directories, sorted
    pub fn watched_dirs(&self) -> Vec<PathBuf> {
        let mut dirs: Vec<_> = self.watched_dirs.iter().cloned().collect();
        dirs.sort();
        dirs
    }
}
