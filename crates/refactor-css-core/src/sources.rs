//! Source providers for document discovery
//!
//! A provider turns "some documents" into built [`DocumentEntry`] values.
//! Reading is best-effort: a file that cannot be read becomes a warning and
//! the rest of the batch carries on.

use crate::document::{DocumentEntry, DocumentId};
use eyre::Result;
#[cfg(feature = "walk")]
use eyre::WrapErr;
#[cfg(feature = "walk")]
use std::path::Path;
use std::path::PathBuf;

/// Default include pattern: the markup-ish file types class attributes live in
pub const DEFAULT_INCLUDE: &str = "**/*.{html,htm,jade,pug,cshtml,razor,php,twig,md,markdown,erb,hbs,handlebars,ejs,njk,nunjucks,haml,leaf,eex,vue}";

/// Default exclude pattern
pub const DEFAULT_EXCLUDE: &str = "**/node_modules/**";

/// Result of extracting documents, including warnings about files that
/// could not be read
#[derive(Debug, Default)]
pub struct ExtractionResult {
    pub documents: Vec<DocumentEntry>,
    pub warnings: Vec<String>,
}

impl ExtractionResult {
    fn read(&mut self, path: &std::path::Path) {
        match read_entry(path) {
            Ok(entry) => self.documents.push(entry),
            Err(warning) => self.warnings.push(warning),
        }
    }

    fn extend(&mut self, other: ExtractionResult) {
        self.documents.extend(other.documents);
        self.warnings.extend(other.warnings);
    }
}

/// Trait for providing documents to index
pub trait Sources {
    /// Read and index every document this provider knows about
    fn extract(self) -> Result<ExtractionResult>;
}

/// Read one file and build its entry, or describe why that failed
fn read_entry(path: &std::path::Path) -> std::result::Result<DocumentEntry, String> {
    let id = DocumentId::from_path(path).map_err(|e| format!("Skipping {}: {e}", path.display()))?;
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {e}", path.display()))?;
    Ok(DocumentEntry::build(id, content))
}

/// Sources from an explicit list of file paths
pub struct PathSources(Vec<PathBuf>);

impl PathSources {
    /// Create from an iterator of paths
    pub fn new(paths: impl IntoIterator<Item = impl Into<PathBuf>>) -> Self {
        Self(paths.into_iter().map(Into::into).collect())
    }
}

impl Sources for PathSources {
    fn extract(self) -> Result<ExtractionResult> {
        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;

            Ok(self
                .0
                .par_iter()
                .fold(ExtractionResult::default, |mut result, path| {
                    result.read(path);
                    result
                })
                .reduce(ExtractionResult::default, |mut a, b| {
                    a.extend(b);
                    a
                }))
        }

        #[cfg(not(feature = "parallel"))]
        {
            let mut result = ExtractionResult::default();
            for path in &self.0 {
                result.read(path);
            }
            Ok(result)
        }
    }
}

/// In-memory sources (useful for testing, embedding, etc.)
pub struct MemorySources(Vec<(DocumentId, String)>);

impl MemorySources {
    /// Create empty memory sources
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Add a document with content, identified as `memory:///<name>`
    pub fn add(mut self, name: &str, content: impl Into<String>) -> Self {
        self.0.push((DocumentId::in_memory(name), content.into()));
        self
    }
}

impl Default for MemorySources {
    fn default() -> Self {
        Self::new()
    }
}

impl Sources for MemorySources {
    fn extract(self) -> Result<ExtractionResult> {
        Ok(ExtractionResult {
            documents: self
                .0
                .into_iter()
                .map(|(id, content)| DocumentEntry::build(id, content))
                .collect(),
            warnings: Vec::new(),
        })
    }
}

/// Compiled include/exclude glob patterns.
///
/// A path matches when it matches some include pattern (or there are no
/// include patterns) and no exclude pattern. Paths are matched relative to
/// the workspace root, with `/` separators.
#[cfg(feature = "walk")]
#[derive(Debug, Clone)]
pub struct GlobFilter {
    include: Option<globset::GlobSet>,
    exclude: globset::GlobSet,
}

#[cfg(feature = "walk")]
impl GlobFilter {
    pub fn new(
        include: impl IntoIterator<Item = impl AsRef<str>>,
        exclude: impl IntoIterator<Item = impl AsRef<str>>,
    ) -> Result<Self> {
        let include: Vec<String> = include.into_iter().map(|p| p.as_ref().to_owned()).collect();
        let exclude: Vec<String> = exclude.into_iter().map(|p| p.as_ref().to_owned()).collect();

        Ok(Self {
            include: if include.is_empty() {
                None
            } else {
                Some(build_glob_set(&include).wrap_err("Invalid include pattern")?)
            },
            exclude: build_glob_set(&exclude).wrap_err("Invalid exclude pattern")?,
        })
    }

    /// Filter built from [`DEFAULT_INCLUDE`] and [`DEFAULT_EXCLUDE`]
    pub fn markup() -> Result<Self> {
        Self::new([DEFAULT_INCLUDE], [DEFAULT_EXCLUDE])
    }

    /// Whether a root-relative path passes the filter
    pub fn matches(&self, relative: &Path) -> bool {
        let normalized = relative.to_string_lossy().replace('\\', "/");
        let included = self
            .include
            .as_ref()
            .is_none_or(|set| set.is_match(normalized.as_str()));
        included && !self.exclude.is_match(normalized.as_str())
    }

    /// Whether `path` passes the filter, relative to `root`. Paths outside
    /// `root` never match.
    pub fn matches_in(&self, root: &Path, path: &Path) -> bool {
        match path.strip_prefix(root) {
            Ok(relative) => self.matches(relative),
            Err(_) => false,
        }
    }
}

#[cfg(feature = "walk")]
fn build_glob_set(patterns: &[String]) -> Result<globset::GlobSet> {
    let mut builder = globset::GlobSetBuilder::new();
    for pattern in patterns {
        let glob = globset::Glob::new(&pattern.replace('\\', "/"))
            .wrap_err_with(|| format!("Bad glob pattern: {pattern}"))?;
        builder.add(glob);
    }
    builder.build().wrap_err("Failed to compile glob patterns")
}

/// Ignore files consulted for single paths, the way [`WalkSources`] applies
/// them while walking.
///
/// `.ignore` files always apply. `.gitignore` files, `.git/info/exclude` and
/// the global git excludes file only apply inside a git repository. Deeper
/// directories take precedence over shallower ones, so a nested `!pattern`
/// can re-include what a parent ignores.
///
/// Ignore files are re-read on every query, so edits to them take effect
/// without rebuilding the rules.
#[cfg(feature = "walk")]
pub struct IgnoreRules {
    root: PathBuf,
    /// Top of the enclosing git repository, if any
    repo: Option<PathBuf>,
    global: ignore::gitignore::Gitignore,
}

#[cfg(feature = "walk")]
impl IgnoreRules {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let repo = root
            .ancestors()
            .find(|dir| dir.join(".git").exists())
            .map(Path::to_path_buf);
        let global = if repo.is_some() {
            ignore::gitignore::Gitignore::global().0
        } else {
            ignore::gitignore::Gitignore::empty()
        };
        Self { root, repo, global }
    }

    /// Whether the file at `path` would be skipped by a walk of the root.
    /// Paths outside the root are never ignored.
    pub fn is_ignored(&self, path: &Path) -> bool {
        let Ok(relative) = path.strip_prefix(&self.root) else {
            return false;
        };

        // Ignore files above the root only count up to the repository top
        let top = match &self.repo {
            Some(repo) if self.root.starts_with(repo) => repo.as_path(),
            _ => self.root.as_path(),
        };

        let mut names = vec![".ignore"];
        if self.repo.is_some() {
            names.push(".gitignore");
        }

        let mut dir = path.parent();
        while let Some(current) = dir {
            if !current.starts_with(top) {
                break;
            }
            for name in &names {
                let file = current.join(name);
                if !file.is_file() {
                    continue;
                }
                let (matcher, _) = ignore::gitignore::Gitignore::new(&file);
                let Ok(below) = path.strip_prefix(current) else {
                    continue;
                };
                let decision = matcher.matched_path_or_any_parents(below, false);
                if !decision.is_none() {
                    return decision.is_ignore();
                }
            }
            dir = current.parent();
        }

        if let Some(repo) = &self.repo {
            let exclude = repo.join(".git").join("info").join("exclude");
            if exclude.is_file()
                && let Ok(below) = path.strip_prefix(repo)
            {
                let mut builder = ignore::gitignore::GitignoreBuilder::new(repo);
                builder.add(&exclude);
                if let Ok(matcher) = builder.build() {
                    let decision = matcher.matched_path_or_any_parents(below, false);
                    if !decision.is_none() {
                        return decision.is_ignore();
                    }
                }
            }
        }

        self.global
            .matched_path_or_any_parents(relative, false)
            .is_ignore()
    }
}

/// Gitignore-aware directory walker
#[cfg(feature = "walk")]
pub struct WalkSources {
    root: PathBuf,
    include: Vec<String>,
    exclude: Vec<String>,
}

#[cfg(feature = "walk")]
impl WalkSources {
    /// Create a walker for the given root directory
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            include: Vec::new(),
            exclude: Vec::new(),
        }
    }

    /// Add include patterns (e.g., `["**/*.html"]`)
    pub fn include(mut self, patterns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.include.extend(patterns.into_iter().map(Into::into));
        self
    }

    /// Add exclude patterns (e.g., `["**/node_modules/**"]`)
    pub fn exclude(mut self, patterns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.exclude.extend(patterns.into_iter().map(Into::into));
        self
    }
}

#[cfg(feature = "walk")]
impl Sources for WalkSources {
    fn extract(self) -> Result<ExtractionResult> {
        use ignore::WalkBuilder;
        use std::sync::{Mutex, PoisonError};

        let filter = GlobFilter::new(&self.include, &self.exclude)?;
        let root = self
            .root
            .canonicalize()
            .wrap_err_with(|| format!("Workspace root {} is not accessible", self.root.display()))?;

        let result = Mutex::new(ExtractionResult::default());

        let walker = WalkBuilder::new(&root)
            .follow_links(true)
            .hidden(false) // Don't skip hidden files (but .git is in .gitignore)
            .git_ignore(true)
            .git_global(true)
            .git_exclude(true)
            .build_parallel();

        walker.run(|| {
            let result = &result;
            let filter = &filter;
            let root = &root;

            Box::new(move |entry| {
                let entry = match entry {
                    Ok(e) => e,
                    Err(e) => {
                        result
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .warnings
                            .push(format!("Failed to walk workspace: {e}"));
                        return ignore::WalkState::Continue;
                    }
                };

                if !entry.file_type().is_some_and(|t| t.is_file()) {
                    return ignore::WalkState::Continue;
                }

                let path = entry.path();
                if !filter.matches_in(root, path) {
                    return ignore::WalkState::Continue;
                }

                let mut file_result = ExtractionResult::default();
                file_result.read(path);
                result
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .extend(file_result);

                ignore::WalkState::Continue
            })
        });

        Ok(result.into_inner().unwrap_or_else(PoisonError::into_inner))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::ClassSignature;

    #[test]
    fn test_memory_sources() {
        let result = MemorySources::new()
            .add("a.html", r#"<p class="x y">"#)
            .add("b.vue", r#"<p class="y x">"#)
            .extract()
            .unwrap();

        assert_eq!(result.documents.len(), 2);
        assert!(result.warnings.is_empty());
        let sig = ClassSignature::from_value("x y");
        assert!(result.documents.iter().all(|d| d.count(&sig) == 1));
    }

    #[test]
    fn test_path_sources_missing_file_is_a_warning() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.html");
        std::fs::write(&good, r#"<p class="g">"#).unwrap();
        let missing = dir.path().join("missing.html");

        let result = PathSources::new([good, missing]).extract().unwrap();

        assert_eq!(result.documents.len(), 1);
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].contains("missing.html"));
    }

    #[cfg(feature = "walk")]
    mod glob_tests {
        use super::super::*;
        use std::path::Path;

        #[test]
        fn test_default_markup_filter() {
            let filter = GlobFilter::markup().unwrap();
            assert!(filter.matches(Path::new("index.html")));
            assert!(filter.matches(Path::new("src/views/page.blade.php")));
            assert!(filter.matches(Path::new("components/App.vue")));
            assert!(!filter.matches(Path::new("src/main.rs")));
            assert!(!filter.matches(Path::new("node_modules/pkg/readme.md")));
            assert!(!filter.matches(Path::new("web/node_modules/pkg/index.html")));
        }

        #[test]
        fn test_empty_include_matches_everything() {
            let filter = GlobFilter::new(Vec::<String>::new(), ["dist/**"]).unwrap();
            assert!(filter.matches(Path::new("anything.txt")));
            assert!(!filter.matches(Path::new("dist/index.html")));
        }

        #[test]
        fn test_invalid_pattern_is_an_error() {
            assert!(GlobFilter::new(["src/[unclosed"], Vec::<String>::new()).is_err());
        }

        #[test]
        fn test_matches_in_root() {
            let filter = GlobFilter::new(["**/*.html"], Vec::<String>::new()).unwrap();
            let root = Path::new("/work/site");
            assert!(filter.matches_in(root, Path::new("/work/site/a/b.html")));
            assert!(!filter.matches_in(root, Path::new("/elsewhere/b.html")));
        }

        fn git_project() -> tempfile::TempDir {
            let dir = tempfile::tempdir().unwrap();
            std::fs::create_dir_all(dir.path().join(".git")).unwrap();
            std::fs::create_dir_all(dir.path().join("web/dist")).unwrap();
            std::fs::write(dir.path().join(".gitignore"), "dist/\n*.tmp.html\n").unwrap();
            dir
        }

        #[test]
        fn test_ignore_rules_follow_gitignore() {
            let dir = git_project();
            let root = dir.path().canonicalize().unwrap();
            let rules = IgnoreRules::new(&root);

            assert!(rules.is_ignored(&root.join("web/dist/out.html")));
            assert!(rules.is_ignored(&root.join("web/draft.tmp.html")));
            assert!(!rules.is_ignored(&root.join("web/index.html")));
            assert!(!rules.is_ignored(Path::new("/elsewhere/dist/out.html")));
        }

        #[test]
        fn test_nested_gitignore_can_reinclude() {
            let dir = git_project();
            let root = dir.path().canonicalize().unwrap();
            std::fs::write(root.join("web/.gitignore"), "!keep.tmp.html\n").unwrap();
            let rules = IgnoreRules::new(&root);

            assert!(!rules.is_ignored(&root.join("web/keep.tmp.html")));
            assert!(rules.is_ignored(&root.join("other.tmp.html")));
        }

        #[test]
        fn test_gitignore_needs_a_repository() {
            let dir = tempfile::tempdir().unwrap();
            let root = dir.path().canonicalize().unwrap();
            std::fs::write(root.join(".gitignore"), "dist/\n").unwrap();
            std::fs::write(root.join(".ignore"), "vendor/\n").unwrap();
            let rules = IgnoreRules::new(&root);

            assert!(!rules.is_ignored(&root.join("dist/out.html")));
            assert!(rules.is_ignored(&root.join("vendor/lib.html")));
        }
    }
}
