//! Common test utilities.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use refactor_css::{Config, Engine};
use refactor_css_core::{ClassSignature, DocumentId};

/// Get the path to the test fixtures directory.
pub fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
}

/// Create a temporary workspace holding a copy of the fixtures.
pub fn create_temp_project() -> tempfile::TempDir {
    let temp = tempfile::tempdir().expect("Failed to create temp dir");
    let fixtures = fixtures_dir();

    for relative in ["pages/index.html", "components/Card.vue"] {
        let target = temp.path().join(relative);
        std::fs::create_dir_all(target.parent().unwrap()).expect("Failed to create dir");
        std::fs::copy(fixtures.join(relative), &target)
            .unwrap_or_else(|e| panic!("Failed to copy {relative}: {e}"));
    }

    temp
}

/// Write `content` to `relative` under `root`, creating directories.
pub fn write_file(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    std::fs::create_dir_all(path.parent().unwrap()).expect("Failed to create dir");
    std::fs::write(path, content).expect("Failed to write file");
}

/// Identity of a workspace file, as discovery reports it.
pub fn doc_id(root: &Path, relative: &str) -> DocumentId {
    DocumentId::from_path(root.canonicalize().unwrap().join(relative)).unwrap()
}

/// Engine over `root` with default settings, already indexed.
pub async fn indexed_engine(root: &Path) -> Engine {
    indexed_engine_with(root, Config::default()).await
}

pub async fn indexed_engine_with(root: &Path, config: Config) -> Engine {
    let engine = Engine::new(Some(root.to_path_buf()), config).expect("valid config");
    engine.index_workspace().await.expect("discovery succeeds");
    engine
}

pub fn buttons() -> ClassSignature {
    ClassSignature::from_value("btn btn-primary rounded")
}

pub fn card() -> ClassSignature {
    ClassSignature::from_value("card shadow p-4")
}
