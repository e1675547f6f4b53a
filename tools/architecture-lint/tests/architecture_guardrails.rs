//! Behaviour tests running the lint over a source tree on disk.

use std::fs;
use std::path::{Path, PathBuf};

use architecture_lint::{ArchitectureLintError, Violation};
use rstest::{fixture, rstest};
use tempfile::TempDir;

struct SourceTree {
    _dir: TempDir,
    backend: PathBuf,
}

impl SourceTree {
    fn with(self, file: &str, contents: &str) -> Self {
        let path = self.backend.join("src").join(file);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent directories");
        }
        fs::write(&path, contents).expect("write source file");
        self
    }

    fn lint(&self) -> Result<(), ArchitectureLintError> {
        architecture_lint::lint_backend_sources(&self.backend)
    }
}

#[fixture]
fn tree() -> SourceTree {
    let dir = TempDir::new().expect("tempdir");
    let backend = dir.path().join("backend");
    SourceTree { _dir: dir, backend }
}

fn valid_modules(tree: SourceTree) -> SourceTree {
    tree.with(
        "domain/binding.rs",
        "pub struct SpoolId(i64); impl SpoolId { pub fn new(v: i64) -> Self { Self(v) } }",
    )
    .with(
        "inbound/http/bindings.rs",
        "use crate::domain::binding::SpoolId; fn handler() { let _id = SpoolId::new(4); }",
    )
    .with(
        "outbound/persistence/diesel_binding_store.rs",
        "use diesel::prelude::*; use crate::domain::binding::SpoolId; pub struct Store; impl Store { pub fn save(&self, _id: SpoolId) {} }",
    )
    .with("main.rs", "use spoolkeeper::outbound::persistence; fn main() {}")
}

fn violations(outcome: Result<(), ArchitectureLintError>) -> Vec<Violation> {
    match outcome {
        Ok(()) => panic!("expected violations"),
        Err(ArchitectureLintError::Violations(violations)) => violations,
        Err(other) => panic!("expected violations error, got: {other:?}"),
    }
}

fn has_violation(violations: &[Violation], file: &str, needle: &str) -> bool {
    violations
        .iter()
        .any(|violation| violation.file == Path::new(file) && violation.message.contains(needle))
}

#[rstest]
fn layered_sources_pass(tree: SourceTree) {
    let tree = valid_modules(tree);
    assert!(tree.lint().is_ok());
}

#[rstest]
fn every_violation_is_reported(tree: SourceTree) {
    let tree = valid_modules(tree)
        .with(
            "inbound/http/bad_cross_boundary.rs",
            "use spoolkeeper::outbound::spoolman::SpoolmanInventory; fn handler() { let _ = SpoolmanInventory::new; }",
        )
        .with(
            "domain/bad.rs",
            "use actix_web::HttpResponse; fn handler() { let _ = HttpResponse::Ok(); }",
        )
        .with(
            "outbound/moonraker/bad.rs",
            "use crate::inbound::ws; fn thing() { let _ = 1; }",
        );

    let found = violations(tree.lint());

    assert_eq!(found.len(), 3, "{found:?}");
    assert!(has_violation(
        &found,
        "inbound/http/bad_cross_boundary.rs",
        "crate::outbound"
    ));
    assert!(has_violation(&found, "domain/bad.rs", "external crate `actix_web`"));
    assert!(has_violation(&found, "outbound/moonraker/bad.rs", "crate::inbound"));
}

#[rstest]
fn unparsable_sources_fail_the_lint(tree: SourceTree) {
    let tree = tree.with("domain/broken.rs", "fn (");
    assert!(matches!(
        tree.lint(),
        Err(ArchitectureLintError::Parse { .. })
    ));
}

#[rstest]
fn workspace_backend_respects_its_boundaries() {
    let backend = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../backend");
    if let Err(err) = architecture_lint::lint_backend_sources(&backend) {
        panic!("{err}");
    }
}
