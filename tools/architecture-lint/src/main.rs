//! Command-line entry point for the architecture lint.
//!
//! Usage: `architecture-lint [BACKEND_DIR]`. Without an argument the
//! `backend/` directory of the enclosing workspace is linted.

use std::env;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

fn main() -> ExitCode {
    let mut stderr = io::stderr().lock();
    let Some(backend_dir) = env::args_os().nth(1).map(PathBuf::from).or_else(default_backend_dir)
    else {
        let _ = writeln!(stderr, "no workspace Cargo.toml found; pass the backend directory");
        return ExitCode::from(2);
    };

    match architecture_lint::lint_backend_sources(&backend_dir) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let _ = write!(stderr, "{err}");
            ExitCode::FAILURE
        }
    }
}

fn default_backend_dir() -> Option<PathBuf> {
    let starts = [
        env::current_dir().ok(),
        Some(PathBuf::from(env!("CARGO_MANIFEST_DIR"))),
    ];
    starts
        .iter()
        .flatten()
        .find_map(|start| start.ancestors().find(|dir| is_workspace_root(dir)))
        .map(|root| root.join("backend"))
}

fn is_workspace_root(dir: &Path) -> bool {
    fs::read_to_string(dir.join("Cargo.toml"))
        .is_ok_and(|manifest| manifest.lines().any(|line| line.trim() == "[workspace]"))
}
