//! Repo-local architectural lint for the spoolkeeper backend.
//!
//! Print monitoring, binding and reconciliation rules live in `domain`,
//! behind ports implemented by inbound (HTTP, WebSocket) and outbound
//! (PostgreSQL, Moonraker, Spoolman, Prometheus) adapters. Every file under
//! `backend/src/{domain,inbound,outbound}` is assigned a [`Boundary`] from
//! its path and checked against that boundary's rules:
//!
//! - `domain` imports no adapter module and none of the web, database,
//!   HTTP client or metrics crates.
//! - inbound adapters never reach into `outbound`, and the HTTP adapter does
//!   not depend on the WebSocket adapter.
//! - each outbound adapter stays inside its own module: it may use the shared
//!   `outbound::http_support` helpers but not a sibling adapter, and only the
//!   persistence adapter may use Diesel.
//!
//! Run it with `cargo run -p architecture-lint` from anywhere in the
//! workspace, or pass the `backend/` directory explicitly.

use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use syn::visit::Visit;

/// Library name of the linted crate, as used in absolute paths.
const CRATE_NAME: &str = "spoolkeeper";

/// Outbound modules every adapter may share.
const SHARED_OUTBOUND: &[&str] = &["http_support"];

const WEB_CRATES: &[&str] = &[
    "actix",
    "actix_service",
    "actix_web",
    "actix_web_prom",
    "actix_ws",
    "awc",
    "utoipa",
];
const DIESEL_CRATES: &[&str] = &["diesel", "diesel_async", "diesel_migrations"];
const CLIENT_CRATES: &[&str] = &["reqwest"];
const METRICS_CRATES: &[&str] = &["prometheus"];

/// A single boundary violation discovered by the linter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// File path relative to `backend/src`.
    pub file: PathBuf,
    /// Human-readable description of the violated rule.
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.file.display(), self.message)
    }
}

/// Failure modes returned by the architecture lint.
#[derive(Debug)]
pub enum ArchitectureLintError {
    /// Filesystem traversal or reading failed.
    Io(io::Error),
    /// A file could not be parsed or placed in a boundary.
    Parse { file: PathBuf, message: String },
    /// One or more boundary violations were found.
    Violations(Vec<Violation>),
}

impl fmt::Display for ArchitectureLintError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "architecture lint could not read sources: {err}"),
            Self::Parse { file, message } => {
                write!(f, "architecture lint rejected {}: {message}", file.display())
            }
            Self::Violations(violations) => {
                writeln!(f, "{} architecture violation(s):", violations.len())?;
                for violation in violations {
                    writeln!(f, "  {violation}")?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ArchitectureLintError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Parse { .. } | Self::Violations(_) => None,
        }
    }
}

impl From<io::Error> for ArchitectureLintError {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

/// A Rust source file to be linted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LintSource {
    /// Path relative to `backend/src`.
    pub file: PathBuf,
    /// File contents.
    pub contents: String,
}

/// Architectural boundary a source file belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Boundary {
    /// Domain types, services and ports.
    Domain,
    /// REST adapter under `inbound/http`.
    Http,
    /// Status stream adapter under `inbound/ws`.
    WebSocket,
    /// Inbound module root files.
    InboundRoot,
    /// One outbound adapter, named by its module.
    Adapter(String),
    /// Outbound root files and shared helpers.
    OutboundShared,
}

impl Boundary {
    /// Place a path relative to `backend/src` into its boundary.
    pub fn from_path(relative_path: &Path) -> Option<Self> {
        let mut parts = relative_path
            .components()
            .map(|component| component.as_os_str().to_string_lossy().into_owned());
        let layer = parts.next()?;
        let module = parts
            .next()
            .map(|part| part.trim_end_matches(".rs").to_owned());
        match (layer.as_str(), module.as_deref()) {
            ("domain", _) => Some(Self::Domain),
            ("inbound", Some("http")) => Some(Self::Http),
            ("inbound", Some("ws")) => Some(Self::WebSocket),
            ("inbound", _) => Some(Self::InboundRoot),
            ("outbound", None | Some("mod")) => Some(Self::OutboundShared),
            ("outbound", Some(name)) if SHARED_OUTBOUND.contains(&name) => {
                Some(Self::OutboundShared)
            }
            ("outbound", Some(name)) => Some(Self::Adapter(name.to_owned())),
            _ => None,
        }
    }

    fn label(&self) -> String {
        match self {
            Self::Domain => "domain".to_owned(),
            Self::Http => "inbound http".to_owned(),
            Self::WebSocket => "inbound ws".to_owned(),
            Self::InboundRoot => "inbound".to_owned(),
            Self::Adapter(name) => format!("outbound {name}"),
            Self::OutboundShared => "outbound".to_owned(),
        }
    }

    fn allows_module(&self, module: &[&str]) -> bool {
        match (self, module) {
            (Self::Domain, ["inbound" | "outbound", ..]) => false,
            (Self::Http | Self::WebSocket | Self::InboundRoot, ["outbound", ..]) => false,
            (Self::Http, ["inbound", "ws", ..]) => false,
            (Self::Adapter(_) | Self::OutboundShared, ["inbound", ..]) => false,
            (Self::Adapter(own), ["outbound", other, ..]) => {
                *other == own.as_str() || SHARED_OUTBOUND.contains(other)
            }
            _ => true,
        }
    }

    fn forbidden_crates(&self) -> BTreeSet<&'static str> {
        let groups = match self {
            Self::Domain => vec![WEB_CRATES, DIESEL_CRATES, CLIENT_CRATES, METRICS_CRATES],
            Self::Http | Self::WebSocket | Self::InboundRoot => {
                vec![DIESEL_CRATES, CLIENT_CRATES, METRICS_CRATES]
            }
            Self::Adapter(name) if name == "persistence" => vec![WEB_CRATES, CLIENT_CRATES],
            Self::Adapter(_) | Self::OutboundShared => vec![WEB_CRATES, DIESEL_CRATES],
        };
        groups.into_iter().flatten().copied().collect()
    }
}

/// Lint the backend crate sources on disk.
///
/// `backend_dir` must be the `backend/` directory at the repository root.
pub fn lint_backend_sources(backend_dir: &Path) -> Result<(), ArchitectureLintError> {
    let src_dir = backend_dir.join("src");
    let mut sources = Vec::new();
    for layer in ["domain", "inbound", "outbound"] {
        let dir = src_dir.join(layer);
        if dir.is_dir() {
            collect_sources(&src_dir, &dir, &mut sources)?;
        }
    }
    lint_sources(&sources)
}

/// Lint the provided Rust sources.
pub fn lint_sources(sources: &[LintSource]) -> Result<(), ArchitectureLintError> {
    let mut violations = Vec::new();
    for source in sources {
        let boundary =
            Boundary::from_path(&source.file).ok_or_else(|| ArchitectureLintError::Parse {
                file: source.file.clone(),
                message: "file is outside the domain, inbound and outbound layers".to_owned(),
            })?;
        let parsed =
            syn::parse_file(&source.contents).map_err(|err| ArchitectureLintError::Parse {
                file: source.file.clone(),
                message: err.to_string(),
            })?;
        violations.extend(check_file(&source.file, &boundary, &parsed));
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(ArchitectureLintError::Violations(violations))
    }
}

fn check_file(file: &Path, boundary: &Boundary, parsed: &syn::File) -> Vec<Violation> {
    let mut collector = PathCollector::default();
    collector.visit_file(parsed);

    let label = boundary.label();
    let forbidden_crates = boundary.forbidden_crates();
    let mut messages = BTreeSet::new();
    for segments in &collector.paths {
        let segments: Vec<&str> = segments.iter().map(String::as_str).collect();
        match classify(&segments) {
            Some(Target::Module(module)) if !boundary.allows_module(&module) => {
                let shown = module.iter().take(2).copied().collect::<Vec<_>>().join("::");
                messages.insert(format!("{label} module must not depend on crate::{shown}"));
            }
            Some(Target::Crate(name)) if forbidden_crates.contains(name) => {
                messages.insert(format!(
                    "{label} module must not depend on external crate `{name}`"
                ));
            }
            _ => {}
        }
    }

    messages
        .into_iter()
        .map(|message| Violation {
            file: file.to_path_buf(),
            message,
        })
        .collect()
}

enum Target<'a> {
    /// Path inside the linted crate, from its root.
    Module(Vec<&'a str>),
    /// Root of an external crate path.
    Crate(&'a str),
}

/// Resolve a path's first segments to a crate-internal module or an external
/// crate. Relative `super` paths that stay inside a module are ignored.
fn classify<'a>(segments: &[&'a str]) -> Option<Target<'a>> {
    let (first, rest) = segments.split_first()?;
    match *first {
        "crate" => Some(Target::Module(rest.to_vec())),
        name if name == CRATE_NAME => Some(Target::Module(rest.to_vec())),
        "self" | "super" => None,
        "domain" | "inbound" | "outbound" => Some(Target::Module(segments.to_vec())),
        name => Some(Target::Crate(name)),
    }
}

#[derive(Default)]
struct PathCollector {
    paths: BTreeSet<Vec<String>>,
}

impl PathCollector {
    fn push_tree(&mut self, tree: &syn::UseTree, prefix: &[String]) {
        let extend = |ident: String| {
            let mut next = prefix.to_vec();
            next.push(ident);
            next
        };
        match tree {
            syn::UseTree::Path(path) => self.push_tree(&path.tree, &extend(path.ident.to_string())),
            syn::UseTree::Name(name) => {
                self.paths.insert(extend(name.ident.to_string()));
            }
            syn::UseTree::Rename(rename) => {
                self.paths.insert(extend(rename.ident.to_string()));
            }
            syn::UseTree::Glob(_) => {
                self.paths.insert(extend("*".to_owned()));
            }
            syn::UseTree::Group(group) => {
                for item in &group.items {
                    self.push_tree(item, prefix);
                }
            }
        }
    }
}

impl<'ast> Visit<'ast> for PathCollector {
    fn visit_path(&mut self, node: &'ast syn::Path) {
        let segments: Vec<String> = node
            .segments
            .iter()
            .map(|segment| segment.ident.to_string())
            .collect();
        if !segments.is_empty() {
            self.paths.insert(segments);
        }
        syn::visit::visit_path(self, node);
    }

    fn visit_item_use(&mut self, node: &'ast syn::ItemUse) {
        self.push_tree(&node.tree, &[]);
    }
}

fn collect_sources(
    src_root: &Path,
    dir: &Path,
    sources: &mut Vec<LintSource>,
) -> Result<(), ArchitectureLintError> {
    let mut entries = fs::read_dir(dir)?
        .map(|entry| entry.map(|entry| entry.path()))
        .collect::<Result<Vec<_>, _>>()?;
    entries.sort();

    for path in entries {
        if path.is_dir() {
            collect_sources(src_root, &path, sources)?;
        } else if path.extension().is_some_and(|ext| ext == "rs") {
            let file = path
                .strip_prefix(src_root)
                .map_err(|err| ArchitectureLintError::Parse {
                    file: path.clone(),
                    message: err.to_string(),
                })?
                .to_path_buf();
            let contents = fs::read_to_string(&path)?;
            sources.push(LintSource { file, contents });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests;
