//! Import specifier extraction and resolution.
//!
//! Resolution only consults a precomputed [`FileSet`]; it never touches the
//! disk, so every lookup after the initial walk is a hash probe.

use regex::Regex;
use rustc_hash::FxHashSet;
use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

/// Source extensions in resolution priority order.
pub const SOURCE_EXTENSIONS: &[&str] = &["ts", "tsx", "js", "jsx", "mjs", "cjs"];

/// Extensions a compiler emits; these may resolve back to a source form.
const EMITTED_EXTENSIONS: &[&str] = &["js", "jsx", "mjs", "cjs"];

static IMPORT_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        // import x from '...'; export { x } from '...'; import type { T } from '...'
        Regex::new(r#"(?m)\b(?:import|export)\s[^'";]*?\bfrom\s*['"]([^'"\n]+)['"]"#).unwrap(),
        // import '...'
        Regex::new(r#"(?m)\bimport\s*['"]([^'"\n]+)['"]"#).unwrap(),
        // require('...'), import('...')
        Regex::new(r#"\b(?:require|import)\s*\(\s*['"]([^'"\n]+)['"]\s*\)"#).unwrap(),
    ]
});

static BLOCK_COMMENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)/\*.*?\*/").unwrap());
static LINE_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?m)(^|[^:'"\\])//.*$"#).unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportKind {
    Relative,
    NonRelative,
}

impl ImportKind {
    pub fn of(specifier: &str) -> Self {
        if specifier == "."
            || specifier == ".."
            || specifier.starts_with("./")
            || specifier.starts_with("../")
        {
            Self::Relative
        } else {
            Self::NonRelative
        }
    }
}

fn strip_comments(source: &str) -> String {
    let without_blocks = BLOCK_COMMENT.replace_all(source, " ");
    LINE_COMMENT.replace_all(&without_blocks, "$1").into_owned()
}

/// Every import/require-like specifier in `source`, in position order,
/// deduplicated.
pub fn extract_imports(source: &str) -> Vec<String> {
    let cleaned = strip_comments(source);
    let mut found: Vec<(usize, String)> = Vec::new();
    for pattern in IMPORT_PATTERNS.iter() {
        for cap in pattern.captures_iter(&cleaned) {
            if let Some(m) = cap.get(1) {
                found.push((m.start(), m.as_str().trim().to_string()));
            }
        }
    }
    found.sort();

    let mut seen = FxHashSet::default();
    found
        .into_iter()
        .filter(|(_, spec)| !spec.is_empty() && seen.insert(spec.clone()))
        .map(|(_, spec)| spec)
        .collect()
}

/// Membership set of every scanned file (absolute, lexically normalized).
#[derive(Debug, Default, Clone)]
pub struct FileSet {
    files: FxHashSet<PathBuf>,
}

impl FileSet {
    pub fn new<I: IntoIterator<Item = PathBuf>>(files: I) -> Self {
        Self {
            files: files.into_iter().map(|p| normalize_path(&p)).collect(),
        }
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.files.contains(path)
    }
}

/// Lexical normalization: drops `.` and folds `..` without consulting the disk.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn with_suffix(base: &Path, suffix: &str) -> PathBuf {
    let mut s = base.as_os_str().to_os_string();
    s.push(suffix);
    PathBuf::from(s)
}

fn candidates(base: &Path, specifier: &str) -> Vec<PathBuf> {
    let last = specifier.rsplit('/').next().unwrap_or(specifier);
    let ext = Path::new(last)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|_| last != "." && last != "..");

    match ext {
        Some(ext) if EMITTED_EXTENSIONS.contains(&ext) => {
            let stem = base.with_extension("");
            SOURCE_EXTENSIONS
                .iter()
                .map(|e| stem.with_extension(e))
                .collect()
        }
        Some(ext) if SOURCE_EXTENSIONS.contains(&ext) => vec![base.to_path_buf()],
        // `./users.service` style names: the dot is part of the stem.
        Some(_) => {
            let mut out = vec![base.to_path_buf()];
            out.extend(extensionless_candidates(base));
            out
        }
        None => extensionless_candidates(base),
    }
}

fn extensionless_candidates(base: &Path) -> Vec<PathBuf> {
    let mut out: Vec<PathBuf> = SOURCE_EXTENSIONS
        .iter()
        .map(|e| with_suffix(base, &format!(".{e}")))
        .collect();
    out.extend(
        SOURCE_EXTENSIONS
            .iter()
            .map(|e| base.join(format!("index.{e}"))),
    );
    out
}

/// Resolve `specifier` as imported from `importer`. Returns the first
/// candidate present in `files`.
pub fn resolve_import(importer: &Path, specifier: &str, files: &FileSet) -> Option<PathBuf> {
    let dir = importer.parent().unwrap_or(Path::new(""));
    let base = normalize_path(&dir.join(specifier));
    candidates(&base, specifier)
        .into_iter()
        .map(|c| normalize_path(&c))
        .find(|c| files.contains(c))
}
