//! Project file enumeration with include/exclude rules and size limits.

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use ignore::WalkBuilder;

use crate::error::{IndexError, Result};
use crate::languages::{default_include_extensions, extension_of};

const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

const DEFAULT_EXCLUDE_DIRS: &[&str] = &[
    "node_modules",
    ".git",
    "dist",
    "build",
    "target",
    "out",
    ".next",
    ".nuxt",
    "coverage",
    "__pycache__",
    ".venv",
    "venv",
    "vendor",
    ".idea",
    ".vscode",
    ".cache",
];

const DEFAULT_EXCLUDE_FILES: &[&str] = &[
    "*.min.js",
    "*.min.css",
    "*.map",
    "*.lock",
    "package-lock.json",
    "*.log",
];

/// Walker configuration.
#[derive(Debug, Clone)]
pub struct WalkOptions {
    /// Directory names skipped together with their whole subtree.
    pub exclude_dirs: Vec<String>,
    /// Glob patterns matched against file names.
    pub exclude_files: Vec<String>,
    /// Allowed extensions (lowercase, no dot). Files without an extension always pass.
    pub include_extensions: Vec<String>,
    /// Dot-names that are not treated as hidden.
    pub allow_hidden: Vec<String>,
    pub max_file_size: u64,
    pub respect_gitignore: bool,
}

impl Default for WalkOptions {
    fn default() -> Self {
        Self {
            exclude_dirs: DEFAULT_EXCLUDE_DIRS.iter().map(|s| (*s).to_owned()).collect(),
            exclude_files: DEFAULT_EXCLUDE_FILES
                .iter()
                .map(|s| (*s).to_owned())
                .collect(),
            include_extensions: default_include_extensions(),
            allow_hidden: vec![".env".to_owned()],
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            respect_gitignore: false,
        }
    }
}

/// One file found by a walk. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub abs_path: PathBuf,
    /// Path relative to the project root, `/`-separated.
    pub rel_path: String,
    pub size: u64,
    pub modified: DateTime<Utc>,
    /// Lowercase extension, empty when the file has none.
    pub extension: String,
}

impl FileRecord {
    /// Stat a single file under `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file metadata cannot be read.
    pub fn from_path(root: &Path, abs_path: &Path) -> std::io::Result<Self> {
        let meta = std::fs::metadata(abs_path)?;
        Ok(Self {
            abs_path: abs_path.to_path_buf(),
            rel_path: relative_path(root, abs_path),
            size: meta.len(),
            modified: meta
                .modified()
                .map_or(DateTime::<Utc>::UNIX_EPOCH, DateTime::<Utc>::from),
            extension: extension_of(abs_path),
        })
    }
}

/// Compiled form of [`WalkOptions`], shared by the walker and the file watcher.
#[derive(Debug)]
pub struct FileFilter {
    exclude_dirs: HashSet<String>,
    exclude_patterns: Vec<glob::Pattern>,
    include_extensions: HashSet<String>,
    allow_hidden: HashSet<String>,
    max_file_size: u64,
}

impl FileFilter {
    #[must_use]
    pub fn new(options: &WalkOptions) -> Self {
        let exclude_patterns = options
            .exclude_files
            .iter()
            .filter_map(|p| match glob::Pattern::new(p) {
                Ok(pattern) => Some(pattern),
                Err(e) => {
                    tracing::warn!(pattern = %p, "ignoring invalid exclude pattern: {e}");
                    None
                }
            })
            .collect();

        Self {
            exclude_dirs: options.exclude_dirs.iter().cloned().collect(),
            exclude_patterns,
            include_extensions: options
                .include_extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
            allow_hidden: options.allow_hidden.iter().cloned().collect(),
            max_file_size: options.max_file_size,
        }
    }

    fn is_hidden(&self, name: &str) -> bool {
        name.starts_with('.') && !self.allow_hidden.contains(name)
    }

    #[must_use]
    pub fn skips_dir(&self, name: &str) -> bool {
        self.exclude_dirs.contains(name) || self.is_hidden(name)
    }

    #[must_use]
    pub fn accepts_file_name(&self, name: &str) -> bool {
        if self.is_hidden(name) {
            return false;
        }
        if self.exclude_patterns.iter().any(|p| p.matches(name)) {
            return false;
        }
        let ext = extension_of(Path::new(name));
        ext.is_empty() || self.include_extensions.contains(&ext)
    }

    #[must_use]
    pub fn accepts_size(&self, size: u64) -> bool {
        size <= self.max_file_size
    }

    /// Whether `path` (under `root`) would be produced by a walk, ignoring size.
    #[must_use]
    pub fn accepts_path(&self, root: &Path, path: &Path) -> bool {
        let Ok(rel) = path.strip_prefix(root) else {
            return false;
        };
        let mut components: Vec<String> = rel
            .components()
            .filter_map(|c| match c {
                Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect();
        let Some(file_name) = components.pop() else {
            return false;
        };
        !components.iter().any(|dir| self.skips_dir(dir)) && self.accepts_file_name(&file_name)
    }
}

/// Enumerate project files under `root`.
///
/// Unreadable subdirectories are logged and omitted. Order is unspecified.
///
/// # Errors
///
/// Returns `IndexError::Walk` if `root` itself cannot be listed.
pub fn walk(root: &Path, options: &WalkOptions) -> Result<Vec<FileRecord>> {
    std::fs::read_dir(root)
        .map_err(|e| IndexError::Walk(format!("cannot list {}: {e}", root.display())))?;

    let filter = Arc::new(FileFilter::new(options));
    let dir_filter = Arc::clone(&filter);

    let mut builder = WalkBuilder::new(root);
    builder
        .standard_filters(false)
        .git_ignore(options.respect_gitignore)
        .git_exclude(options.respect_gitignore)
        .require_git(false)
        .follow_links(false)
        .filter_entry(move |entry| {
            if entry.depth() == 0 {
                return true;
            }
            let is_dir = entry.file_type().is_some_and(|ft| ft.is_dir());
            !is_dir || !dir_filter.skips_dir(&entry.file_name().to_string_lossy())
        });

    let mut files = Vec::new();
    for result in builder.build() {
        let entry = match result {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("skipping unreadable entry: {e}");
                continue;
            }
        };
        if !entry.file_type().is_some_and(|ft| ft.is_file()) {
            continue;
        }
        if !filter.accepts_file_name(&entry.file_name().to_string_lossy()) {
            continue;
        }

        let meta = match entry.metadata() {
            Ok(meta) => meta,
            Err(e) => {
                tracing::warn!(path = %entry.path().display(), "cannot stat file: {e}");
                continue;
            }
        };
        if !filter.accepts_size(meta.len()) {
            tracing::debug!(
                path = %entry.path().display(),
                size = meta.len(),
                max = filter.max_file_size,
                "skipping large file"
            );
            continue;
        }

        files.push(FileRecord {
            abs_path: entry.path().to_path_buf(),
            rel_path: relative_path(root, entry.path()),
            size: meta.len(),
            modified: meta
                .modified()
                .map_or(DateTime::<Utc>::UNIX_EPOCH, DateTime::<Utc>::from),
            extension: extension_of(entry.path()),
        });
    }

    tracing::debug!(root = %root.display(), count = files.len(), "walk finished");
    Ok(files)
}

/// [`walk`] sorted by relative path, for presentation.
///
/// # Errors
///
/// Same as [`walk`].
pub fn walk_sorted(root: &Path, options: &WalkOptions) -> Result<Vec<FileRecord>> {
    let mut files = walk(root, options)?;
    files.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
    Ok(files)
}

/// `path` relative to `root`, joined with `/` regardless of platform.
#[must_use]
pub fn relative_path(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn rel_paths(files: &[FileRecord]) -> Vec<&str> {
        files.iter().map(|f| f.rel_path.as_str()).collect()
    }

    #[test]
    fn walks_nested_files() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "src/main.ts", "console.log(1)");
        write(dir.path(), "src/lib/util.ts", "export {}");
        write(dir.path(), "README.md", "# hi");

        let files = walk_sorted(dir.path(), &WalkOptions::default()).unwrap();
        assert_eq!(
            rel_paths(&files),
            vec!["README.md", "src/lib/util.ts", "src/main.ts"]
        );
        let main = &files[2];
        assert_eq!(main.extension, "ts");
        assert_eq!(main.size, 14);
        assert!(main.abs_path.is_absolute() || main.abs_path.starts_with(dir.path()));
    }

    #[test]
    fn skips_excluded_and_hidden_dirs() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "node_modules/pkg/index.js", "x");
        write(dir.path(), ".git/config", "x");
        write(dir.path(), ".secret/notes.md", "x");
        write(dir.path(), "dist/bundle.js", "x");
        write(dir.path(), "src/app.js", "x");

        let files = walk_sorted(dir.path(), &WalkOptions::default()).unwrap();
        assert_eq!(rel_paths(&files), vec!["src/app.js"]);
    }

    #[test]
    fn allow_hidden_exception_is_configurable() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), ".env", "API_URL=http://localhost");
        write(dir.path(), ".eslintrc", "{}");

        let files = walk_sorted(dir.path(), &WalkOptions::default()).unwrap();
        assert_eq!(rel_paths(&files), vec![".env"]);

        let options = WalkOptions {
            allow_hidden: vec![],
            ..WalkOptions::default()
        };
        assert!(walk(dir.path(), &options).unwrap().is_empty());
    }

    #[test]
    fn skips_excluded_patterns_and_extensions() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "app.min.js", "x");
        write(dir.path(), "yarn.lock", "x");
        write(dir.path(), "logo.png", "x");
        write(dir.path(), "Makefile", "all:");
        write(dir.path(), "app.js", "x");

        let files = walk_sorted(dir.path(), &WalkOptions::default()).unwrap();
        assert_eq!(rel_paths(&files), vec!["Makefile", "app.js"]);
    }

    #[test]
    fn skips_files_over_size_limit() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "small.txt", "abc");
        write(dir.path(), "big.txt", &"x".repeat(2048));

        let options = WalkOptions {
            max_file_size: 1024,
            ..WalkOptions::default()
        };
        let files = walk(dir.path(), &options).unwrap();
        assert_eq!(rel_paths(&files), vec!["small.txt"]);
    }

    #[test]
    fn respects_gitignore_when_enabled() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), ".gitignore", "generated/\n");
        write(dir.path(), "generated/api.ts", "x");
        write(dir.path(), "src/api.ts", "x");

        let plain = walk_sorted(dir.path(), &WalkOptions::default()).unwrap();
        assert_eq!(rel_paths(&plain), vec!["generated/api.ts", "src/api.ts"]);

        let options = WalkOptions {
            respect_gitignore: true,
            ..WalkOptions::default()
        };
        let filtered = walk_sorted(dir.path(), &options).unwrap();
        assert_eq!(rel_paths(&filtered), vec!["src/api.ts"]);
    }

    #[test]
    fn missing_root_is_an_error() {
        let err = walk(Path::new("/nonexistent/vellum/root"), &WalkOptions::default());
        assert!(matches!(err, Err(IndexError::Walk(_))));
    }

    #[test]
    fn invalid_pattern_is_ignored() {
        let options = WalkOptions {
            exclude_files: vec!["[".into(), "*.log".into()],
            ..WalkOptions::default()
        };
        let filter = FileFilter::new(&options);
        assert!(!filter.accepts_file_name("debug.log"));
        assert!(filter.accepts_file_name("main.rs"));
    }

    #[test]
    fn accepts_path_checks_every_component() {
        let filter = FileFilter::new(&WalkOptions::default());
        let root = Path::new("/project");
        assert!(filter.accepts_path(root, Path::new("/project/src/a.ts")));
        assert!(!filter.accepts_path(root, Path::new("/project/node_modules/x/a.ts")));
        assert!(!filter.accepts_path(root, Path::new("/project/.vellum/embeddings.db")));
        assert!(!filter.accepts_path(root, Path::new("/elsewhere/a.ts")));
    }

    #[test]
    fn relative_path_uses_forward_slashes() {
        let root = Path::new("/project");
        assert_eq!(
            relative_path(root, &root.join("src").join("a.ts")),
            "src/a.ts"
        );
    }

    #[test]
    fn file_record_from_path() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "notes/today.md", "hello");
        let record =
            FileRecord::from_path(dir.path(), &dir.path().join("notes/today.md")).unwrap();
        assert_eq!(record.rel_path, "notes/today.md");
        assert_eq!(record.size, 5);
        assert_eq!(record.extension, "md");
    }
}
