//! Extension routing: which chunking strategy applies to a file, and which
//! extensions the walker lets through by default.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Chunking strategy selected from a file's extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkStrategy {
    /// Line scan with construct patterns (functions, classes, ...).
    Code,
    /// Heading and paragraph boundaries.
    Prose,
    /// Fixed-size line windows.
    Fallback,
}

const CODE_EXTENSIONS: &[&str] = &[
    "js", "jsx", "ts", "tsx", "mjs", "cjs", "vue", "svelte", "py", "rb", "php", "java", "kt",
    "swift", "go", "rs", "c", "h", "cpp", "hpp", "cc", "cs", "scala", "dart", "lua", "sh",
];

const PROSE_EXTENSIONS: &[&str] = &["md", "markdown", "mdx", "txt", "rst", "adoc", "org"];

const CONFIG_EXTENSIONS: &[&str] = &[
    "json", "jsonc", "yaml", "yml", "toml", "ini", "cfg", "conf", "xml", "html", "htm", "css",
    "scss", "sass", "less", "sql", "graphql", "gql", "proto", "env", "csv", "bash", "zsh",
];

impl ChunkStrategy {
    #[must_use]
    pub fn for_extension(ext: &str) -> Self {
        let ext = ext.to_ascii_lowercase();
        if CODE_EXTENSIONS.contains(&ext.as_str()) {
            Self::Code
        } else if PROSE_EXTENSIONS.contains(&ext.as_str()) {
            Self::Prose
        } else {
            Self::Fallback
        }
    }

    #[must_use]
    pub fn for_path(path: &Path) -> Self {
        Self::for_extension(&extension_of(path))
    }

    #[must_use]
    pub fn id(self) -> &'static str {
        match self {
            Self::Code => "code",
            Self::Prose => "prose",
            Self::Fallback => "fallback",
        }
    }
}

/// Lowercase extension without the dot, or an empty string.
#[must_use]
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default()
}

/// Default walker allow-list: every code, prose, and config extension above.
#[must_use]
pub fn default_include_extensions() -> Vec<String> {
    CODE_EXTENSIONS
        .iter()
        .chain(PROSE_EXTENSIONS)
        .chain(CONFIG_EXTENSIONS)
        .map(|s| (*s).to_owned())
        .collect()
}
