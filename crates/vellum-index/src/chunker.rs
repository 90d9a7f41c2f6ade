//! Heuristic line-scan chunking with prose and fixed-window fallbacks.
//!
//! Code files are split by a fixed, ordered set of line patterns. This is a
//! heuristic layer, not a parser: constructs may be misclassified, and any
//! content no pattern recognizes degrades to plain `text` chunks.

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::languages::ChunkStrategy;

/// Coarse construct tag attached to every chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkKind {
    Function,
    Class,
    Interface,
    Type,
    Import,
    Export,
    Comment,
    Text,
}

impl ChunkKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Class => "class",
            Self::Interface => "interface",
            Self::Type => "type",
            Self::Import => "import",
            Self::Export => "export",
            Self::Comment => "comment",
            Self::Text => "text",
        }
    }
}

impl fmt::Display for ChunkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChunkKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "function" => Ok(Self::Function),
            "class" => Ok(Self::Class),
            "interface" => Ok(Self::Interface),
            "type" => Ok(Self::Type),
            "import" => Ok(Self::Import),
            "export" => Ok(Self::Export),
            "comment" => Ok(Self::Comment),
            "text" => Ok(Self::Text),
            other => Err(format!("unknown chunk kind: {other}")),
        }
    }
}

/// Position and classification of a chunk inside its file. Lines are 1-based, inclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub line_start: usize,
    pub line_end: usize,
    pub kind: ChunkKind,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub text: String,
    pub metadata: ChunkMetadata,
}

/// Chunker configuration.
#[derive(Debug, Clone)]
pub struct ChunkerConfig {
    /// Prose: a blank line flushes once the buffer exceeds this many chars (default: 500).
    pub target_size: usize,
    /// Prose buffers flush at this many chars; longer code chunks are cut on
    /// line boundaries (default: 2000).
    pub max_size: usize,
    /// Fallback window height in lines (default: 50).
    pub window_lines: usize,
    /// Chunks whose trimmed text is shorter than this are dropped (default: 20).
    pub min_chars: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            target_size: 500,
            max_size: 2000,
            window_lines: 50,
            min_chars: 20,
        }
    }
}

/// Split a file into chunks using the strategy its extension selects.
///
/// Never fails; empty or whitespace-only input yields no chunks.
#[must_use]
pub fn chunk_file(path: &Path, text: &str, config: &ChunkerConfig) -> Vec<Chunk> {
    if text.trim().is_empty() {
        return Vec::new();
    }
    match ChunkStrategy::for_path(path) {
        ChunkStrategy::Code => chunk_code(text, config),
        ChunkStrategy::Prose => chunk_prose(text, config),
        ChunkStrategy::Fallback => chunk_windows(text, config),
    }
}

const IDENT: &str = r"[A-Za-z_$][\w$]*";

static PATTERNS: LazyLock<Vec<(ChunkKind, Regex)>> = LazyLock::new(|| {
    let raw: Vec<(ChunkKind, String)> = vec![
        (
            ChunkKind::Function,
            format!(
                r"^(?:export\s+)?(?:default\s+)?(?:async\s+)?function\s*\*?\s*(?P<name>{IDENT})?\s*[<(]"
            ),
        ),
        (
            ChunkKind::Function,
            format!(
                r"^(?:export\s+)?(?:const|let|var)\s+(?P<name>{IDENT})\s*(?::[^=]+)?=\s*(?:async\s+)?(?:\([^)]*\)|{IDENT})\s*(?::\s*[^=]+)?=>"
            ),
        ),
        (
            ChunkKind::Function,
            r"^(?:pub(?:\([^)]*\))?\s+)?(?:const\s+)?(?:async\s+)?(?:unsafe\s+)?(?:extern\s+\S+\s+)?fn\s+(?P<name>\w+)".into(),
        ),
        (ChunkKind::Function, r"^(?:async\s+)?def\s+(?P<name>\w+)\s*\(".into()),
        (ChunkKind::Function, r"^func\s+(?:\([^)]*\)\s*)?(?P<name>\w+)\s*[\[(]".into()),
        (
            ChunkKind::Class,
            r"^(?:export\s+)?(?:default\s+)?(?:abstract\s+)?(?:public\s+|private\s+|internal\s+)?(?:final\s+|data\s+|sealed\s+)?class\s+(?P<name>\w+)".into(),
        ),
        (
            ChunkKind::Class,
            r"^(?:pub(?:\([^)]*\))?\s+)?(?:struct|enum|trait|union)\s+(?P<name>\w+)".into(),
        ),
        (ChunkKind::Class, r"^impl(?:<[^>]*>)?\s+(?P<name>[\w:]+)".into()),
        (
            ChunkKind::Interface,
            r"^(?:export\s+)?(?:default\s+)?(?:declare\s+)?interface\s+(?P<name>\w+)".into(),
        ),
        (
            ChunkKind::Type,
            r"^(?:export\s+)?(?:declare\s+)?type\s+(?P<name>\w+)(?:<[^>]*>)?\s*=".into(),
        ),
        (
            ChunkKind::Type,
            r"^(?:pub(?:\([^)]*\))?\s+)?type\s+(?P<name>\w+)".into(),
        ),
        (ChunkKind::Import, r"^import\b".into()),
        (ChunkKind::Import, r"^from\s+\S+\s+import\b".into()),
        (ChunkKind::Import, r"^(?:pub(?:\([^)]*\))?\s+)?use\s+[\w:{]".into()),
        (ChunkKind::Import, r"^#\s*include\b".into()),
        (
            ChunkKind::Import,
            r"^(?:const|let|var)\s+.*=\s*require\(".into(),
        ),
        (
            ChunkKind::Export,
            format!(
                r"^export\s+(?:default\s+)?(?:\{{|\*|(?:const|let|var)\s+(?P<name>{IDENT})|{IDENT})"
            ),
        ),
        (ChunkKind::Export, r"^module\.exports\b".into()),
        (ChunkKind::Comment, r"^(?:/\*|//|<!--|#(?:\s|$))".into()),
    ];
    raw.into_iter()
        .filter_map(|(kind, pattern)| match Regex::new(&pattern) {
            Ok(re) => Some((kind, re)),
            Err(e) => {
                tracing::error!(kind = %kind, "invalid chunk pattern: {e}");
                None
            }
        })
        .collect()
});

static DECORATION: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^(?:#!?\[|@\w)").ok());

static HEADING: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^#{1,6}\s+(?P<title>.+?)\s*#*\s*$").ok());

/// First pattern matching a trimmed line, with the captured name if any.
fn classify(trimmed: &str) -> Option<(ChunkKind, Option<String>)> {
    PATTERNS.iter().find_map(|(kind, re)| {
        re.captures(trimmed).map(|caps| {
            let name = caps.name("name").map(|m| m.as_str().to_owned());
            (*kind, name)
        })
    })
}

fn is_decoration(trimmed: &str) -> bool {
    DECORATION.as_ref().is_some_and(|re| re.is_match(trimmed))
}

/// Net `{`/`}` balance of a line, ignoring double-quoted and template strings,
/// char literals, and trailing `//` comments.
fn brace_delta(line: &str) -> (i32, bool) {
    let mut delta = 0i32;
    let mut opened = false;
    let mut in_string: Option<char> = None;
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        if let Some(quote) = in_string {
            if c == '\\' {
                chars.next();
            } else if c == quote {
                in_string = None;
            }
            continue;
        }
        match c {
            '"' | '`' => in_string = Some(c),
            '\'' => {
                // char literal such as '{' or '\n'
                let rest: String = chars.clone().take(3).collect();
                if rest.len() >= 2 && rest.chars().nth(1) == Some('\'') {
                    chars.nth(1);
                } else if rest.starts_with('\\') && rest.chars().nth(2) == Some('\'') {
                    chars.nth(2);
                }
            }
            '/' if chars.peek() == Some(&'/') => break,
            '{' => {
                delta += 1;
                opened = true;
            }
            '}' => delta -= 1,
            _ => {}
        }
    }
    (delta, opened)
}

fn ends_with_continuation(trimmed: &str) -> bool {
    ["{", "(", "[", ",", "=", "=>", "&&", "||", "+", ".", ":", "\\"]
        .iter()
        .any(|suffix| trimmed.ends_with(suffix))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Group {
    /// Comments, attributes and decorators; attach to a following construct.
    Prefix,
    /// Consecutive import statements.
    Imports,
}

#[derive(Default)]
struct CodeBuffer<'a> {
    lines: Vec<(usize, &'a str)>,
    depth: i32,
    saw_open: bool,
    group: Option<Group>,
    construct: Option<ChunkKind>,
    construct_line: usize,
    construct_indent: usize,
    /// Construct whose body is delimited by indentation (`def f():`).
    indent_scope: bool,
}

impl<'a> CodeBuffer<'a> {
    fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    fn push(&mut self, line_no: usize, line: &'a str) {
        self.lines.push((line_no, line));
    }

    /// Non-blank line indented under an indentation-scoped construct.
    fn nests(&self, line: &str) -> bool {
        self.indent_scope && !line.trim().is_empty() && indent_of(line) > self.construct_indent
    }
}

fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start().len()
}

fn chunk_code(text: &str, config: &ChunkerConfig) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let mut buf = CodeBuffer::default();
    let mut in_block_comment = false;

    for (idx, line) in text.lines().enumerate() {
        let line_no = idx + 1;
        let trimmed = line.trim();

        let detected = if in_block_comment {
            if trimmed.contains("*/") || trimmed.contains("-->") {
                in_block_comment = false;
            }
            Some((ChunkKind::Comment, None))
        } else {
            let hit = classify(trimmed);
            if hit.as_ref().is_some_and(|(k, _)| *k == ChunkKind::Comment) {
                in_block_comment = (trimmed.starts_with("/*") && !trimmed.contains("*/"))
                    || (trimmed.starts_with("<!--") && !trimmed.contains("-->"));
            }
            hit
        };
        let is_prefix_line = matches!(detected, Some((ChunkKind::Comment, _)))
            || (detected.is_none() && is_decoration(trimmed));

        if buf.depth == 0 && !buf.nests(line) {
            match detected.as_ref().map(|(k, _)| *k) {
                _ if is_prefix_line => {
                    if buf.group != Some(Group::Prefix) {
                        flush_code(&mut buf, &mut chunks, config);
                        buf.group = Some(Group::Prefix);
                    }
                }
                Some(ChunkKind::Import) if buf.group == Some(Group::Imports) => {}
                Some(kind) => {
                    if buf.group != Some(Group::Prefix) {
                        flush_code(&mut buf, &mut chunks, config);
                    }
                    if kind == ChunkKind::Import {
                        buf.group = Some(Group::Imports);
                    } else {
                        buf.group = None;
                        buf.construct = Some(kind);
                        buf.construct_line = line_no;
                        buf.construct_indent = indent_of(line);
                        buf.indent_scope = false;
                        buf.saw_open = false;
                    }
                }
                None if trimmed.is_empty() => {
                    if buf.is_empty() {
                        continue;
                    }
                }
                None => {
                    if buf.group.is_some() || buf.indent_scope {
                        flush_code(&mut buf, &mut chunks, config);
                    }
                }
            }
        }

        buf.push(line_no, line);
        if matches!(detected, Some((ChunkKind::Comment, _))) {
            continue;
        }

        let (delta, opened) = brace_delta(trimmed);
        buf.depth = (buf.depth + delta).max(0);
        buf.saw_open |= opened;

        let Some(kind) = buf.construct else {
            continue;
        };
        if buf.indent_scope {
            continue;
        }
        if buf.depth == 0 && !buf.saw_open && trimmed.ends_with(':') {
            // body follows on deeper-indented lines; it ends at the next dedent
            buf.indent_scope = true;
            continue;
        }
        if buf.depth != 0 || trimmed.is_empty() || ends_with_continuation(trimmed) {
            continue;
        }
        let closes = if buf.saw_open {
            true
        } else {
            trimmed.ends_with(';')
                || (matches!(kind, ChunkKind::Export | ChunkKind::Type) && line_no == buf.construct_line)
                || (kind == ChunkKind::Function && trimmed.contains("=>"))
        };
        if closes {
            flush_code(&mut buf, &mut chunks, config);
        }
    }

    flush_code(&mut buf, &mut chunks, config);
    chunks
}

fn flush_code(buf: &mut CodeBuffer<'_>, chunks: &mut Vec<Chunk>, config: &ChunkerConfig) {
    let taken = std::mem::take(buf);
    let mut lines = taken.lines;
    while lines.last().is_some_and(|(_, l)| l.trim().is_empty()) {
        lines.pop();
    }
    let (Some(&(line_start, _)), Some(&(line_end, _))) = (lines.first(), lines.last()) else {
        return;
    };

    let (kind, name) = infer_kind(&lines);
    let text = lines.iter().map(|(_, l)| *l).collect::<Vec<_>>().join("\n");
    if text.chars().count() <= config.max_size {
        push_chunk(
            chunks,
            text,
            ChunkMetadata {
                line_start,
                line_end,
                kind,
                name,
            },
            config,
        );
        return;
    }

    // Oversized: cut on line boundaries; later pieces are plain text.
    let mut first = Some((kind, name));
    let mut piece: Vec<(usize, &str)> = Vec::new();
    let mut size = 0;
    for &(line_no, line) in &lines {
        let len = line.chars().count() + 1;
        if !piece.is_empty() && size + len > config.max_size + 1 {
            push_piece(chunks, &mut piece, &mut first, config);
            size = 0;
        }
        piece.push((line_no, line));
        size += len;
    }
    push_piece(chunks, &mut piece, &mut first, config);
}

fn push_piece(
    chunks: &mut Vec<Chunk>,
    piece: &mut Vec<(usize, &str)>,
    first: &mut Option<(ChunkKind, Option<String>)>,
    config: &ChunkerConfig,
) {
    let (Some(&(line_start, _)), Some(&(line_end, _))) = (piece.first(), piece.last()) else {
        return;
    };
    let (kind, name) = first.take().unwrap_or((ChunkKind::Text, None));
    let text = piece.iter().map(|(_, l)| *l).collect::<Vec<_>>().join("\n");
    piece.clear();
    push_chunk(
        chunks,
        text,
        ChunkMetadata {
            line_start,
            line_end,
            kind,
            name,
        },
        config,
    );
}

/// Kind of the first construct line; comment only when every line is a comment.
fn infer_kind(lines: &[(usize, &str)]) -> (ChunkKind, Option<String>) {
    let mut all_comments = true;
    let mut in_block = false;
    for (_, line) in lines {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if in_block {
            in_block = !(trimmed.contains("*/") || trimmed.contains("-->"));
            continue;
        }
        match classify(trimmed) {
            Some((ChunkKind::Comment, _)) => {
                in_block = (trimmed.starts_with("/*") && !trimmed.contains("*/"))
                    || (trimmed.starts_with("<!--") && !trimmed.contains("-->"));
            }
            Some(hit) => return hit,
            None => all_comments = false,
        }
    }
    if all_comments {
        (ChunkKind::Comment, None)
    } else {
        (ChunkKind::Text, None)
    }
}

#[derive(Default)]
struct ProseBuffer<'a> {
    lines: Vec<(usize, &'a str)>,
    name: Option<String>,
    size: usize,
}

impl ProseBuffer<'_> {
    fn flush(&mut self, chunks: &mut Vec<Chunk>, config: &ChunkerConfig) {
        let mut taken = std::mem::take(self);
        while taken.lines.last().is_some_and(|(_, l)| l.trim().is_empty()) {
            taken.lines.pop();
        }
        let (Some(&(line_start, _)), Some(&(line_end, _))) =
            (taken.lines.first(), taken.lines.last())
        else {
            return;
        };
        let text = taken
            .lines
            .iter()
            .map(|(_, l)| *l)
            .collect::<Vec<_>>()
            .join("\n");
        push_chunk(
            chunks,
            text,
            ChunkMetadata {
                line_start,
                line_end,
                kind: ChunkKind::Text,
                name: taken.name,
            },
            config,
        );
    }
}

fn chunk_prose(text: &str, config: &ChunkerConfig) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let mut buf = ProseBuffer::default();

    for (idx, line) in text.lines().enumerate() {
        let heading = HEADING
            .as_ref()
            .and_then(|re| re.captures(line))
            .map(|caps| caps["title"].to_owned());

        if let Some(title) = heading {
            buf.flush(&mut chunks, config);
            buf.name = Some(title);
        } else if line.trim().is_empty() {
            if buf.size > config.target_size {
                buf.flush(&mut chunks, config);
                continue;
            }
            if buf.lines.is_empty() {
                continue;
            }
        }

        buf.lines.push((idx + 1, line));
        buf.size += line.chars().count() + 1;
        if buf.size >= config.max_size {
            buf.flush(&mut chunks, config);
        }
    }
    buf.flush(&mut chunks, config);
    chunks
}

fn chunk_windows(text: &str, config: &ChunkerConfig) -> Vec<Chunk> {
    let window = config.window_lines.max(1);
    let lines: Vec<&str> = text.lines().collect();
    let mut chunks = Vec::new();
    for (i, slice) in lines.chunks(window).enumerate() {
        let line_start = i * window + 1;
        push_chunk(
            &mut chunks,
            slice.join("\n"),
            ChunkMetadata {
                line_start,
                line_end: line_start + slice.len() - 1,
                kind: ChunkKind::Text,
                name: None,
            },
            config,
        );
    }
    chunks
}

fn push_chunk(chunks: &mut Vec<Chunk>, text: String, metadata: ChunkMetadata, config: &ChunkerConfig) {
    if text.trim().chars().count() < config.min_chars {
        tracing::trace!(
            line_start = metadata.line_start,
            "dropping chunk below minimum size"
        );
        return;
    }
    chunks.push(Chunk { text, metadata });
}
