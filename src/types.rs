use std::path::PathBuf;

use serde::Serialize;

use crate::error::ProcessError;

/// How a token is matched inside a line. Applies to every line of one search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchOptions {
    pub case_sensitive: bool,
    pub match_whole_word: bool,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            case_sensitive: true,
            match_whole_word: true,
        }
    }
}

/// Byte span of one token occurrence within a line. `end` is exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

/// One output line of the external search tool, split into its three fields.
/// Lives only long enough to produce zero or more `SearchMatch`es.
#[derive(Debug, PartialEq, Eq)]
pub struct RawLine<'a> {
    pub file_path: &'a str,
    /// 1-based, as printed by the tool.
    pub line_number: u32,
    /// Trimmed line content.
    pub content: &'a str,
}

/// A single classified occurrence of the token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchMatch {
    pub file_path: PathBuf,
    pub file_name: String,
    /// 0-based.
    pub line_number: u32,
    pub line_content: String,
    /// Byte offsets into `line_content`.
    pub match_start: usize,
    pub match_end: usize,
    pub is_write: bool,
}

/// Directories and file extensions the external tool must skip.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExcludeRules {
    pub dirs: Vec<String>,
    pub extensions: Vec<String>,
}

/// A root whose search failed. It contributed no matches.
#[derive(Debug, Serialize)]
pub struct RootFailure {
    pub root: PathBuf,
    #[serde(serialize_with = "display_string")]
    pub error: ProcessError,
}

/// Everything one search invocation produced.
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchReport {
    pub token: String,
    pub roots: Vec<PathBuf>,
    pub matches: Vec<SearchMatch>,
    pub failures: Vec<RootFailure>,
    /// Raw lines that could not be split into path/line/content.
    pub skipped_lines: usize,
}

impl SearchReport {
    #[must_use]
    pub fn writes(&self) -> usize {
        self.matches.iter().filter(|m| m.is_write).count()
    }

    #[must_use]
    pub fn reads(&self) -> usize {
        self.matches.len() - self.writes()
    }
}

fn display_string<T: std::fmt::Display, S: serde::Serializer>(
    value: &T,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}

/// UTF-8 safe string truncation. Never panics on multi-byte characters.
#[must_use]
pub fn truncate_str(s: &str, max: usize) -> &str {
    if s.len() <= max {
        s
    } else {
        &s[..s.floor_char_boundary(max)]
    }
}
