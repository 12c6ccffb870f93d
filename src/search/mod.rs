pub mod exclude;
pub mod locate;
pub mod parse;
pub mod ripgrep;

use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use crate::cancel::CancelToken;
use crate::classify::is_write_operation;
use crate::config::{Config, PatternConfig};
use crate::error::{DecodeError, ProcessError, RwgrepError};
use crate::types::{RawLine, RootFailure, SearchMatch, SearchReport};

use locate::MatchLocator;
use ripgrep::{LineSearcher, SearchRequest};

/// Runs one line-search per root, then parses, locates and classifies what comes back.
///
/// Holds a configuration snapshot for its whole life. To pick up a reload,
/// build a new pipeline from the new snapshot.
pub struct SearchPipeline<S> {
    searcher: S,
    config: Arc<Config>,
}

/// What one root contributed. Built independently per root, merged after the join.
struct RootOutcome {
    matches: Vec<SearchMatch>,
    skipped: usize,
    failure: Option<RootFailure>,
}

impl<S: LineSearcher> SearchPipeline<S> {
    pub fn new(searcher: S, config: Arc<Config>) -> Self {
        Self { searcher, config }
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Search every root concurrently, one thread per root, and concatenate
    /// the results in root order.
    ///
    /// A root whose search fails contributes nothing and is listed in
    /// `failures`; the other roots are unaffected. A blank token returns an
    /// empty report without starting any process.
    pub fn search(
        &self,
        token: &str,
        roots: &[PathBuf],
        cancel: &CancelToken,
    ) -> Result<SearchReport, RwgrepError> {
        let mut report = SearchReport {
            token: token.to_string(),
            roots: roots.to_vec(),
            ..SearchReport::default()
        };
        if token.trim().is_empty() {
            return Ok(report);
        }

        let options = self.config.match_options();
        let locator = MatchLocator::new(token, options)?;
        let globs = exclude::negated_globs(&self.config.exclude_rules());
        let patterns = &self.config.patterns.common;

        let timeout = self.config.timeout();
        let outcomes: Vec<RootOutcome> = thread::scope(|s| {
            let handles: Vec<_> = roots
                .iter()
                .map(|root| {
                    let globs = &globs;
                    let locator = &locator;
                    s.spawn(move || {
                        let req = SearchRequest {
                            token,
                            root,
                            options,
                            globs,
                            timeout,
                        };
                        self.search_root(&req, locator, patterns, cancel)
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap_or_else(|panic| std::panic::resume_unwind(panic)))
                .collect()
        });

        if cancel.is_cancelled() {
            return Err(RwgrepError::Cancelled);
        }

        for outcome in outcomes {
            report.matches.extend(outcome.matches);
            report.skipped_lines += outcome.skipped;
            report.failures.extend(outcome.failure);
        }

        tracing::info!(
            token,
            matches = report.matches.len(),
            writes = report.writes(),
            failed_roots = report.failures.len(),
            "search finished"
        );
        Ok(report)
    }

    fn search_root(
        &self,
        req: &SearchRequest<'_>,
        locator: &MatchLocator,
        patterns: &PatternConfig,
        cancel: &CancelToken,
    ) -> RootOutcome {
        tracing::debug!(root = %req.root.display(), "searching root");
        match self.searcher.search(req, cancel) {
            Ok(output) => {
                let (matches, skipped) = process_output(&output, locator, patterns);
                RootOutcome {
                    matches,
                    skipped,
                    failure: None,
                }
            }
            Err(error) => {
                if !matches!(error, ProcessError::Cancelled) {
                    tracing::warn!(root = %req.root.display(), error = %error, "root search failed");
                }
                RootOutcome {
                    matches: Vec::new(),
                    skipped: 0,
                    failure: Some(RootFailure {
                        root: req.root.to_path_buf(),
                        error,
                    }),
                }
            }
        }
    }
}

/// Turn raw tool output into classified matches. Malformed lines are counted
/// and skipped. Matches are ordered by file, then line, then position in the line.
pub(crate) fn process_output(
    output: &[u8],
    locator: &MatchLocator,
    patterns: &PatternConfig,
) -> (Vec<SearchMatch>, usize) {
    let mut matches = Vec::new();
    let mut skipped = 0;

    for raw in split_lines(output) {
        let line = decode_line(raw);
        if line.trim().is_empty() {
            continue;
        }
        match parse::parse_line(&line) {
            Ok(Some(parsed)) => classify_line(&parsed, locator, patterns, &mut matches),
            Ok(None) => {}
            Err(e) => {
                tracing::debug!(line = %line, error = %e, "skipping unparseable result line");
                skipped += 1;
            }
        }
    }

    // The tool searches files in parallel; its output order is not stable.
    // Stable sort keeps left-to-right span order within a line.
    matches.sort_by(|a, b| {
        a.file_path
            .cmp(&b.file_path)
            .then_with(|| a.line_number.cmp(&b.line_number))
    });
    (matches, skipped)
}

fn classify_line(
    raw: &RawLine<'_>,
    locator: &MatchLocator,
    patterns: &PatternConfig,
    out: &mut Vec<SearchMatch>,
) {
    let spans = locator.find(raw.content);
    if spans.is_empty() {
        return;
    }

    let file_path = PathBuf::from(raw.file_path);
    let file_name = file_name(&file_path);
    for span in spans {
        out.push(SearchMatch {
            file_path: file_path.clone(),
            file_name: file_name.clone(),
            line_number: raw.line_number - 1,
            line_content: raw.content.to_string(),
            match_start: span.start,
            match_end: span.end,
            is_write: is_write_operation(patterns, &raw.content[span.end..]),
        });
    }
}

fn file_name(path: &Path) -> String {
    path.file_name().map_or_else(
        || path.display().to_string(),
        |n| n.to_string_lossy().into_owned(),
    )
}

/// Split on `\n`, dropping a trailing `\r` from each line.
fn split_lines(buf: &[u8]) -> impl Iterator<Item = &[u8]> {
    let mut start = 0;
    memchr::memchr_iter(b'\n', buf)
        .chain(std::iter::once(buf.len()))
        .filter_map(move |end| {
            if start >= buf.len() && end == buf.len() {
                return None;
            }
            let line = &buf[start..end];
            start = end + 1;
            Some(line.strip_suffix(b"\r").unwrap_or(line))
        })
}

/// UTF-8 when possible; otherwise replace the bad bytes and carry on.
fn decode_line(bytes: &[u8]) -> Cow<'_, str> {
    match std::str::from_utf8(bytes) {
        Ok(s) => Cow::Borrowed(s),
        Err(e) => {
            let err = DecodeError {
                valid_up_to: e.valid_up_to(),
            };
            tracing::debug!(error = %err, "falling back to lossy decoding");
            String::from_utf8_lossy(bytes)
        }
    }
}
