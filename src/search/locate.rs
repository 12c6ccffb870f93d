use grep_matcher::Matcher;
use grep_regex::{RegexMatcher, RegexMatcherBuilder};

use crate::error::RwgrepError;
use crate::types::{MatchOptions, Span};

/// Finds every occurrence of a literal token in a line.
/// Compiled once per search and shared read-only across roots.
pub struct MatchLocator {
    matcher: RegexMatcher,
}

impl MatchLocator {
    /// The token is always escaped — it is never interpreted as a pattern.
    pub fn new(token: &str, options: MatchOptions) -> Result<Self, RwgrepError> {
        let matcher = RegexMatcherBuilder::new()
            .case_insensitive(!options.case_sensitive)
            .word(options.match_whole_word)
            .build(&regex_syntax::escape(token))
            .map_err(|e| RwgrepError::InvalidQuery {
                query: token.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self { matcher })
    }

    /// Leftmost-first, non-overlapping spans, left to right.
    /// Scanning resumes at the end of the previous match.
    #[must_use]
    pub fn find(&self, line: &str) -> Vec<Span> {
        let mut spans = Vec::new();
        let _ = self.matcher.find_iter(line.as_bytes(), |m| {
            spans.push(Span {
                start: m.start(),
                end: m.end(),
            });
            true
        });
        spans
    }
}

/// One-shot convenience over [`MatchLocator`].
pub fn find_matches(
    line: &str,
    token: &str,
    options: MatchOptions,
) -> Result<Vec<Span>, RwgrepError> {
    Ok(MatchLocator::new(token, options)?.find(line))
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXACT: MatchOptions = MatchOptions {
        case_sensitive: true,
        match_whole_word: false,
    };
    const WORD: MatchOptions = MatchOptions {
        case_sensitive: true,
        match_whole_word: true,
    };

    fn spans(line: &str, token: &str, options: MatchOptions) -> Vec<(usize, usize)> {
        find_matches(line, token, options)
            .unwrap()
            .into_iter()
            .map(|s| (s.start, s.end))
            .collect()
    }

    #[test]
    fn repeated_token_yields_disjoint_spans() {
        assert_eq!(spans("foo.foo", "foo", EXACT), vec![(0, 3), (4, 7)]);
    }

    #[test]
    fn run_of_token_does_not_overlap() {
        assert_eq!(spans("aaaa", "aa", EXACT), vec![(0, 2), (2, 4)]);
        assert_eq!(spans("aaa", "aa", EXACT), vec![(0, 2)]);
    }

    #[test]
    fn whole_word_rejects_prefix() {
        assert!(spans("foobar", "foo", WORD).is_empty());
        assert_eq!(spans("foo bar", "foo", WORD), vec![(0, 3)]);
        assert_eq!(spans("x = foo;", "foo", WORD), vec![(4, 7)]);
    }

    #[test]
    fn case_insensitive() {
        let opts = MatchOptions {
            case_sensitive: false,
            match_whole_word: false,
        };
        assert_eq!(spans("Count COUNT count", "count", opts), vec![(0, 5), (6, 11), (12, 17)]);
        assert_eq!(spans("Count COUNT count", "count", EXACT), vec![(12, 17)]);
    }

    #[test]
    fn metacharacters_are_literal() {
        assert_eq!(spans("a.b axb", "a.b", EXACT), vec![(0, 3)]);
        assert_eq!(spans("x[0] = 1", "x[0]", EXACT), vec![(0, 4)]);
        assert_eq!(spans("f(a+b)", "a+b", EXACT), vec![(2, 5)]);
    }

    #[test]
    fn no_match_is_empty() {
        assert!(spans("nothing here", "absent", EXACT).is_empty());
    }

    #[test]
    fn spans_are_byte_offsets() {
        assert_eq!(spans("é = foo", "foo", EXACT), vec![(5, 8)]);
    }
}
