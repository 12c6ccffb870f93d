use std::fmt::Write;
use std::path::{Path, PathBuf};

use crate::config::Colors;
use crate::types::{SearchMatch, SearchReport, truncate_str};

/// Long minified lines are cut to this many bytes in text output.
const MAX_LINE_BYTES: usize = 240;

/// Build the header line for a search:
/// `# Search: "token" in root — N matches (W writes, R reads)`
pub fn search_header(token: &str, roots: &[PathBuf], writes: usize, reads: usize) -> String {
    let total = writes + reads;
    let roots = roots
        .iter()
        .map(|r| r.display().to_string())
        .collect::<Vec<_>>()
        .join(", ");
    let parts = match total {
        0 => "no matches".to_string(),
        1 => format!("1 match ({})", counts(writes, reads)),
        n => format!("{n} matches ({})", counts(writes, reads)),
    };
    format!("# Search: \"{token}\" in {roots} — {parts}")
}

fn counts(writes: usize, reads: usize) -> String {
    let w = if writes == 1 { "write" } else { "writes" };
    let r = if reads == 1 { "read" } else { "reads" };
    format!("{writes} {w}, {reads} {r}")
}

/// Render a full report as text. With `colors`, the `[read]`/`[write]` tags
/// are wrapped in 24-bit ANSI color escapes.
pub fn render(report: &SearchReport, colors: Option<&Colors>) -> String {
    let mut out = search_header(
        &report.token,
        &report.roots,
        report.writes(),
        report.reads(),
    );

    for m in &report.matches {
        let rel = display_path(&m.file_path, &report.roots);
        let _ = write!(
            out,
            "\n\n## {rel}:{} {}",
            m.line_number + 1,
            tag(m.is_write, colors)
        );
        let _ = write!(out, "\n→ {}", excerpt(m));
    }

    for failure in &report.failures {
        let _ = write!(
            out,
            "\n\n! {} — search failed: {}",
            failure.root.display(),
            failure.error
        );
    }

    if report.skipped_lines > 0 {
        let _ = write!(
            out,
            "\n\n... {} unreadable result lines skipped.",
            report.skipped_lines
        );
    }

    out
}

/// Machine-readable form of a report, with totals alongside the raw matches.
pub fn render_json(report: &SearchReport) -> serde_json::Value {
    serde_json::json!({
        "token": report.token,
        "total": report.matches.len(),
        "writes": report.writes(),
        "reads": report.reads(),
        "report": report,
    })
}

fn tag(is_write: bool, colors: Option<&Colors>) -> String {
    let (label, hex) = match (is_write, colors) {
        (true, Some(c)) => ("write", Some(c.write.as_str())),
        (false, Some(c)) => ("read", Some(c.read.as_str())),
        (true, None) => ("write", None),
        (false, None) => ("read", None),
    };
    match hex.and_then(parse_hex_color) {
        Some((r, g, b)) => format!("\x1b[38;2;{r};{g};{b}m[{label}]\x1b[0m"),
        None => format!("[{label}]"),
    }
}

/// Parse `#rrggbb` (or `#rgb`) into components.
fn parse_hex_color(s: &str) -> Option<(u8, u8, u8)> {
    let hex = s.trim().strip_prefix('#')?;
    if !hex.is_ascii() {
        return None;
    }
    match hex.len() {
        6 => {
            let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
            let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
            let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
            Some((r, g, b))
        }
        3 => {
            let mut parts = hex.chars().map(|c| c.to_digit(16).map(|d| (d * 17) as u8));
            Some((parts.next()??, parts.next()??, parts.next()??))
        }
        _ => None,
    }
}

/// Strip the root prefix from a path when it sits under one of the roots.
/// Falls back to the path as reported.
fn display_path(path: &Path, roots: &[PathBuf]) -> String {
    roots
        .iter()
        .find_map(|root| path.strip_prefix(root).ok())
        .filter(|rel| !rel.as_os_str().is_empty())
        .unwrap_or(path)
        .display()
        .to_string()
}

fn excerpt(m: &SearchMatch) -> &str {
    truncate_str(&m.line_content, MAX_LINE_BYTES.max(m.match_end))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProcessError;
    use crate::types::RootFailure;

    fn sample(file: &str, line: u32, is_write: bool) -> SearchMatch {
        SearchMatch {
            file_path: PathBuf::from(file),
            file_name: Path::new(file)
                .file_name()
                .unwrap()
                .to_string_lossy()
                .into_owned(),
            line_number: line,
            line_content: "count += 1".into(),
            match_start: 0,
            match_end: 5,
            is_write,
        }
    }

    #[test]
    fn search_header_format() {
        let header = search_header("count", &[PathBuf::from("/tmp/scope")], 1, 2);
        assert!(header.contains("\"count\""), "should contain token");
        assert!(header.contains("/tmp/scope"), "should contain root");
        assert!(header.contains("3 matches"), "should contain total");
        assert!(header.contains("1 write,"), "should contain write count");
        assert!(header.contains("2 reads"), "should contain read count");
    }

    #[test]
    fn empty_header() {
        let header = search_header("x", &[PathBuf::from(".")], 0, 0);
        assert!(header.ends_with("no matches"), "{header}");
    }

    #[test]
    fn report_lines_are_one_based_and_root_relative() {
        let report = SearchReport {
            token: "count".into(),
            roots: vec![PathBuf::from("/repo")],
            matches: vec![sample("/repo/src/a.py", 2, true)],
            ..SearchReport::default()
        };
        let out = render(&report, None);
        assert!(out.contains("## src/a.py:3 [write]"), "{out}");
        assert!(out.contains("→ count += 1"), "{out}");
    }

    #[test]
    fn heading_has_no_column() {
        // Offsets index the trimmed content, not the source line.
        let m = sample("/repo/a.py", 6, true);
        let report = SearchReport {
            token: "count".into(),
            roots: vec![PathBuf::from("/repo")],
            matches: vec![m],
            ..SearchReport::default()
        };
        let out = render(&report, None);
        assert!(out.contains("## a.py:7 [write]\n"), "{out}");
        assert!(!out.contains("a.py:7:"), "{out}");
    }

    #[test]
    fn failures_and_skips_are_listed() {
        let report = SearchReport {
            token: "x".into(),
            roots: vec![PathBuf::from("/a"), PathBuf::from("/b")],
            failures: vec![RootFailure {
                root: PathBuf::from("/b"),
                error: ProcessError::TimedOut(std::time::Duration::from_secs(3)),
            }],
            skipped_lines: 2,
            ..SearchReport::default()
        };
        let out = render(&report, None);
        assert!(out.contains("/b — search failed: search tool timed out after 3s"), "{out}");
        assert!(out.contains("2 unreadable result lines"), "{out}");
    }

    #[test]
    fn colored_tags() {
        let colors = Colors {
            read: "#00ff00".into(),
            write: "#f00".into(),
        };
        assert_eq!(tag(true, Some(&colors)), "\x1b[38;2;255;0;0m[write]\x1b[0m");
        assert_eq!(tag(false, Some(&colors)), "\x1b[38;2;0;255;0m[read]\x1b[0m");
        assert_eq!(tag(false, None), "[read]");
    }

    #[test]
    fn bad_colors_fall_back_to_plain() {
        assert_eq!(parse_hex_color("green"), None);
        assert_eq!(parse_hex_color("#12345"), None);
        assert_eq!(parse_hex_color("#zzzzzz"), None);
        let colors = Colors {
            read: "blue".into(),
            write: "#f44336".into(),
        };
        assert_eq!(tag(false, Some(&colors)), "[read]");
    }

    #[test]
    fn json_carries_totals() {
        let report = SearchReport {
            token: "count".into(),
            roots: vec![PathBuf::from(".")],
            matches: vec![sample("a.py", 2, true), sample("a.py", 2, false)],
            ..SearchReport::default()
        };
        let json = render_json(&report);
        assert_eq!(json["total"], 2);
        assert_eq!(json["writes"], 1);
        assert_eq!(json["reads"], 1);
        assert_eq!(json["report"]["matches"][0]["lineNumber"], 2);
        assert_eq!(json["report"]["matches"][0]["isWrite"], true);
        assert_eq!(json["report"]["matches"][1]["fileName"], "a.py");
    }
}
