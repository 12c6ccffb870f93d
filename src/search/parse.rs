use crate::error::ParseError;
use crate::types::RawLine;

/// Prefixes that mark a whole line as a comment.
const COMMENT_MARKERS: &[&str] = &["//", "#"];

/// Split one `<path>:<line>:<content>` result line.
///
/// Paths may contain colons (`C:\src\a.rs`) and content may contain anything,
/// so the path delimiter is taken as the first `:` at or after the first `.`
/// (the file extension), and the content delimiter as the next `:` after that.
/// A path with no dot before its delimiter, or a directory dot followed by a
/// colon inside the path itself, defeats this.
///
/// Returns `Ok(None)` for lines whose content is a comment: they are dropped,
/// not errors. Only the start of the content is checked.
pub fn parse_line(line: &str) -> Result<Option<RawLine<'_>>, ParseError> {
    let dot = memchr::memchr(b'.', line.as_bytes()).ok_or(ParseError::NoExtension)?;

    let path_end = memchr::memchr(b':', &line.as_bytes()[dot..])
        .map(|i| dot + i)
        .ok_or(ParseError::NoPathDelimiter)?;

    let num_start = path_end + 1;
    let num_end = memchr::memchr(b':', &line.as_bytes()[num_start..])
        .map(|i| num_start + i)
        .ok_or(ParseError::NoContentDelimiter)?;

    let number_text = &line[num_start..num_end];
    let line_number = match number_text.trim().parse::<u32>() {
        Ok(n) if n > 0 => n,
        _ => return Err(ParseError::InvalidLineNumber(number_text.to_string())),
    };

    let content = line[num_end + 1..].trim();
    if is_comment(content) {
        return Ok(None);
    }

    Ok(Some(RawLine {
        file_path: &line[..path_end],
        line_number,
        content,
    }))
}

fn is_comment(content: &str) -> bool {
    COMMENT_MARKERS.iter().any(|m| content.starts_with(m))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_simple_line() {
        let raw = parse_line("src/a.ts:42:x = 1").unwrap().unwrap();
        assert_eq!(raw.file_path, "src/a.ts");
        assert_eq!(raw.line_number, 42);
        assert_eq!(raw.content, "x = 1");
    }

    #[test]
    fn content_keeps_its_colons() {
        let raw = parse_line("a.py:3:d = {'k': v}").unwrap().unwrap();
        assert_eq!(raw.file_path, "a.py");
        assert_eq!(raw.content, "d = {'k': v}");
    }

    #[test]
    fn windows_drive_letter() {
        let raw = parse_line(r"C:\work\src\main.rs:7:let x = 1;").unwrap().unwrap();
        assert_eq!(raw.file_path, r"C:\work\src\main.rs");
        assert_eq!(raw.line_number, 7);
        assert_eq!(raw.content, "let x = 1;");
    }

    #[test]
    fn content_is_trimmed() {
        let raw = parse_line("lib.rs:1:    value += 1   ").unwrap().unwrap();
        assert_eq!(raw.content, "value += 1");
    }

    #[test]
    fn leading_comment_is_dropped() {
        assert_eq!(parse_line("src/a.ts:5:// comment"), Ok(None));
        assert_eq!(parse_line("a.py:5:   # comment"), Ok(None));
    }

    #[test]
    fn trailing_comment_is_kept() {
        let raw = parse_line("src/a.ts:5:x // trailing").unwrap().unwrap();
        assert_eq!(raw.content, "x // trailing");
    }

    #[test]
    fn malformed_lines() {
        assert_eq!(
            parse_line("no-extension-or-colon"),
            Err(ParseError::NoExtension)
        );
        assert_eq!(parse_line("file.rs"), Err(ParseError::NoPathDelimiter));
        assert_eq!(parse_line("file.rs:12"), Err(ParseError::NoContentDelimiter));
        assert_eq!(
            parse_line("file.rs:abc:x"),
            Err(ParseError::InvalidLineNumber("abc".into()))
        );
        assert_eq!(
            parse_line("file.rs:0:x"),
            Err(ParseError::InvalidLineNumber("0".into()))
        );
    }

    #[test]
    fn empty_content_is_allowed() {
        let raw = parse_line("a.c:9:").unwrap().unwrap();
        assert_eq!(raw.content, "");
    }
}
