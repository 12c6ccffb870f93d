use crate::config::PatternConfig;

/// Decide whether the text after a token occurrence writes to it.
///
/// Lexical only: looks at the first non-blank syntax after the token.
/// `.name` / `->name` is a write when `name` starts with a mutating method,
/// otherwise a leading operator character is a write unless the text starts
/// with one of the excluded comparison operators.
#[must_use]
pub fn is_write_operation(config: &PatternConfig, trailing: &str) -> bool {
    let text = trailing.trim();
    if text.is_empty() || config.is_empty() {
        return false;
    }

    if let Some(rest) = text.strip_prefix('.') {
        return starts_with_method(config, rest);
    }

    if let Some(rest) = text.strip_prefix("->") {
        return starts_with_method(config, rest);
    }

    let Some(first) = text.chars().next() else {
        return false;
    };
    if !config.operators.contains(&first) {
        return false;
    }

    // Only consulted once the leading character is an operator.
    !config
        .exclude_operators
        .iter()
        .any(|op| !op.is_empty() && text.starts_with(op.as_str()))
}

fn starts_with_method(config: &PatternConfig, rest: &str) -> bool {
    config
        .methods
        .iter()
        .any(|m| !m.is_empty() && rest.starts_with(m.as_str()))
}
