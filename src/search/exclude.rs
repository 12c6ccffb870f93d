use globset::Glob;

use crate::types::ExcludeRules;

/// Translate exclusion rules into negated globs for the search tool.
/// Directory entries are passed through as gitignore-style names or globs;
/// extensions become `*.<ext>`. Globs that don't compile are logged and dropped
/// rather than failing the whole search.
#[must_use]
pub fn negated_globs(rules: &ExcludeRules) -> Vec<String> {
    let dirs = rules
        .dirs
        .iter()
        .map(|d| d.trim().trim_end_matches(['/', '\\']).to_string());
    let exts = rules.extensions.iter().map(|e| {
        let ext = e.trim().trim_start_matches('*').trim_start_matches('.');
        format!("*.{ext}")
    });

    let mut globs = Vec::with_capacity(rules.dirs.len() + rules.extensions.len());
    for pattern in dirs.chain(exts) {
        if pattern.is_empty() || pattern == "*." {
            continue;
        }
        if let Err(e) = Glob::new(&pattern) {
            tracing::warn!(pattern = %pattern, error = %e, "skipping invalid exclude glob");
            continue;
        }
        let negated = format!("!{pattern}");
        if !globs.contains(&negated) {
            globs.push(negated);
        }
    }
    globs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules(dirs: &[&str], exts: &[&str]) -> ExcludeRules {
        ExcludeRules {
            dirs: dirs.iter().map(|s| (*s).to_string()).collect(),
            extensions: exts.iter().map(|s| (*s).to_string()).collect(),
        }
    }

    #[test]
    fn dirs_and_extensions() {
        let globs = negated_globs(&rules(&["node_modules", "build/"], &["lock", ".min.js", "*.map"]));
        assert_eq!(
            globs,
            vec!["!node_modules", "!build", "!*.lock", "!*.min.js", "!*.map"]
        );
    }

    #[test]
    fn blanks_duplicates_and_invalid_are_dropped() {
        let globs = negated_globs(&rules(&["", "out", "out", "a[b"], &[" ", "."]));
        assert_eq!(globs, vec!["!out"]);
    }
}
