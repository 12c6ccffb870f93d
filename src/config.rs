use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::types::{ExcludeRules, MatchOptions};

/// Looked up in the working directory when neither `--config` nor
/// `RWGREP_CONFIG` names a file.
pub const DEFAULT_CONFIG_FILE: &str = "rwgrep.toml";
pub const CONFIG_ENV: &str = "RWGREP_CONFIG";

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Write-indicating syntax for one category of source files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PatternConfig {
    /// First non-blank character after the token that marks an assignment or mutation.
    pub operators: Vec<char>,
    /// Method names that mutate their receiver, reached via `.` or `->`.
    pub methods: Vec<String>,
    /// Operator-led prefixes that compare rather than assign (`==`, `=>`).
    pub exclude_operators: Vec<String>,
}

impl PatternConfig {
    /// Built-in vocabulary used when no config file is present.
    #[must_use]
    pub fn builtin() -> Self {
        Self {
            operators: vec!['=', '+', '-', '*', '/', '%'],
            methods: [
                "append", "add", "insert", "push", "remove", "delete", "erase", "clear", "set",
                "update", "modify", "replace",
            ]
            .map(String::from)
            .to_vec(),
            exclude_operators: ["==", "=>", "//", "/*"].map(String::from).to_vec(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operators.is_empty() && self.methods.is_empty()
    }
}

/// Pattern tables by file category. Only `common` exists today.
/// A config file without this table gets no patterns at all.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Patterns {
    pub common: PatternConfig,
}

/// Display colors (`#rrggbb`) for read and write tags.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Colors {
    pub read: String,
    pub write: String,
}

impl Default for Colors {
    fn default() -> Self {
        Self {
            read: "#4caf50".into(),
            write: "#f44336".into(),
        }
    }
}

/// One immutable configuration snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    #[serde(default)]
    pub patterns: Patterns,
    pub case_sensitive: bool,
    pub match_whole_word: bool,
    pub exclude_patterns: Vec<String>,
    pub exclude_file_extensions: Vec<String>,
    pub colors: Colors,
    /// Per-root limit on the external search process. 0 disables it.
    pub timeout_secs: u64,
    /// Executable used for line search.
    pub search_tool: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            patterns: Patterns {
                common: PatternConfig::builtin(),
            },
            case_sensitive: true,
            match_whole_word: true,
            exclude_patterns: [".git", "node_modules", "target", "dist", "build"]
                .map(String::from)
                .to_vec(),
            exclude_file_extensions: Vec::new(),
            colors: Colors::default(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            search_tool: "rg".into(),
        }
    }
}

impl Config {
    /// Parse a TOML document. Missing keys take their defaults, except
    /// `patterns`, which is empty unless given.
    pub fn from_toml(text: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Toml {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load from `path`, or the first of `$RWGREP_CONFIG` / `./rwgrep.toml`
    /// that exists. No file at all means built-in defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = resolve_path(path) else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        let config = Self::from_toml(&text, &path)?;
        tracing::debug!(path = %path.display(), "config loaded");
        Ok(config)
    }

    /// Like [`Config::load`], but a broken file degrades to defaults with no
    /// write patterns, so every match classifies as a read.
    #[must_use]
    pub fn load_or_degraded(path: Option<&Path>) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(error = %e, "config unusable, write detection disabled");
                Self {
                    patterns: Patterns::default(),
                    ..Self::default()
                }
            }
        }
    }

    #[must_use]
    pub fn match_options(&self) -> MatchOptions {
        MatchOptions {
            case_sensitive: self.case_sensitive,
            match_whole_word: self.match_whole_word,
        }
    }

    #[must_use]
    pub fn exclude_rules(&self) -> ExcludeRules {
        ExcludeRules {
            dirs: self.exclude_patterns.clone(),
            extensions: self.exclude_file_extensions.clone(),
        }
    }

    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

fn resolve_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(p) = explicit {
        return Some(p.to_path_buf());
    }
    if let Some(p) = std::env::var_os(CONFIG_ENV) {
        return Some(PathBuf::from(p));
    }
    let local = PathBuf::from(DEFAULT_CONFIG_FILE);
    local.is_file().then_some(local)
}

/// Command-line values that win over whatever the config file says.
/// Reapplied on every reload.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub case_sensitive: Option<bool>,
    pub match_whole_word: Option<bool>,
    pub exclude_patterns: Vec<String>,
    pub exclude_file_extensions: Vec<String>,
    pub timeout_secs: Option<u64>,
    pub search_tool: Option<String>,
}

impl Overrides {
    fn apply(&self, config: &mut Config) {
        if let Some(v) = self.case_sensitive {
            config.case_sensitive = v;
        }
        if let Some(v) = self.match_whole_word {
            config.match_whole_word = v;
        }
        config
            .exclude_patterns
            .extend(self.exclude_patterns.iter().cloned());
        config
            .exclude_file_extensions
            .extend(self.exclude_file_extensions.iter().cloned());
        if let Some(v) = self.timeout_secs {
            config.timeout_secs = v;
        }
        if let Some(ref v) = self.search_tool {
            config.search_tool.clone_from(v);
        }
    }
}

/// Owner of the live configuration. Searches take a snapshot and keep it for
/// their whole run; a reload swaps in a new snapshot and never touches the old one.
pub struct SettingsHandle {
    path: Option<PathBuf>,
    overrides: Overrides,
    current: RwLock<Arc<Config>>,
}

impl SettingsHandle {
    #[must_use]
    pub fn load(path: Option<PathBuf>, overrides: Overrides) -> Self {
        let config = build(path.as_deref(), &overrides);
        Self {
            path,
            overrides,
            current: RwLock::new(Arc::new(config)),
        }
    }

    /// Fixed settings, no file behind them.
    #[must_use]
    pub fn from_config(config: Config) -> Self {
        Self {
            path: None,
            overrides: Overrides::default(),
            current: RwLock::new(Arc::new(config)),
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> Arc<Config> {
        Arc::clone(
            &self
                .current
                .read()
                .unwrap_or_else(std::sync::PoisonError::into_inner),
        )
    }

    /// Handle a "configuration changed" notification: rebuild from disk and swap.
    pub fn reload(&self) -> Arc<Config> {
        let fresh = Arc::new(build(self.path.as_deref(), &self.overrides));
        let mut current = self
            .current
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *current = Arc::clone(&fresh);
        tracing::info!("configuration reloaded");
        fresh
    }
}

fn build(path: Option<&Path>, overrides: &Overrides) -> Config {
    let mut config = Config::load_or_degraded(path);
    overrides.apply(&mut config);
    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn full_document_parses() {
        let text = r##"
caseSensitive = false
matchWholeWord = false
excludePatterns = ["vendor"]
excludeFileExtensions = [".min.js"]
timeoutSecs = 5

[patterns.common]
operators = ["=", "+"]
methods = ["push"]
excludeOperators = ["=="]

[colors]
read = "#000000"
write = "#ffffff"
"##;
        let config = Config::from_toml(text, Path::new("t.toml")).unwrap();
        assert!(!config.case_sensitive);
        assert!(!config.match_whole_word);
        assert_eq!(config.exclude_patterns, vec!["vendor"]);
        assert_eq!(config.patterns.common.operators, vec!['=', '+']);
        assert_eq!(config.patterns.common.methods, vec!["push"]);
        assert_eq!(config.patterns.common.exclude_operators, vec!["=="]);
        assert_eq!(config.colors.write, "#ffffff");
        assert_eq!(config.timeout(), Some(Duration::from_secs(5)));
        assert_eq!(config.search_tool, "rg");
    }

    #[test]
    fn missing_patterns_table_means_no_patterns() {
        let config = Config::from_toml("caseSensitive = true\n", Path::new("t.toml")).unwrap();
        assert!(config.patterns.common.is_empty());
        assert!(config.match_whole_word, "unset scalars keep their defaults");
    }

    #[test]
    fn multi_char_operator_is_rejected() {
        let text = "[patterns.common]\noperators = [\"+=\"]\n";
        assert!(Config::from_toml(text, Path::new("t.toml")).is_err());
    }

    #[test]
    fn broken_file_degrades_to_no_patterns() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "caseSensitive = [").unwrap();
        let config = Config::load_or_degraded(Some(file.path()));
        assert!(config.patterns.common.is_empty());
        assert!(config.case_sensitive);
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let err = Config::load(Some(Path::new("/definitely/not/here.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn overrides_win_over_file() {
        let mut config = Config::default();
        let overrides = Overrides {
            case_sensitive: Some(false),
            exclude_file_extensions: vec!["lock".into()],
            timeout_secs: Some(0),
            ..Overrides::default()
        };
        overrides.apply(&mut config);
        assert!(!config.case_sensitive);
        assert_eq!(config.exclude_file_extensions, vec!["lock"]);
        assert_eq!(config.timeout(), None);
    }

    #[test]
    fn reload_swaps_snapshot_without_touching_old_one() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[patterns.common]\noperators = [\"=\"]").unwrap();
        let handle = SettingsHandle::load(Some(file.path().to_path_buf()), Overrides::default());
        let before = handle.snapshot();
        assert_eq!(before.patterns.common.operators, vec!['=']);

        std::fs::write(file.path(), "[patterns.common]\noperators = [\"+\"]\n").unwrap();
        let after = handle.reload();

        assert_eq!(before.patterns.common.operators, vec!['=']);
        assert_eq!(after.patterns.common.operators, vec!['+']);
        assert_eq!(handle.snapshot().patterns.common.operators, vec!['+']);
    }
}
