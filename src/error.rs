use std::path::PathBuf;
use std::time::Duration;

/// Why a raw `<path>:<line>:<content>` line could not be split.
/// Recoverable: the line is skipped and the batch continues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// No `.` anywhere in the line, so no file extension to anchor on.
    NoExtension,
    /// No `:` after the first `.`.
    NoPathDelimiter,
    /// No second `:` after the line number.
    NoContentDelimiter,
    /// The line-number field is not a positive integer.
    InvalidLineNumber(String),
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoExtension => write!(f, "no file extension in result line"),
            Self::NoPathDelimiter => write!(f, "no ':' between path and line number"),
            Self::NoContentDelimiter => write!(f, "no ':' between line number and content"),
            Self::InvalidLineNumber(text) => write!(f, "invalid line number \"{text}\""),
        }
    }
}

impl std::error::Error for ParseError {}

/// The external search process for one root failed. Only that root is affected.
#[derive(Debug)]
pub enum ProcessError {
    Spawn {
        program: String,
        source: std::io::Error,
    },
    Exited {
        code: Option<i32>,
        stderr: String,
    },
    TimedOut(Duration),
    /// Killed because the caller cancelled the search.
    Cancelled,
    Io(std::io::Error),
}

impl std::fmt::Display for ProcessError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Spawn { program, source } => write!(f, "failed to start {program}: {source}"),
            Self::Exited { code, stderr } => {
                match code {
                    Some(c) => write!(f, "search tool exited with status {c}")?,
                    None => write!(f, "search tool terminated by signal")?,
                }
                if !stderr.is_empty() {
                    write!(f, ": {stderr}")?;
                }
                Ok(())
            }
            Self::Cancelled => write!(f, "search tool stopped by cancellation"),
            Self::TimedOut(after) => write!(f, "search tool timed out after {}s", after.as_secs()),
            Self::Io(source) => write!(f, "reading search output: {source}"),
        }
    }
}

impl std::error::Error for ProcessError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Spawn { source, .. } | Self::Io(source) => Some(source),
            _ => None,
        }
    }
}

/// A result line that was not valid UTF-8. Recovered by lossy decoding.
#[derive(Debug)]
pub struct DecodeError {
    pub valid_up_to: usize,
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid UTF-8 after byte {}", self.valid_up_to)
    }
}

impl std::error::Error for DecodeError {}

/// The configuration file exists but could not be used.
#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Toml {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "{}: {source}", path.display()),
            Self::Toml { path, source } => {
                write!(f, "invalid config in {}: {}", path.display(), source.message())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Every error an rwgrep entry point can return. Displayed as user-facing messages.
#[derive(Debug)]
pub enum RwgrepError {
    InvalidQuery {
        query: String,
        reason: String,
    },
    Config(ConfigError),
    /// The caller cancelled the search; in-flight processes were killed.
    Cancelled,
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl std::fmt::Display for RwgrepError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidQuery { query, reason } => {
                write!(f, "invalid query \"{query}\": {reason}")
            }
            Self::Config(e) => write!(f, "{e}"),
            Self::Cancelled => write!(f, "search cancelled"),
            Self::Io { path, source } => write!(f, "{}: {source}", path.display()),
        }
    }
}

impl std::error::Error for RwgrepError {}

impl From<ConfigError> for RwgrepError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl RwgrepError {
    /// Process exit code for the CLI. 1 is reserved for "no matches".
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Io { .. } | Self::Config(_) => 2,
            Self::InvalidQuery { .. } => 3,
            Self::Cancelled => 130,
        }
    }
}
