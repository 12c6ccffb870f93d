use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::cancel::CancelToken;
use crate::error::ProcessError;
use crate::types::{MatchOptions, truncate_str};

const POLL_INTERVAL: Duration = Duration::from_millis(10);
const MAX_STDERR_BYTES: usize = 512;

/// Everything the external tool needs to search one root.
#[derive(Debug, Clone, Copy)]
pub struct SearchRequest<'a> {
    pub token: &'a str,
    pub root: &'a Path,
    pub options: MatchOptions,
    /// Negated globs (`!node_modules`, `!*.lock`).
    pub globs: &'a [String],
    pub timeout: Option<Duration>,
}

/// A line-oriented search tool: literal token in, `<path>:<line>:<content>` lines out.
///
/// Implementations must honour `cancel` promptly and release every resource
/// they acquired on all return paths.
pub trait LineSearcher: Sync {
    fn search(
        &self,
        req: &SearchRequest<'_>,
        cancel: &CancelToken,
    ) -> Result<Vec<u8>, ProcessError>;
}

impl<T: LineSearcher + ?Sized> LineSearcher for &T {
    fn search(
        &self,
        req: &SearchRequest<'_>,
        cancel: &CancelToken,
    ) -> Result<Vec<u8>, ProcessError> {
        (**self).search(req, cancel)
    }
}

/// `rg` as a child process.
#[derive(Debug, Clone)]
pub struct Ripgrep {
    program: String,
}

impl Default for Ripgrep {
    fn default() -> Self {
        Self::new("rg")
    }
}

impl Ripgrep {
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Whether the executable can be started at all.
    #[must_use]
    pub fn is_available(&self) -> bool {
        Command::new(&self.program)
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .is_ok_and(|s| s.success())
    }

    /// Literal, recursive, hidden-file search with one `path:line:content` row per matching line.
    pub(crate) fn command(&self, req: &SearchRequest<'_>) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args([
            "--no-config",
            "--fixed-strings",
            "--line-number",
            "--with-filename",
            "--no-heading",
            "--color",
            "never",
            "--hidden",
        ]);
        cmd.arg(if req.options.case_sensitive {
            "--case-sensitive"
        } else {
            "--ignore-case"
        });
        if req.options.match_whole_word {
            cmd.arg("--word-regexp");
        }
        for glob in req.globs {
            cmd.arg("--glob").arg(glob);
        }
        cmd.arg("-e").arg(req.token).arg("--").arg(req.root);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            // Own group, so a kill reaches wrapper scripts' children too.
            cmd.process_group(0);
        }
        cmd
    }
}

impl LineSearcher for Ripgrep {
    fn search(
        &self,
        req: &SearchRequest<'_>,
        cancel: &CancelToken,
    ) -> Result<Vec<u8>, ProcessError> {
        let child = self
            .command(req)
            .spawn()
            .map_err(|source| ProcessError::Spawn {
                program: self.program.clone(),
                source,
            })?;
        let mut child = Reaper(child);

        // Drain both pipes concurrently so a chatty child can't block on a full pipe.
        let stdout = child.0.stdout.take().map(drain);
        let stderr = child.0.stderr.take().map(drain);

        let status = match wait(&mut child, req.timeout, cancel) {
            Ok(status) => status,
            Err(e) => {
                child.terminate();
                // Readers finish once the group's pipe ends close; don't wait for them.
                drop((stdout, stderr));
                return Err(e);
            }
        };

        let stdout = collect(stdout)?;
        let stderr = collect(stderr);

        match status.code() {
            // 1 means "no matches", which is not a failure.
            Some(0 | 1) => Ok(stdout),
            code => {
                let stderr = stderr.unwrap_or_default();
                let text = String::from_utf8_lossy(&stderr);
                Err(ProcessError::Exited {
                    code,
                    stderr: truncate_str(text.trim(), MAX_STDERR_BYTES).to_string(),
                })
            }
        }
    }
}

/// Kills and reaps the child when dropped, whatever path we leave by.
struct Reaper(Child);

impl Reaper {
    fn terminate(&mut self) {
        if matches!(self.0.try_wait(), Ok(None)) {
            kill_group(&mut self.0);
        }
        let _ = self.0.wait();
    }
}

/// SIGKILL the child's process group. The child is not yet reaped, so its pid
/// is still the group id.
#[cfg(unix)]
fn kill_group(child: &mut Child) {
    if let Ok(pgid) = libc::pid_t::try_from(child.id()) {
        // SAFETY: killpg only sends a signal and touches no memory.
        unsafe {
            libc::killpg(pgid, libc::SIGKILL);
        }
    }
    let _ = child.kill();
}

#[cfg(not(unix))]
fn kill_group(child: &mut Child) {
    let _ = child.kill();
}

impl Drop for Reaper {
    fn drop(&mut self) {
        self.terminate();
    }
}

fn wait(
    child: &mut Reaper,
    timeout: Option<Duration>,
    cancel: &CancelToken,
) -> Result<ExitStatus, ProcessError> {
    let started = Instant::now();
    loop {
        if let Some(status) = child.0.try_wait().map_err(ProcessError::Io)? {
            return Ok(status);
        }
        if cancel.is_cancelled() {
            return Err(ProcessError::Cancelled);
        }
        if let Some(limit) = timeout
            && started.elapsed() >= limit
        {
            return Err(ProcessError::TimedOut(limit));
        }
        thread::sleep(POLL_INTERVAL);
    }
}

fn drain(mut pipe: impl Read + Send + 'static) -> JoinHandle<std::io::Result<Vec<u8>>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        pipe.read_to_end(&mut buf)?;
        Ok(buf)
    })
}

fn collect(handle: Option<JoinHandle<std::io::Result<Vec<u8>>>>) -> Result<Vec<u8>, ProcessError> {
    let Some(handle) = handle else {
        return Ok(Vec::new());
    };
    handle
        .join()
        .map_err(|_| ProcessError::Io(std::io::Error::other("pipe reader panicked")))?
        .map_err(ProcessError::Io)
}
