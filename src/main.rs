use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::process;

use clap::{ArgAction, CommandFactory, Parser};
use clap_complete::Shell;

use rwgrep::cancel::CancelToken;
use rwgrep::config::{Overrides, SettingsHandle};

/// rwgrep — find every use of a token across a workspace and tell reads from writes.
#[derive(Parser)]
#[command(name = "rwgrep", version, about)]
struct Cli {
    /// Literal text to search for.
    token: Option<String>,

    /// Directories to search. Defaults to the current directory.
    roots: Vec<PathBuf>,

    /// Config file (default: $RWGREP_CONFIG, then ./rwgrep.toml).
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Match case exactly.
    #[arg(long, short = 's', overrides_with = "ignore_case")]
    case_sensitive: bool,

    /// Ignore case.
    #[arg(long, short = 'i', overrides_with = "case_sensitive")]
    ignore_case: bool,

    /// Only match whole words.
    #[arg(long, short = 'w', overrides_with = "no_word")]
    word: bool,

    /// Match inside longer words too.
    #[arg(long, overrides_with = "word")]
    no_word: bool,

    /// Extra directory name or glob to skip. Repeatable.
    #[arg(long, value_name = "GLOB")]
    exclude: Vec<String>,

    /// Extra file extension to skip. Repeatable.
    #[arg(long, value_name = "EXT")]
    exclude_ext: Vec<String>,

    /// Per-root timeout in seconds (0 = none).
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Search executable to run instead of `rg`.
    #[arg(long, value_name = "PATH")]
    search_tool: Option<String>,

    /// Only print write occurrences.
    #[arg(long)]
    writes_only: bool,

    /// Machine-readable JSON output.
    #[arg(long)]
    json: bool,

    /// Run as MCP server (JSON-RPC on stdio).
    #[arg(long)]
    mcp: bool,

    /// More logging on stderr (-v info, -vv debug).
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Print shell completions for the given shell.
    #[arg(long, value_name = "SHELL")]
    completions: Option<Shell>,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            case_sensitive: flag_pair(self.case_sensitive, self.ignore_case),
            match_whole_word: flag_pair(self.word, self.no_word),
            exclude_patterns: self.exclude.clone(),
            exclude_file_extensions: self.exclude_ext.clone(),
            timeout_secs: self.timeout,
            search_tool: self.search_tool.clone(),
        }
    }
}

fn flag_pair(on: bool, off: bool) -> Option<bool> {
    match (on, off) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    }
}

fn main() {
    let cli = Cli::parse();

    // Shell completions
    if let Some(shell) = cli.completions {
        clap_complete::generate(shell, &mut Cli::command(), "rwgrep", &mut io::stdout());
        return;
    }

    rwgrep::logging::init(cli.verbose);
    let settings = SettingsHandle::load(cli.config.clone(), cli.overrides());

    // MCP mode: JSON-RPC server
    if cli.mcp {
        if let Err(e) = rwgrep::mcp::run(&settings) {
            eprintln!("mcp error: {e}");
            process::exit(1);
        }
        return;
    }

    let Some(ref token) = cli.token else {
        eprintln!("usage: rwgrep <token> [ROOT...] [--config FILE] [-s|-i] [-w|--no-word]");
        process::exit(3);
    };
    let roots = if cli.roots.is_empty() {
        vec![PathBuf::from(".")]
    } else {
        cli.roots.clone()
    };

    let cancel = CancelToken::new();
    for signal in [signal_hook::consts::SIGINT, signal_hook::consts::SIGTERM] {
        if let Err(e) = signal_hook::flag::register(signal, cancel.flag()) {
            tracing::warn!(error = %e, "could not install signal handler");
        }
    }

    let config = settings.snapshot();
    let mut report = match rwgrep::search(token, &roots, config.clone(), &cancel) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("{e}");
            process::exit(e.exit_code());
        }
    };
    if cli.writes_only {
        report.matches.retain(|m| m.is_write);
    }

    for failure in &report.failures {
        eprintln!("{}: {}", failure.root.display(), failure.error);
    }

    let is_tty = io::stdout().is_terminal();
    if cli.json {
        match serde_json::to_string_pretty(&rwgrep::format::render_json(&report)) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("json error: {e}");
                process::exit(2);
            }
        }
    } else {
        let colors = is_tty.then_some(&config.colors);
        emit_output(&rwgrep::format::render(&report, colors), is_tty);
    }

    let code = match (report.matches.is_empty(), report.failures.is_empty()) {
        (false, _) => 0,
        (true, true) => 1,
        (true, false) => 2,
    };
    process::exit(code);
}

/// Print the text report, through `$PAGER` when it would scroll off the terminal.
fn emit_output(text: &str, is_tty: bool) {
    let rows = screen_rows(std::env::var("LINES").ok().as_deref());
    if is_tty && text.lines().count() > rows && page(text).is_ok() {
        return;
    }
    println!("{text}");
}

fn page(text: &str) -> io::Result<()> {
    let pager = std::env::var("PAGER").unwrap_or_else(|_| "less".into());
    let mut child = pager_command(&pager)
        .stdin(process::Stdio::piped())
        .spawn()?;
    if let Some(mut stdin) = child.stdin.take() {
        // Quitting the pager early closes the pipe.
        let _ = stdin.write_all(text.as_bytes());
    }
    child.wait().map(drop)
}

/// `less` needs `-R` to pass the tag colors through; other pagers get no flags.
fn pager_command(pager: &str) -> process::Command {
    let mut cmd = process::Command::new(pager);
    if Path::new(pager).file_name().is_some_and(|n| n == "less") {
        cmd.arg("-R");
    }
    cmd
}

/// Terminal height from `$LINES`, else 24.
fn screen_rows(lines: Option<&str>) -> usize {
    lines
        .and_then(|l| l.trim().parse().ok())
        .filter(|&rows| rows > 0)
        .unwrap_or(24)
}
