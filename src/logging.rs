use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Environment variable holding a `tracing` filter directive.
pub const LOG_ENV: &str = "RWGREP_LOG";

/// Install the global subscriber. Logs go to stderr; stdout carries results
/// (or JSON-RPC frames in MCP mode) and must stay clean.
///
/// `verbosity` raises the default level when `RWGREP_LOG` is unset:
/// 0 → warn, 1 → info, 2+ → debug. Returns false if a subscriber was already set.
pub fn init(verbosity: u8) -> bool {
    let default = match verbosity {
        0 => "rwgrep=warn",
        1 => "rwgrep=info",
        _ => "rwgrep=debug",
    };
    let env_filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));

    let subscriber = tracing_subscriber::registry().with(env_filter).with(
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .with_target(true),
    );

    if subscriber.try_init().is_err() {
        return false;
    }

    tracing::debug!("tracing initialized");
    true
}
