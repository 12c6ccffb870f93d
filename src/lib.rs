#![warn(clippy::pedantic)]
#![allow(
    clippy::cast_possible_truncation,  // line numbers as u32 — we target 64-bit
    clippy::module_name_repetitions,   // Rust naming conventions
    clippy::similar_names,             // common in parser/search code
    clippy::struct_excessive_bools,    // CLI struct derives clap
    clippy::missing_errors_doc,        // internal pub(crate) fns don't need error docs
    clippy::missing_panics_doc,        // same
)]

pub mod cancel;
pub mod classify;
pub mod config;
pub mod error;
pub mod format;
pub mod logging;
pub mod mcp;
pub mod search;
pub mod types;

use std::path::PathBuf;
use std::sync::Arc;

use cancel::CancelToken;
use config::Config;
use error::RwgrepError;
use search::SearchPipeline;
use search::ripgrep::Ripgrep;
use types::SearchReport;

/// The single public API: find and classify every use of `token` under `roots`,
/// using the search tool named in `config`.
pub fn search(
    token: &str,
    roots: &[PathBuf],
    config: Arc<Config>,
    cancel: &CancelToken,
) -> Result<SearchReport, RwgrepError> {
    let searcher = Ripgrep::new(config.search_tool.clone());
    SearchPipeline::new(searcher, config).search(token, roots, cancel)
}
