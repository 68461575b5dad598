use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::pipeline::compiler::DEFAULT_PASS_TIMEOUT;

/// Application configuration loaded from environment variables.
/// Every variable has a default; only malformed values are rejected.
#[derive(Debug, Clone)]
pub struct Config {
    pub template_dir: PathBuf,
    pub template_name: String,
    /// `CV_LOGO_PATH`. Emitted raw into LaTeX, so `% # { }` are rejected.
    pub logo_path: PathBuf,
    pub latex_bin: String,
    pub latex_extra_args: Vec<String>,
    pub pass_timeout: Duration,
    pub work_root: Option<PathBuf>,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup. `from_env` passes the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let pass_timeout = match lookup("LATEX_PASS_TIMEOUT_SECS") {
            Some(raw) => Duration::from_secs(raw.trim().parse::<u64>().with_context(|| {
                format!("LATEX_PASS_TIMEOUT_SECS must be a whole number of seconds, got '{raw}'")
            })?),
            None => DEFAULT_PASS_TIMEOUT,
        };

        Ok(Config {
            template_dir: PathBuf::from(var("CV_TEMPLATE_DIR", "templates")),
            template_name: var("CV_TEMPLATE", "cv_template.tex"),
            logo_path: PathBuf::from(var("CV_LOGO_PATH", "assets/logo.png")),
            latex_bin: var("LATEX_BIN", "pdflatex"),
            latex_extra_args: lookup("LATEX_EXTRA_ARGS")
                .map(|raw| raw.split_whitespace().map(String::from).collect())
                .unwrap_or_default(),
            pass_timeout,
            work_root: lookup("CV_WORK_ROOT")
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from),
            rust_log: var("RUST_LOG", "info"),
        })
    }
}
