//! Compilation Driver: runs the external LaTeX compiler over a rendered document.
//!
//! # Protocol
//! - The source is written to `<work_dir>/cv_output.tex`.
//! - The compiler runs exactly `COMPILE_PASSES` times in non-interactive mode.
//!   The second pass consumes the `.aux` state written by the first.
//! - Exit codes are advisory: pdflatex exits non-zero on recoverable warnings while
//!   still writing a usable PDF. The only success signal is a non-empty `cv_output.pdf`.
//! - Each pass runs under `pass_timeout`. The child is spawned with `kill_on_drop`,
//!   so a timed-out pass is terminated rather than left running.

use std::io;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use crate::errors::CvError;
use crate::render::RenderedDocument;

/// Base name shared by the source, the compiler's auxiliary files and the PDF.
pub const SOURCE_STEM: &str = "cv_output";

/// Two passes resolve cross-references (page numbers, hyperref anchors).
pub const COMPILE_PASSES: u32 = 2;

pub const DEFAULT_PASS_TIMEOUT: Duration = Duration::from_secs(120);

/// Turns a rendered document into a PDF inside `work_dir`.
///
/// Carried by the pipeline as `Arc<dyn Compiler>` so engines can be swapped.
#[async_trait]
pub trait Compiler: Send + Sync {
    async fn compile(
        &self,
        document: &RenderedDocument,
        work_dir: &Path,
    ) -> Result<PathBuf, CvError>;
}

/// pdflatex-compatible command line driver.
#[derive(Debug, Clone)]
pub struct LatexCompiler {
    program: String,
    extra_args: Vec<String>,
    pass_timeout: Duration,
}

impl LatexCompiler {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            extra_args: Vec::new(),
            pass_timeout: DEFAULT_PASS_TIMEOUT,
        }
    }

    /// Arguments placed before the standard flags (e.g. `-file-line-error`).
    pub fn with_extra_args(mut self, args: Vec<String>) -> Self {
        self.extra_args = args;
        self
    }

    pub fn with_pass_timeout(mut self, timeout: Duration) -> Self {
        self.pass_timeout = timeout;
        self
    }

    async fn run_pass(&self, pass: u32, source: &Path, work_dir: &Path) -> Result<Output, CvError> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.extra_args)
            .arg("-interaction=nonstopmode")
            .arg("-output-directory")
            .arg(work_dir)
            .arg(source)
            .current_dir(work_dir)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        match tokio::time::timeout(self.pass_timeout, command.output()).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) if e.kind() == io::ErrorKind::NotFound => Err(CvError::CompilerNotFound {
                program: self.program.clone(),
            }),
            Ok(Err(e)) => Err(CvError::Io(e)),
            Err(_) => Err(CvError::CompilationTimedOut {
                pass,
                timeout: self.pass_timeout,
            }),
        }
    }
}

#[async_trait]
impl Compiler for LatexCompiler {
    async fn compile(
        &self,
        document: &RenderedDocument,
        work_dir: &Path,
    ) -> Result<PathBuf, CvError> {
        let source = work_dir.join(format!("{SOURCE_STEM}.tex"));
        tokio::fs::write(&source, document.as_str()).await?;

        let mut diagnostics = String::new();
        for pass in 1..=COMPILE_PASSES {
            let output = self.run_pass(pass, &source, work_dir).await?;
            if !output.status.success() {
                debug!(
                    "{} pass {pass}/{COMPILE_PASSES} exited with {} (advisory)",
                    self.program, output.status
                );
            }
            append_diagnostics(&mut diagnostics, pass, &output);
        }

        let pdf = work_dir.join(format!("{SOURCE_STEM}.pdf"));
        if !is_non_empty_file(&pdf).await {
            return Err(CvError::CompilationFailed {
                passes: COMPILE_PASSES,
                diagnostics,
            });
        }

        info!("Compiled {} in {COMPILE_PASSES} passes", pdf.display());
        Ok(pdf)
    }
}

/// True when `path` is a regular file with at least one byte.
pub(crate) async fn is_non_empty_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .is_ok_and(|m| m.is_file() && m.len() > 0)
}

fn append_diagnostics(buffer: &mut String, pass: u32, output: &Output) {
    buffer.push_str(&format!("--- pass {pass} ({}) ---\n", output.status));
    buffer.push_str(&String::from_utf8_lossy(&output.stdout));
    if !output.stderr.is_empty() {
        buffer.push_str(&String::from_utf8_lossy(&output.stderr));
    }
    if !buffer.ends_with('\n') {
        buffer.push('\n');
    }
}
