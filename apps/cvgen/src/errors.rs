use std::fmt;
use std::time::Duration;

use serde_json::{json, Value};
use thiserror::Error;

/// Boxed cause carried by conversion failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error kinds raised by the generation pipeline.
/// None of them are retried inside the pipeline; retrying is the caller's decision.
#[derive(Debug, Error)]
pub enum CvError {
    #[error("Template error: {0}")]
    Template(#[source] minijinja::Error),

    #[error("Render error: {0}")]
    Render(#[source] minijinja::Error),

    #[error("LaTeX compiler '{program}' was not found on PATH")]
    CompilerNotFound { program: String },

    #[error("Compilation produced no PDF after {passes} passes")]
    CompilationFailed { passes: u32, diagnostics: String },

    #[error("Compiler pass {pass} did not finish within {timeout:?}")]
    CompilationTimedOut { pass: u32, timeout: Duration },

    #[error("PDF to DOCX conversion failed: {0}")]
    ConversionFailed(#[source] BoxError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CvError {
    /// Stable machine-readable code for the generic failure body.
    pub fn code(&self) -> &'static str {
        match self {
            CvError::Template(_) => "TEMPLATE_ERROR",
            CvError::Render(_) => "RENDER_ERROR",
            CvError::CompilerNotFound { .. } => "COMPILER_NOT_FOUND",
            CvError::CompilationFailed { .. } => "COMPILATION_FAILED",
            CvError::CompilationTimedOut { .. } => "COMPILATION_TIMED_OUT",
            CvError::ConversionFailed(_) => "CONVERSION_FAILED",
            CvError::Io(_) => "IO_ERROR",
        }
    }

    /// Captured compiler output, when the error carries any.
    pub fn diagnostics(&self) -> Option<&str> {
        match self {
            CvError::CompilationFailed { diagnostics, .. } => Some(diagnostics),
            _ => None,
        }
    }
}

/// Pipeline stage at which a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Setup,
    Render,
    Compile,
    Convert,
    Cleanup,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Setup => "setup",
            Stage::Render => "render",
            Stage::Compile => "compile",
            Stage::Convert => "convert",
            Stage::Cleanup => "cleanup",
        };
        f.write_str(name)
    }
}

/// A `CvError` annotated with the stage that raised it. The kind is never translated.
#[derive(Debug, Error)]
#[error("{stage} stage failed: {error}")]
pub struct PipelineError {
    pub stage: Stage,
    #[source]
    pub error: CvError,
}

impl PipelineError {
    pub fn new(stage: Stage, error: CvError) -> Self {
        Self { stage, error }
    }

    pub fn kind(&self) -> &CvError {
        &self.error
    }

    /// The single generic failure body shown to callers.
    pub fn to_json(&self) -> Value {
        if let Some(diagnostics) = self.error.diagnostics() {
            tracing::error!("Compiler diagnostics:\n{diagnostics}");
        }

        json!({
            "error": {
                "code": self.kind().code(),
                "stage": self.stage.to_string(),
                "message": self.error.to_string()
            }
        })
    }
}
