// Document generation pipeline: compile the rendered LaTeX, convert the PDF, and
// keep every run inside its own working area.
// The compiler and converter are blocking external work; the orchestrator awaits
// the compiler through tokio::process and runs the converter under spawn_blocking.

pub mod compiler;
pub mod converter;
pub mod docx;
pub mod orchestrator;
pub mod workspace;

pub use orchestrator::{ArtifactPair, Pipeline};
