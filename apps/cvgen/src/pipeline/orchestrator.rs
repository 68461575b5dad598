//! Pipeline Orchestrator: render → compile → convert inside one working area.
//!
//! Flow: allocate area → render (Rendered) → compile (Compiled) → convert in
//! `spawn_blocking` (Converted) → strip intermediates (CleanedUp) → persist area.
//!
//! Any failure moves the run to `Failed`: the working area is dropped in full and the
//! error is returned unchanged in kind, tagged with the stage that raised it. The
//! caller never sees a half-cleaned area or a partial artifact pair.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, info_span, Instrument};
use uuid::Uuid;

use crate::config::Config;
use crate::errors::{CvError, PipelineError, Stage};
use crate::models::CvRecord;
use crate::pipeline::compiler::{is_non_empty_file, Compiler, LatexCompiler, SOURCE_STEM};
use crate::pipeline::converter::{self, DocumentConverter};
use crate::pipeline::docx::PdfDocxConverter;
use crate::pipeline::workspace::WorkingArea;
use crate::render::TemplateRenderer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Initialized,
    Rendered,
    Compiled,
    Converted,
    CleanedUp,
    Failed,
}

/// The two final files of a successful run. The caller owns `directory` and
/// everything in it from here on.
#[derive(Debug, Clone, Serialize)]
pub struct ArtifactPair {
    pub pdf: PathBuf,
    pub docx: PathBuf,
    pub directory: PathBuf,
    pub generated_at: DateTime<Utc>,
}

/// Stateless generation service. Cheap to share: clone the `Arc`s or wrap the
/// whole pipeline in one.
pub struct Pipeline {
    renderer: TemplateRenderer,
    compiler: Arc<dyn Compiler>,
    converter: Arc<dyn DocumentConverter>,
    work_root: Option<PathBuf>,
}

impl Pipeline {
    pub fn new(
        renderer: TemplateRenderer,
        compiler: Arc<dyn Compiler>,
        converter: Arc<dyn DocumentConverter>,
    ) -> Self {
        Self {
            renderer,
            compiler,
            converter,
            work_root: None,
        }
    }

    /// Working areas are created under `root` instead of the system temp dir.
    pub fn with_work_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.work_root = Some(root.into());
        self
    }

    /// pdflatex + the built-in PDF→DOCX converter, wired from configuration.
    pub fn from_config(config: &Config) -> Result<Self, CvError> {
        let renderer = TemplateRenderer::new(
            &config.template_dir,
            config.template_name.clone(),
            config.logo_path.clone(),
        )?;
        let compiler = LatexCompiler::new(config.latex_bin.clone())
            .with_extra_args(config.latex_extra_args.clone())
            .with_pass_timeout(config.pass_timeout);

        let pipeline = Self::new(renderer, Arc::new(compiler), Arc::new(PdfDocxConverter));
        Ok(match &config.work_root {
            Some(root) => pipeline.with_work_root(root),
            None => pipeline,
        })
    }

    /// Generates the PDF and DOCX for `record`.
    pub async fn generate(&self, record: &CvRecord) -> Result<ArtifactPair, PipelineError> {
        let run_id = Uuid::new_v4();
        let span = info_span!("generate", %run_id, record_id = %record.id);

        let mut run = Run::new();
        let result = self
            .execute(&mut run, run_id, record)
            .instrument(span.clone())
            .await;

        span.in_scope(|| match &result {
            Ok(artifacts) => info!("CV generated in {}", artifacts.directory.display()),
            Err(e) => error!("CV generation failed ({}): {e}", e.error.code()),
        });
        result
    }

    async fn execute(
        &self,
        run: &mut Run,
        run_id: Uuid,
        record: &CvRecord,
    ) -> Result<ArtifactPair, PipelineError> {
        let area = WorkingArea::allocate(self.work_root.as_deref(), run_id)
            .map_err(|e| run.fail(Stage::Setup, e.into()))?;

        let document = self
            .renderer
            .render(record)
            .map_err(|e| run.fail(Stage::Render, e))?;
        run.advance(PipelineState::Rendered);

        let pdf = self
            .compiler
            .compile(&document, area.path())
            .await
            .map_err(|e| run.fail(Stage::Compile, e))?;
        drop(document);
        run.advance(PipelineState::Compiled);

        let docx = area.path().join(format!("{SOURCE_STEM}.docx"));
        self.convert(&pdf, &docx)
            .await
            .map_err(|e| run.fail(Stage::Convert, e))?;
        if !is_non_empty_file(&docx).await {
            let cause = format!(
                "converter reported success but wrote nothing to {}",
                docx.display()
            );
            return Err(run.fail(Stage::Convert, CvError::ConversionFailed(cause.into())));
        }
        run.advance(PipelineState::Converted);

        let pdf_name = file_name(&pdf);
        let docx_name = file_name(&docx);
        let removed = area
            .retain_only(&[pdf_name.as_str(), docx_name.as_str()])
            .map_err(|e| run.fail(Stage::Cleanup, e.into()))?;
        debug!("Removed {removed} intermediate files");

        let directory = area.persist();
        run.advance(PipelineState::CleanedUp);

        Ok(ArtifactPair {
            pdf: directory.join(pdf_name),
            docx: directory.join(docx_name),
            directory,
            generated_at: Utc::now(),
        })
    }

    /// The converter is blocking, so it runs on the blocking pool. A panic inside it
    /// is reported as a conversion failure.
    async fn convert(&self, pdf: &Path, docx: &Path) -> Result<(), CvError> {
        let backend = Arc::clone(&self.converter);
        let (pdf, docx) = (pdf.to_path_buf(), docx.to_path_buf());

        tokio::task::spawn_blocking(move || converter::convert(backend.as_ref(), &pdf, &docx))
            .await
            .map_err(|e| CvError::ConversionFailed(Box::new(e)))?
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Tracks the state of one run and logs transitions.
struct Run {
    state: PipelineState,
}

impl Run {
    fn new() -> Self {
        Self {
            state: PipelineState::Initialized,
        }
    }

    fn advance(&mut self, next: PipelineState) {
        debug!("{:?} -> {:?}", self.state, next);
        self.state = next;
    }

    fn fail(&mut self, stage: Stage, error: CvError) -> PipelineError {
        debug!("{:?} -> Failed at {stage}", self.state);
        self.state = PipelineState::Failed;
        PipelineError::new(stage, error)
    }
}
