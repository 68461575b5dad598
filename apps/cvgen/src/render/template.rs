//! Template Renderer: binds a `CvRecord` into the LaTeX template.
//!
//! Jinja's default `{{ }}` / `{% %}` delimiters collide with LaTeX braces and
//! comments, so the environment uses `<< >>` for expressions, `<% %>` for blocks
//! and `<# #>` for comments.
//!
//! Every `<< >>` output goes through the escaper via the environment formatter.
//! Loops over lists and objects are structural and never escaped themselves.
//! `logo_path` is the exception: it is emitted raw, so it must not contain
//! characters that are special inside a LaTeX argument.

use std::path::{Path, PathBuf};

use minijinja::syntax::SyntaxConfig;
use minijinja::{path_loader, Environment, Error, ErrorKind, UndefinedBehavior, Value};
use serde::Serialize;
use tracing::debug;

use crate::errors::CvError;
use crate::models::CvRecord;
use crate::render::escape::escape_value;

/// Markup produced from one record. Lives only between rendering and compilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDocument(String);

impl RenderedDocument {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for RenderedDocument {
    fn from(source: String) -> Self {
        Self(source)
    }
}

/// Characters that would end or corrupt the raw `\includegraphics{...}` argument.
const UNSAFE_PATH_CHARS: [char; 4] = ['%', '#', '{', '}'];

/// What the template sees: the record's fields plus the derived `logo_path`.
/// The caller's record is borrowed, never mutated.
#[derive(Serialize)]
struct TemplateContext<'a> {
    #[serde(flatten)]
    record: &'a CvRecord,
    logo_path: String,
}

pub struct TemplateRenderer {
    env: Environment<'static>,
    template_name: String,
    logo_path: PathBuf,
}

impl TemplateRenderer {
    pub fn new(
        template_dir: impl AsRef<Path>,
        template_name: impl Into<String>,
        logo_path: impl Into<PathBuf>,
    ) -> Result<Self, CvError> {
        let logo_path = std::path::absolute(logo_path.into())?;
        if logo_path.to_string_lossy().contains(UNSAFE_PATH_CHARS) {
            return Err(CvError::Template(Error::new(
                ErrorKind::InvalidOperation,
                format!(
                    "logo path {} contains a character LaTeX cannot take raw (% # {{ }})",
                    logo_path.display()
                ),
            )));
        }

        let mut env = Environment::new();
        env.set_syntax(
            SyntaxConfig::builder()
                .block_delimiters("<%", "%>")
                .variable_delimiters("<<", ">>")
                .comment_delimiters("<#", "#>")
                .build()
                .map_err(CvError::Template)?,
        );
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.set_loader(path_loader(template_dir.as_ref()));
        env.set_formatter(|out, _state, value| {
            let text = if value.is_safe() {
                value.to_string()
            } else {
                escape_value(value)
            };
            out.write_str(&text)
                .map_err(|_| Error::new(ErrorKind::WriteFailure, "failed to write template output"))
        });
        env.add_filter("tex", tex_filter);

        Ok(Self {
            env,
            template_name: template_name.into(),
            logo_path,
        })
    }

    /// Renders the record into LaTeX source.
    ///
    /// Fails with `Template` if the template is missing or malformed and with `Render`
    /// if it references a binding the record does not provide.
    pub fn render(&self, record: &CvRecord) -> Result<RenderedDocument, CvError> {
        let template = self
            .env
            .get_template(&self.template_name)
            .map_err(CvError::Template)?;

        let context = TemplateContext {
            record,
            logo_path: self.logo_path.to_string_lossy().into_owned(),
        };

        let source = template.render(&context).map_err(classify_render_error)?;
        debug!(
            "Rendered template '{}' for record {} ({} bytes)",
            self.template_name,
            record.id,
            source.len()
        );

        Ok(RenderedDocument(source))
    }
}

/// `<< value | tex >>` escapes explicitly and marks the result safe so the
/// formatter does not escape it a second time.
fn tex_filter(value: Value) -> Value {
    Value::from_safe_string(escape_value(&value))
}

/// Syntax problems surface lazily for included templates, so they are still
/// template errors even when raised during rendering.
fn classify_render_error(err: Error) -> CvError {
    match err.kind() {
        ErrorKind::TemplateNotFound | ErrorKind::SyntaxError => CvError::Template(err),
        _ => CvError::Render(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::cv::fixtures::minimal_record;
    use std::fs;
    use tempfile::tempdir;

    fn repo_renderer() -> TemplateRenderer {
        let root = Path::new(env!("CARGO_MANIFEST_DIR"));
        TemplateRenderer::new(
            root.join("templates"),
            "cv_template.tex",
            root.join("assets/logo.png"),
        )
        .unwrap()
    }

    fn renderer_for(template: &str) -> (tempfile::TempDir, TemplateRenderer) {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("test.tex"), template).unwrap();
        let renderer = TemplateRenderer::new(dir.path(), "test.tex", "logo.png").unwrap();
        (dir, renderer)
    }

    #[test]
    fn test_minimal_record_renders_summary_verbatim() {
        let doc = repo_renderer().render(&minimal_record()).unwrap();
        assert!(doc.as_str().contains("Hello, this is a test."));
        assert!(doc.as_str().contains(r"\documentclass"));
    }

    #[test]
    fn test_special_characters_in_summary_are_escaped() {
        let mut record = minimal_record();
        record.summary = "50% faster & $1M saved".to_string();
        let doc = repo_renderer().render(&record).unwrap();
        assert!(doc.as_str().contains(r"50\% faster \& \$1M saved"));
    }

    #[test]
    fn test_list_items_are_escaped_individually() {
        let mut record = minimal_record();
        record.key_skills[0].items = vec!["C#".to_string(), "F_sharp".to_string()];
        record.experience[0].description_list = vec!["Cut cost by 30%".to_string()];
        let doc = repo_renderer().render(&record).unwrap();
        assert!(doc.as_str().contains(r"C\#"));
        assert!(doc.as_str().contains(r"F\_sharp"));
        assert!(doc.as_str().contains(r"Cut cost by 30\%"));
    }

    #[test]
    fn test_logo_path_is_absolute_and_not_escaped() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("test.tex"), "<< logo_path | safe >>").unwrap();
        let renderer = TemplateRenderer::new(dir.path(), "test.tex", "assets/my_logo.png").unwrap();
        let doc = renderer.render(&minimal_record()).unwrap();
        let rendered = Path::new(doc.as_str());
        assert!(rendered.is_absolute(), "got {}", doc.as_str());
        assert!(doc.as_str().ends_with("assets/my_logo.png"));
    }

    #[test]
    fn test_logo_path_with_latex_specials_is_rejected() {
        let dir = tempdir().unwrap();
        for logo in ["assets/100%_logo.png", "assets/#1/logo.png", "assets/{x}.png"] {
            let err = TemplateRenderer::new(dir.path(), "test.tex", logo)
                .err()
                .unwrap_or_else(|| panic!("{logo} should be rejected"));
            assert!(matches!(err, CvError::Template(_)), "got {err:?}");
        }
    }

    #[test]
    fn test_custom_delimiters_leave_latex_braces_alone() {
        let (_dir, renderer) = renderer_for(
            "\\section{Summary}<# note #><% if summary %>\\textbf{<< summary >>}<% endif %>",
        );
        let doc = renderer.render(&minimal_record()).unwrap();
        assert_eq!(
            doc.as_str(),
            "\\section{Summary}\\textbf{Hello, this is a test.}"
        );
    }

    #[test]
    fn test_tex_filter_does_not_double_escape() {
        let mut record = minimal_record();
        record.summary = "R&D".to_string();
        let (_dir, renderer) = renderer_for("<< summary | tex >>|<< summary >>");
        let doc = renderer.render(&record).unwrap();
        assert_eq!(doc.as_str(), r"R\&D|R\&D");
    }

    #[test]
    fn test_missing_optional_field_renders_empty() {
        let (_dir, renderer) = renderer_for("[<< personal_info.phone >>]");
        let doc = renderer.render(&minimal_record()).unwrap();
        assert_eq!(doc.as_str(), "[]");
    }

    #[test]
    fn test_missing_template_is_template_error() {
        let dir = tempdir().unwrap();
        let renderer = TemplateRenderer::new(dir.path(), "absent.tex", "logo.png").unwrap();
        let err = renderer.render(&minimal_record()).unwrap_err();
        assert!(matches!(err, CvError::Template(_)), "got {err:?}");
    }

    #[test]
    fn test_malformed_template_is_template_error() {
        let (_dir, renderer) = renderer_for("<% for x in %>");
        let err = renderer.render(&minimal_record()).unwrap_err();
        assert!(matches!(err, CvError::Template(_)), "got {err:?}");
    }

    #[test]
    fn test_unknown_binding_is_render_error() {
        let (_dir, renderer) = renderer_for("<< personal_info.middle_name >>");
        let err = renderer.render(&minimal_record()).unwrap_err();
        assert!(matches!(err, CvError::Render(_)), "got {err:?}");
    }
}
