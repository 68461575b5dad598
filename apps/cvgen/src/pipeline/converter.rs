//! Format Converter: PDF to editable document.
//!
//! Converters follow an open → convert → close protocol. `convert` holds the open
//! session in a guard whose `Drop` calls `close()`, so the handle on the input PDF
//! is released on success, on error and on unwind alike.

use std::path::Path;

use tracing::{debug, info};

use crate::errors::{BoxError, CvError};

/// Opens conversion sessions over a compiled PDF.
pub trait DocumentConverter: Send + Sync {
    fn open(&self, pdf_path: &Path) -> Result<Box<dyn ConversionSession>, BoxError>;
}

/// One open converter handle. `close` must be safe to call after a failed `convert`.
pub trait ConversionSession: Send {
    fn convert(&mut self, output_path: &Path) -> Result<(), BoxError>;
    fn close(&mut self);
}

/// Releases the session when dropped.
struct OpenSession(Box<dyn ConversionSession>);

impl Drop for OpenSession {
    fn drop(&mut self) {
        self.0.close();
        debug!("Converter session closed");
    }
}

/// Converts `pdf_path` into `output_path`. Blocking; run it off the async executor.
///
/// Any failure, from opening or converting, becomes `ConversionFailed` carrying the
/// original cause. No retries.
pub fn convert(
    converter: &dyn DocumentConverter,
    pdf_path: &Path,
    output_path: &Path,
) -> Result<(), CvError> {
    let mut session = OpenSession(converter.open(pdf_path).map_err(CvError::ConversionFailed)?);
    session
        .0
        .convert(output_path)
        .map_err(CvError::ConversionFailed)?;
    drop(session);

    info!("Converted {} -> {}", pdf_path.display(), output_path.display());
    Ok(())
}

#[cfg(test)]
pub(crate) mod fake {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// What a `RecordingSession` does when asked to convert.
    #[derive(Clone, Copy, Debug, Default)]
    pub enum Outcome {
        /// Copies the PDF bytes to the output.
        #[default]
        Copy,
        Fail(&'static str),
        /// Reports success without writing anything.
        NoOutput,
        Panic(&'static str),
    }

    /// Converter double that counts opens and closes.
    #[derive(Clone, Default)]
    pub struct RecordingConverter {
        pub outcome: Outcome,
        pub opened: Arc<AtomicUsize>,
        pub closed: Arc<AtomicUsize>,
    }

    impl RecordingConverter {
        pub fn with_outcome(outcome: Outcome) -> Self {
            Self {
                outcome,
                ..Self::default()
            }
        }

        pub fn failing(message: &'static str) -> Self {
            Self::with_outcome(Outcome::Fail(message))
        }

        pub fn opened(&self) -> usize {
            self.opened.load(Ordering::SeqCst)
        }

        pub fn closed(&self) -> usize {
            self.closed.load(Ordering::SeqCst)
        }
    }

    struct RecordingSession {
        pdf: std::path::PathBuf,
        outcome: Outcome,
        closed: Arc<AtomicUsize>,
    }

    impl DocumentConverter for RecordingConverter {
        fn open(&self, pdf_path: &Path) -> Result<Box<dyn ConversionSession>, BoxError> {
            self.opened.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(RecordingSession {
                pdf: pdf_path.to_path_buf(),
                outcome: self.outcome,
                closed: Arc::clone(&self.closed),
            }))
        }
    }

    impl ConversionSession for RecordingSession {
        fn convert(&mut self, output_path: &Path) -> Result<(), BoxError> {
            match self.outcome {
                Outcome::Copy => {
                    std::fs::copy(&self.pdf, output_path)?;
                    Ok(())
                }
                Outcome::Fail(message) => Err(message.into()),
                Outcome::NoOutput => Ok(()),
                Outcome::Panic(message) => panic!("{message}"),
            }
        }

        fn close(&mut self) {
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fake::RecordingConverter;
    use super::*;
    use std::error::Error as _;
    use std::fs;
    use tempfile::tempdir;

    struct UnopenableConverter;

    impl DocumentConverter for UnopenableConverter {
        fn open(&self, _pdf_path: &Path) -> Result<Box<dyn ConversionSession>, BoxError> {
            Err("cannot open input".into())
        }
    }

    #[test]
    fn test_successful_conversion_closes_session_once() {
        let dir = tempdir().unwrap();
        let pdf = dir.path().join("cv_output.pdf");
        fs::write(&pdf, b"%PDF-1.4").unwrap();
        let docx = dir.path().join("cv_output.docx");

        let converter = RecordingConverter::default();
        convert(&converter, &pdf, &docx).unwrap();

        assert_eq!(fs::read(&docx).unwrap(), b"%PDF-1.4");
        assert_eq!(converter.opened(), 1);
        assert_eq!(converter.closed(), 1);
    }

    #[test]
    fn test_failed_conversion_still_closes_session() {
        let dir = tempdir().unwrap();
        let pdf = dir.path().join("cv_output.pdf");
        fs::write(&pdf, b"%PDF-1.4").unwrap();

        let converter = RecordingConverter::failing("native converter crashed");
        let err = convert(&converter, &pdf, &dir.path().join("cv_output.docx")).unwrap_err();

        assert!(matches!(err, CvError::ConversionFailed(_)), "got {err:?}");
        assert_eq!(err.source().unwrap().to_string(), "native converter crashed");
        assert_eq!(converter.closed(), 1);
    }

    #[test]
    fn test_open_failure_is_conversion_failed() {
        let dir = tempdir().unwrap();
        let err = convert(
            &UnopenableConverter,
            &dir.path().join("missing.pdf"),
            &dir.path().join("out.docx"),
        )
        .unwrap_err();
        assert!(matches!(err, CvError::ConversionFailed(_)));
    }
}
