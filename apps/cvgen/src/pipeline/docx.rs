//! PDF → DOCX conversion backed by `pdf-extract`.
//!
//! The output is a minimal WordprocessingML package: one paragraph per text line of
//! the PDF, blank-line runs collapsed, form feeds turned into page breaks. Layout is
//! not reproduced; the goal is an editable copy of the text.

use std::fs::File;
use std::io::{self, Seek, Write};
use std::path::Path;

use quick_xml::escape::escape;
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::errors::BoxError;
use crate::pipeline::converter::{ConversionSession, DocumentConverter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Text(String),
    Blank,
    PageBreak,
}

/// Default converter. `open` loads the PDF into memory; `close` releases it.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfDocxConverter;

impl DocumentConverter for PdfDocxConverter {
    fn open(&self, pdf_path: &Path) -> Result<Box<dyn ConversionSession>, BoxError> {
        let source = std::fs::read(pdf_path)?;
        if source.is_empty() {
            return Err(format!("{} is empty", pdf_path.display()).into());
        }
        Ok(Box::new(PdfSession {
            source: Some(source),
        }))
    }
}

struct PdfSession {
    source: Option<Vec<u8>>,
}

impl ConversionSession for PdfSession {
    fn convert(&mut self, output_path: &Path) -> Result<(), BoxError> {
        let source = self
            .source
            .as_deref()
            .ok_or("conversion session is already closed")?;

        let text = pdf_extract::extract_text_from_mem(source)
            .map_err(|e| format!("text extraction failed: {e}"))?;
        let blocks = blocks_from_text(&text);
        debug!("Extracted {} blocks from PDF", blocks.len());

        let file = File::create(output_path)?;
        write_docx(&blocks, file)?;
        Ok(())
    }

    fn close(&mut self) {
        self.source = None;
    }
}

/// Splits extracted text into paragraphs.
pub fn blocks_from_text(text: &str) -> Vec<Block> {
    let mut blocks = Vec::new();

    for (index, page) in text.split('\u{c}').enumerate() {
        if index > 0 {
            blocks.push(Block::PageBreak);
        }

        let mut pending_blank = false;
        let mut page_has_text = false;
        for line in page.lines() {
            let cleaned = strip_control_chars(line.trim_end());
            if cleaned.trim().is_empty() {
                pending_blank = page_has_text;
                continue;
            }
            if pending_blank {
                blocks.push(Block::Blank);
                pending_blank = false;
            }
            blocks.push(Block::Text(cleaned));
            page_has_text = true;
        }
    }

    blocks
}

/// XML 1.0 forbids most C0 controls; tabs survive.
fn strip_control_chars(line: &str) -> String {
    line.chars().filter(|c| *c == '\t' || !c.is_control()).collect()
}

/// Writes a `.docx` package containing `blocks`.
pub fn write_docx<W: Write + Seek>(blocks: &[Block], writer: W) -> io::Result<()> {
    let mut zip = ZipWriter::new(writer);
    let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    zip.start_file("[Content_Types].xml", deflated)
        .map_err(io_error)?;
    zip.write_all(CONTENT_TYPES_XML)?;

    zip.start_file("_rels/.rels", deflated).map_err(io_error)?;
    zip.write_all(ROOT_RELS_XML)?;

    zip.start_file("word/document.xml", deflated)
        .map_err(io_error)?;
    zip.write_all(document_xml(blocks).as_bytes())?;

    zip.finish().map_err(io_error)?;
    Ok(())
}

fn document_xml(blocks: &[Block]) -> String {
    let mut xml = String::from(DOCUMENT_HEAD);
    for block in blocks {
        match block {
            Block::Text(text) => {
                xml.push_str(r#"<w:p><w:r><w:t xml:space="preserve">"#);
                xml.push_str(&escape(text.as_str()));
                xml.push_str("</w:t></w:r></w:p>");
            }
            Block::Blank => xml.push_str("<w:p/>"),
            Block::PageBreak => xml.push_str(r#"<w:p><w:r><w:br w:type="page"/></w:r></w:p>"#),
        }
    }
    xml.push_str(DOCUMENT_TAIL);
    xml
}

fn io_error<E: std::error::Error + Send + Sync + 'static>(e: E) -> io::Error {
    io::Error::other(e)
}

const CONTENT_TYPES_XML: &[u8] = br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
  <Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
  <Default Extension="xml" ContentType="application/xml"/>
  <Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/>
</Types>"#;

const ROOT_RELS_XML: &[u8] = br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/>
</Relationships>"#;

const DOCUMENT_HEAD: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>"#;

// A4 with ~1.8cm margins, matching the LaTeX template's geometry.
const DOCUMENT_TAIL: &str = r#"<w:sectPr><w:pgSz w:w="11906" w:h="16838"/><w:pgMar w:top="1021" w:right="1021" w:bottom="1021" w:left="1021" w:header="708" w:footer="708" w:gutter="0"/></w:sectPr></w:body></w:document>"#;
