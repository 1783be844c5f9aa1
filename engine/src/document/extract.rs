//! Text extraction per document format
//!
//! Extraction is CPU-bound and synchronous; callers run it on the blocking
//! pool. Any error, panic or blank result counts as a failed extraction.

use crate::config::DocumentsConfig;
use crate::session::DocumentKind;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::io::{Cursor, Read};

/// Errors from a single extraction
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("PDF extraction failed: {0}")]
    Pdf(String),

    #[error("DOCX extraction failed: {0}")]
    Docx(String),

    #[error("No text found in document")]
    Empty,
}

/// Turns document bytes into plain text
pub trait TextExtractor: Send + Sync {
    fn extract(&self, kind: DocumentKind, bytes: &[u8]) -> Result<String, ExtractError>;
}

/// Bytes of `word/document.xml` allowed per character of extracted text
///
/// Run and paragraph markup typically outweighs the text it wraps several
/// times over.
const XML_BYTES_PER_CHAR: u64 = 16;

/// PDF via `pdf-extract`, DOCX via `zip` + `quick-xml`, TXT as lossy UTF-8
#[derive(Debug, Clone, Copy)]
pub struct DefaultExtractor {
    max_xml_bytes: u64,
}

impl DefaultExtractor {
    /// Extractor for text that is clipped to `max_extracted_chars`
    ///
    /// DOCX archives whose document part would inflate past a matching
    /// bound are refused before decompression.
    pub fn new(max_extracted_chars: usize) -> Self {
        Self {
            max_xml_bytes: (max_extracted_chars as u64).saturating_mul(XML_BYTES_PER_CHAR),
        }
    }
}

impl Default for DefaultExtractor {
    fn default() -> Self {
        Self::new(DocumentsConfig::default().max_extracted_chars)
    }
}

impl TextExtractor for DefaultExtractor {
    fn extract(&self, kind: DocumentKind, bytes: &[u8]) -> Result<String, ExtractError> {
        let text = match kind {
            DocumentKind::Pdf => extract_pdf(bytes)?,
            DocumentKind::Docx => extract_docx(bytes, self.max_xml_bytes)?,
            DocumentKind::Txt => String::from_utf8_lossy(bytes).into_owned(),
        };

        let text = text.trim();
        if text.is_empty() {
            return Err(ExtractError::Empty);
        }
        Ok(text.to_string())
    }
}

fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))
}

/// Read the paragraphs of `word/document.xml`
///
/// Text runs (`w:t`) are concatenated, paragraphs (`w:p`) end with a
/// newline, `w:tab` becomes a tab and `w:br`/`w:cr` a newline.
///
/// The part is read through a `max_xml_bytes` limit; the declared size in
/// the archive is checked first but is not trusted.
fn extract_docx(bytes: &[u8], max_xml_bytes: u64) -> Result<String, ExtractError> {
    let mut archive =
        zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| ExtractError::Docx(e.to_string()))?;
    let part = archive
        .by_name("word/document.xml")
        .map_err(|e| ExtractError::Docx(e.to_string()))?;

    if part.size() > max_xml_bytes {
        return Err(ExtractError::Docx("document.xml too large".into()));
    }

    let mut xml = Vec::new();
    part.take(max_xml_bytes.saturating_add(1))
        .read_to_end(&mut xml)
        .map_err(|e| ExtractError::Docx(e.to_string()))?;
    if xml.len() as u64 > max_xml_bytes {
        return Err(ExtractError::Docx("document.xml too large".into()));
    }

    let xml = String::from_utf8(xml).map_err(|e| ExtractError::Docx(e.to_string()))?;
    docx_xml_to_text(&xml)
}

fn docx_xml_to_text(xml: &str) -> Result<String, ExtractError> {
    let mut reader = Reader::from_str(xml);
    let mut text = String::new();
    let mut in_run_text = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                if e.local_name().as_ref() == b"t" {
                    in_run_text = true;
                }
            }
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"tab" => text.push('\t'),
                b"br" | b"cr" => text.push('\n'),
                _ => {}
            },
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_run_text = false,
                b"p" => text.push('\n'),
                _ => {}
            },
            Ok(Event::Text(t)) if in_run_text => {
                let unescaped = t.unescape().map_err(|e| ExtractError::Docx(e.to_string()))?;
                text.push_str(&unescaped);
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(ExtractError::Docx(format!(
                    "XML error at position {}: {}",
                    reader.buffer_position(),
                    e
                )))
            }
        }
    }

    Ok(text)
}
