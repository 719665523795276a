//! Text extraction for binary documents (PDF, DOCX).
//!
//! Sources supply bytes plus a format tag; this module returns plain UTF-8
//! text, one line per page line (PDF) or paragraph (DOCX). Callers normalize
//! the result before chunking.

use std::io::Read;

use crate::error::{RagError, Result};

/// Maximum decompressed bytes to read from a single ZIP entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// Format tags understood by [`extract_text`].
pub const SUPPORTED_FORMATS: [&str; 3] = [".pdf", ".docx", ".doc"];

/// Extract plain text from `bytes` according to `file_type`.
pub fn extract_text(bytes: &[u8], file_type: &str) -> Result<String> {
    let text = match file_type {
        ".pdf" => extract_pdf(bytes)?,
        ".docx" | ".doc" => extract_docx(bytes)?,
        other => return Err(RagError::UnsupportedFormat(other.to_string())),
    };
    tracing::info!(file_type, chars = text.len(), "extracted document text");
    Ok(text)
}

fn extract_pdf(bytes: &[u8]) -> Result<String> {
    pdf_extract::extract_text_from_mem(bytes)
        .map_err(|e| RagError::Extraction(format!("PDF: {}", e)))
}

fn ooxml_err(e: impl std::fmt::Display) -> RagError {
    RagError::Extraction(format!("DOCX: {}", e))
}

fn extract_docx(bytes: &[u8]) -> Result<String> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).map_err(ooxml_err)?;
    let entry = archive
        .by_name("word/document.xml")
        .map_err(|_| ooxml_err("word/document.xml not found"))?;

    let mut doc_xml = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut doc_xml)
        .map_err(ooxml_err)?;
    if doc_xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(ooxml_err("word/document.xml exceeds size limit"));
    }

    paragraphs_from_document_xml(&doc_xml)
}

/// Concatenate `w:t` runs, ending a line at every `w:p` paragraph.
fn paragraphs_from_document_xml(xml: &[u8]) -> Result<String> {
    use quick_xml::events::Event;

    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"t" => in_text = true,
            Ok(Event::Text(te)) if in_text => {
                out.push_str(te.unescape().map_err(ooxml_err)?.as_ref());
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"tab" => out.push('\t'),
                b"br" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ooxml_err(e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn docx_bytes(document_xml: &str) -> Vec<u8> {
        let mut cursor = std::io::Cursor::new(Vec::new());
        {
            let mut zip = zip::ZipWriter::new(&mut cursor);
            let options = zip::write::SimpleFileOptions::default();
            zip.start_file("word/document.xml", options).unwrap();
            zip.write_all(document_xml.as_bytes()).unwrap();
            zip.finish().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn unsupported_format_returns_error() {
        let err = extract_text(b"foo", ".xlsx").unwrap_err();
        assert!(matches!(err, RagError::UnsupportedFormat(_)));
    }

    #[test]
    fn invalid_pdf_returns_error() {
        let err = extract_text(b"not a pdf", ".pdf").unwrap_err();
        assert!(matches!(err, RagError::Extraction(_)));
    }

    #[test]
    fn invalid_zip_returns_error_for_docx() {
        let err = extract_text(b"not a zip", ".docx").unwrap_err();
        assert!(matches!(err, RagError::Extraction(_)));
    }

    #[test]
    fn docx_paragraphs_become_lines() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:body>
    <w:p><w:r><w:t>Grace period</w:t></w:r><w:r><w:t xml:space="preserve"> is 30 days.</w:t></w:r></w:p>
    <w:p><w:r><w:t>Waiting &amp; exclusions apply.</w:t></w:r></w:p>
  </w:body>
</w:document>"#;
        let text = extract_text(&docx_bytes(xml), ".doc").unwrap();
        let lines: Vec<&str> = text.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
        assert_eq!(
            lines,
            vec!["Grace period is 30 days.", "Waiting & exclusions apply."]
        );
    }

    #[test]
    fn docx_without_document_xml() {
        let mut cursor = std::io::Cursor::new(Vec::new());
        {
            let mut zip = zip::ZipWriter::new(&mut cursor);
            zip.start_file("other.xml", zip::write::SimpleFileOptions::default())
                .unwrap();
            zip.write_all(b"<x/>").unwrap();
            zip.finish().unwrap();
        }
        let err = extract_text(&cursor.into_inner(), ".docx").unwrap_err();
        assert!(err.to_string().contains("word/document.xml"));
    }
}
