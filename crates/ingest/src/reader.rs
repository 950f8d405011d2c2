use quick_xml::Reader;
use quick_xml::events::Event;
use std::io::{Cursor, Read};
use std::path::Path;
use tokio::fs;
use tracing::debug;
use zip::ZipArchive;

use crate::error::{IngestError, Result};

const DOCX_BODY: &str = "word/document.xml";

pub struct FileReader;

impl FileReader {
    /// Extract the ordered paragraphs of a document.
    ///
    /// PDFs go through `pdf-extract`, DOCX paragraphs come from the
    /// `word/document.xml` part, plain text and markdown are read as-is.
    /// Anything else is rejected before touching the file contents.
    pub async fn read_paragraphs(path: &Path) -> Result<Vec<String>> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        let paragraphs = match extension.as_str() {
            "pdf" => {
                let bytes = read_bytes(path).await?;
                let text = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
                    .await
                    .map_err(|e| IngestError::Pdf(e.to_string()))?
                    .map_err(|e| IngestError::Pdf(e.to_string()))?;
                split_paragraphs(&text)
            }
            "docx" => {
                let bytes = read_bytes(path).await?;
                tokio::task::spawn_blocking(move || docx_paragraphs(&bytes))
                    .await
                    .map_err(|e| IngestError::Docx(e.to_string()))??
            }
            "txt" | "md" => {
                let text = fs::read_to_string(path)
                    .await
                    .map_err(|source| IngestError::Io {
                        path: path.to_path_buf(),
                        source,
                    })?;
                split_paragraphs(&text)
            }
            _ => return Err(IngestError::UnsupportedFileType(path.to_path_buf())),
        };

        debug!(path = %path.display(), paragraphs = paragraphs.len(), "extracted text");
        Ok(paragraphs)
    }
}

async fn read_bytes(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).await.map_err(|source| IngestError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Blank lines separate paragraphs; each paragraph keeps its inner line breaks.
fn split_paragraphs(text: &str) -> Vec<String> {
    let normalized = text.replace("\r\n", "\n");
    normalized
        .split("\n\n")
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect()
}

/// Non-empty `<w:p>` paragraphs of a DOCX package, in document order.
pub fn docx_paragraphs(bytes: &[u8]) -> Result<Vec<String>> {
    let mut archive =
        ZipArchive::new(Cursor::new(bytes)).map_err(|e| IngestError::Docx(e.to_string()))?;
    let mut xml = String::new();
    archive
        .by_name(DOCX_BODY)
        .map_err(|e| IngestError::Docx(format!("{DOCX_BODY}: {e}")))?
        .read_to_string(&mut xml)
        .map_err(|e| IngestError::Docx(format!("{DOCX_BODY}: {e}")))?;

    let mut reader = Reader::from_str(&xml);
    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.name().as_ref() == b"w:t" => in_text = true,
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"w:t" => in_text = false,
                b"w:p" => push_paragraph(&mut paragraphs, &mut current),
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.name().as_ref() {
                b"w:tab" | b"w:br" | b"w:cr" => current.push(' '),
                b"w:p" => push_paragraph(&mut paragraphs, &mut current),
                _ => {}
            },
            Ok(Event::Text(t)) if in_text => {
                let text = t.unescape().map_err(|e| IngestError::Docx(e.to_string()))?;
                current.push_str(&text);
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(IngestError::Docx(format!(
                    "{DOCX_BODY} at byte {}: {e}",
                    reader.buffer_position()
                )));
            }
            _ => {}
        }
    }
    push_paragraph(&mut paragraphs, &mut current);
    Ok(paragraphs)
}

fn push_paragraph(paragraphs: &mut Vec<String>, current: &mut String) {
    let text = current.trim();
    if !text.is_empty() {
        paragraphs.push(text.to_string());
    }
    current.clear();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    const DOCUMENT_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:body>
    <w:p><w:r><w:t>Knowledge </w:t></w:r><w:r><w:t xml:space="preserve">graphs &amp; text</w:t></w:r></w:p>
    <w:p/>
    <w:p><w:r><w:t>   </w:t></w:r></w:p>
    <w:p><w:pPr><w:pStyle w:val="Heading1"/></w:pPr><w:r><w:t>Second</w:t><w:tab/><w:t>paragraph</w:t></w:r></w:p>
  </w:body>
</w:document>"#;

    fn package(parts: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, content) in parts {
            let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
            writer.start_file(*name, options).unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_split_paragraphs() {
        let text = "First line\nstill first\n\n\n  Second  \r\n\r\nThird";
        let paragraphs = split_paragraphs(text);
        assert_eq!(paragraphs, vec!["First line\nstill first", "Second", "Third"]);
    }

    #[test]
    fn test_docx_paragraphs_skip_empty() {
        let bytes = package(&[("[Content_Types].xml", "<Types/>"), (DOCX_BODY, DOCUMENT_XML)]);
        let paragraphs = docx_paragraphs(&bytes).unwrap();
        assert_eq!(paragraphs, vec!["Knowledge graphs & text", "Second paragraph"]);
    }

    #[test]
    fn test_docx_without_body_part() {
        let bytes = package(&[("word/styles.xml", "<w:styles/>")]);
        assert!(matches!(docx_paragraphs(&bytes), Err(IngestError::Docx(_))));
        assert!(matches!(docx_paragraphs(b"not a zip"), Err(IngestError::Docx(_))));
    }

    #[tokio::test]
    async fn test_reads_docx_file() {
        let path = std::env::temp_dir().join(format!("ingest-reader-{}.docx", std::process::id()));
        std::fs::write(&path, package(&[(DOCX_BODY, DOCUMENT_XML)])).unwrap();

        let paragraphs = FileReader::read_paragraphs(&path).await.unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(paragraphs.len(), 2);
        assert_eq!(paragraphs[1], "Second paragraph");
    }

    #[tokio::test]
    async fn test_unsupported_extension() {
        let err = FileReader::read_paragraphs(Path::new("report.xlsx"))
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::UnsupportedFileType(_)));
    }

    #[tokio::test]
    async fn test_reads_text_file() {
        let path = std::env::temp_dir().join(format!("ingest-reader-{}.txt", std::process::id()));
        std::fs::write(&path, "Alpha paragraph.\n\nBeta paragraph.").unwrap();

        let paragraphs = FileReader::read_paragraphs(&path).await.unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(paragraphs, vec!["Alpha paragraph.", "Beta paragraph."]);
    }
}
